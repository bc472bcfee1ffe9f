//! Wire profile (§4.5): the two interface variants differ in whether a
//! 4-byte code-packet header carrying sequence+ack is present, or only a
//! bare 2-byte sync+zero header.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireProfile {
    /// Code-packet header with 3-bit sequence + ack bit; sequencing and
    /// retry apply.
    U50,
    /// Bare sync+zero header, no sequencing.
    U61,
}

impl WireProfile {
    pub fn uses_sequencing(self) -> bool {
        matches!(self, WireProfile::U50)
    }
}

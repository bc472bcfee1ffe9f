//! Reset-cause taxonomy (§6 status-query surface). spec.md references
//! `cause=SoftwareReset`/`PhysicalReset` without enumerating every cause a
//! status query can report; this rounds that out to a concrete type.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    PowerUp,
    ExternalReset,
    WatchdogReset,
    SoftwareReset,
    ClearedReset,
}

impl Default for ResetCause {
    fn default() -> Self {
        ResetCause::PowerUp
    }
}

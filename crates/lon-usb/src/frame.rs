//! USB wire framing (§4.5, §6, S4): a 0x7E frame-sync byte, escape
//! stuffing for any data byte equal to the sync or escape byte, and an
//! 8-bit negative-sum checksum.
//!
//! The checksum byte itself is read by a dedicated parser state
//! (`CODE_PACKET_CHECKSUM`/its message-level counterpart) rather than
//! being subject to escape interpretation — that's exactly why the
//! uplink state machine names it separately from `ESCAPED_DATA` in §4.5.

pub const SYNC: u8 = 0x7E;
pub const ESCAPE: u8 = 0x0F;

/// Appends `payload` to `out`, replacing every `SYNC` or `ESCAPE` byte
/// with the two-byte escape pair `{ESCAPE, byte}` (S4).
pub fn escape_into(payload: &[u8], out: &mut Vec<u8>) {
    for &b in payload {
        if b == SYNC || b == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(b);
    }
}

/// Inverts [`escape_into`]. Returns `None` on a dangling escape prefix at
/// the end of `bytes` (an incomplete frame).
pub fn unescape(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    while let Some(b) = iter.next() {
        if b == ESCAPE {
            out.push(iter.next()?);
        } else {
            out.push(b);
        }
    }
    Some(out)
}

/// `-Σ bytes mod 256` (§6): the two's-complement byte checksum shared by
/// the code-packet header and message trailer.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
        .wrapping_neg()
}

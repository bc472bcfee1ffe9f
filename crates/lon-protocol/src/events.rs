//! Events the protocol engine hands back to its caller (`lon-app`'s event
//! dispatch, C11) after each pump iteration.

use crate::address::WireAddress;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// Exactly one is delivered per `send_msg`/`propagate` that returned
    /// success (§8 invariants 1, 2).
    MsgCompleted { tag: u32, success: bool },
    ResponseArrived { tag: u32, source: WireAddress, data: Vec<u8> },
    MsgArrived {
        correlator: u32,
        source: WireAddress,
        tid: u8,
        authenticated: bool,
        wants_response: bool,
        payload: Vec<u8>,
    },
    ServicePin { unique_id: [u8; 6], program_id: [u8; 8] },
    Wink,
}

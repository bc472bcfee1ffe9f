//! Public API & event dispatch (C11, §6, §9): a table of optional
//! capability interfaces the host application registers into. Each event
//! fires `if let Some(cb) = ... { cb(...) }`; no inheritance hierarchy
//! needed (§9 Design notes).

use lon_persist::Segment;

use crate::lifecycle::ServiceLed;

/// One correlator's worth of context for a `msg_arrived` callback to
/// answer with `send_response`/`release_correlator` (§8 invariant 3).
#[derive(Debug, Clone)]
pub struct MsgArrivedInfo {
    pub correlator: u32,
    pub source_subnet: u8,
    pub source_node: u8,
    pub tid: u8,
    pub authenticated: bool,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ResponseArrivedInfo {
    pub tag: u32,
    pub source_subnet: u8,
    pub source_node: u8,
    pub data: Vec<u8>,
}

type BoxedFn<Args> = Box<dyn FnMut(Args) + Send>;

/// Persistent segment capability interface: the host supplies the flash
/// operations this crate never performs itself (§4.1, §9 `open/close/
/// read/write/enter-tx/exit-tx/is-in-tx`).
pub trait PersistentSegmentHandler: Send {
    fn open_for_read(&mut self, segment: Segment) -> Option<Vec<u8>>;
    fn open_for_write(&mut self, segment: Segment, size: usize) -> bool;
    fn write(&mut self, segment: Segment, offset: usize, bytes: &[u8]) -> bool;
    fn read(&mut self, segment: Segment, offset: usize, buf: &mut [u8]) -> bool;
    fn close(&mut self, segment: Segment);
    fn enter_transaction(&mut self, segment: Segment);
    fn exit_transaction(&mut self, segment: Segment) -> bool;
    fn is_in_transaction(&self, segment: Segment) -> bool;
}

/// One currently-bound handler per callback slot; registering replaces the
/// previous handler, `unregister_*` clears it (§6 "Each callback has one
/// currently-bound handler; the registrar replaces or unregisters.").
#[derive(Default)]
pub struct CallbackTable {
    pub on_reset: Option<BoxedFn<()>>,
    pub on_wink: Option<BoxedFn<()>>,
    pub on_online: Option<BoxedFn<()>>,
    pub on_offline: Option<BoxedFn<()>>,
    pub on_service_pin_pressed: Option<BoxedFn<()>>,
    pub on_service_pin_held: Option<BoxedFn<()>>,
    pub on_datapoint_update_occurred: Option<BoxedFn<u16>>,
    pub on_datapoint_update_completed: Option<BoxedFn<(u16, bool)>>,
    pub on_msg_arrived: Option<BoxedFn<MsgArrivedInfo>>,
    pub on_response_arrived: Option<BoxedFn<ResponseArrivedInfo>>,
    pub on_msg_completed: Option<BoxedFn<(u32, bool)>>,
    pub on_memory_read: Option<BoxedFn<(u16, usize)>>,
    pub on_memory_write: Option<BoxedFn<(u16, Vec<u8>)>>,
    pub on_service_led_status: Option<BoxedFn<ServiceLed>>,
    pub get_current_datapoint_size: Option<Box<dyn FnMut(u16) -> Option<usize> + Send>>,
    /// `Some(false)` suppresses delivery of the event this round (§6
    /// `IzotFilterMsgArrived`/`IzotFilterResponseArrived`/
    /// `IzotFilterMsgCompleted`: a filter callback that returns `false`
    /// means "don't deliver this one").
    pub filter_msg_arrived: Option<Box<dyn FnMut(&MsgArrivedInfo) -> bool + Send>>,
    pub filter_response_arrived: Option<Box<dyn FnMut(&ResponseArrivedInfo) -> bool + Send>>,
    pub filter_msg_completed: Option<Box<dyn FnMut(u32, bool) -> bool + Send>>,
    pub persistent_segment_handler: Option<Box<dyn PersistentSegmentHandler>>,
    pub serialize_app_data: Option<Box<dyn FnMut() -> Vec<u8> + Send>>,
    pub deserialize_app_data: Option<Box<dyn FnMut(&[u8]) + Send>>,
}

impl CallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire_reset(&mut self) {
        if let Some(cb) = &mut self.on_reset {
            cb(());
        }
    }

    pub fn fire_wink(&mut self) {
        if let Some(cb) = &mut self.on_wink {
            cb(());
        }
    }

    pub fn fire_online(&mut self) {
        if let Some(cb) = &mut self.on_online {
            cb(());
        }
    }

    pub fn fire_offline(&mut self) {
        if let Some(cb) = &mut self.on_offline {
            cb(());
        }
    }

    pub fn fire_service_pin_pressed(&mut self) {
        if let Some(cb) = &mut self.on_service_pin_pressed {
            cb(());
        }
    }

    pub fn fire_service_pin_held(&mut self) {
        if let Some(cb) = &mut self.on_service_pin_held {
            cb(());
        }
    }

    pub fn fire_datapoint_update_occurred(&mut self, index: u16) {
        if let Some(cb) = &mut self.on_datapoint_update_occurred {
            cb(index);
        }
    }

    pub fn fire_datapoint_update_completed(&mut self, index: u16, success: bool) {
        if let Some(cb) = &mut self.on_datapoint_update_completed {
            cb((index, success));
        }
    }

    /// Delivers `msg_arrived` unless a registered filter callback vetoes
    /// it first.
    pub fn fire_msg_arrived(&mut self, info: MsgArrivedInfo) {
        if let Some(filter) = &mut self.filter_msg_arrived {
            if !filter(&info) {
                return;
            }
        }
        if let Some(cb) = &mut self.on_msg_arrived {
            cb(info);
        }
    }

    pub fn fire_response_arrived(&mut self, info: ResponseArrivedInfo) {
        if let Some(filter) = &mut self.filter_response_arrived {
            if !filter(&info) {
                return;
            }
        }
        if let Some(cb) = &mut self.on_response_arrived {
            cb(info);
        }
    }

    pub fn fire_msg_completed(&mut self, tag: u32, success: bool) {
        if let Some(filter) = &mut self.filter_msg_completed {
            if !filter(tag, success) {
                return;
            }
        }
        if let Some(cb) = &mut self.on_msg_completed {
            cb((tag, success));
        }
    }

    pub fn fire_service_led_status(&mut self, led: ServiceLed) {
        if let Some(cb) = &mut self.on_service_led_status {
            cb(led);
        }
    }

    pub fn current_datapoint_size(&mut self, index: u16) -> Option<usize> {
        self.get_current_datapoint_size.as_mut().and_then(|cb| cb(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn unregistered_callback_is_a_silent_no_op() {
        let mut table = CallbackTable::new();
        table.fire_reset();
        table.fire_wink();
    }

    #[test]
    fn registered_callback_fires_with_payload() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let mut table = CallbackTable::new();
        table.on_datapoint_update_occurred = Some(Box::new(move |idx| {
            seen2.lock().unwrap().push(idx);
        }));
        table.fire_datapoint_update_occurred(7);
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn filter_returning_false_suppresses_delivery() {
        let delivered = Arc::new(Mutex::new(false));
        let delivered2 = delivered.clone();
        let mut table = CallbackTable::new();
        table.filter_msg_completed = Some(Box::new(|_, _| false));
        table.on_msg_completed = Some(Box::new(move |_| {
            *delivered2.lock().unwrap() = true;
        }));
        table.fire_msg_completed(1, true);
        assert!(!*delivered.lock().unwrap());
    }

    #[test]
    fn re_registering_replaces_the_previous_handler() {
        let mut table = CallbackTable::new();
        let first = Arc::new(Mutex::new(0));
        let second = Arc::new(Mutex::new(0));
        let f1 = first.clone();
        let f2 = second.clone();
        table.on_wink = Some(Box::new(move |_| *f1.lock().unwrap() += 1));
        table.on_wink = Some(Box::new(move |_| *f2.lock().unwrap() += 1));
        table.fire_wink();
        assert_eq!(*first.lock().unwrap(), 0);
        assert_eq!(*second.lock().unwrap(), 1);
    }
}

//! Device lifecycle state machine (C9, §4.6): the unconfigured/configured,
//! online/offline states, the service LED, and the reset-pending flag that
//! gates a physical reboot on the persistent store having nothing left to
//! flush.

use crate::reset::ResetCause;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    ApplicationUnconfig,
    NoApplicationUnconfig,
    ConfigOffLine,
    ConfigOnLine,
    /// Derived rather than directly settable: reached only by an
    /// `AppOffLine` request while `ConfigOnLine`.
    SoftOffLine,
    StateInvalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    OffLine,
    OnLine,
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLed {
    Blinking,
    Off,
    On,
}

/// Commands the host application or management tooling issues to the
/// lifecycle state machine (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRequest {
    AppOffLine,
    AppOnLine,
    AppReset,
    ChangeState(LifecycleState),
    PhysicalReset,
}

/// Events the lifecycle machine surfaces to the event-dispatch layer
/// (C11) after a `ModeRequest` is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Offline,
    Online,
    Reset { cause: ResetCause },
    ServiceLedChanged(ServiceLed),
    /// `ChangeState` recomputes and persists the configuration checksum;
    /// the actual checksum/commit work lives in `StackContext`, which owns
    /// the configuration image this machine does not.
    ConfigPersistRequested,
    PhysicalResetRequested,
}

#[derive(Debug)]
pub struct DeviceLifecycle {
    state: LifecycleState,
    mode: AppMode,
    reset_cause: ResetCause,
    reset_pending: bool,
    physical_reset_requested: bool,
    service_led: ServiceLed,
}

impl DeviceLifecycle {
    pub fn new(initial: LifecycleState, reset_cause: ResetCause) -> Self {
        Self {
            state: initial,
            mode: if matches!(
                initial,
                LifecycleState::NoApplicationUnconfig | LifecycleState::StateInvalid
            ) {
                AppMode::NotRunning
            } else {
                AppMode::OffLine
            },
            reset_cause,
            reset_pending: false,
            physical_reset_requested: false,
            service_led: Self::service_led_for(initial),
        }
    }

    fn service_led_for(state: LifecycleState) -> ServiceLed {
        match state {
            LifecycleState::ApplicationUnconfig | LifecycleState::StateInvalid => {
                ServiceLed::Blinking
            }
            LifecycleState::ConfigOnLine | LifecycleState::ConfigOffLine | LifecycleState::SoftOffLine => {
                ServiceLed::Off
            }
            LifecycleState::NoApplicationUnconfig => ServiceLed::On,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn service_led(&self) -> ServiceLed {
        self.service_led
    }

    pub fn reset_cause(&self) -> ResetCause {
        self.reset_cause
    }

    pub fn is_reset_pending(&self) -> bool {
        self.reset_pending
    }

    pub fn is_physical_reset_requested(&self) -> bool {
        self.physical_reset_requested
    }

    fn set_state(&mut self, state: LifecycleState, events: &mut Vec<LifecycleEvent>) {
        self.state = state;
        if matches!(
            state,
            LifecycleState::NoApplicationUnconfig | LifecycleState::StateInvalid
        ) {
            self.mode = AppMode::NotRunning;
        }
        let led = Self::service_led_for(state);
        if led != self.service_led {
            self.service_led = led;
            events.push(LifecycleEvent::ServiceLedChanged(led));
        }
        events.push(LifecycleEvent::ConfigPersistRequested);
    }

    /// Applies one `ModeRequest`, returning the events it raised.
    pub fn apply(&mut self, req: ModeRequest) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        match req {
            ModeRequest::AppOffLine => {
                if self.mode != AppMode::NotRunning {
                    events.push(LifecycleEvent::Offline);
                }
                self.mode = AppMode::OffLine;
                if self.state == LifecycleState::ConfigOnLine {
                    self.set_state(LifecycleState::SoftOffLine, &mut events);
                }
            }
            ModeRequest::AppOnLine => {
                events.push(LifecycleEvent::Online);
                self.mode = AppMode::OnLine;
                if self.state == LifecycleState::SoftOffLine {
                    self.set_state(LifecycleState::ConfigOnLine, &mut events);
                }
            }
            ModeRequest::AppReset => {
                self.reset_pending = true;
                self.reset_cause = ResetCause::SoftwareReset;
                events.push(LifecycleEvent::Reset {
                    cause: ResetCause::SoftwareReset,
                });
            }
            ModeRequest::ChangeState(s) => self.set_state(s, &mut events),
            ModeRequest::PhysicalReset => {
                self.physical_reset_requested = true;
                events.push(LifecycleEvent::PhysicalResetRequested);
            }
        }
        events
    }

    /// True once it is safe to actually reboot the board: a physical reset
    /// was requested and no persistent commit is still scheduled (so a
    /// dirty segment is never lost on reset, §4.6).
    pub fn ready_for_board_reboot(&self, persistent_commit_scheduled: bool) -> bool {
        self.physical_reset_requested && !persistent_commit_scheduled
    }
}

//! Unified adapter state.
//!
//! The driver reports three independent signals: ambient authorization
//! status, raw power state, and whether a scan is running. The state machine
//! reduces the latest value of each into one externally-observable
//! [`AdapterState`], recomputed from scratch on every signal.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

// ----------------------------------------------------------------------------
// Raw Driver Signals
// ----------------------------------------------------------------------------

/// Ambient authorization status reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    NotDetermined,
    /// Access is blocked by device policy.
    Restricted,
    /// The user explicitly denied access.
    Denied,
    /// Access is granted.
    Allowed,
    /// The driver could not classify the platform's answer.
    Unknown,
}

/// Raw adapter power state reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    /// The driver has not reported yet.
    Unknown,
    /// The system service connection was momentarily lost.
    Resetting,
    /// The platform has no usable BLE adapter.
    Unsupported,
    /// The adapter is powered off.
    PoweredOff,
    /// The adapter is powered on.
    PoweredOn,
}

// ----------------------------------------------------------------------------
// Unified State
// ----------------------------------------------------------------------------

/// Why the adapter is unauthorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnauthorizedReason {
    /// The user has not been asked yet.
    NotDetermined,
    /// The user explicitly denied access.
    Denied,
    /// Access is blocked by device policy.
    Restricted,
}

/// The single externally-observable state of the central service.
///
/// Exactly one value is current at any time. Authorization problems win over
/// everything; an active scan wins over the raw power state (a scanning
/// adapter is necessarily powered on, so `Scanning` is the higher state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterState {
    /// The driver has not reported enough to classify the adapter.
    Unknown,
    /// The application is not authorized to use Bluetooth.
    Unauthorized(UnauthorizedReason),
    /// The platform has no usable BLE adapter.
    Unsupported,
    /// The adapter is powered off.
    PoweredOff,
    /// The system service connection was momentarily lost.
    Resetting,
    /// Powered on and idle; scanning may be started.
    Ready,
    /// A scan is running and sightings are being delivered.
    Scanning,
}

impl AdapterState {
    /// Whether a scan request is currently meaningful.
    pub fn is_ready(&self) -> bool {
        matches!(self, AdapterState::Ready)
    }

    /// Whether a scan is currently running.
    pub fn is_scanning(&self) -> bool {
        matches!(self, AdapterState::Scanning)
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AdapterState::Unknown => "Unknown",
            AdapterState::Unauthorized(UnauthorizedReason::NotDetermined) => "Not Authorized",
            AdapterState::Unauthorized(UnauthorizedReason::Denied) => "Denied",
            AdapterState::Unauthorized(UnauthorizedReason::Restricted) => "Restricted",
            AdapterState::Unsupported => "Unsupported",
            AdapterState::PoweredOff => "Powered Off",
            AdapterState::Resetting => "Resetting",
            AdapterState::Ready => "Ready",
            AdapterState::Scanning => "Scanning",
        };
        write!(f, "{}", text)
    }
}

/// Reduce the latest raw signals into the unified state.
///
/// Precedence: authorization problems, then the active-scanning flag, then
/// the raw power state. The scanning flag only produces `Scanning` while the
/// adapter is powered on; a stale flag left over from before a power drop
/// must not mask `PoweredOff`.
pub fn unified_state(
    authorization: AuthorizationStatus,
    power: PowerState,
    scanning: bool,
) -> AdapterState {
    match authorization {
        AuthorizationStatus::NotDetermined => {
            return AdapterState::Unauthorized(UnauthorizedReason::NotDetermined)
        }
        AuthorizationStatus::Denied => {
            return AdapterState::Unauthorized(UnauthorizedReason::Denied)
        }
        AuthorizationStatus::Restricted => {
            return AdapterState::Unauthorized(UnauthorizedReason::Restricted)
        }
        AuthorizationStatus::Allowed | AuthorizationStatus::Unknown => {}
    }

    if scanning && power == PowerState::PoweredOn {
        return AdapterState::Scanning;
    }

    match power {
        PowerState::PoweredOn => AdapterState::Ready,
        PowerState::PoweredOff => AdapterState::PoweredOff,
        PowerState::Resetting => AdapterState::Resetting,
        PowerState::Unsupported => AdapterState::Unsupported,
        PowerState::Unknown => AdapterState::Unknown,
    }
}

// ----------------------------------------------------------------------------
// State Machine
// ----------------------------------------------------------------------------

struct Inputs {
    authorization: AuthorizationStatus,
    power: PowerState,
    scanning: bool,
    current: AdapterState,
}

/// Owns the unified state and republishes it on every driver signal.
///
/// Every signal produces exactly one publication, including recomputations
/// that leave the value unchanged; subscribers that poll naively still see a
/// tick per input. [`current_state`](AdapterStateMachine::current_state) is a
/// synchronous read that never waits on signal processing beyond the guard.
pub struct AdapterStateMachine {
    inputs: Mutex<Inputs>,
    events: broadcast::Sender<AdapterState>,
}

impl AdapterStateMachine {
    /// Create a state machine from the ambient authorization status.
    ///
    /// The initial state is computed immediately, without side effects: the
    /// power state starts `Unknown` and no scan is assumed.
    pub fn new(authorization: AuthorizationStatus, feed_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(feed_capacity);
        let current = unified_state(authorization, PowerState::Unknown, false);
        Self {
            inputs: Mutex::new(Inputs {
                authorization,
                power: PowerState::Unknown,
                scanning: false,
                current,
            }),
            events,
        }
    }

    /// The latest unified state.
    pub fn current_state(&self) -> AdapterState {
        self.inputs.lock().expect("state machine lock poisoned").current
    }

    /// Subscribe to every state publication.
    pub fn subscribe(&self) -> broadcast::Receiver<AdapterState> {
        self.events.subscribe()
    }

    /// Record a new authorization status and republish.
    pub fn on_authorization_changed(&self, status: AuthorizationStatus) {
        self.apply(|inputs| inputs.authorization = status);
    }

    /// Record a new raw power state and republish.
    pub fn on_power_state_changed(&self, power: PowerState) {
        self.apply(|inputs| inputs.power = power);
    }

    /// Record a change in scanning activity and republish.
    pub fn on_scanning_changed(&self, scanning: bool) {
        self.apply(|inputs| inputs.scanning = scanning);
    }

    // Publication happens while the guard is held so subscribers observe
    // recomputations in the order the signals were applied.
    fn apply(&self, update: impl FnOnce(&mut Inputs)) {
        let mut inputs = self.inputs.lock().expect("state machine lock poisoned");
        update(&mut inputs);
        let next = unified_state(inputs.authorization, inputs.power, inputs.scanning);
        if next != inputs.current {
            debug!(from = %inputs.current, to = %next, "adapter state changed");
        }
        inputs.current = next;
        let _ = self.events.send(next);
    }
}

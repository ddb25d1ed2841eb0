//! Property-based tests for the unified-state precedence rule.
//!
//! For any interleaving of driver signals, the observed state must equal the
//! precedence rule applied to the latest value of each input, and every
//! signal must produce exactly one publication.

use proptest::prelude::*;

use blescout_core::state::{
    unified_state, AdapterState, AdapterStateMachine, AuthorizationStatus, PowerState,
};

#[derive(Debug, Clone, Copy)]
enum Signal {
    Authorization(AuthorizationStatus),
    Power(PowerState),
    Scanning(bool),
}

fn arb_authorization() -> impl Strategy<Value = AuthorizationStatus> {
    prop_oneof![
        Just(AuthorizationStatus::NotDetermined),
        Just(AuthorizationStatus::Restricted),
        Just(AuthorizationStatus::Denied),
        Just(AuthorizationStatus::Allowed),
        Just(AuthorizationStatus::Unknown),
    ]
}

fn arb_power() -> impl Strategy<Value = PowerState> {
    prop_oneof![
        Just(PowerState::Unknown),
        Just(PowerState::Resetting),
        Just(PowerState::Unsupported),
        Just(PowerState::PoweredOff),
        Just(PowerState::PoweredOn),
    ]
}

fn arb_signal() -> impl Strategy<Value = Signal> {
    prop_oneof![
        arb_authorization().prop_map(Signal::Authorization),
        arb_power().prop_map(Signal::Power),
        any::<bool>().prop_map(Signal::Scanning),
    ]
}

proptest! {
    /// The observed state always equals the rule applied to the latest inputs.
    #[test]
    fn state_tracks_latest_inputs(
        initial in arb_authorization(),
        signals in prop::collection::vec(arb_signal(), 0..64),
    ) {
        let machine = AdapterStateMachine::new(initial, 256);

        let mut authorization = initial;
        let mut power = PowerState::Unknown;
        let mut scanning = false;

        for signal in &signals {
            match *signal {
                Signal::Authorization(status) => {
                    authorization = status;
                    machine.on_authorization_changed(status);
                }
                Signal::Power(state) => {
                    power = state;
                    machine.on_power_state_changed(state);
                }
                Signal::Scanning(active) => {
                    scanning = active;
                    machine.on_scanning_changed(active);
                }
            }
            prop_assert_eq!(
                machine.current_state(),
                unified_state(authorization, power, scanning)
            );
        }
    }

    /// Every signal produces exactly one publication.
    #[test]
    fn one_publication_per_signal(
        initial in arb_authorization(),
        signals in prop::collection::vec(arb_signal(), 0..64),
    ) {
        let machine = AdapterStateMachine::new(initial, 256);
        let mut feed = machine.subscribe();

        for signal in &signals {
            match *signal {
                Signal::Authorization(status) => machine.on_authorization_changed(status),
                Signal::Power(state) => machine.on_power_state_changed(state),
                Signal::Scanning(active) => machine.on_scanning_changed(active),
            }
        }

        let mut published = 0usize;
        while feed.try_recv().is_ok() {
            published += 1;
        }
        prop_assert_eq!(published, signals.len());
    }

    /// Scanning is observable only while powered on and actively scanning.
    #[test]
    fn scanning_requires_power(
        authorization in arb_authorization(),
        power in arb_power(),
        scanning in any::<bool>(),
    ) {
        let state = unified_state(authorization, power, scanning);
        if state == AdapterState::Scanning {
            prop_assert_eq!(power, PowerState::PoweredOn);
            prop_assert!(scanning);
        }
    }
}

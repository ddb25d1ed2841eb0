//! Integration tests driving the central service through a scripted driver.


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use blescout_core::{
    keys, AdapterState, AdvertisementData, AdvertisementSighting, AdvertisementValue,
    AuthorizationError, AuthorizationStatus, CentralConfig, CentralService, DriverEvent,
    PeripheralRecord, PowerState, SystemId, UnauthorizedReason,
};
use test_utils::MockDriver;

fn service_with(
    authorization: AuthorizationStatus,
    power: PowerState,
) -> (CentralService, Arc<MockDriver>) {
    let driver = Arc::new(MockDriver::new(authorization, power));
    let service = CentralService::new(driver.clone(), CentralConfig::default());
    (service, driver)
}

async fn next_state(feed: &mut broadcast::Receiver<AdapterState>) -> AdapterState {
    timeout(Duration::from_secs(1), feed.recv())
        .await
        .expect("timed out waiting for a state publication")
        .expect("state feed closed")
}

async fn next_snapshot(
    feed: &mut broadcast::Receiver<Vec<PeripheralRecord>>,
) -> Vec<PeripheralRecord> {
    timeout(Duration::from_secs(1), feed.recv())
        .await
        .expect("timed out waiting for a collection snapshot")
        .expect("collection feed closed")
}

fn named(id: SystemId, name: &str, rssi: i16) -> AdvertisementSighting {
    AdvertisementSighting::new(id, Some(name.to_string()), rssi, AdvertisementData::new())
}

#[tokio::test]
async fn denied_authorization_fails_without_activating_the_driver() {
    let (service, driver) = service_with(AuthorizationStatus::Denied, PowerState::PoweredOn);

    let result = service.request_authorization().await;

    assert_eq!(result, Err(AuthorizationError::Denied));
    assert_eq!(driver.activations(), 0);
    assert_eq!(
        service.current_state(),
        AdapterState::Unauthorized(UnauthorizedReason::Denied)
    );
}

#[tokio::test]
async fn restricted_and_unknown_statuses_map_to_their_errors() {
    let (service, driver) = service_with(AuthorizationStatus::Restricted, PowerState::PoweredOn);
    assert_eq!(
        service.request_authorization().await,
        Err(AuthorizationError::Restricted)
    );
    assert_eq!(driver.activations(), 0);

    let (service, driver) = service_with(AuthorizationStatus::Unknown, PowerState::PoweredOn);
    assert_eq!(
        service.request_authorization().await,
        Err(AuthorizationError::Unknown)
    );
    assert_eq!(driver.activations(), 0);
}

#[tokio::test]
async fn granted_authorization_activates_once_and_reaches_ready() {
    let (service, driver) = service_with(AuthorizationStatus::Allowed, PowerState::PoweredOn);
    assert_eq!(service.current_state(), AdapterState::Unknown);

    let mut states = service.subscribe_state();
    service.request_authorization().await.unwrap();
    assert_eq!(next_state(&mut states).await, AdapterState::Ready);

    // A second request is a no-op on an already-activated driver.
    service.request_authorization().await.unwrap();
    assert_eq!(driver.activations(), 1);
}

#[tokio::test]
async fn undetermined_prompt_outcome_arrives_through_the_state_feed() {
    let (service, driver) = service_with(AuthorizationStatus::NotDetermined, PowerState::Unknown);
    assert_eq!(
        service.current_state(),
        AdapterState::Unauthorized(UnauthorizedReason::NotDetermined)
    );

    let mut states = service.subscribe_state();
    service.request_authorization().await.unwrap();
    assert_eq!(driver.activations(), 1);

    // Activation reports power first; authorization still undetermined.
    assert_eq!(
        next_state(&mut states).await,
        AdapterState::Unauthorized(UnauthorizedReason::NotDetermined)
    );

    // The user accepts the prompt, then the adapter powers up.
    driver.emit(DriverEvent::AuthorizationChanged(AuthorizationStatus::Allowed));
    assert_eq!(next_state(&mut states).await, AdapterState::Unknown);
    driver.emit(DriverEvent::PowerStateChanged(PowerState::PoweredOn));
    assert_eq!(next_state(&mut states).await, AdapterState::Ready);
}

#[tokio::test]
async fn scan_commands_without_an_activated_driver_are_silent_noops() {
    let (service, driver) = service_with(AuthorizationStatus::NotDetermined, PowerState::Unknown);

    service.start_scan(None).await;
    service.stop_scan().await;

    assert!(driver.scan_requests().is_empty());
    assert_eq!(driver.stop_requests(), 0);
    assert_eq!(
        service.current_state(),
        AdapterState::Unauthorized(UnauthorizedReason::NotDetermined)
    );
}

#[tokio::test]
async fn scan_lifecycle_transitions_between_ready_and_scanning() {
    let (service, _driver) = service_with(AuthorizationStatus::Allowed, PowerState::PoweredOn);
    let mut states = service.subscribe_state();

    service.request_authorization().await.unwrap();
    assert_eq!(next_state(&mut states).await, AdapterState::Ready);

    service.start_scan(None).await;
    assert_eq!(next_state(&mut states).await, AdapterState::Scanning);

    service.stop_scan().await;
    assert_eq!(next_state(&mut states).await, AdapterState::Ready);
}

#[tokio::test]
async fn restarting_a_scan_replaces_the_filter() {
    let (service, driver) = service_with(AuthorizationStatus::Allowed, PowerState::PoweredOn);
    let mut states = service.subscribe_state();
    service.request_authorization().await.unwrap();
    assert_eq!(next_state(&mut states).await, AdapterState::Ready);

    let heart_rate = blescout_core::ServiceId::new(uuid::Uuid::new_v4());
    service.start_scan(None).await;
    service.start_scan(Some(vec![heart_rate])).await;

    assert_eq!(
        driver.scan_requests(),
        vec![None, Some(vec![heart_rate])]
    );
    assert_eq!(next_state(&mut states).await, AdapterState::Scanning);
    assert_eq!(next_state(&mut states).await, AdapterState::Scanning);
}

#[tokio::test]
async fn sightings_flow_into_both_feeds_in_order() {
    let (service, driver) = service_with(AuthorizationStatus::Allowed, PowerState::PoweredOn);
    let mut sightings = service.subscribe_sightings();
    let mut collections = service.subscribe_peripherals();

    service.request_authorization().await.unwrap();
    service.start_scan(None).await;

    let fridge = SystemId::random();
    driver.emit(DriverEvent::Sighting(named(fridge, "Fridge", -40)));
    driver.emit(DriverEvent::Sighting(named(fridge, "Fridge", -55)));

    let first = timeout(Duration::from_secs(1), sightings.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.signal_strength, -40);

    let snapshot = next_snapshot(&mut collections).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].last_signal_strength(), Some(-40));

    let snapshot = next_snapshot(&mut collections).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].last_signal_strength(), Some(-55));
}

#[tokio::test]
async fn discovery_scenario_builds_the_expected_collection() {
    let (service, driver) = service_with(AuthorizationStatus::Allowed, PowerState::PoweredOn);
    let mut collections = service.subscribe_peripherals();

    service.request_authorization().await.unwrap();
    service.start_scan(None).await;

    let u1 = SystemId::random();
    let u2 = SystemId::random();
    driver.emit(DriverEvent::Sighting(named(u1, "Fridge", -40)));
    driver.emit(DriverEvent::Sighting(named(u1, "Fridge", -55)));
    let lamp = AdvertisementSighting::new(
        u2,
        None,
        -70,
        AdvertisementData::new().with(keys::LOCAL_NAME, AdvertisementValue::Text("Lamp".into())),
    );
    driver.emit(DriverEvent::Sighting(lamp));

    let mut snapshot = Vec::new();
    for _ in 0..3 {
        snapshot = next_snapshot(&mut collections).await;
    }

    assert_eq!(snapshot.len(), 2);
    let fridge = snapshot.iter().find(|r| r.identity() == "Fridge").unwrap();
    assert_eq!(fridge.system_id(), Some(u1));
    assert_eq!(fridge.last_signal_strength(), Some(-55));
    let lamp = snapshot.iter().find(|r| r.identity() == "Lamp").unwrap();
    assert_eq!(lamp.system_id(), Some(u2));
    assert_eq!(lamp.last_signal_strength(), Some(-70));
}

#[tokio::test]
async fn invalidate_and_refresh_operate_through_the_facade() {
    let (service, driver) = service_with(AuthorizationStatus::Allowed, PowerState::PoweredOn);
    let mut collections = service.subscribe_peripherals();

    service.request_authorization().await.unwrap();
    service.start_scan(None).await;

    let id = SystemId::random();
    driver.emit(DriverEvent::Sighting(named(id, "Sensor", -50)));
    next_snapshot(&mut collections).await;

    service.invalidate_all();
    let snapshot = next_snapshot(&mut collections).await;
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[0].system_id().is_none());

    service.refresh(&[id]);
    let snapshot = next_snapshot(&mut collections).await;
    assert_eq!(snapshot[0].system_id(), Some(id));
}

//! btleplug-backed [`CentralDriver`] implementation.
//!
//! This crate is the interface plumbing between blescout's driver contract
//! and the cross-platform btleplug central API: adapter bring-up, the
//! `CentralEvent` stream, and scan commands. All discovery and state logic
//! lives in `blescout-core`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use blescout_btleplug::BtleplugDriver;
//! use blescout_core::{CentralConfig, CentralService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = Arc::new(BtleplugDriver::new());
//! let service = CentralService::new(driver, CentralConfig::default());
//!
//! service.request_authorization().await?;
//! service.start_scan(None).await;
//!
//! let mut peripherals = service.subscribe_peripherals();
//! while let Ok(snapshot) = peripherals.recv().await {
//!     for record in &snapshot {
//!         println!("{}", record);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, CentralState, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use blescout_core::advertisement::{keys, AdvertisementData, AdvertisementSighting, AdvertisementValue};
use blescout_core::driver::{CentralDriver, DriverEvent, DriverEventSender};
use blescout_core::state::{AuthorizationStatus, PowerState};
use blescout_core::types::{ServiceId, SystemId};

// ----------------------------------------------------------------------------
// Driver Implementation
// ----------------------------------------------------------------------------

struct DriverInner {
    adapter: Option<Adapter>,
    events: Option<DriverEventSender>,
    relay: Option<JoinHandle<()>>,
    scanning: bool,
}

/// A [`CentralDriver`] over the first btleplug adapter on the host.
///
/// btleplug exposes no authorization surface, so the ambient status is always
/// reported as allowed and the unified state is driven by power signals
/// alone. btleplug also surfaces no initial state snapshot; a successfully
/// acquired adapter is reported as powered on, and later `StateUpdate`
/// events correct it.
pub struct BtleplugDriver {
    inner: Mutex<DriverInner>,
}

impl BtleplugDriver {
    /// Create an inactive driver. Nothing touches the platform until
    /// [`CentralDriver::activate`] is called.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(DriverInner {
                adapter: None,
                events: None,
                relay: None,
                scanning: false,
            }),
        }
    }
}

impl Default for BtleplugDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CentralDriver for BtleplugDriver {
    fn authorization_status(&self) -> AuthorizationStatus {
        AuthorizationStatus::Allowed
    }

    async fn activate(&self, events: DriverEventSender) {
        let mut inner = self.inner.lock().await;
        if inner.events.is_some() {
            return;
        }
        inner.events = Some(events.clone());

        let manager = match Manager::new().await {
            Ok(manager) => manager,
            Err(e) => {
                warn!(error = %e, "failed to create BLE manager");
                let _ = events.send(DriverEvent::PowerStateChanged(PowerState::Unsupported));
                return;
            }
        };

        let adapter = match manager.adapters().await {
            Ok(adapters) => match adapters.into_iter().next() {
                Some(adapter) => adapter,
                None => {
                    warn!("no BLE adapters available");
                    let _ = events.send(DriverEvent::PowerStateChanged(PowerState::Unsupported));
                    return;
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to enumerate BLE adapters");
                let _ = events.send(DriverEvent::PowerStateChanged(PowerState::Unsupported));
                return;
            }
        };

        let stream = match adapter.events().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "failed to open adapter event stream");
                let _ = events.send(DriverEvent::PowerStateChanged(PowerState::Unknown));
                return;
            }
        };

        let relay_adapter = adapter.clone();
        let relay_events = events.clone();
        let relay = tokio::spawn(async move {
            let mut stream = stream;
            while let Some(event) = stream.next().await {
                let forwarded = match event {
                    CentralEvent::StateUpdate(state) => {
                        Some(DriverEvent::PowerStateChanged(map_power(state)))
                    }
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        read_sighting(&relay_adapter, &id).await.map(DriverEvent::Sighting)
                    }
                    _ => None,
                };
                if let Some(event) = forwarded {
                    if relay_events.send(event).is_err() {
                        break;
                    }
                }
            }
            debug!("adapter event stream ended");
        });

        inner.adapter = Some(adapter);
        inner.relay = Some(relay);
        let _ = events.send(DriverEvent::PowerStateChanged(PowerState::PoweredOn));
        debug!("btleplug adapter activated");
    }

    async fn start_scan(&self, filter: Option<Vec<ServiceId>>) {
        let mut inner = self.inner.lock().await;
        let Some(adapter) = inner.adapter.clone() else {
            warn!("scan requested before an adapter is available");
            return;
        };

        // Restart semantics: a running scan is replaced, not rejected.
        if inner.scanning {
            if let Err(e) = adapter.stop_scan().await {
                warn!(error = %e, "failed to stop previous scan");
            }
        }

        let scan_filter = match &filter {
            Some(ids) => ScanFilter {
                services: ids.iter().map(|id| *id.as_uuid()).collect(),
            },
            None => ScanFilter::default(),
        };

        match adapter.start_scan(scan_filter).await {
            Ok(()) => {
                inner.scanning = true;
                if let Some(events) = &inner.events {
                    let _ = events.send(DriverEvent::ScanningChanged(true));
                }
            }
            Err(e) => warn!(error = %e, "failed to start scan"),
        }
    }

    async fn stop_scan(&self) {
        let mut inner = self.inner.lock().await;
        let Some(adapter) = inner.adapter.clone() else {
            warn!("scan stop requested before an adapter is available");
            return;
        };

        match adapter.stop_scan().await {
            Ok(()) => {
                inner.scanning = false;
                if let Some(events) = &inner.events {
                    let _ = events.send(DriverEvent::ScanningChanged(false));
                }
            }
            Err(e) => warn!(error = %e, "failed to stop scan"),
        }
    }
}

impl Drop for BtleplugDriver {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.try_lock() {
            if let Some(relay) = &inner.relay {
                relay.abort();
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Event Mapping
// ----------------------------------------------------------------------------

fn map_power(state: CentralState) -> PowerState {
    match state {
        CentralState::PoweredOn => PowerState::PoweredOn,
        CentralState::PoweredOff => PowerState::PoweredOff,
        _ => PowerState::Unknown,
    }
}

/// Build a sighting from the peripheral's current advertisement properties.
///
/// Advertisements btleplug surfaces without a signal strength are dropped;
/// a sighting's RSSI is what freshens a peripheral record.
async fn read_sighting(adapter: &Adapter, id: &PeripheralId) -> Option<AdvertisementSighting> {
    let peripheral = adapter.peripheral(id).await.ok()?;
    let properties = peripheral.properties().await.ok()??;
    let rssi = properties.rssi?;

    let mut attributes = AdvertisementData::new();
    if let Some(name) = &properties.local_name {
        attributes.insert(keys::LOCAL_NAME, AdvertisementValue::Text(name.clone()));
    }
    if !properties.services.is_empty() {
        attributes.insert(
            keys::SERVICE_IDS,
            AdvertisementValue::ServiceList(
                properties.services.iter().copied().map(ServiceId::new).collect(),
            ),
        );
    }
    if !properties.manufacturer_data.is_empty() {
        attributes.insert(
            keys::MANUFACTURER_DATA,
            AdvertisementValue::Bytes(flatten_manufacturer_data(&properties.manufacturer_data)),
        );
    }
    if let Some(tx_power) = properties.tx_power_level {
        attributes.insert(keys::TX_POWER, AdvertisementValue::Integer(tx_power as i64));
    }

    Some(AdvertisementSighting::new(
        SystemId::from_opaque(&id.to_string()),
        properties.local_name.clone(),
        rssi,
        attributes,
    ))
}

/// Flatten btleplug's per-company manufacturer data map into the on-air
/// layout: little-endian company identifier followed by its payload, sorted
/// by company identifier for determinism.
fn flatten_manufacturer_data(data: &std::collections::HashMap<u16, Vec<u8>>) -> Vec<u8> {
    let mut entries: Vec<_> = data.iter().collect();
    entries.sort_by_key(|(company, _)| **company);

    let mut bytes = Vec::new();
    for (company, payload) in entries {
        bytes.extend_from_slice(&company.to_le_bytes());
        bytes.extend_from_slice(payload);
    }
    bytes
}

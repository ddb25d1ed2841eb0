//! The contract between the central service and the platform BLE driver.
//!
//! The driver is an external collaborator: it executes scan commands and
//! delivers discrete notifications from its own task. The core never assumes
//! an ordering between a command and the signals it eventually produces; the
//! effect of a command is observed only through the event channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::advertisement::AdvertisementSighting;
use crate::state::{AuthorizationStatus, PowerState};
use crate::types::ServiceId;

// ----------------------------------------------------------------------------
// Driver Events
// ----------------------------------------------------------------------------

/// A notification from the platform driver.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// The adapter's raw power state changed.
    PowerStateChanged(PowerState),
    /// The ambient authorization status changed, e.g. after a prompt.
    AuthorizationChanged(AuthorizationStatus),
    /// Scanning started or stopped, as confirmed by the driver.
    ScanningChanged(bool),
    /// One advertisement was received during a scan.
    Sighting(AdvertisementSighting),
}

/// Sender half the driver uses to deliver its notifications.
pub type DriverEventSender = mpsc::UnboundedSender<DriverEvent>;

// ----------------------------------------------------------------------------
// Driver Contract
// ----------------------------------------------------------------------------

/// A platform BLE central driver.
///
/// Command methods are infallible by design: a driver-level failure is
/// reported through the event channel (and logged), never returned, because
/// the caller already observes the resulting state transition.
#[async_trait]
pub trait CentralDriver: Send + Sync {
    /// Probe the ambient authorization status without side effects.
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Bring the driver up and begin delivering events on `events`.
    ///
    /// On platforms that gate Bluetooth behind a user prompt, activation is
    /// what triggers it when the status is still undetermined; the outcome
    /// arrives later as [`DriverEvent::AuthorizationChanged`]. Activating an
    /// already-active driver is a no-op.
    async fn activate(&self, events: DriverEventSender);

    /// Start (or restart, replacing the filter) a scan.
    ///
    /// `filter` limits sightings to devices advertising one of the given
    /// services; `None` scans for everything. Confirmation arrives as
    /// [`DriverEvent::ScanningChanged`].
    async fn start_scan(&self, filter: Option<Vec<ServiceId>>);

    /// Stop a running scan. Confirmation arrives as
    /// [`DriverEvent::ScanningChanged`].
    async fn stop_scan(&self);
}

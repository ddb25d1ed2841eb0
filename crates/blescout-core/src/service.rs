//! The central service façade.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::advertisement::AdvertisementSighting;
use crate::config::CentralConfig;
use crate::driver::{CentralDriver, DriverEvent};
use crate::error::AuthorizationError;
use crate::peripheral::PeripheralRecord;
use crate::registry::DiscoveryRegistry;
use crate::state::{AdapterState, AdapterStateMachine, AuthorizationStatus};
use crate::types::{ServiceId, SystemId};

// ----------------------------------------------------------------------------
// Central Service
// ----------------------------------------------------------------------------

struct Activation {
    active: bool,
    pump: Option<JoinHandle<()>>,
}

/// The public entry point: composes the state machine, the discovery
/// registry and the platform driver behind one command/query/subscribe
/// surface.
///
/// Construction is side-effect free: the initial state is computed from the
/// ambient authorization status and nothing is prompted or spun up until
/// [`request_authorization`](CentralService::request_authorization) is
/// called. The integrating application builds one service at startup and
/// hands out references; there is no process-wide default instance.
pub struct CentralService {
    driver: Arc<dyn CentralDriver>,
    states: Arc<AdapterStateMachine>,
    registry: Arc<DiscoveryRegistry>,
    sightings: broadcast::Sender<AdvertisementSighting>,
    activation: Mutex<Activation>,
}

impl CentralService {
    /// Create a service over the given driver. Never fails.
    pub fn new(driver: Arc<dyn CentralDriver>, config: CentralConfig) -> Self {
        let states = Arc::new(AdapterStateMachine::new(
            driver.authorization_status(),
            config.state_feed_capacity,
        ));
        let registry = Arc::new(DiscoveryRegistry::new(
            config.name_attribute.clone(),
            config.collection_feed_capacity,
        ));
        let (sightings, _) = broadcast::channel(config.sighting_feed_capacity);

        Self {
            driver,
            states,
            registry,
            sightings,
            activation: Mutex::new(Activation {
                active: false,
                pump: None,
            }),
        }
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// The latest unified adapter state. Non-blocking.
    pub fn current_state(&self) -> AdapterState {
        self.states.current_state()
    }

    /// Subscribe to every state recomputation, including no-op ones.
    pub fn subscribe_state(&self) -> broadcast::Receiver<AdapterState> {
        self.states.subscribe()
    }

    /// Request authorization to use Bluetooth.
    ///
    /// When the status is still undetermined this activates the driver,
    /// which triggers the platform prompt; the outcome is observed through
    /// the state feed. When access was already granted this only ensures the
    /// driver is activated. Denied, restricted and unclassifiable statuses
    /// fail without touching the driver.
    pub async fn request_authorization(&self) -> Result<(), AuthorizationError> {
        info!("requesting bluetooth authorization");
        match self.driver.authorization_status() {
            AuthorizationStatus::NotDetermined | AuthorizationStatus::Allowed => {
                self.ensure_active().await;
                Ok(())
            }
            AuthorizationStatus::Denied => Err(AuthorizationError::Denied),
            AuthorizationStatus::Restricted => Err(AuthorizationError::Restricted),
            AuthorizationStatus::Unknown => Err(AuthorizationError::Unknown),
        }
    }

    // ------------------------------------------------------------------
    // Scanning
    // ------------------------------------------------------------------

    /// Start (or restart with a new filter) scanning for peripherals.
    ///
    /// Meaningful only in the `Ready` state; whether scanning may be started
    /// is a state query that belongs to the caller, so an inactive driver
    /// makes this a logged no-op rather than an error. The transition to
    /// [`AdapterState::Scanning`] happens once the driver confirms.
    pub async fn start_scan(&self, filter: Option<Vec<ServiceId>>) {
        if !self.is_active() {
            warn!("attempted to start scan without an activated driver");
            return;
        }
        debug!(services = ?filter.as_ref().map(Vec::len), "starting scan");
        self.driver.start_scan(filter).await;
    }

    /// Stop scanning. The state leaves `Scanning` once the driver confirms.
    pub async fn stop_scan(&self) {
        if !self.is_active() {
            warn!("attempted to stop scan without an activated driver");
            return;
        }
        self.driver.stop_scan().await;
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Subscribe to individual sightings as they arrive.
    pub fn subscribe_sightings(&self) -> broadcast::Receiver<AdvertisementSighting> {
        self.sightings.subscribe()
    }

    /// Subscribe to full-collection snapshots, published after every
    /// registry mutation.
    pub fn subscribe_peripherals(&self) -> broadcast::Receiver<Vec<PeripheralRecord>> {
        self.registry.subscribe()
    }

    /// A copy of the current peripheral collection.
    pub fn peripherals(&self) -> Vec<PeripheralRecord> {
        self.registry.snapshot()
    }

    /// Sever all live driver linkages, e.g. after a driver reset.
    pub fn invalidate_all(&self) {
        self.registry.invalidate_all();
    }

    /// Re-link records whose remembered identifier appears in `live`.
    pub fn refresh(&self, live: &[SystemId]) {
        self.registry.refresh(live);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn is_active(&self) -> bool {
        self.activation.lock().expect("activation lock poisoned").active
    }

    async fn ensure_active(&self) {
        let events = {
            let mut activation = self.activation.lock().expect("activation lock poisoned");
            if activation.active {
                return;
            }
            activation.active = true;
            let (tx, rx) = mpsc::unbounded_channel();
            activation.pump = Some(self.spawn_pump(rx));
            tx
        };
        info!("activating central driver");
        self.driver.activate(events).await;
    }

    // One pump task serializes all driver notifications, so state
    // recomputations and sighting resolutions are each observed in delivery
    // order.
    fn spawn_pump(&self, mut events: mpsc::UnboundedReceiver<DriverEvent>) -> JoinHandle<()> {
        let states = Arc::clone(&self.states);
        let registry = Arc::clone(&self.registry);
        let sightings = self.sightings.clone();

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    DriverEvent::PowerStateChanged(power) => {
                        states.on_power_state_changed(power);
                    }
                    DriverEvent::AuthorizationChanged(status) => {
                        states.on_authorization_changed(status);
                    }
                    DriverEvent::ScanningChanged(scanning) => {
                        states.on_scanning_changed(scanning);
                    }
                    DriverEvent::Sighting(sighting) => {
                        let _ = sightings.send(sighting.clone());
                        registry.resolve(&sighting);
                    }
                }
            }
            debug!("driver event channel closed, pump exiting");
        })
    }
}

impl Drop for CentralService {
    fn drop(&mut self) {
        if let Ok(mut activation) = self.activation.lock() {
            if let Some(pump) = activation.pump.take() {
                pump.abort();
            }
        }
    }
}

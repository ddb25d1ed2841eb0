//! Host-side abstraction over a BLE central role.
//!
//! blescout normalizes a platform BLE adapter's raw power and authorization
//! signals into a single coherent state machine, manages the scan lifecycle,
//! and resolves streams of advertisement sightings into a deduplicated,
//! continuously-updated collection of known peripherals.
//!
//! ## Architecture
//!
//! - [`state`] - raw driver signals and the unified [`AdapterState`] machine
//! - [`advertisement`] - typed advertisement payloads and raw sightings
//! - [`peripheral`] - durable per-device records
//! - [`registry`] - sighting resolution into the peripheral collection
//! - [`driver`] - the contract a platform driver implements
//! - [`service`] - the [`CentralService`] façade applications talk to
//! - [`config`] - service configuration
//! - [`error`] - the (narrow) error surface
//!
//! The platform driver itself lives outside this crate; `blescout-btleplug`
//! provides the btleplug-backed implementation, and any
//! [`CentralDriver`] can be substituted, which is how the test suite drives
//! the service with scripted signals.

pub mod advertisement;
pub mod config;
pub mod driver;
pub mod error;
pub mod peripheral;
pub mod registry;
pub mod service;
pub mod state;
pub mod types;

// Public API exports
pub use advertisement::{keys, AdvertisementData, AdvertisementSighting, AdvertisementValue};
pub use config::CentralConfig;
pub use driver::{CentralDriver, DriverEvent, DriverEventSender};
pub use error::AuthorizationError;
pub use peripheral::PeripheralRecord;
pub use registry::DiscoveryRegistry;
pub use service::CentralService;
pub use state::{
    AdapterState, AdapterStateMachine, AuthorizationStatus, PowerState, UnauthorizedReason,
};
pub use types::{ServiceId, SystemId, Timestamp};

//! Central service configuration.

use serde::{Deserialize, Serialize};

use crate::advertisement::keys;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for [`CentralService`](crate::service::CentralService).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentralConfig {
    /// Capacity of the adapter-state feed.
    pub state_feed_capacity: usize,
    /// Capacity of the per-sighting feed. Sightings arrive at advertisement
    /// rate, so this feed is the deepest.
    pub sighting_feed_capacity: usize,
    /// Capacity of the full-collection feed.
    pub collection_feed_capacity: usize,
    /// Payload attribute consulted for identity derivation when a sighting
    /// carries no advertised name.
    pub name_attribute: String,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            state_feed_capacity: 32,
            sighting_feed_capacity: 256,
            collection_feed_capacity: 32,
            name_attribute: keys::LOCAL_NAME.to_string(),
        }
    }
}

impl CentralConfig {
    /// Create a configuration with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the adapter-state feed capacity.
    pub fn with_state_feed_capacity(mut self, capacity: usize) -> Self {
        self.state_feed_capacity = capacity;
        self
    }

    /// Set the per-sighting feed capacity.
    pub fn with_sighting_feed_capacity(mut self, capacity: usize) -> Self {
        self.sighting_feed_capacity = capacity;
        self
    }

    /// Set the full-collection feed capacity.
    pub fn with_collection_feed_capacity(mut self, capacity: usize) -> Self {
        self.collection_feed_capacity = capacity;
        self
    }

    /// Set the identity-fallback payload attribute.
    pub fn with_name_attribute(mut self, key: impl Into<String>) -> Self {
        self.name_attribute = key.into();
        self
    }
}

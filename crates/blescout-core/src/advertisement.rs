//! Advertisement payloads and raw sightings.
//!
//! Advertisement payloads arrive from the driver as a free-form key/value
//! bag. Rather than exposing untyped lookups, the payload is modeled as a
//! closed variant map so consumers get checked accessors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ServiceId, SystemId, Timestamp};

/// Well-known advertisement attribute keys.
pub mod keys {
    /// Local name carried in the advertisement payload.
    pub const LOCAL_NAME: &str = "local-name";
    /// Advertised service identifiers.
    pub const SERVICE_IDS: &str = "service-ids";
    /// Raw manufacturer-specific data.
    pub const MANUFACTURER_DATA: &str = "manufacturer-data";
    /// Advertised transmit power in dBm.
    pub const TX_POWER: &str = "tx-power";
}

// ----------------------------------------------------------------------------
// Attribute Values
// ----------------------------------------------------------------------------

/// One value in an advertisement payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdvertisementValue {
    /// UTF-8 text, e.g. a local name.
    Text(String),
    /// Integral value, e.g. a transmit power level.
    Integer(i64),
    /// Opaque bytes, e.g. manufacturer data.
    Bytes(Vec<u8>),
    /// A list of advertised service identifiers.
    ServiceList(Vec<ServiceId>),
}

impl AdvertisementValue {
    /// The value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AdvertisementValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AdvertisementValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as raw bytes, if it is bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AdvertisementValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The value as a service list, if it is one.
    pub fn as_services(&self) -> Option<&[ServiceId]> {
        match self {
            AdvertisementValue::ServiceList(ids) => Some(ids),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Advertisement Data
// ----------------------------------------------------------------------------

/// The typed attribute map carried by one advertisement.
///
/// Keys are free-form so drivers can surface backend-specific attributes;
/// the [`keys`] module names the ones every backend is expected to use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvertisementData(BTreeMap<String, AdvertisementValue>);

impl AdvertisementData {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an attribute, returning the builder for chaining.
    pub fn with(mut self, key: impl Into<String>, value: AdvertisementValue) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Insert an attribute.
    pub fn insert(&mut self, key: impl Into<String>, value: AdvertisementValue) {
        self.0.insert(key.into(), value);
    }

    /// Look up an attribute by key.
    pub fn get(&self, key: &str) -> Option<&AdvertisementValue> {
        self.0.get(key)
    }

    /// The advertised local name, if present.
    pub fn local_name(&self) -> Option<&str> {
        self.get(keys::LOCAL_NAME).and_then(AdvertisementValue::as_text)
    }

    /// The advertised service identifiers, if present.
    pub fn service_ids(&self) -> Option<&[ServiceId]> {
        self.get(keys::SERVICE_IDS).and_then(AdvertisementValue::as_services)
    }

    /// Raw manufacturer data, if present.
    pub fn manufacturer_data(&self) -> Option<&[u8]> {
        self.get(keys::MANUFACTURER_DATA).and_then(AdvertisementValue::as_bytes)
    }

    /// The advertised transmit power, if present.
    pub fn tx_power(&self) -> Option<i64> {
        self.get(keys::TX_POWER).and_then(AdvertisementValue::as_integer)
    }

    /// Whether the payload carries no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of attributes in the payload.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over all attributes.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AdvertisementValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ----------------------------------------------------------------------------
// Sightings
// ----------------------------------------------------------------------------

/// One raw observation of a remote device, as delivered by the driver.
///
/// Sightings are ephemeral: they are folded into a
/// [`PeripheralRecord`](crate::peripheral::PeripheralRecord) by the
/// discovery registry and are never stored on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvertisementSighting {
    /// Driver-assigned identifier for the advertising session.
    pub system_id: SystemId,
    /// Name the device advertised, if any.
    pub local_name: Option<String>,
    /// Received signal strength in dBm.
    pub signal_strength: i16,
    /// The advertisement payload.
    pub attributes: AdvertisementData,
    /// When the advertisement was observed.
    pub observed_at: Timestamp,
}

impl AdvertisementSighting {
    /// Create a sighting observed now.
    pub fn new(
        system_id: SystemId,
        local_name: Option<String>,
        signal_strength: i16,
        attributes: AdvertisementData,
    ) -> Self {
        Self {
            system_id,
            local_name,
            signal_strength,
            attributes,
            observed_at: Timestamp::now(),
        }
    }

    /// The identity a previously-unseen record would be created under.
    ///
    /// Preference order: advertised name, then the payload attribute named by
    /// `name_attribute`, then the stringified system identifier.
    pub fn derived_identity(&self, name_attribute: &str) -> String {
        if let Some(name) = &self.local_name {
            return name.clone();
        }
        if let Some(name) = self.attributes.get(name_attribute).and_then(AdvertisementValue::as_text) {
            return name.to_string();
        }
        self.system_id.to_string()
    }
}

//! Durable peripheral records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::advertisement::{AdvertisementData, AdvertisementSighting};
use crate::types::{SystemId, Timestamp};

// ----------------------------------------------------------------------------
// Peripheral Record
// ----------------------------------------------------------------------------

/// The durable record for one logically-distinct remote device.
///
/// A record's identity is assigned when the device is first sighted and never
/// changes afterwards; everything else is refreshed on every sighting. The
/// driver-assigned identifier is held twice: `system_id` is the live linkage
/// to the driver's peripheral table and is severed by invalidation, while
/// `last_system_id` remembers the identifier from the most recent sighting so
/// an invalidated record can be matched and re-linked when the device is
/// sighted again.
///
/// Records are only mutated by the
/// [`DiscoveryRegistry`](crate::registry::DiscoveryRegistry); equality and
/// hashing consider the identity alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeripheralRecord {
    identity: String,
    system_id: Option<SystemId>,
    last_system_id: Option<SystemId>,
    last_signal_strength: Option<i16>,
    last_attributes: Option<AdvertisementData>,
    last_seen_at: Option<Timestamp>,
}

impl PeripheralRecord {
    /// Create a record from the first sighting of a device.
    pub(crate) fn from_sighting(identity: String, sighting: &AdvertisementSighting) -> Self {
        Self {
            identity,
            system_id: Some(sighting.system_id),
            last_system_id: Some(sighting.system_id),
            last_signal_strength: Some(sighting.signal_strength),
            last_attributes: Some(sighting.attributes.clone()),
            last_seen_at: Some(sighting.observed_at),
        }
    }

    /// Fold a later sighting of the same device into the record.
    pub(crate) fn merge(&mut self, sighting: &AdvertisementSighting) {
        self.system_id = Some(sighting.system_id);
        self.last_system_id = Some(sighting.system_id);
        self.last_signal_strength = Some(sighting.signal_strength);
        self.last_attributes = Some(sighting.attributes.clone());
        self.last_seen_at = Some(sighting.observed_at);
    }

    /// Sever the live driver linkage, keeping identity and sighting history.
    pub(crate) fn invalidate(&mut self) {
        self.system_id = None;
        self.last_signal_strength = None;
        self.last_attributes = None;
    }

    /// Restore the live linkage from the remembered identifier.
    pub(crate) fn relink(&mut self) {
        self.system_id = self.last_system_id;
    }

    /// The application-assigned identity. Immutable for the record's lifetime.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Live driver identifier, `None` when the record is not currently linked.
    pub fn system_id(&self) -> Option<SystemId> {
        self.system_id
    }

    /// Driver identifier from the most recent sighting; survives invalidation.
    pub fn last_system_id(&self) -> Option<SystemId> {
        self.last_system_id
    }

    /// Signal strength of the most recent sighting, in dBm.
    pub fn last_signal_strength(&self) -> Option<i16> {
        self.last_signal_strength
    }

    /// Payload of the most recent sighting.
    pub fn last_attributes(&self) -> Option<&AdvertisementData> {
        self.last_attributes.as_ref()
    }

    /// When the device was last sighted.
    pub fn last_seen_at(&self) -> Option<Timestamp> {
        self.last_seen_at
    }

    /// Whether the record currently holds a live driver linkage.
    pub fn is_linked(&self) -> bool {
        self.system_id.is_some()
    }
}

impl PartialEq for PeripheralRecord {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for PeripheralRecord {}

impl std::hash::Hash for PeripheralRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Display for PeripheralRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_signal_strength {
            Some(rssi) => write!(f, "{} ({} dBm)", self.identity, rssi),
            None => write!(f, "{}", self.identity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertisement::AdvertisementData;

    fn sighting(id: SystemId, name: &str, rssi: i16) -> AdvertisementSighting {
        AdvertisementSighting::new(id, Some(name.to_string()), rssi, AdvertisementData::new())
    }

    #[test]
    fn merge_refreshes_everything_but_identity() {
        let first = sighting(SystemId::random(), "Sensor-A", -40);
        let mut record = PeripheralRecord::from_sighting("Sensor-A".into(), &first);

        let later_id = SystemId::random();
        record.merge(&sighting(later_id, "Sensor-B", -55));

        assert_eq!(record.identity(), "Sensor-A");
        assert_eq!(record.system_id(), Some(later_id));
        assert_eq!(record.last_signal_strength(), Some(-55));
    }

    #[test]
    fn invalidate_keeps_identity_and_remembered_id() {
        let id = SystemId::random();
        let first = sighting(id, "Sensor-A", -40);
        let mut record = PeripheralRecord::from_sighting("Sensor-A".into(), &first);
        let seen = record.last_seen_at();

        record.invalidate();

        assert!(!record.is_linked());
        assert_eq!(record.system_id(), None);
        assert_eq!(record.last_system_id(), Some(id));
        assert_eq!(record.last_signal_strength(), None);
        assert!(record.last_attributes().is_none());
        assert_eq!(record.last_seen_at(), seen);

        record.relink();
        assert_eq!(record.system_id(), Some(id));
    }

    #[test]
    fn equality_is_identity_only() {
        let a = PeripheralRecord::from_sighting("X".into(), &sighting(SystemId::random(), "X", -1));
        let b = PeripheralRecord::from_sighting("X".into(), &sighting(SystemId::random(), "X", -99));
        assert_eq!(a, b);
    }
}

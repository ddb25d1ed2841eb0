//! Discovery registry: folds sightings into unique peripheral records.

use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::debug;

use crate::advertisement::AdvertisementSighting;
use crate::peripheral::PeripheralRecord;
use crate::types::SystemId;

// ----------------------------------------------------------------------------
// Discovery Registry
// ----------------------------------------------------------------------------

/// Owns the set of [`PeripheralRecord`]s and resolves sightings into it.
///
/// The registry holds at most one record per identity, and at most one record
/// holds any given live system identifier. All mutations run under one guard,
/// so concurrently delivered sightings cannot both conclude "no match" for
/// the same device, and subscribers observe collection snapshots in
/// resolution order.
///
/// After every mutation the entire collection is published, not a delta;
/// consumers re-sync their own view from the snapshot.
pub struct DiscoveryRegistry {
    records: Mutex<Vec<PeripheralRecord>>,
    collections: broadcast::Sender<Vec<PeripheralRecord>>,
    name_attribute: String,
}

impl DiscoveryRegistry {
    /// Create an empty registry.
    ///
    /// `name_attribute` is the payload key consulted when a sighting carries
    /// no advertised name; `feed_capacity` bounds the collection feed.
    pub fn new(name_attribute: String, feed_capacity: usize) -> Self {
        let (collections, _) = broadcast::channel(feed_capacity);
        Self {
            records: Mutex::new(Vec::new()),
            collections,
            name_attribute,
        }
    }

    /// Resolve a sighting into the collection.
    ///
    /// Match order:
    /// 1. by identity, derived the same way a new record's would be;
    ///    an existing record's identity is never recomputed;
    /// 2. by the driver identifier remembered from the record's most recent
    ///    sighting, covering a device whose advertised name changed mid-
    ///    session and a record re-appearing after invalidation;
    /// 3. otherwise a new record is created.
    ///
    /// A match refreshes the record's linkage, signal strength, payload and
    /// last-seen time; the identity is left untouched.
    ///
    /// Identity derivation prefers the advertised name, so two physical
    /// devices advertising the same name resolve to a single record. That is
    /// a known limitation, kept until a stable manufacturer-data identifier
    /// is available.
    pub fn resolve(&self, sighting: &AdvertisementSighting) {
        let mut records = self.lock_records();
        let identity = sighting.derived_identity(&self.name_attribute);

        if let Some(record) = records.iter_mut().find(|r| r.identity() == identity) {
            record.merge(sighting);
            self.publish(&records);
            return;
        }

        if let Some(record) = records
            .iter_mut()
            .find(|r| r.last_system_id() == Some(sighting.system_id))
        {
            record.merge(sighting);
            self.publish(&records);
            return;
        }

        debug!(peripheral = %identity, system_id = %sighting.system_id, "adding newly discovered peripheral");
        records.push(PeripheralRecord::from_sighting(identity, sighting));
        self.publish(&records);
    }

    /// Sever every record's live driver linkage, e.g. after a driver reset.
    ///
    /// Identities, remembered identifiers and last-seen history survive; the
    /// partially-blanked collection is published.
    pub fn invalidate_all(&self) {
        let mut records = self.lock_records();
        for record in records.iter_mut() {
            record.invalidate();
        }
        debug!(count = records.len(), "invalidated all peripheral linkages");
        self.publish(&records);
    }

    /// Re-link records whose remembered identifier is still live.
    ///
    /// Creates and deletes nothing; records outside `live` are untouched.
    pub fn refresh(&self, live: &[SystemId]) {
        let mut records = self.lock_records();
        let mut relinked = 0usize;
        for record in records.iter_mut() {
            if let Some(id) = record.last_system_id() {
                if live.contains(&id) {
                    record.relink();
                    relinked += 1;
                }
            }
        }
        debug!(relinked, "refreshed peripherals from live identifiers");
        self.publish(&records);
    }

    /// A copy of the current collection.
    pub fn snapshot(&self) -> Vec<PeripheralRecord> {
        self.lock_records().clone()
    }

    /// Subscribe to full-collection snapshots, published after every mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<PeripheralRecord>> {
        self.collections.subscribe()
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, Vec<PeripheralRecord>> {
        self.records.lock().expect("registry lock poisoned")
    }

    // Called with the guard held so snapshots go out in mutation order.
    fn publish(&self, records: &[PeripheralRecord]) {
        let _ = self.collections.send(records.to_vec());
    }
}

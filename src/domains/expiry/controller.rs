use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

use super::index::ExpirationIndex;
use super::store::PrimaryStore;
use super::ttl::Ttl;
use crate::domains::error::ExpiryError;

/// Store and expiration index kept in lockstep.
///
/// Every method leaves both structures consistent: a key has a deadline record
/// if and only if it is stored and its ttl is finite. Callers hold the map lock
/// for the duration of each call.
#[derive(Debug)]
pub(crate) struct ExpiryController<K, V> {
    store: PrimaryStore<K, V>,
    index: ExpirationIndex<K>,
    default_ttl: Ttl,
}

impl<K: Ord + Hash + Clone, V> ExpiryController<K, V> {
    pub(crate) fn new(default_ttl: Ttl) -> Self {
        Self { store: PrimaryStore::default(), index: ExpirationIndex::default(), default_ttl }
    }

    /// Stores `value` and restarts its ttl. Returns the value it replaced.
    pub(crate) fn assign(&mut self, key: K, value: V, ttl: Ttl, now: Instant) -> Option<V> {
        self.index.replace(key.clone(), ttl.deadline_from(now, self.default_ttl));
        self.store.insert(key, value)
    }

    /// Restarts the ttl of a stored key. Absent keys are left alone.
    pub(crate) fn reset_ttl(&mut self, key: &K, ttl: Ttl, now: Instant) -> bool {
        if !self.store.contains_key(key) {
            return false;
        }
        self.index.replace(key.clone(), ttl.deadline_from(now, self.default_ttl));
        true
    }

    pub(crate) fn expire_now(&mut self, key: &K, now: Instant) -> bool {
        self.reset_ttl(key, Ttl::After(Duration::ZERO), now)
    }

    pub(crate) fn remove(&mut self, key: &K) -> Result<V, ExpiryError> {
        let value = self.store.remove(key).ok_or(ExpiryError::NotFound)?;
        self.index.remove(key);
        Ok(value)
    }

    /// Drops every entry due by `now` and returns their keys in (deadline, key) order.
    pub(crate) fn reap(&mut self, now: Instant) -> Vec<K> {
        let mut due = self.index.pop_due(now);
        // a key already gone from the store counts as handled
        due.retain(|key| self.store.remove(key).is_some());
        due
    }

    pub(crate) fn remaining_ttl(&self, key: &K, now: Instant) -> Option<Duration> {
        self.index.deadline(key).map(|deadline| deadline.saturating_duration_since(now))
    }

    pub(crate) fn next_due_in(&self, now: Instant) -> Option<Duration> {
        self.index.next_deadline().map(|deadline| deadline.saturating_duration_since(now))
    }

    pub(crate) fn clear(&mut self) {
        self.store.clear();
        self.index.clear();
    }

    pub(crate) fn store(&self) -> &PrimaryStore<K, V> {
        &self.store
    }

    pub(crate) fn expiring_len(&self) -> usize {
        self.index.len()
    }

    #[cfg(test)]
    pub(crate) fn validate(&self) -> bool {
        self.index.validate() && self.index.iter().all(|(_, key)| self.store.contains_key(key))
    }
}

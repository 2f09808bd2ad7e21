use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;
use tokio::time::Instant;

/// Keys ordered by (deadline, key), with a reverse lookup from key to its deadline.
///
/// Keys sharing a deadline live in the same bucket, so walking buckets in order
/// yields records sorted by deadline first and key second.
#[derive(Debug)]
pub(crate) struct ExpirationIndex<K> {
    by_deadline: BTreeMap<Instant, BTreeSet<K>>,
    deadlines: HashMap<K, Instant>,
}

impl<K> Default for ExpirationIndex<K> {
    fn default() -> Self {
        Self { by_deadline: BTreeMap::new(), deadlines: HashMap::new() }
    }
}

impl<K: Ord + Hash + Clone> ExpirationIndex<K> {
    /// The caller must make sure `key` has no record yet.
    pub(crate) fn insert(&mut self, deadline: Instant, key: K) {
        debug_assert!(!self.deadlines.contains_key(&key), "key already has a deadline record");
        self.by_deadline.entry(deadline).or_default().insert(key.clone());
        self.deadlines.insert(key, deadline);
    }

    /// Drops whatever record `key` had, then records `deadline` if one is given.
    pub(crate) fn replace(&mut self, key: K, deadline: Option<Instant>) {
        self.remove(&key);
        if let Some(deadline) = deadline {
            self.insert(deadline, key);
        }
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<Instant> {
        let deadline = self.deadlines.remove(key)?;
        if let Entry::Occupied(mut bucket) = self.by_deadline.entry(deadline) {
            bucket.get_mut().remove(key);
            if bucket.get().is_empty() {
                bucket.remove();
            }
        }
        Some(deadline)
    }

    /// Takes out every record with deadline <= `now`, in (deadline, key) order.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Vec<K> {
        // everything at or after `now` stays, except the bucket sitting exactly on it
        let mut not_due = self.by_deadline.split_off(&now);
        if let Some(bucket) = not_due.remove(&now) {
            self.by_deadline.insert(now, bucket);
        }
        let due = std::mem::replace(&mut self.by_deadline, not_due);

        let keys: Vec<K> = due.into_values().flatten().collect();
        for key in &keys {
            self.deadlines.remove(key);
        }
        keys
    }

    pub(crate) fn deadline(&self, key: &K) -> Option<Instant> {
        self.deadlines.get(key).copied()
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.by_deadline.first_key_value().map(|(deadline, _)| *deadline)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub(crate) fn clear(&mut self) {
        self.by_deadline.clear();
        self.deadlines.clear();
    }

    /// Records in (deadline, key) order.
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = (Instant, &K)> + '_ {
        self.by_deadline.iter().flat_map(|(deadline, keys)| keys.iter().map(|k| (*deadline, k)))
    }

    #[cfg(test)]
    pub(crate) fn validate(&self) -> bool {
        let records: Vec<_> = self.iter().collect();
        records.len() == self.deadlines.len()
            && self.by_deadline.values().all(|bucket| !bucket.is_empty())
            && records.iter().all(|(deadline, key)| self.deadlines.get(*key) == Some(deadline))
    }
}

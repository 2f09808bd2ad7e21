use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

use super::callbacks::CallbackRegistry;
use super::controller::ExpiryController;
use super::reaper::{Reaper, SharedController, sweep};
use super::ttl::Ttl;
use crate::config::ExpiryConfig;
use crate::domains::error::ExpiryError;

/// A concurrent map whose entries may carry a deadline, reaped in the background.
///
/// Cloning gives another handle onto the same map. Every operation, reads
/// included, goes through one lock shared with the reaper, so callers never see
/// an entry that is half removed. The reaper stops on [`ExpiringMap::close`] or
/// once the last handle is dropped.
///
/// A callback that captures a clone of the map keeps it alive, reaper included,
/// until the callback is replaced or cleared. Callbacks that need the map should
/// capture [`ExpiringMap::downgrade`] instead.
///
/// # Panics
/// Construction spawns the reaper with [`tokio::spawn`] and panics outside a tokio runtime.
pub struct ExpiringMap<K, V> {
    inner: Arc<Shared<K, V>>,
}

struct Shared<K, V> {
    controller: SharedController<K, V>,
    callbacks: Arc<CallbackRegistry<K>>,
    reaper: Mutex<Option<Reaper>>,
    config: ExpiryConfig,
}

impl<K, V> Drop for Shared<K, V> {
    fn drop(&mut self) {
        let reaper = self.reaper.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(reaper) = reaper {
            reaper.signal_stop();
        }
    }
}

impl<K, V> Clone for ExpiringMap<K, V> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<K, V> ExpiringMap<K, V> {
    /// Handle that does not keep the map alive.
    pub fn downgrade(&self) -> WeakExpiringMap<K, V> {
        WeakExpiringMap { inner: Arc::downgrade(&self.inner) }
    }
}

/// Non-owning handle onto an [`ExpiringMap`], obtained with [`ExpiringMap::downgrade`].
pub struct WeakExpiringMap<K, V> {
    inner: Weak<Shared<K, V>>,
}

impl<K, V> WeakExpiringMap<K, V> {
    /// `None` once every [`ExpiringMap`] handle has been dropped.
    pub fn upgrade(&self) -> Option<ExpiringMap<K, V>> {
        self.inner.upgrade().map(|inner| ExpiringMap { inner })
    }
}

impl<K, V> Clone for WeakExpiringMap<K, V> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<K, V> ExpiringMap<K, V>
where
    K: Ord + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    pub fn new(config: ExpiryConfig) -> Self {
        let controller = Arc::new(Mutex::new(ExpiryController::new(config.default_ttl)));
        let callbacks = Arc::new(CallbackRegistry::default());
        let reaper = Reaper::run(
            Arc::downgrade(&controller),
            Arc::downgrade(&callbacks),
            config.poll_interval,
        );

        Self {
            inner: Arc::new(Shared {
                controller,
                callbacks,
                reaper: Mutex::new(Some(reaper)),
                config,
            }),
        }
    }

    /// Pre-populated map. Initial entries get the default ttl.
    pub fn with_entries(config: ExpiryConfig, entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let map = Self::new(config);
        map.extend(entries);
        map
    }

    pub fn config(&self) -> &ExpiryConfig {
        &self.inner.config
    }

    fn lock(&self) -> MutexGuard<'_, ExpiryController<K, V>> {
        self.inner.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assigns with the default ttl. Returns the replaced value, if any.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.set_with_ttl(key, value, Ttl::Default)
    }

    /// Assigns `value` and restarts the key's ttl from now, replacing both atomically.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Ttl) -> Option<V> {
        self.lock().assign(key, value, ttl, Instant::now())
    }

    /// Changes the ttl of a stored key without touching its value.
    ///
    /// Returns `false`, and does nothing, when the key is absent.
    pub fn reset_ttl(&self, key: &K, ttl: Ttl) -> bool {
        self.lock().reset_ttl(key, ttl, Instant::now())
    }

    /// Makes the key due for the next sweep. Same as `reset_ttl(key, 0)`.
    pub fn expire_now(&self, key: &K) -> bool {
        self.lock().expire_now(key, Instant::now())
    }

    pub fn remove(&self, key: &K) -> Result<V, ExpiryError> {
        self.lock().remove(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.lock().store().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().store().is_empty()
    }

    /// Number of entries currently carrying a deadline.
    pub fn expiring_len(&self) -> usize {
        self.lock().expiring_len()
    }

    /// Time left before the key becomes due. `None` for absent or never-expiring keys.
    pub fn remaining_ttl(&self, key: &K) -> Option<Duration> {
        self.lock().remaining_ttl(key, Instant::now())
    }

    pub fn keys(&self) -> Vec<K> {
        self.lock().store().keys().cloned().collect()
    }

    /// Empties the map. No expiry callbacks fire for the dropped entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Assigns every pair with the default ttl under a single lock acquisition.
    pub fn extend(&self, entries: impl IntoIterator<Item = (K, V)>) {
        let mut controller = self.lock();
        let now = Instant::now();
        for (key, value) in entries {
            controller.assign(key, value, Ttl::Default, now);
        }
    }

    /// Runs one sweep on the calling thread, callbacks included. Returns how many entries went.
    pub fn flush(&self) -> usize {
        sweep(&self.inner.controller, &self.inner.callbacks)
    }

    /// Called once per reaped key. Replaces any earlier per-key callback.
    ///
    /// Reaper sweeps run callbacks on tokio's blocking pool, so they may block.
    /// [`ExpiringMap::flush`] runs them on the calling thread.
    pub fn on_key_expired(&self, callback: impl Fn(&K) + Send + Sync + 'static) {
        self.inner.callbacks.set_on_key(Arc::new(callback));
    }

    /// Called once per sweep that reaped anything, with the number reaped.
    /// Replaces any earlier batch callback.
    pub fn on_batch_expired(&self, callback: impl Fn(usize) + Send + Sync + 'static) {
        self.inner.callbacks.set_on_batch(Arc::new(callback));
    }

    pub fn clear_callbacks(&self) {
        self.inner.callbacks.clear();
    }

    pub fn is_reaping(&self) -> bool {
        let reaper = self.inner.reaper.lock().unwrap_or_else(PoisonError::into_inner);
        reaper.as_ref().is_some_and(|reaper| !reaper.is_finished())
    }

    /// Stops the reaper and waits for its task to finish.
    ///
    /// The map stays usable afterwards, but nothing is reaped unless [`ExpiringMap::flush`] is called.
    #[instrument(level = tracing::Level::DEBUG, skip(self))]
    pub async fn close(&self) -> Result<(), ExpiryError> {
        let reaper = self.inner.reaper.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(reaper) = reaper else {
            return Err(ExpiryError::Stopped);
        };
        reaper.stop().await;
        debug!("expiring map closed");
        Ok(())
    }
}

impl<K, V> ExpiringMap<K, V>
where
    K: Ord + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn get(&self, key: &K) -> Result<V, ExpiryError> {
        self.lock().store().get(key).cloned().ok_or(ExpiryError::NotFound)
    }

    pub fn values(&self) -> Vec<V> {
        self.lock().store().values().cloned().collect()
    }

    /// Snapshot of every (key, value) pair, in no particular order.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.lock().store().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl<K, V> fmt::Debug for ExpiringMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringMap").field("config", &self.inner.config).finish_non_exhaustive()
    }
}

impl<K, V> fmt::Debug for WeakExpiringMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakExpiringMap")
    }
}

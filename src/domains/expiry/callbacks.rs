use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::error;

use crate::domains::error::ExpiryError;

pub(crate) type KeyExpiredCallback<K> = Arc<dyn Fn(&K) + Send + Sync>;
pub(crate) type BatchExpiredCallback = Arc<dyn Fn(usize) + Send + Sync>;

/// At most one per-key and one per-batch callback. Registering replaces the previous one.
pub(crate) struct CallbackRegistry<K> {
    on_key: Mutex<Option<KeyExpiredCallback<K>>>,
    on_batch: Mutex<Option<BatchExpiredCallback>>,
}

impl<K> Default for CallbackRegistry<K> {
    fn default() -> Self {
        Self { on_key: Mutex::new(None), on_batch: Mutex::new(None) }
    }
}

impl<K> CallbackRegistry<K> {
    pub(crate) fn set_on_key(&self, callback: KeyExpiredCallback<K>) {
        *self.on_key.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub(crate) fn set_on_batch(&self, callback: BatchExpiredCallback) {
        *self.on_batch.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub(crate) fn clear(&self) {
        self.on_key.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.on_batch.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Fires the per-key callback for each key in order, then the batch callback once
    /// if anything was reaped. A panicking callback is logged and skipped; the rest still run.
    ///
    /// Must be called without holding the map lock.
    pub(crate) fn notify(&self, reaped: &[K]) -> Vec<ExpiryError> {
        let mut failures = Vec::new();
        if reaped.is_empty() {
            return failures;
        }

        // clone the handles out so a callback may re-register without deadlocking
        let on_key = self.on_key.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let on_batch = self.on_batch.lock().unwrap_or_else(PoisonError::into_inner).clone();

        if let Some(on_key) = on_key {
            for key in reaped {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| on_key(key))) {
                    let err = ExpiryError::from_panic(payload);
                    error!("key expiry callback panicked: {err}");
                    failures.push(err);
                }
            }
        }

        if let Some(on_batch) = on_batch {
            let count = reaped.len();
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| on_batch(count))) {
                let err = ExpiryError::from_panic(payload);
                error!(count, "batch expiry callback panicked: {err}");
                failures.push(err);
            }
        }

        failures
    }
}

#![allow(dead_code)]

use expiry_map::{ExpiringMap, ExpiryConfig, Ttl};
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, sleep};

pub const POLL: Duration = Duration::from_millis(20);

pub struct MapEnv {
    pub default_ttl: Ttl,
    pub poll_interval: Duration,
}

impl Default for MapEnv {
    fn default() -> Self {
        MapEnv { default_ttl: Ttl::Never, poll_interval: POLL }
    }
}

impl MapEnv {
    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn build<K, V>(&self) -> ExpiringMap<K, V>
    where
        K: Ord + Hash + Clone + Send + 'static,
        V: Send + 'static,
    {
        ExpiringMap::new(
            ExpiryConfig::default()
                .with_default_ttl(self.default_ttl)
                .with_poll_interval(self.poll_interval),
        )
    }
}

/// Collects what the expiry callbacks report.
#[derive(Clone)]
pub struct Recorder<K> {
    pub keys: Arc<Mutex<Vec<K>>>,
    pub batches: Arc<Mutex<Vec<usize>>>,
}

impl<K> Default for Recorder<K> {
    fn default() -> Self {
        Recorder {
            keys: Arc::new(Mutex::new(Vec::new())),
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<K: Clone + Send + 'static> Recorder<K> {
    pub fn attach<V>(&self, map: &ExpiringMap<K, V>)
    where
        K: Ord + Hash,
        V: Send + 'static,
    {
        let keys = self.keys.clone();
        map.on_key_expired(move |k: &K| keys.lock().unwrap().push(k.clone()));
        let batches = self.batches.clone();
        map.on_batch_expired(move |n: usize| batches.lock().unwrap().push(n));
    }

    pub fn keys(&self) -> Vec<K> {
        self.keys.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

/// Polls `cond` until it holds or `within` elapses.
pub async fn wait_until(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    cond()
}

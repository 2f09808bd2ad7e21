use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::select;
use tokio::task::{JoinHandle, spawn_blocking};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument};

use super::callbacks::CallbackRegistry;
use super::controller::ExpiryController;
use crate::domains::error::ExpiryError;
use crate::types::{Callback, CallbackAwaiter};

pub(crate) type SharedController<K, V> = Arc<Mutex<ExpiryController<K, V>>>;

/// Removes the due prefix under the lock. Also reports how long until the next deadline.
fn reap_due<K, V>(controller: &Mutex<ExpiryController<K, V>>) -> (Vec<K>, Option<Duration>)
where
    K: Ord + Hash + Clone,
{
    let mut guard = controller.lock().unwrap_or_else(PoisonError::into_inner);
    let now = Instant::now();
    let reaped = guard.reap(now);
    (reaped, guard.next_due_in(now))
}

fn report(reaped: usize, failures: &[ExpiryError], next_due_in: Option<Duration>) {
    if reaped > 0 {
        debug!(reaped, failed = failures.len(), ?next_due_in, "swept expired keys");
    }
}

/// One sweep on the calling thread: pull the due prefix under the lock, then notify outside of it.
pub(crate) fn sweep<K, V>(
    controller: &Mutex<ExpiryController<K, V>>,
    callbacks: &CallbackRegistry<K>,
) -> usize
where
    K: Ord + Hash + Clone,
{
    let (reaped, next_due_in) = reap_due(controller);
    let failures = callbacks.notify(&reaped);
    report(reaped.len(), &failures, next_due_in);
    reaped.len()
}

/// Background task that sweeps every poll interval until told to stop.
///
/// The task only holds weak references, so it never keeps the map alive. It
/// exits on its own once the state it sweeps is gone.
#[derive(Debug)]
pub(crate) struct Reaper {
    stop: Callback<()>,
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Must be called from within a tokio runtime.
    pub(crate) fn run<K, V>(
        controller: Weak<Mutex<ExpiryController<K, V>>>,
        callbacks: Weak<CallbackRegistry<K>>,
        poll_interval: Duration,
    ) -> Self
    where
        K: Ord + Hash + Clone + Send + 'static,
        V: Send + 'static,
    {
        let (stop, stopped) = Callback::create();
        let handle =
            tokio::spawn(Self::sweep_periodically(controller, callbacks, poll_interval, stopped));
        Self { stop, handle }
    }

    #[instrument(level = tracing::Level::DEBUG, skip_all)]
    async fn sweep_periodically<K, V>(
        controller: Weak<Mutex<ExpiryController<K, V>>>,
        callbacks: Weak<CallbackRegistry<K>>,
        poll_interval: Duration,
        stopped: CallbackAwaiter<()>,
    ) where
        K: Ord + Hash + Clone + Send + 'static,
        V: Send + 'static,
    {
        // first sweep happens one interval after start, not immediately
        let mut ticker = interval_at(Instant::now() + poll_interval, poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let stopped = stopped.wait();
        tokio::pin!(stopped);

        info!(?poll_interval, "reaper started");
        loop {
            select! {
                biased;
                _ = &mut stopped => break,
                _ = ticker.tick() => {
                    let upgraded = (controller.upgrade(), callbacks.upgrade());
                    let (Some(controller), Some(callbacks)) = upgraded else { break };
                    let (reaped, next_due_in) = reap_due(&controller);
                    drop(controller);
                    if !reaped.is_empty() {
                        Self::notify_off_runtime(callbacks, reaped, next_due_in).await;
                    }
                },
            }
        }
        info!("reaper stopped");
    }

    /// Callbacks may block, so they run on the blocking pool. The next sweep waits for them.
    async fn notify_off_runtime<K>(
        callbacks: Arc<CallbackRegistry<K>>,
        reaped: Vec<K>,
        next_due_in: Option<Duration>,
    ) where
        K: Send + 'static,
    {
        let count = reaped.len();
        match spawn_blocking(move || callbacks.notify(&reaped)).await {
            | Ok(failures) => report(count, &failures, next_due_in),
            | Err(err) => error!(reaped = count, "expiry callbacks did not complete: {err}"),
        }
    }

    /// Signals the loop to exit without waiting for it.
    pub(crate) fn signal_stop(self) {
        self.stop.send(());
    }

    pub(crate) async fn stop(self) {
        self.stop.send(());
        let _ = self.handle.await;
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::expiry::ttl::Ttl;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, timeout};

    fn always_panics(_: &String) {
        panic!("callback failure")
    }

    fn shared(default_ttl: Ttl) -> SharedController<String, u32> {
        Arc::new(Mutex::new(ExpiryController::new(default_ttl)))
    }

    #[test]
    fn test_sweep_notifies_outside_the_lock() {
        // GIVEN - a callback that takes the map lock itself
        let controller = shared(Ttl::Never);
        let callbacks = CallbackRegistry::default();
        let observed_len = Arc::new(AtomicUsize::new(usize::MAX));
        callbacks.set_on_key(Arc::new({
            let controller = controller.clone();
            let observed_len = observed_len.clone();
            move |_: &String| {
                let len = controller.lock().unwrap().store().len();
                observed_len.store(len, Ordering::SeqCst);
            }
        }));
        controller.lock().unwrap().assign("a".into(), 1, Ttl::Never, Instant::now());
        controller.lock().unwrap().expire_now(&"a".to_string(), Instant::now());

        // WHEN
        let reaped = sweep(&controller, &callbacks);

        // THEN - no deadlock, and the key was already gone when the callback ran
        assert_eq!(reaped, 1);
        assert_eq!(observed_len.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reaper_removes_due_keys_periodically() {
        // GIVEN
        let controller = shared(Ttl::Never);
        let callbacks = Arc::new(CallbackRegistry::default());
        controller.lock().unwrap().assign("a".into(), 1, Ttl::millis(20), Instant::now());
        controller.lock().unwrap().assign("b".into(), 2, Ttl::Never, Instant::now());

        // WHEN
        let reaper = Reaper::run(
            Arc::downgrade(&controller),
            Arc::downgrade(&callbacks),
            Duration::from_millis(10),
        );
        sleep(Duration::from_millis(100)).await;

        // THEN
        {
            let guard = controller.lock().unwrap();
            assert!(!guard.store().contains_key("a"));
            assert!(guard.store().contains_key("b"));
        }
        reaper.stop().await;
    }

    #[tokio::test]
    async fn test_reaper_keeps_running_after_callback_panics() {
        // GIVEN - every key callback panics
        let controller = shared(Ttl::Never);
        let callbacks = Arc::new(CallbackRegistry::default());
        let batches = Arc::new(AtomicUsize::new(0));
        callbacks.set_on_key(Arc::new(always_panics));
        callbacks.set_on_batch(Arc::new({
            let batches = batches.clone();
            move |_: usize| {
                batches.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let reaper = Reaper::run(
            Arc::downgrade(&controller),
            Arc::downgrade(&callbacks),
            Duration::from_millis(10),
        );

        // WHEN - two keys expire in two separate sweeps
        controller.lock().unwrap().assign("first".into(), 1, Ttl::Default, Instant::now());
        controller.lock().unwrap().expire_now(&"first".to_string(), Instant::now());
        sleep(Duration::from_millis(60)).await;
        controller.lock().unwrap().assign("second".into(), 2, Ttl::millis(0), Instant::now());
        sleep(Duration::from_millis(60)).await;

        // THEN
        assert!(controller.lock().unwrap().store().is_empty());
        assert_eq!(batches.load(Ordering::SeqCst), 2);
        assert!(!reaper.is_finished());
        reaper.stop().await;
    }

    #[tokio::test]
    async fn test_stop_terminates_task() {
        let controller = shared(Ttl::Never);
        let callbacks = Arc::new(CallbackRegistry::default());
        let reaper = Reaper::run(
            Arc::downgrade(&controller),
            Arc::downgrade(&callbacks),
            Duration::from_secs(60),
        );

        timeout(Duration::from_millis(500), reaper.stop()).await.expect("reaper did not stop");
    }

    #[tokio::test]
    async fn test_signal_stop_ends_loop() {
        // GIVEN
        let controller = shared(Ttl::Never);
        let callbacks = Arc::new(CallbackRegistry::default());
        let reaper = Reaper::run(
            Arc::downgrade(&controller),
            Arc::downgrade(&callbacks),
            Duration::from_millis(10),
        );

        // WHEN
        reaper.signal_stop();
        sleep(Duration::from_millis(30)).await;

        // THEN - nothing is reaped any more
        controller.lock().unwrap().assign("a".into(), 1, Ttl::millis(0), Instant::now());
        sleep(Duration::from_millis(50)).await;
        assert!(controller.lock().unwrap().store().contains_key("a"));
    }

    #[tokio::test]
    async fn test_reaper_exits_once_state_is_dropped() {
        // GIVEN
        let controller = shared(Ttl::Never);
        let callbacks = Arc::new(CallbackRegistry::default());
        let reaper = Reaper::run(
            Arc::downgrade(&controller),
            Arc::downgrade(&callbacks),
            Duration::from_millis(10),
        );

        // WHEN - nobody owns the state any more, and no stop signal was sent
        drop(controller);
        drop(callbacks);
        sleep(Duration::from_millis(60)).await;

        // THEN
        assert!(reaper.is_finished());
    }

    #[test]
    fn test_sweep_log_counts_callback_failures() {
        // GIVEN
        let controller = shared(Ttl::Never);
        let callbacks = CallbackRegistry::default();
        callbacks.set_on_key(Arc::new(always_panics));
        controller.lock().unwrap().assign("a".into(), 1, Ttl::millis(0), Instant::now());
        controller.lock().unwrap().assign("b".into(), 2, Ttl::millis(0), Instant::now());

        // WHEN
        let (reaped, next_due_in) = reap_due(&controller);
        let failures = callbacks.notify(&reaped);

        // THEN - every panic is reported back to the sweep
        assert_eq!(reaped.len(), 2);
        assert_eq!(next_due_in, None);
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|err| matches!(err, ExpiryError::CallbackFailure(_))));
    }
}

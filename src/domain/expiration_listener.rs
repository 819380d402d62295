//! Background reconciliation of cache-side expirations into the durable store.
//!
//! When a short key expires in the cache, the matching durable record is
//! marked inactive. The listener is a small state machine:
//!
//! ```text
//! Stopped -> Initializing -> Listening -> Stopped
//!                 |    ^          |          ^
//!                 |    +- feed ---+          |
//!                 |       closed             |
//!                 +------ init failure ------+
//! ```
//!
//! The current state is published on a [`watch`] channel so the health
//! endpoint and tests can observe it.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, info, warn};

use crate::domain::repositories::UrlRepository;
use crate::error::AppError;
use crate::infrastructure::cache::{CacheError, CacheService, ExpirationStream, keys};

/// Attempts per event, first try included.
pub const DEFAULT_RETRY_ATTEMPTS: usize = 3;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RESUBSCRIBE_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, PartialEq, Eq)]
enum LoopExit {
    Shutdown,
    FeedClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    Stopped,
    Initializing,
    Listening,
}

/// Consumes key-expiration events and deactivates the matching records.
///
/// Events are handled one at a time in delivery order. A failed event is
/// logged and skipped; nothing escapes the loop. Records that were already
/// deactivated by a user delete are left untouched.
pub struct ExpirationListener<R: UrlRepository + ?Sized = dyn UrlRepository> {
    repository: Arc<R>,
    cache: Arc<dyn CacheService>,
    state: watch::Sender<ListenerState>,
    retry_attempts: usize,
}

impl<R: UrlRepository + ?Sized + 'static> ExpirationListener<R> {
    pub fn new(repository: Arc<R>, cache: Arc<dyn CacheService>) -> Self {
        let (state, _) = watch::channel(ListenerState::Stopped);
        Self {
            repository,
            cache,
            state,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    /// Sets how many times a transient store error is attempted per event.
    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Subscribes to state changes.
    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Runs the listener on its own task until `shutdown` flips to `true`.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Initializes the subscription and consumes events until shutdown.
    ///
    /// An initialization failure is logged and leaves the listener
    /// [`ListenerState::Stopped`]; the caller keeps running without
    /// reconciliation. A feed that closes later (a dropped pub/sub
    /// connection) puts the listener back into
    /// [`ListenerState::Initializing`] and it resubscribes with backoff.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        self.state.send_replace(ListenerState::Initializing);

        let mut events = match self.subscribe().await {
            Ok(events) => events,
            Err(e) => {
                warn!(
                    error = %e,
                    "Expiration listener failed to initialize, expired links will not be reconciled"
                );
                self.state.send_replace(ListenerState::Stopped);
                return;
            }
        };

        loop {
            self.state.send_replace(ListenerState::Listening);
            info!("Expiration listener started");

            if self.consume(&mut events, &mut shutdown).await == LoopExit::Shutdown {
                break;
            }

            self.state.send_replace(ListenerState::Initializing);
            warn!("Expiration feed closed, resubscribing");

            match self.resubscribe(&mut shutdown).await {
                Some(resumed) => events = resumed,
                None => break,
            }
        }

        drop(events);
        self.state.send_replace(ListenerState::Stopped);
        info!("Expiration listener stopped");
    }

    /// Handles events in delivery order until shutdown or until the feed ends.
    async fn consume(
        &self,
        events: &mut ExpirationStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> LoopExit {
        if *shutdown.borrow_and_update() {
            return LoopExit::Shutdown;
        }

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Expiration listener shutting down");
                        return LoopExit::Shutdown;
                    }
                }
                event = events.next() => match event {
                    Some(key) => self.on_expired(&key).await,
                    None => return LoopExit::FeedClosed,
                },
            }
        }
    }

    /// Subscribes again, backing off between failed attempts. Returns `None`
    /// if shutdown is requested first.
    async fn resubscribe(&self, shutdown: &mut watch::Receiver<bool>) -> Option<ExpirationStream> {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(50)
            .max_delay(MAX_RESUBSCRIBE_DELAY)
            .map(jitter);

        let this = self;
        let attempt = move || async move {
            this.subscribe().await.inspect_err(|e| {
                warn!(error = %e, "Expiration listener resubscription failed");
            })
        };

        tokio::select! {
            biased;

            _ = stop_requested(shutdown) => {
                info!("Expiration listener shutting down");
                None
            }
            resumed = RetryIf::start(strategy, attempt, |_: &CacheError| true) => resumed.ok(),
        }
    }

    /// Handles one expired cache key. Origin keys are ignored.
    ///
    /// Never fails: outcomes are logged and counted.
    pub async fn on_expired(&self, key: &str) {
        let Some(short_code) = keys::short_code_from_key(key) else {
            debug!(key, "Ignoring expiration of non-redirect key");
            return;
        };

        match self.mark_expired(short_code).await {
            Ok(()) => {
                info!(short_code, "Expired link reconciled");
                metrics::counter!("shortkeep_reconciled_total", "outcome" => "reconciled")
                    .increment(1);
            }
            Err(AppError::ReconciliationSkipped { .. }) => {
                info!(short_code, "No active record for expired key, skipping");
                metrics::counter!("shortkeep_reconciled_total", "outcome" => "skipped")
                    .increment(1);
            }
            Err(e) => {
                error!(short_code, error = %e, "Failed to reconcile expired link");
                metrics::counter!("shortkeep_reconciled_total", "outcome" => "failed")
                    .increment(1);
            }
        }
    }

    /// Deactivates the active record holding `short_code`.
    ///
    /// Store errors are retried with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ReconciliationSkipped`] when no active record
    /// matched, or the last store error once retries are exhausted.
    pub async fn mark_expired(&self, short_code: &str) -> Result<(), AppError> {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(25)
            .max_delay(MAX_RETRY_DELAY)
            .map(jitter)
            .take(self.retry_attempts - 1);

        let affected = RetryIf::start(
            strategy,
            || self.repository.mark_expired_by_code(short_code),
            is_transient,
        )
        .await?;

        if affected == 0 {
            return Err(AppError::ReconciliationSkipped {
                code: short_code.to_string(),
            });
        }

        Ok(())
    }

    async fn subscribe(&self) -> Result<ExpirationStream, CacheError> {
        self.cache.enable_expiration_notifications().await?;
        self.cache.subscribe_expirations().await
    }
}

/// Resolves once shutdown is requested or its sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn is_transient(e: &AppError) -> bool {
    matches!(e, AppError::Internal { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockUrlRepository;
    use crate::infrastructure::cache::MockCacheService;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Yields `keys` as expiration events, then requests shutdown.
    fn drain_then_stop(
        keys: &[&str],
        shutdown: &Arc<watch::Sender<bool>>,
    ) -> ExpirationStream {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let shutdown = shutdown.clone();
        let stop = futures::stream::once(async move {
            shutdown.send_replace(true);
            futures::future::pending::<String>().await
        });
        futures::stream::iter(keys).chain(stop).boxed()
    }

    fn feed(keys: &[&str]) -> (MockCacheService, watch::Receiver<bool>) {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let (tx, rx) = watch::channel(false);
        let tx = Arc::new(tx);
        let mut cache = MockCacheService::new();
        cache
            .expect_enable_expiration_notifications()
            .returning(|| Ok(()));
        cache
            .expect_subscribe_expirations()
            .times(1)
            .returning(move || {
                let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                Ok(drain_then_stop(&keys, &tx))
            });
        (cache, rx)
    }

    fn listener(repo: MockUrlRepository, cache: MockCacheService) -> ExpirationListener<MockUrlRepository> {
        ExpirationListener::new(Arc::new(repo), Arc::new(cache))
    }

    #[tokio::test]
    async fn test_init_failure_leaves_listener_stopped() {
        let mut cache = MockCacheService::new();
        cache
            .expect_enable_expiration_notifications()
            .returning(|| Err(CacheError::OperationError("CONFIG disabled".into())));
        cache.expect_subscribe_expirations().never();

        let listener = listener(MockUrlRepository::new(), cache);
        let state = listener.state();
        let (_tx, rx) = watch::channel(false);

        listener.run(rx).await;
        assert_eq!(*state.borrow(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn test_skipped_event_does_not_stop_the_loop() {
        let mut repo = MockUrlRepository::new();
        repo.expect_mark_expired_by_code()
            .withf(|code| code == "gone1")
            .times(1)
            .returning(|_| Ok(0));
        repo.expect_mark_expired_by_code()
            .withf(|code| code == "live1")
            .times(1)
            .returning(|_| Ok(1));

        let (cache, shutdown) = feed(&["gone1", "live1"]);
        let listener = listener(repo, cache);

        listener.run(shutdown).await;
        assert_eq!(*listener.state().borrow(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn test_origin_keys_are_ignored() {
        let mut repo = MockUrlRepository::new();
        repo.expect_mark_expired_by_code().never();

        let (cache, shutdown) = feed(&["origin:https://example.com/a"]);
        let listener = listener(repo, cache);

        listener.run(shutdown).await;
    }

    #[tokio::test]
    async fn test_mark_expired_twice_skips_second() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut repo = MockUrlRepository::new();
        repo.expect_mark_expired_by_code().returning(move |_| {
            Ok(if counter.fetch_add(1, Ordering::SeqCst) == 0 { 1 } else { 0 })
        });

        let listener = listener(repo, MockCacheService::new());

        listener.mark_expired("ab12c").await.unwrap();
        let second = listener.mark_expired("ab12c").await;
        assert!(matches!(
            second,
            Err(AppError::ReconciliationSkipped { ref code }) if code == "ab12c"
        ));

        // The loop-level handler absorbs the skip.
        listener.on_expired("ab12c").await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut repo = MockUrlRepository::new();
        repo.expect_mark_expired_by_code().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::internal("Database error", json!({})))
            } else {
                Ok(1)
            }
        });

        let listener = listener(repo, MockCacheService::new());

        listener.mark_expired("ab12c").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut repo = MockUrlRepository::new();
        repo.expect_mark_expired_by_code().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(AppError::internal("Database error", json!({})))
        });

        let listener = listener(repo, MockCacheService::new()).with_retry_attempts(2);

        let result = listener.mark_expired("ab12c").await;
        assert!(matches!(result, Err(AppError::Internal { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_listening() {
        let mut cache = MockCacheService::new();
        cache
            .expect_enable_expiration_notifications()
            .returning(|| Ok(()));
        cache
            .expect_subscribe_expirations()
            .returning(|| Ok(futures::stream::pending().boxed()));

        let listener = listener(MockUrlRepository::new(), cache);
        let mut state = listener.state();
        let (tx, rx) = watch::channel(false);

        let handle = listener.spawn(rx);
        state
            .wait_for(|s| *s == ListenerState::Listening)
            .await
            .unwrap();

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(*state.borrow(), ListenerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_feed_is_resubscribed() {
        let mut repo = MockUrlRepository::new();
        repo.expect_mark_expired_by_code()
            .withf(|code| code == "first")
            .times(1)
            .returning(|_| Ok(1));
        repo.expect_mark_expired_by_code()
            .withf(|code| code == "second")
            .times(1)
            .returning(|_| Ok(1));

        let (tx, rx) = watch::channel(false);
        let tx = Arc::new(tx);
        let subscriptions = Arc::new(AtomicUsize::new(0));
        let counter = subscriptions.clone();

        let mut cache = MockCacheService::new();
        cache
            .expect_enable_expiration_notifications()
            .returning(|| Ok(()));
        cache.expect_subscribe_expirations().returning(move || {
            match counter.fetch_add(1, Ordering::SeqCst) {
                // The connection drops after one event.
                0 => Ok(futures::stream::iter(vec!["first".to_string()]).boxed()),
                1 => Err(CacheError::NotificationError("connection refused".into())),
                _ => Ok(drain_then_stop(&["second"], &tx)),
            }
        });

        let listener = listener(repo, cache);
        listener.run(rx).await;

        assert_eq!(subscriptions.load(Ordering::SeqCst), 3);
        assert_eq!(*listener.state().borrow(), ListenerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_resubscribing() {
        let subscriptions = Arc::new(AtomicUsize::new(0));
        let counter = subscriptions.clone();

        let mut cache = MockCacheService::new();
        cache
            .expect_enable_expiration_notifications()
            .returning(|| Ok(()));
        cache.expect_subscribe_expirations().returning(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(futures::stream::empty().boxed())
            } else {
                Err(CacheError::NotificationError("connection refused".into()))
            }
        });

        let listener = listener(MockUrlRepository::new(), cache);
        let state = listener.state();
        let (tx, rx) = watch::channel(false);
        let handle = listener.spawn(rx);

        while subscriptions.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(*state.borrow(), ListenerState::Initializing);

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(*state.borrow(), ListenerState::Stopped);
    }
}

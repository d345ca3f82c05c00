// ── Polling coordinator ──
//
// Session lifecycle for one OmniLogic cloud connection: authentication,
// the periodic telemetry poll, and the atomically-published snapshot the
// entity layer reads from.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use secrecy::SecretString;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use poolside_api::{ApiError, OmniClient};

use crate::error::CoreError;
use crate::telemetry::{Snapshot, flatten};

/// Poll cadence and recovery tuning.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Interval between telemetry polls. Zero disables the background
    /// refresh task (one-shot use).
    pub poll_interval: Duration,
    /// Per-poll fetch timeout.
    pub request_timeout: Duration,
    /// Consecutive timeouts tolerated before a poll cycle is reported as
    /// failed instead of reusing the previous snapshot.
    pub timeout_bound: u32,
    /// User pH calibration offset, applied by the pH sensor entity.
    pub ph_offset: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            timeout_bound: 10,
            ph_offset: 0.0,
        }
    }
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Owns the cloud client,
/// the current flattened [`Snapshot`] (single writer, many readers), and
/// the background refresh task.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    client: OmniClient,
    config: CoordinatorConfig,
    /// Copy-on-publish: each successful poll stores a whole new snapshot,
    /// so readers never observe a partial rebuild.
    snapshot: ArcSwap<Snapshot>,
    /// Set once the first successful poll has published a snapshot.
    primed: AtomicBool,
    /// Consecutive poll timeouts; reset on any successful fetch.
    timeout_count: AtomicU32,
    /// Poll health observable by entities and consumers.
    available: watch::Sender<bool>,
    cancel: CancellationToken,
    refresh_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create a coordinator over an unauthenticated client. Does NOT
    /// connect -- call [`connect()`](Self::connect).
    pub fn new(client: OmniClient, config: CoordinatorConfig) -> Self {
        let (available, _) = watch::channel(false);
        Self {
            inner: Arc::new(CoordinatorInner {
                client,
                config,
                snapshot: ArcSwap::from_pointee(Snapshot::empty()),
                primed: AtomicBool::new(false),
                timeout_count: AtomicU32::new(0),
                available,
                cancel: CancellationToken::new(),
                refresh_handle: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub(crate) fn client(&self) -> &OmniClient {
        &self.inner.client
    }

    // ── Session lifecycle ────────────────────────────────────────

    /// Authenticate, run the first poll, and start the refresh task.
    ///
    /// Credential rejection is fatal (no retry); a failed first poll is a
    /// setup error since there is no prior snapshot to fall back to.
    pub async fn connect(&self, username: &str, password: &SecretString) -> Result<(), CoreError> {
        self.inner
            .client
            .connect(username, password)
            .await
            .map_err(|err| match err {
                ApiError::Authentication { message } => CoreError::Authentication { message },
                other => CoreError::Api(other),
            })?;

        self.poll().await?;

        if !self.inner.config.poll_interval.is_zero() {
            let coordinator = self.clone();
            let interval = self.inner.config.poll_interval;
            let cancel = self.inner.cancel.child_token();
            let handle = tokio::spawn(refresh_task(coordinator, interval, cancel));
            *self.inner.refresh_handle.lock().await = Some(handle);
        }

        info!("connected to OmniLogic cloud");
        Ok(())
    }

    /// Run one poll cycle: fetch, flatten, publish.
    ///
    /// A timeout within the consecutive bound keeps serving the previous
    /// snapshot; beyond the bound, or on any non-timeout cloud error,
    /// entities are marked unavailable and the failure surfaces upward.
    pub async fn poll(&self) -> Result<(), CoreError> {
        let fetch = self.inner.client.get_telemetry();
        match tokio::time::timeout(self.inner.config.request_timeout, fetch).await {
            Ok(Ok(raw)) => {
                let snapshot = flatten(&raw);
                debug!(items = snapshot.len(), "telemetry poll complete");
                self.inner.snapshot.store(Arc::new(snapshot));
                self.inner.primed.store(true, Ordering::Release);
                self.inner.timeout_count.store(0, Ordering::Relaxed);
                self.inner.available.send_replace(true);
                Ok(())
            }
            Ok(Err(source)) => {
                self.inner.available.send_replace(false);
                Err(CoreError::PollFailed { source })
            }
            Err(_elapsed) => {
                let consecutive = self.inner.timeout_count.fetch_add(1, Ordering::Relaxed) + 1;
                let bound = self.inner.config.timeout_bound;

                if consecutive <= bound && self.inner.primed.load(Ordering::Acquire) {
                    warn!(consecutive, bound, "telemetry poll timed out, reusing last snapshot");
                    return Ok(());
                }

                self.inner.available.send_replace(false);
                Err(CoreError::PollTimeout { consecutive })
            }
        }
    }

    /// Stop the refresh task and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.refresh_handle.lock().await.take() {
            let _ = handle.await;
        }
        self.inner.available.send_replace(false);
        debug!("coordinator shut down");
    }

    // ── State observation ────────────────────────────────────────

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot.load_full()
    }

    /// Current poll health.
    pub fn available(&self) -> bool {
        *self.inner.available.borrow()
    }

    /// Subscribe to poll health changes.
    pub fn availability(&self) -> watch::Receiver<bool> {
        self.inner.available.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn inject_snapshot(&self, snapshot: Snapshot) {
        self.inner.snapshot.store(Arc::new(snapshot));
        self.inner.primed.store(true, Ordering::Release);
        self.inner.available.send_replace(true);
    }
}

async fn refresh_task(coordinator: Coordinator, interval: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(interval);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                // Awaiting the poll inline keeps fetches strictly
                // sequential: no second fetch starts while one is in
                // flight.
                match coordinator.poll().await {
                    Ok(()) => {}
                    Err(CoreError::PollFailed { source }) if source.is_auth_failure() => {
                        warn!(error = %source, "session no longer authenticated, stopping refresh");
                        break;
                    }
                    Err(CoreError::PollFailed { source }) if source.is_transient() => {
                        debug!(error = %source, "transient poll failure, retrying next cycle");
                    }
                    Err(e) => warn!(error = %e, "periodic telemetry poll failed"),
                }
            }
        }
    }
}

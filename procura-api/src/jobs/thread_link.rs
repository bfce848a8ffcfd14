//! Thread Link Watch
//!
//! After an RFQ goes out, the mail backend creates its side of the thread
//! asynchronously. Each new supplier thread gets a watch: a bounded series
//! of lookups with growing delays that stores the external thread id once
//! the backend reports it.
//!
//! Every watch holds a child of the registry's cancellation token, so a
//! single watch can be dropped (`cancel`) and all of them stop when the
//! server shuts down (`cancel_all` or cancelling the parent token).

use crate::constants::{
    DEFAULT_LINK_BACKOFF_MULTIPLIER, DEFAULT_LINK_INITIAL_DELAY_MS, DEFAULT_LINK_MAX_ATTEMPTS,
    DEFAULT_LINK_MAX_DELAY_SECS,
};
use dashmap::DashMap;
use procura_core::{SupplierThread, TenantId, ThreadId};
use procura_parser::ParsingService;
use procura_storage::{ProcurementStore, ThreadUpdate};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Retry schedule for thread link lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLinkConfig {
    /// Delay before the first lookup (default: 2 seconds)
    pub initial_delay: Duration,

    /// Factor applied to the delay after every lookup (default: 2)
    pub multiplier: u32,

    /// Upper bound for a single delay (default: 60 seconds)
    pub max_delay: Duration,

    /// Lookups before giving up (default: 6)
    pub max_attempts: u32,
}

impl Default for ThreadLinkConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_LINK_INITIAL_DELAY_MS),
            multiplier: DEFAULT_LINK_BACKOFF_MULTIPLIER,
            max_delay: Duration::from_secs(DEFAULT_LINK_MAX_DELAY_SECS),
            max_attempts: DEFAULT_LINK_MAX_ATTEMPTS,
        }
    }
}

impl ThreadLinkConfig {
    /// Create ThreadLinkConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `PROCURA_LINK_INITIAL_DELAY_MS`: First delay (default: 2000)
    /// - `PROCURA_LINK_BACKOFF_MULTIPLIER`: Delay growth factor (default: 2)
    /// - `PROCURA_LINK_MAX_DELAY_SECS`: Delay cap (default: 60)
    /// - `PROCURA_LINK_MAX_ATTEMPTS`: Lookups before giving up (default: 6)
    pub fn from_env() -> Self {
        let initial_delay = Duration::from_millis(
            std::env::var("PROCURA_LINK_INITIAL_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LINK_INITIAL_DELAY_MS),
        );

        let multiplier = std::env::var("PROCURA_LINK_BACKOFF_MULTIPLIER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_LINK_BACKOFF_MULTIPLIER);

        let max_delay = Duration::from_secs(
            std::env::var("PROCURA_LINK_MAX_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LINK_MAX_DELAY_SECS),
        );

        let max_attempts = std::env::var("PROCURA_LINK_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_LINK_MAX_ATTEMPTS);

        Self {
            initial_delay,
            multiplier,
            max_delay,
            max_attempts,
        }
    }

    /// Short delays for local development.
    pub fn development() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            multiplier: 2,
            max_delay: Duration::from_secs(5),
            max_attempts: DEFAULT_LINK_MAX_ATTEMPTS,
        }
    }

    /// Delay before lookup number `attempt`, counting from zero.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct ThreadLinkMetrics {
    pub watches_started: AtomicU64,
    pub linked: AtomicU64,
    pub exhausted: AtomicU64,
    pub cancelled: AtomicU64,
    pub lookup_errors: AtomicU64,
}

impl ThreadLinkMetrics {
    pub fn snapshot(&self) -> ThreadLinkSnapshot {
        ThreadLinkSnapshot {
            watches_started: self.watches_started.load(Ordering::Relaxed),
            linked: self.linked.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            lookup_errors: self.lookup_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadLinkSnapshot {
    pub watches_started: u64,
    pub linked: u64,
    pub exhausted: u64,
    pub cancelled: u64,
    pub lookup_errors: u64,
}

// ============================================================================
// REGISTRY
// ============================================================================

/// How a watch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked(String),
    Exhausted,
    Cancelled,
    /// The backend reported a link but it could not be stored.
    Failed { reason: String },
}

struct PendingWatch {
    generation: u64,
    token: CancellationToken,
}

/// Tracks the pending link watches of all threads.
pub struct ThreadLinkRegistry {
    store: Arc<dyn ProcurementStore>,
    parser: Arc<dyn ParsingService>,
    config: ThreadLinkConfig,
    root: CancellationToken,
    pending: DashMap<ThreadId, PendingWatch>,
    next_generation: AtomicU64,
    metrics: ThreadLinkMetrics,
}

impl ThreadLinkRegistry {
    pub fn new(
        store: Arc<dyn ProcurementStore>,
        parser: Arc<dyn ParsingService>,
        config: ThreadLinkConfig,
    ) -> Self {
        Self {
            store,
            parser,
            config,
            root: CancellationToken::new(),
            pending: DashMap::new(),
            next_generation: AtomicU64::new(0),
            metrics: ThreadLinkMetrics::default(),
        }
    }

    /// Tie every watch to `parent`; cancelling it stops them all.
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.root = parent.child_token();
        self
    }

    /// Start watching `thread`. Replaces any earlier watch on the same
    /// thread. Returns `None` if the thread is already linked or the
    /// registry has been shut down.
    pub fn watch(self: &Arc<Self>, thread: &SupplierThread) -> Option<JoinHandle<LinkOutcome>> {
        if thread.external_thread_id.is_some() || self.root.is_cancelled() {
            return None;
        }

        let thread_id = thread.thread_id;
        let tenant_id = thread.tenant_id;
        let token = self.root.child_token();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        if let Some(previous) = self.pending.insert(
            thread_id,
            PendingWatch {
                generation,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }
        self.metrics.watches_started.fetch_add(1, Ordering::Relaxed);

        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            let outcome = this.run(thread_id, tenant_id, &token).await;
            this.pending
                .remove_if(&thread_id, |_, watch| watch.generation == generation);
            outcome
        }))
    }

    async fn run(
        &self,
        thread_id: ThreadId,
        tenant_id: TenantId,
        token: &CancellationToken,
    ) -> LinkOutcome {
        for attempt in 0..self.config.max_attempts {
            tokio::select! {
                biased;
                _ = token.cancelled() => return self.cancelled(thread_id),
                _ = tokio::time::sleep(self.config.delay_for(attempt)) => {}
            }

            let lookup = tokio::select! {
                biased;
                _ = token.cancelled() => return self.cancelled(thread_id),
                result = self.parser.lookup_thread_link(thread_id) => result,
            };

            match lookup {
                Ok(Some(external_thread_id)) => {
                    let update = ThreadUpdate {
                        external_thread_id: Some(external_thread_id.clone()),
                        ..Default::default()
                    };
                    return match self.store.thread_update(thread_id, tenant_id, update).await {
                        Ok(_) => {
                            self.metrics.linked.fetch_add(1, Ordering::Relaxed);
                            tracing::info!(
                                thread_id = %thread_id,
                                external_thread_id = %external_thread_id,
                                attempts = attempt + 1,
                                "Supplier thread linked"
                            );
                            LinkOutcome::Linked(external_thread_id)
                        }
                        Err(e) => {
                            tracing::error!(thread_id = %thread_id, error = %e, "Failed to store thread link");
                            LinkOutcome::Failed {
                                reason: e.to_string(),
                            }
                        }
                    };
                }
                Ok(None) => {
                    tracing::debug!(thread_id = %thread_id, attempt, "Thread not linked yet");
                }
                Err(e) => {
                    self.metrics.lookup_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(thread_id = %thread_id, attempt, error = %e, "Thread link lookup failed");
                }
            }
        }

        self.metrics.exhausted.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            thread_id = %thread_id,
            attempts = self.config.max_attempts,
            "Giving up on thread link"
        );
        LinkOutcome::Exhausted
    }

    fn cancelled(&self, thread_id: ThreadId) -> LinkOutcome {
        self.metrics.cancelled.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(thread_id = %thread_id, "Thread link watch cancelled");
        LinkOutcome::Cancelled
    }

    /// Cancel the watch on one thread. Returns false if none was pending.
    pub fn cancel(&self, thread_id: ThreadId) -> bool {
        match self.pending.remove(&thread_id) {
            Some((_, watch)) => {
                watch.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending watch and refuse new ones.
    pub fn cancel_all(&self) {
        self.root.cancel();
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn metrics(&self) -> ThreadLinkSnapshot {
        self.metrics.snapshot()
    }
}

impl std::fmt::Debug for ThreadLinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadLinkRegistry")
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .field("shut_down", &self.root.is_cancelled())
            .finish()
    }
}

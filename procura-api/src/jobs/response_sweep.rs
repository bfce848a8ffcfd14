//! Response Sweep Background Task
//!
//! Periodically closes supplier threads that never answered. A SENT thread
//! is marked NO_RESPONSE once one of its outbound messages has been overdue
//! for longer than the lifecycle's no-response threshold. Sending a
//! follow-up stamps the original message, so the clock restarts from the
//! follow-up's own deadline.
//!
//! After a thread is closed the owning quote request's status is derived
//! again, which moves it to REJECTED when nothing in the round is left
//! open and at least one supplier declined.
//!
//! # Configuration
//!
//! ```rust
//! use procura_api::jobs::ResponseSweepConfig;
//! use std::time::Duration;
//!
//! let config = ResponseSweepConfig {
//!     check_interval: Duration::from_secs(300), // Every five minutes
//!     batch_size: 100,                          // Threads marked per cycle
//!     enabled: true,
//! };
//! ```

use crate::constants::{DEFAULT_RESPONSE_SWEEP_BATCH_SIZE, DEFAULT_RESPONSE_SWEEP_INTERVAL_SECS};
use crate::services::{append_activity, load_quote_request, refresh_quote_request_status};
use chrono::Utc;
use procura_core::{
    ActivityKind, ActivityLogEntry, EntityIdType, EntityType, LifecycleConfig, SupplierThread,
    SupplierThreadStatus, Timestamp,
};
use procura_lifecycle::{overdue_in_thread, OverdueMessage};
use procura_storage::{ProcurementStore, ThreadUpdate};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the response sweep background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSweepConfig {
    /// How often to sweep (default: 5 minutes)
    pub check_interval: Duration,

    /// Maximum silent threads marked per cycle (default: 100). Threads
    /// that are not yet overdue do not count against it.
    pub batch_size: usize,

    /// Whether the task runs at all (default: true)
    pub enabled: bool,
}

impl Default for ResponseSweepConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_RESPONSE_SWEEP_INTERVAL_SECS),
            batch_size: DEFAULT_RESPONSE_SWEEP_BATCH_SIZE,
            enabled: true,
        }
    }
}

impl ResponseSweepConfig {
    /// Create ResponseSweepConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `PROCURA_SWEEP_INTERVAL_SECS`: How often to sweep (default: 300)
    /// - `PROCURA_SWEEP_BATCH_SIZE`: Max threads examined per cycle (default: 100)
    /// - `PROCURA_SWEEP_ENABLED`: Set to `false` to disable (default: true)
    pub fn from_env() -> Self {
        let check_interval = Duration::from_secs(
            std::env::var("PROCURA_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RESPONSE_SWEEP_INTERVAL_SECS),
        );

        let batch_size = std::env::var("PROCURA_SWEEP_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RESPONSE_SWEEP_BATCH_SIZE);

        let enabled = std::env::var("PROCURA_SWEEP_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            check_interval,
            batch_size,
            enabled,
        }
    }

    /// Sweep every ten seconds in small batches.
    pub fn development() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            batch_size: 10,
            enabled: true,
        }
    }

    pub fn production() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_RESPONSE_SWEEP_INTERVAL_SECS),
            batch_size: DEFAULT_RESPONSE_SWEEP_BATCH_SIZE,
            enabled: true,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for the response sweep since startup.
#[derive(Debug, Default)]
pub struct ResponseSweepMetrics {
    /// Threads marked NO_RESPONSE
    pub threads_marked: AtomicU64,

    /// SENT threads looked at
    pub threads_examined: AtomicU64,

    pub sweep_cycles: AtomicU64,

    pub sweep_errors: AtomicU64,
}

impl ResponseSweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ResponseSweepSnapshot {
        ResponseSweepSnapshot {
            threads_marked: self.threads_marked.load(Ordering::Relaxed),
            threads_examined: self.threads_examined.load(Ordering::Relaxed),
            sweep_cycles: self.sweep_cycles.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSweepSnapshot {
    pub threads_marked: u64,
    pub threads_examined: u64,
    pub sweep_cycles: u64,
    pub sweep_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that periodically marks silent threads NO_RESPONSE.
///
/// Runs until the shutdown signal is received and returns the metrics
/// collected over its lifetime.
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(response_sweep_task(
///     store,
///     LifecycleConfig::default(),
///     ResponseSweepConfig::default(),
///     shutdown_rx,
/// ));
///
/// // Later
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn response_sweep_task(
    store: Arc<dyn ProcurementStore>,
    lifecycle: LifecycleConfig,
    config: ResponseSweepConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ResponseSweepMetrics> {
    let metrics = Arc::new(ResponseSweepMetrics::new());

    if !config.enabled {
        tracing::info!("Response sweep disabled");
        return metrics;
    }

    let mut sweep_interval = interval(config.check_interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        check_interval_secs = config.check_interval.as_secs(),
        batch_size = config.batch_size,
        no_response_after_secs = lifecycle.no_response_after_secs,
        "Response sweep task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Response sweep task shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                sweep_once(store.as_ref(), &lifecycle, &config, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        threads_marked = snapshot.threads_marked,
        threads_examined = snapshot.threads_examined,
        sweep_cycles = snapshot.sweep_cycles,
        sweep_errors = snapshot.sweep_errors,
        "Response sweep task completed"
    );

    metrics
}

/// Run one sweep cycle. Returns the number of threads marked.
pub async fn sweep_once(
    store: &dyn ProcurementStore,
    lifecycle: &LifecycleConfig,
    config: &ResponseSweepConfig,
    metrics: &ResponseSweepMetrics,
) -> u64 {
    metrics.sweep_cycles.fetch_add(1, Ordering::Relaxed);

    let threads = match store.thread_list_by_status(SupplierThreadStatus::Sent).await {
        Ok(threads) => threads,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list SENT threads");
            metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
            return 0;
        }
    };

    let now = Utc::now();
    let mut marked = 0u64;

    for thread in threads {
        if marked >= config.batch_size as u64 {
            tracing::debug!(batch_size = config.batch_size, "Sweep batch full, deferring rest");
            break;
        }
        metrics.threads_examined.fetch_add(1, Ordering::Relaxed);
        let stale = match silent_overdue(store, lifecycle, &thread, now).await {
            Ok(Some(stale)) => stale,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(thread_id = %thread.thread_id, error = %e, "Failed to read thread ledger");
                metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };
        match mark_no_response(store, &thread, &stale).await {
            Ok(true) => {
                marked += 1;
                metrics.threads_marked.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(thread_id = %thread.thread_id, error = %e, "Failed to sweep thread");
                metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    if marked > 0 {
        tracing::info!(threads_marked = marked, "Response sweep cycle completed");
    } else {
        tracing::trace!("Response sweep cycle completed with no silent threads");
    }
    marked
}

/// The overdue message that makes a thread silent, if any: no inbound mail
/// at all and a deadline more than the no-response threshold ago.
async fn silent_overdue(
    store: &dyn ProcurementStore,
    lifecycle: &LifecycleConfig,
    thread: &SupplierThread,
    now: Timestamp,
) -> crate::error::ApiResult<Option<OverdueMessage>> {
    let ledger = store
        .message_list_by_thread(thread.thread_id, thread.tenant_id)
        .await?;
    if ledger.iter().any(|m| m.is_inbound()) {
        return Ok(None);
    }

    let threshold = lifecycle.no_response_after();
    Ok(overdue_in_thread(&ledger, now)
        .into_iter()
        .find(|o| o.expected_response_by + threshold <= now))
}

/// Mark a silent thread NO_RESPONSE. Returns whether it was marked.
async fn mark_no_response(
    store: &dyn ProcurementStore,
    thread: &SupplierThread,
    stale: &OverdueMessage,
) -> crate::error::ApiResult<bool> {
    match store
        .thread_compare_and_set(
            thread.thread_id,
            thread.tenant_id,
            &[SupplierThreadStatus::Sent],
            ThreadUpdate::status(SupplierThreadStatus::NoResponse),
        )
        .await
    {
        Ok(_) => {}
        Err(e) if e.is_conflict() => {
            tracing::debug!(thread_id = %thread.thread_id, "Thread moved during sweep, skipping");
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    }

    tracing::warn!(
        thread_id = %thread.thread_id,
        supplier_id = %thread.supplier_id,
        days_overdue = stale.days_overdue,
        "Supplier thread marked NO_RESPONSE"
    );

    append_activity(
        store,
        ActivityLogEntry::new(
            thread.tenant_id,
            EntityType::QuoteRequest,
            thread.quote_request_id.as_uuid(),
            ActivityKind::ThreadMarkedNoResponse,
            format!(
                "Supplier {} did not respond within {} day(s)",
                thread.supplier_id, stale.days_overdue
            ),
        )
        .with_details(json!({
            "thread_id": thread.thread_id,
            "message_id": stale.message_id,
        })),
    )
    .await;

    let qr = load_quote_request(store, thread.tenant_id, thread.quote_request_id).await?;
    refresh_quote_request_status(store, qr).await?;
    Ok(true)
}

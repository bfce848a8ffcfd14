//! Conversion Service
//!
//! Accept, reject and reopen. Accepting a supplier's quote spans the quote
//! request, every thread of the current round and a new order, with no
//! transaction covering them. Each write is recorded in a
//! [`CompensationJournal`] together with the value it replaced, and a
//! failure part-way unwinds the journal in reverse.

use chrono::Utc;
use procura_core::{
    ActivityKind, ActivityLogEntry, EntityIdType, EntityType, Order, OrderId, OrderItem,
    OrderItemId, OrderStatus, QuoteRequest, QuoteRequestId, QuoteRequestStatus, SupplierId,
    SupplierThread, SupplierThreadStatus, TenantId, ThreadId,
};
use procura_lifecycle::current_round;
use procura_storage::{ProcurementStore, QuoteRequestUpdate, ThreadUpdate};
use serde_json::json;

use super::lookup::{append_activity, load_quote_request, load_thread};
use super::quote_service::refresh_quote_request_status;
use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::types::{AcceptOutcome, AcceptPreview, RejectOutcome, ThreadSelection};

const ACCEPTABLE: [QuoteRequestStatus; 2] = [
    QuoteRequestStatus::Received,
    QuoteRequestStatus::UnderReview,
];

// ============================================================================
// COMPENSATION JOURNAL
// ============================================================================

/// Undo action for one committed write, holding the value it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompensationStep {
    RestoreQuoteRequest {
        status: QuoteRequestStatus,
        selected_supplier_id: Option<SupplierId>,
    },
    RestoreThread {
        thread_id: ThreadId,
        status: SupplierThreadStatus,
    },
    DiscardOrder {
        order_id: OrderId,
    },
}

/// Result of unwinding a journal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompensationReport {
    pub restored: usize,
    pub failed: usize,
}

impl CompensationReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Ordered record of the writes made by one accept attempt.
#[derive(Debug, Clone)]
pub struct CompensationJournal {
    quote_request_id: QuoteRequestId,
    tenant_id: TenantId,
    steps: Vec<CompensationStep>,
}

impl CompensationJournal {
    pub fn new(quote_request_id: QuoteRequestId, tenant_id: TenantId) -> Self {
        Self {
            quote_request_id,
            tenant_id,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, step: CompensationStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[CompensationStep] {
        &self.steps
    }

    /// Undo every recorded write, newest first.
    ///
    /// Undo writes are unguarded: the attempt still owns these records. A
    /// failed step is logged and the remaining steps still run.
    pub async fn unwind(self, store: &dyn ProcurementStore) -> CompensationReport {
        let mut report = CompensationReport::default();

        for step in self.steps.iter().rev() {
            let result = match step {
                CompensationStep::RestoreQuoteRequest {
                    status,
                    selected_supplier_id,
                } => store
                    .quote_request_update(
                        self.quote_request_id,
                        self.tenant_id,
                        QuoteRequestUpdate {
                            status: Some(*status),
                            selected_supplier_id: Some(*selected_supplier_id),
                            ..Default::default()
                        },
                    )
                    .await
                    .map(|_| ()),
                CompensationStep::RestoreThread { thread_id, status } => store
                    .thread_update(*thread_id, self.tenant_id, ThreadUpdate::status(*status))
                    .await
                    .map(|_| ()),
                CompensationStep::DiscardOrder { order_id } => {
                    store.order_discard(*order_id, self.tenant_id).await
                }
            };

            match result {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        quote_request_id = %self.quote_request_id,
                        step = ?step,
                        error = %e,
                        "Compensation step failed"
                    );
                }
            }
        }

        report
    }
}

// ============================================================================
// TARGET RESOLUTION
// ============================================================================

/// Resolve and validate the thread an accept or reject targets.
async fn resolve_target(
    store: &dyn ProcurementStore,
    qr: &QuoteRequest,
    selection: ThreadSelection,
) -> ApiResult<SupplierThread> {
    let thread_id = selection
        .thread_id
        .ok_or_else(|| ApiError::missing_field("thread_id"))?;
    let thread = load_thread(store, qr.tenant_id, thread_id).await?;

    if thread.quote_request_id != qr.quote_request_id {
        return Err(ApiError::validation_failed(format!(
            "Thread {} does not belong to quote request {}",
            thread_id, qr.quote_request_id
        )));
    }
    if thread.round != qr.round {
        return Err(ApiError::validation_failed(format!(
            "Thread {} belongs to round {}, current round is {}",
            thread_id, thread.round, qr.round
        )));
    }
    if let Some(supplier_id) = selection.supplier_id {
        if supplier_id != thread.supplier_id {
            return Err(ApiError::validation_failed(format!(
                "Thread {} is not with supplier {}",
                thread_id, supplier_id
            )));
        }
    }

    Ok(thread)
}

fn require_open(thread: &SupplierThread, action: &str) -> ApiResult<()> {
    if thread.status.is_open() {
        Ok(())
    } else {
        Err(ApiError::state_conflict(format!(
            "Supplier thread is in '{}' state, cannot {} (expected SENT, RESPONDED or NO_RESPONSE)",
            thread.status, action
        )))
    }
}

async fn load_acceptable(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    id: QuoteRequestId,
) -> ApiResult<QuoteRequest> {
    let qr = load_quote_request(store, tenant_id, id).await?;
    let qr = refresh_quote_request_status(store, qr).await?;
    if !qr.status.can_accept() {
        return Err(ApiError::state_conflict(format!(
            "Quote request is in '{}' state, cannot accept (expected RECEIVED or UNDER_REVIEW)",
            qr.status
        )));
    }
    Ok(qr)
}

// ============================================================================
// ACCEPT
// ============================================================================

/// Summarize what accepting `thread_id` would do, without changing anything.
///
/// # Errors
/// Returns error if the request cannot be accepted, the thread does not
/// belong to its current round, or the supplier priced nothing.
pub async fn preview_accept(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    id: QuoteRequestId,
    thread_id: ThreadId,
) -> ApiResult<AcceptPreview> {
    let qr = load_acceptable(store, tenant_id, id).await?;
    let target = resolve_target(
        store,
        &qr,
        ThreadSelection {
            thread_id: Some(thread_id),
            supplier_id: None,
        },
    )
    .await?;
    require_open(&target, "accept")?;

    let items: Vec<_> = qr
        .priced_items_for(target.supplier_id)
        .into_iter()
        .cloned()
        .collect();
    if items.is_empty() {
        return Err(ApiError::validation_failed(format!(
            "Supplier {} has not priced any line items",
            target.supplier_id
        )));
    }

    let threads = store.thread_list_by_quote_request(id, tenant_id).await?;
    let declined_thread_ids: Vec<ThreadId> = declined(&threads, &qr, &target)
        .map(|t| t.thread_id)
        .collect();

    Ok(AcceptPreview {
        quote_request_id: id,
        thread_id: target.thread_id,
        supplier_id: target.supplier_id,
        total_cents: qr.supplier_total_cents(target.supplier_id),
        items,
        declined_count: declined_thread_ids.len(),
        declined_thread_ids,
    })
}

/// Threads of the current round that accepting `target` marks NOT_SELECTED.
fn declined<'a>(
    threads: &'a [SupplierThread],
    qr: &QuoteRequest,
    target: &'a SupplierThread,
) -> impl Iterator<Item = &'a SupplierThread> + 'a {
    current_round(threads, qr.round).filter(move |t| {
        t.thread_id != target.thread_id
            && !matches!(
                t.status,
                SupplierThreadStatus::Rejected | SupplierThreadStatus::NotSelected
            )
    })
}

fn build_order(qr: &QuoteRequest, target: &SupplierThread) -> (Order, Vec<OrderItem>) {
    let now = Utc::now();
    let order_id = OrderId::now_v7();

    let items: Vec<OrderItem> = qr
        .priced_items_for(target.supplier_id)
        .into_iter()
        .filter_map(|line| {
            let unit_price_cents = line.unit_price_cents?;
            Some(OrderItem {
                order_item_id: OrderItemId::now_v7(),
                order_id,
                tenant_id: qr.tenant_id,
                source_line_item_id: line.line_item_id,
                part_number: line.part_number.clone(),
                description: line.description.clone(),
                quantity: line.quantity,
                unit_price_cents,
                line_total_cents: line.line_total_cents().unwrap_or_default(),
                availability: line.availability.clone(),
                tracking_number: None,
                expected_delivery: None,
                actual_delivery: None,
                updated_at: now,
            })
        })
        .collect();

    let subtotal_cents = items
        .iter()
        .fold(0i64, |acc, item| acc.saturating_add(item.line_total_cents));
    let order = Order {
        order_id,
        tenant_id: qr.tenant_id,
        quote_request_id: qr.quote_request_id,
        supplier_id: target.supplier_id,
        thread_id: target.thread_id,
        status: OrderStatus::Pending,
        tracking_number: None,
        shipping_carrier: None,
        expected_delivery: None,
        actual_delivery: None,
        subtotal_cents,
        total_cents: subtotal_cents,
        created_at: now,
        updated_at: now,
    };
    (order, items)
}

/// Accept one supplier's quote and convert it into an order.
///
/// Steps: approve the request and select the supplier, accept the target
/// thread, mark the rest of the round NOT_SELECTED, create the order, then
/// mark the request CONVERTED_TO_ORDER. If any step after approval fails,
/// every write made so far is undone and the original error is returned.
///
/// # Arguments
/// - `store`: Procurement store
/// - `actor`: Caller; must be allowed to mutate
/// - `id`: Quote request to convert
/// - `selection`: Target thread, optionally with the supplier to cross-check
///
/// # Errors
/// Returns `StateConflict` if the request is not RECEIVED or UNDER_REVIEW,
/// `ConcurrentModification` if another accept won the race, validation
/// errors for a bad target, and the failing step's error after compensation.
pub async fn accept_quote(
    store: &dyn ProcurementStore,
    actor: &Actor,
    id: QuoteRequestId,
    selection: ThreadSelection,
) -> ApiResult<AcceptOutcome> {
    actor.require_mutation()?;
    let qr = load_acceptable(store, actor.tenant_id, id).await?;
    let target = resolve_target(store, &qr, selection).await?;
    require_open(&target, "accept")?;

    if qr.priced_items_for(target.supplier_id).is_empty() {
        return Err(ApiError::validation_failed(format!(
            "Supplier {} has not priced any line items",
            target.supplier_id
        )));
    }

    // Only one attempt can move the request out of the acceptable states.
    let approved = store
        .quote_request_compare_and_set(
            id,
            actor.tenant_id,
            &ACCEPTABLE,
            QuoteRequestUpdate {
                status: Some(QuoteRequestStatus::Approved),
                selected_supplier_id: Some(Some(target.supplier_id)),
                ..Default::default()
            },
        )
        .await?;

    let mut journal = CompensationJournal::new(id, actor.tenant_id);
    journal.record(CompensationStep::RestoreQuoteRequest {
        status: qr.status,
        selected_supplier_id: qr.selected_supplier_id,
    });

    match convert(store, &mut journal, &approved, &target).await {
        Ok(outcome) => {
            append_activity(
                store,
                ActivityLogEntry::new(
                    actor.tenant_id,
                    EntityType::QuoteRequest,
                    id.as_uuid(),
                    ActivityKind::QuoteAccepted,
                    format!(
                        "Accepted quote from supplier {}, order {} created",
                        target.supplier_id, outcome.order.order_id
                    ),
                )
                .with_actor(Some(actor.actor_id))
                .with_details(json!({
                    "thread_id": target.thread_id,
                    "supplier_id": target.supplier_id,
                    "order_id": outcome.order.order_id,
                    "total_cents": outcome.order.total_cents,
                    "declined_thread_ids": outcome.declined_thread_ids,
                })),
            )
            .await;

            tracing::info!(
                quote_request_id = %id,
                order_id = %outcome.order.order_id,
                supplier_id = %target.supplier_id,
                "Quote accepted and converted to order"
            );
            Ok(outcome)
        }
        Err(err) => {
            tracing::warn!(
                quote_request_id = %id,
                error = %err,
                steps = journal.steps().len(),
                "Conversion failed, compensating"
            );
            let report = journal.unwind(store).await;
            if !report.is_clean() {
                tracing::error!(
                    quote_request_id = %id,
                    restored = report.restored,
                    failed = report.failed,
                    "Compensation incomplete"
                );
            }

            append_activity(
                store,
                ActivityLogEntry::new(
                    actor.tenant_id,
                    EntityType::QuoteRequest,
                    id.as_uuid(),
                    ActivityKind::ConversionCompensated,
                    "Order conversion failed and was rolled back",
                )
                .with_actor(Some(actor.actor_id))
                .with_details(json!({
                    "thread_id": target.thread_id,
                    "restored": report.restored,
                    "failed": report.failed,
                    "error_code": err.code,
                })),
            )
            .await;

            Err(err)
        }
    }
}

/// The compensated part of an accept. Every write is journaled before the
/// next one starts.
async fn convert(
    store: &dyn ProcurementStore,
    journal: &mut CompensationJournal,
    qr: &QuoteRequest,
    target: &SupplierThread,
) -> ApiResult<AcceptOutcome> {
    let tenant_id = qr.tenant_id;

    store
        .thread_compare_and_set(
            target.thread_id,
            tenant_id,
            &[target.status],
            ThreadUpdate::status(SupplierThreadStatus::Accepted),
        )
        .await?;
    journal.record(CompensationStep::RestoreThread {
        thread_id: target.thread_id,
        status: target.status,
    });

    let threads = store
        .thread_list_by_quote_request(qr.quote_request_id, tenant_id)
        .await?;
    let mut declined_thread_ids = Vec::new();
    for other in declined(&threads, qr, target) {
        store
            .thread_compare_and_set(
                other.thread_id,
                tenant_id,
                &[other.status],
                ThreadUpdate::status(SupplierThreadStatus::NotSelected),
            )
            .await?;
        journal.record(CompensationStep::RestoreThread {
            thread_id: other.thread_id,
            status: other.status,
        });
        declined_thread_ids.push(other.thread_id);
    }

    let (order, items) = build_order(qr, target);
    store.order_insert(&order, &items).await?;
    journal.record(CompensationStep::DiscardOrder {
        order_id: order.order_id,
    });

    let quote_request = store
        .quote_request_compare_and_set(
            qr.quote_request_id,
            tenant_id,
            &[QuoteRequestStatus::Approved],
            QuoteRequestUpdate::status(QuoteRequestStatus::ConvertedToOrder),
        )
        .await?;

    Ok(AcceptOutcome {
        quote_request,
        order,
        items,
        declined_thread_ids,
    })
}

// ============================================================================
// REJECT / REOPEN
// ============================================================================

/// Reject one supplier's quote and re-derive the request's status.
///
/// # Errors
/// Returns error if the request is not negotiating or the thread is closed.
pub async fn reject_quote(
    store: &dyn ProcurementStore,
    actor: &Actor,
    id: QuoteRequestId,
    selection: ThreadSelection,
) -> ApiResult<RejectOutcome> {
    actor.require_mutation()?;
    let qr = load_quote_request(store, actor.tenant_id, id).await?;
    if !qr.status.is_negotiating() {
        return Err(ApiError::state_conflict(format!(
            "Quote request is in '{}' state, cannot reject (expected SENT, RECEIVED or UNDER_REVIEW)",
            qr.status
        )));
    }

    let target = resolve_target(store, &qr, selection).await?;
    require_open(&target, "reject")?;

    let thread = store
        .thread_compare_and_set(
            target.thread_id,
            actor.tenant_id,
            &[target.status],
            ThreadUpdate::status(SupplierThreadStatus::Rejected),
        )
        .await?;

    append_activity(
        store,
        ActivityLogEntry::new(
            actor.tenant_id,
            EntityType::QuoteRequest,
            id.as_uuid(),
            ActivityKind::QuoteRejected,
            format!("Rejected quote from supplier {}", thread.supplier_id),
        )
        .with_actor(Some(actor.actor_id))
        .with_details(json!({ "thread_id": thread.thread_id, "previous_status": target.status })),
    )
    .await;

    let quote_request = refresh_quote_request_status(store, qr).await?;
    tracing::info!(
        quote_request_id = %id,
        thread_id = %thread.thread_id,
        quote_request_status = %quote_request.status,
        "Supplier quote rejected"
    );

    Ok(RejectOutcome {
        thread,
        quote_request,
    })
}

/// Reopen a REJECTED or EXPIRED request (-> Sent, next round).
///
/// Earlier threads keep their status; only threads started in the new
/// round take part in derivation.
///
/// # Errors
/// Returns error if the request is not REJECTED or EXPIRED.
pub async fn reopen_quote_request(
    store: &dyn ProcurementStore,
    actor: &Actor,
    id: QuoteRequestId,
) -> ApiResult<QuoteRequest> {
    actor.require_mutation()?;
    let qr = load_quote_request(store, actor.tenant_id, id).await?;
    if !qr.status.can_reopen() {
        return Err(ApiError::state_conflict(format!(
            "Quote request is in '{}' state, cannot reopen (expected REJECTED or EXPIRED)",
            qr.status
        )));
    }

    let next_round = qr.round.saturating_add(1);
    let reopened = store
        .quote_request_compare_and_set(
            id,
            actor.tenant_id,
            &[qr.status],
            QuoteRequestUpdate {
                status: Some(QuoteRequestStatus::Sent),
                selected_supplier_id: Some(None),
                round: Some(next_round),
                ..Default::default()
            },
        )
        .await?;

    append_activity(
        store,
        ActivityLogEntry::new(
            actor.tenant_id,
            EntityType::QuoteRequest,
            id.as_uuid(),
            ActivityKind::QuoteReopened,
            format!("Quote request reopened for round {}", next_round),
        )
        .with_actor(Some(actor.actor_id))
        .with_details(json!({ "from": qr.status, "round": next_round })),
    )
    .await;

    tracing::info!(quote_request_id = %id, round = next_round, "Quote request reopened");
    Ok(reopened)
}

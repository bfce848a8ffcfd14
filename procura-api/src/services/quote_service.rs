//! Quote Request Service
//!
//! Intake, sending, supplier management and aggregate status refresh for
//! quote requests.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::try_join_all;
use procura_core::{
    ActivityKind, ActivityLogEntry, EntityIdType, EntityType, LifecycleConfig, LineItemId,
    Message, QuoteLineItem, QuoteRequest, QuoteRequestId, QuoteRequestStatus, SupplierId,
    SupplierThread, SupplierThreadStatus, TenantId, ThreadId,
};
use procura_lifecycle::{current_round, derive_status, ThreadSnapshot};
use procura_storage::{ProcurementStore, QuoteRequestUpdate};
use serde_json::json;

use super::lookup::{append_activity, load_quote_request};
use crate::auth::Actor;
use crate::constants::{MAX_LINE_ITEMS, MAX_SUPPLIERS};
use crate::error::{ApiError, ApiResult};
use crate::jobs::ThreadLinkRegistry;
use crate::types::{
    AddSupplierRequest, CreateQuoteRequest, QuoteRequestDetail, RecordPricingRequest,
};

/// Statuses during which suppliers can be added and priced.
const NEGOTIATING: [QuoteRequestStatus; 3] = [
    QuoteRequestStatus::Sent,
    QuoteRequestStatus::Received,
    QuoteRequestStatus::UnderReview,
];

const MAX_REFRESH_ATTEMPTS: usize = 3;

// ============================================================================
// STATUS REFRESH
// ============================================================================

/// Re-derive a quote request's status from a fresh read of its current
/// round and persist it if it changed.
///
/// The write is guarded by the status the derivation started from. If
/// another writer got there first the record is re-read and derived again.
/// An `APPROVED` request is left alone: it only exists while an accept is
/// in flight, and that accept owns the next transition.
///
/// # Errors
/// Returns error if the store cannot be read or written.
pub async fn refresh_quote_request_status(
    store: &dyn ProcurementStore,
    qr: QuoteRequest,
) -> ApiResult<QuoteRequest> {
    let mut qr = qr;

    for _ in 0..MAX_REFRESH_ATTEMPTS {
        if qr.status == QuoteRequestStatus::Approved {
            return Ok(qr);
        }

        let threads = store
            .thread_list_by_quote_request(qr.quote_request_id, qr.tenant_id)
            .await?;
        let round: Vec<&SupplierThread> = current_round(&threads, qr.round).collect();
        let ledgers = try_join_all(
            round
                .iter()
                .map(|t| store.message_list_by_thread(t.thread_id, t.tenant_id)),
        )
        .await?;
        let snapshots: Vec<ThreadSnapshot> = round
            .iter()
            .zip(&ledgers)
            .map(|(t, ledger)| ThreadSnapshot::from_ledger(t, ledger))
            .collect();

        let derived = derive_status(qr.status, &snapshots);
        if derived == qr.status {
            return Ok(qr);
        }

        match store
            .quote_request_compare_and_set(
                qr.quote_request_id,
                qr.tenant_id,
                &[qr.status],
                QuoteRequestUpdate::status(derived),
            )
            .await
        {
            Ok(updated) => {
                tracing::info!(
                    quote_request_id = %qr.quote_request_id,
                    from = %qr.status,
                    to = %derived,
                    "Quote request status derived"
                );
                return Ok(updated);
            }
            Err(e) if e.is_conflict() => {
                tracing::debug!(
                    quote_request_id = %qr.quote_request_id,
                    error = %e,
                    "Status moved during derivation, re-reading"
                );
                qr = load_quote_request(store, qr.tenant_id, qr.quote_request_id).await?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(qr)
}

// ============================================================================
// INTAKE
// ============================================================================

/// Create a DRAFT quote request.
///
/// # Errors
/// Returns error if the actor may not mutate, or the request is empty,
/// oversized, or holds a line with zero quantity.
pub async fn create_quote_request(
    store: &dyn ProcurementStore,
    actor: &Actor,
    req: CreateQuoteRequest,
) -> ApiResult<QuoteRequest> {
    actor.require_mutation()?;

    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::missing_field("title"));
    }
    if req.line_items.is_empty() {
        return Err(ApiError::validation_failed(
            "A quote request needs at least one line item",
        ));
    }
    if req.line_items.len() > MAX_LINE_ITEMS {
        return Err(ApiError::validation_failed(format!(
            "At most {} line items are allowed",
            MAX_LINE_ITEMS
        )));
    }

    let mut line_items = Vec::with_capacity(req.line_items.len());
    for item in req.line_items {
        let part_number = item.part_number.trim();
        if part_number.is_empty() {
            return Err(ApiError::missing_field("line_items.part_number"));
        }
        if item.quantity == 0 {
            return Err(ApiError::validation_failed(format!(
                "Quantity for part {} must be positive",
                part_number
            )));
        }
        line_items.push(QuoteLineItem {
            line_item_id: LineItemId::now_v7(),
            part_number: part_number.to_string(),
            description: item.description,
            quantity: item.quantity,
            supplier_id: None,
            unit_price_cents: None,
            availability: None,
        });
    }

    let mut seen = HashSet::new();
    let invited: Vec<SupplierId> = req
        .supplier_ids
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect();
    if invited.len() > MAX_SUPPLIERS {
        return Err(ApiError::validation_failed(format!(
            "At most {} suppliers can be invited",
            MAX_SUPPLIERS
        )));
    }

    let now = Utc::now();
    let qr = QuoteRequest {
        quote_request_id: QuoteRequestId::now_v7(),
        tenant_id: actor.tenant_id,
        title: title.to_string(),
        status: QuoteRequestStatus::Draft,
        selected_supplier_id: None,
        round: 1,
        invited_supplier_ids: invited,
        line_items,
        created_by: Some(actor.actor_id),
        created_at: now,
        updated_at: now,
    };
    store.quote_request_insert(&qr).await?;

    tracing::info!(
        quote_request_id = %qr.quote_request_id,
        tenant_id = %qr.tenant_id,
        line_items = qr.line_items.len(),
        "Quote request created"
    );
    Ok(qr)
}

/// Fetch a quote request with all of its threads and a freshly derived status.
pub async fn get_quote_request(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    id: QuoteRequestId,
) -> ApiResult<QuoteRequestDetail> {
    let qr = load_quote_request(store, tenant_id, id).await?;
    let quote_request = refresh_quote_request_status(store, qr).await?;
    let mut threads = store.thread_list_by_quote_request(id, tenant_id).await?;
    threads.sort_by_key(|t| (t.round, t.created_at));

    Ok(QuoteRequestDetail {
        quote_request,
        threads,
    })
}

// ============================================================================
// SENDING
// ============================================================================

fn rfq_body(qr: &QuoteRequest) -> String {
    let mut body = format!("Please quote the following parts for \"{}\":\n", qr.title);
    for item in qr.line_items.iter().filter(|i| i.supplier_id.is_none()) {
        body.push_str(&format!("- {} x {}", item.quantity, item.part_number));
        if !item.description.is_empty() {
            body.push_str(&format!(" ({})", item.description));
        }
        body.push('\n');
    }
    body
}

/// Open a SENT thread for `supplier_id` in the current round and append the
/// RFQ to its ledger.
pub async fn start_thread(
    store: &dyn ProcurementStore,
    lifecycle: &LifecycleConfig,
    qr: &QuoteRequest,
    supplier_id: SupplierId,
) -> ApiResult<SupplierThread> {
    let now = Utc::now();
    let thread = SupplierThread {
        thread_id: ThreadId::now_v7(),
        quote_request_id: qr.quote_request_id,
        tenant_id: qr.tenant_id,
        supplier_id,
        status: SupplierThreadStatus::Sent,
        round: qr.round,
        external_thread_id: None,
        created_at: now,
        updated_at: now,
    };
    store.thread_insert(&thread).await?;

    let mut rfq = Message::outbound(
        thread.thread_id,
        thread.tenant_id,
        rfq_body(qr),
        now,
        Some(now + lifecycle.response_window()),
    );
    rfq.subject = Some(format!("Request for quote: {}", qr.title));
    store.message_append(&rfq).await?;

    tracing::debug!(
        quote_request_id = %qr.quote_request_id,
        thread_id = %thread.thread_id,
        supplier_id = %supplier_id,
        round = qr.round,
        "Supplier thread started"
    );
    Ok(thread)
}

/// Send a DRAFT quote request (Draft -> Sent transition).
///
/// # Arguments
/// - `store`: Procurement store
/// - `links`: Registry that watches each new thread until the mail
///   service links it
/// - `lifecycle`: Supplies the response window for the RFQ deadline
/// - `actor`: Caller
/// - `id`: Quote request to send
///
/// # Errors
/// Returns error if the request is not in Draft state or has no invited
/// suppliers.
pub async fn send_quote_request(
    store: &dyn ProcurementStore,
    links: &Arc<ThreadLinkRegistry>,
    lifecycle: &LifecycleConfig,
    actor: &Actor,
    id: QuoteRequestId,
) -> ApiResult<QuoteRequestDetail> {
    actor.require_mutation()?;
    let qr = load_quote_request(store, actor.tenant_id, id).await?;

    if qr.status != QuoteRequestStatus::Draft {
        return Err(ApiError::state_conflict(format!(
            "Quote request is in '{}' state, cannot send (expected DRAFT)",
            qr.status
        )));
    }
    if qr.invited_supplier_ids.is_empty() {
        return Err(ApiError::validation_failed(
            "Quote request has no invited suppliers",
        ));
    }

    let qr = store
        .quote_request_compare_and_set(
            id,
            actor.tenant_id,
            &[QuoteRequestStatus::Draft],
            QuoteRequestUpdate::status(QuoteRequestStatus::Sent),
        )
        .await?;

    let mut threads = Vec::with_capacity(qr.invited_supplier_ids.len());
    for supplier_id in &qr.invited_supplier_ids {
        let thread = start_thread(store, lifecycle, &qr, *supplier_id).await?;
        links.watch(&thread);
        threads.push(thread);
    }

    append_activity(
        store,
        ActivityLogEntry::new(
            qr.tenant_id,
            EntityType::QuoteRequest,
            qr.quote_request_id.as_uuid(),
            ActivityKind::QuoteSent,
            format!("Quote request sent to {} suppliers", threads.len()),
        )
        .with_actor(Some(actor.actor_id))
        .with_details(json!({ "round": qr.round, "supplier_count": threads.len() })),
    )
    .await;

    tracing::info!(
        quote_request_id = %qr.quote_request_id,
        suppliers = threads.len(),
        "Quote request sent"
    );
    Ok(QuoteRequestDetail {
        quote_request: qr,
        threads,
    })
}

/// Invite one more supplier into the current round.
///
/// # Errors
/// Returns error if the request is not negotiating or the supplier already
/// has a thread in the current round.
pub async fn add_supplier(
    store: &dyn ProcurementStore,
    links: &Arc<ThreadLinkRegistry>,
    lifecycle: &LifecycleConfig,
    actor: &Actor,
    id: QuoteRequestId,
    req: AddSupplierRequest,
) -> ApiResult<SupplierThread> {
    actor.require_mutation()?;
    let supplier_id = req
        .supplier_id
        .ok_or_else(|| ApiError::missing_field("supplier_id"))?;
    let qr = load_quote_request(store, actor.tenant_id, id).await?;

    if !qr.status.is_negotiating() {
        return Err(ApiError::state_conflict(format!(
            "Quote request is in '{}' state, cannot add suppliers (expected SENT, RECEIVED or UNDER_REVIEW)",
            qr.status
        )));
    }

    let threads = store.thread_list_by_quote_request(id, actor.tenant_id).await?;
    if current_round(&threads, qr.round).any(|t| t.supplier_id == supplier_id) {
        return Err(ApiError::state_conflict(format!(
            "Supplier {} already has a thread in round {}",
            supplier_id, qr.round
        )));
    }
    if current_round(&threads, qr.round).count() >= MAX_SUPPLIERS {
        return Err(ApiError::validation_failed(format!(
            "At most {} suppliers can be invited",
            MAX_SUPPLIERS
        )));
    }

    let mut invited = qr.invited_supplier_ids.clone();
    if !invited.contains(&supplier_id) {
        invited.push(supplier_id);
    }
    let qr = store
        .quote_request_compare_and_set(
            id,
            actor.tenant_id,
            &NEGOTIATING,
            QuoteRequestUpdate {
                invited_supplier_ids: Some(invited),
                ..Default::default()
            },
        )
        .await?;

    let thread = start_thread(store, lifecycle, &qr, supplier_id).await?;
    links.watch(&thread);

    append_activity(
        store,
        ActivityLogEntry::new(
            qr.tenant_id,
            EntityType::QuoteRequest,
            qr.quote_request_id.as_uuid(),
            ActivityKind::SupplierAdded,
            format!("Supplier {} added in round {}", supplier_id, qr.round),
        )
        .with_actor(Some(actor.actor_id))
        .with_details(json!({ "supplier_id": supplier_id, "thread_id": thread.thread_id })),
    )
    .await;

    refresh_quote_request_status(store, qr).await?;
    Ok(thread)
}

/// Replace the priced line items a supplier quoted.
///
/// # Errors
/// Returns error if the request is not negotiating, the supplier has no
/// thread in the current round, or a line is invalid.
pub async fn record_pricing(
    store: &dyn ProcurementStore,
    actor: &Actor,
    id: QuoteRequestId,
    req: RecordPricingRequest,
) -> ApiResult<QuoteRequest> {
    actor.require_mutation()?;
    let supplier_id = req
        .supplier_id
        .ok_or_else(|| ApiError::missing_field("supplier_id"))?;
    if req.items.is_empty() {
        return Err(ApiError::validation_failed("At least one priced item is required"));
    }
    if req.items.len() > MAX_LINE_ITEMS {
        return Err(ApiError::validation_failed(format!(
            "At most {} line items are allowed",
            MAX_LINE_ITEMS
        )));
    }

    let qr = load_quote_request(store, actor.tenant_id, id).await?;
    if !qr.status.is_negotiating() {
        return Err(ApiError::state_conflict(format!(
            "Quote request is in '{}' state, cannot record pricing (expected SENT, RECEIVED or UNDER_REVIEW)",
            qr.status
        )));
    }

    let threads = store.thread_list_by_quote_request(id, actor.tenant_id).await?;
    if !current_round(&threads, qr.round).any(|t| t.supplier_id == supplier_id) {
        return Err(ApiError::validation_failed(format!(
            "Supplier {} has no thread in round {} of this quote request",
            supplier_id, qr.round
        )));
    }

    let mut priced = Vec::with_capacity(req.items.len());
    for item in req.items {
        if item.part_number.trim().is_empty() {
            return Err(ApiError::missing_field("items.part_number"));
        }
        if item.quantity == 0 {
            return Err(ApiError::validation_failed(format!(
                "Quantity for part {} must be positive",
                item.part_number
            )));
        }
        if item.unit_price_cents < 0 {
            return Err(ApiError::validation_failed(format!(
                "Unit price for part {} cannot be negative",
                item.part_number
            )));
        }
        priced.push(QuoteLineItem {
            line_item_id: LineItemId::now_v7(),
            part_number: item.part_number.trim().to_string(),
            description: item.description,
            quantity: item.quantity,
            supplier_id: Some(supplier_id),
            unit_price_cents: Some(item.unit_price_cents),
            availability: item.availability,
        });
    }

    let mut line_items: Vec<QuoteLineItem> = qr
        .line_items
        .into_iter()
        .filter(|item| item.supplier_id != Some(supplier_id))
        .collect();
    let priced_count = priced.len();
    line_items.extend(priced);

    let updated = store
        .quote_request_compare_and_set(
            id,
            actor.tenant_id,
            &NEGOTIATING,
            QuoteRequestUpdate {
                line_items: Some(line_items),
                ..Default::default()
            },
        )
        .await?;

    tracing::info!(
        quote_request_id = %id,
        supplier_id = %supplier_id,
        items = priced_count,
        "Supplier pricing recorded"
    );
    Ok(updated)
}

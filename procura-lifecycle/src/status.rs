//! Aggregate negotiation status derivation
//!
//! A QuoteRequest's status is a function of its supplier threads. The
//! function is pure: callers hand it a fresh snapshot of the current round's
//! threads and persist the result themselves.

use procura_core::{Message, QuoteRequestStatus, SupplierThread, SupplierThreadStatus};
use serde::{Deserialize, Serialize};

/// What derivation needs to know about one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub status: SupplierThreadStatus,
    /// Whether the thread's ledger holds at least one INBOUND message.
    pub has_inbound: bool,
}

impl ThreadSnapshot {
    pub fn new(status: SupplierThreadStatus, has_inbound: bool) -> Self {
        Self {
            status,
            has_inbound,
        }
    }

    /// Build a snapshot from a thread and its ledger.
    pub fn from_ledger(thread: &SupplierThread, ledger: &[Message]) -> Self {
        Self {
            status: thread.status,
            has_inbound: ledger.iter().any(Message::is_inbound),
        }
    }
}

/// Derive the aggregate status from the threads of the current round.
///
/// Rules, first match wins:
/// 1. terminal statuses (`CONVERTED_TO_ORDER`, `EXPIRED`) are returned unchanged
/// 2. any thread `ACCEPTED` gives `APPROVED`
/// 3. every thread `REJECTED` or `NO_RESPONSE`, at least one `REJECTED`, gives `REJECTED`
/// 4. any thread `RESPONDED` or holding an inbound message gives `UNDER_REVIEW`
/// 5. every thread `SENT` with no inbound message gives `SENT`
/// 6. otherwise the current status is kept
///
/// An empty thread set keeps the current status; "every thread" is never
/// vacuously true.
pub fn derive_status(
    current: QuoteRequestStatus,
    threads: &[ThreadSnapshot],
) -> QuoteRequestStatus {
    if current.is_terminal() || threads.is_empty() {
        return current;
    }

    if threads
        .iter()
        .any(|t| t.status == SupplierThreadStatus::Accepted)
    {
        return QuoteRequestStatus::Approved;
    }

    let all_closed_without_reply = threads.iter().all(|t| {
        matches!(
            t.status,
            SupplierThreadStatus::Rejected | SupplierThreadStatus::NoResponse
        )
    });
    let any_rejected = threads
        .iter()
        .any(|t| t.status == SupplierThreadStatus::Rejected);
    if all_closed_without_reply && any_rejected {
        return QuoteRequestStatus::Rejected;
    }

    if threads
        .iter()
        .any(|t| t.status == SupplierThreadStatus::Responded || t.has_inbound)
    {
        return QuoteRequestStatus::UnderReview;
    }

    if threads
        .iter()
        .all(|t| t.status == SupplierThreadStatus::Sent && !t.has_inbound)
    {
        return QuoteRequestStatus::Sent;
    }

    current
}

/// Threads that take part in derivation for the given round.
pub fn current_round<'a>(
    threads: &'a [SupplierThread],
    round: u32,
) -> impl Iterator<Item = &'a SupplierThread> + 'a {
    threads.iter().filter(move |t| t.round == round)
}

#[cfg(test)]
mod tests {
    use super::*;
    use SupplierThreadStatus::*;

    fn snap(status: SupplierThreadStatus, has_inbound: bool) -> ThreadSnapshot {
        ThreadSnapshot::new(status, has_inbound)
    }

    #[test]
    fn test_terminal_status_is_never_overwritten() {
        let threads = [snap(Accepted, true)];
        assert_eq!(
            derive_status(QuoteRequestStatus::ConvertedToOrder, &threads),
            QuoteRequestStatus::ConvertedToOrder
        );
        assert_eq!(
            derive_status(QuoteRequestStatus::Expired, &threads),
            QuoteRequestStatus::Expired
        );
    }

    #[test]
    fn test_accepted_thread_wins() {
        let threads = [snap(Rejected, false), snap(Accepted, true)];
        assert_eq!(
            derive_status(QuoteRequestStatus::UnderReview, &threads),
            QuoteRequestStatus::Approved
        );
    }

    #[test]
    fn test_all_rejected_or_silent_is_rejected() {
        let threads = [snap(Rejected, true), snap(NoResponse, false)];
        assert_eq!(
            derive_status(QuoteRequestStatus::UnderReview, &threads),
            QuoteRequestStatus::Rejected
        );
    }

    #[test]
    fn test_all_silent_without_rejection_is_not_rejected() {
        let threads = [snap(NoResponse, false), snap(NoResponse, false)];
        assert_eq!(
            derive_status(QuoteRequestStatus::Sent, &threads),
            QuoteRequestStatus::Sent
        );
    }

    #[test]
    fn test_inbound_message_means_under_review_even_if_thread_still_sent() {
        let threads = [snap(Sent, true), snap(Sent, false)];
        assert_eq!(
            derive_status(QuoteRequestStatus::Sent, &threads),
            QuoteRequestStatus::UnderReview
        );
    }

    #[test]
    fn test_all_sent_without_inbound_is_sent() {
        let threads = [snap(Sent, false), snap(Sent, false)];
        assert_eq!(
            derive_status(QuoteRequestStatus::Draft, &threads),
            QuoteRequestStatus::Sent
        );
    }

    #[test]
    fn test_empty_thread_set_keeps_current() {
        assert_eq!(
            derive_status(QuoteRequestStatus::Sent, &[]),
            QuoteRequestStatus::Sent
        );
        assert_eq!(
            derive_status(QuoteRequestStatus::Draft, &[]),
            QuoteRequestStatus::Draft
        );
    }

    #[test]
    fn test_mixed_not_selected_falls_through_to_current() {
        let threads = [snap(NotSelected, false), snap(NoResponse, false)];
        assert_eq!(
            derive_status(QuoteRequestStatus::Received, &threads),
            QuoteRequestStatus::Received
        );
    }
}

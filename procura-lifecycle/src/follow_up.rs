//! Overdue supplier response detection

use procura_core::{Message, MessageId, ThreadId, Timestamp};
use serde::{Deserialize, Serialize};

/// An outbound message whose response deadline has passed unanswered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OverdueMessage {
    pub message_id: MessageId,
    pub thread_id: ThreadId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub expected_response_by: Timestamp,
    pub days_overdue: i64,
}

/// Whole days elapsed since the deadline, floored.
pub fn days_overdue(expected_response_by: Timestamp, now: Timestamp) -> i64 {
    (now - expected_response_by).num_days().max(0)
}

/// Whether `reply` answers `outbound`.
///
/// Explicit threading (`in_reply_to`) wins; otherwise any inbound message
/// received strictly after the outbound one went out counts. "Went out" is
/// the outbound message's `sent_at`; a message recorded without one falls
/// back to its creation time through [`Message::effective_time`].
pub fn is_reply_to(reply: &Message, outbound: &Message) -> bool {
    if !reply.is_inbound() {
        return false;
    }
    if reply.in_reply_to == Some(outbound.message_id) {
        return true;
    }
    match reply.received_at {
        Some(received_at) => received_at > outbound.effective_time(),
        None => false,
    }
}

/// Overdue outbound messages of one thread's ledger.
pub fn overdue_in_thread(ledger: &[Message], now: Timestamp) -> Vec<OverdueMessage> {
    ledger
        .iter()
        .filter(|m| m.is_outbound() && m.follow_up_sent_at.is_none())
        .filter_map(|m| {
            let deadline = m.expected_response_by?;
            if deadline >= now {
                return None;
            }
            if ledger.iter().any(|q| is_reply_to(q, m)) {
                return None;
            }
            Some(OverdueMessage {
                message_id: m.message_id,
                thread_id: m.thread_id,
                expected_response_by: deadline,
                days_overdue: days_overdue(deadline, now),
            })
        })
        .collect()
}

/// Full overdue set across every ledger of a QuoteRequest, most overdue first.
pub fn detect_overdue<'a, I>(ledgers: I, now: Timestamp) -> Vec<OverdueMessage>
where
    I: IntoIterator<Item = &'a [Message]>,
{
    let mut overdue: Vec<OverdueMessage> = ledgers
        .into_iter()
        .flat_map(|ledger| overdue_in_thread(ledger, now))
        .collect();
    overdue.sort_by(|a, b| {
        a.expected_response_by
            .cmp(&b.expected_response_by)
            .then_with(|| a.message_id.cmp(&b.message_id))
    });
    overdue
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::{Duration, Utc};
    use procura_core::{EntityIdType, TenantId};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A past-due unanswered message is flagged; a later reply clears it.
        #[test]
        fn prop_reply_after_send_clears_flag(
            sent_mins_ago in 60i64..100_000,
            due_offset_mins in 1i64..59,
            reply_after_mins in 1i64..59,
        ) {
            let now = Utc::now();
            let sent = now - Duration::minutes(sent_mins_ago);
            let due = sent + Duration::minutes(due_offset_mins);
            let m = Message::outbound(ThreadId::now_v7(), TenantId::now_v7(), "rfq", sent, Some(due));
            prop_assert_eq!(overdue_in_thread(std::slice::from_ref(&m), now).len(), 1);

            let reply = Message::inbound(m.thread_id, m.tenant_id, "re", sent + Duration::minutes(reply_after_mins));
            prop_assert!(overdue_in_thread(&[m, reply], now).is_empty());
        }

        /// Output is sorted ascending by deadline.
        #[test]
        fn prop_overdue_sorted(due_days in prop::collection::vec(1i64..30, 0..8)) {
            let now = Utc::now();
            let ledgers: Vec<Vec<Message>> = due_days
                .iter()
                .map(|d| vec![Message::outbound(
                    ThreadId::now_v7(),
                    TenantId::now_v7(),
                    "rfq",
                    now - Duration::days(d + 1),
                    Some(now - Duration::days(*d)),
                )])
                .collect();
            let overdue = detect_overdue(ledgers.iter().map(Vec::as_slice), now);
            prop_assert_eq!(overdue.len(), due_days.len());
            for pair in overdue.windows(2) {
                prop_assert!(pair[0].expected_response_by <= pair[1].expected_response_by);
            }
        }
    }
}

//! Near-duplicate assistant message consolidation
//!
//! The AI service sometimes answers the same prompt more than once within a
//! few seconds. Consolidation folds those replies into one primary message
//! carrying the others as alternates, so the chat shows one answer.

use chrono::Duration;
use once_cell::sync::Lazy;
use procura_core::{ChatMessage, MessageRole};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// "12 parts matching", "1 part matching" and friends.
static PARTS_MATCHING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d+\s+parts?\s+matching\b").expect("Invalid parts-matching regex")
});

/// A primary message plus the duplicates folded into it, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConsolidatedMessage {
    pub primary: ChatMessage,
    pub alternates: Vec<ChatMessage>,
}

impl ConsolidatedMessage {
    pub fn single(message: ChatMessage) -> Self {
        Self {
            primary: message,
            alternates: Vec::new(),
        }
    }

    /// Number of raw messages represented by this group.
    pub fn message_count(&self) -> usize {
        1 + self.alternates.len()
    }
}

/// Whether two assistant messages say the same thing.
pub fn is_duplicate(a: &ChatMessage, b: &ChatMessage) -> bool {
    if a.body == b.body {
        return true;
    }
    if PARTS_MATCHING.is_match(&a.body) && PARTS_MATCHING.is_match(&b.body) {
        return true;
    }
    a.has_search_results() && b.has_search_results()
}

/// Consolidate a chronologically ordered list of chat messages.
pub fn consolidate(messages: &[ChatMessage], window: Duration) -> Vec<ConsolidatedMessage> {
    let groups = messages
        .iter()
        .cloned()
        .map(ConsolidatedMessage::single)
        .collect();
    consolidate_groups(groups, window)
}

/// Consolidate already-grouped messages.
///
/// Each group's primary is compared against later primaries within
/// `window` (inclusive). A matched group is folded in together with its own
/// alternates and can never be matched again. Running this on its own
/// output changes nothing.
pub fn consolidate_groups(
    groups: Vec<ConsolidatedMessage>,
    window: Duration,
) -> Vec<ConsolidatedMessage> {
    let mut slots: Vec<Option<ConsolidatedMessage>> = groups.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(slots.len());

    for i in 0..slots.len() {
        let Some(mut group) = slots[i].take() else {
            continue;
        };

        if group.primary.role == MessageRole::Assistant {
            for slot in slots.iter_mut().skip(i + 1) {
                let Some(candidate) = slot.as_ref() else {
                    continue;
                };
                if candidate.primary.created_at - group.primary.created_at > window {
                    break;
                }
                if candidate.primary.role != MessageRole::Assistant {
                    continue;
                }
                if is_duplicate(&group.primary, &candidate.primary) {
                    if let Some(absorbed) = slot.take() {
                        group.alternates.push(absorbed.primary);
                        group.alternates.extend(absorbed.alternates);
                    }
                }
            }
        }

        out.push(group);
    }

    out
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use procura_core::{EntityIdType, QuoteRequestId, TenantId};
    use proptest::prelude::*;

    fn arb_messages() -> impl Strategy<Value = Vec<ChatMessage>> {
        prop::collection::vec(
            (
                prop_oneof![
                    Just(MessageRole::User),
                    Just(MessageRole::Assistant),
                    Just(MessageRole::System)
                ],
                prop_oneof![
                    Just("Found it"),
                    Just("3 parts matching"),
                    Just("No luck"),
                    Just("7 parts matching"),
                ],
                0i64..200,
            ),
            0..12,
        )
        .prop_map(|raw| {
            let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap();
            let mut at = start;
            raw.into_iter()
                .map(|(role, body, gap)| {
                    at += Duration::seconds(gap);
                    ChatMessage::new(QuoteRequestId::nil(), TenantId::nil(), role, body, at)
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Consolidating consolidated output changes nothing.
        #[test]
        fn prop_consolidation_idempotent(messages in arb_messages()) {
            let once = consolidate(&messages, Duration::seconds(120));
            let twice = consolidate_groups(once.clone(), Duration::seconds(120));
            prop_assert_eq!(once, twice);
        }

        /// Every input message appears exactly once in the output.
        #[test]
        fn prop_consolidation_preserves_messages(messages in arb_messages()) {
            let out = consolidate(&messages, Duration::seconds(120));
            let total: usize = out.iter().map(ConsolidatedMessage::message_count).sum();
            prop_assert_eq!(total, messages.len());
            prop_assert!(out.len() <= messages.len());
        }
    }
}

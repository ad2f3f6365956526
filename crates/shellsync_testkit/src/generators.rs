//! Property-based test generators using proptest.
//!
//! Strategies produce engine histories and delivery orders; the engine
//! itself assigns revisions, so generated histories are always valid.

use proptest::prelude::*;
use shellsync_protocol::{
    AuthState, BusyState, ChatMessage, ChatSummary, ChatViewState, FieldValue, MemberInfo,
    MessageDeliveryState, MyProfileState, Router, Screen,
};

/// One step of an engine history.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineStep {
    /// Replace one field.
    Change(FieldValue),
    /// Create an account, producing a secret side effect.
    CreateAccount {
        /// The generated private key.
        nsec: String,
    },
}

/// Strategy for conversation IDs.
pub fn chat_id_strategy() -> impl Strategy<Value = String> {
    "[a-f0-9]{8}"
}

/// Strategy for screens.
pub fn screen_strategy() -> impl Strategy<Value = Screen> {
    prop_oneof![
        Just(Screen::Login),
        Just(Screen::ChatList),
        Just(Screen::NewChat),
        Just(Screen::NewGroupChat),
        chat_id_strategy().prop_map(|chat_id| Screen::Chat { chat_id }),
        chat_id_strategy().prop_map(|chat_id| Screen::GroupInfo { chat_id }),
    ]
}

/// Strategy for navigation state.
pub fn router_strategy() -> impl Strategy<Value = Router> {
    (screen_strategy(), prop::collection::vec(screen_strategy(), 0..4)).prop_map(
        |(default_screen, screen_stack)| Router {
            default_screen,
            screen_stack,
        },
    )
}

/// Strategy for authentication state.
pub fn auth_strategy() -> impl Strategy<Value = AuthState> {
    prop_oneof![
        Just(AuthState::LoggedOut),
        "[a-f0-9]{16}".prop_map(|pubkey| AuthState::LoggedIn {
            npub: format!("npub1{pubkey}"),
            pubkey,
        }),
    ]
}

/// Strategy for busy flags.
pub fn busy_strategy() -> impl Strategy<Value = BusyState> {
    any::<(bool, bool, bool, bool)>().prop_map(|(a, b, c, d)| BusyState {
        creating_account: a,
        logging_in: b,
        creating_chat: c,
        fetching_follow_list: d,
    })
}

fn member_strategy() -> impl Strategy<Value = MemberInfo> {
    ("[a-f0-9]{16}", prop::option::of("[A-Za-z]{1,8}")).prop_map(|(pubkey, name)| MemberInfo {
        npub: format!("npub1{pubkey}"),
        pubkey,
        name,
    })
}

/// Strategy for conversation list entries.
pub fn chat_summary_strategy() -> impl Strategy<Value = ChatSummary> {
    (
        chat_id_strategy(),
        any::<bool>(),
        prop::collection::vec(member_strategy(), 1..3),
        prop::option::of("[ -~]{0,24}"),
        0u32..50,
    )
        .prop_map(|(chat_id, is_group, members, last_message, unread_count)| ChatSummary {
            group_name: is_group.then(|| format!("group {chat_id}")),
            chat_id,
            is_group,
            members,
            last_message_at: last_message.as_ref().map(|_| 1_700_000_000),
            last_message,
            unread_count,
        })
}

fn message_strategy() -> impl Strategy<Value = ChatMessage> {
    (
        "[a-f0-9]{12}",
        "[ -~]{0,32}",
        any::<bool>(),
        prop_oneof![
            Just(MessageDeliveryState::Pending),
            Just(MessageDeliveryState::Sent),
            "[a-z ]{1,12}".prop_map(|reason| MessageDeliveryState::Failed { reason }),
        ],
    )
        .prop_map(|(id, content, is_mine, delivery)| ChatMessage {
            id,
            sender_pubkey: if is_mine { "me".into() } else { "peer".into() },
            content,
            timestamp: 1_700_000_000,
            is_mine,
            delivery,
        })
}

/// Strategy for the open conversation.
pub fn chat_view_strategy() -> impl Strategy<Value = ChatViewState> {
    (
        chat_id_strategy(),
        prop::collection::vec(member_strategy(), 1..3),
        prop::collection::vec(message_strategy(), 0..6),
        any::<bool>(),
    )
        .prop_map(|(chat_id, members, messages, can_load_older)| ChatViewState {
            chat_id,
            is_group: members.len() > 1,
            group_name: None,
            members,
            messages,
            can_load_older,
        })
}

/// Strategy for a replacement value of any field.
pub fn field_value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        3 => prop::option::of("[ -~]{1,20}").prop_map(FieldValue::Toast),
        2 => router_strategy().prop_map(FieldValue::Router),
        1 => auth_strategy().prop_map(FieldValue::Auth),
        2 => busy_strategy().prop_map(FieldValue::Busy),
        1 => ("[A-Za-z]{0,10}", "[ -~]{0,20}").prop_map(|(name, about)| {
            FieldValue::MyProfile(MyProfileState {
                name,
                about,
                picture_url: None,
            })
        }),
        1 => prop::collection::vec(chat_summary_strategy(), 0..4).prop_map(FieldValue::ChatList),
        1 => prop::option::of(chat_view_strategy()).prop_map(FieldValue::CurrentChat),
    ]
}

/// Strategy for one engine step; account creation is rare.
pub fn engine_step_strategy() -> impl Strategy<Value = EngineStep> {
    prop_oneof![
        12 => field_value_strategy().prop_map(EngineStep::Change),
        1 => "nsec1[a-z0-9]{20}".prop_map(|nsec| EngineStep::CreateAccount { nsec }),
    ]
}

/// Strategy for an engine history of `min..max` steps.
pub fn history_strategy(min: usize, max: usize) -> impl Strategy<Value = Vec<EngineStep>> {
    prop::collection::vec(engine_step_strategy(), min..max)
}

/// Strategy for a delivery order over `len` updates.
///
/// Every index appears at least once; up to `len` extra duplicates are mixed
/// in, and the whole order is shuffled.
pub fn delivery_order_strategy(len: usize) -> BoxedStrategy<Vec<usize>> {
    if len == 0 {
        return Just(Vec::new()).boxed();
    }
    prop::collection::vec(0..len, 0..=len)
        .prop_flat_map(move |extra| {
            let mut order: Vec<usize> = (0..len).collect();
            order.extend(extra);
            Just(order).prop_shuffle()
        })
        .boxed()
}

/// Case counts for the property suites.
#[derive(Debug, Clone)]
pub struct PropertyBudget {
    /// Number of generated cases.
    pub cases: u32,
    /// Largest generated history.
    pub max_history: usize,
}

impl Default for PropertyBudget {
    fn default() -> Self {
        Self {
            cases: 128,
            max_history: 40,
        }
    }
}

impl PropertyBudget {
    /// A small budget for fast runs.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_history: 16,
        }
    }

    /// Converts to a proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropertyBudget::quick().to_proptest_config())]

        #[test]
        fn delivery_order_covers_every_index(
            order in (1usize..20).prop_flat_map(delivery_order_strategy),
        ) {
            let mut seen = order.clone();
            seen.sort_unstable();
            seen.dedup();
            let len = seen.len();
            prop_assert_eq!(seen, (0..len).collect::<Vec<_>>());
            prop_assert!(order.len() <= 2 * len);
        }

        #[test]
        fn chat_summary_group_name_matches_kind(summary in chat_summary_strategy()) {
            prop_assert_eq!(summary.is_group, summary.group_name.is_some());
            prop_assert!(!summary.members.is_empty());
        }
    }
}

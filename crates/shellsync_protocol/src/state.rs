//! Application state mirrored by the shell.

use crate::revision::Revision;
use serde::{Deserialize, Serialize};

/// The full application state as owned by the engine.
///
/// Every field except `rev` can be replaced independently through a
/// [`FieldValue`](crate::FieldValue) delta. `rev` is the revision at which
/// this state was last fully known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// Revision this state corresponds to.
    pub rev: Revision,
    /// Navigation state.
    pub router: Router,
    /// Authentication state.
    pub auth: AuthState,
    /// Profile of the logged-in user.
    pub my_profile: MyProfileState,
    /// In-flight operation flags.
    pub busy: BusyState,
    /// Conversation list.
    pub chat_list: Vec<ChatSummary>,
    /// Currently open conversation.
    pub current_chat: Option<ChatViewState>,
    /// Transient message for the user.
    pub toast: Option<String>,
}

impl AppState {
    /// Returns the state of a freshly started engine.
    pub fn empty() -> Self {
        Self {
            rev: Revision::ZERO,
            router: Router::login(),
            auth: AuthState::LoggedOut,
            my_profile: MyProfileState::empty(),
            busy: BusyState::idle(),
            chat_list: Vec::new(),
            current_chat: None,
            toast: None,
        }
    }

    /// Returns true if a user is logged in.
    pub fn is_logged_in(&self) -> bool {
        matches!(self.auth, AuthState::LoggedIn { .. })
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::empty()
    }
}

/// Navigation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    /// Screen shown when the stack is empty.
    pub default_screen: Screen,
    /// Screens pushed on top of the default screen.
    pub screen_stack: Vec<Screen>,
}

impl Router {
    /// Router showing only the login screen.
    pub fn login() -> Self {
        Self {
            default_screen: Screen::Login,
            screen_stack: Vec::new(),
        }
    }

    /// Returns the screen currently on top.
    pub fn current(&self) -> &Screen {
        self.screen_stack.last().unwrap_or(&self.default_screen)
    }
}

/// A navigable screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Screen {
    /// Login / account creation.
    Login,
    /// Conversation list.
    ChatList,
    /// A single conversation.
    Chat {
        /// Conversation ID.
        chat_id: String,
    },
    /// Start a 1:1 conversation.
    NewChat,
    /// Start a group conversation.
    NewGroupChat,
    /// Group details.
    GroupInfo {
        /// Conversation ID.
        chat_id: String,
    },
}

/// Authentication state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthState {
    /// No account is active.
    LoggedOut,
    /// An account is active.
    LoggedIn {
        /// Bech32 public key.
        npub: String,
        /// Hex public key.
        pubkey: String,
    },
}

/// Profile of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyProfileState {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub about: String,
    /// Avatar URL.
    pub picture_url: Option<String>,
}

impl MyProfileState {
    /// Returns an empty profile.
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            about: String::new(),
            picture_url: None,
        }
    }
}

/// "In flight" flags for long-running operations the UI reflects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BusyState {
    /// An account is being created.
    pub creating_account: bool,
    /// A login is in progress.
    pub logging_in: bool,
    /// A conversation is being created.
    pub creating_chat: bool,
    /// The follow list is being fetched.
    pub fetching_follow_list: bool,
}

impl BusyState {
    /// Returns the state with no operation in flight.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Returns true if any operation is in flight.
    pub fn any(&self) -> bool {
        self.creating_account || self.logging_in || self.creating_chat || self.fetching_follow_list
    }
}

/// A conversation participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    /// Hex public key.
    pub pubkey: String,
    /// Bech32 public key.
    pub npub: String,
    /// Display name, if known.
    pub name: Option<String>,
}

/// Entry of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    /// Conversation ID.
    pub chat_id: String,
    /// Whether this is a group conversation.
    pub is_group: bool,
    /// Group name, for groups.
    pub group_name: Option<String>,
    /// Participants other than the user.
    pub members: Vec<MemberInfo>,
    /// Preview of the most recent message.
    pub last_message: Option<String>,
    /// Timestamp of the most recent message (unix seconds).
    pub last_message_at: Option<i64>,
    /// Messages not yet seen.
    pub unread_count: u32,
}

/// Detail of the open conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatViewState {
    /// Conversation ID.
    pub chat_id: String,
    /// Whether this is a group conversation.
    pub is_group: bool,
    /// Group name, for groups.
    pub group_name: Option<String>,
    /// Participants other than the user.
    pub members: Vec<MemberInfo>,
    /// Loaded messages, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Whether older messages can be loaded.
    pub can_load_older: bool,
}

/// A single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message ID.
    pub id: String,
    /// Hex public key of the sender.
    pub sender_pubkey: String,
    /// Message body.
    pub content: String,
    /// Timestamp (unix seconds).
    pub timestamp: i64,
    /// Whether the user sent this message.
    pub is_mine: bool,
    /// Delivery status.
    pub delivery: MessageDeliveryState,
}

/// Delivery status of an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageDeliveryState {
    /// Waiting for relays.
    Pending,
    /// Accepted by at least one relay.
    Sent,
    /// Rejected or timed out.
    Failed {
        /// Failure reason.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state() {
        let state = AppState::empty();
        assert_eq!(state.rev, Revision::ZERO);
        assert_eq!(state.router.current(), &Screen::Login);
        assert!(!state.is_logged_in());
        assert!(!state.busy.any());
    }

    #[test]
    fn router_current_prefers_stack_top() {
        let router = Router {
            default_screen: Screen::ChatList,
            screen_stack: vec![
                Screen::NewChat,
                Screen::Chat {
                    chat_id: "c1".into(),
                },
            ],
        };
        assert_eq!(
            router.current(),
            &Screen::Chat {
                chat_id: "c1".into()
            }
        );
    }

    #[test]
    fn state_json_shape() {
        let mut state = AppState::empty();
        state.auth = AuthState::LoggedIn {
            npub: "npub1x".into(),
            pubkey: "ab".into(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["rev"], 0);
        assert_eq!(json["auth"]["kind"], "logged_in");
        let back: AppState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}

//! Test fixtures: sample states and temporary secret stores.

use shellsync_mirror::FileSecretStore;
use shellsync_protocol::{
    AppState, AuthState, ChatMessage, ChatSummary, ChatViewState, MemberInfo,
    MessageDeliveryState, Revision, Router, Screen,
};
use tempfile::TempDir;

/// A file-backed secret store removed on drop.
pub struct TempSecretStore {
    /// The store.
    pub store: FileSecretStore,
    _temp_dir: TempDir,
}

impl TempSecretStore {
    /// Creates a store in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self {
            store: FileSecretStore::new(temp_dir.path().join("keys")),
            _temp_dir: temp_dir,
        }
    }
}

impl Default for TempSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempSecretStore {
    type Target = FileSecretStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs `f` with a temporary file-backed secret store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&FileSecretStore) -> R,
{
    let temp = TempSecretStore::new();
    f(&temp.store)
}

/// A logged-in user sitting on the chat list.
pub fn logged_in_state(rev: u64) -> AppState {
    let mut state = AppState::empty();
    state.rev = Revision(rev);
    state.auth = AuthState::LoggedIn {
        npub: "npub1fixture".into(),
        pubkey: "f1x7".into(),
    };
    state.router = Router {
        default_screen: Screen::ChatList,
        screen_stack: Vec::new(),
    };
    state
}

/// A logged-in user with one open conversation.
pub fn chat_state(rev: u64) -> AppState {
    let peer = MemberInfo {
        pubkey: "peer".into(),
        npub: "npub1peer".into(),
        name: Some("Peer".into()),
    };
    let mut state = logged_in_state(rev);
    state.router.screen_stack.push(Screen::Chat {
        chat_id: "c0ffee".into(),
    });
    state.chat_list = vec![ChatSummary {
        chat_id: "c0ffee".into(),
        is_group: false,
        group_name: None,
        members: vec![peer.clone()],
        last_message: Some("hello".into()),
        last_message_at: Some(1_700_000_000),
        unread_count: 0,
    }];
    state.current_chat = Some(ChatViewState {
        chat_id: "c0ffee".into(),
        is_group: false,
        group_name: None,
        members: vec![peer],
        messages: vec![ChatMessage {
            id: "m1".into(),
            sender_pubkey: "peer".into(),
            content: "hello".into(),
            timestamp: 1_700_000_000,
            is_mine: false,
            delivery: MessageDeliveryState::Sent,
        }],
        can_load_older: false,
    });
    state
}

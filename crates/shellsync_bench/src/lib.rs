//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::Rng;
use shellsync_protocol::{
    AppState, AppUpdate, AuthState, ChatSummary, FieldValue, MemberInfo, Revision, Screen,
};

/// Generate random text of the specified length.
pub fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a conversation list with `count` entries.
pub fn chat_list(count: usize) -> Vec<ChatSummary> {
    (0..count)
        .map(|i| ChatSummary {
            chat_id: format!("{:08x}", i),
            is_group: i % 5 == 0,
            group_name: (i % 5 == 0).then(|| random_text(12)),
            members: vec![MemberInfo {
                pubkey: random_text(64),
                npub: format!("npub1{}", random_text(58)),
                name: Some(random_text(8)),
            }],
            last_message: Some(random_text(48)),
            last_message_at: Some(1_700_000_000 + i as i64),
            unread_count: (i % 7) as u32,
        })
        .collect()
}

/// A logged-in state at `rev` with `chats` conversations.
pub fn populated_state(rev: u64, chats: usize) -> AppState {
    let mut state = AppState::empty();
    state.rev = Revision(rev);
    state.auth = AuthState::LoggedIn {
        npub: format!("npub1{}", random_text(58)),
        pubkey: random_text(64),
    };
    state.router.default_screen = Screen::ChatList;
    state.chat_list = chat_list(chats);
    state
}

/// Generate `count` toast deltas starting at revision `from`.
pub fn toast_updates(from: u64, count: u64) -> Vec<AppUpdate> {
    (from..from + count)
        .map(|rev| AppUpdate::field(rev, FieldValue::Toast(Some(random_text(16)))))
        .collect()
}

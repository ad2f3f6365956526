//! Commands sent from the shell to the engine.

use crate::secret::Secret;
use crate::state::Screen;

/// A fire-and-forget command for the engine.
///
/// Actions are not part of the reconciliation contract: their effects come
/// back, if at all, through the update stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    /// Generate a new account.
    CreateAccount,
    /// Log in with an existing key.
    Login {
        /// Private key.
        nsec: Secret,
    },
    /// Log in silently with a previously stored key.
    RestoreSession {
        /// Private key.
        nsec: Secret,
    },
    /// End the session.
    Logout,
    /// Navigate to a screen.
    PushScreen {
        /// Target screen.
        screen: Screen,
    },
    /// Replace the navigation stack (e.g. after a platform back gesture).
    UpdateScreenStack {
        /// New stack.
        stack: Vec<Screen>,
    },
    /// Open a conversation.
    OpenChat {
        /// Conversation ID.
        chat_id: String,
    },
    /// Send a message.
    SendMessage {
        /// Conversation ID.
        chat_id: String,
        /// Message body.
        content: String,
    },
    /// Dismiss the current toast.
    ClearToast,
    /// The app returned to the foreground.
    Foregrounded,
}

impl AppAction {
    /// Returns a short name for logging. Never includes secret material.
    pub fn name(&self) -> &'static str {
        match self {
            AppAction::CreateAccount => "create_account",
            AppAction::Login { .. } => "login",
            AppAction::RestoreSession { .. } => "restore_session",
            AppAction::Logout => "logout",
            AppAction::PushScreen { .. } => "push_screen",
            AppAction::UpdateScreenStack { .. } => "update_screen_stack",
            AppAction::OpenChat { .. } => "open_chat",
            AppAction::SendMessage { .. } => "send_message",
            AppAction::ClearToast => "clear_toast",
            AppAction::Foregrounded => "foregrounded",
        }
    }
}

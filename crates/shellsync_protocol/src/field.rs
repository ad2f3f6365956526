//! Named, independently-updatable state fields.

use crate::state::{
    AppState, AuthState, BusyState, ChatSummary, ChatViewState, MyProfileState, Router,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one field of [`AppState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    /// `AppState::router`.
    Router,
    /// `AppState::auth`.
    Auth,
    /// `AppState::my_profile`.
    MyProfile,
    /// `AppState::busy`.
    Busy,
    /// `AppState::chat_list`.
    ChatList,
    /// `AppState::current_chat`.
    CurrentChat,
    /// `AppState::toast`.
    Toast,
}

impl StateField {
    /// All fields, in declaration order.
    pub const ALL: [StateField; 7] = [
        StateField::Router,
        StateField::Auth,
        StateField::MyProfile,
        StateField::Busy,
        StateField::ChatList,
        StateField::CurrentChat,
        StateField::Toast,
    ];

    /// Returns the field name as used in `AppState`.
    pub fn name(&self) -> &'static str {
        match self {
            StateField::Router => "router",
            StateField::Auth => "auth",
            StateField::MyProfile => "my_profile",
            StateField::Busy => "busy",
            StateField::ChatList => "chat_list",
            StateField::CurrentChat => "current_chat",
            StateField::Toast => "toast",
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A replacement value for exactly one field.
///
/// The variant determines the field, so a delta can never carry a value of
/// the wrong type for the field it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// New navigation state.
    Router(Router),
    /// New authentication state.
    Auth(AuthState),
    /// New profile.
    MyProfile(MyProfileState),
    /// New busy flags.
    Busy(BusyState),
    /// New conversation list.
    ChatList(Vec<ChatSummary>),
    /// New open conversation.
    CurrentChat(Option<ChatViewState>),
    /// New toast.
    Toast(Option<String>),
}

impl FieldValue {
    /// Returns the field this value replaces.
    pub fn field(&self) -> StateField {
        match self {
            FieldValue::Router(_) => StateField::Router,
            FieldValue::Auth(_) => StateField::Auth,
            FieldValue::MyProfile(_) => StateField::MyProfile,
            FieldValue::Busy(_) => StateField::Busy,
            FieldValue::ChatList(_) => StateField::ChatList,
            FieldValue::CurrentChat(_) => StateField::CurrentChat,
            FieldValue::Toast(_) => StateField::Toast,
        }
    }
}

impl AppState {
    /// Replaces exactly one field, leaving every other field (and `rev`)
    /// untouched.
    pub fn set_field(&mut self, value: FieldValue) {
        match value {
            FieldValue::Router(router) => self.router = router,
            FieldValue::Auth(auth) => self.auth = auth,
            FieldValue::MyProfile(profile) => self.my_profile = profile,
            FieldValue::Busy(busy) => self.busy = busy,
            FieldValue::ChatList(list) => self.chat_list = list,
            FieldValue::CurrentChat(chat) => self.current_chat = chat,
            FieldValue::Toast(toast) => self.toast = toast,
        }
    }

    /// Returns the current value of a field.
    pub fn field(&self, field: StateField) -> FieldValue {
        match field {
            StateField::Router => FieldValue::Router(self.router.clone()),
            StateField::Auth => FieldValue::Auth(self.auth.clone()),
            StateField::MyProfile => FieldValue::MyProfile(self.my_profile.clone()),
            StateField::Busy => FieldValue::Busy(self.busy),
            StateField::ChatList => FieldValue::ChatList(self.chat_list.clone()),
            StateField::CurrentChat => FieldValue::CurrentChat(self.current_chat.clone()),
            StateField::Toast => FieldValue::Toast(self.toast.clone()),
        }
    }
}

//! Account session bookkeeping for the shell.
//!
//! The engine never echoes a login key back in state, so the shell keeps the
//! key it submitted and persists it only once `auth` switches to a logged-in
//! identity. A state that merely stays logged in does not confirm a login.

use crate::secret_store::{SecretStore, WriteOutcome};
use shellsync_protocol::{AppAction, AppState, AuthState, Screen, Secret, SecretSlot};

const LOGIN_ERROR_PREFIXES: [&str; 2] = ["Invalid nsec:", "Login failed:"];
const MISSING_KEY_TOAST: &str = "Enter an nsec";

/// Tracks a pending manual login and a silent session restore.
#[derive(Debug, Default)]
pub struct SessionTracker {
    pending_login: Option<Secret>,
    restoring: bool,
    last_auth: Option<AuthState>,
}

impl SessionTracker {
    /// Creates an idle tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a stored key is being used to restore the session.
    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    /// Returns true if a submitted login key awaits confirmation.
    pub fn has_pending_login(&self) -> bool {
        self.pending_login.is_some()
    }

    /// Returns the restore action if the store holds an account key.
    pub fn start<S>(&mut self, store: &S) -> Option<AppAction>
    where
        S: SecretStore + ?Sized,
    {
        match store.read(SecretSlot::AccountKey) {
            Ok(Some(nsec)) => {
                self.restoring = true;
                tracing::info!("restoring session from stored key");
                Some(AppAction::RestoreSession { nsec })
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "could not read stored key");
                None
            }
        }
    }

    /// Prepares a manual login.
    pub fn login(&mut self, nsec: Secret) -> AppAction {
        let nsec = nsec.trimmed();
        self.pending_login = (!nsec.is_blank()).then(|| nsec.clone());
        AppAction::Login { nsec }
    }

    /// Forgets the session and empties the key slot.
    pub fn logout<S>(&mut self, store: &S) -> AppAction
    where
        S: SecretStore + ?Sized,
    {
        self.pending_login = None;
        self.restoring = false;
        if let Err(e) = store.clear(SecretSlot::AccountKey) {
            tracing::warn!(error = %e, "could not clear stored key");
        }
        AppAction::Logout
    }

    /// A freshly created account's key was delivered; no login is pending.
    pub fn on_account_created(&mut self) {
        self.pending_login = None;
    }

    /// Reacts to a newly applied mirror state.
    pub fn on_state<S>(&mut self, state: &AppState, store: &S)
    where
        S: SecretStore + ?Sized,
    {
        if self.restoring
            && (state.auth != AuthState::LoggedOut
                || state.router.default_screen != Screen::Login
                || state.toast.is_some())
        {
            self.restoring = false;
        }

        let auth_changed = self.last_auth.as_ref() != Some(&state.auth);
        if auth_changed {
            self.last_auth = Some(state.auth.clone());
        }

        if self.pending_login.is_none() {
            return;
        }
        if state.is_logged_in() {
            if !auth_changed {
                return;
            }
            if let Some(nsec) = self.pending_login.take() {
                match store.write_once(SecretSlot::AccountKey, &nsec) {
                    Ok(WriteOutcome::Written) => tracing::info!("stored login key"),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "could not store login key"),
                }
            }
        } else if state.toast.as_deref().is_some_and(is_login_error) {
            self.pending_login = None;
        }
    }
}

fn is_login_error(toast: &str) -> bool {
    toast == MISSING_KEY_TOAST || LOGIN_ERROR_PREFIXES.iter().any(|p| toast.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret_store::MemorySecretStore;

    fn logged_in() -> AppState {
        let mut state = AppState::empty();
        state.auth = AuthState::LoggedIn {
            npub: "npub1me".into(),
            pubkey: "aa".into(),
        };
        state.router.default_screen = Screen::ChatList;
        state
    }

    fn with_toast(text: &str) -> AppState {
        let mut state = AppState::empty();
        state.toast = Some(text.into());
        state
    }

    #[test]
    fn login_key_is_stored_once_logged_in() {
        let store = MemorySecretStore::new();
        let mut session = SessionTracker::new();

        let action = session.login(Secret::new("  nsec1me \n"));
        assert_eq!(
            action,
            AppAction::Login {
                nsec: Secret::new("nsec1me")
            }
        );

        session.on_state(&AppState::empty(), &store);
        assert!(session.has_pending_login());
        assert!(store.is_empty(SecretSlot::AccountKey).unwrap());

        session.on_state(&logged_in(), &store);
        assert!(!session.has_pending_login());
        assert_eq!(
            store.read(SecretSlot::AccountKey).unwrap().unwrap().expose(),
            "nsec1me"
        );
    }

    #[test]
    fn login_errors_discard_pending_key() {
        for toast in [
            "Invalid nsec: bad checksum",
            "Login failed: relay",
            "Enter an nsec",
        ] {
            let store = MemorySecretStore::new();
            let mut session = SessionTracker::new();
            session.login(Secret::new("nsec1bad"));

            session.on_state(&with_toast(toast), &store);
            assert!(!session.has_pending_login(), "{toast}");

            session.on_state(&logged_in(), &store);
            assert!(store.is_empty(SecretSlot::AccountKey).unwrap());
        }
    }

    #[test]
    fn unrelated_toast_keeps_pending_key() {
        let store = MemorySecretStore::new();
        let mut session = SessionTracker::new();
        session.login(Secret::new("nsec1me"));
        session.on_state(&with_toast("Connecting to relays"), &store);
        assert!(session.has_pending_login());
    }

    #[test]
    fn blank_login_is_not_pending() {
        let mut session = SessionTracker::new();
        session.login(Secret::new("   "));
        assert!(!session.has_pending_login());
    }

    #[test]
    fn account_created_clears_pending() {
        let mut session = SessionTracker::new();
        session.login(Secret::new("nsec1typed"));
        session.on_account_created();
        assert!(!session.has_pending_login());
    }

    #[test]
    fn restore_runs_until_state_moves_on() {
        let store = MemorySecretStore::with_secret(SecretSlot::AccountKey, "nsec1stored");
        let mut session = SessionTracker::new();

        let action = session.start(&store);
        assert!(matches!(
            action,
            Some(AppAction::RestoreSession { ref nsec }) if nsec.expose() == "nsec1stored"
        ));
        assert!(session.is_restoring());

        session.on_state(&AppState::empty(), &store);
        assert!(session.is_restoring());

        session.on_state(&logged_in(), &store);
        assert!(!session.is_restoring());
    }

    #[test]
    fn no_stored_key_means_no_restore() {
        let mut session = SessionTracker::new();
        assert!(session.start(&MemorySecretStore::new()).is_none());
        assert!(!session.is_restoring());
    }

    #[test]
    fn logout_clears_slot() {
        let store = MemorySecretStore::with_secret(SecretSlot::AccountKey, "nsec1stored");
        let mut session = SessionTracker::new();
        session.start(&store);

        assert_eq!(session.logout(&store), AppAction::Logout);
        assert!(!session.is_restoring());
        assert!(store.is_empty(SecretSlot::AccountKey).unwrap());
    }

    #[test]
    fn login_while_logged_in_waits_for_auth_change() {
        let store = MemorySecretStore::new();
        let mut session = SessionTracker::new();
        session.on_state(&logged_in(), &store);

        session.login(Secret::new("nsec1other"));
        let mut unrelated = logged_in();
        unrelated.toast = Some("Connecting to relays".into());
        session.on_state(&unrelated, &store);
        assert!(session.has_pending_login());
        assert!(store.is_empty(SecretSlot::AccountKey).unwrap());

        let mut switched = logged_in();
        switched.auth = AuthState::LoggedIn {
            npub: "npub1other".into(),
            pubkey: "bb".into(),
        };
        session.on_state(&switched, &store);
        assert!(!session.has_pending_login());
        assert_eq!(
            store.read(SecretSlot::AccountKey).unwrap().unwrap().expose(),
            "nsec1other"
        );
    }
}

//! Auth session
//!
//! Holds the signed-in user and bearer credential, persists both in the
//! key-value store, and tells listeners about sign-in and logout. Sign-in is
//! a stub: the caller supplies a token obtained elsewhere.

use crate::client::SessionExpiry;
use crate::keys;
use crate::listeners::{ListenerRegistry, ListenerResult, Subscription};
use crate::notify::SharedNotifier;
use crate::storage::KeyValueStore;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Profile of the signed-in user, stored under `user_profile`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Farcaster id
    pub fid: u64,
    /// Handle
    pub username: String,
    /// Name shown in the UI
    pub display_name: String,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Whether the admin panel is available
    #[serde(default)]
    pub is_admin: bool,
    /// Earned badge identifiers
    #[serde(default)]
    pub badges: Vec<String>,
    /// Activity counters
    #[serde(default)]
    pub stats: UserStats,
}

/// Activity counters attached to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    /// Apps the user launched
    pub apps_launched: u32,
    /// Cohorts the user joined
    pub cohorts_joined: u32,
    /// Successful referrals
    pub referrals: u32,
}

/// Session transition delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A user signed in
    SignedIn(UserProfile),
    /// The session ended (explicitly or because the server rejected it)
    LoggedOut,
}

#[derive(Default)]
struct SessionState {
    token: Option<SecretString>,
    user: Option<UserProfile>,
}

/// Signed-in state backed by the key-value store.
pub struct AuthSession {
    store: Arc<KeyValueStore>,
    notifier: Option<SharedNotifier>,
    state: RwLock<SessionState>,
    listeners: ListenerRegistry<AuthEvent>,
}

impl AuthSession {
    /// Create a session, restoring token and profile from `store` when both exist.
    pub fn new(store: Arc<KeyValueStore>) -> Self {
        let token = store.get_opt::<String>(keys::AUTH_TOKEN);
        let user = store.get_opt::<UserProfile>(keys::USER_PROFILE);

        let state = match (token, user) {
            (Some(token), Some(user)) => {
                tracing::debug!(fid = user.fid, "restored auth session");
                SessionState {
                    token: Some(SecretString::new(token.into_boxed_str())),
                    user: Some(user),
                }
            }
            _ => SessionState::default(),
        };

        Self {
            store,
            notifier: None,
            state: RwLock::new(state),
            listeners: ListenerRegistry::new("auth"),
        }
    }

    /// Send sign-in/out notifications to `notifier`
    pub fn with_notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Start a session with a token obtained elsewhere.
    pub fn sign_in(&self, token: impl Into<String>, user: UserProfile) {
        let token = token.into();
        let persisted =
            self.store.set(keys::AUTH_TOKEN, &token) && self.store.set(keys::USER_PROFILE, &user);
        if !persisted {
            tracing::warn!(fid = user.fid, "session not persisted; it will not survive a restart");
        }

        {
            let mut state = self.state.write();
            state.token = Some(SecretString::new(token.into_boxed_str()));
            state.user = Some(user.clone());
        }
        tracing::info!(fid = user.fid, username = %user.username, "signed in");

        if let Some(notifier) = &self.notifier {
            notifier.success(&format!("Welcome, {}!", user.display_name));
        }
        self.listeners.emit(&AuthEvent::SignedIn(user));
    }

    /// End the session and forget the stored credential and profile.
    pub fn logout(&self) {
        {
            let mut state = self.state.write();
            state.token = None;
            state.user = None;
        }
        self.store.remove(keys::AUTH_TOKEN);
        self.store.remove(keys::USER_PROFILE);
        tracing::info!("signed out");

        if let Some(notifier) = &self.notifier {
            notifier.info("Signed out successfully");
        }
        self.listeners.emit(&AuthEvent::LoggedOut);
    }

    /// Whether a user is signed in
    pub fn is_authenticated(&self) -> bool {
        let state = self.state.read();
        state.token.is_some() && state.user.is_some()
    }

    /// Signed-in user's profile
    pub fn user(&self) -> Option<UserProfile> {
        self.state.read().user.clone()
    }

    /// Bearer credential
    pub fn token(&self) -> Option<SecretString> {
        self.state
            .read()
            .token
            .as_ref()
            .map(|t| SecretString::new(t.expose_secret().into()))
    }

    /// Register a listener for sign-in and logout.
    pub fn on_auth_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }
}

impl SessionExpiry for AuthSession {
    fn session_expired(&self) {
        tracing::warn!("session expired; logging out");
        self.logout();
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("authenticated", &self.is_authenticated())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

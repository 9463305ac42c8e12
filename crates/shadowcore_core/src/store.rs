//! crates/shadowcore_core/src/store.rs
//!
//! The session store: the one piece of shared mutable state in the session layer.
//!
//! It is backed by a `watch` channel. Every setter goes through `send_modify`, so a
//! mutation is applied atomically and the derived `is_fully_authenticated` flag is
//! recomputed from the values the store holds at that moment. Observers get whole
//! snapshots and never see a half-applied transition.

use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::{PrimarySession, PrimaryUser, Profile, ProfileUpdate, SecondaryUser};

/// Lifecycle of the dynamically loaded secondary SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SdkStatus {
    #[default]
    Unloaded,
    Loading,
    Ready,
    /// The script failed to load. Reported as ready to the UI, never authenticated.
    Failed,
}

impl SdkStatus {
    /// Whether dependent UI may stop showing a loading state.
    pub fn is_ready(self) -> bool {
        matches!(self, SdkStatus::Ready | SdkStatus::Failed)
    }
}

/// Profile loading state machine: `Unloaded -> Loading -> Loaded | Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileLoadState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Error,
}

/// A full snapshot of the session layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub primary_user: Option<PrimaryUser>,
    pub primary_session: Option<PrimarySession>,
    pub is_primary_loading: bool,
    pub is_primary_authenticated: bool,

    pub secondary_user: Option<SecondaryUser>,
    pub secondary_status: SdkStatus,
    pub is_secondary_authenticated: bool,

    pub profile: Option<Profile>,
    pub profile_state: ProfileLoadState,

    pub is_fully_authenticated: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            primary_user: None,
            primary_session: None,
            is_primary_loading: true,
            is_primary_authenticated: false,
            secondary_user: None,
            secondary_status: SdkStatus::Unloaded,
            is_secondary_authenticated: false,
            profile: None,
            profile_state: ProfileLoadState::Unloaded,
            is_fully_authenticated: false,
        }
    }
}

impl AuthState {
    pub fn is_secondary_ready(&self) -> bool {
        self.secondary_status.is_ready()
    }

    fn recompute(&mut self) {
        self.is_primary_authenticated = self.primary_user.is_some();
        self.is_secondary_authenticated = self.secondary_user.is_some();
        self.is_fully_authenticated =
            self.is_primary_authenticated && self.is_secondary_authenticated;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryView {
    pub user: Option<PrimaryUser>,
    pub session: Option<PrimarySession>,
    pub is_loading: bool,
    pub is_authenticated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryView {
    pub user: Option<SecondaryUser>,
    pub is_ready: bool,
    pub is_authenticated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub profile: Option<Profile>,
    pub is_loading: bool,
}

/// An injected handle onto the session state. Cloning shares the same state.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<AuthState>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState::default());
        Self { tx: Arc::new(tx) }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// A receiver that is notified after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    fn mutate(&self, f: impl FnOnce(&mut AuthState)) {
        self.tx.send_modify(|state| {
            f(state);
            state.recompute();
        });
    }

    /// Applies `f` only while `user_id` is the signed-in primary user. Returns whether
    /// the mutation was applied; subscribers are not notified otherwise.
    fn mutate_for(&self, user_id: Uuid, f: impl FnOnce(&mut AuthState)) -> bool {
        self.tx.send_if_modified(|state| {
            if state.primary_user.as_ref().map(|u| u.id) != Some(user_id) {
                return false;
            }
            f(state);
            state.recompute();
            true
        })
    }

    pub fn set_primary_auth(&self, user: Option<PrimaryUser>, session: Option<PrimarySession>) {
        self.mutate(|s| {
            s.primary_user = user;
            s.primary_session = session;
        });
    }

    pub fn set_primary_loading(&self, loading: bool) {
        self.mutate(|s| s.is_primary_loading = loading);
    }

    pub fn set_secondary_user(&self, user: Option<SecondaryUser>) {
        self.mutate(|s| s.secondary_user = user);
    }

    pub fn set_secondary_status(&self, status: SdkStatus) {
        self.mutate(|s| s.secondary_status = status);
    }

    pub fn set_profile(&self, profile: Option<Profile>) {
        self.mutate(|s| s.profile = profile);
    }

    pub fn set_profile_state(&self, state: ProfileLoadState) {
        self.mutate(|s| s.profile_state = state);
    }

    /// Stores a fetched profile and its load state, unless `user_id` is no longer the
    /// signed-in primary user. Late results for a previous session are dropped.
    pub fn set_profile_for(
        &self,
        user_id: Uuid,
        profile: Option<Profile>,
        state: ProfileLoadState,
    ) -> bool {
        self.mutate_for(user_id, |s| {
            s.profile = profile;
            s.profile_state = state;
        })
    }

    /// Sets the preferred model on the held profile of `user_id`.
    pub fn set_preference_for(&self, user_id: Uuid, model_id: &str) -> bool {
        self.mutate_for(user_id, |s| {
            if let Some(profile) = s.profile.as_mut() {
                profile.preferred_model = Some(model_id.to_string());
            }
        })
    }

    /// Merges a partial update into the held profile. No-op without a profile.
    pub fn merge_profile(&self, update: &ProfileUpdate) {
        self.mutate(|s| {
            if let Some(profile) = s.profile.as_mut() {
                profile.apply(update);
            }
        });
    }

    /// Sets the preferred model on the held profile. No-op without a profile.
    pub fn update_profile_preference(&self, model_id: &str) {
        self.mutate(|s| {
            if let Some(profile) = s.profile.as_mut() {
                profile.preferred_model = Some(model_id.to_string());
            }
        });
    }

    /// Clears both identities and the profile. The SDK load status survives a reset
    /// and primary loading ends.
    pub fn reset(&self) {
        self.mutate(|s| {
            let secondary_status = s.secondary_status;
            *s = AuthState {
                secondary_status,
                is_primary_loading: false,
                ..AuthState::default()
            };
        });
    }

    pub fn primary_view(&self) -> PrimaryView {
        let s = self.tx.borrow();
        PrimaryView {
            user: s.primary_user.clone(),
            session: s.primary_session.clone(),
            is_loading: s.is_primary_loading,
            is_authenticated: s.is_primary_authenticated,
        }
    }

    pub fn secondary_view(&self) -> SecondaryView {
        let s = self.tx.borrow();
        SecondaryView {
            user: s.secondary_user.clone(),
            is_ready: s.is_secondary_ready(),
            is_authenticated: s.is_secondary_authenticated,
        }
    }

    pub fn profile_view(&self) -> ProfileView {
        let s = self.tx.borrow();
        ProfileView {
            profile: s.profile.clone(),
            is_loading: s.profile_state == ProfileLoadState::Loading,
        }
    }

    pub fn is_fully_authenticated(&self) -> bool {
        self.tx.borrow().is_fully_authenticated
    }

    /// True while either identity source is still resolving.
    pub fn is_loading(&self) -> bool {
        let s = self.tx.borrow();
        s.is_primary_loading || !s.is_secondary_ready()
    }
}

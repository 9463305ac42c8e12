//! crates/shadowcore_core/src/reconciler.rs
//!
//! Composes the primary and secondary identity sources into the session store.
//!
//! The two sources are followed by independent tasks: primary resolution gates the
//! profile fetch, the secondary SDK path never waits on either.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::{PrimaryAuthEvent, PrimarySession, SecondaryUser};
use crate::ports::{PortResult, PrimaryIdentityClient};
use crate::profile::ProfileService;
use crate::secondary::SecondaryIdentity;
use crate::store::SessionStore;

/// Where the identity provider sends the user back to after sign-in.
pub const CALLBACK_PATH: &str = "/auth/callback";

pub struct SessionReconciler {
    store: SessionStore,
    primary: Arc<dyn PrimaryIdentityClient>,
    secondary: Arc<SecondaryIdentity>,
    profiles: ProfileService,
}

impl SessionReconciler {
    pub fn new(
        store: SessionStore,
        primary: Arc<dyn PrimaryIdentityClient>,
        secondary: Arc<SecondaryIdentity>,
        profiles: ProfileService,
    ) -> Self {
        Self {
            store,
            primary,
            secondary,
            profiles,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn profiles(&self) -> &ProfileService {
        &self.profiles
    }

    pub fn secondary(&self) -> &Arc<SecondaryIdentity> {
        &self.secondary
    }

    //=====================================================================================
    // Primary identity
    //=====================================================================================

    /// Resolves the primary identity from the identity server, then loads the profile.
    /// Primary loading is over once this returns, whatever the outcome.
    pub async fn initialize_primary(&self) {
        match self.primary.get_current_user().await {
            Ok(user) => {
                let session = match self.primary.get_session().await {
                    Ok(session) => session,
                    Err(e) => {
                        warn!("Could not read primary session: {}", e);
                        None
                    }
                };
                let signed_in = user.is_some();
                self.store.set_primary_auth(user, session);
                if signed_in {
                    // Failures are recorded in the profile load state.
                    let _ = self.profiles.load().await;
                }
            }
            Err(e) => {
                error!("Auth initialization error: {}", e);
                self.store.set_primary_auth(None, None);
            }
        }
        self.store.set_primary_loading(false);
    }

    pub async fn handle_primary_event(&self, event: PrimaryAuthEvent) {
        match event {
            PrimaryAuthEvent::SignedIn(session) => {
                info!("Primary identity signed in: {}", session.user.id);
                self.store_session(Some(session));
                let _ = self.profiles.load().await;
            }
            PrimaryAuthEvent::SignedOut => {
                info!("Primary identity signed out; resetting session state.");
                self.store.set_profile(None);
                self.store.reset();
            }
            PrimaryAuthEvent::InitialSession(session) => self.store_session(session),
            PrimaryAuthEvent::TokenRefreshed(session) | PrimaryAuthEvent::UserUpdated(session) => {
                self.store_session(Some(session))
            }
        }
    }

    fn store_session(&self, session: Option<PrimarySession>) {
        let user = session.as_ref().map(|s| s.user.clone());
        self.store.set_primary_auth(user, session);
    }

    //=====================================================================================
    // Secondary identity
    //=====================================================================================

    /// Loads the SDK (once) and records its current sign-in state.
    pub async fn initialize_secondary(&self) {
        if self.secondary.ensure_loaded().await.is_some() {
            self.secondary.refresh_user().await;
        }
    }

    pub fn handle_secondary_change(&self, user: Option<SecondaryUser>) {
        self.store.set_secondary_user(user);
    }

    //=====================================================================================
    // Subscriptions
    //=====================================================================================

    /// Spawns one task per identity source. Both tasks stop when the returned handle is
    /// shut down or dropped.
    pub fn start(self: &Arc<Self>) -> ReconcilerHandle {
        let cancel = CancellationToken::new();

        // Subscribe before initializing so no change between the two is lost.
        let mut primary_rx = self.primary.subscribe();
        let primary_task = tokio::spawn({
            let this = self.clone();
            let cancel = cancel.clone();
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = this.initialize_primary() => {}
                }
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        event = primary_rx.recv() => match event {
                            Ok(event) => this.handle_primary_event(event).await,
                            Err(RecvError::Lagged(missed)) => {
                                warn!("Primary auth stream lagged by {} events; re-initializing.", missed);
                                this.initialize_primary().await;
                            }
                            Err(RecvError::Closed) => break,
                        },
                    }
                }
                info!("Primary auth subscription ended.");
            }
        });

        let secondary_task = tokio::spawn({
            let this = self.clone();
            let cancel = cancel.clone();
            async move {
                let sdk = tokio::select! {
                    _ = cancel.cancelled() => return,
                    sdk = this.secondary.ensure_loaded() => sdk,
                };
                let Some(sdk) = sdk else {
                    return;
                };
                let mut secondary_rx = sdk.subscribe();
                this.secondary.refresh_user().await;
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        change = secondary_rx.recv() => match change {
                            Ok(user) => this.handle_secondary_change(user),
                            Err(RecvError::Lagged(_)) => this.secondary.refresh_user().await,
                            Err(RecvError::Closed) => break,
                        },
                    }
                }
                info!("Secondary auth subscription ended.");
            }
        });

        ReconcilerHandle {
            cancel,
            tasks: vec![primary_task, secondary_task],
        }
    }

    //=====================================================================================
    // User actions
    //=====================================================================================

    /// Starts the primary provider sign-in, returning to `next` afterwards.
    pub async fn sign_in(&self, next: &str) -> PortResult<()> {
        let target = format!("{}?next={}", CALLBACK_PATH, urlencoding::encode(next));
        self.primary.sign_in_with_provider(&target).await
    }

    /// Signs out of both identities and resets the store.
    ///
    /// A secondary sign-out failure is logged and ignored. The store is reset even when
    /// the primary sign-out fails; that error is still returned.
    pub async fn sign_out(&self) -> PortResult<()> {
        let result = self.primary.sign_out().await;
        if let Err(e) = &result {
            error!("Sign out error: {}", e);
        }

        if self.store.snapshot().is_secondary_authenticated {
            if let Err(e) = self.secondary.sign_out().await {
                warn!("Secondary sign out error (ignored): {}", e);
            }
        }

        self.store.reset();
        result
    }

    pub async fn sign_in_secondary(&self) -> PortResult<SecondaryUser> {
        self.secondary.sign_in().await
    }

    pub async fn sign_out_secondary(&self) -> PortResult<()> {
        self.secondary.sign_out().await
    }
}

/// Owns the subscription tasks started by [`SessionReconciler::start`].
pub struct ReconcilerHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ReconcilerHandle {
    /// Unsubscribes from both sources and waits for the tasks to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        join_all(std::mem::take(&mut self.tasks)).await;
    }
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AuthState, ProfileLoadState, SdkStatus};
    use crate::testing::{
        primary_session, profile_for, secondary_user, FakeLoader, FakePrimary, FakeProfileApi,
        FakeSdk,
    };
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::watch;

    struct Harness {
        reconciler: Arc<SessionReconciler>,
        primary: Arc<FakePrimary>,
        sdk: Arc<FakeSdk>,
        api: Arc<FakeProfileApi>,
        session: PrimarySession,
    }

    fn harness(signed_in: bool) -> Harness {
        let store = SessionStore::new();
        let session = primary_session();
        let primary = FakePrimary::new(signed_in.then(|| session.clone()));
        let sdk = FakeSdk::new(None);
        let api = FakeProfileApi::new(Some(profile_for(session.user.id)));
        let secondary = Arc::new(SecondaryIdentity::new(
            FakeLoader::ok(sdk.clone()),
            store.clone(),
        ));
        let profiles = ProfileService::new(store.clone(), api.clone());
        let reconciler = Arc::new(SessionReconciler::new(
            store,
            primary.clone(),
            secondary,
            profiles,
        ));
        Harness {
            reconciler,
            primary,
            sdk,
            api,
            session,
        }
    }

    async fn wait_for(rx: &mut watch::Receiver<AuthState>, pred: impl Fn(&AuthState) -> bool) {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| pred(s)))
            .await
            .expect("state never reached")
            .expect("store dropped");
    }

    #[tokio::test]
    async fn initialize_loads_session_and_profile() {
        let h = harness(true);
        h.reconciler.initialize_primary().await;

        let snap = h.reconciler.store().snapshot();
        assert!(!snap.is_primary_loading);
        assert_eq!(snap.primary_session, Some(h.session.clone()));
        assert_eq!(snap.profile.map(|p| p.id), Some(h.session.user.id));
        assert_eq!(snap.profile_state, ProfileLoadState::Loaded);
    }

    #[tokio::test]
    async fn initialize_without_user_skips_profile() {
        let h = harness(false);
        h.reconciler.initialize_primary().await;

        let snap = h.reconciler.store().snapshot();
        assert!(!snap.is_primary_loading);
        assert!(!snap.is_primary_authenticated);
        assert_eq!(h.api.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn initialize_failure_ends_loading_unauthenticated() {
        let h = harness(true);
        h.primary.fail_get_user.store(true, Ordering::SeqCst);
        h.reconciler.initialize_primary().await;

        let snap = h.reconciler.store().snapshot();
        assert!(!snap.is_primary_loading);
        assert!(snap.primary_user.is_none());
    }

    #[tokio::test]
    async fn primary_sign_out_resets_regardless_of_secondary() {
        let h = harness(true);
        h.reconciler.initialize_primary().await;
        h.reconciler.initialize_secondary().await;
        h.reconciler.handle_secondary_change(Some(secondary_user()));
        assert!(h.reconciler.store().is_fully_authenticated());

        h.reconciler.handle_primary_event(PrimaryAuthEvent::SignedOut).await;

        let snap = h.reconciler.store().snapshot();
        assert!(snap.profile.is_none());
        assert!(snap.primary_user.is_none());
        assert!(snap.secondary_user.is_none());
        assert!(!snap.is_fully_authenticated);
        assert_eq!(snap.secondary_status, SdkStatus::Ready);
    }

    #[tokio::test]
    async fn signed_in_event_refetches_profile() {
        let h = harness(false);
        h.reconciler.initialize_primary().await;

        h.reconciler
            .handle_primary_event(PrimaryAuthEvent::SignedIn(h.session.clone()))
            .await;

        let snap = h.reconciler.store().snapshot();
        assert!(snap.is_primary_authenticated);
        assert_eq!(snap.profile.map(|p| p.id), Some(h.session.user.id));
    }

    #[tokio::test]
    async fn token_refresh_keeps_profile() {
        let h = harness(true);
        h.reconciler.initialize_primary().await;
        let mut refreshed = h.session.clone();
        refreshed.access_token = "rotated".into();

        h.reconciler
            .handle_primary_event(PrimaryAuthEvent::TokenRefreshed(refreshed))
            .await;

        let snap = h.reconciler.store().snapshot();
        assert_eq!(snap.primary_session.map(|s| s.access_token).as_deref(), Some("rotated"));
        assert!(snap.profile.is_some());
        assert_eq!(h.api.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn subscriptions_follow_both_sources_independently() {
        let h = harness(false);
        let mut rx = h.reconciler.store().subscribe();
        let handle = h.reconciler.start();

        wait_for(&mut rx, |s| !s.is_primary_loading && s.secondary_status == SdkStatus::Ready)
            .await;

        h.sdk.emit(Some(secondary_user()));
        wait_for(&mut rx, |s| s.is_secondary_authenticated).await;
        assert!(!h.reconciler.store().is_fully_authenticated());

        h.primary.emit(PrimaryAuthEvent::SignedIn(h.session.clone()));
        wait_for(&mut rx, |s| s.is_fully_authenticated && s.profile.is_some()).await;

        h.sdk.emit(None);
        wait_for(&mut rx, |s| !s.is_secondary_authenticated).await;
        let snap = h.reconciler.store().snapshot();
        assert!(snap.is_primary_authenticated);
        assert!(snap.profile.is_some());
        assert!(!snap.is_fully_authenticated);

        h.primary.emit(PrimaryAuthEvent::SignedOut);
        wait_for(&mut rx, |s| !s.is_primary_authenticated && s.profile.is_none()).await;

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn sign_out_signs_out_both_and_ignores_secondary_failure() {
        let h = harness(true);
        h.reconciler.initialize_primary().await;
        h.reconciler.initialize_secondary().await;
        h.reconciler.sign_in_secondary().await.unwrap();
        h.sdk.fail_sign_out.store(true, Ordering::SeqCst);

        h.reconciler.sign_out().await.unwrap();

        assert_eq!(h.primary.sign_outs.load(Ordering::SeqCst), 1);
        let snap = h.reconciler.store().snapshot();
        assert!(!snap.is_primary_authenticated);
        assert!(!snap.is_secondary_authenticated);
    }

    #[tokio::test]
    async fn sign_out_resets_even_when_primary_fails() {
        let h = harness(true);
        h.reconciler.initialize_primary().await;
        h.primary.fail_sign_out.store(true, Ordering::SeqCst);

        assert!(h.reconciler.sign_out().await.is_err());
        assert!(h.reconciler.store().snapshot().profile.is_none());
    }

    #[tokio::test]
    async fn sign_in_redirects_through_callback() {
        let h = harness(false);
        h.reconciler.sign_in("/ghostwrite/drafts").await.unwrap();
        assert_eq!(
            h.primary.redirects.lock().unwrap().as_slice(),
            ["/auth/callback?next=%2Fghostwrite%2Fdrafts".to_string()]
        );
    }

    #[tokio::test]
    async fn shutdown_during_sdk_load_clears_loading_status() {
        let store = SessionStore::new();
        let primary = FakePrimary::new(None);
        let secondary = Arc::new(SecondaryIdentity::new(FakeLoader::hanging(), store.clone()));
        let profiles = ProfileService::new(store.clone(), FakeProfileApi::new(None));
        let reconciler = Arc::new(SessionReconciler::new(
            store.clone(),
            primary,
            secondary,
            profiles,
        ));
        let mut rx = store.subscribe();
        let handle = reconciler.start();

        wait_for(&mut rx, |s| {
            !s.is_primary_loading && s.secondary_status == SdkStatus::Loading
        })
        .await;
        handle.shutdown().await;

        assert_eq!(store.snapshot().secondary_status, SdkStatus::Unloaded);
    }
}

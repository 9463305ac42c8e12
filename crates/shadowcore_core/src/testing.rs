//! In-memory fakes of the client-side ports, shared by the unit tests of this crate.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;

use crate::domain::{
    ChatMessage, ChatOptions, ChatResponse, ChatRole, PrimaryAuthEvent, PrimarySession,
    PrimaryUser, Profile, ProfileUpdate, SecondaryUser,
};
use crate::models::is_known_model;
use crate::ports::{
    PortError, PortResult, PrimaryIdentityClient, ProfileApi, SdkLoader, SecondaryIdentitySdk,
};

pub fn primary_session() -> PrimarySession {
    PrimarySession {
        user: PrimaryUser {
            id: Uuid::new_v4(),
            email: Some("creator@example.com".into()),
            full_name: Some("Casey Creator".into()),
            avatar_url: None,
        },
        access_token: "access-token".into(),
        refresh_token: Some("refresh-token".into()),
        expires_at: None,
    }
}

pub fn secondary_user() -> SecondaryUser {
    SecondaryUser {
        username: "casey".into(),
        uuid: "sdk-user-1".into(),
        email: None,
    }
}

pub fn profile_for(id: Uuid) -> Profile {
    Profile {
        id,
        email: Some("creator@example.com".into()),
        full_name: Some("Casey Creator".into()),
        avatar_url: None,
        preferred_model: None,
        settings: json!({ "theme": "dark" }),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

//=========================================================================================
// Primary identity
//=========================================================================================

pub struct FakePrimary {
    pub session: Mutex<Option<PrimarySession>>,
    pub fail_get_user: AtomicBool,
    pub fail_sign_out: AtomicBool,
    pub redirects: Mutex<Vec<String>>,
    pub sign_outs: AtomicUsize,
    events: broadcast::Sender<PrimaryAuthEvent>,
}

impl FakePrimary {
    pub fn new(session: Option<PrimarySession>) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            session: Mutex::new(session),
            fail_get_user: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            redirects: Mutex::new(Vec::new()),
            sign_outs: AtomicUsize::new(0),
            events,
        })
    }

    pub fn emit(&self, event: PrimaryAuthEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl PrimaryIdentityClient for FakePrimary {
    async fn get_current_user(&self) -> PortResult<Option<PrimaryUser>> {
        if self.fail_get_user.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("identity server unreachable".into()));
        }
        Ok(self.session.lock().unwrap().as_ref().map(|s| s.user.clone()))
    }

    async fn get_session(&self) -> PortResult<Option<PrimarySession>> {
        Ok(self.session.lock().unwrap().clone())
    }

    async fn sign_in_with_provider(&self, redirect_target: &str) -> PortResult<()> {
        self.redirects.lock().unwrap().push(redirect_target.to_string());
        Ok(())
    }

    async fn sign_out(&self) -> PortResult<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("sign out failed".into()));
        }
        *self.session.lock().unwrap() = None;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PrimaryAuthEvent> {
        self.events.subscribe()
    }
}

//=========================================================================================
// Secondary SDK
//=========================================================================================

pub struct FakeSdk {
    pub user: Mutex<Option<SecondaryUser>>,
    pub fail_sign_out: AtomicBool,
    pub last_chat: Mutex<Option<ChatOptions>>,
    events: broadcast::Sender<Option<SecondaryUser>>,
}

impl FakeSdk {
    pub fn new(user: Option<SecondaryUser>) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            user: Mutex::new(user),
            fail_sign_out: AtomicBool::new(false),
            last_chat: Mutex::new(None),
            events,
        })
    }

    pub fn emit(&self, user: Option<SecondaryUser>) {
        *self.user.lock().unwrap() = user.clone();
        let _ = self.events.send(user);
    }
}

#[async_trait]
impl SecondaryIdentitySdk for FakeSdk {
    async fn is_signed_in(&self) -> PortResult<bool> {
        Ok(self.user.lock().unwrap().is_some())
    }

    async fn sign_in(&self) -> PortResult<SecondaryUser> {
        let user = secondary_user();
        *self.user.lock().unwrap() = Some(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> PortResult<()> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("sdk sign out failed".into()));
        }
        *self.user.lock().unwrap() = None;
        Ok(())
    }

    async fn get_user(&self) -> PortResult<Option<SecondaryUser>> {
        Ok(self.user.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<Option<SecondaryUser>> {
        self.events.subscribe()
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> PortResult<ChatResponse> {
        *self.last_chat.lock().unwrap() = Some(options.clone());
        let echo = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        Ok(ChatResponse {
            message: ChatMessage {
                role: ChatRole::Assistant,
                content: echo,
            },
            usage: None,
        })
    }
}

pub struct FakeLoader {
    sdk: Option<Arc<FakeSdk>>,
    hang: bool,
    pub loads: AtomicUsize,
}

impl FakeLoader {
    pub fn ok(sdk: Arc<FakeSdk>) -> Arc<Self> {
        Arc::new(Self {
            sdk: Some(sdk),
            hang: false,
            loads: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sdk: None,
            hang: false,
            loads: AtomicUsize::new(0),
        })
    }

    /// A loader whose script never finishes loading.
    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            sdk: None,
            hang: true,
            loads: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SdkLoader for FakeLoader {
    async fn load(&self) -> PortResult<Arc<dyn SecondaryIdentitySdk>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.hang {
            std::future::pending::<()>().await;
        }
        match &self.sdk {
            Some(sdk) => Ok(sdk.clone() as Arc<dyn SecondaryIdentitySdk>),
            None => Err(PortError::Unavailable("script failed to load".into())),
        }
    }
}

//=========================================================================================
// Profile API
//=========================================================================================

/// Holds the "server side" copy of the profile.
pub struct FakeProfileApi {
    pub server: Mutex<Option<Profile>>,
    pub fail_fetch: AtomicBool,
    pub fail_updates: AtomicBool,
    pub fetches: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeProfileApi {
    pub fn new(profile: Option<Profile>) -> Arc<Self> {
        Arc::new(Self {
            server: Mutex::new(profile),
            fail_fetch: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
            gate: Mutex::new(None),
        })
    }

    /// From now on, fetch and update responses wait until the returned gate is notified.
    pub fn hold_responses(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    async fn wait_for_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    pub fn server_profile(&self) -> Option<Profile> {
        self.server.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileApi for FakeProfileApi {
    async fn fetch_profile(&self) -> PortResult<Profile> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("Failed to fetch profile".into()));
        }
        self.server
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PortError::NotFound("profile".into()))
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> PortResult<Profile> {
        self.wait_for_gate().await;
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("Failed to update profile".into()));
        }
        let mut server = self.server.lock().unwrap();
        let profile = server
            .as_mut()
            .ok_or_else(|| PortError::NotFound("profile".into()))?;
        profile.apply(update);
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn fetch_preference(&self) -> PortResult<String> {
        self.fetch_profile()
            .await
            .map(|p| p.preferred_model_or_default().to_string())
    }

    async fn update_preference(&self, model_id: &str) -> PortResult<String> {
        if !is_known_model(model_id) {
            return Err(PortError::Rejected("Invalid model ID".into()));
        }
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("Failed to update preferences".into()));
        }
        let mut server = self.server.lock().unwrap();
        let profile = server
            .as_mut()
            .ok_or_else(|| PortError::NotFound("profile".into()))?;
        profile.preferred_model = Some(model_id.to_string());
        Ok(model_id.to_string())
    }
}

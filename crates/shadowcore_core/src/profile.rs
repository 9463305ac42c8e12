//! crates/shadowcore_core/src/profile.rs
//!
//! Client-side profile service: loads the profile into the session store and applies
//! optimistic updates that are reconciled by re-fetching on failure.

use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::domain::{Profile, ProfileUpdate};
use crate::ports::{PortError, PortResult, ProfileApi};
use crate::store::{ProfileLoadState, SessionStore};

#[derive(Clone)]
pub struct ProfileService {
    store: SessionStore,
    api: Arc<dyn ProfileApi>,
}

impl ProfileService {
    pub fn new(store: SessionStore, api: Arc<dyn ProfileApi>) -> Self {
        Self { store, api }
    }

    fn primary_user_id(&self) -> PortResult<Uuid> {
        self.store
            .snapshot()
            .primary_user
            .map(|u| u.id)
            .ok_or(PortError::Unauthorized)
    }

    /// Fetches the profile of the signed-in primary user into the store.
    ///
    /// Every failure lands in `ProfileLoadState::Error`, which the next call retries.
    /// A result that arrives after the user signed out is dropped and reported as
    /// `Unauthorized`.
    pub async fn load(&self) -> PortResult<Profile> {
        let user_id = self.primary_user_id()?;

        self.store.set_profile_state(ProfileLoadState::Loading);
        let result = match self.api.fetch_profile().await {
            Ok(profile) if profile.id != user_id => Err(PortError::Unexpected(format!(
                "profile {} does not belong to user {}",
                profile.id, user_id
            ))),
            other => other,
        };

        match result {
            Ok(profile) => {
                let stored = self.store.set_profile_for(
                    user_id,
                    Some(profile.clone()),
                    ProfileLoadState::Loaded,
                );
                if !stored {
                    warn!("Discarding profile of {}: signed out while loading.", user_id);
                    return Err(PortError::Unauthorized);
                }
                Ok(profile)
            }
            Err(e) => {
                error!("Error fetching profile: {}", e);
                self.store
                    .set_profile_for(user_id, None, ProfileLoadState::Error);
                Err(e)
            }
        }
    }

    /// Applies `update` locally, then persists it.
    ///
    /// On failure the authoritative record is re-fetched and overwrites local state; the
    /// original error is returned.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> PortResult<Profile> {
        let user_id = self.primary_user_id()?;
        self.store.merge_profile(update);

        match self.api.update_profile(update).await {
            Ok(profile) => {
                self.store.set_profile_for(
                    user_id,
                    Some(profile.clone()),
                    ProfileLoadState::Loaded,
                );
                Ok(profile)
            }
            Err(e) => {
                error!("Profile update error: {}", e);
                self.reconcile(user_id).await;
                Err(e)
            }
        }
    }

    /// Same optimistic pattern as `update_profile`, scoped to the preferred model.
    pub async fn update_preference(&self, model_id: &str) -> PortResult<String> {
        let user_id = self.primary_user_id()?;
        self.store.update_profile_preference(model_id);

        match self.api.update_preference(model_id).await {
            Ok(stored) => {
                self.store.set_preference_for(user_id, &stored);
                Ok(stored)
            }
            Err(e) => {
                error!("Preference update error: {}", e);
                self.reconcile(user_id).await;
                Err(e)
            }
        }
    }

    /// The preferred model, from the loaded profile when there is one.
    pub async fn preference(&self) -> PortResult<String> {
        if let Some(profile) = self.store.snapshot().profile {
            return Ok(profile.preferred_model_or_default().to_string());
        }
        self.api.fetch_preference().await
    }

    async fn reconcile(&self, user_id: Uuid) {
        match self.api.fetch_profile().await {
            Ok(profile) if profile.id == user_id => {
                self.store
                    .set_profile_for(user_id, Some(profile), ProfileLoadState::Loaded);
            }
            Ok(profile) => warn!("Re-fetched profile {} does not belong to {}", profile.id, user_id),
            Err(e) => warn!("Could not re-fetch profile after failed update: {}", e),
        }
    }
}

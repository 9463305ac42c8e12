//! crates/shadowcore_core/src/secondary.rs
//!
//! The secondary identity capability: a third-party SDK that is loaded once per
//! lifetime and provides its own sign-in, used only to unlock AI calls.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::domain::SecondaryUser;
use crate::ports::{PortError, PortResult, SdkLoader, SecondaryIdentitySdk};
use crate::store::{SdkStatus, SessionStore};

/// Wraps the SDK loader and keeps the store's secondary fields current.
pub struct SecondaryIdentity {
    loader: Arc<dyn SdkLoader>,
    store: SessionStore,
    // `None` inside the cell records a failed load; it is never retried.
    sdk: OnceCell<Option<Arc<dyn SecondaryIdentitySdk>>>,
}

impl SecondaryIdentity {
    pub fn new(loader: Arc<dyn SdkLoader>, store: SessionStore) -> Self {
        Self {
            loader,
            store,
            sdk: OnceCell::new(),
        }
    }

    /// Loads the SDK on first call. Concurrent and repeated calls share that one load.
    ///
    /// A failed load still leaves the capability "ready" (status `Failed`) so that
    /// dependent UI stops waiting, but no SDK is returned and sign-in stays unavailable.
    pub async fn ensure_loaded(&self) -> Option<Arc<dyn SecondaryIdentitySdk>> {
        self.sdk
            .get_or_init(|| async {
                self.store.set_secondary_status(SdkStatus::Loading);
                let mut pending = PendingLoad {
                    store: &self.store,
                    finished: false,
                };
                let sdk = match self.loader.load().await {
                    Ok(sdk) => {
                        info!("Secondary identity SDK loaded.");
                        self.store.set_secondary_status(SdkStatus::Ready);
                        Some(sdk)
                    }
                    Err(e) => {
                        error!("Failed to load secondary identity SDK: {}", e);
                        self.store.set_secondary_status(SdkStatus::Failed);
                        None
                    }
                };
                pending.finished = true;
                sdk
            })
            .await
            .clone()
    }

    /// The loaded SDK, if loading has finished successfully.
    pub fn sdk(&self) -> Option<Arc<dyn SecondaryIdentitySdk>> {
        self.sdk.get().cloned().flatten()
    }

    pub fn status(&self) -> SdkStatus {
        self.store.snapshot().secondary_status
    }

    /// Queries the SDK for its current sign-in state and stores the result.
    /// Any SDK error is treated as signed out.
    pub async fn refresh_user(&self) {
        let Some(sdk) = self.sdk() else {
            return;
        };

        let user = match sdk.is_signed_in().await {
            Ok(true) => match sdk.get_user().await {
                Ok(user) => user,
                Err(e) => {
                    warn!("Secondary identity user lookup failed: {}", e);
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                warn!("Secondary identity auth check failed: {}", e);
                None
            }
        };
        self.store.set_secondary_user(user);
    }

    pub async fn sign_in(&self) -> PortResult<SecondaryUser> {
        let sdk = self.require_sdk()?;
        let user = sdk.sign_in().await.map_err(|e| {
            error!("Secondary identity sign in failed: {}", e);
            e
        })?;
        self.store.set_secondary_user(Some(user.clone()));
        Ok(user)
    }

    pub async fn sign_out(&self) -> PortResult<()> {
        let sdk = self.require_sdk()?;
        sdk.sign_out().await.map_err(|e| {
            error!("Secondary identity sign out failed: {}", e);
            e
        })?;
        self.store.set_secondary_user(None);
        Ok(())
    }

    fn require_sdk(&self) -> PortResult<Arc<dyn SecondaryIdentitySdk>> {
        self.sdk()
            .ok_or_else(|| PortError::Unavailable("secondary identity SDK not loaded".into()))
    }
}

/// Puts the status back to `Unloaded` when a load is dropped before it finishes, so the
/// next `ensure_loaded` starts over instead of leaving the store stuck in `Loading`.
struct PendingLoad<'a> {
    store: &'a SessionStore,
    finished: bool,
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Secondary identity SDK load abandoned.");
            self.store.set_secondary_status(SdkStatus::Unloaded);
        }
    }
}

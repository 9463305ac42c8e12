pub mod ai;
pub mod domain;
pub mod models;
pub mod ports;
pub mod profile;
pub mod reconciler;
pub mod secondary;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use ai::AiGateway;
pub use domain::{
    ChatMessage, ChatOptions, ChatResponse, ChatRole, PrimaryAuthEvent, PrimarySession,
    PrimaryUser, Profile, ProfileSeed, ProfileUpdate, SecondaryUser,
};
pub use models::{find_model, is_known_model, AiModel, AI_MODELS, DEFAULT_MODEL_ID};
pub use ports::{
    IdentityVerifier, PortError, PortResult, PrimaryIdentityClient, ProfileApi,
    ProfileRepository, SdkLoader, SecondaryIdentitySdk,
};
pub use profile::ProfileService;
pub use reconciler::{ReconcilerHandle, SessionReconciler};
pub use secondary::SecondaryIdentity;
pub use store::{AuthState, ProfileLoadState, SdkStatus, SessionStore};

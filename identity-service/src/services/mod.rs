pub mod accounts;
pub mod admission;
pub mod bootstrap;
pub mod error;
pub mod federation;
pub mod flags;
pub mod identity;
pub mod key_validator;
pub mod keys;
pub mod memory_store;
pub mod permissions;
pub mod policy;
pub mod session;
pub mod store;

pub use bootstrap::{seed_defaults, BootstrapReport};
pub use error::{AuthError, StoreError};
pub use federation::{FederationResolver, OrgResolution};
pub use flags::{FeatureFlags, FederationConfig, FlagSnapshot, FlagStore, FlagsPatch};
pub use identity::IdentityService;
pub use key_validator::KeyValidator;
pub use memory_store::InMemoryStore;
pub use policy::{Action, Decision, Denied, PolicyEngine, PolicyRule, SilentIgnore, Target};
pub use session::SessionAuthenticator;
pub use store::{CredentialStore, EntityGuard};

//! Domain entities of the identity core.
//!
//! Records that carry secrets (`User`, `AdvancedAuthKey`) are deliberately not
//! `Serialize`; the `*View` types are what leaves the process.

pub mod auth_key;
pub mod credential;
pub mod identity;
pub mod organization;
pub mod role;
pub mod user;

pub use auth_key::{AdvancedAuthKey, AuthKeyView, IssuedAuthKey, KeyOptions};
pub use credential::{Credential, CredentialBundle, FederatedAttributes, PasswordLogin};
pub use identity::{AuthMethod, AuthenticatedIdentity, IdentityView};
pub use organization::{Organization, OrganizationView};
pub use role::{Capability, NewRole, Role, RoleChanges, RoleView};
pub use user::{CreatedUser, NewUser, UpdateOutcome, User, UserChanges, UserField, UserView};

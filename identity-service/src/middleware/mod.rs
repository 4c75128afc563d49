pub mod auth;
pub mod session;

pub use auth::{auth_middleware, credential_bundle, AuthUser};
pub use session::{SessionRegistry, SESSION_COOKIE};

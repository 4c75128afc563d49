use service_core::error::AppError;
use thiserror::Error;

/// Failures of the identity core. Authentication variants never carry detail
/// about which check failed.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing credential")]
    MissingCredential,

    #[error("Malformed credential")]
    MalformedCredential,

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Account disabled")]
    AccountDisabled,

    #[error("Platform unavailable")]
    PlatformUnavailable,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Login form not available")]
    LoginFormUnavailable,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        AuthError::Forbidden(reason.into())
    }

    /// Short stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::MalformedCredential => "malformed_credential",
            AuthError::InvalidCredential => "invalid_credential",
            AuthError::AccountDisabled => "account_disabled",
            AuthError::PlatformUnavailable => "platform_unavailable",
            AuthError::Forbidden(_) => "forbidden",
            AuthError::NotFound(_) => "not_found",
            AuthError::Conflict(_) => "conflict",
            AuthError::LoginFormUnavailable => "login_form_unavailable",
            AuthError::Validation(_) => "validation",
            AuthError::Internal(_) => "internal",
        }
    }

    /// Ordering used when several presented keys fail differently: errors
    /// that identify an account beat unknown keys, which beat bad formats.
    pub(crate) fn key_failure_weight(&self) -> u8 {
        match self {
            AuthError::AccountDisabled
            | AuthError::PlatformUnavailable
            | AuthError::Forbidden(_) => 3,
            AuthError::InvalidCredential => 2,
            AuthError::MalformedCredential => 1,
            _ => 0,
        }
    }
}

/// Storage adapter failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => AuthError::NotFound(entity),
            StoreError::Conflict(reason) => AuthError::Conflict(reason),
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential
            | AuthError::MalformedCredential
            | AuthError::InvalidCredential
            | AuthError::AccountDisabled => AppError::AuthError(anyhow::anyhow!("Authentication failed")),
            AuthError::PlatformUnavailable => AppError::ServiceUnavailable,
            AuthError::Forbidden(reason) => AppError::Forbidden(anyhow::anyhow!(reason)),
            AuthError::NotFound(entity) => AppError::NotFound(anyhow::anyhow!("{} not found", entity)),
            AuthError::Conflict(reason) => AppError::Conflict(anyhow::anyhow!(reason)),
            AuthError::LoginFormUnavailable => AppError::NotFound(anyhow::anyhow!("Not found")),
            AuthError::Validation(message) => AppError::Unprocessable(anyhow::anyhow!(message)),
            AuthError::Internal(e) => AppError::InternalError(e),
        }
    }
}

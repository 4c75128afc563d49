use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use service_core::error::AppError;

use super::session::{SessionRegistry, SESSION_COOKIE};
use crate::models::{AuthenticatedIdentity, CredentialBundle, FederatedAttributes};
use crate::services::FeatureFlags;
use crate::AppState;

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Collects every credential signal of a request. Federation headers are
/// only read when federation is enabled, under the configured names.
pub fn credential_bundle(
    headers: &HeaderMap,
    jar: &CookieJar,
    sessions: &SessionRegistry,
    flags: &FeatureFlags,
) -> CredentialBundle {
    let federation = if flags.federation.enabled {
        let config = &flags.federation;
        let attributes = FederatedAttributes {
            email: header_text(headers, &config.mail_attr),
            organization: header_text(headers, &config.org_attr),
            groups: header_text(headers, &config.group_attr),
        };
        Some(attributes).filter(|a| a != &FederatedAttributes::default())
    } else {
        None
    };

    CredentialBundle {
        authkey: header_text(headers, header::AUTHORIZATION.as_str()),
        federation,
        session_user: jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| sessions.resolve(cookie.value())),
        password_login: None,
    }
}

/// Middleware to require authentication
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let snapshot = state.identity.flags().snapshot();
    let bundle = credential_bundle(req.headers(), &jar, &state.sessions, &snapshot.flags);

    let identity = state
        .identity
        .authenticate_with(&bundle, &snapshot.flags)
        .await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Extractor for the identity the middleware resolved.
pub struct AuthUser(pub AuthenticatedIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Identity missing from request extensions"
                ))
            })?;

        Ok(AuthUser(identity.clone()))
    }
}

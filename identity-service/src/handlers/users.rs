use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{AuthKeyResponse, ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest},
    middleware::{AuthUser, SESSION_COOKIE},
    models::{CredentialBundle, UserChanges},
    utils::{Password, ValidatedJson},
    AppState,
};

/// `me` or a user id.
pub(crate) fn resolve_user_ref(reference: &str, user: &AuthUser) -> Result<Uuid, AppError> {
    if reference == "me" {
        return Ok(user.0.user_id());
    }
    Uuid::parse_str(reference)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid user id: {}", reference)))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bundle = CredentialBundle::with_password(req.email, req.password);
    let identity = state.identity.authenticate(&bundle).await?;

    let token = state.sessions.create(identity.user_id());
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax);

    let body = LoginResponse {
        must_change_password: identity.must_change_password(),
        identity: identity.view(),
    };

    Ok((jar.add(cookie), Json(body)))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> impl IntoResponse {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.revoke(cookie.value());
    }
    (
        jar.remove(Cookie::from(SESSION_COOKIE)),
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .identity
        .register(&req.email, &Password::new(req.password))
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn view_me(user: AuthUser) -> impl IntoResponse {
    Json(user.0.view())
}

pub async fn view_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = resolve_user_ref(&id, &user)?;
    let view = state.identity.get_user(&user.0, user_id).await?;
    Ok(Json(view))
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.identity.list_users(&user.0).await?))
}

pub async fn edit_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(changes): Json<UserChanges>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = resolve_user_ref(&id, &user)?;
    let disabling = changes.disabled == Some(true);

    let outcome = state.identity.update_user(&user.0, user_id, changes).await?;
    if disabling && outcome.user.disabled {
        state.sessions.revoke_user(user_id);
    }
    Ok(Json(outcome))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .identity
        .change_own_password(&user.0, &Password::new(req.password))
        .await?;
    Ok(Json(outcome))
}

pub async fn reset_authkey(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = resolve_user_ref(&id, &user)?;
    let authkey = state.identity.reset_primary_key(&user.0, user_id).await?;
    Ok(Json(AuthKeyResponse { authkey }))
}

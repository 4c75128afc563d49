use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use super::users::resolve_user_ref;
use crate::{
    dtos::{KeyIndexQuery, MessageResponse},
    middleware::AuthUser,
    models::KeyOptions,
    AppState,
};

pub async fn add_key(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_ref): Path<String>,
    body: Option<Json<KeyOptions>>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = resolve_user_ref(&user_ref, &user)?;
    let options = body.map(|Json(options)| options).unwrap_or_default();

    let issued = state
        .identity
        .issue_advanced_key(&user.0, user_id, options)
        .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

pub async fn delete_key(
    State(state): State<AppState>,
    user: AuthUser,
    Path(key_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.identity.revoke_advanced_key(&user.0, key_id).await?;
    Ok(Json(MessageResponse {
        message: "Authkey deleted".to_string(),
    }))
}

pub async fn view_key(
    State(state): State<AppState>,
    user: AuthUser,
    Path(key_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.identity.view_advanced_key(&user.0, key_id).await?))
}

pub async fn index_keys(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<KeyIndexQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(
        state
            .identity
            .list_advanced_keys(&user.0, query.user_id)
            .await?,
    ))
}

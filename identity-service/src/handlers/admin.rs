use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{CreateOrganizationRequest, MessageResponse},
    middleware::AuthUser,
    models::{NewRole, NewUser, RoleChanges},
    services::FlagsPatch,
    utils::ValidatedJson,
    AppState,
};

pub async fn add_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(new_user): Json<NewUser>,
) -> Result<impl IntoResponse, AppError> {
    let created = state.identity.create_user(&user.0, new_user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.identity.delete_user(&user.0, user_id).await?;
    state.sessions.revoke_user(user_id);
    Ok(Json(MessageResponse {
        message: "User deleted".to_string(),
    }))
}

pub async fn list_organizations(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.identity.list_organizations(&user.0).await?))
}

pub async fn add_organization(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let org = state
        .identity
        .create_organization(&user.0, &req.name, req.local)
        .await?;
    Ok((StatusCode::CREATED, Json(org)))
}

pub async fn delete_organization(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.identity.delete_organization(&user.0, org_id).await?;
    Ok(Json(MessageResponse {
        message: "Organization deleted".to_string(),
    }))
}

pub async fn list_roles(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.identity.list_roles().await?))
}

pub async fn add_role(
    State(state): State<AppState>,
    user: AuthUser,
    Json(new_role): Json<NewRole>,
) -> Result<impl IntoResponse, AppError> {
    let role = state.identity.create_role(&user.0, new_role).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn edit_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(role_id): Path<Uuid>,
    Json(changes): Json<RoleChanges>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.identity.update_role(&user.0, role_id, changes).await?))
}

pub async fn delete_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(role_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.identity.delete_role(&user.0, role_id).await?;
    Ok(Json(MessageResponse {
        message: "Role deleted".to_string(),
    }))
}

pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthUser,
    Json(patch): Json<FlagsPatch>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.identity.update_flags(&user.0, patch).await?;
    Ok(Json(snapshot.as_ref().clone()))
}

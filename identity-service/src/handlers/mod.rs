//! HTTP handlers. They translate transport to the identity core and back and
//! hold no policy of their own.

pub mod admin;
pub mod auth_keys;
pub mod users;

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let snapshot = state.identity.flags().snapshot();

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "platform_live": snapshot.flags.platform_live,
        "flags_version": snapshot.version,
    })))
}

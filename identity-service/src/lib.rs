pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use tower_http::trace::TraceLayer;

use crate::config::IdentityConfig;
use crate::middleware::SessionRegistry;
use crate::services::IdentityService;

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub identity: IdentityService,
    pub sessions: SessionRegistry,
}

pub fn build_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/users/view/me", get(handlers::users::view_me))
        .route("/users/view/:id", get(handlers::users::view_user))
        .route("/users/index", get(handlers::users::list_users))
        .route("/users/edit/:id", post(handlers::users::edit_user))
        .route("/users/change_pw", post(handlers::users::change_password))
        .route("/users/resetauthkey/:id", post(handlers::users::reset_authkey))
        .route("/admin/users/add", post(handlers::admin::add_user))
        .route("/admin/users/delete/:id", post(handlers::admin::delete_user))
        .route("/auth_keys/add/:user_id", post(handlers::auth_keys::add_key))
        .route("/auth_keys/delete/:id", post(handlers::auth_keys::delete_key))
        .route("/auth_keys/view/:id", get(handlers::auth_keys::view_key))
        .route("/auth_keys/index", get(handlers::auth_keys::index_keys))
        .route("/organisations/index", get(handlers::admin::list_organizations))
        .route("/admin/organisations/add", post(handlers::admin::add_organization))
        .route(
            "/admin/organisations/delete/:id",
            post(handlers::admin::delete_organization),
        )
        .route("/roles/index", get(handlers::admin::list_roles))
        .route("/admin/roles/add", post(handlers::admin::add_role))
        .route("/admin/roles/edit/:id", post(handlers::admin::edit_role))
        .route("/admin/roles/delete/:id", post(handlers::admin::delete_role))
        .route("/admin/settings", post(handlers::admin::update_settings))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/users/login", post(handlers::users::login))
        .route("/users/logout", post(handlers::users::logout))
        .route("/users/register", post(handlers::users::register))
        .merge(authenticated)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use common::{TestApp, PASSWORD, USER_EMAIL};
use serde_json::{json, Value};
use tower::util::ServiceExt;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::spawn().await;

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["platform_live"], true);
}

#[tokio::test]
async fn test_view_me_requires_credentials() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .send(Method::GET, "/users/view/me", Some(&app.user.authkey), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], USER_EMAIL);
    assert_eq!(body["auth_method"]["type"], "auth_key");
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["user"].get("authkey_hash").is_none());

    let (status, _) = app.send(Method::GET, "/users/view/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::GET, "/users/view/me", Some("not-a-key"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_cookie_opens_session() {
    let app = TestApp::spawn().await;

    let login = Request::builder()
        .method(Method::POST)
        .uri("/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": USER_EMAIL, "password": PASSWORD }).to_string(),
        ))
        .unwrap();
    let response = app.router().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("session cookie")
        .to_string();
    assert!(cookie.starts_with("session="));

    let me = Request::builder()
        .method(Method::GET)
        .uri("/users/view/me")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(me).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["auth_method"]["type"], "session");

    let (status, _) = app
        .send(
            Method::POST,
            "/users/login",
            None,
            Some(json!({ "email": USER_EMAIL, "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_offline_platform_returns_service_unavailable() {
    let app = TestApp::spawn().await;
    app.set_flags(|flags| flags.platform_live = false);

    let (status, _) = app
        .send(Method::GET, "/users/view/me", Some(&app.user.authkey), None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = app
        .send(Method::GET, "/users/view/me", Some(&app.admin.authkey), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_key_views_never_expose_hashes() {
    let app = TestApp::spawn().await;

    let (status, issued) = app
        .send(
            Method::POST,
            "/auth_keys/add/me",
            Some(&app.user.authkey),
            Some(json!({ "comment": "ci" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let raw = issued["authkey_raw"].as_str().expect("raw key").to_string();
    let id = issued["id"].as_str().expect("key id").to_string();
    assert!(issued.get("token_hash").is_none());

    let (status, view) = app
        .send(Method::GET, &format!("/auth_keys/view/{}", id), Some(&raw), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(view.get("token_hash").is_none());
    assert!(view.get("authkey_raw").is_none());

    let (status, index) = app
        .send(Method::GET, "/auth_keys/index", Some(&app.user.authkey), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!index.to_string().contains("token_hash"));
    assert!(!index.to_string().contains(&raw));
}

#[tokio::test]
async fn test_org_admin_add_is_corrected_into_own_org() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/admin/users/add",
            Some(&app.org_admin.authkey),
            Some(json!({
                "email": "added@admin.test",
                "org_id": app.other_org.id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["org_id"], app.org.id.to_string());
}

#[tokio::test]
async fn test_settings_are_site_admin_only() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .send(
            Method::POST,
            "/admin/settings",
            Some(&app.user.authkey),
            Some(json!({ "platform_live": false })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            Method::POST,
            "/admin/settings",
            Some(&app.admin.authkey),
            Some(json!({ "allow_self_registration": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flags"]["allow_self_registration"], true);
}

#[tokio::test]
async fn test_reset_own_authkey() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/users/resetauthkey/me",
            Some(&app.user.authkey),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let fresh = body["authkey"].as_str().expect("new key").to_string();

    let (status, _) = app
        .send(Method::GET, "/users/view/me", Some(&fresh), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::GET, "/users/view/me", Some(&app.user.authkey), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_form_hidden_when_federation_enforced() {
    let app = TestApp::spawn().await;
    app.set_flags(|flags| {
        flags.federation.enabled = true;
        flags.auth_enforced = true;
    });

    let (status, _) = app
        .send(
            Method::POST,
            "/users/login",
            None,
            Some(json!({ "email": USER_EMAIL, "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_session_cookie_is_rejected() {
    let mut app = TestApp::spawn().await;
    app.state.sessions =
        identity_service::middleware::SessionRegistry::with_ttl(chrono::Duration::zero());

    let login = Request::builder()
        .method(Method::POST)
        .uri("/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": USER_EMAIL, "password": PASSWORD }).to_string(),
        ))
        .unwrap();
    let response = app.router().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("session cookie")
        .to_string();

    let me = Request::builder()
        .method(Method::GET)
        .uri("/users/view/me")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(me).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.state.sessions.is_empty());
}

//! Shared fixture for identity-service integration tests.
//!
//! Seeds the built-in roles, the home organization with a site admin, an org
//! admin and a regular user, plus a second organization with one user.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use identity_service::{
    build_router,
    config::{BootstrapConfig, Environment, IdentityConfig},
    middleware::SessionRegistry,
    models::{AuthenticatedIdentity, CredentialBundle, NewUser, Organization, Role},
    services::{
        seed_defaults, AuthError, CredentialStore, FeatureFlags, FlagStore, IdentityService,
        InMemoryStore,
    },
    AppState,
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const ORG_NAME: &str = "ORGNAME";
pub const OTHER_ORG_NAME: &str = "Other org";
pub const ADMIN_EMAIL: &str = "admin@admin.test";
pub const ORG_ADMIN_EMAIL: &str = "orgadmin@admin.test";
pub const USER_EMAIL: &str = "user@admin.test";
pub const OTHER_USER_EMAIL: &str = "user@other.test";
pub const PASSWORD: &str = "Password1234";

/// One seeded account.
#[derive(Debug, Clone)]
pub struct TestAccount {
    pub id: Uuid,
    pub email: String,
    pub authkey: String,
}

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub identity: IdentityService,
    pub state: AppState,
    pub org: Organization,
    pub other_org: Organization,
    pub admin_role: Role,
    pub org_admin_role: Role,
    pub user_role: Role,
    pub admin: TestAccount,
    pub org_admin: TestAccount,
    pub user: TestAccount,
    pub other_user: TestAccount,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(FeatureFlags::default()).await
    }

    pub async fn spawn_with(flags: FeatureFlags) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let report = seed_defaults(store.as_ref(), ORG_NAME, ADMIN_EMAIL)
            .await
            .expect("seed defaults");

        let identity = IdentityService::new(store.clone(), FlagStore::new(flags.clone()))
            .with_registration_org(ORG_NAME);

        let role = |name: &'static str| {
            let store = store.clone();
            async move {
                store
                    .find_role_by_name(name)
                    .await
                    .expect("store")
                    .expect("seeded role")
            }
        };
        let admin_role = role("admin").await;
        let org_admin_role = role("org_admin").await;
        let user_role = role("user").await;

        let other_org = Organization::new(OTHER_ORG_NAME, true);
        store.insert_organization(&other_org).await.expect("other org");

        let admin = TestAccount {
            id: report.admin.id,
            email: ADMIN_EMAIL.to_string(),
            authkey: report.admin_authkey.expect("fresh admin key"),
        };

        let actor = identity
            .authenticate(&CredentialBundle::with_authkey(admin.authkey.clone()))
            .await
            .expect("admin authenticates");

        let create = |email: &'static str, org_id: Uuid, role_id: Uuid| {
            let identity = identity.clone();
            let actor = actor.clone();
            async move {
                let created = identity
                    .create_user(
                        &actor,
                        NewUser {
                            email: email.to_string(),
                            org_id: Some(org_id),
                            role_id: Some(role_id),
                            password: Some(PASSWORD.to_string()),
                            ..Default::default()
                        },
                    )
                    .await
                    .expect("create seeded user");
                TestAccount {
                    id: created.user.id,
                    email: email.to_string(),
                    authkey: created.authkey,
                }
            }
        };

        let org_admin = create(ORG_ADMIN_EMAIL, report.organization.id, org_admin_role.id).await;
        let user = create(USER_EMAIL, report.organization.id, user_role.id).await;
        let other_user = create(OTHER_USER_EMAIL, other_org.id, user_role.id).await;

        let config = IdentityConfig {
            common: service_core::config::Config::default(),
            environment: Environment::Dev,
            service_name: "identity-service-test".to_string(),
            service_version: "test".to_string(),
            log_level: "error".to_string(),
            session_ttl_minutes: 60,
            bootstrap: BootstrapConfig {
                admin_email: ADMIN_EMAIL.to_string(),
                org_name: ORG_NAME.to_string(),
            },
            flags,
        };

        let state = AppState {
            config,
            identity: identity.clone(),
            sessions: SessionRegistry::with_ttl(chrono::Duration::minutes(60)),
        };

        Self {
            store,
            identity,
            state,
            org: report.organization,
            other_org,
            admin_role,
            org_admin_role,
            user_role,
            admin,
            org_admin,
            user,
            other_user,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn set_flags<F>(&self, change: F)
    where
        F: FnOnce(&mut FeatureFlags),
    {
        self.identity.flags().update(change);
    }

    pub async fn auth_key(&self, key: &str) -> Result<AuthenticatedIdentity, AuthError> {
        self.identity
            .authenticate(&CredentialBundle::with_authkey(key))
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthenticatedIdentity, AuthError> {
        self.identity
            .authenticate(&CredentialBundle::with_password(email, password))
            .await
    }

    /// Identity for a seeded account; panics if it cannot authenticate.
    pub async fn identity_of(&self, account: &TestAccount) -> AuthenticatedIdentity {
        self.auth_key(&account.authkey)
            .await
            .expect("seeded account authenticates")
    }

    /// Sends one request through the router and returns status and JSON body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        authkey: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = authkey {
            builder = builder.header(header::AUTHORIZATION, key);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

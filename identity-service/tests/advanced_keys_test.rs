mod common;

use chrono::NaiveDate;
use common::TestApp;
use identity_service::models::{AuthMethod, KeyOptions};
use identity_service::services::{AuthError, KeyValidator};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_issued_key_authenticates_and_revocation_is_immediate() {
    let app = TestApp::spawn().await;
    let user = app.identity_of(&app.user).await;

    let issued = app
        .identity
        .issue_advanced_key(&user, app.user.id, KeyOptions::default())
        .await
        .unwrap();
    assert_eq!(issued.key.key_start, issued.authkey_raw[..4]);

    let identity = app.auth_key(&issued.authkey_raw).await.unwrap();
    assert_eq!(identity.user_id(), app.user.id);
    assert_eq!(
        identity.auth_method,
        AuthMethod::AdvancedAuthKey { key_id: issued.key.id }
    );

    app.identity
        .revoke_advanced_key(&user, issued.key.id)
        .await
        .unwrap();
    assert!(matches!(
        app.auth_key(&issued.authkey_raw).await,
        Err(AuthError::InvalidCredential)
    ));
}

#[tokio::test]
async fn test_expired_key_is_invalid() {
    let app = TestApp::spawn().await;
    let admin = app.identity_of(&app.admin).await;

    let expired = app
        .identity
        .issue_advanced_key(
            &admin,
            app.user.id,
            KeyOptions {
                expiration: Some(date(1990, 1, 5)),
                comment: Some("expired".to_string()),
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        app.auth_key(&expired.authkey_raw).await,
        Err(AuthError::InvalidCredential)
    ));

    let validator = KeyValidator::new(app.store.clone());
    let flags = app.identity.flags().snapshot().flags.clone();
    assert!(validator
        .validate_on(&expired.authkey_raw, &flags, date(1990, 1, 5))
        .await
        .is_ok());
    assert!(matches!(
        validator
            .validate_on(&expired.authkey_raw, &flags, date(1990, 1, 6))
            .await,
        Err(AuthError::InvalidCredential)
    ));
}

#[tokio::test]
async fn test_key_issuance_is_scoped() {
    let app = TestApp::spawn().await;
    let org_admin = app.identity_of(&app.org_admin).await;
    let user = app.identity_of(&app.user).await;

    assert!(app
        .identity
        .issue_advanced_key(&org_admin, app.user.id, KeyOptions::default())
        .await
        .is_ok());
    assert!(matches!(
        app.identity
            .issue_advanced_key(&org_admin, app.other_user.id, KeyOptions::default())
            .await,
        Err(AuthError::Forbidden(_))
    ));
    assert!(matches!(
        app.identity
            .issue_advanced_key(&user, app.org_admin.id, KeyOptions::default())
            .await,
        Err(AuthError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_key_listing_is_scoped() {
    let app = TestApp::spawn().await;
    let admin = app.identity_of(&app.admin).await;
    let org_admin = app.identity_of(&app.org_admin).await;
    let user = app.identity_of(&app.user).await;

    for target in [app.user.id, app.other_user.id] {
        app.identity
            .issue_advanced_key(&admin, target, KeyOptions::default())
            .await
            .unwrap();
    }

    assert_eq!(app.identity.list_advanced_keys(&admin, None).await.unwrap().len(), 2);
    assert_eq!(app.identity.list_advanced_keys(&org_admin, None).await.unwrap().len(), 1);
    assert_eq!(app.identity.list_advanced_keys(&user, None).await.unwrap().len(), 1);
    assert!(matches!(
        app.identity
            .list_advanced_keys(&user, Some(app.other_user.id))
            .await,
        Err(AuthError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_reset_in_advanced_mode_replaces_advanced_keys() {
    let app = TestApp::spawn().await;
    app.set_flags(|flags| flags.advanced_authkeys_required = true);
    let admin = app.identity_of(&app.admin).await;

    let old = app
        .identity
        .issue_advanced_key(&admin, app.user.id, KeyOptions::default())
        .await
        .unwrap();
    let user = app.auth_key(&old.authkey_raw).await.unwrap();

    let new_key = app.identity.reset_primary_key(&user, app.user.id).await.unwrap();

    assert!(matches!(
        app.auth_key(&old.authkey_raw).await,
        Err(AuthError::InvalidCredential)
    ));
    let identity = app.auth_key(&new_key).await.unwrap();
    assert_eq!(identity.user_id(), app.user.id);
    assert_eq!(
        app.identity
            .list_advanced_keys(&identity, Some(app.user.id))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_out_of_scope_reset_is_refused_and_rotates_nothing() {
    let app = TestApp::spawn().await;
    let user = app.identity_of(&app.user).await;
    let org_admin = app.identity_of(&app.org_admin).await;

    assert!(matches!(
        app.identity.reset_primary_key(&user, app.org_admin.id).await,
        Err(AuthError::Forbidden(_))
    ));
    assert!(app.auth_key(&app.org_admin.authkey).await.is_ok());

    assert!(matches!(
        app.identity.reset_primary_key(&org_admin, app.other_user.id).await,
        Err(AuthError::Forbidden(_))
    ));
    assert!(app.auth_key(&app.other_user.authkey).await.is_ok());

    assert!(matches!(
        app.identity.reset_primary_key(&org_admin, app.admin.id).await,
        Err(AuthError::Forbidden(_))
    ));
    assert!(app.auth_key(&app.admin.authkey).await.is_ok());
}

#[tokio::test]
async fn test_org_admin_reset_invalidates_old_primary_key() {
    let app = TestApp::spawn().await;
    let org_admin = app.identity_of(&app.org_admin).await;

    let new_key = app
        .identity
        .reset_primary_key(&org_admin, app.user.id)
        .await
        .unwrap();

    assert!(matches!(
        app.auth_key(&app.user.authkey).await,
        Err(AuthError::InvalidCredential)
    ));
    assert_eq!(app.auth_key(&new_key).await.unwrap().user_id(), app.user.id);
}

#[tokio::test]
async fn test_deleting_user_removes_their_keys() {
    let app = TestApp::spawn().await;
    let admin = app.identity_of(&app.admin).await;

    let issued = app
        .identity
        .issue_advanced_key(&admin, app.user.id, KeyOptions::default())
        .await
        .unwrap();
    app.identity.delete_user(&admin, app.user.id).await.unwrap();

    assert!(matches!(
        app.auth_key(&issued.authkey_raw).await,
        Err(AuthError::InvalidCredential)
    ));
    assert!(matches!(
        app.auth_key(&app.user.authkey).await,
        Err(AuthError::InvalidCredential)
    ));
}

#[tokio::test]
async fn test_corrupted_advanced_key_with_intact_edges_fails() {
    let app = TestApp::spawn().await;
    let user = app.identity_of(&app.user).await;
    app.set_flags(|flags| flags.advanced_authkeys_required = true);

    let issued = app
        .identity
        .issue_advanced_key(&user, app.user.id, KeyOptions::default())
        .await
        .unwrap();
    let raw = &issued.authkey_raw;
    assert!(app.auth_key(raw).await.is_ok());

    let middle: String = raw[4..36]
        .chars()
        .map(|c| if c == 'b' { 'c' } else { 'b' })
        .collect();
    let corrupted = format!("{}{}{}", &raw[..4], middle, &raw[36..]);
    assert_eq!(corrupted.len(), raw.len());
    assert_ne!(&corrupted, raw);
    assert!(matches!(
        app.auth_key(&corrupted).await,
        Err(AuthError::InvalidCredential)
    ));

    let punctuated = format!("{}{}{}", &raw[..4], "_".repeat(32), &raw[36..]);
    assert!(matches!(
        app.auth_key(&punctuated).await,
        Err(AuthError::MalformedCredential)
    ));

    // The genuine key keeps working after the failed attempts.
    assert!(app.auth_key(raw).await.is_ok());
}

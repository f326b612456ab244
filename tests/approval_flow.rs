mod common;

use anyhow::{anyhow, Result};
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_json, TestApp};
use pv_manager::approval::UserStatus;
use serde_json::json;

/// Pulls the verification code out of the recorded registration email.
async fn verification_token(app: &TestApp, recipient: &str) -> Result<String> {
    let sent = app.mailer().sent().await;
    let email = sent
        .iter()
        .rev()
        .find(|email| email.to == recipient)
        .ok_or_else(|| anyhow!("no email recorded for {recipient}"))?;
    email
        .body
        .split(": ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("verification email has unexpected body: {}", email.body))
}

#[tokio::test]
async fn registration_approval_and_login_lifecycle() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    app.insert_user("admin@test.local", "adminpass", "ADMIN", UserStatus::Approved)
        .await?;
    let admin_token = app.login_token("admin@test.local", "adminpass").await?;

    // Register a new accountant.
    let response = app
        .post_json(
            "/api/auth/register",
            &json!({
                "email": "sami@test.local",
                "full_name": "Sami Ben Ali",
                "password": "correcthorse",
            }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["status"], "PENDING_EMAIL_VERIFICATION");
    let user_id = body["user_id"].as_str().unwrap().to_string();

    // Login is rejected before verification and approval.
    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "email": "sami@test.local", "password": "correcthorse" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Verify the email with the code from the recorded message.
    let token = verification_token(&app, "sami@test.local").await?;
    let response = app
        .post_json(
            "/api/auth/verify-email",
            &json!({ "email": "sami@test.local", "token": token }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["status"], "PENDING_APPROVAL");

    // The admin got a pending-approval notification.
    let response = app.get("/api/notifications", Some(&admin_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let notifications = body_to_json(response.into_body()).await?;
    assert!(notifications
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["kind"] == "account-pending-approval"));

    // Still cannot log in until an admin approves.
    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "email": "sami@test.local", "password": "correcthorse" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Approve, then login succeeds.
    let response = app
        .patch_json(
            &format!("/api/users/{user_id}/status"),
            &json!({ "status": "APPROVED" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["user"]["status"], "APPROVED");
    assert!(body["user"]["approved_at"].is_string());

    let user_token = app.login_token("sami@test.local", "correcthorse").await?;
    let response = app.get("/api/auth/me", Some(&user_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    // Suspension locks the account out again.
    let response = app
        .patch_json(
            &format!("/api/users/{user_id}/status"),
            &json!({ "status": "SUSPENDED" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "email": "sami@test.local", "password": "correcthorse" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn invalid_verification_token_is_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    let response = app
        .post_json(
            "/api/auth/register",
            &json!({
                "email": "lina@test.local",
                "full_name": "Lina Gharbi",
                "password": "correcthorse",
            }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .post_json(
            "/api/auth/verify-email",
            &json!({ "email": "lina@test.local", "token": "not-the-token" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn re_verifying_a_verified_account_is_a_no_op() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    app.insert_user(
        "waiting@test.local",
        "correcthorse",
        "COMPTABLE",
        UserStatus::PendingApproval,
    )
    .await?;

    let response = app
        .post_json(
            "/api/auth/verify-email",
            &json!({ "email": "waiting@test.local", "token": "whatever" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["message"], "email already verified");
    assert_eq!(body["status"], "PENDING_APPROVAL");

    app.insert_user(
        "active@test.local",
        "correcthorse",
        "COMPTABLE",
        UserStatus::Approved,
    )
    .await?;

    let response = app
        .post_json(
            "/api/auth/verify-email",
            &json!({ "email": "active@test.local", "token": "whatever" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["message"], "email already verified");
    assert_eq!(body["status"], "APPROVED");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn suspension_preserves_the_approval_audit_trail() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    let approver_id = app
        .insert_user(
            "approver@test.local",
            "adminpass",
            "ADMIN",
            UserStatus::Approved,
        )
        .await?;
    let approver_token = app.login_token("approver@test.local", "adminpass").await?;
    app.insert_user(
        "second-admin@test.local",
        "adminpass",
        "ADMIN",
        UserStatus::Approved,
    )
    .await?;
    let second_token = app
        .login_token("second-admin@test.local", "adminpass")
        .await?;

    let user_id = app
        .insert_user(
            "nadia@test.local",
            "correcthorse",
            "COMPTABLE",
            UserStatus::PendingApproval,
        )
        .await?;

    let response = app
        .patch_json(
            &format!("/api/users/{user_id}/status"),
            &json!({ "status": "APPROVED" }),
            Some(&approver_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["user"]["approved_by"], approver_id.to_string());
    let approved_at = body["user"]["approved_at"].as_str().unwrap().to_string();

    // A different admin suspends, then reinstates.
    for target in ["SUSPENDED", "APPROVED"] {
        let response = app
            .patch_json(
                &format!("/api/users/{user_id}/status"),
                &json!({ "status": target }),
                Some(&second_token),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // The original approval record survived the round-trip.
    let response = app
        .get(&format!("/api/users/{user_id}"), Some(&approver_token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["status"], "APPROVED");
    assert_eq!(body["approved_by"], approver_id.to_string());
    assert_eq!(body["approved_at"], approved_at);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn rejection_is_terminal_and_carries_the_reason() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    app.insert_user("admin@test.local", "adminpass", "ADMIN", UserStatus::Approved)
        .await?;
    let admin_token = app.login_token("admin@test.local", "adminpass").await?;

    let user_id = app
        .insert_user(
            "youssef@test.local",
            "correcthorse",
            "COMPTABLE",
            UserStatus::PendingApproval,
        )
        .await?;

    let response = app
        .patch_json(
            &format!("/api/users/{user_id}/status"),
            &json!({ "status": "REJECTED", "reason": "dossier incomplet" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["user"]["status"], "REJECTED");
    assert_eq!(body["user"]["rejected_reason"], "dossier incomplet");

    // No admin transition leaves REJECTED.
    let response = app
        .patch_json(
            &format!("/api/users/{user_id}/status"),
            &json!({ "status": "APPROVED" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn status_endpoint_requires_admin_role() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    app.insert_user(
        "clerk@test.local",
        "clerkpass",
        "COMPTABLE",
        UserStatus::Approved,
    )
    .await?;
    let clerk_token = app.login_token("clerk@test.local", "clerkpass").await?;

    let target = app
        .insert_user(
            "pending@test.local",
            "correcthorse",
            "COMPTABLE",
            UserStatus::PendingApproval,
        )
        .await?;

    let response = app
        .patch_json(
            &format!("/api/users/{target}/status"),
            &json!({ "status": "APPROVED" }),
            Some(&clerk_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get("/api/users", Some(&clerk_token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup().await?;
    Ok(())
}

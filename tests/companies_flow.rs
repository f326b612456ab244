mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_json, TestApp};
use pv_manager::approval::UserStatus;
use serde_json::json;

async fn login(app: &TestApp) -> Result<String> {
    app.insert_user(
        "comptable@test.local",
        "clerkpass",
        "COMPTABLE",
        UserStatus::Approved,
    )
    .await?;
    app.login_token("comptable@test.local", "clerkpass").await
}

async fn create_company(app: &TestApp, token: &str) -> Result<String> {
    let response = app
        .post_json(
            "/api/companies",
            &json!({
                "name": "Azur Conseil",
                "legal_form": "SARL",
                "capital": 10000.0,
                "address": "12 rue de Carthage, Tunis",
                "tax_id": "1234567/A/M/000",
                "registry_id": "B0112233",
                "email": "contact@azur.example",
            }),
            Some(token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_json(response.into_body()).await?;
    Ok(body["id"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn partner_percentages_follow_share_counts() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };
    let token = login(&app).await?;
    let company_id = create_company(&app, &token).await?;

    let response = app
        .post_json(
            &format!("/api/companies/{company_id}/partners"),
            &json!({ "full_name": "Ali Ben Salah", "cin": "01234567", "shares": 500 }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["percentage"].as_f64().unwrap(), 100.0);
    let first_partner = body["id"].as_str().unwrap().to_string();

    let response = app
        .post_json(
            &format!("/api/companies/{company_id}/partners"),
            &json!({ "full_name": "Mouna Trabelsi", "cin": "07654321", "shares": 500 }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    // Both partners now hold 50%.
    let response = app
        .get(&format!("/api/companies/{company_id}/partners"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let partners = body_to_json(response.into_body()).await?;
    let percentages: Vec<f64> = partners
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["percentage"].as_f64().unwrap())
        .collect();
    assert_eq!(percentages, vec![50.0, 50.0]);

    // Changing a share count rebalances every row.
    let response = app
        .patch_json(
            &format!("/api/companies/{company_id}/partners/{first_partner}"),
            &json!({ "shares": 300 }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["percentage"].as_f64().unwrap(), 37.5);

    // Deleting a partner leaves the survivor at 100%.
    let response = app
        .delete(
            &format!("/api/companies/{company_id}/partners/{first_partner}"),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/companies/{company_id}/partners"), Some(&token))
        .await?;
    let partners = body_to_json(response.into_body()).await?;
    assert_eq!(partners.as_array().unwrap().len(), 1);
    assert_eq!(partners[0]["percentage"].as_f64().unwrap(), 100.0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_cin_within_a_company_is_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };
    let token = login(&app).await?;
    let company_id = create_company(&app, &token).await?;

    let payload = json!({ "full_name": "Ali Ben Salah", "cin": "01234567", "shares": 100 });
    let response = app
        .post_json(
            &format!("/api/companies/{company_id}/partners"),
            &payload,
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .post_json(
            &format!("/api/companies/{company_id}/partners"),
            &json!({ "full_name": "Homonyme", "cin": "01234567", "shares": 50 }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn company_detail_embeds_partners_and_managers() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };
    let token = login(&app).await?;
    let company_id = create_company(&app, &token).await?;

    app.post_json(
        &format!("/api/companies/{company_id}/partners"),
        &json!({ "full_name": "Ali Ben Salah", "cin": "01234567", "shares": 100 }),
        Some(&token),
    )
    .await?;
    let response = app
        .post_json(
            &format!("/api/companies/{company_id}/managers"),
            &json!({ "full_name": "Karim Gharbi", "cin": "09998887" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let manager = body_to_json(response.into_body()).await?;
    assert_eq!(manager["role_title"], "Gérant");

    let response = app
        .get(&format!("/api/companies/{company_id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_to_json(response.into_body()).await?;
    assert_eq!(detail["company"]["name"], "Azur Conseil");
    assert_eq!(detail["partners"].as_array().unwrap().len(), 1);
    assert_eq!(detail["managers"].as_array().unwrap().len(), 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn company_email_can_be_cleared_with_null() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };
    let token = login(&app).await?;
    let company_id = create_company(&app, &token).await?;

    let response = app
        .patch_json(
            &format!("/api/companies/{company_id}"),
            &json!({ "email": null, "capital": 25000.0 }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert!(body["email"].is_null());
    assert_eq!(body["capital"].as_f64().unwrap(), 25000.0);

    let response = app
        .patch_json(
            &format!("/api/companies/{company_id}"),
            &json!({ "email": "not-an-address" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn company_routes_require_authentication() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    let response = app.get("/api/companies", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}

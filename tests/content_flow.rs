mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, json_body, TestApp};
use legaldocs::models::{Role, SubscriptionTier};
use serde_json::json;

#[tokio::test]
async fn blog_posts_are_public_once_published() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, admin) = app
        .signed_in("editor@example.ru", Role::Admin, SubscriptionTier::Premium)
        .await?;

    let response = app
        .post_json(
            "/api/admin/blog",
            &json!({
                "slug": "izmeneniya-152-fz",
                "title": "Изменения 152-ФЗ",
                "excerpt": "Коротко о главном",
                "content": "С 1 сентября вступают в силу поправки."
            }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let post = json_body(response).await?;
    assert_eq!(post["isPublished"], false);
    assert!(post["publishedAt"].is_null());
    let post_id = post["id"].as_str().unwrap_or_default().to_string();

    let response = app.get("/api/blog/izmeneniya-152-fz", None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .put_json(
            &format!("/api/admin/blog/{post_id}"),
            &json!({ "isPublished": true, "excerpt": null }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let published = json_body(response).await?;
    let first_published_at = published["publishedAt"].clone();
    assert!(first_published_at.is_string());
    assert!(published["excerpt"].is_null());

    // Toggling off and on keeps the original publication date.
    for flag in [false, true] {
        let response = app
            .put_json(
                &format!("/api/admin/blog/{post_id}"),
                &json!({ "isPublished": flag }),
                Some(&admin),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.get("/api/blog", None).await?;
    let posts = json_body(response).await?;
    assert_eq!(posts.as_array().map(Vec::len), Some(1));
    assert_eq!(posts[0]["publishedAt"], first_published_at);

    let response = app.get("/api/blog/izmeneniya-152-fz", None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post_json(
            "/api/admin/blog",
            &json!({ "slug": "izmeneniya-152-fz", "title": "Дубль", "content": "..." }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .delete(&format!("/api/admin/blog/{post_id}"), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.get("/api/blog/izmeneniya-152-fz", None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn template_catalogue_hides_inactive_entries() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, admin) = app
        .signed_in("admin@example.ru", Role::Admin, SubscriptionTier::Premium)
        .await?;

    let response = app
        .post_json(
            "/api/admin/templates",
            &json!({ "type": "offer", "name": "Оферта для интернет-магазина" }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let template = json_body(response).await?;
    assert_eq!(template["isActive"], true);
    let template_id = template["id"].as_str().unwrap_or_default().to_string();

    let response = app
        .post_json(
            "/api/admin/templates",
            &json!({ "type": "nda", "name": "NDA" }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/api/templates", None).await?;
    assert_eq!(json_body(response).await?.as_array().map(Vec::len), Some(1));

    let response = app
        .put_json(
            &format!("/api/admin/templates/{template_id}"),
            &json!({ "isActive": false, "description": "Архив" }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["description"], "Архив");

    let response = app.get("/api/templates", None).await?;
    assert_eq!(json_body(response).await?.as_array().map(Vec::len), Some(0));

    let response = app.get("/api/admin/templates", Some(&admin)).await?;
    assert_eq!(json_body(response).await?.as_array().map(Vec::len), Some(1));

    let response = app
        .delete(&format!("/api/admin/templates/{template_id}"), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn pricing_and_health_are_public() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app.get("/api/pricing", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let pricing = json_body(response).await?;
    assert_eq!(pricing["tiers"][0]["documentsLimit"], common::FREE_LIMIT);
    assert_eq!(pricing["tiers"][1]["documentsLimit"], -1);

    let response = app.get("/api/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["database"], "ok");

    app.cleanup().await?;
    Ok(())
}

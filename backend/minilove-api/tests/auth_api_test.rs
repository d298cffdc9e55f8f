/// Integration tests for registration, sign-in and account endpoints
mod common;

use actix_web::http::StatusCode;
use serde_json::json;

use common::{get, init_app, post_json, put_json, register_user, send, setup};

#[actix_web::test]
async fn test_register_then_login_returns_same_user() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/auth/register",
            None,
            json!({ "username": "abc", "email": "a@b.com", "password": "123456" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["username"], "abc");
    assert_eq!(body["data"]["user"]["membershipLevel"], "free");
    assert!(body["data"]["token"].as_str().is_some());
    let id = body["data"]["user"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            None,
            json!({ "username": "abc", "password": "123456" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["user"]["id"].as_i64(), Some(id));
}

#[actix_web::test]
async fn test_login_accepts_email() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;
    let user = register_user(&app, "mailer").await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            None,
            json!({ "username": "mailer@example.com", "password": "123456" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["id"].as_i64(), Some(user.id));
}

#[actix_web::test]
async fn test_duplicate_username_and_email_conflict() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;
    register_user(&app, "taken").await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/auth/register",
            None,
            json!({ "username": "taken", "email": "other@example.com", "password": "123456" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/auth/register",
            None,
            json!({ "username": "fresh", "email": "taken@example.com", "password": "123456" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_register_rejects_invalid_input() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;

    let cases = [
        json!({ "username": "ab", "email": "ab@example.com", "password": "123456" }),
        json!({ "username": "bad name", "email": "x@example.com", "password": "123456" }),
        json!({ "username": "valid_name", "email": "not-an-email", "password": "123456" }),
        json!({ "username": "valid_name", "email": "v@example.com", "password": "123" }),
        json!({ "username": "valid_name", "email": "v@example.com", "password": "123456", "age": 12 }),
        json!({ "username": "valid_name", "email": "v@example.com", "password": "123456", "gender": "robot" }),
        json!({ "email": "v@example.com", "password": "123456" }),
    ];

    for case in cases {
        let (status, body) = send(&app, post_json("/api/v1/auth/register", None, case.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} -> {}", case, body);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }
}

#[actix_web::test]
async fn test_login_failures_are_unauthorized() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;
    register_user(&app, "careful").await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            None,
            json!({ "username": "careful", "password": "wrong-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "AUTHENTICATION_ERROR");

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            None,
            json!({ "username": "nobody", "password": "123456" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_profile_requires_token() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;

    let (status, body) = send(&app, get("/api/v1/auth/profile", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "AUTHENTICATION_ERROR");

    let (status, body) = send(&app, get("/api/v1/auth/profile", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "INVALID_TOKEN");
}

#[actix_web::test]
async fn test_profile_includes_stats() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;
    let user = register_user(&app, "stats_owner").await;
    common::create_public_post(&app, &user.token, "a first post with enough characters").await;

    let (status, body) = send(&app, get("/api/v1/auth/profile", Some(&user.token))).await;
    assert_eq!(status, StatusCode::OK);
    let profile = &body["data"]["user"];
    assert_eq!(profile["email"], "stats_owner@example.com");
    assert_eq!(profile["stats"]["posts"], 1);
    assert_eq!(profile["stats"]["followers"], 0);
    assert!(profile.get("passwordHash").is_none());
}

#[actix_web::test]
async fn test_update_profile_conflicting_username() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;
    register_user(&app, "first_user").await;
    let second = register_user(&app, "second_user").await;

    let (status, _) = send(
        &app,
        put_json(
            "/api/v1/auth/profile",
            &second.token,
            json!({ "username": "first_user" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        put_json(
            "/api/v1/auth/profile",
            &second.token,
            json!({ "city": "上海", "bio": "hello" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["user"]["city"], "上海");
}

#[actix_web::test]
async fn test_update_profile_ignores_empty_phone() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;
    let first = register_user(&app, "blank_one").await;
    let second = register_user(&app, "blank_two").await;

    for user in [&first, &second] {
        let (status, body) = send(
            &app,
            put_json("/api/v1/auth/profile", &user.token, json!({ "phone": "", "city": "北京" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert!(body["data"]["user"]["phone"].is_null());
    }

    let (status, _) = send(
        &app,
        put_json("/api/v1/auth/profile", &first.token, json!({ "phone": "13800000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        put_json("/api/v1/auth/profile", &first.token, json!({ "phone": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["phone"], "13800000000");
}

#[actix_web::test]
async fn test_change_password() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;
    let user = register_user(&app, "rotator").await;

    let (status, _) = send(
        &app,
        put_json(
            "/api/v1/auth/password",
            &user.token,
            json!({ "currentPassword": "nope-nope", "newPassword": "654321" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        put_json(
            "/api/v1/auth/password",
            &user.token,
            json!({ "currentPassword": "123456", "newPassword": "654321" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            None,
            json!({ "username": "rotator", "password": "123456" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            None,
            json!({ "username": "rotator", "password": "654321" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn test_verify_refresh_and_logout() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;
    let user = register_user(&app, "checker").await;

    let (status, body) = send(&app, get("/api/v1/auth/verify", Some(&user.token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["id"].as_i64(), Some(user.id));

    let (status, body) = send(
        &app,
        post_json("/api/v1/auth/refresh", Some(&user.token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let refreshed = body["data"]["token"].as_str().unwrap().to_string();

    let (status, _) = send(&app, get("/api/v1/auth/verify", Some(&refreshed))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        post_json("/api/v1/auth/logout", Some(&user.token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[actix_web::test]
async fn test_unknown_route_returns_json_404() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;

    let (status, body) = send(&app, get("/api/v1/does-not-exist", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[actix_web::test]
async fn test_health_reports_sqlite_backend() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;

    for uri in ["/health", "/api/v1/health"] {
        let (status, body) = send(&app, get(uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "minilove-api");
        assert_eq!(body["database"]["backend"], "sqlite");
        assert_eq!(body["database"]["status"], "healthy");
    }
}

#[actix_web::test]
async fn test_reference_catalogs() {
    let (db, _dir) = setup().await;
    let app = init_app(&db).await;

    let (status, body) = send(&app, get("/api/v1/topics", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["topics"].as_array().unwrap().len(), 5);

    let (status, body) = send(&app, get("/api/v1/membership/plans", None)).await;
    assert_eq!(status, StatusCode::OK);
    let plans = body["data"]["plans"].as_array().unwrap();
    assert_eq!(plans.len(), 3);
    assert_eq!(plans[0]["name"], "free");
    assert!(plans[2]["features"].is_object());
}

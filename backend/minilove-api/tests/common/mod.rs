#![allow(dead_code)]
//! Shared fixtures for the HTTP integration tests.
//!
//! Every test gets its own migrated SQLite file so tests can run in parallel.

use actix_http::Request;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, App};
use serde_json::{json, Value};
use tempfile::TempDir;

use minilove_api::config::DatabaseConfig;
use minilove_api::security::jwt;
use minilove_api::{configure_app, db, Database};

pub const TEST_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "123456";

pub async fn setup() -> (Database, TempDir) {
    jwt::initialize_keys(TEST_SECRET, 3600).expect("Failed to initialize JWT keys");

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = DatabaseConfig {
        url: None,
        use_sqlite: true,
        sqlite_path: dir.path().join("minilove_test.db").to_string_lossy().into_owned(),
        max_connections: 5,
        run_migrations: true,
    };

    let database = db::connect(&config).await.expect("Failed to open SQLite");
    db::run_migrations(&database)
        .await
        .expect("Failed to run migrations");
    (database, dir)
}

pub async fn init_app(
    database: &Database,
) -> impl Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
    test::init_service(App::new().configure(configure_app(database.clone()))).await
}

/// Dispatch `req` and return the status with the decoded JSON body.
///
/// Middleware rejections surface as `Err` from the service, so they are
/// rendered the same way the server would render them.
pub async fn send<S>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let (status, bytes) = match test::try_call_service(app, req).await {
        Ok(resp) => {
            let status = resp.status();
            (status, test::read_body(resp).await)
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            let bytes = actix_web::body::to_bytes(resp.into_body())
                .await
                .expect("Failed to read error body");
            (status, bytes)
        }
    };

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response body is not JSON")
    };
    (status, body)
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

pub fn get(uri: &str, token: Option<&str>) -> Request {
    with_token(test::TestRequest::get().uri(uri), token).to_request()
}

pub fn delete(uri: &str, token: &str) -> Request {
    test::TestRequest::delete()
        .uri(uri)
        .insert_header(bearer(token))
        .to_request()
}

pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request {
    with_token(test::TestRequest::post().uri(uri), token)
        .set_json(body)
        .to_request()
}

pub fn put_json(uri: &str, token: &str, body: Value) -> Request {
    test::TestRequest::put()
        .uri(uri)
        .insert_header(bearer(token))
        .set_json(body)
        .to_request()
}

fn with_token(req: test::TestRequest, token: Option<&str>) -> test::TestRequest {
    match token {
        Some(token) => req.insert_header(bearer(token)),
        None => req,
    }
}

/// A signed-in account created through the API
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub token: String,
}

pub async fn register_user<S>(app: &S, username: &str) -> TestUser
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let (status, body) = send(
        app,
        post_json(
            "/api/v1/auth/register",
            None,
            json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": PASSWORD,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {}: {}", username, body);

    TestUser {
        id: body["data"]["user"]["id"].as_i64().expect("user id"),
        username: username.to_string(),
        token: body["data"]["token"].as_str().expect("token").to_string(),
    }
}

pub async fn login<S>(app: &S, username: &str) -> String
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let (status, body) = send(
        app,
        post_json(
            "/api/v1/auth/login",
            None,
            json!({ "username": username, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login {}: {}", username, body);
    body["data"]["token"].as_str().expect("token").to_string()
}

/// Upgrade an account to premium membership and sign in again for a fresh role.
pub async fn make_premium<S>(app: &S, database: &Database, user: &TestUser) -> String
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    sqlx::query("UPDATE users SET membership_level = 'premium' WHERE id = $1")
        .bind(user.id)
        .execute(&database.pool)
        .await
        .expect("Failed to promote user");
    login(app, &user.username).await
}

pub async fn make_admin<S>(app: &S, database: &Database, user: &TestUser) -> String
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
        .bind(user.id)
        .execute(&database.pool)
        .await
        .expect("Failed to promote user");
    login(app, &user.username).await
}

pub async fn create_post<S>(app: &S, token: &str, body: Value) -> Value
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let (status, body) = send(app, post_json("/api/v1/posts", Some(token), body)).await;
    assert_eq!(status, StatusCode::CREATED, "create post: {}", body);
    body["data"]["post"].clone()
}

pub async fn create_public_post<S>(app: &S, token: &str, content: &str) -> i64
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    create_post(app, token, json!({ "content": content }))
        .await["id"]
        .as_i64()
        .expect("post id")
}

pub async fn follow<S>(app: &S, token: &str, target: i64)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let (status, body) = send(
        app,
        post_json(&format!("/api/v1/users/{}/follow", target), Some(token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "follow: {}", body);
}

//! HTTP Adapter Integration Tests
//!
//! Drives the `/db/{key}` surface through the router with an on-disk store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use keyhouse_db::{router, AppState};
use keyhouse_store::{Store, StoreConfig};
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_app() -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        Store::open(StoreConfig::new(dir.path(), 1_000_000))
            .await
            .unwrap(),
    );
    (router(AppState { store }), dir)
}

fn post(key: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/db/{key}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------
// Write then read
// ---------------------------------------------------------------

#[tokio::test]
async fn test_post_then_get_string() {
    let (app, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(post("greeting", r#"{"value": "hello"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/db/greeting")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({"key": "greeting", "value": "hello"}));
}

#[tokio::test]
async fn test_post_then_get_int64() {
    let (app, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(post("counter", r#"{"value": -42}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/db/counter?type=int64")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({"key": "counter", "value": -42}));
}

#[tokio::test]
async fn test_integral_float_is_accepted_as_int64() {
    let (app, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(post("n", r#"{"value": 5.0}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/db/n?type=int64")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["value"], serde_json::json!(5));
}

#[tokio::test]
async fn test_overwrite_returns_latest() {
    let (app, _dir) = test_app().await;

    for value in ["one", "two", "three"] {
        let response = app
            .clone()
            .oneshot(post("k", &format!(r#"{{"value": "{value}"}}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get("/db/k")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["value"], serde_json::json!("three"));
}

// ---------------------------------------------------------------
// GET error mapping
// ---------------------------------------------------------------

#[tokio::test]
async fn test_get_missing_key_is_404() {
    let (app, _dir) = test_app().await;
    let response = app.oneshot(get("/db/nothing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_wrong_type_is_404() {
    let (app, _dir) = test_app().await;

    app.clone()
        .oneshot(post("n", r#"{"value": 7}"#))
        .await
        .unwrap();

    // Stored as int64; a string read yields nothing.
    let response = app.oneshot(get("/db/n")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_unknown_type_is_400() {
    let (app, _dir) = test_app().await;
    let response = app.oneshot(get("/db/k?type=float")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_type_defaults_to_string() {
    let (app, _dir) = test_app().await;

    app.clone()
        .oneshot(post("s", r#"{"value": "text"}"#))
        .await
        .unwrap();

    let response = app.oneshot(get("/db/s")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------
// POST validation
// ---------------------------------------------------------------

#[tokio::test]
async fn test_post_missing_value_field_is_400() {
    let (app, _dir) = test_app().await;
    let response = app.oneshot(post("k", r#"{"other": 1}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_invalid_json_is_400() {
    let (app, _dir) = test_app().await;
    let response = app.oneshot(post("k", "{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_fractional_number_is_400() {
    let (app, _dir) = test_app().await;
    let response = app.oneshot(post("k", r#"{"value": 1.5}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_number_beyond_i64_is_400() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(post("k", r#"{"value": 18446744073709551615}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_array_value_is_400() {
    let (app, _dir) = test_app().await;
    let response = app.oneshot(post("k", r#"{"value": [1,2]}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------
// Routing
// ---------------------------------------------------------------

#[tokio::test]
async fn test_unknown_path_is_404() {
    let (app, _dir) = test_app().await;
    let response = app.oneshot(get("/other")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_other_method_on_db_is_405() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/db/k")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

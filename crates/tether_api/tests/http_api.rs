mod support;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::auth::{AuthTokenProvider, PeerCertificate};
use http_body_util::BodyExt;
use std::sync::Arc;
use support::{device_certificate, service_with_store, token_provider};
use tether_api::http::{build_router, AppState, HttpLoggingConfig};
use tower::ServiceExt;

fn test_router() -> Router {
    let (service, _) = service_with_store();
    let state = AppState::new(service, Arc::new(token_provider()));
    build_router(state, HttpLoggingConfig::default())
}

fn bearer(user_id: &str) -> String {
    format!("Bearer {}", token_provider().generate_token(user_id).unwrap())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    authorization: Option<&str>,
    certificate: Option<Vec<u8>>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    if let Some(der) = certificate {
        request.extensions_mut().insert(PeerCertificate(der));
    }

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn authenticate(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/devices/authenticate",
        None,
        Some(device_certificate(&[0x0A, 0xBC, 0x12, 0x3F], "TestCA")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = test_router();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_authenticate_device() {
    let app = test_router();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/devices/authenticate",
        None,
        Some(device_certificate(&[0x0A, 0xBC, 0x12, 0x3F], "TestCA")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["serial_number"], "ABC123F");
    assert_eq!(body["issuer_common_name"], "TestCA");
}

#[tokio::test]
async fn test_authenticate_without_certificate_rejected() {
    let app = test_router();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/devices/authenticate",
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid client certificate");
}

#[tokio::test]
async fn test_user_routes_require_bearer_token() {
    let app = test_router();

    let (status, _) = send(&app, Method::GET, "/api/v1/users/me/devices", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/users/me/devices",
        Some("Basic dXNlcjpwYXNz"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/devices/dev-1/assign",
        Some("Bearer not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_assign_unknown_device_not_found() {
    let app = test_router();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/devices/missing/assign",
        Some(&bearer("alice")),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Device not found");
}

#[tokio::test]
async fn test_device_ownership_flow() {
    let app = test_router();
    let alice = bearer("alice");
    let bob = bearer("bob");
    let device_id = authenticate(&app).await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/devices/{}", device_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_assigned"], false);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/devices/{}/assign", device_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Device assigned successfully");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/devices/{}/assign", device_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Device is already assigned");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/devices/{}", device_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_assigned"], true);
    assert_eq!(body["user_id"], "alice");

    // Another user's device looks the same as a missing one
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/devices/{}", device_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/devices/{}/unassign", device_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Device not found or not assigned to you");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/users/me/devices",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["devices"][0]["id"], device_id.as_str());

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/devices/{}/unassign", device_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Device unassigned successfully");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/users/me/devices",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert!(body["devices"].as_array().unwrap().is_empty());
}

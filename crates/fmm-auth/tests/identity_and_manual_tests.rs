//! Integration tests for the identity client and the manual-key fallback

use fmm_auth::{ApiAuth, AuthConfig, IdentityClient, KeyCaptureServer, ManualKeySession};
use fmm_types::AuthError;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> AuthConfig {
    AuthConfig {
        validate_url: format!("{}/v1/users/validate.json", server.uri()),
        open_browser: false,
        ..AuthConfig::default()
    }
}

#[tokio::test]
async fn test_validate_with_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/validate.json"))
        .and(header("apikey", "my-personal-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": 1234,
            "name": "DragonSlayer",
            "is_premium": true,
            "is_supporter": false,
            "profile_url": "https://example.com/avatar.png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = IdentityClient::new(&config_for(&server));
    let identity = client
        .validate(&ApiAuth::ApiKey("my-personal-key".to_string()))
        .await
        .unwrap();

    assert_eq!(identity.name, "DragonSlayer");
    assert!(identity.is_premium);
    assert!(!identity.is_supporter);
    assert_eq!(
        identity.profile_url.as_deref(),
        Some("https://example.com/avatar.png")
    );
}

#[tokio::test]
async fn test_validate_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/validate.json"))
        .and(header("authorization", "Bearer access-token-value"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Hollow",
            "membership_roles": ["member", "supporter"]
        })))
        .mount(&server)
        .await;

    let client = IdentityClient::new(&config_for(&server));
    let identity = client
        .validate(&ApiAuth::Bearer("access-token-value".to_string()))
        .await
        .unwrap();

    assert_eq!(identity.name, "Hollow");
    assert!(identity.is_supporter);
}

#[tokio::test]
async fn test_validate_rejection_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/validate.json"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&server)
        .await;

    let session = ManualKeySession::new(config_for(&server));
    let err = session.validate("wrong-key").await.err().unwrap();

    match err {
        AuthError::AuthServer { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid key");
        }
        other => panic!("expected AuthServer error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_manual_session_validates_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/validate.json"))
        .and(header("apikey", "pasted-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Unkindled",
            "is_premium": false,
            "is_supporter": false
        })))
        .mount(&server)
        .await;

    let session = ManualKeySession::new(config_for(&server));
    let identity = session.validate("pasted-key").await.unwrap();
    assert_eq!(identity.name, "Unkindled");
    assert!(!identity.is_premium);
}

#[tokio::test]
async fn test_key_capture_roundtrip() {
    let server = KeyCaptureServer::bind().await.unwrap();
    assert_eq!(server.poll_key(), None);

    let response = reqwest::get(format!(
        "http://127.0.0.1:{}/?api_key=captured-key",
        server.port()
    ))
    .await
    .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.text().await.unwrap().contains("API Key Received"));

    assert_eq!(server.poll_key().as_deref(), Some("captured-key"));
}

#[tokio::test]
async fn test_key_capture_first_key_wins() {
    let server = KeyCaptureServer::bind().await.unwrap();
    let base = format!("http://127.0.0.1:{}", server.port());

    reqwest::get(format!("{}/?api_key=first", base)).await.unwrap();
    reqwest::get(format!("{}/?api_key=second", base)).await.unwrap();

    assert_eq!(server.poll_key().as_deref(), Some("first"));
}

#[tokio::test]
async fn test_key_capture_missing_key_is_400() {
    let server = KeyCaptureServer::bind().await.unwrap();

    let response = reqwest::get(format!("http://127.0.0.1:{}/", server.port()))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(server.poll_key(), None);
}

#[tokio::test]
async fn test_key_capture_accepts_any_path() {
    // The provider may redirect to an arbitrary path; the key still counts
    let server = KeyCaptureServer::bind().await.unwrap();

    reqwest::get(format!(
        "http://127.0.0.1:{}/some/redirect?api_key=deep-key",
        server.port()
    ))
    .await
    .unwrap();

    assert_eq!(server.poll_key().as_deref(), Some("deep-key"));
}

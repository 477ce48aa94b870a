//! End to end through the HTTP service capability.

use tether_config::TetherConfig;
use tether_core::Gateway;
use tether_types::{CallSite, status};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{call, config_for, mount_error, mount_output};

fn gateway_for(server: &MockServer, extra: &str) -> Gateway {
    let config = TetherConfig::parse_str(&config_for(server, extra)).unwrap();
    config.validate().unwrap();
    Gateway::from_config(&config).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generate_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .and(body_partial_json(serde_json::json!({
            "input": "summarize: hello",
            "temperature": 0.2
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "output": "ok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, "");
    let reply = call(&gateway, CallSite::Inference, "summarize: hello", None, 0.2, 0);

    assert_eq!(reply.status, status::SUCCESS);
    assert_eq!(reply.payload.as_deref(), Some("ok"));
    assert!(reply.error.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn request_body_shape() {
    let server = MockServer::start().await;
    mount_output(&server, "v1/invoke", "label").await;
    mount_output(&server, "v1/credentials", "cred").await;

    let gateway = gateway_for(&server, "");
    call(&gateway, CallSite::ModelInvocation, "classify", Some(""), 0.7, 32);
    call(
        &gateway,
        CallSite::CredentialIssuance,
        "challenge",
        Some("aud"),
        0.9,
        64,
    );

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let invoke: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(invoke["input"], "classify");
    assert_eq!(invoke["max_tokens"], 32);
    assert!(invoke.get("instructions").is_none());

    let credential: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(credential["input"], "challenge");
    assert_eq!(credential["instructions"], "aud");
    assert!(credential.get("temperature").is_none());
    assert!(credential.get("max_tokens").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn service_error_code_becomes_status() {
    let server = MockServer::start().await;
    mount_error(&server, "v1/credentials", 403, Some(4031), "device not attested").await;

    let gateway = gateway_for(&server, "");
    let reply = call(&gateway, CallSite::CredentialIssuance, "challenge", None, 0.0, 0);

    assert_eq!(reply.status, 4031);
    assert_eq!(reply.error.as_deref(), Some("device not attested"));
    assert!(reply.payload.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn service_error_without_code_is_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, "");
    let reply = call(&gateway, CallSite::Inference, "x", None, 0.0, 0);

    assert_eq!(reply.status, status::GENERIC_FAILURE);
    let message = reply.error.unwrap();
    assert!(message.contains("500"));
    assert!(message.contains("backend exploded"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn api_key_is_sent_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "output": "authorized"
        })))
        .mount(&server)
        .await;

    let config = TetherConfig::parse_str(&format!(
        r#"
        [service]
        base_url = "{}"
        api_key = "test-key"
        "#,
        server.uri()
    ))
    .unwrap();
    let gateway = Gateway::from_config(&config).unwrap();
    let reply = call(&gateway, CallSite::Inference, "x", None, 0.0, 0);

    assert_eq!(reply.payload.as_deref(), Some("authorized"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dispatch_timeout_reports_timed_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "output": "too late" }))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, "[gateway]\ndispatch_timeout_ms = 50");
    let reply = call(&gateway, CallSite::Inference, "x", None, 0.0, 0);

    assert_eq!(reply.status, status::TIMED_OUT);
    assert!(reply.payload.is_none());
}

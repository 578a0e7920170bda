//! RPC surface - JSON-RPC over HTTP against a live server
//!
//! Starts RpcServer on an ephemeral localhost port and calls it with the
//! jsonrpsee HTTP client, the way the CLI does.

use std::sync::Arc;

use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::server::ServerHandle;
use serde_json::{json, Value};

use promptrelay_api_rpc::error::code;
use promptrelay_api_rpc::{RpcServer, RpcServerConfig};
use promptrelay_core::application::{AdapterRegistry, PromptService};
use promptrelay_core::domain::ServiceTarget;
use promptrelay_core::port::id_provider::mocks::SequentialIdProvider;
use promptrelay_core::port::page_driver::mocks::FakeDom;
use promptrelay_core::port::session_provider::mocks::MockSessionProvider;
use promptrelay_core::port::time_provider::mocks::FixedTimeProvider;

async fn start(sessions: MockSessionProvider) -> (ServerHandle, HttpClient) {
    let service = Arc::new(PromptService::new(
        Arc::new(sessions),
        AdapterRegistry::with_defaults(),
        Arc::new(SequentialIdProvider::default()),
        Arc::new(FixedTimeProvider::new(0)),
    ));
    let config = RpcServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let (handle, addr) = RpcServer::new(config, service).start().await.unwrap();
    let client = HttpClientBuilder::default()
        .build(format!("http://{}", addr))
        .unwrap();
    (handle, client)
}

fn midjourney() -> Arc<FakeDom> {
    let dom = Arc::new(FakeDom::new("https://www.midjourney.com/imagine"));
    dom.add_element(&dom.root(), "textarea", &[]);
    dom
}

/// Named params, as the CLI sends them
fn params(value: Value) -> ObjectParams {
    let mut params = ObjectParams::new();
    if let Value::Object(fields) = value {
        for (name, field) in fields {
            params.insert(&name, field).unwrap();
        }
    }
    params
}

fn call_code(err: ClientError) -> i32 {
    match err {
        ClientError::Call(obj) => obj.code(),
        other => panic!("expected a call error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_over_http() {
    let (handle, client) =
        start(MockSessionProvider::new().with_page(ServiceTarget::Midjourney, midjourney())).await;

    let result: Value = client
        .request(
            "prompt.submit.v1",
            params(json!({ "service": "midjourney", "prompt": "a lighthouse in fog" })),
        )
        .await
        .unwrap();

    assert_eq!(result["success"], true);
    assert_eq!(result["method"], "keyboard");

    handle.stop().unwrap();
    println!("✅ prompt.submit.v1 over HTTP");
}

#[tokio::test]
async fn test_batch_over_http() {
    let (handle, client) =
        start(MockSessionProvider::new().with_page(ServiceTarget::Midjourney, midjourney())).await;

    let result: Value = client
        .request(
            "prompt.batch.v1",
            params(json!({
                "service": "midjourney",
                "prompts": ["first", "second", "third"],
                "delayMs": 10
            })),
        )
        .await
        .unwrap();

    assert_eq!(result["success"], true);
    assert_eq!(result["successCount"], 3);
    assert_eq!(result["failCount"], 0);
    let prompts: Vec<&str> = result["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["prompt"].as_str().unwrap())
        .collect();
    assert_eq!(prompts, ["first", "second", "third"]);

    handle.stop().unwrap();
    println!("✅ prompt.batch.v1 over HTTP");
}

#[tokio::test]
async fn test_error_codes_over_http() {
    let sessions = MockSessionProvider::new();
    sessions.log_out(ServiceTarget::Leonardo);
    let (handle, client) = start(sessions).await;

    let err = client
        .request::<Value, _>(
            "prompt.submit.v1",
            params(json!({ "service": "canva", "prompt": "x" })),
        )
        .await
        .unwrap_err();
    assert_eq!(call_code(err), code::VALIDATION_ERROR);

    let err = client
        .request::<Value, _>(
            "prompt.submit.v1",
            params(json!({ "service": "leonardo", "prompt": "x" })),
        )
        .await
        .unwrap_err();
    assert_eq!(call_code(err), code::AUTHENTICATION_REQUIRED);

    let err = client
        .request::<Value, _>(
            "prompt.batch.v1",
            params(json!({ "service": "leonardo", "prompts": [] })),
        )
        .await
        .unwrap_err();
    assert_eq!(call_code(err), code::VALIDATION_ERROR);

    handle.stop().unwrap();
    println!("✅ error codes over HTTP");
}

#[tokio::test]
async fn test_session_methods_over_http() {
    let sessions = MockSessionProvider::new().with_page(ServiceTarget::Midjourney, midjourney());
    sessions.log_out(ServiceTarget::Firefly);
    let (handle, client) = start(sessions).await;

    let status: Value = client
        .request(
            "session.status.v1",
            params(json!({ "service": "firefly" })),
        )
        .await
        .unwrap();
    assert_eq!(status["service"], "firefly");
    assert_eq!(status["loggedIn"], false);

    let closed: Value = client
        .request(
            "session.close.v1",
            params(json!({ "service": "midjourney" })),
        )
        .await
        .unwrap();
    assert_eq!(closed["service"], "midjourney");
    assert_eq!(closed["closed"], true);

    handle.stop().unwrap();
    println!("✅ session.status.v1 / session.close.v1 over HTTP");
}

//! HTTP Listener Integration Tests
//!
//! Binds the real router on an ephemeral port and talks to it with reqwest.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;
use ed25519_dalek::{Signer, SigningKey};
use resmon_service::alert::thresholds::AlertPolicy;
use resmon_service::chat::handler::{CommandHandler, ReplyChannel};
use resmon_service::chat::interactions::{InteractionState, InteractionVerifier};
use resmon_service::controller::SessionController;
use resmon_service::dev_mode::{MemorySessionStore, ScriptedReadings};
use resmon_service::error::PlatformError;
use resmon_service::server;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Forwards edited replies to the test.
struct ChannelReplies(mpsc::UnboundedSender<(String, String)>);

#[async_trait]
impl ReplyChannel for ChannelReplies {
    async fn edit_reply(&self, interaction_token: &str, content: &str) -> Result<(), PlatformError> {
        let _ = self
            .0
            .send((interaction_token.to_string(), content.to_string()));
        Ok(())
    }
}

fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

fn interaction_state(replies: mpsc::UnboundedSender<(String, String)>) -> Arc<InteractionState> {
    let controller = SessionController::new(
        Arc::new(ScriptedReadings::new(&[68.3])),
        Arc::new(MemorySessionStore::new()),
        AlertPolicy::default(),
    );
    let handler = CommandHandler::new(
        Arc::new(controller),
        FixedOffset::east_opt(9 * 3600).unwrap(),
        Duration::from_secs(1800),
    );
    let verifier =
        InteractionVerifier::from_hex(&hex::encode(signing_key().verifying_key().to_bytes()))
            .unwrap();

    Arc::new(InteractionState {
        verifier,
        handler: Arc::new(handler),
        replies: Arc::new(ChannelReplies(replies)),
    })
}

async fn spawn_server(interactions: Option<Arc<InteractionState>>) -> (String, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let cancel = CancellationToken::new();
    tokio::spawn(server::serve(
        listener,
        server::router(interactions),
        cancel.clone(),
    ));
    (base, cancel)
}

fn signed_post(client: &reqwest::Client, url: &str, body: &str) -> reqwest::RequestBuilder {
    let timestamp = "1760659200";
    let signature = signing_key().sign(format!("{timestamp}{body}").as_bytes());
    client
        .post(url)
        .header("x-signature-ed25519", hex::encode(signature.to_bytes()))
        .header("x-signature-timestamp", timestamp)
        .header("content-type", "application/json")
        .body(body.to_string())
}

#[tokio::test]
async fn test_liveness_routes() {
    let (base, cancel) = spawn_server(None).await;

    let root = reqwest::get(format!("{base}/")).await.unwrap();
    assert!(root.status().is_success());
    assert_eq!(root.text().await.unwrap(), "Bot is running!");

    let health: serde_json::Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    cancel.cancel();
}

#[tokio::test]
async fn test_interactions_absent_without_credentials() {
    let (base, cancel) = spawn_server(None).await;
    let response = reqwest::Client::new()
        .post(format!("{base}/interactions"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    cancel.cancel();
}

#[tokio::test]
async fn test_unsigned_interaction_rejected() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let (base, cancel) = spawn_server(Some(interaction_state(tx))).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/interactions"))
        .body(r#"{"type":1}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    cancel.cancel();
}

#[tokio::test]
async fn test_signed_ping_gets_pong() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let (base, cancel) = spawn_server(Some(interaction_state(tx))).await;

    let client = reqwest::Client::new();
    let response = signed_post(&client, &format!("{base}/interactions"), r#"{"type":1}"#)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["type"], 1);
    cancel.cancel();
}

#[tokio::test]
async fn test_command_is_deferred_then_completed() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (base, cancel) = spawn_server(Some(interaction_state(tx))).await;

    let body = r#"{"type":2,"token":"tok-9","data":{"name":"reservoir","options":[{"name":"now","type":1}]},"member":{"user":{"username":"op"}}}"#;
    let client = reqwest::Client::new();
    let response = signed_post(&client, &format!("{base}/interactions"), body)
        .send()
        .await
        .unwrap();
    let ack: serde_json::Value = response.json().await.unwrap();
    assert_eq!(ack["type"], 5);

    let (token, content) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(token, "tok-9");
    assert!(content.contains("68.3%"));
    cancel.cancel();
}

//! Discord HTTP interactions ingress.
//!
//! Discord posts each slash command to our endpoint and expects an answer
//! within three seconds. We verify the Ed25519 signature, answer with a
//! deferred response (type 5) straight away, and finish the command on a
//! spawned task that edits the placeholder when done.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::Deserialize;
use serde_json::json;

use crate::chat::command::{COMMAND_GROUP, Command};
use crate::chat::handler::{CommandHandler, ReplyChannel};
use crate::chat::render;
use crate::error::ConfigError;
use crate::logging::{Component, log_platform_failure};

const INTERACTION_PING: u8 = 1;
const INTERACTION_APPLICATION_COMMAND: u8 = 2;

const RESPONSE_PONG: u8 = 1;
const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
const RESPONSE_DEFERRED_CHANNEL_MESSAGE: u8 = 5;

// ---------------------------------------------------------------------------
// Signature verification
// ---------------------------------------------------------------------------

pub struct InteractionVerifier {
    key: VerifyingKey,
}

impl InteractionVerifier {
    pub fn from_hex(public_key: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            key: "DISCORD_PUBLIC_KEY",
            reason,
        };
        let bytes: [u8; 32] = hex::decode(public_key.trim())
            .map_err(|e| invalid(e.to_string()))?
            .try_into()
            .map_err(|_| invalid("expected 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|e| invalid(e.to_string()))?;
        Ok(Self { key })
    }

    /// Checks `signature` over `timestamp || body`.
    pub fn verify(&self, signature_hex: &str, timestamp: &str, body: &[u8]) -> bool {
        let Ok(raw) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(raw): Result<[u8; 64], _> = raw.try_into() else {
            return false;
        };
        let signature = Signature::from_bytes(&raw);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);
        self.key.verify(&message, &signature).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    pub token: Option<String>,
    pub data: Option<CommandData>,
    pub member: Option<Member>,
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

#[derive(Debug, Deserialize)]
pub struct CommandOption {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct Member {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub username: String,
    pub global_name: Option<String>,
}

/// What the endpoint should do with an interaction.
#[derive(Debug, PartialEq)]
pub enum Disposition {
    Pong,
    Defer {
        token: String,
        command: Command,
        initiator: String,
    },
    Unsupported(String),
}

/// Decides the response without doing any I/O.
pub fn classify(interaction: &Interaction) -> Disposition {
    match interaction.kind {
        INTERACTION_PING => Disposition::Pong,
        INTERACTION_APPLICATION_COMMAND => {
            let Some(data) = interaction.data.as_ref() else {
                return Disposition::Unsupported("command has no data".to_string());
            };
            let Some(token) = interaction.token.clone() else {
                return Disposition::Unsupported("command has no token".to_string());
            };

            // `/reservoir <sub>` arrives as the group name with the
            // subcommand as its first option.
            let name = if data.name == COMMAND_GROUP {
                match data.options.first() {
                    Some(option) => option.name.as_str(),
                    None => "help",
                }
            } else {
                data.name.as_str()
            };

            match name.parse::<Command>() {
                Ok(command) => Disposition::Defer {
                    token,
                    command,
                    initiator: initiator_name(interaction),
                },
                Err(e) => Disposition::Unsupported(e),
            }
        }
        other => Disposition::Unsupported(format!("interaction type {other}")),
    }
}

fn initiator_name(interaction: &Interaction) -> String {
    interaction
        .member
        .as_ref()
        .map(|m| &m.user)
        .or(interaction.user.as_ref())
        .map(|u| u.global_name.clone().unwrap_or_else(|| u.username.clone()))
        .unwrap_or_else(|| "unknown".to_string())
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

pub struct InteractionState {
    pub verifier: InteractionVerifier,
    pub handler: Arc<CommandHandler>,
    pub replies: Arc<dyn ReplyChannel>,
}

pub async fn handle_interaction(
    State(state): State<Arc<InteractionState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let verified = match (header("x-signature-ed25519"), header("x-signature-timestamp")) {
        (Some(signature), Some(timestamp)) => state.verifier.verify(signature, timestamp, &body),
        _ => false,
    };
    if !verified {
        return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(e) => {
            tracing::warn!(component = %Component::Chat, error = %e, "malformed interaction");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match classify(&interaction) {
        Disposition::Pong => Json(json!({ "type": RESPONSE_PONG })).into_response(),
        Disposition::Defer {
            token,
            command,
            initiator,
        } => {
            tokio::spawn(complete_or_apologize(
                Arc::clone(&state.handler),
                Arc::clone(&state.replies),
                token,
                command,
                initiator,
            ));
            Json(json!({ "type": RESPONSE_DEFERRED_CHANNEL_MESSAGE })).into_response()
        }
        Disposition::Unsupported(reason) => {
            tracing::warn!(component = %Component::Chat, %reason, "unsupported interaction");
            Json(json!({
                "type": RESPONSE_CHANNEL_MESSAGE,
                "data": { "content": format!("Unknown command. Try `/{COMMAND_GROUP} help`.") },
            }))
            .into_response()
        }
    }
}

/// Runs the command on its own task. If that task panics the placeholder
/// still gets edited, with a generic apology.
pub async fn complete_or_apologize(
    handler: Arc<CommandHandler>,
    replies: Arc<dyn ReplyChannel>,
    token: String,
    command: Command,
    initiator: String,
) {
    let inner = {
        let replies = Arc::clone(&replies);
        let token = token.clone();
        tokio::spawn(async move {
            handler
                .complete(replies.as_ref(), &token, command, &initiator)
                .await;
        })
    };

    if let Err(e) = inner.await {
        tracing::error!(component = %Component::Chat, command = command.name(), error = %e, "command task aborted");
        if let Err(e) = replies.edit_reply(&token, &render::internal_error_reply()).await {
            log_platform_failure("edit_reply", &e);
        }
    }
}

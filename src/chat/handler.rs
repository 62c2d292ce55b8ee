//! Translates chat commands into controller calls and results into text.
//!
//! The platform has already been given a deferred acknowledgement by the
//! time anything here runs; this module only produces the final content and
//! edits it into that placeholder.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
#[cfg(test)]
use mockall::automock;

use crate::chat::command::{Command, help_text};
use crate::chat::render;
use crate::controller::SessionController;
use crate::error::{PlatformError, StatusError};
use crate::logging::{Component, log_platform_failure};

/// Channel for replacing a deferred reply with its final content.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn edit_reply(&self, interaction_token: &str, content: &str) -> Result<(), PlatformError>;
}

pub struct CommandHandler {
    controller: Arc<SessionController>,
    display_offset: FixedOffset,
    poll_interval: Duration,
}

impl CommandHandler {
    pub fn new(
        controller: Arc<SessionController>,
        display_offset: FixedOffset,
        poll_interval: Duration,
    ) -> Self {
        Self {
            controller,
            display_offset,
            poll_interval,
        }
    }

    /// Runs a command to completion and returns the reply text. Never fails:
    /// every error path has its own message.
    pub async fn respond(&self, command: Command, initiator: &str) -> String {
        tracing::info!(component = %Component::Chat, command = command.name(), initiator, "command received");

        match command {
            Command::Start => match self.controller.start(initiator).await {
                Ok(outcome) => render::start_reply(&outcome, self.display_offset),
                Err(e) => render::start_failed_reply(&e),
            },
            Command::Status => match self.controller.status().await {
                Ok(status) => render::status_reply(&status, self.display_offset),
                Err(StatusError::NoActiveSession) => render::no_session_reply(),
                Err(StatusError::Fetch(e)) => render::fetch_failed_reply("status", &e),
            },
            Command::Now => match self.controller.current_reading().await {
                Ok(reading) => {
                    let now = Utc::now();
                    let cached = self.controller.cache().peek().await;
                    render::now_reply(
                        &reading,
                        cached.as_ref(),
                        self.controller.is_stale(&reading, now),
                        now,
                        self.display_offset,
                    )
                }
                Err(e) => render::fetch_failed_reply("now", &e),
            },
            Command::Help => help_text(self.controller.policy(), self.poll_interval),
        }
    }

    /// Produces the reply and edits it into the deferred placeholder.
    pub async fn complete(
        &self,
        replies: &dyn ReplyChannel,
        interaction_token: &str,
        command: Command,
        initiator: &str,
    ) {
        let content = self.respond(command, initiator).await;
        if let Err(e) = replies.edit_reply(interaction_token, &content).await {
            log_platform_failure("edit_reply", &e);
        }
    }
}

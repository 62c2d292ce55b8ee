//! The command group exposed to chat users.

use std::str::FromStr;
use std::time::Duration;

use crate::alert::thresholds::AlertPolicy;

/// Name of the slash-command group; subcommands hang off it.
pub const COMMAND_GROUP: &str = "reservoir";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
    Now,
    Help,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Status => "status",
            Command::Now => "now",
            Command::Help => "help",
        }
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Command::Start),
            "status" => Ok(Command::Status),
            "now" => Ok(Command::Now),
            "help" => Ok(Command::Help),
            other => Err(format!("unknown subcommand: {other}")),
        }
    }
}

/// Static usage text, filled in with the configured threshold and period.
pub fn help_text(policy: &AlertPolicy, poll_interval: Duration) -> String {
    format!(
        "**/{group} commands**\n\
         `/{group} start` record the current storage level as the baseline (resets any running session)\n\
         `/{group} status` compare the live level with the baseline\n\
         `/{group} now` show the live level only\n\
         `/{group} help` show this message\n\
         The level is checked every {minutes} minutes; one alert is broadcast when it falls {drop:.1} pt below the baseline.",
        group = COMMAND_GROUP,
        minutes = poll_interval.as_secs() / 60,
        drop = policy.alert_decrease,
    )
}

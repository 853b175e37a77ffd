//! Bot configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variable overrides (e.g. `SPAWNER_TICKET_CATEGORY_ID`)
//! 2. Values from the TOML file passed via `--config`
//! 3. Built-in defaults (the production server's ids)
//!
//! The bot token is never read from the file; it comes from `DISCORD_TOKEN`.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use ticketing::{RoleId, RolePolicy, StaffRoles};

const DEFAULT_COMMAND_ROLE_ID: u64 = 1438571707186155660;
const DEFAULT_STAFF_TIER1_ROLE_ID: u64 = 1438937907653247047;
const DEFAULT_STAFF_TIER2_ROLE_ID: u64 = 1438937985511981098;
const DEFAULT_STAFF_TIER3_ROLE_ID: u64 = 1438588926104441013;
const DEFAULT_SCAM_ALERT_ROLE_ID: u64 = 1438593799143161926;
const DEFAULT_TICKET_CATEGORY_ID: u64 = 1438565668189503518;
const DEFAULT_REQUEST_LOG_CHANNEL_ID: u64 = 1439568860540829736;
const DEFAULT_RESPONSE_WINDOW_SECS: u64 = 60;

const ENV_TOKEN: &str = "DISCORD_TOKEN";
const ENV_COMMAND_ROLE_ID: &str = "SPAWNER_COMMAND_ROLE_ID";
const ENV_STAFF_TIER1_ROLE_ID: &str = "SPAWNER_STAFF_TIER1_ROLE_ID";
const ENV_STAFF_TIER2_ROLE_ID: &str = "SPAWNER_STAFF_TIER2_ROLE_ID";
const ENV_STAFF_TIER3_ROLE_ID: &str = "SPAWNER_STAFF_TIER3_ROLE_ID";
const ENV_SCAM_ALERT_ROLE_ID: &str = "SPAWNER_SCAM_ALERT_ROLE_ID";
const ENV_TICKET_CATEGORY_ID: &str = "SPAWNER_TICKET_CATEGORY_ID";
const ENV_REQUEST_LOG_CHANNEL_ID: &str = "SPAWNER_REQUEST_LOG_CHANNEL_ID";
const ENV_GUILD_ID: &str = "SPAWNER_GUILD_ID";
const ENV_RESPONSE_WINDOW_SECS: &str = "SPAWNER_RESPONSE_WINDOW_SECS";

/// Top-level bot configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Role allowed to run `/spawner`.
    pub command_role_id: u64,
    /// Staff role that may claim tickets of 1 spawner.
    pub staff_tier1_role_id: u64,
    /// Staff role that may claim tickets of up to 3 spawners.
    pub staff_tier2_role_id: u64,
    /// Staff role that may claim tickets of up to 5 spawners.
    pub staff_tier3_role_id: u64,
    /// Role pinged when a buyer reports a scam.
    pub scam_alert_role_id: u64,
    /// Category new ticket channels are created under.
    pub ticket_category_id: u64,
    /// Staff channel receiving claim requests.
    pub request_log_channel_id: u64,
    /// Register `/spawner` in this guild only (instant) instead of globally.
    pub guild_id: Option<u64>,
    /// Seconds the buyer has to answer the scam question.
    pub response_window_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command_role_id: DEFAULT_COMMAND_ROLE_ID,
            staff_tier1_role_id: DEFAULT_STAFF_TIER1_ROLE_ID,
            staff_tier2_role_id: DEFAULT_STAFF_TIER2_ROLE_ID,
            staff_tier3_role_id: DEFAULT_STAFF_TIER3_ROLE_ID,
            scam_alert_role_id: DEFAULT_SCAM_ALERT_ROLE_ID,
            ticket_category_id: DEFAULT_TICKET_CATEGORY_ID,
            request_log_channel_id: DEFAULT_REQUEST_LOG_CHANNEL_ID,
            guild_id: None,
            response_window_secs: DEFAULT_RESPONSE_WINDOW_SECS,
        }
    }
}

impl BotConfig {
    /// Load from `path` (if it exists), then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid bot configuration TOML")
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let parse = |key: &str| -> Result<Option<u64>> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Some)
                    .with_context(|| format!("{key} must be a numeric id, got `{raw}`")),
                None => Ok(None),
            }
        };

        let fields: [(&str, &mut u64); 8] = [
            (ENV_COMMAND_ROLE_ID, &mut self.command_role_id),
            (ENV_STAFF_TIER1_ROLE_ID, &mut self.staff_tier1_role_id),
            (ENV_STAFF_TIER2_ROLE_ID, &mut self.staff_tier2_role_id),
            (ENV_STAFF_TIER3_ROLE_ID, &mut self.staff_tier3_role_id),
            (ENV_SCAM_ALERT_ROLE_ID, &mut self.scam_alert_role_id),
            (ENV_TICKET_CATEGORY_ID, &mut self.ticket_category_id),
            (ENV_REQUEST_LOG_CHANNEL_ID, &mut self.request_log_channel_id),
            (ENV_RESPONSE_WINDOW_SECS, &mut self.response_window_secs),
        ];
        for (key, slot) in fields {
            if let Some(value) = parse(key)? {
                *slot = value;
            }
        }
        if let Some(guild) = parse(ENV_GUILD_ID)? {
            self.guild_id = Some(guild);
        }
        Ok(())
    }

    /// Snowflakes must be non-zero; the window must be at least a second.
    pub fn validate(&self) -> Result<()> {
        let ids = [
            ("command_role_id", self.command_role_id),
            ("staff_tier1_role_id", self.staff_tier1_role_id),
            ("staff_tier2_role_id", self.staff_tier2_role_id),
            ("staff_tier3_role_id", self.staff_tier3_role_id),
            ("scam_alert_role_id", self.scam_alert_role_id),
            ("ticket_category_id", self.ticket_category_id),
            ("request_log_channel_id", self.request_log_channel_id),
        ];
        for (name, id) in ids {
            if id == 0 {
                bail!("{name} must be set to a non-zero id");
            }
        }
        if self.guild_id == Some(0) {
            bail!("guild_id must be non-zero when set");
        }
        if self.response_window_secs == 0 {
            bail!("response_window_secs must be at least 1");
        }
        Ok(())
    }

    pub fn policy(&self) -> RolePolicy {
        RolePolicy {
            menu_role: RoleId(self.command_role_id),
            staff: StaffRoles {
                tier1: RoleId(self.staff_tier1_role_id),
                tier2: RoleId(self.staff_tier2_role_id),
                tier3: RoleId(self.staff_tier3_role_id),
            },
            alert_role: RoleId(self.scam_alert_role_id),
        }
    }

    pub fn response_window(&self) -> Duration {
        Duration::from_secs(self.response_window_secs)
    }
}

/// Read the bot token from the environment.
pub fn discord_token() -> Result<String> {
    let token = std::env::var(ENV_TOKEN).with_context(|| format!("{ENV_TOKEN} is not set"))?;
    if token.trim().is_empty() {
        bail!("{ENV_TOKEN} is empty");
    }
    Ok(token)
}

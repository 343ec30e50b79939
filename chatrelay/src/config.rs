//! Relay configuration.
//!
//! Loaded from a TOML file, then overridden by `CHATRELAY_*` environment
//! variables. Every field has a default so an empty file is valid.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub redis_url: String,
    /// Set holding every remark whose queue should be drained.
    pub remark_list_key: String,
    /// Set of group topics whose inbound traffic is archived.
    pub room_list_key: String,
    pub msg_count_key: String,
    /// Reserved queue key for ad-hoc individual addressing.
    pub other_key: String,
    /// Reserved queue key for ad-hoc group addressing.
    pub group_key: String,
    pub poll_interval_secs: u64,
    pub recall_window_secs: u64,
    pub echo_ttl_secs: u64,
    pub echo_capacity: usize,
    pub directory_dump_interval_secs: u64,
    pub message_log: PathBuf,
    pub audit_log_dir: PathBuf,
    pub attachment_dir: PathBuf,
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Where the platform bridge pushes events.
    pub bind_addr: String,
    /// Base URL of the platform bridge HTTP API.
    pub base_url: String,
    pub shared_secret: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8844".to_string(),
            base_url: "http://127.0.0.1:8855".to_string(),
            shared_secret: None,
        }
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for RelayConfig {
    fn default() -> Self {
        let home = home_dir();
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            remark_list_key: "remark_list".to_string(),
            room_list_key: "room_list".to_string(),
            msg_count_key: "msg_count".to_string(),
            other_key: "other".to_string(),
            group_key: "group".to_string(),
            poll_interval_secs: 3,
            recall_window_secs: 120,
            echo_ttl_secs: 600,
            echo_capacity: 1000,
            directory_dump_interval_secs: 3600,
            message_log: home.join("all.txt"),
            audit_log_dir: home.join("msglog"),
            attachment_dir: home.join("attachments"),
            bridge: BridgeConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn from_file(path: impl AsRef<Path>) -> RelayResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> RelayResult<Self> {
        let config: RelayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CHATRELAY_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> RelayResult<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> RelayResult<()> {
        if let Some(url) = var("CHATRELAY_REDIS_URL") {
            self.redis_url = url;
        }
        if let Some(secs) = var("CHATRELAY_POLL_INTERVAL_SECS") {
            self.poll_interval_secs = parse_number("CHATRELAY_POLL_INTERVAL_SECS", &secs)?;
        }
        if let Some(secs) = var("CHATRELAY_RECALL_WINDOW_SECS") {
            self.recall_window_secs = parse_number("CHATRELAY_RECALL_WINDOW_SECS", &secs)?;
        }
        if let Some(secs) = var("CHATRELAY_ECHO_TTL_SECS") {
            self.echo_ttl_secs = parse_number("CHATRELAY_ECHO_TTL_SECS", &secs)?;
        }
        if let Some(path) = var("CHATRELAY_MESSAGE_LOG") {
            self.message_log = PathBuf::from(path);
        }
        if let Some(path) = var("CHATRELAY_AUDIT_LOG_DIR") {
            self.audit_log_dir = PathBuf::from(path);
        }
        if let Some(path) = var("CHATRELAY_ATTACHMENT_DIR") {
            self.attachment_dir = PathBuf::from(path);
        }
        if let Some(url) = var("CHATRELAY_BRIDGE_URL") {
            self.bridge.base_url = url;
        }
        if let Some(secret) = var("CHATRELAY_BRIDGE_SECRET") {
            self.bridge.shared_secret = Some(secret);
        }
        self.validate()
    }

    pub fn validate(&self) -> RelayResult<()> {
        if self.poll_interval_secs == 0 {
            return Err(RelayError::Config("poll_interval_secs must be > 0".to_string()));
        }
        if self.recall_window_secs == 0 {
            return Err(RelayError::Config("recall_window_secs must be > 0".to_string()));
        }
        if self.echo_ttl_secs == 0 {
            return Err(RelayError::Config("echo_ttl_secs must be > 0".to_string()));
        }
        if self.echo_capacity == 0 {
            return Err(RelayError::Config("echo_capacity must be > 0".to_string()));
        }
        if self.other_key == self.group_key {
            return Err(RelayError::Config(
                "other_key and group_key must differ".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn recall_window(&self) -> Duration {
        Duration::from_secs(self.recall_window_secs)
    }

    pub fn echo_ttl(&self) -> Duration {
        Duration::from_secs(self.echo_ttl_secs)
    }

    pub fn echo_capacity(&self) -> RelayResult<NonZeroUsize> {
        NonZeroUsize::new(self.echo_capacity)
            .ok_or_else(|| RelayError::Config("echo_capacity must be > 0".to_string()))
    }

    pub fn directory_dump_interval(&self) -> Duration {
        Duration::from_secs(self.directory_dump_interval_secs)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> RelayResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RelayError::Config(format!("{} is not a number: '{}'", name, value)))
}

#![forbid(unsafe_code)]

//! Session configuration: optional TOML file plus `FCHAT_*` env overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use fchat_client_core::config::{DEFAULT_RECONNECT_ERROR_CODES, DEFAULT_SERVER_URL};
use fchat_client_core::ticket::{DEFAULT_TICKET_URL, TICKET_REFRESH_INTERVAL};
use fchat_client_core::{ConnectionConfig, ReconnectPolicy, SecretString};
use serde::Deserialize;
use tracing::info;

use crate::queue::{DEFAULT_REQUEUE_DELAY, MAX_DISPATCH_ATTEMPTS};
use crate::state::{DEFAULT_HISTORY_CAPACITY, DEFAULT_NOTIFICATION_CAPACITY};

/// Default config path: `~/.fchat/config.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".fchat").join("config.toml"))
}

/// Load the session config from the default path and env overrides.
pub fn load_config() -> anyhow::Result<SessionConfig> {
	let path = default_config_path()?;
	load_config_from_path(&path)
}

/// Same as `load_config` but with an explicit config path.
pub fn load_config_from_path(path: &Path) -> anyhow::Result<SessionConfig> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut cfg = SessionConfig::from_file(file_cfg);

	apply_env_overrides(&mut cfg);

	Ok(cfg)
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// Account used for the ticket request and the login frame.
	pub account: String,
	pub password: SecretString,
	/// Character to log in as; falls back to the account's default.
	pub character: Option<String>,

	pub server_url: String,
	pub ticket_url: String,
	pub ticket_refresh_interval: Duration,

	/// Spacing between saved-channel joins after login.
	pub auto_join_interval: Duration,
	pub requeue_delay: Duration,
	pub max_dispatch_attempts: u32,

	pub notification_capacity: usize,
	pub history_capacity: usize,

	/// Extra words that raise a mention besides our own name.
	pub mention_keywords: Vec<String>,
	pub self_sentinel: String,
	/// Persist joined channels and rejoin them after login.
	pub remember_channels: bool,

	pub reconnect_min_delay: Duration,
	pub reconnect_max_delay: Duration,
	pub max_reconnect_attempts: Option<u32>,
	pub reconnect_error_codes: Vec<u64>,

	/// Optional Prometheus exporter bind address (host:port).
	pub metrics_bind: Option<String>,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self::from_file(FileConfig::default())
	}
}

impl SessionConfig {
	fn from_file(file: FileConfig) -> Self {
		let reconnect = ReconnectPolicy::default();
		Self {
			account: file.account.account.unwrap_or_default().trim().to_string(),
			password: SecretString::new(file.account.password.unwrap_or_default()),
			character: file.account.character.filter(|s| !s.trim().is_empty()),

			server_url: file
				.server
				.url
				.filter(|s| !s.trim().is_empty())
				.unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
			ticket_url: file
				.server
				.ticket_url
				.filter(|s| !s.trim().is_empty())
				.unwrap_or_else(|| DEFAULT_TICKET_URL.to_string()),
			ticket_refresh_interval: file
				.server
				.ticket_refresh_secs
				.filter(|v| *v > 0)
				.map(Duration::from_secs)
				.unwrap_or(TICKET_REFRESH_INTERVAL),

			auto_join_interval: file
				.session
				.auto_join_interval_ms
				.map(Duration::from_millis)
				.unwrap_or(Duration::from_millis(200)),
			requeue_delay: file
				.session
				.requeue_delay_ms
				.map(Duration::from_millis)
				.unwrap_or(DEFAULT_REQUEUE_DELAY),
			max_dispatch_attempts: file
				.session
				.max_dispatch_attempts
				.filter(|v| *v > 0)
				.unwrap_or(MAX_DISPATCH_ATTEMPTS),

			notification_capacity: file.session.notification_capacity.unwrap_or(DEFAULT_NOTIFICATION_CAPACITY),
			history_capacity: file.session.history_capacity.unwrap_or(DEFAULT_HISTORY_CAPACITY),

			mention_keywords: file
				.session
				.mention_keywords
				.into_iter()
				.map(|k| k.trim().to_string())
				.filter(|k| !k.is_empty())
				.collect(),
			self_sentinel: file
				.session
				.self_sentinel
				.filter(|s| !s.trim().is_empty())
				.unwrap_or_else(|| "you".to_string()),
			remember_channels: file.session.remember_channels.unwrap_or(true),

			reconnect_min_delay: file
				.server
				.reconnect_min_delay_ms
				.map(Duration::from_millis)
				.unwrap_or(reconnect.min_delay),
			reconnect_max_delay: file
				.server
				.reconnect_max_delay_ms
				.map(Duration::from_millis)
				.unwrap_or(reconnect.max_delay),
			max_reconnect_attempts: file.server.max_reconnect_attempts,
			reconnect_error_codes: file
				.server
				.reconnect_error_codes
				.unwrap_or_else(|| DEFAULT_RECONNECT_ERROR_CODES.to_vec()),

			metrics_bind: file.metrics.bind.filter(|s| !s.trim().is_empty()),
		}
	}

	/// Connection settings derived from this config.
	pub fn connection_config(&self) -> ConnectionConfig {
		ConnectionConfig {
			server_url: self.server_url.clone(),
			account: self.account.clone(),
			reconnect: ReconnectPolicy {
				min_delay: self.reconnect_min_delay,
				max_delay: self.reconnect_max_delay,
				max_attempts: self.max_reconnect_attempts,
			},
			reconnect_error_codes: self.reconnect_error_codes.clone(),
			..ConnectionConfig::default()
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	#[serde(default)]
	account: FileAccountSettings,

	#[serde(default)]
	server: FileServerSettings,

	#[serde(default)]
	session: FileSessionSettings,

	#[serde(default)]
	metrics: FileMetricsSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileAccountSettings {
	account: Option<String>,
	password: Option<String>,
	character: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileServerSettings {
	url: Option<String>,
	ticket_url: Option<String>,
	ticket_refresh_secs: Option<u64>,
	reconnect_min_delay_ms: Option<u64>,
	reconnect_max_delay_ms: Option<u64>,
	max_reconnect_attempts: Option<u32>,
	reconnect_error_codes: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileSessionSettings {
	auto_join_interval_ms: Option<u64>,
	requeue_delay_ms: Option<u64>,
	max_dispatch_attempts: Option<u32>,
	notification_capacity: Option<usize>,
	history_capacity: Option<usize>,
	#[serde(default)]
	mention_keywords: Vec<String>,
	self_sentinel: Option<String>,
	remember_channels: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileMetricsSettings {
	bind: Option<String>,
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

fn env_value(key: &str) -> Option<String> {
	let v = std::env::var(key).ok()?;
	let v = v.trim().to_string();
	(!v.is_empty()).then_some(v)
}

fn apply_env_overrides(cfg: &mut SessionConfig) {
	if let Some(v) = env_value("FCHAT_ACCOUNT") {
		cfg.account = v;
		info!("session config: account overridden by env");
	}

	if let Some(v) = env_value("FCHAT_PASSWORD") {
		cfg.password = SecretString::new(v);
		info!("session config: password overridden by env");
	}

	if let Some(v) = env_value("FCHAT_CHARACTER") {
		cfg.character = Some(v);
		info!("session config: character overridden by env");
	}

	if let Some(v) = env_value("FCHAT_SERVER_URL") {
		cfg.server_url = v;
		info!("session config: server_url overridden by env");
	}

	if let Some(v) = env_value("FCHAT_METRICS_BIND") {
		cfg.metrics_bind = Some(v);
		info!("session config: metrics_bind overridden by env");
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write as _;

	use super::*;

	#[test]
	fn missing_file_gives_defaults() {
		let dir = tempfile::tempdir().expect("tempdir");
		let cfg = load_config_from_path(&dir.path().join("absent.toml")).expect("load");

		assert_eq!(cfg.server_url, DEFAULT_SERVER_URL);
		assert_eq!(cfg.requeue_delay, Duration::from_millis(500));
		assert_eq!(cfg.max_dispatch_attempts, 5);
		assert_eq!(cfg.notification_capacity, 500);
		assert_eq!(cfg.history_capacity, 300);
		assert_eq!(cfg.self_sentinel, "you");
		assert!(cfg.remember_channels);
		assert_eq!(cfg.reconnect_error_codes, vec![2, 62]);
	}

	#[test]
	fn file_values_are_applied() {
		let mut file = tempfile::NamedTempFile::new().expect("tempfile");
		writeln!(
			file,
			r#"
[account]
account = "someone"
password = "hunter2"
character = "Alice"

[server]
url = "ws://localhost:9722"
reconnect_min_delay_ms = 100
reconnect_max_delay_ms = 200
max_reconnect_attempts = 3

[session]
mention_keywords = ["tea", "  "]
remember_channels = false
"#
		)
		.expect("write");

		let cfg = load_config_from_path(file.path()).expect("load");
		assert_eq!(cfg.account, "someone");
		assert_eq!(cfg.password.expose(), "hunter2");
		assert_eq!(cfg.character.as_deref(), Some("Alice"));
		assert_eq!(cfg.mention_keywords, vec!["tea".to_string()]);
		assert!(!cfg.remember_channels);

		let conn = cfg.connection_config();
		assert_eq!(conn.server_url, "ws://localhost:9722");
		assert_eq!(conn.account, "someone");
		assert_eq!(conn.reconnect.min_delay, Duration::from_millis(100));
		assert_eq!(conn.reconnect.max_attempts, Some(3));
	}

	#[test]
	fn password_stays_out_of_debug_output() {
		let cfg = SessionConfig {
			password: SecretString::new("hunter2"),
			..SessionConfig::default()
		};
		assert!(!format!("{cfg:?}").contains("hunter2"));
	}

	#[test]
	fn malformed_file_is_an_error() {
		let mut file = tempfile::NamedTempFile::new().expect("tempfile");
		writeln!(file, "[session\nbroken").expect("write");
		let err = load_config_from_path(file.path()).expect_err("should fail");
		assert!(format!("{err:#}").contains("parse TOML"));
	}
}

#![forbid(unsafe_code)]

use fchat_protocol::version;

use crate::reconnect::ReconnectPolicy;

pub const DEFAULT_SERVER_URL: &str = "wss://chat.f-list.net/chat2";

/// `ERR` numbers meaning the login slot is gone; a close after one of these
/// reconnects instead of failing the session.
pub const DEFAULT_RECONNECT_ERROR_CODES: &[u64] = &[2, 62];

/// Connection manager configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
	pub server_url: String,

	/// Account name sent in the login frame.
	pub account: String,

	/// `cname` in the login frame.
	pub client_name: String,

	/// `cversion` in the login frame.
	pub client_version: String,

	pub reconnect: ReconnectPolicy,

	pub reconnect_error_codes: Vec<u64>,
}

impl ConnectionConfig {
	pub fn new(account: impl Into<String>) -> Self {
		Self {
			account: account.into(),
			..Self::default()
		}
	}
}

impl Default for ConnectionConfig {
	fn default() -> Self {
		Self {
			server_url: DEFAULT_SERVER_URL.to_string(),
			account: String::new(),
			client_name: version::CLIENT_NAME.to_string(),
			client_version: version::CLIENT_VERSION.to_string(),
			reconnect: ReconnectPolicy::default(),
			reconnect_error_codes: DEFAULT_RECONNECT_ERROR_CODES.to_vec(),
		}
	}
}

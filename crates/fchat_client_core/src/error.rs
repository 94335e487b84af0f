#![forbid(unsafe_code)]

use fchat_protocol::FrameError;

/// Errors for client core operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientCoreError {
	/// The transport has no live connection.
	#[error("transport is not open")]
	NotOpen,

	/// The connection task is gone.
	#[error("connection manager has stopped")]
	Stopped,

	#[error("invalid server url: {0}")]
	InvalidUrl(String),

	/// Connection establishment failed.
	#[error("failed to connect: {0}")]
	Connect(String),

	/// Outbound frame could not be encoded.
	#[error(transparent)]
	Frame(#[from] FrameError),

	/// Ticket endpoint rejected the login or could not be reached.
	#[error("ticket request failed: {0}")]
	Ticket(String),

	#[error("http error: {0}")]
	Http(#[from] reqwest::Error),
}

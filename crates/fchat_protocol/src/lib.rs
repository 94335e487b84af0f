#![forbid(unsafe_code)]

pub mod client;
pub mod framing;
pub mod ids;
pub mod server;
pub mod system;

pub use client::{ClientCommand, Login};
pub use framing::{COMMAND_KEY, CommandCode, Frame, FrameError, PING, RawCommand, encode_frame, parse_frame};
pub use ids::{FlexId, FlexString};
pub use server::{DecodeError, ServerCommand};
pub use system::{Report, RoomVisibility, SystemMessageKind, classify_system_message, parse_report};

/// Client identification sent in the login frame.
pub mod version {
	/// Default `cname` value.
	pub const CLIENT_NAME: &str = "fchat-rs";
	/// Default `cversion` value.
	pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
}

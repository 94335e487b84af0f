#![forbid(unsafe_code)]

use core::fmt;

use fchat_domain::{CharacterStatus, ChannelMode, TypingStatus};
use serde_json::{Map, Value, json};

use crate::framing::{FrameError, encode_frame};
use crate::version;

/// Login handshake sent as soon as the transport opens.
#[derive(Clone, PartialEq, Eq)]
pub struct Login {
	pub account: String,
	pub ticket: String,
	pub character: String,
	pub client_name: String,
	pub client_version: String,
}

impl Login {
	pub fn new(account: impl Into<String>, ticket: impl Into<String>, character: impl Into<String>) -> Self {
		Self {
			account: account.into(),
			ticket: ticket.into(),
			character: character.into(),
			client_name: version::CLIENT_NAME.to_string(),
			client_version: version::CLIENT_VERSION.to_string(),
		}
	}
}

impl fmt::Debug for Login {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Login")
			.field("account", &self.account)
			.field("ticket", &"<redacted>")
			.field("character", &self.character)
			.field("client_name", &self.client_name)
			.field("client_version", &self.client_version)
			.finish()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreAction {
	Add,
	Delete,
	List,
}

impl IgnoreAction {
	pub fn as_str(&self) -> &'static str {
		match self {
			IgnoreAction::Add => "add",
			IgnoreAction::Delete => "delete",
			IgnoreAction::List => "list",
		}
	}
}

/// Commands this client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
	Identify(Login),
	Ping,
	JoinChannel { channel: String },
	LeaveChannel { channel: String },
	Message { channel: String, message: String },
	PrivateMessage { recipient: String, message: String },
	Ad { channel: String, message: String },
	Status { status: CharacterStatus, statusmsg: String },
	Typing { character: String, status: TypingStatus },
	PublicChannels,
	PrivateChannels,
	Uptime,
	Kick { channel: String, character: String },
	Ban { channel: String, character: String },
	Promote { channel: String, character: String },
	Demote { channel: String, character: String },
	SetDescription { channel: String, description: String },
	SetMode { channel: String, mode: ChannelMode },
	SetOpen { channel: String, open: bool },
	Invite { channel: String, character: String },
	Ignore { action: IgnoreAction, character: String },
	Roll { channel: String, dice: String },
	CreateRoom { title: String },
}

fn object(v: Value) -> Map<String, Value> {
	match v {
		Value::Object(map) => map,
		_ => Map::new(),
	}
}

impl ClientCommand {
	pub fn code(&self) -> &'static str {
		match self {
			ClientCommand::Identify(_) => "IDN",
			ClientCommand::Ping => "PIN",
			ClientCommand::JoinChannel { .. } => "JCH",
			ClientCommand::LeaveChannel { .. } => "LCH",
			ClientCommand::Message { .. } => "MSG",
			ClientCommand::PrivateMessage { .. } => "PRI",
			ClientCommand::Ad { .. } => "LRP",
			ClientCommand::Status { .. } => "STA",
			ClientCommand::Typing { .. } => "TPN",
			ClientCommand::PublicChannels => "CHA",
			ClientCommand::PrivateChannels => "ORS",
			ClientCommand::Uptime => "UPT",
			ClientCommand::Kick { .. } => "CKU",
			ClientCommand::Ban { .. } => "CBU",
			ClientCommand::Promote { .. } => "COA",
			ClientCommand::Demote { .. } => "COR",
			ClientCommand::SetDescription { .. } => "CDS",
			ClientCommand::SetMode { .. } => "RMO",
			ClientCommand::SetOpen { .. } => "RST",
			ClientCommand::Invite { .. } => "CIU",
			ClientCommand::Ignore { .. } => "IGN",
			ClientCommand::Roll { .. } => "RLL",
			ClientCommand::CreateRoom { .. } => "CCR",
		}
	}

	/// Argument map, or `None` for commands sent as a bare code.
	pub fn args(&self) -> Option<Map<String, Value>> {
		let value = match self {
			ClientCommand::Ping
			| ClientCommand::PublicChannels
			| ClientCommand::PrivateChannels
			| ClientCommand::Uptime => return None,
			ClientCommand::Identify(login) => json!({
				"method": "ticket",
				"account": login.account,
				"ticket": login.ticket,
				"character": login.character,
				"cname": login.client_name,
				"cversion": login.client_version,
			}),
			ClientCommand::JoinChannel { channel } | ClientCommand::LeaveChannel { channel } => {
				json!({ "channel": channel })
			}
			ClientCommand::Message { channel, message } | ClientCommand::Ad { channel, message } => {
				json!({ "channel": channel, "message": message })
			}
			ClientCommand::PrivateMessage { recipient, message } => {
				json!({ "recipient": recipient, "message": message })
			}
			ClientCommand::Status { status, statusmsg } => {
				json!({ "status": status.as_str(), "statusmsg": statusmsg })
			}
			ClientCommand::Typing { character, status } => {
				json!({ "character": character, "status": status.as_str() })
			}
			ClientCommand::Kick { channel, character }
			| ClientCommand::Ban { channel, character }
			| ClientCommand::Promote { channel, character }
			| ClientCommand::Demote { channel, character }
			| ClientCommand::Invite { channel, character } => {
				json!({ "channel": channel, "character": character })
			}
			ClientCommand::SetDescription { channel, description } => {
				json!({ "channel": channel, "description": description })
			}
			ClientCommand::SetMode { channel, mode } => json!({ "channel": channel, "mode": mode.as_str() }),
			ClientCommand::SetOpen { channel, open } => {
				let status = if *open { "public" } else { "private" };
				json!({ "channel": channel, "status": status })
			}
			ClientCommand::Ignore { action, character } => {
				json!({ "action": action.as_str(), "character": character })
			}
			ClientCommand::Roll { channel, dice } => json!({ "channel": channel, "dice": dice }),
			ClientCommand::CreateRoom { title } => json!({ "channel": title }),
		};
		Some(object(value))
	}

	/// Wire text for this command.
	pub fn to_frame(&self) -> Result<String, FrameError> {
		encode_frame(self.code(), self.args().as_ref())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bare_commands_have_no_payload() {
		for cmd in [
			ClientCommand::Ping,
			ClientCommand::PublicChannels,
			ClientCommand::PrivateChannels,
			ClientCommand::Uptime,
		] {
			assert_eq!(cmd.to_frame().unwrap(), cmd.code());
		}
	}

	#[test]
	fn login_frame_carries_handshake_fields() {
		let login = Login::new("acct", "tkt", "Alice");
		let args = ClientCommand::Identify(login).args().unwrap();
		assert_eq!(args["method"], "ticket");
		assert_eq!(args["account"], "acct");
		assert_eq!(args["ticket"], "tkt");
		assert_eq!(args["character"], "Alice");
		assert_eq!(args["cname"], version::CLIENT_NAME);
		assert!(args.contains_key("cversion"));
	}

	#[test]
	fn login_debug_hides_ticket() {
		let login = Login::new("acct", "super-secret", "Alice");
		let rendered = format!("{login:?}");
		assert!(!rendered.contains("super-secret"));
		assert!(rendered.contains("<redacted>"));
	}

	#[test]
	fn join_frame_shape() {
		let frame = ClientCommand::JoinChannel {
			channel: "Frontpage".into(),
		}
		.to_frame()
		.unwrap();
		assert_eq!(frame, r#"JCH {"channel":"Frontpage"}"#);
	}

	#[test]
	fn status_uses_wire_spelling() {
		let args = ClientCommand::Status {
			status: CharacterStatus::DoNotDisturb,
			statusmsg: "brb".into(),
		}
		.args()
		.unwrap();
		assert_eq!(args["status"], "dnd");
	}
}

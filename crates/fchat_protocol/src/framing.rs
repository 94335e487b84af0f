#![forbid(unsafe_code)]

use core::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// Reserved argument key carrying the command code inside a decoded map.
pub const COMMAND_KEY: &str = "command";

/// Keepalive code; a bare `PIN` must be echoed verbatim.
pub const PING: &str = "PIN";

#[derive(Debug, Error)]
pub enum FrameError {
	#[error("command code must be exactly 3 characters: {0:?}")]
	InvalidCodeLength(String),

	#[error("command code must be uppercase ASCII letters: {0:?}")]
	InvalidCode(String),

	#[error("missing separator between code and payload: {0:?}")]
	MissingSeparator(String),

	#[error("payload for {code} is not a JSON object")]
	NotAnObject {
		code: String,
	},

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Three-letter protocol tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandCode([u8; 3]);

impl CommandCode {
	/// Validate and build a code from its text form.
	pub fn parse(s: &str) -> Result<Self, FrameError> {
		let bytes = s.as_bytes();
		if bytes.len() != 3 {
			return Err(FrameError::InvalidCodeLength(s.to_string()));
		}
		if !bytes.iter().all(|b| b.is_ascii_uppercase()) {
			return Err(FrameError::InvalidCode(s.to_string()));
		}
		Ok(Self([bytes[0], bytes[1], bytes[2]]))
	}

	pub fn as_str(&self) -> &str {
		// Constructed only from validated ASCII.
		core::str::from_utf8(&self.0).unwrap_or("???")
	}

	pub fn is(&self, code: &str) -> bool {
		self.as_str() == code
	}
}

impl fmt::Debug for CommandCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "CommandCode({})", self.as_str())
	}
}

impl fmt::Display for CommandCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Inbound command with its loosely typed argument map.
///
/// `args` always carries the code under [`COMMAND_KEY`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommand {
	pub code: CommandCode,
	pub args: Map<String, Value>,
}

impl RawCommand {
	/// Build from a code and payload, injecting the reserved code key.
	pub fn new(code: CommandCode, mut args: Map<String, Value>) -> Self {
		args.insert(COMMAND_KEY.to_string(), Value::String(code.as_str().to_string()));
		Self { code, args }
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.args.get(key)
	}

	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.args.get(key).and_then(Value::as_str)
	}

	/// Argument map without the reserved code key.
	pub fn payload(&self) -> Map<String, Value> {
		let mut out = self.args.clone();
		out.remove(COMMAND_KEY);
		out
	}
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
	/// `CODE` with no payload (keepalive and a few oddities).
	Bare(CommandCode),
	/// `CODE {json}`.
	Command(RawCommand),
}

/// Decode one text frame.
pub fn parse_frame(text: &str) -> Result<Frame, FrameError> {
	let text = text.trim_end_matches(['\r', '\n']);
	let Some(code_str) = text.get(..3) else {
		return Err(FrameError::InvalidCodeLength(text.to_string()));
	};
	let code = CommandCode::parse(code_str)?;

	let rest = &text[3..];
	if rest.trim().is_empty() {
		return Ok(Frame::Bare(code));
	}
	if !rest.starts_with(char::is_whitespace) {
		return Err(FrameError::MissingSeparator(text.to_string()));
	}

	match serde_json::from_str::<Value>(rest.trim_start())? {
		Value::Object(map) => Ok(Frame::Command(RawCommand::new(code, map))),
		_ => Err(FrameError::NotAnObject {
			code: code.as_str().to_string(),
		}),
	}
}

/// Encode an outbound frame. `None` sends the bare code.
pub fn encode_frame(code: &str, args: Option<&Map<String, Value>>) -> Result<String, FrameError> {
	let code = CommandCode::parse(code)?;
	let Some(args) = args else {
		return Ok(code.as_str().to_string());
	};

	let payload = if args.contains_key(COMMAND_KEY) {
		let mut trimmed = args.clone();
		trimmed.remove(COMMAND_KEY);
		serde_json::to_string(&trimmed)?
	} else {
		serde_json::to_string(args)?
	};
	Ok(format!("{} {}", code.as_str(), payload))
}

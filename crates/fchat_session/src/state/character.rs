#![forbid(unsafe_code)]

use fchat_domain::{CharacterName, CharacterStatus, Gender, TypingStatus};
use fchat_protocol::Report;

#[derive(Debug, Clone, PartialEq)]
pub struct Character {
	pub name: CharacterName,
	pub gender: Gender,
	pub status: CharacterStatus,
	pub status_message: String,
	pub typing: TypingStatus,
	/// Last ad text seen, for dropping repeats.
	pub last_ad: Option<String>,
	pub last_report: Option<Report>,
}

impl Character {
	pub fn new(name: CharacterName) -> Self {
		Self {
			name,
			gender: Gender::default(),
			status: CharacterStatus::Online,
			status_message: String::new(),
			typing: TypingStatus::Clear,
			last_ad: None,
			last_report: None,
		}
	}

	/// Returns `false` when nothing changed.
	pub fn set_status(&mut self, status: CharacterStatus, message: &str) -> bool {
		if self.status == status && self.status_message == message {
			return false;
		}
		self.status = status;
		self.status_message = message.to_string();
		true
	}

	/// Returns `false` when nothing changed.
	pub fn set_typing(&mut self, typing: TypingStatus) -> bool {
		if self.typing == typing {
			return false;
		}
		self.typing = typing;
		true
	}

	/// Remember an ad; `false` if it repeats the previous one.
	pub fn record_ad(&mut self, text: &str) -> bool {
		if self.last_ad.as_deref() == Some(text) {
			return false;
		}
		self.last_ad = Some(text.to_string());
		true
	}
}

#![forbid(unsafe_code)]

use core::borrow::Borrow;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for parsing identifiers from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
	#[error("unknown value: {0}")]
	Unknown(String),
	#[error("reserved prefix in id: {0}")]
	Reserved(String),
}

/// Character name as shown to users.
///
/// Equality and hashing ignore case, so `Alice`, `alice` and `ALICE` are the
/// same character. The display form keeps the casing it was created with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterName(String);

impl CharacterName {
	/// Create a non-empty `CharacterName`.
	pub fn new(name: impl Into<String>) -> Result<Self, ParseIdError> {
		let name = name.into();
		if name.trim().is_empty() {
			return Err(ParseIdError::Empty);
		}
		Ok(Self(name))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}

	/// Lookup key used by rosters.
	pub fn key(&self) -> String {
		self.0.to_lowercase()
	}

	/// Case-insensitive comparison against a raw name.
	pub fn matches(&self, other: &str) -> bool {
		self.0.to_lowercase() == other.to_lowercase()
	}
}

impl PartialEq for CharacterName {
	fn eq(&self, other: &Self) -> bool {
		self.matches(&other.0)
	}
}

impl Eq for CharacterName {}

impl Hash for CharacterName {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.key().hash(state);
	}
}

impl fmt::Display for CharacterName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for CharacterName {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		CharacterName::new(s.to_string())
	}
}

/// Prefix reserved for private-message threads. Server channel ids never
/// start with it.
pub const PRIVATE_THREAD_PREFIX: &str = "pm:";

/// Stable machine id of a channel (public name, `ADH-...` room id, or
/// `pm:<partner>` for a private-message thread).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
	/// Create a non-empty `ChannelId`.
	pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
		let id = id.into();
		if id.trim().is_empty() {
			return Err(ParseIdError::Empty);
		}
		Ok(Self(id))
	}

	/// Id of a server channel. Rejects the private-thread prefix.
	pub fn server(id: impl Into<String>) -> Result<Self, ParseIdError> {
		let id = Self::new(id)?;
		if id.is_private_thread() {
			return Err(ParseIdError::Reserved(id.0));
		}
		Ok(id)
	}

	/// Private-message thread with `partner`. Case-folded, so every spelling
	/// of a name maps to the same thread.
	pub fn private(partner: &CharacterName) -> Self {
		Self(format!("{PRIVATE_THREAD_PREFIX}{}", partner.as_str().to_lowercase()))
	}

	pub fn is_private_thread(&self) -> bool {
		self.0.starts_with(PRIVATE_THREAD_PREFIX)
	}

	/// Lower-cased partner name of a private-message thread.
	pub fn private_partner(&self) -> Option<&str> {
		self.0.strip_prefix(PRIVATE_THREAD_PREFIX)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for ChannelId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for ChannelId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ChannelId::new(s.to_string())
	}
}

impl Borrow<str> for ChannelId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

/// Declares a wire enum with a stable string form and a lenient parser.
///
/// Unknown wire values fall back to `$fallback` when decoded through serde so
/// a new server value never fails a whole command.
macro_rules! wire_enum {
	(
		$(#[$meta:meta])*
		$name:ident, fallback = $fallback:ident {
			$($variant:ident => $wire:literal),+ $(,)?
		}
	) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(from = "String", into = "String")]
		pub enum $name {
			$($variant),+
		}

		impl $name {
			/// Stable wire identifier.
			pub const fn as_str(self) -> &'static str {
				match self {
					$(Self::$variant => $wire),+
				}
			}
		}

		impl Default for $name {
			fn default() -> Self {
				Self::$fallback
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(self.as_str())
			}
		}

		impl FromStr for $name {
			type Err = ParseIdError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				let s = s.trim();
				if s.is_empty() {
					return Err(ParseIdError::Empty);
				}
				let lower = s.to_ascii_lowercase();
				$(
					if lower == $wire.to_ascii_lowercase() {
						return Ok(Self::$variant);
					}
				)+
				Err(ParseIdError::Unknown(s.to_string()))
			}
		}

		impl From<String> for $name {
			fn from(s: String) -> Self {
				s.parse().unwrap_or_default()
			}
		}

		impl From<$name> for String {
			fn from(v: $name) -> Self {
				v.as_str().to_string()
			}
		}
	};
}

wire_enum! {
	/// Character gender as reported by the server.
	Gender, fallback = Unspecified {
		Male => "Male",
		Female => "Female",
		Transgender => "Transgender",
		Herm => "Herm",
		MaleHerm => "Male-Herm",
		Cuntboy => "Cunt-boy",
		Shemale => "Shemale",
		Unspecified => "None",
	}
}

wire_enum! {
	/// Presence status.
	CharacterStatus, fallback = Online {
		Online => "online",
		Looking => "looking",
		Busy => "busy",
		DoNotDisturb => "dnd",
		Idle => "idle",
		Away => "away",
		Crown => "crown",
		Offline => "offline",
	}
}

wire_enum! {
	/// Private-message typing indicator.
	TypingStatus, fallback = Clear {
		Clear => "clear",
		Paused => "paused",
		Typing => "typing",
	}
}

wire_enum! {
	/// Which message kinds a channel accepts.
	ChannelMode, fallback = Both {
		Chat => "chat",
		Ads => "ads",
		Both => "both",
	}
}

/// Channel visibility/kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
	/// Official public room.
	Public,
	/// User-created room that is listed publicly.
	Private,
	/// User-created room that requires an invite.
	InviteOnly,
	/// Synthetic client-side room (home/console).
	Utility,
	/// One-to-one private message thread.
	PrivateMessage,
}

impl ChannelKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			ChannelKind::Public => "public",
			ChannelKind::Private => "private",
			ChannelKind::InviteOnly => "invite_only",
			ChannelKind::Utility => "utility",
			ChannelKind::PrivateMessage => "private_message",
		}
	}

	/// True for rooms that live on the server (everything but PMs and utility rooms).
	pub const fn is_general(self) -> bool {
		matches!(self, ChannelKind::Public | ChannelKind::Private | ChannelKind::InviteOnly)
	}
}

impl fmt::Display for ChannelKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#![forbid(unsafe_code)]

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use fchat_domain::{CharacterName, ChannelId, ChannelKind, ChannelMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
	Normal,
	Ad,
	Roll,
	/// Replayed from the chat log.
	Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
	pub at: DateTime<Utc>,
	pub kind: LineKind,
	pub sender: String,
	pub text: String,
}

impl ChatLine {
	pub fn new(kind: LineKind, sender: impl Into<String>, text: impl Into<String>) -> Self {
		Self {
			at: Utc::now(),
			kind,
			sender: sender.into(),
			text: text.into(),
		}
	}

	/// Single-line form written to the chat log.
	pub fn render(&self) -> String {
		match self.kind {
			LineKind::Normal => format!("{}: {}", self.sender, self.text),
			LineKind::Ad => format!("[ad] {}: {}", self.sender, self.text),
			LineKind::Roll | LineKind::Log => self.text.clone(),
		}
	}
}

/// Settings that have their first value applied silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Initialized {
	pub description: bool,
	pub mode: bool,
	pub kind: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
	pub mention_alerts: bool,
}

impl Default for ChannelSettings {
	fn default() -> Self {
		Self { mention_alerts: true }
	}
}

#[derive(Debug, Clone)]
pub struct Channel {
	pub id: ChannelId,
	/// Display label; may differ from the id.
	pub title: String,
	pub kind: ChannelKind,
	pub mode: ChannelMode,
	pub description: String,
	pub member_count: u64,
	/// Owner first when known.
	pub moderators: Vec<String>,
	pub bans: Vec<String>,
	pub is_joined: bool,
	pub initialized: Initialized,
	pub settings: ChannelSettings,
	members: HashSet<CharacterName>,
	history: VecDeque<ChatLine>,
	history_cap: usize,
}

impl Channel {
	pub fn new(id: ChannelId, title: impl Into<String>, kind: ChannelKind, history_cap: usize) -> Self {
		Self {
			id,
			title: title.into(),
			kind,
			mode: ChannelMode::default(),
			description: String::new(),
			member_count: 0,
			moderators: Vec::new(),
			bans: Vec::new(),
			is_joined: false,
			initialized: Initialized::default(),
			settings: ChannelSettings::default(),
			members: HashSet::new(),
			history: VecDeque::new(),
			history_cap,
		}
	}

	fn sync_count(&mut self) {
		if self.is_joined {
			self.member_count = self.members.len() as u64;
		}
	}

	pub fn add_member(&mut self, name: CharacterName) -> bool {
		let added = self.members.insert(name);
		self.sync_count();
		added
	}

	pub fn remove_member(&mut self, name: &str) -> bool {
		let Ok(key) = CharacterName::new(name) else {
			return false;
		};
		let removed = self.members.remove(&key);
		self.sync_count();
		removed
	}

	pub fn has_member(&self, name: &str) -> bool {
		CharacterName::new(name).is_ok_and(|key| self.members.contains(&key))
	}

	pub fn members(&self) -> impl Iterator<Item = &CharacterName> {
		self.members.iter()
	}

	pub fn set_members(&mut self, members: impl IntoIterator<Item = CharacterName>) {
		self.members = members.into_iter().collect();
		self.sync_count();
	}

	/// Mark left and forget the roster.
	pub fn leave(&mut self) {
		self.is_joined = false;
		self.members.clear();
	}

	pub fn owner(&self) -> Option<&str> {
		self.moderators.first().map(String::as_str).filter(|o| !o.is_empty())
	}

	pub fn is_moderator(&self, name: &str) -> bool {
		self.moderators.iter().any(|m| m.eq_ignore_ascii_case(name))
	}

	pub fn add_moderator(&mut self, name: &str) -> bool {
		if self.is_moderator(name) {
			return false;
		}
		self.moderators.push(name.to_string());
		true
	}

	pub fn remove_moderator(&mut self, name: &str) -> bool {
		let before = self.moderators.len();
		self.moderators.retain(|m| !m.eq_ignore_ascii_case(name));
		before != self.moderators.len()
	}

	pub fn set_owner(&mut self, name: &str) {
		self.moderators.retain(|m| !m.eq_ignore_ascii_case(name) && !m.is_empty());
		self.moderators.insert(0, name.to_string());
	}

	pub fn add_ban(&mut self, name: &str) {
		if !self.bans.iter().any(|b| b.eq_ignore_ascii_case(name)) {
			self.bans.push(name.to_string());
		}
	}

	pub fn push_line(&mut self, line: ChatLine) {
		if self.history_cap == 0 {
			return;
		}
		while self.history.len() >= self.history_cap {
			self.history.pop_front();
		}
		self.history.push_back(line);
	}

	pub fn history(&self) -> impl Iterator<Item = &ChatLine> {
		self.history.iter()
	}

	pub fn history_len(&self) -> usize {
		self.history.len()
	}
}

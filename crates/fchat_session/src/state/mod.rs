#![forbid(unsafe_code)]

//! Shared chat model: account, characters, channels and the notification log.
//!
//! Mutated only from the dispatcher task; other readers take the read lock
//! and must tolerate seeing state between two commands.

mod channel;
mod character;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use fchat_domain::{CharacterName, ChannelId, ChannelKind, PRIVATE_THREAD_PREFIX};
use parking_lot::RwLock;
use serde_json::Value;

pub use channel::{Channel, ChannelSettings, ChatLine, Initialized, LineKind};
pub use character::Character;

use crate::events::Notification;

pub type SharedState = Arc<RwLock<ChatState>>;

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 500;
pub const DEFAULT_HISTORY_CAPACITY: usize = 300;

#[derive(Debug, Clone, Default)]
pub struct Account {
	pub name: String,
	/// Characters the account may log in as.
	pub characters: Vec<String>,
	/// Character this session is logged in as.
	pub current: Option<CharacterName>,
	pub friends: HashSet<CharacterName>,
	pub bookmarks: HashSet<CharacterName>,
	pub ignored: HashSet<CharacterName>,
	pub global_moderators: HashSet<CharacterName>,
}

impl Account {
	pub fn is_self(&self, name: &str) -> bool {
		self.current.as_ref().is_some_and(|c| c.matches(name))
	}

	pub fn is_ignored(&self, name: &str) -> bool {
		CharacterName::new(name).is_ok_and(|n| self.ignored.contains(&n))
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerUptime {
	pub started: Option<u64>,
	pub started_text: Option<String>,
	pub accepted: u64,
	pub channels: u64,
	pub users: u64,
	pub max_users: u64,
}

#[derive(Debug)]
pub struct ChatState {
	pub account: Account,
	pub authenticated: bool,
	pub server_vars: BTreeMap<String, Value>,
	pub uptime: Option<ServerUptime>,
	pub online_count: u64,
	characters: HashMap<String, Character>,
	channels: BTreeMap<ChannelId, Channel>,
	current_channel: Option<ChannelId>,
	notifications: VecDeque<Notification>,
	notification_cap: usize,
	history_cap: usize,
}

impl Default for ChatState {
	fn default() -> Self {
		Self::new(DEFAULT_NOTIFICATION_CAPACITY, DEFAULT_HISTORY_CAPACITY)
	}
}

impl ChatState {
	pub fn new(notification_cap: usize, history_cap: usize) -> Self {
		Self {
			account: Account::default(),
			authenticated: false,
			server_vars: BTreeMap::new(),
			uptime: None,
			online_count: 0,
			characters: HashMap::new(),
			channels: BTreeMap::new(),
			current_channel: None,
			notifications: VecDeque::new(),
			notification_cap,
			history_cap,
		}
	}

	pub fn shared(self) -> SharedState {
		Arc::new(RwLock::new(self))
	}

	// Characters

	pub fn find_character(&self, name: &str) -> Option<&Character> {
		self.characters.get(&name.to_lowercase())
	}

	pub fn find_character_mut(&mut self, name: &str) -> Option<&mut Character> {
		self.characters.get_mut(&name.to_lowercase())
	}

	/// Existing entry for `name`, or a fresh one.
	pub fn upsert_character(&mut self, name: CharacterName) -> &mut Character {
		self.characters
			.entry(name.key())
			.or_insert_with(|| Character::new(name))
	}

	pub fn remove_character(&mut self, name: &str) -> Option<Character> {
		self.characters.remove(&name.to_lowercase())
	}

	pub fn character_count(&self) -> usize {
		self.characters.len()
	}

	pub fn characters(&self) -> impl Iterator<Item = &Character> {
		self.characters.values()
	}

	// Channels

	pub fn find_channel(&self, id: &str) -> Option<&Channel> {
		self.channels.get(id)
	}

	pub fn find_channel_mut(&mut self, id: &str) -> Option<&mut Channel> {
		self.channels.get_mut(id)
	}

	pub fn has_channel(&self, id: &str) -> bool {
		self.channels.contains_key(id)
	}

	/// Lookup by a channel name taken from the wire. Never resolves to a
	/// private-message thread.
	pub fn find_room(&self, name: &str) -> Option<&Channel> {
		if name.starts_with(PRIVATE_THREAD_PREFIX) {
			return None;
		}
		self.channels.get(name)
	}

	pub fn find_room_mut(&mut self, name: &str) -> Option<&mut Channel> {
		if name.starts_with(PRIVATE_THREAD_PREFIX) {
			return None;
		}
		self.channels.get_mut(name)
	}

	/// Existing channel `id`, or a new one with the given title and kind.
	///
	/// Private-message threads live under [`ChannelId::private`] ids, so a
	/// thread and a room never share an entry.
	pub fn channel_entry(&mut self, id: ChannelId, title: &str, kind: ChannelKind) -> &mut Channel {
		debug_assert_eq!(id.is_private_thread(), kind == ChannelKind::PrivateMessage);
		let cap = self.history_cap;
		self.channels
			.entry(id.clone())
			.or_insert_with(|| Channel::new(id, title, kind, cap))
	}

	pub fn remove_channel(&mut self, id: &str) -> Option<Channel> {
		if self.current_channel.as_ref().is_some_and(|c| c.as_str() == id) {
			self.current_channel = None;
		}
		self.channels.remove(id)
	}

	pub fn channels(&self) -> impl Iterator<Item = &Channel> {
		self.channels.values()
	}

	pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
		self.channels.values_mut()
	}

	pub fn joined_channels(&self) -> impl Iterator<Item = &Channel> {
		self.channels.values().filter(|c| c.is_joined)
	}

	pub fn current_channel(&self) -> Option<&ChannelId> {
		self.current_channel.as_ref()
	}

	/// Select a known channel; `None` clears the selection.
	pub fn select_channel(&mut self, id: Option<&str>) -> bool {
		match id {
			None => {
				self.current_channel = None;
				true
			}
			Some(id) => match self.channels.get(id) {
				Some(channel) => {
					self.current_channel = Some(channel.id.clone());
					true
				}
				None => false,
			},
		}
	}

	// Notifications

	pub fn push_notification(&mut self, notification: Notification) {
		if self.notification_cap == 0 {
			return;
		}
		while self.notifications.len() >= self.notification_cap {
			self.notifications.pop_front();
		}
		self.notifications.push_back(notification);
	}

	pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
		self.notifications.iter()
	}

	pub fn notification_count(&self) -> usize {
		self.notifications.len()
	}
}

#![forbid(unsafe_code)]

//! Typed update records and the broadcast bus that carries them.

use chrono::{DateTime, Utc};
use fchat_client_core::ConnectionEvent;
use fchat_domain::{CharacterStatus, ChannelId, ChannelKind, ChannelMode, TypingStatus};
use fchat_protocol::Report;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::state::LineKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
	Friends,
	Bookmarks,
	Ignored,
	GlobalModerators,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
	Kick,
	Ban,
	Timeout { minutes: u64 },
}

/// Something that happened in the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
	LoginStateChanged {
		character: String,
		online: bool,
	},
	StatusChanged {
		character: String,
		status: CharacterStatus,
		message: String,
	},
	TypingChanged {
		character: String,
		status: TypingStatus,
	},
	JoinLeft {
		channel: ChannelId,
		character: String,
		joined: bool,
		/// Set when a global disconnect already reported this.
		ignore_update: bool,
	},
	/// `channel` is `None` for global moderator changes.
	PromoteDemote {
		channel: Option<ChannelId>,
		character: String,
		promoted: bool,
	},
	OwnerChanged {
		channel: ChannelId,
		character: String,
	},
	Moderation {
		channel: ChannelId,
		action: ModerationAction,
		operator: String,
		target: String,
	},
	ReportFiled {
		call_id: String,
		reporter: String,
		report: Report,
		log_id: Option<u64>,
	},
	ReportHandled {
		call_id: String,
		moderator: String,
		reporter: String,
	},
	Invite {
		sender: String,
		channel: ChannelId,
		title: String,
	},
	Mention {
		channel: ChannelId,
		character: String,
		keyword: String,
		message: String,
	},
	ListChanged {
		list: ListKind,
		character: String,
		added: bool,
	},
	ChannelDescriptionChanged {
		channel: ChannelId,
		description: String,
	},
	ChannelModeChanged {
		channel: ChannelId,
		mode: ChannelMode,
	},
	ChannelKindChanged {
		channel: ChannelId,
		kind: ChannelKind,
	},
	Message {
		channel: ChannelId,
		sender: String,
		kind: LineKind,
		text: String,
	},
	Note {
		sender: String,
		subject: String,
		id: u64,
	},
	Comment {
		commenter: String,
		target_type: String,
		target: String,
		target_id: u64,
		id: u64,
		parent_id: u64,
	},
	FriendRequest {
		character: String,
	},
	Broadcast {
		sender: Option<String>,
		message: String,
	},
	System {
		channel: Option<ChannelId>,
		message: String,
	},
	Error {
		number: u64,
		message: String,
	},
	Connection(ConnectionEvent),
}

/// An [`Update`] stamped with identity and time. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
	pub id: Uuid,
	pub at: DateTime<Utc>,
	pub update: Update,
}

impl Notification {
	pub fn new(update: Update) -> Self {
		Self {
			id: Uuid::new_v4(),
			at: Utc::now(),
			update,
		}
	}
}

/// Fan-out of notifications to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
	tx: broadcast::Sender<Notification>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self { tx }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
		self.tx.subscribe()
	}

	/// Deliver to current subscribers; having none is fine.
	pub fn publish(&self, notification: Notification) {
		let _ = self.tx.send(notification);
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}

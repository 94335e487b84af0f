#![forbid(unsafe_code)]

//! Inbound command interpreter.
//!
//! One handler per command, grouped by family. Handlers mutate [`ChatState`]
//! under the write lock, publish [`Update`]s and may ask for a requeue when
//! the channel they refer to is not known yet.

mod channels;
mod lists;
mod login;
mod messages;
mod moderation;
mod notices;
mod roster;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use fchat_client_core::{ClientCoreError, ConnectionHandle};
use fchat_domain::{CharacterName, ChannelId, ChannelKind, ParseIdError};
use fchat_protocol::{ClientCommand, DecodeError, RawCommand, ServerCommand};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::events::{EventBus, ModerationAction, Notification, Update};
use crate::logger::ChatLogger;
use crate::queue::{CommandHandler, Disposition};
use crate::session::Collaborators;
use crate::settings::SettingsStore;
use crate::state::{ChatState, SharedState};

#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
	#[error("missing argument: {0}")]
	MissingArgument(&'static str),

	#[error("invalid value for {field}: {reason}")]
	InvalidValue { field: &'static str, reason: String },

	#[error("invalid identifier: {0}")]
	Id(#[from] ParseIdError),

	#[error(transparent)]
	Decode(#[from] DecodeError),

	#[error("collaborator failure: {0}")]
	Collaborator(String),
}

/// Where handlers send outbound commands.
pub trait Outbox: Send + Sync + 'static {
	fn send(&self, command: ClientCommand) -> Result<(), ClientCoreError>;
}

impl Outbox for ConnectionHandle {
	fn send(&self, command: ClientCommand) -> Result<(), ClientCoreError> {
		ConnectionHandle::send(self, &command)
	}
}

/// Interpreter tunables.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
	pub auto_join_interval: Duration,
	pub mention_keywords: Vec<String>,
	/// Shown instead of our own name as a moderation target.
	pub self_sentinel: String,
	pub remember_channels: bool,
}

impl Default for InterpreterConfig {
	fn default() -> Self {
		Self::from(&SessionConfig::default())
	}
}

impl From<&SessionConfig> for InterpreterConfig {
	fn from(cfg: &SessionConfig) -> Self {
		Self {
			auto_join_interval: cfg.auto_join_interval,
			mention_keywords: cfg.mention_keywords.clone(),
			self_sentinel: cfg.self_sentinel.clone(),
			remember_channels: cfg.remember_channels,
		}
	}
}

pub struct Interpreter {
	cfg: InterpreterConfig,
	state: SharedState,
	bus: EventBus,
	outbox: Arc<dyn Outbox>,
	logger: Arc<dyn ChatLogger>,
	settings: Arc<dyn SettingsStore>,
	auto_join: Option<JoinHandle<()>>,
}

impl Interpreter {
	pub fn new(
		cfg: InterpreterConfig,
		state: SharedState,
		bus: EventBus,
		outbox: Arc<dyn Outbox>,
		collaborators: Collaborators,
	) -> Self {
		Self {
			cfg,
			state,
			bus,
			outbox,
			logger: collaborators.logger,
			settings: collaborators.settings,
			auto_join: None,
		}
	}

	pub fn state(&self) -> &SharedState {
		&self.state
	}

	/// Route one decoded command to its handler.
	pub fn interpret(&mut self, command: ServerCommand) -> Result<Disposition, InterpretError> {
		match command {
			ServerCommand::Identify(c) => self.on_identify(c),
			ServerCommand::Variable(c) => self.on_variable(c),
			ServerCommand::Hello(c) => self.on_hello(c),
			ServerCommand::ConnectedCount(c) => self.on_connected_count(c),
			ServerCommand::Uptime(c) => self.on_uptime(c),

			ServerCommand::Friends(c) => self.on_friends(c),
			ServerCommand::Ignore(c) => self.on_ignore(c),
			ServerCommand::GlobalOps(c) => self.on_global_ops(c),
			ServerCommand::GlobalPromote(c) => self.on_global_promote(c, true),
			ServerCommand::GlobalDemote(c) => self.on_global_promote(c, false),

			ServerCommand::Roster(c) => self.on_roster(c),
			ServerCommand::Online(c) => self.on_online(c),
			ServerCommand::Offline(c) => self.on_offline(c),
			ServerCommand::Status(c) => self.on_status(c),
			ServerCommand::Typing(c) => self.on_typing(c),

			ServerCommand::PublicChannels(c) => self.on_public_channels(c),
			ServerCommand::PrivateChannels(c) => self.on_private_channels(c),
			ServerCommand::Join(c) => self.on_join(c),
			ServerCommand::Leave(c) => self.on_leave(c),
			ServerCommand::InitialChannelData(c) => self.on_initial_data(c),
			ServerCommand::ChannelOps(c) => self.on_channel_ops(c),
			ServerCommand::Description(c) => self.on_description(c),
			ServerCommand::ModeChange(c) => self.on_mode(c),
			ServerCommand::ChannelStatus(c) => self.on_channel_status(c),

			ServerCommand::Kick(c) => self.on_moderation(c, ModerationAction::Kick),
			ServerCommand::Ban(c) => self.on_moderation(c, ModerationAction::Ban),
			ServerCommand::Timeout(c) => {
				let minutes = c.length.map(|l| l.get()).unwrap_or_default();
				self.on_moderation(c, ModerationAction::Timeout { minutes })
			}
			ServerCommand::Promote(c) => self.on_channel_promote(c, true),
			ServerCommand::Demote(c) => self.on_channel_promote(c, false),
			ServerCommand::SetOwner(c) => self.on_set_owner(c),

			ServerCommand::Message(c) => self.on_message(c),
			ServerCommand::PrivateMessage(c) => self.on_private_message(c),
			ServerCommand::Ad(c) => self.on_ad(c),
			ServerCommand::Roll(c) => self.on_roll(c),

			ServerCommand::System(c) => self.on_system(c),
			ServerCommand::Error(c) => self.on_error(c),
			ServerCommand::Broadcast(c) => self.on_broadcast(c),
			ServerCommand::Invite(c) => self.on_invite(c),
			ServerCommand::StaffCall(c) => self.on_staff_call(c),
			ServerCommand::Bridge(c) => self.on_bridge(c),

			ServerCommand::Unknown(raw) => {
				debug!(code = %raw.code, "unhandled command");
				Ok(Disposition::Done)
			}
		}
	}

	/// Record `update` in the notification log and broadcast it.
	pub(crate) fn emit(&self, st: &mut ChatState, update: Update) {
		let notification = Notification::new(update);
		st.push_notification(notification.clone());
		self.bus.publish(notification);
	}

	pub(crate) fn send(&self, command: ClientCommand) {
		let code = command.code();
		if let Err(e) = self.outbox.send(command) {
			warn!(code, error = %e, "failed to send command");
		}
	}

	fn add_saved_channel(&self, id: &ChannelId) {
		if !self.cfg.remember_channels {
			return;
		}
		let mut saved = self.settings.saved_channels();
		if saved.iter().any(|c| c == id.as_str()) {
			return;
		}
		saved.push(id.as_str().to_string());
		self.settings.set_saved_channels(&saved);
	}

	fn remove_saved_channel(&self, id: &ChannelId) {
		if !self.cfg.remember_channels {
			return;
		}
		let mut saved = self.settings.saved_channels();
		let before = saved.len();
		saved.retain(|c| c != id.as_str());
		if saved.len() != before {
			self.settings.set_saved_channels(&saved);
		}
	}

	/// Display form of a moderation target.
	fn target_display(&self, st: &ChatState, name: &str) -> String {
		if st.account.is_self(name) {
			self.cfg.self_sentinel.clone()
		} else {
			name.to_string()
		}
	}
}

impl Drop for Interpreter {
	fn drop(&mut self) {
		if let Some(task) = self.auto_join.take() {
			task.abort();
		}
	}
}

impl CommandHandler for Interpreter {
	type Error = InterpretError;

	fn handle(&mut self, command: &RawCommand) -> Result<Disposition, InterpretError> {
		let typed = ServerCommand::decode(command.clone())?;
		self.interpret(typed)
	}
}

fn character_name(raw: &str) -> Result<CharacterName, InterpretError> {
	Ok(CharacterName::new(raw)?)
}

fn channel_id(raw: &str) -> Result<ChannelId, InterpretError> {
	Ok(ChannelId::server(raw)?)
}

/// Kind for a channel first seen through a join.
fn kind_for_new_channel(id: &str) -> ChannelKind {
	if id.starts_with("ADH-") {
		ChannelKind::Private
	} else {
		ChannelKind::Public
	}
}

/// First name or keyword that `text` mentions, case-insensitively.
fn find_mention(text: &str, me: Option<&CharacterName>, keywords: &[String]) -> Option<String> {
	let lower = text.to_lowercase();
	me.map(|m| m.as_str().to_string())
		.into_iter()
		.chain(keywords.iter().cloned())
		.filter(|k| !k.trim().is_empty())
		.find(|k| lower.contains(&k.to_lowercase()))
}

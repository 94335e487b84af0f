#![forbid(unsafe_code)]

use fchat_domain::{ChannelId, ChannelKind, TypingStatus};
use fchat_protocol::server::{ChannelMessage, PrivateMessage, Roll};
use tracing::debug;

use super::{InterpretError, Interpreter, channel_id, character_name, find_mention};
use crate::events::Update;
use crate::queue::Disposition;
use crate::state::{ChatLine, ChatState, LineKind};

impl Interpreter {
	/// Append a line to a known channel, log it and publish the message.
	fn record_line(&self, st: &mut ChatState, id: &ChannelId, line: ChatLine) {
		let Some(channel) = st.find_channel_mut(id.as_str()) else {
			return;
		};
		self.logger.log_message(&channel.title, id, &line);
		channel.push_line(line.clone());

		self.emit(
			st,
			Update::Message {
				channel: id.clone(),
				sender: line.sender,
				kind: line.kind,
				text: line.text,
			},
		);
	}

	/// Conversation channel with `other`, created and marked joined on demand.
	fn private_channel(&self, st: &mut ChatState, other: &str) -> Result<ChannelId, InterpretError> {
		let name = character_name(other)?;
		let id = ChannelId::private(&name);
		let channel = st.channel_entry(id.clone(), other, ChannelKind::PrivateMessage);
		channel.is_joined = true;
		channel.add_member(name);
		Ok(id)
	}

	pub(super) fn on_message(&mut self, cmd: ChannelMessage) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		let Some(channel) = st.find_room(&cmd.channel) else {
			return Ok(Disposition::Requeue);
		};
		let id = channel.id.clone();
		let alerts = channel.settings.mention_alerts;

		if st.account.is_ignored(&cmd.character) {
			debug!(channel = %id, character = %cmd.character, "dropping message from ignored character");
			return Ok(Disposition::Done);
		}

		let line = ChatLine::new(LineKind::Normal, cmd.character.as_str(), cmd.message.as_str());
		self.record_line(&mut st, &id, line);

		if alerts && !st.account.is_self(&cmd.character) {
			let me = st.account.current.clone();
			if let Some(keyword) = find_mention(&cmd.message, me.as_ref(), &self.cfg.mention_keywords) {
				self.emit(
					&mut st,
					Update::Mention {
						channel: id,
						character: cmd.character,
						keyword,
						message: cmd.message,
					},
				);
			}
		}
		Ok(Disposition::Done)
	}

	pub(super) fn on_private_message(&mut self, cmd: PrivateMessage) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		if st.account.is_ignored(&cmd.character) {
			debug!(character = %cmd.character, "dropping private message from ignored character");
			return Ok(Disposition::Done);
		}

		let id = self.private_channel(&mut st, &cmd.character)?;
		if let Some(sender) = st.find_character_mut(&cmd.character) {
			sender.set_typing(TypingStatus::Clear);
		}

		let line = ChatLine::new(LineKind::Normal, cmd.character, cmd.message);
		self.record_line(&mut st, &id, line);
		Ok(Disposition::Done)
	}

	pub(super) fn on_ad(&mut self, cmd: ChannelMessage) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		let Some(id) = st.find_room(&cmd.channel).map(|c| c.id.clone()) else {
			return Ok(Disposition::Requeue);
		};
		if st.account.is_ignored(&cmd.character) {
			return Ok(Disposition::Done);
		}

		let name = character_name(&cmd.character)?;
		if !st.upsert_character(name).record_ad(&cmd.message) {
			debug!(channel = %id, character = %cmd.character, "repeated ad");
			return Ok(Disposition::Done);
		}

		let line = ChatLine::new(LineKind::Ad, cmd.character, cmd.message);
		self.record_line(&mut st, &id, line);
		Ok(Disposition::Done)
	}

	/// Dice and bottle results, either in a channel or a private conversation.
	pub(super) fn on_roll(&mut self, cmd: Roll) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		let id = match (&cmd.channel, &cmd.recipient) {
			(Some(channel), _) => {
				let id = channel_id(channel)?;
				if !st.has_channel(id.as_str()) {
					return Ok(Disposition::Requeue);
				}
				id
			}
			(None, Some(recipient)) => {
				let other = if st.account.is_self(&cmd.character) {
					recipient.as_str()
				} else {
					cmd.character.as_str()
				};
				self.private_channel(&mut st, other)?
			}
			(None, None) => return Err(InterpretError::MissingArgument("channel")),
		};

		let line = ChatLine::new(LineKind::Roll, cmd.character, cmd.message);
		self.record_line(&mut st, &id, line);
		Ok(Disposition::Done)
	}
}

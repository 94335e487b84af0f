#![forbid(unsafe_code)]

use fchat_domain::{CharacterName, ChannelKind};
use fchat_protocol::server::{
	ChannelDescription, ChannelInitial, ChannelJoin, ChannelLeave, ChannelModeChange, ChannelOps, ChannelStatusChange,
	PrivateChannelList, PublicChannelList,
};
use tracing::debug;

use super::{InterpretError, Interpreter, channel_id, character_name, kind_for_new_channel};
use crate::events::Update;
use crate::queue::Disposition;
use crate::state::{ChatLine, LineKind};

impl Interpreter {
	pub(super) fn on_public_channels(&mut self, cmd: PublicChannelList) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		for entry in cmd.channels {
			let Ok(id) = channel_id(&entry.name) else {
				continue;
			};
			let channel = st.channel_entry(id, &entry.name, ChannelKind::Public);
			channel.mode = entry.mode;
			if !channel.is_joined {
				channel.member_count = entry.characters.get();
			}
		}
		Ok(Disposition::Done)
	}

	pub(super) fn on_private_channels(&mut self, cmd: PrivateChannelList) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		for entry in cmd.channels {
			let Ok(id) = channel_id(&entry.name) else {
				continue;
			};
			let title = if entry.title.is_empty() { entry.name.clone() } else { entry.title };
			let channel = st.channel_entry(id, &title, ChannelKind::Private);
			channel.title = title;
			if !channel.is_joined {
				channel.member_count = entry.characters.get();
			}
		}
		Ok(Disposition::Done)
	}

	pub(super) fn on_join(&mut self, cmd: ChannelJoin) -> Result<Disposition, InterpretError> {
		let id = channel_id(&cmd.channel)?;
		let who = character_name(&cmd.character.identity)?;
		let mut st = self.state.write();

		if st.account.is_self(who.as_str()) {
			let title = cmd.title.clone().unwrap_or_else(|| cmd.channel.clone());
			let channel = st.channel_entry(id.clone(), &title, kind_for_new_channel(&cmd.channel));
			if cmd.title.is_some() {
				channel.title = title;
			}
			let was_joined = channel.is_joined;
			channel.is_joined = true;
			channel.add_member(who.clone());

			if !was_joined && channel.history_len() == 0 {
				for line in self.logger.get_logs(&channel.title, &id) {
					channel.push_line(ChatLine::new(LineKind::Log, "", line));
				}
			}

			if st.current_channel().is_none() {
				st.select_channel(Some(id.as_str()));
			}
			self.add_saved_channel(&id);
			self.emit(
				&mut st,
				Update::JoinLeft {
					channel: id,
					character: cmd.character.identity,
					joined: true,
					ignore_update: false,
				},
			);
			return Ok(Disposition::Done);
		}

		let Some(channel) = st.find_channel_mut(id.as_str()).filter(|c| c.is_joined) else {
			debug!(channel = %id, character = %who, "join for a channel we are not in yet");
			return Ok(Disposition::Requeue);
		};
		if channel.add_member(who.clone()) {
			st.upsert_character(who);
			self.emit(
				&mut st,
				Update::JoinLeft {
					channel: id,
					character: cmd.character.identity,
					joined: true,
					ignore_update: false,
				},
			);
		}
		Ok(Disposition::Done)
	}

	pub(super) fn on_leave(&mut self, cmd: ChannelLeave) -> Result<Disposition, InterpretError> {
		let id = channel_id(&cmd.channel)?;
		let mut st = self.state.write();
		let is_self = st.account.is_self(&cmd.character);

		// A listed room we have not joined yet gets its member list from ICH,
		// so a leave seen before then has to wait for it.
		let Some(channel) = st.find_channel_mut(id.as_str()).filter(|c| is_self || c.is_joined) else {
			debug!(channel = %id, character = %cmd.character, "leave for a channel we are not in yet");
			return Ok(Disposition::Requeue);
		};

		let changed = if is_self {
			let was_joined = channel.is_joined;
			channel.leave();
			was_joined
		} else {
			channel.remove_member(&cmd.character)
		};

		if is_self {
			if st.current_channel() == Some(&id) {
				st.select_channel(None);
			}
			self.remove_saved_channel(&id);
		}
		if changed {
			self.emit(
				&mut st,
				Update::JoinLeft {
					channel: id,
					character: cmd.character,
					joined: false,
					ignore_update: false,
				},
			);
		}
		Ok(Disposition::Done)
	}

	pub(super) fn on_initial_data(&mut self, cmd: ChannelInitial) -> Result<Disposition, InterpretError> {
		let id = channel_id(&cmd.channel)?;
		let members: Vec<CharacterName> = cmd
			.users
			.iter()
			.filter_map(|u| CharacterName::new(u.identity.as_str()).ok())
			.collect();

		let mut st = self.state.write();
		for m in &members {
			st.upsert_character(m.clone());
		}

		let channel = st.channel_entry(id, &cmd.channel, kind_for_new_channel(&cmd.channel));
		channel.is_joined = true;
		channel.set_members(members);
		channel.mode = cmd.mode;
		channel.initialized.mode = true;
		Ok(Disposition::Done)
	}

	pub(super) fn on_channel_ops(&mut self, cmd: ChannelOps) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		let Some(channel) = st.find_room_mut(&cmd.channel) else {
			return Ok(Disposition::Requeue);
		};
		channel.moderators = cmd.oplist;
		Ok(Disposition::Done)
	}

	pub(super) fn on_description(&mut self, cmd: ChannelDescription) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		let Some(channel) = st.find_room_mut(&cmd.channel) else {
			return Ok(Disposition::Requeue);
		};

		let first = !channel.initialized.description;
		channel.initialized.description = true;
		if channel.description == cmd.description {
			return Ok(Disposition::Done);
		}
		channel.description = cmd.description.clone();
		if first {
			return Ok(Disposition::Done);
		}

		let id = channel.id.clone();
		self.emit(
			&mut st,
			Update::ChannelDescriptionChanged {
				channel: id,
				description: cmd.description,
			},
		);
		Ok(Disposition::Done)
	}

	pub(super) fn on_mode(&mut self, cmd: ChannelModeChange) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		let Some(channel) = st.find_room_mut(&cmd.channel) else {
			return Ok(Disposition::Requeue);
		};

		let first = !channel.initialized.mode;
		channel.initialized.mode = true;
		if channel.mode == cmd.mode {
			return Ok(Disposition::Done);
		}
		channel.mode = cmd.mode;
		if first {
			return Ok(Disposition::Done);
		}

		let id = channel.id.clone();
		self.emit(&mut st, Update::ChannelModeChanged { channel: id, mode: cmd.mode });
		Ok(Disposition::Done)
	}

	pub(super) fn on_channel_status(&mut self, cmd: ChannelStatusChange) -> Result<Disposition, InterpretError> {
		let kind = match cmd.status.as_str() {
			"public" => ChannelKind::Private,
			"private" => ChannelKind::InviteOnly,
			other => {
				return Err(InterpretError::InvalidValue {
					field: "status",
					reason: format!("unknown room status {other:?}"),
				});
			}
		};

		let mut st = self.state.write();
		let Some(channel) = st.find_room_mut(&cmd.channel) else {
			return Ok(Disposition::Requeue);
		};

		let first = !channel.initialized.kind;
		channel.initialized.kind = true;
		if channel.kind == kind {
			return Ok(Disposition::Done);
		}
		channel.kind = kind;
		if first {
			return Ok(Disposition::Done);
		}

		let id = channel.id.clone();
		self.emit(&mut st, Update::ChannelKindChanged { channel: id, kind });
		Ok(Disposition::Done)
	}
}

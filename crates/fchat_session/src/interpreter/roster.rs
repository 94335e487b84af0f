#![forbid(unsafe_code)]

use fchat_protocol::server::{CharacterOnline, CharacterRef, RosterSnapshot, StatusChange, TypingChange};

use super::{InterpretError, Interpreter, character_name};
use crate::events::Update;
use crate::queue::Disposition;

impl Interpreter {
	/// Initial user list chunk; state only, no per-character updates.
	pub(super) fn on_roster(&mut self, cmd: RosterSnapshot) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		for entry in cmd.characters {
			let Ok(name) = character_name(&entry.0) else {
				continue;
			};
			let c = st.upsert_character(name);
			c.gender = entry.1;
			c.status = entry.2;
			c.status_message = entry.3;
		}
		Ok(Disposition::Done)
	}

	pub(super) fn on_online(&mut self, cmd: CharacterOnline) -> Result<Disposition, InterpretError> {
		let name = character_name(&cmd.identity)?;
		let mut st = self.state.write();
		let c = st.upsert_character(name);
		c.gender = cmd.gender;
		c.status = cmd.status;
		c.status_message.clear();

		self.emit(
			&mut st,
			Update::LoginStateChanged {
				character: cmd.identity,
				online: true,
			},
		);
		Ok(Disposition::Done)
	}

	/// Global disconnect. Per-channel leaves carry `ignore_update` since the
	/// login-state update already covers them.
	pub(super) fn on_offline(&mut self, cmd: CharacterRef) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		let known = st.remove_character(&cmd.character).is_some();

		let left: Vec<_> = st
			.channels_mut()
			.filter_map(|channel| channel.remove_member(&cmd.character).then(|| channel.id.clone()))
			.collect();

		if known {
			self.emit(
				&mut st,
				Update::LoginStateChanged {
					character: cmd.character.clone(),
					online: false,
				},
			);
		}
		for channel in left {
			self.emit(
				&mut st,
				Update::JoinLeft {
					channel,
					character: cmd.character.clone(),
					joined: false,
					ignore_update: true,
				},
			);
		}
		Ok(Disposition::Done)
	}

	pub(super) fn on_status(&mut self, cmd: StatusChange) -> Result<Disposition, InterpretError> {
		let name = character_name(&cmd.character)?;
		let mut st = self.state.write();
		let is_new = st.find_character(name.as_str()).is_none();
		let changed = st.upsert_character(name).set_status(cmd.status, &cmd.statusmsg);

		if changed || is_new {
			self.emit(
				&mut st,
				Update::StatusChanged {
					character: cmd.character,
					status: cmd.status,
					message: cmd.statusmsg,
				},
			);
		}
		Ok(Disposition::Done)
	}

	pub(super) fn on_typing(&mut self, cmd: TypingChange) -> Result<Disposition, InterpretError> {
		let name = character_name(&cmd.character)?;
		let mut st = self.state.write();
		if st.upsert_character(name).set_typing(cmd.status) {
			self.emit(
				&mut st,
				Update::TypingChanged {
					character: cmd.character,
					status: cmd.status,
				},
			);
		}
		Ok(Disposition::Done)
	}
}

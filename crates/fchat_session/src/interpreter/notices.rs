#![forbid(unsafe_code)]

use fchat_domain::ChannelKind;
use fchat_protocol::server::{Bridge, Broadcast, ChannelInvite, ErrorMessage, StaffCall, SystemMessage};
use fchat_protocol::{FlexId, RoomVisibility, SystemMessageKind, classify_system_message, parse_report};
use tracing::debug;

use super::{InterpretError, Interpreter, channel_id, character_name};
use crate::events::{ListKind, Update};
use crate::queue::Disposition;
use crate::state::ChatState;

fn id_or_zero(id: Option<FlexId>) -> u64 {
	id.map(|v| v.get()).unwrap_or_default()
}

impl Interpreter {
	fn plain_system(&self, st: &mut ChatState, channel: Option<&str>, message: String) {
		let channel = channel.and_then(|c| channel_id(c).ok());
		self.emit(st, Update::System { channel, message });
	}

	pub(super) fn on_system(&mut self, cmd: SystemMessage) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		let channel = cmd.channel.as_deref();
		let known = channel.is_some_and(|c| st.find_room(c).is_some());

		match classify_system_message(&cmd.message) {
			SystemMessageKind::PromotionNotice => {}
			SystemMessageKind::BanList(names) => match channel.filter(|_| known) {
				Some(c) => {
					if let Some(target) = st.find_room_mut(c) {
						target.bans = names;
					}
				}
				None => self.plain_system(&mut st, channel, cmd.message),
			},
			SystemMessageKind::RoomTypeChanged(visibility) => {
				let kind = match visibility {
					RoomVisibility::Open => ChannelKind::Private,
					RoomVisibility::InviteOnly => ChannelKind::InviteOnly,
				};
				let target = match channel {
					Some(c) if known => st.find_room_mut(c),
					_ => None,
				};
				let Some(target) = target else {
					self.plain_system(&mut st, channel, cmd.message);
					return Ok(Disposition::Done);
				};
				target.initialized.kind = true;
				if target.kind != kind {
					target.kind = kind;
					let id = target.id.clone();
					self.emit(&mut st, Update::ChannelKindChanged { channel: id, kind });
				}
			}
			SystemMessageKind::Plain => self.plain_system(&mut st, channel, cmd.message),
		}
		Ok(Disposition::Done)
	}

	pub(super) fn on_error(&mut self, cmd: ErrorMessage) -> Result<Disposition, InterpretError> {
		if classify_system_message(&cmd.message) == SystemMessageKind::PromotionNotice {
			return Ok(Disposition::Done);
		}
		let mut st = self.state.write();
		self.emit(
			&mut st,
			Update::Error {
				number: cmd.number.get(),
				message: cmd.message,
			},
		);
		Ok(Disposition::Done)
	}

	pub(super) fn on_broadcast(&mut self, cmd: Broadcast) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		self.emit(
			&mut st,
			Update::Broadcast {
				sender: cmd.character,
				message: cmd.message,
			},
		);
		Ok(Disposition::Done)
	}

	pub(super) fn on_invite(&mut self, cmd: ChannelInvite) -> Result<Disposition, InterpretError> {
		let channel = channel_id(&cmd.name)?;
		let mut st = self.state.write();
		self.emit(
			&mut st,
			Update::Invite {
				sender: cmd.sender,
				channel,
				title: cmd.title,
			},
		);
		Ok(Disposition::Done)
	}

	/// Staff alerts. Report bodies are parsed leniently; a body missing its
	/// markers is kept whole as the complaint.
	pub(super) fn on_staff_call(&mut self, cmd: StaffCall) -> Result<Disposition, InterpretError> {
		let call_id = cmd.callid.0;
		let mut st = self.state.write();
		match cmd.action.as_str() {
			"report" => {
				let reporter = cmd.character.ok_or(InterpretError::MissingArgument("character"))?;
				let report = parse_report(cmd.report.as_deref().unwrap_or_default());
				st.upsert_character(character_name(&reporter)?).last_report = Some(report.clone());
				self.emit(
					&mut st,
					Update::ReportFiled {
						call_id,
						reporter,
						report,
						log_id: cmd.logid.map(|v| v.get()),
					},
				);
			}
			"confirm" => {
				self.emit(
					&mut st,
					Update::ReportHandled {
						call_id,
						moderator: cmd.moderator.unwrap_or_default(),
						reporter: cmd.character.unwrap_or_default(),
					},
				);
			}
			other => debug!(action = other, "unhandled staff call action"),
		}
		Ok(Disposition::Done)
	}

	/// Site events relayed into chat.
	pub(super) fn on_bridge(&mut self, cmd: Bridge) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		match cmd.kind.as_str() {
			"note" => {
				self.emit(
					&mut st,
					Update::Note {
						sender: cmd.sender.unwrap_or_default(),
						subject: cmd.subject.unwrap_or_default(),
						id: id_or_zero(cmd.id),
					},
				);
			}
			"comment" => {
				self.emit(
					&mut st,
					Update::Comment {
						commenter: cmd.name.unwrap_or_default(),
						target_type: cmd.target_type.unwrap_or_default(),
						target: cmd.target.unwrap_or_default(),
						target_id: id_or_zero(cmd.target_id),
						id: id_or_zero(cmd.id),
						parent_id: id_or_zero(cmd.parent_id),
					},
				);
			}
			"friendrequest" => {
				let character = cmd.name.ok_or(InterpretError::MissingArgument("name"))?;
				self.emit(&mut st, Update::FriendRequest { character });
			}
			kind @ ("trackadd" | "trackrem" | "friendadd" | "friendremove") => {
				let raw = cmd.name.ok_or(InterpretError::MissingArgument("name"))?;
				let name = character_name(&raw)?;
				let (list, added) = match kind {
					"trackadd" => (ListKind::Bookmarks, true),
					"trackrem" => (ListKind::Bookmarks, false),
					"friendadd" => (ListKind::Friends, true),
					_ => (ListKind::Friends, false),
				};
				let set = match list {
					ListKind::Bookmarks => &mut st.account.bookmarks,
					_ => &mut st.account.friends,
				};
				let changed = if added { set.insert(name) } else { set.remove(&name) };
				if changed {
					self.emit(
						&mut st,
						Update::ListChanged {
							list,
							character: raw,
							added,
						},
					);
				}
			}
			other => debug!(kind = other, "unhandled bridge event"),
		}
		Ok(Disposition::Done)
	}
}

#![forbid(unsafe_code)]

use fchat_protocol::server::{ChannelModeration, ChannelPromotion};
use tracing::info;

use super::{InterpretError, Interpreter};
use crate::events::{ModerationAction, Update};
use crate::queue::Disposition;

impl Interpreter {
	pub(super) fn on_moderation(
		&mut self,
		cmd: ChannelModeration,
		action: ModerationAction,
	) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		let is_self = st.account.is_self(&cmd.character);
		let target = self.target_display(&st, &cmd.character);

		let Some(channel) = st.find_room_mut(&cmd.channel) else {
			return Ok(Disposition::Requeue);
		};
		let id = channel.id.clone();

		if is_self {
			channel.leave();
		} else {
			channel.remove_member(&cmd.character);
		}
		if action == ModerationAction::Ban {
			channel.add_ban(&cmd.character);
		}

		if is_self {
			info!(channel = %id, operator = %cmd.operator, ?action, "removed from channel");
			if st.current_channel() == Some(&id) {
				st.select_channel(None);
			}
			self.remove_saved_channel(&id);
		}

		self.emit(
			&mut st,
			Update::Moderation {
				channel: id,
				action,
				operator: cmd.operator,
				target,
			},
		);
		Ok(Disposition::Done)
	}

	pub(super) fn on_channel_promote(
		&mut self,
		cmd: ChannelPromotion,
		promoted: bool,
	) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		let target = self.target_display(&st, &cmd.character);

		let Some(channel) = st.find_room_mut(&cmd.channel) else {
			return Ok(Disposition::Requeue);
		};
		let changed = if promoted {
			channel.add_moderator(&cmd.character)
		} else {
			channel.remove_moderator(&cmd.character)
		};
		let id = channel.id.clone();

		if changed {
			self.emit(
				&mut st,
				Update::PromoteDemote {
					channel: Some(id),
					character: target,
					promoted,
				},
			);
		}
		Ok(Disposition::Done)
	}

	pub(super) fn on_set_owner(&mut self, cmd: ChannelPromotion) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		let Some(channel) = st.find_room_mut(&cmd.channel) else {
			return Ok(Disposition::Requeue);
		};
		channel.set_owner(&cmd.character);
		let id = channel.id.clone();

		self.emit(
			&mut st,
			Update::OwnerChanged {
				channel: id,
				character: cmd.character,
			},
		);
		Ok(Disposition::Done)
	}
}

#![forbid(unsafe_code)]

use fchat_domain::CharacterName;
use fchat_protocol::server::{CharacterRef, FriendsList, GlobalOps, IgnoreList};
use tracing::debug;

use super::{InterpretError, Interpreter, character_name};
use crate::events::{ListKind, Update};
use crate::queue::Disposition;

fn names(raw: &[String]) -> impl Iterator<Item = CharacterName> + '_ {
	raw.iter().filter_map(|n| CharacterName::new(n.as_str()).ok())
}

impl Interpreter {
	pub(super) fn on_friends(&mut self, cmd: FriendsList) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		st.account.friends = names(&cmd.characters).collect();
		Ok(Disposition::Done)
	}

	pub(super) fn on_ignore(&mut self, cmd: IgnoreList) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		match cmd.action.as_str() {
			"init" | "list" => {
				st.account.ignored = names(&cmd.characters).collect();
			}
			"add" | "delete" => {
				let raw = cmd.character.ok_or(InterpretError::MissingArgument("character"))?;
				let name = character_name(&raw)?;
				let added = cmd.action == "add";
				let changed = if added {
					st.account.ignored.insert(name)
				} else {
					st.account.ignored.remove(&name)
				};
				if changed {
					self.emit(
						&mut st,
						Update::ListChanged {
							list: ListKind::Ignored,
							character: raw,
							added,
						},
					);
				}
			}
			other => debug!(action = other, "unhandled ignore action"),
		}
		Ok(Disposition::Done)
	}

	pub(super) fn on_global_ops(&mut self, cmd: GlobalOps) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		st.account.global_moderators = names(&cmd.ops).collect();
		Ok(Disposition::Done)
	}

	pub(super) fn on_global_promote(&mut self, cmd: CharacterRef, promoted: bool) -> Result<Disposition, InterpretError> {
		let name = character_name(&cmd.character)?;
		let mut st = self.state.write();
		let changed = if promoted {
			st.account.global_moderators.insert(name)
		} else {
			st.account.global_moderators.remove(&name)
		};
		if changed {
			self.emit(
				&mut st,
				Update::PromoteDemote {
					channel: None,
					character: cmd.character,
					promoted,
				},
			);
		}
		Ok(Disposition::Done)
	}
}

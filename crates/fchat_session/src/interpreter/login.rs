#![forbid(unsafe_code)]

use std::sync::Arc;

use fchat_protocol::ClientCommand;
use fchat_protocol::FlexId;
use fchat_protocol::server::{ConnectedCount, Hello, Identify, ServerVariable, Uptime};
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::{InterpretError, Interpreter, character_name};
use crate::events::Update;
use crate::queue::Disposition;
use crate::state::ServerUptime;

impl Interpreter {
	pub(super) fn on_identify(&mut self, cmd: Identify) -> Result<Disposition, InterpretError> {
		let me = character_name(&cmd.character)?;
		{
			let mut st = self.state.write();
			st.authenticated = true;
			st.upsert_character(me.clone());
			st.account.current = Some(me.clone());
		}
		info!(character = %me, "identified");

		self.send(ClientCommand::PublicChannels);
		self.send(ClientCommand::PrivateChannels);
		self.send(ClientCommand::Uptime);
		self.start_auto_join();
		Ok(Disposition::Done)
	}

	/// Join saved channels one per tick so the server's flood guard stays quiet.
	fn start_auto_join(&mut self) {
		if let Some(task) = self.auto_join.take() {
			task.abort();
		}

		let channels = self.settings.saved_channels();
		if channels.is_empty() {
			return;
		}

		debug!(count = channels.len(), "auto-joining saved channels");
		let outbox = Arc::clone(&self.outbox);
		let every = self.cfg.auto_join_interval;
		self.auto_join = Some(tokio::spawn(async move {
			let mut ticks = interval(every);
			for channel in channels {
				ticks.tick().await;
				if let Err(e) = outbox.send(ClientCommand::JoinChannel {
					channel: channel.clone(),
				}) {
					warn!(channel = %channel, error = %e, "auto-join failed");
				}
			}
		}));
	}

	pub(super) fn on_variable(&mut self, cmd: ServerVariable) -> Result<Disposition, InterpretError> {
		self.state.write().server_vars.insert(cmd.variable, cmd.value);
		Ok(Disposition::Done)
	}

	pub(super) fn on_hello(&mut self, cmd: Hello) -> Result<Disposition, InterpretError> {
		let mut st = self.state.write();
		self.emit(
			&mut st,
			Update::System {
				channel: None,
				message: cmd.message,
			},
		);
		Ok(Disposition::Done)
	}

	pub(super) fn on_connected_count(&mut self, cmd: ConnectedCount) -> Result<Disposition, InterpretError> {
		self.state.write().online_count = cmd.count.get();
		Ok(Disposition::Done)
	}

	pub(super) fn on_uptime(&mut self, cmd: Uptime) -> Result<Disposition, InterpretError> {
		let get = |id: Option<FlexId>| id.map(|v| v.get()).unwrap_or_default();
		let uptime = ServerUptime {
			started: cmd.starttime.map(|v| v.get()),
			started_text: cmd.startstring,
			accepted: get(cmd.accepted),
			channels: get(cmd.channels),
			users: get(cmd.users),
			max_users: get(cmd.maxusers),
		};
		self.state.write().uptime = Some(uptime);
		Ok(Disposition::Done)
	}
}

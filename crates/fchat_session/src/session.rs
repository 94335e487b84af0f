#![forbid(unsafe_code)]

//! Wiring: connection manager, dispatch queue and interpreter as one session.

use std::sync::Arc;

use fchat_client_core::{
	ClientCoreError, ConnectionConfig, ConnectionEvent, ConnectionHandle, ConnectionManager, SharedTicket, Transport,
};
use fchat_protocol::ClientCommand;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::events::{EventBus, Notification, Update};
use crate::interpreter::{Interpreter, InterpreterConfig};
use crate::logger::{ChatLogger, NullChatLogger};
use crate::queue::{CommandQueue, Dispatcher};
use crate::settings::{MemorySettingsStore, SettingsStore};
use crate::state::{ChatState, SharedState};

/// External services the interpreter calls into.
#[derive(Clone)]
pub struct Collaborators {
	pub logger: Arc<dyn ChatLogger>,
	pub settings: Arc<dyn SettingsStore>,
}

impl Collaborators {
	/// No logging and settings that live only as long as the process.
	pub fn in_memory() -> Self {
		Self {
			logger: Arc::new(NullChatLogger),
			settings: Arc::new(MemorySettingsStore::default()),
		}
	}
}

pub struct Session;

impl Session {
	/// Spawn the connection, dispatch and status tasks for one account.
	///
	/// Nothing connects until [`SessionHandle::connect`] is called.
	pub fn start(
		session_cfg: &SessionConfig,
		connection_cfg: ConnectionConfig,
		transport: Box<dyn Transport>,
		ticket: SharedTicket,
		collaborators: Collaborators,
	) -> SessionHandle {
		let state = ChatState::new(session_cfg.notification_capacity, session_cfg.history_capacity).shared();
		let bus = EventBus::default();

		let (queue, queue_rx) = CommandQueue::new();
		let (status_tx, status_rx) = mpsc::unbounded_channel();

		let (manager, connection) =
			ConnectionManager::new(connection_cfg, transport, ticket, Arc::new(queue.clone()), status_tx);

		let interpreter = Interpreter::new(
			InterpreterConfig::from(session_cfg),
			Arc::clone(&state),
			bus.clone(),
			Arc::new(connection.clone()),
			collaborators,
		);
		let dispatcher = Dispatcher::new(interpreter, queue, queue_rx)
			.with_requeue_delay(session_cfg.requeue_delay)
			.with_max_attempts(session_cfg.max_dispatch_attempts);

		let tasks = vec![
			manager.spawn(),
			tokio::spawn(dispatcher.run()),
			tokio::spawn(forward_status(status_rx, Arc::clone(&state), bus.clone())),
		];

		SessionHandle {
			connection,
			state,
			bus,
			tasks,
		}
	}
}

/// Turn connection lifecycle events into session updates.
async fn forward_status(mut rx: mpsc::UnboundedReceiver<ConnectionEvent>, state: SharedState, bus: EventBus) {
	while let Some(event) = rx.recv().await {
		debug!(?event, "connection status");
		let notification = Notification::new(Update::Connection(event.clone()));
		{
			let mut st = state.write();
			if event != ConnectionEvent::Authenticated {
				st.authenticated = false;
			}
			st.push_notification(notification.clone());
		}
		bus.publish(notification);
	}
}

/// Front end of a running session.
pub struct SessionHandle {
	connection: ConnectionHandle,
	state: SharedState,
	bus: EventBus,
	tasks: Vec<JoinHandle<()>>,
}

impl SessionHandle {
	pub fn connect(&self, character: impl Into<String>) -> Result<(), ClientCoreError> {
		let character = character.into();
		info!(%character, "connecting");
		self.connection.connect(character)
	}

	pub fn send(&self, command: &ClientCommand) -> Result<(), ClientCoreError> {
		self.connection.send(command)
	}

	pub fn connection(&self) -> &ConnectionHandle {
		&self.connection
	}

	pub fn state(&self) -> &SharedState {
		&self.state
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
		self.bus.subscribe()
	}

	/// Close the connection and stop every session task.
	pub fn shutdown(self) {
		self.connection.shutdown();
		for task in &self.tasks {
			task.abort();
		}
	}
}

impl Drop for SessionHandle {
	fn drop(&mut self) {
		for task in &self.tasks {
			task.abort();
		}
	}
}

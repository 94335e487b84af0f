#![forbid(unsafe_code)]

//! Single-consumer command queue.
//!
//! Producers (the connection task, requeue timers) may enqueue from anywhere;
//! one [`Dispatcher`] drains in arrival order and runs the handler for one
//! command at a time.

use std::fmt;
use std::time::Duration;

use fchat_client_core::InboundSink;
use fchat_protocol::RawCommand;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Total handler invocations a command gets before it is dropped.
pub const MAX_DISPATCH_ATTEMPTS: u32 = 5;

pub const DEFAULT_REQUEUE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
	pub raw: RawCommand,
	/// Handler invocations so far.
	pub attempt: u32,
}

/// What the dispatcher should do after a handler ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
	Done,
	/// A dependency is not known yet; try again later.
	Requeue,
}

pub trait CommandHandler: Send + 'static {
	type Error: fmt::Display;

	fn handle(&mut self, command: &RawCommand) -> Result<Disposition, Self::Error>;
}

/// Enqueue side of the dispatch queue.
#[derive(Debug, Clone)]
pub struct CommandQueue {
	tx: mpsc::UnboundedSender<QueuedCommand>,
}

impl CommandQueue {
	pub fn new() -> (Self, mpsc::UnboundedReceiver<QueuedCommand>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, rx)
	}

	pub fn enqueue(&self, raw: RawCommand) {
		let _ = self.tx.send(QueuedCommand { raw, attempt: 0 });
	}
}

/// Put `command` at the back of the queue once `delay` has passed, unless
/// the queue has closed by then.
fn requeue_weak(tx: &mpsc::WeakUnboundedSender<QueuedCommand>, command: QueuedCommand, delay: Duration) {
	let tx = tx.clone();
	tokio::spawn(async move {
		tokio::time::sleep(delay).await;
		match tx.upgrade() {
			Some(tx) => {
				let _ = tx.send(command);
			}
			None => debug!(code = %command.raw.code, "queue closed before requeue"),
		}
	});
}

impl InboundSink for CommandQueue {
	fn publish(&self, command: RawCommand) {
		self.enqueue(command);
	}
}

pub struct Dispatcher<H> {
	handler: H,
	requeue: mpsc::WeakUnboundedSender<QueuedCommand>,
	rx: mpsc::UnboundedReceiver<QueuedCommand>,
	requeue_delay: Duration,
	max_attempts: u32,
}

impl<H: CommandHandler> Dispatcher<H> {
	/// `queue` is only used for requeues and does not keep the queue open.
	pub fn new(handler: H, queue: CommandQueue, rx: mpsc::UnboundedReceiver<QueuedCommand>) -> Self {
		Self {
			handler,
			requeue: queue.tx.downgrade(),
			rx,
			requeue_delay: DEFAULT_REQUEUE_DELAY,
			max_attempts: MAX_DISPATCH_ATTEMPTS,
		}
	}

	pub fn with_requeue_delay(mut self, delay: Duration) -> Self {
		self.requeue_delay = delay;
		self
	}

	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts.max(1);
		self
	}

	pub fn handler(&self) -> &H {
		&self.handler
	}

	/// Drain until every [`CommandQueue`] handle is dropped.
	pub async fn run(mut self) {
		while let Some(command) = self.rx.recv().await {
			self.dispatch(command);
		}
		debug!("dispatch queue closed");
	}

	/// Dispatch everything already queued, without waiting.
	pub fn drain_pending(&mut self) -> usize {
		let mut n = 0;
		while let Ok(command) = self.rx.try_recv() {
			self.dispatch(command);
			n += 1;
		}
		n
	}

	fn dispatch(&mut self, mut command: QueuedCommand) {
		command.attempt += 1;
		metrics::counter!("fchat_commands_dispatched_total").increment(1);

		match self.handler.handle(&command.raw) {
			Ok(Disposition::Done) => {}
			Ok(Disposition::Requeue) if command.attempt >= self.max_attempts => {
				metrics::counter!("fchat_commands_dropped_total").increment(1);
				warn!(
					code = %command.raw.code,
					attempt = command.attempt,
					"dropping command with unresolved dependency"
				);
			}
			Ok(Disposition::Requeue) => {
				metrics::counter!("fchat_commands_requeued_total").increment(1);
				debug!(code = %command.raw.code, attempt = command.attempt, "requeueing command");
				requeue_weak(&self.requeue, command, self.requeue_delay);
			}
			Err(e) => {
				metrics::counter!("fchat_handler_errors_total").increment(1);
				warn!(code = %command.raw.code, error = %e, "command handler failed");
			}
		}
	}
}

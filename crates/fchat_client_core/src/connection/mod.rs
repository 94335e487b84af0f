#![forbid(unsafe_code)]

//! Connection manager: login handshake, heartbeat echo, outbound
//! serialisation and randomised reconnect.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use fchat_protocol::{ClientCommand, FlexId, Frame, Login, PING, RawCommand, parse_frame};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::config::ConnectionConfig;
use crate::error::ClientCoreError;
use crate::ticket::SharedTicket;
use crate::transport::{Transport, TransportEvent, TransportEventTx};


/// Receiver of decoded inbound commands.
///
/// Called from the connection task; implementations must not block.
pub trait InboundSink: Send + Sync + 'static {
	fn publish(&self, command: RawCommand);
}

impl InboundSink for mpsc::UnboundedSender<RawCommand> {
	fn publish(&self, command: RawCommand) {
		let _ = self.send(command);
	}
}

/// Connection lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
	Connecting,
	Reconnecting { attempt: u32, delay: Duration },
	LoginFailed { reason: String },
	Authenticated,
	/// The session is over; no reconnect follows.
	Fatal { reason: String },
	Closed,
}

#[derive(Debug)]
enum Control {
	Connect { character: String },
	Send(String),
	Disconnect,
	Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
	Idle,
	Connecting,
	Open,
	Authenticated,
	Backoff,
	Fatal,
}

/// Cloneable front end of a running [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
	control: mpsc::UnboundedSender<Control>,
	open: Arc<AtomicBool>,
}

impl ConnectionHandle {
	/// Log in as `character`, cancelling any pending reconnect.
	pub fn connect(&self, character: impl Into<String>) -> Result<(), ClientCoreError> {
		self.control
			.send(Control::Connect {
				character: character.into(),
			})
			.map_err(|_| ClientCoreError::Stopped)
	}

	/// Encode and queue one command.
	///
	/// Fails without sending when the code is malformed or the socket is down.
	pub fn send(&self, command: &ClientCommand) -> Result<(), ClientCoreError> {
		let frame = command.to_frame()?;
		self.send_frame(frame)
	}

	/// Queue pre-encoded wire text.
	pub fn send_frame(&self, frame: String) -> Result<(), ClientCoreError> {
		if !self.is_open() {
			return Err(ClientCoreError::NotOpen);
		}
		self.control.send(Control::Send(frame)).map_err(|_| ClientCoreError::Stopped)
	}

	pub fn is_open(&self) -> bool {
		self.open.load(Ordering::SeqCst)
	}

	pub fn disconnect(&self) {
		let _ = self.control.send(Control::Disconnect);
	}

	pub fn shutdown(&self) {
		let _ = self.control.send(Control::Shutdown);
	}
}

struct Link {
	cfg: ConnectionConfig,
	transport: Box<dyn Transport>,
	ticket: SharedTicket,
	sink: Arc<dyn InboundSink>,
	status_tx: mpsc::UnboundedSender<ConnectionEvent>,
	events_tx: TransportEventTx,
	open: Arc<AtomicBool>,
	rng: StdRng,
	state: LinkState,
	character: Option<String>,
	attempt: u32,
	reconnect_at: Option<Instant>,
}

/// Owns the transport and drives it from a single task.
pub struct ConnectionManager {
	link: Link,
	control_rx: mpsc::UnboundedReceiver<Control>,
	events_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl ConnectionManager {
	pub fn new(
		cfg: ConnectionConfig,
		transport: Box<dyn Transport>,
		ticket: SharedTicket,
		sink: Arc<dyn InboundSink>,
		status_tx: mpsc::UnboundedSender<ConnectionEvent>,
	) -> (Self, ConnectionHandle) {
		let (control_tx, control_rx) = mpsc::unbounded_channel();
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let open = Arc::new(AtomicBool::new(false));

		let link = Link {
			cfg,
			transport,
			ticket,
			sink,
			status_tx,
			events_tx,
			open: Arc::clone(&open),
			rng: StdRng::from_os_rng(),
			state: LinkState::Idle,
			character: None,
			attempt: 0,
			reconnect_at: None,
		};

		(
			Self {
				link,
				control_rx,
				events_rx,
			},
			ConnectionHandle {
				control: control_tx,
				open,
			},
		)
	}

	/// Replace the jitter source.
	pub fn with_rng(mut self, rng: StdRng) -> Self {
		self.link.rng = rng;
		self
	}

	pub fn spawn(self) -> JoinHandle<()> {
		tokio::spawn(self.run())
	}

	pub async fn run(self) {
		let ConnectionManager {
			mut link,
			mut control_rx,
			mut events_rx,
		} = self;

		loop {
			let reconnect_at = link.reconnect_at;

			tokio::select! {
				Some(event) = events_rx.recv() => link.on_transport_event(event),

				control = control_rx.recv() => {
					match control {
						Some(Control::Shutdown) | None => {
							info!("connection manager received Shutdown");
							link.teardown();
							link.emit(ConnectionEvent::Closed);
							break;
						}
						Some(control) => link.on_control(control),
					}
				}

				_ = sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
					link.reconnect_at = None;
					if link.state == LinkState::Backoff {
						link.start_connect();
					}
				}
			}
		}
	}
}

impl Link {
	fn emit(&self, event: ConnectionEvent) {
		let _ = self.status_tx.send(event);
	}

	fn set_open(&self, open: bool) {
		self.open.store(open, Ordering::SeqCst);
	}

	fn on_control(&mut self, control: Control) {
		match control {
			Control::Connect { character } => {
				info!(character = %character, "connect requested");
				self.character = Some(character);
				self.attempt = 0;
				self.reconnect_at = None;
				if matches!(self.state, LinkState::Connecting | LinkState::Open | LinkState::Authenticated) {
					self.transport.close();
					self.set_open(false);
				}
				self.start_connect();
			}
			Control::Send(frame) => {
				if let Err(e) = self.transport.send(frame) {
					warn!(error = %e, "dropping outbound frame");
				}
			}
			Control::Disconnect => {
				self.teardown();
				self.emit(ConnectionEvent::Closed);
			}
			Control::Shutdown => {}
		}
	}

	fn start_connect(&mut self) {
		self.state = LinkState::Connecting;
		self.emit(ConnectionEvent::Connecting);

		let url = self.cfg.server_url.clone();
		debug!(url = %url, attempt = self.attempt, "opening transport");
		if let Err(e) = self.transport.open(&url, self.events_tx.clone()) {
			self.fail(e.to_string());
		}
	}

	fn on_transport_event(&mut self, event: TransportEvent) {
		match event {
			TransportEvent::Opened => {
				if self.state != LinkState::Connecting {
					debug!(state = ?self.state, "ignoring stale Opened");
					return;
				}
				self.state = LinkState::Open;
				self.set_open(true);
				self.send_login();
			}
			TransportEvent::MessageReceived(text) => {
				if matches!(self.state, LinkState::Open | LinkState::Authenticated) {
					self.on_frame(&text);
				}
			}
			TransportEvent::Error(reason) => match self.state {
				LinkState::Connecting | LinkState::Open => self.fail(reason),
				LinkState::Authenticated => warn!(error = %reason, "transport error"),
				_ => debug!(error = %reason, "ignoring stale transport error"),
			},
			TransportEvent::Closed(reason) => {
				let reason = reason.unwrap_or_else(|| "connection closed".to_string());
				match self.state {
					LinkState::Connecting | LinkState::Open => self.fail(reason),
					LinkState::Authenticated => self.fatal(reason),
					_ => debug!(reason = %reason, "ignoring stale close"),
				}
			}
		}
	}

	fn send_login(&mut self) {
		let Some(character) = self.character.clone() else {
			self.fail("no character selected".to_string());
			return;
		};

		let login = Login {
			account: self.cfg.account.clone(),
			ticket: self.ticket.current().expose().to_string(),
			character,
			client_name: self.cfg.client_name.clone(),
			client_version: self.cfg.client_version.clone(),
		};

		let sent = ClientCommand::Identify(login)
			.to_frame()
			.map_err(ClientCoreError::from)
			.and_then(|frame| self.transport.send(frame));
		if let Err(e) = sent {
			self.fail(e.to_string());
		}
	}

	fn on_frame(&mut self, text: &str) {
		let raw = match parse_frame(text) {
			Ok(Frame::Command(raw)) => raw,
			Ok(Frame::Bare(code)) if code.is(PING) => {
				if let Err(e) = self.transport.send(PING.to_string()) {
					warn!(error = %e, "failed to answer ping");
				}
				return;
			}
			Ok(Frame::Bare(code)) => {
				debug!(code = %code, "ignoring zero-argument command");
				metrics::counter!("fchat_frames_rejected_total").increment(1);
				return;
			}
			Err(e) => {
				warn!(error = %e, "rejected inbound frame");
				metrics::counter!("fchat_frames_rejected_total").increment(1);
				return;
			}
		};

		if raw.code.is("IDN") {
			info!("login accepted");
			self.state = LinkState::Authenticated;
			self.attempt = 0;
			self.emit(ConnectionEvent::Authenticated);
		} else if raw.code.is("ERR")
			&& let Some(number) = error_number(&raw)
			&& self.cfg.reconnect_error_codes.contains(&number)
			&& self.state == LinkState::Authenticated
		{
			warn!(number, "login slot lost; next close will reconnect");
			self.state = LinkState::Open;
		}

		self.sink.publish(raw);
	}

	fn fail(&mut self, reason: String) {
		warn!(reason = %reason, "login failed");
		self.transport.close();
		self.set_open(false);
		self.emit(ConnectionEvent::LoginFailed { reason });
		self.schedule_reconnect();
	}

	fn schedule_reconnect(&mut self) {
		let attempt = self.attempt + 1;
		if !self.cfg.reconnect.allows(attempt) {
			self.fatal(format!("giving up after {} reconnect attempts", self.attempt));
			return;
		}

		let delay = self.cfg.reconnect.next_delay(&mut self.rng);
		self.attempt = attempt;
		self.reconnect_at = Some(Instant::now() + delay);
		self.state = LinkState::Backoff;

		metrics::counter!("fchat_reconnect_attempts_total").increment(1);
		info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
		self.emit(ConnectionEvent::Reconnecting { attempt, delay });
	}

	fn fatal(&mut self, reason: String) {
		error!(reason = %reason, "connection lost");
		self.transport.close();
		self.set_open(false);
		self.state = LinkState::Fatal;
		self.reconnect_at = None;
		self.emit(ConnectionEvent::Fatal { reason });
	}

	fn teardown(&mut self) {
		self.transport.close();
		self.set_open(false);
		self.reconnect_at = None;
		self.state = LinkState::Idle;
	}
}

fn error_number(raw: &RawCommand) -> Option<u64> {
	let value = raw.get("number")?.clone();
	serde_json::from_value::<FlexId>(value).ok().map(FlexId::get)
}

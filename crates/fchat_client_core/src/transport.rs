#![forbid(unsafe_code)]

//! Message-oriented socket abstraction.
//!
//! A transport reports its lifecycle through [`TransportEvent`]s sent on the
//! channel handed to [`Transport::open`]; the connection manager owns the
//! receiving end.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt as _, StreamExt as _};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, warn};
use url::Url;

use crate::error::ClientCoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	Opened,
	MessageReceived(String),
	Error(String),
	/// Close reason, when the peer sent one.
	Closed(Option<String>),
}

pub type TransportEventTx = mpsc::UnboundedSender<TransportEvent>;

pub trait Transport: Send + 'static {
	/// Start connecting. Completion is reported as [`TransportEvent::Opened`].
	fn open(&mut self, url: &str, events: TransportEventTx) -> Result<(), ClientCoreError>;

	/// Queue one text frame.
	fn send(&mut self, text: String) -> Result<(), ClientCoreError>;

	/// Drop the connection. No further events are emitted for it.
	fn close(&mut self);

	fn is_open(&self) -> bool;
}

/// Websocket transport over `tokio-tungstenite`.
#[derive(Default)]
pub struct WsTransport {
	writer: Option<mpsc::UnboundedSender<Message>>,
	open: Arc<AtomicBool>,
	task: Option<JoinHandle<()>>,
}

impl WsTransport {
	pub fn new() -> Self {
		Self::default()
	}
}

impl Transport for WsTransport {
	fn open(&mut self, url: &str, events: TransportEventTx) -> Result<(), ClientCoreError> {
		self.close();

		let url = Url::parse(url).map_err(|e| ClientCoreError::InvalidUrl(e.to_string()))?;
		let (writer_tx, writer_rx) = mpsc::unbounded_channel();
		let open = Arc::new(AtomicBool::new(false));

		self.open = Arc::clone(&open);
		self.writer = Some(writer_tx);
		self.task = Some(tokio::spawn(run_socket(url, writer_rx, events, open)));
		Ok(())
	}

	fn send(&mut self, text: String) -> Result<(), ClientCoreError> {
		if !self.is_open() {
			return Err(ClientCoreError::NotOpen);
		}
		let writer = self.writer.as_ref().ok_or(ClientCoreError::NotOpen)?;
		writer.send(Message::Text(text.into())).map_err(|_| ClientCoreError::NotOpen)
	}

	fn close(&mut self) {
		self.writer = None;
		self.open.store(false, Ordering::SeqCst);
		if let Some(task) = self.task.take() {
			task.abort();
		}
	}

	fn is_open(&self) -> bool {
		self.open.load(Ordering::SeqCst)
	}
}

impl Drop for WsTransport {
	fn drop(&mut self) {
		self.close();
	}
}

async fn run_socket(
	url: Url,
	mut writer_rx: mpsc::UnboundedReceiver<Message>,
	events: TransportEventTx,
	open: Arc<AtomicBool>,
) {
	let ws = match tokio_tungstenite::connect_async(url.as_str()).await {
		Ok((ws, _resp)) => ws,
		Err(e) => {
			warn!(error = %e, url = %url, "websocket connect failed");
			let _ = events.send(TransportEvent::Error(e.to_string()));
			let _ = events.send(TransportEvent::Closed(None));
			return;
		}
	};

	debug!(url = %url, "websocket connected");
	open.store(true, Ordering::SeqCst);
	let _ = events.send(TransportEvent::Opened);

	let (mut sink, mut stream) = ws.split();

	let reason = loop {
		tokio::select! {
			out = writer_rx.recv() => {
				let Some(msg) = out else {
					let _ = sink.close().await;
					break Some("closed locally".to_string());
				};
				if let Err(e) = sink.send(msg).await {
					let _ = events.send(TransportEvent::Error(e.to_string()));
					break None;
				}
			}

			inbound = stream.next() => {
				let Some(inbound) = inbound else {
					break None;
				};
				match inbound {
					Ok(Message::Text(text)) => {
						let _ = events.send(TransportEvent::MessageReceived(text.as_str().to_owned()));
					}
					Ok(Message::Close(frame)) => {
						break frame.map(|f| f.reason.as_str().to_owned());
					}
					Ok(_) => {}
					Err(e) => {
						let _ = events.send(TransportEvent::Error(e.to_string()));
						break None;
					}
				}
			}
		}
	};

	open.store(false, Ordering::SeqCst);
	let _ = events.send(TransportEvent::Closed(reason));
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
	//! In-memory transport driven by the test through [`MockRemote`].

	use std::sync::Arc;

	use parking_lot::Mutex;
	use tokio::sync::mpsc;

	use super::{Transport, TransportEvent, TransportEventTx};
	use crate::error::ClientCoreError;

	/// What the connection manager did to the transport.
	#[derive(Debug, Clone, PartialEq, Eq)]
	pub enum MockCall {
		Open(String),
		Send(String),
		Close,
	}

	#[derive(Default)]
	struct Shared {
		events: Option<TransportEventTx>,
		open: bool,
	}

	pub struct MockTransport {
		shared: Arc<Mutex<Shared>>,
		calls: mpsc::UnboundedSender<MockCall>,
	}

	pub struct MockRemote {
		shared: Arc<Mutex<Shared>>,
		calls: mpsc::UnboundedReceiver<MockCall>,
	}

	impl MockTransport {
		pub fn new() -> (Self, MockRemote) {
			let shared = Arc::new(Mutex::new(Shared::default()));
			let (tx, rx) = mpsc::unbounded_channel();
			(
				Self {
					shared: Arc::clone(&shared),
					calls: tx,
				},
				MockRemote { shared, calls: rx },
			)
		}
	}

	impl Transport for MockTransport {
		fn open(&mut self, url: &str, events: TransportEventTx) -> Result<(), ClientCoreError> {
			self.shared.lock().events = Some(events);
			let _ = self.calls.send(MockCall::Open(url.to_string()));
			Ok(())
		}

		fn send(&mut self, text: String) -> Result<(), ClientCoreError> {
			if !self.shared.lock().open {
				return Err(ClientCoreError::NotOpen);
			}
			let _ = self.calls.send(MockCall::Send(text));
			Ok(())
		}

		fn close(&mut self) {
			let mut shared = self.shared.lock();
			shared.open = false;
			shared.events = None;
			let _ = self.calls.send(MockCall::Close);
		}

		fn is_open(&self) -> bool {
			self.shared.lock().open
		}
	}

	impl MockRemote {
		/// Deliver an event as if the socket produced it.
		pub fn emit(&self, event: TransportEvent) {
			let mut shared = self.shared.lock();
			match &event {
				TransportEvent::Opened => shared.open = true,
				TransportEvent::Closed(_) => shared.open = false,
				_ => {}
			}
			if let Some(tx) = &shared.events {
				let _ = tx.send(event);
			}
		}

		pub fn open(&self) {
			self.emit(TransportEvent::Opened);
		}

		pub fn receive(&self, frame: &str) {
			self.emit(TransportEvent::MessageReceived(frame.to_string()));
		}

		pub async fn next_call(&mut self) -> Option<MockCall> {
			self.calls.recv().await
		}

		/// Next frame the client sent, skipping opens and closes.
		pub async fn next_sent(&mut self) -> Option<String> {
			loop {
				match self.calls.recv().await? {
					MockCall::Send(text) => return Some(text),
					_ => continue,
				}
			}
		}

		pub fn try_next_call(&mut self) -> Option<MockCall> {
			self.calls.try_recv().ok()
		}
	}
}

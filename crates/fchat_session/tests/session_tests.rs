#![forbid(unsafe_code)]

use std::time::Duration;

use fchat_client_core::transport::mock::{MockCall, MockRemote, MockTransport};
use fchat_client_core::{ConnectionConfig, ConnectionEvent, SecretString, SharedTicket};
use fchat_session::{Collaborators, Notification, Session, SessionConfig, SessionHandle, Update};
use tokio::sync::broadcast;
use tokio::time::timeout;

struct Harness {
	session: SessionHandle,
	remote: MockRemote,
	updates: broadcast::Receiver<Notification>,
}

fn start() -> Harness {
	let cfg = SessionConfig {
		account: "acct".to_string(),
		..SessionConfig::default()
	};
	let (transport, remote) = MockTransport::new();
	let session = Session::start(
		&cfg,
		ConnectionConfig::new("acct"),
		Box::new(transport),
		SharedTicket::new(SecretString::new("tkt")),
		Collaborators::in_memory(),
	);
	let updates = session.subscribe();
	Harness {
		session,
		remote,
		updates,
	}
}

impl Harness {
	async fn next_sent(&mut self) -> String {
		timeout(Duration::from_secs(60), self.remote.next_sent())
			.await
			.expect("send timeout")
			.expect("call channel closed")
	}

	/// Connect as `Me`, answer the login and drain the post-login requests.
	async fn login(&mut self) {
		self.session.connect("Me").expect("connect");
		let open = timeout(Duration::from_secs(60), self.remote.next_call())
			.await
			.expect("open timeout");
		assert!(matches!(open, Some(MockCall::Open(_))));
		self.remote.open();
		assert!(self.next_sent().await.starts_with("IDN "));

		self.remote.receive(r#"IDN {"character":"Me"}"#);
		assert_eq!(self.next_sent().await, "CHA");
		assert_eq!(self.next_sent().await, "ORS");
		assert_eq!(self.next_sent().await, "UPT");
	}

	fn drain_updates(&mut self) -> Vec<Update> {
		let mut out = Vec::new();
		while let Ok(n) = self.updates.try_recv() {
			out.push(n.update);
		}
		out
	}
}

#[tokio::test(start_paused = true)]
async fn login_flow_authenticates_the_session() {
	let mut h = start();
	h.login().await;
	tokio::time::sleep(Duration::from_millis(10)).await;

	assert!(h.session.state().read().authenticated);
	let updates = h.drain_updates();
	assert!(updates.contains(&Update::Connection(ConnectionEvent::Connecting)));
	assert!(updates.contains(&Update::Connection(ConnectionEvent::Authenticated)));
}

#[tokio::test(start_paused = true)]
async fn ping_is_answered_without_touching_state() {
	let mut h = start();
	h.login().await;
	let before = h.session.state().read().notification_count();

	h.remote.receive("PIN");
	assert_eq!(h.next_sent().await, "PIN");
	tokio::time::sleep(Duration::from_millis(10)).await;
	assert_eq!(h.session.state().read().notification_count(), before);
}

#[tokio::test(start_paused = true)]
async fn join_for_unknown_channel_resolves_after_self_join() {
	let mut h = start();
	h.login().await;

	h.remote.receive(r#"JCH {"channel":"Frontpage","character":{"identity":"Bob"}}"#);
	h.remote.receive(r#"JCH {"channel":"Frontpage","character":{"identity":"Me"},"title":"Frontpage"}"#);

	tokio::time::sleep(Duration::from_millis(100)).await;
	{
		let st = h.session.state().read();
		let front = st.find_channel("Frontpage").expect("channel");
		assert!(front.is_joined);
		assert!(!front.has_member("Bob"));
	}

	tokio::time::sleep(Duration::from_secs(1)).await;
	let st = h.session.state().read();
	let front = st.find_channel("Frontpage").expect("channel");
	assert!(front.has_member("Bob"));
	assert_eq!(front.member_count, 2);
}

#[tokio::test(start_paused = true)]
async fn outbound_commands_reach_the_socket() {
	let mut h = start();
	h.login().await;

	h.session
		.send(&fchat_protocol::ClientCommand::JoinChannel {
			channel: "Frontpage".to_string(),
		})
		.expect("send");
	assert_eq!(h.next_sent().await, r#"JCH {"channel":"Frontpage"}"#);
}

#[tokio::test(start_paused = true)]
async fn closing_after_login_is_reported_as_fatal() {
	let mut h = start();
	h.login().await;

	h.remote.emit(fchat_client_core::TransportEvent::Closed(Some("bye".to_string())));
	tokio::time::sleep(Duration::from_millis(10)).await;

	assert!(!h.session.state().read().authenticated);
	assert!(
		h.drain_updates()
			.iter()
			.any(|u| matches!(u, Update::Connection(ConnectionEvent::Fatal { .. })))
	);
}

async fn leave_before_join_is_replayed(listed: bool) {
	let mut h = start();
	h.login().await;
	if listed {
		h.remote.receive(r#"CHA {"channels":[{"name":"Dice","mode":"both","characters":3}]}"#);
	}

	h.remote.receive(r#"LCH {"channel":"Dice","character":"Bob"}"#);
	h.remote.receive(r#"JCH {"channel":"Dice","character":{"identity":"Me"},"title":"Dice"}"#);
	h.remote.receive(r#"ICH {"channel":"Dice","mode":"both","users":[{"identity":"Me"},{"identity":"Bob"}]}"#);

	tokio::time::sleep(Duration::from_millis(100)).await;
	assert!(h.session.state().read().find_channel("Dice").expect("channel").has_member("Bob"));

	tokio::time::sleep(Duration::from_secs(1)).await;
	let st = h.session.state().read();
	let dice = st.find_channel("Dice").expect("channel");
	assert!(dice.is_joined);
	assert!(dice.has_member("Me"));
	assert!(!dice.has_member("Bob"));
}

#[tokio::test(start_paused = true)]
async fn leave_for_unknown_channel_applies_after_join() {
	leave_before_join_is_replayed(false).await;
}

#[tokio::test(start_paused = true)]
async fn leave_for_listed_channel_applies_after_join() {
	leave_before_join_is_replayed(true).await;
}

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use fchat_client_core::ClientCoreError;
use fchat_domain::{ChannelId, ChannelKind, ChannelMode, CharacterName, CharacterStatus, TypingStatus};
use fchat_protocol::{ClientCommand, Frame, RawCommand, parse_frame};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::*;
use crate::events::ListKind;
use crate::logger::NullChatLogger;
use crate::settings::MemorySettingsStore;
use crate::state::LineKind;

#[derive(Default)]
struct RecordingOutbox {
	sent: Mutex<Vec<ClientCommand>>,
}

impl RecordingOutbox {
	fn take(&self) -> Vec<ClientCommand> {
		std::mem::take(&mut *self.sent.lock())
	}
}

impl Outbox for RecordingOutbox {
	fn send(&self, command: ClientCommand) -> Result<(), ClientCoreError> {
		self.sent.lock().push(command);
		Ok(())
	}
}

struct Fixture {
	interp: Interpreter,
	outbox: Arc<RecordingOutbox>,
	settings: Arc<MemorySettingsStore>,
	updates: broadcast::Receiver<Notification>,
}

fn raw(frame: &str) -> RawCommand {
	match parse_frame(frame).expect("valid frame") {
		Frame::Command(raw) => raw,
		Frame::Bare(code) => RawCommand::new(code, Default::default()),
	}
}

impl Fixture {
	fn new() -> Self {
		Self::with_settings(MemorySettingsStore::default())
	}

	fn with_settings(settings: MemorySettingsStore) -> Self {
		let outbox = Arc::new(RecordingOutbox::default());
		let settings = Arc::new(settings);
		let bus = EventBus::new(64);
		let updates = bus.subscribe();
		let interp = Interpreter::new(
			InterpreterConfig::default(),
			ChatState::default().shared(),
			bus,
			outbox.clone(),
			Collaborators {
				logger: Arc::new(NullChatLogger),
				settings: settings.clone(),
			},
		);
		Self {
			interp,
			outbox,
			settings,
			updates,
		}
	}

	fn feed(&mut self, frame: &str) -> Disposition {
		self.interp.handle(&raw(frame)).expect("handled")
	}

	fn updates(&mut self) -> Vec<Update> {
		let mut out = Vec::new();
		while let Ok(n) = self.updates.try_recv() {
			out.push(n.update);
		}
		out
	}

	/// Identify as `Me` and join Frontpage, discarding the resulting traffic.
	fn logged_in(&mut self) {
		self.feed(r#"IDN {"character":"Me"}"#);
		self.feed(r#"JCH {"channel":"Frontpage","character":{"identity":"Me"},"title":"Frontpage"}"#);
		self.outbox.take();
		self.updates();
	}
}

fn bob_thread() -> ChannelId {
	ChannelId::private(&CharacterName::new("Bob").expect("name"))
}

#[test]
fn identify_requests_listings_and_uptime() {
	let mut fx = Fixture::new();
	assert_eq!(fx.feed(r#"IDN {"character":"Me"}"#), Disposition::Done);

	assert_eq!(
		fx.outbox.take(),
		vec![ClientCommand::PublicChannels, ClientCommand::PrivateChannels, ClientCommand::Uptime]
	);
	let st = fx.interp.state().read();
	assert!(st.authenticated);
	assert_eq!(st.account.current.as_ref().map(|c| c.as_str()), Some("Me"));
}

#[tokio::test(start_paused = true)]
async fn saved_channels_are_joined_after_identify() {
	let mut fx = Fixture::with_settings(MemorySettingsStore::with_channels(["Frontpage", "ADH-1"]));
	fx.feed(r#"IDN {"character":"Me"}"#);

	tokio::time::sleep(Duration::from_secs(1)).await;

	let joins: Vec<_> = fx
		.outbox
		.take()
		.into_iter()
		.filter_map(|c| match c {
			ClientCommand::JoinChannel { channel } => Some(channel),
			_ => None,
		})
		.collect();
	assert_eq!(joins, vec!["Frontpage", "ADH-1"]);
}

#[test]
fn public_listing_creates_channels() {
	let mut fx = Fixture::new();
	fx.feed(r#"CHA {"channels":[{"name":"Frontpage","mode":"both","characters":5},{"name":"Dice","mode":"chat","characters":"2"}]}"#);

	let st = fx.interp.state().read();
	let front = st.find_channel("Frontpage").expect("frontpage");
	assert_eq!(front.kind, ChannelKind::Public);
	assert_eq!(front.mode, ChannelMode::Both);
	assert_eq!(front.member_count, 5);
	assert!(!front.is_joined);
	assert_eq!(st.find_channel("Dice").map(|c| c.member_count), Some(2));
}

#[test]
fn self_join_marks_joined_and_remembers_channel() {
	let mut fx = Fixture::new();
	fx.feed(r#"IDN {"character":"Me"}"#);
	fx.feed(r#"JCH {"channel":"ADH-9f","character":{"identity":"Me"},"title":"Tea Room"}"#);

	{
		let st = fx.interp.state().read();
		let room = st.find_channel("ADH-9f").expect("room");
		assert!(room.is_joined);
		assert_eq!(room.kind, ChannelKind::Private);
		assert_eq!(room.title, "Tea Room");
		assert_eq!(st.current_channel().map(|c| c.as_str()), Some("ADH-9f"));
	}
	assert_eq!(fx.settings.saved_channels(), vec!["ADH-9f"]);
	assert!(fx.updates().iter().any(|u| matches!(u, Update::JoinLeft { joined: true, .. })));
}

#[test]
fn join_by_other_before_self_is_requeued() {
	let mut fx = Fixture::new();
	fx.feed(r#"IDN {"character":"Me"}"#);
	let d = fx.feed(r#"JCH {"channel":"Frontpage","character":{"identity":"Bob"}}"#);
	assert_eq!(d, Disposition::Requeue);
}

#[test]
fn leave_for_unknown_channel_is_requeued() {
	let mut fx = Fixture::new();
	fx.logged_in();
	assert_eq!(
		fx.feed(r#"LCH {"channel":"Nowhere","character":"Bob"}"#),
		Disposition::Requeue
	);
	assert!(fx.updates().is_empty());
}

#[test]
fn leave_for_listed_but_unjoined_channel_is_requeued() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"CHA {"channels":[{"name":"Dice","mode":"both","characters":2}]}"#);

	assert_eq!(fx.feed(r#"LCH {"channel":"Dice","character":"Bob"}"#), Disposition::Requeue);

	fx.feed(r#"JCH {"channel":"Dice","character":{"identity":"Me"},"title":"Dice"}"#);
	fx.feed(r#"ICH {"channel":"Dice","mode":"both","users":[{"identity":"Me"},{"identity":"Bob"}]}"#);
	assert_eq!(fx.feed(r#"LCH {"channel":"Dice","character":"Bob"}"#), Disposition::Done);

	let st = fx.interp.state().read();
	assert!(!st.find_channel("Dice").expect("dice").has_member("Bob"));
}

#[test]
fn stray_join_after_leaving_does_not_rejoin() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"LCH {"channel":"Frontpage","character":"Me"}"#);
	fx.outbox.take();

	let d = fx.feed(r#"JCH {"channel":"Frontpage","character":{"identity":"Bob"}}"#);
	assert_eq!(d, Disposition::Requeue);
	assert!(fx.outbox.take().is_empty());
	assert!(!fx.interp.state().read().find_channel("Frontpage").expect("frontpage").is_joined);
}

#[test]
fn status_updates_are_idempotent() {
	let mut fx = Fixture::new();
	fx.feed(r#"NLN {"identity":"Bob","gender":"Male","status":"online"}"#);
	fx.updates();

	fx.feed(r#"STA {"character":"Bob","status":"busy","statusmsg":"afk"}"#);
	fx.feed(r#"STA {"character":"Bob","status":"busy","statusmsg":"afk"}"#);

	let updates = fx.updates();
	assert_eq!(updates.len(), 1);
	assert_eq!(
		updates[0],
		Update::StatusChanged {
			character: "Bob".into(),
			status: CharacterStatus::Busy,
			message: "afk".into(),
		}
	);
}

#[test]
fn first_description_is_applied_silently() {
	let mut fx = Fixture::new();
	fx.logged_in();

	fx.feed(r#"CDS {"channel":"Frontpage","description":"Welcome"}"#);
	assert!(fx.updates().is_empty());

	fx.feed(r#"CDS {"channel":"Frontpage","description":"Welcome"}"#);
	assert!(fx.updates().is_empty());

	fx.feed(r#"CDS {"channel":"Frontpage","description":"Be nice"}"#);
	assert_eq!(
		fx.updates(),
		vec![Update::ChannelDescriptionChanged {
			channel: ChannelId::new("Frontpage").expect("id"),
			description: "Be nice".into(),
		}]
	);
}

#[test]
fn mode_change_after_initial_data_is_reported() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"ICH {"channel":"Frontpage","users":[{"identity":"Me"},{"identity":"Bob"}],"mode":"both"}"#);
	assert!(fx.updates().is_empty());

	fx.feed(r#"RMO {"channel":"Frontpage","mode":"ads"}"#);
	assert!(matches!(
		fx.updates().as_slice(),
		[Update::ChannelModeChanged { mode: ChannelMode::Ads, .. }]
	));

	let st = fx.interp.state().read();
	assert_eq!(st.find_channel("Frontpage").map(|c| c.member_count), Some(2));
}

#[test]
fn unknown_room_status_is_an_error() {
	let mut fx = Fixture::new();
	fx.logged_in();
	let err = fx
		.interp
		.handle(&raw(r#"RST {"channel":"Frontpage","status":"sideways"}"#))
		.expect_err("should fail");
	assert!(matches!(err, InterpretError::InvalidValue { field: "status", .. }));
}

#[test]
fn disconnect_reports_channel_leaves_as_already_covered() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"JCH {"channel":"Frontpage","character":{"identity":"Bob"}}"#);
	fx.updates();

	fx.feed(r#"FLN {"character":"Bob"}"#);

	let updates = fx.updates();
	assert_eq!(
		updates,
		vec![
			Update::LoginStateChanged {
				character: "Bob".into(),
				online: false,
			},
			Update::JoinLeft {
				channel: ChannelId::new("Frontpage").expect("id"),
				character: "Bob".into(),
				joined: false,
				ignore_update: true,
			},
		]
	);
	let st = fx.interp.state().read();
	assert!(st.find_character("Bob").is_none());
	assert!(!st.find_channel("Frontpage").expect("channel").has_member("bob"));
}

#[test]
fn kick_of_self_uses_sentinel_and_leaves() {
	let mut fx = Fixture::new();
	fx.logged_in();

	fx.feed(r#"CKU {"operator":"Mod","channel":"Frontpage","character":"me"}"#);

	assert_eq!(
		fx.updates(),
		vec![Update::Moderation {
			channel: ChannelId::new("Frontpage").expect("id"),
			action: ModerationAction::Kick,
			operator: "Mod".into(),
			target: "you".into(),
		}]
	);
	let st = fx.interp.state().read();
	assert!(!st.find_channel("Frontpage").expect("channel").is_joined);
	assert!(st.current_channel().is_none());
	assert!(fx.settings.saved_channels().is_empty());
}

#[test]
fn timeout_carries_its_length() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"JCH {"channel":"Frontpage","character":{"identity":"Bob"}}"#);
	fx.updates();

	fx.feed(r#"CTU {"operator":"Mod","channel":"Frontpage","character":"Bob","length":"30"}"#);
	assert!(matches!(
		fx.updates().as_slice(),
		[Update::Moderation {
			action: ModerationAction::Timeout { minutes: 30 },
			..
		}]
	));
}

#[test]
fn repeated_ad_is_dropped() {
	let mut fx = Fixture::new();
	fx.logged_in();

	fx.feed(r#"LRP {"channel":"Frontpage","character":"Bob","message":"Looking for a scene"}"#);
	fx.feed(r#"LRP {"channel":"Frontpage","character":"Bob","message":"Looking for a scene"}"#);

	let ads: Vec<_> = fx
		.updates()
		.into_iter()
		.filter(|u| matches!(u, Update::Message { kind: LineKind::Ad, .. }))
		.collect();
	assert_eq!(ads.len(), 1);
	let st = fx.interp.state().read();
	assert_eq!(st.find_channel("Frontpage").map(|c| c.history_len()), Some(1));
}

#[test]
fn message_naming_us_raises_a_mention() {
	let mut fx = Fixture::new();
	fx.logged_in();

	fx.feed(r#"MSG {"channel":"Frontpage","character":"Bob","message":"hey ME, over here"}"#);
	let updates = fx.updates();
	assert!(matches!(updates[0], Update::Message { kind: LineKind::Normal, .. }));
	assert!(matches!(&updates[1], Update::Mention { keyword, .. } if keyword == "Me"));

	fx.feed(r#"MSG {"channel":"Frontpage","character":"Me","message":"talking about me"}"#);
	assert_eq!(fx.updates().len(), 1);
}

#[test]
fn message_to_unknown_channel_is_requeued() {
	let mut fx = Fixture::new();
	fx.logged_in();
	assert_eq!(
		fx.feed(r#"MSG {"channel":"Later","character":"Bob","message":"hi"}"#),
		Disposition::Requeue
	);
}

#[test]
fn ignored_characters_are_silenced() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"IGN {"action":"init","characters":["Bob"]}"#);

	fx.feed(r#"MSG {"channel":"Frontpage","character":"bob","message":"hello"}"#);
	assert!(fx.updates().is_empty());

	fx.feed(r#"IGN {"action":"delete","character":"Bob"}"#);
	assert_eq!(
		fx.updates(),
		vec![Update::ListChanged {
			list: ListKind::Ignored,
			character: "Bob".into(),
			added: false,
		}]
	);
}

#[test]
fn private_message_opens_conversation_and_clears_typing() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"TPN {"character":"Bob","status":"typing"}"#);
	fx.feed(r#"PRI {"character":"Bob","message":"psst"}"#);

	let st = fx.interp.state().read();
	let pm = st.find_channel(bob_thread().as_str()).expect("pm channel");
	assert_eq!(pm.kind, ChannelKind::PrivateMessage);
	assert!(pm.is_joined);
	assert_eq!(pm.history().last().map(|l| l.text.as_str()), Some("psst"));
	assert_eq!(st.find_character("Bob").map(|c| c.typing), Some(TypingStatus::Clear));
}

#[test]
fn private_roll_lands_in_the_conversation() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"RLL {"recipient":"Bob","character":"Me","message":"Me rolls 1d6: 4","type":"dice"}"#);

	let st = fx.interp.state().read();
	let pm = st.find_channel(bob_thread().as_str()).expect("pm channel");
	assert_eq!(pm.history().last().map(|l| l.kind), Some(LineKind::Roll));
}

#[test]
fn private_message_from_character_named_like_a_room_stays_private() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"CHA {"channels":[{"name":"Dragons","mode":"both","characters":4}]}"#);
	fx.feed(r#"PRI {"character":"Dragons","message":"secret"}"#);

	let st = fx.interp.state().read();
	let room = st.find_channel("Dragons").expect("room");
	assert_eq!(room.kind, ChannelKind::Public);
	assert!(!room.is_joined);
	assert_eq!(room.history_len(), 0);

	let thread = ChannelId::private(&CharacterName::new("Dragons").expect("name"));
	let pm = st.find_channel(thread.as_str()).expect("pm channel");
	assert_eq!(pm.kind, ChannelKind::PrivateMessage);
	assert_eq!(pm.history().last().map(|l| l.text.as_str()), Some("secret"));
}

#[test]
fn server_channel_names_never_reach_private_threads() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"PRI {"character":"Bob","message":"hi"}"#);

	assert_eq!(fx.feed(r#"MSG {"channel":"pm:bob","character":"Eve","message":"spoof"}"#), Disposition::Requeue);
	let st = fx.interp.state().read();
	let pm = st.find_channel(bob_thread().as_str()).expect("pm channel");
	assert_eq!(pm.history().last().map(|l| l.text.as_str()), Some("hi"));
}

#[test]
fn system_ban_list_replaces_bans() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"SYS {"channel":"Frontpage","message":"Channel bans for Frontpage: Alice, Bob"}"#);

	let st = fx.interp.state().read();
	assert_eq!(st.find_channel("Frontpage").expect("channel").bans, vec!["Alice", "Bob"]);
	drop(st);
	assert!(fx.updates().is_empty());
}

#[test]
fn system_room_type_change_updates_kind() {
	let mut fx = Fixture::new();
	fx.feed(r#"IDN {"character":"Me"}"#);
	fx.feed(r#"JCH {"channel":"ADH-1","character":{"identity":"Me"},"title":"Room"}"#);
	fx.updates();

	fx.feed(r#"SYS {"channel":"ADH-1","message":"This channel is now [b]closed[/b]."}"#);
	assert_eq!(
		fx.updates(),
		vec![Update::ChannelKindChanged {
			channel: ChannelId::new("ADH-1").expect("id"),
			kind: ChannelKind::InviteOnly,
		}]
	);
}

#[test]
fn promotion_echoes_are_swallowed() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"SYS {"channel":"Frontpage","message":"Bob has been promoted to channel moderator."}"#);
	fx.feed(r#"ERR {"number":"11","message":"Bob has been removed."}"#);
	assert!(fx.updates().is_empty());

	fx.feed(r#"ERR {"number":4,"message":"Identification failed."}"#);
	assert_eq!(
		fx.updates(),
		vec![Update::Error {
			number: 4,
			message: "Identification failed.".into(),
		}]
	);
}

#[test]
fn report_without_markers_keeps_whole_body() {
	let mut fx = Fixture::new();
	fx.feed(r#"SFC {"action":"report","callid":"77","character":"Bob","report":"  they were rude  ","logid":12}"#);

	let updates = fx.updates();
	let [
		Update::ReportFiled {
			call_id,
			reporter,
			report,
			log_id,
		},
	] = updates.as_slice()
	else {
		panic!("unexpected updates: {updates:?}");
	};
	assert_eq!(call_id, "77");
	assert_eq!(reporter, "Bob");
	assert_eq!(report.complaint, "they were rude");
	assert_eq!(report.tab, None);
	assert_eq!(*log_id, Some(12));

	let st = fx.interp.state().read();
	assert!(st.find_character("Bob").and_then(|c| c.last_report.as_ref()).is_some());
}

#[test]
fn bridge_friend_events_update_lists() {
	let mut fx = Fixture::new();
	fx.feed(r#"RTB {"type":"friendadd","name":"Bob"}"#);
	fx.feed(r#"RTB {"type":"trackadd","name":"Carol"}"#);
	fx.feed(r#"RTB {"type":"note","sender":"Dan","subject":"hi","id":"5"}"#);

	assert_eq!(
		fx.updates(),
		vec![
			Update::ListChanged {
				list: ListKind::Friends,
				character: "Bob".into(),
				added: true,
			},
			Update::ListChanged {
				list: ListKind::Bookmarks,
				character: "Carol".into(),
				added: true,
			},
			Update::Note {
				sender: "Dan".into(),
				subject: "hi".into(),
				id: 5,
			},
		]
	);
}

#[test]
fn channel_promotion_names_the_sentinel_for_us() {
	let mut fx = Fixture::new();
	fx.logged_in();
	fx.feed(r#"COA {"channel":"Frontpage","character":"Me"}"#);
	assert_eq!(
		fx.updates(),
		vec![Update::PromoteDemote {
			channel: Some(ChannelId::new("Frontpage").expect("id")),
			character: "you".into(),
			promoted: true,
		}]
	);

	fx.feed(r#"CSO {"channel":"Frontpage","character":"Bob"}"#);
	let st = fx.interp.state().read();
	assert_eq!(st.find_channel("Frontpage").and_then(|c| c.owner()), Some("Bob"));
}

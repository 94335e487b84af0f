#![forbid(unsafe_code)]

//! Free-text classifiers for messages the server multiplexes onto generic
//! commands.
//!
//! The server's phrasing is an external contract; everything that sniffs
//! text lives here.

const BAN_LIST_MARKER: &str = "channel bans";
const ROOM_TYPE_MARKER: &str = "this channel is now";
const PROMOTION_MARKER: &str = "has been";

const TAB_MARKER: &str = "Current Tab/Channel:";
const USER_MARKER: &str = "Reporting User:";

/// Listing state announced by a room-type change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomVisibility {
	Open,
	InviteOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemMessageKind {
	/// The room was opened to the public or closed to invitations.
	RoomTypeChanged(RoomVisibility),
	/// Full ban list for the channel the message names.
	BanList(Vec<String>),
	/// Echo of a promotion the client already saw as a typed command.
	PromotionNotice,
	Plain,
}

fn strip_bbcode(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	let mut rest = text;
	while let Some(start) = rest.find('[') {
		out.push_str(&rest[..start]);
		match rest[start..].find(']') {
			Some(end) => rest = &rest[start + end + 1..],
			None => {
				out.push_str(&rest[start..]);
				rest = "";
			}
		}
	}
	out.push_str(rest);
	out
}

/// Decide what a `SYS`/`ERR` free-text message actually carries.
///
/// Checks run in order: ban list, room type, promotion notice.
pub fn classify_system_message(message: &str) -> SystemMessageKind {
	let plain = strip_bbcode(message);
	let lower = plain.to_lowercase();

	if lower.contains(BAN_LIST_MARKER) {
		let names = plain
			.split_once(':')
			.map(|(_, list)| {
				list.split(',')
					.map(str::trim)
					.filter(|name| !name.is_empty())
					.map(str::to_string)
					.collect()
			})
			.unwrap_or_default();
		return SystemMessageKind::BanList(names);
	}

	if let Some(pos) = lower.find(ROOM_TYPE_MARKER) {
		let tail = &lower[pos + ROOM_TYPE_MARKER.len()..];
		let visibility = if tail.contains("closed") || tail.contains("invite") || tail.contains("private") {
			RoomVisibility::InviteOnly
		} else if tail.contains("open") || tail.contains("public") {
			RoomVisibility::Open
		} else {
			RoomVisibility::InviteOnly
		};
		return SystemMessageKind::RoomTypeChanged(visibility);
	}

	if lower.contains(PROMOTION_MARKER) {
		return SystemMessageKind::PromotionNotice;
	}

	SystemMessageKind::Plain
}

/// Structured view of a staff report body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Report {
	pub tab: Option<String>,
	pub reported: Option<String>,
	pub complaint: String,
}

fn segment(text: &str) -> (&str, &str) {
	match text.split_once('|') {
		Some((head, tail)) => (head.trim(), tail),
		None => (text.trim(), ""),
	}
}

/// Split a report body on its marker substrings.
///
/// Bodies missing either marker come back as a bare complaint.
pub fn parse_report(body: &str) -> Report {
	let (Some(tab_at), Some(user_at)) = (body.find(TAB_MARKER), body.find(USER_MARKER)) else {
		return Report {
			complaint: body.trim().to_string(),
			..Report::default()
		};
	};
	if user_at < tab_at {
		return Report {
			complaint: body.trim().to_string(),
			..Report::default()
		};
	}

	let (tab, _) = segment(&body[tab_at + TAB_MARKER.len()..user_at]);
	let (reported, rest) = segment(&body[user_at + USER_MARKER.len()..]);
	let complaint = rest.trim_start_matches(['|', ' ']).trim();

	Report {
		tab: (!tab.is_empty()).then(|| tab.to_string()),
		reported: (!reported.is_empty()).then(|| reported.to_string()),
		complaint: complaint.to_string(),
	}
}

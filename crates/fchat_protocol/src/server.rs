#![forbid(unsafe_code)]

//! Typed view of inbound commands.

use fchat_domain::{CharacterStatus, ChannelMode, Gender, TypingStatus};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::framing::RawCommand;
use crate::ids::{FlexId, FlexString};

#[derive(Debug, Error)]
#[error("failed to decode {code} payload: {source}")]
pub struct DecodeError {
	pub code: String,
	pub raw: RawCommand,
	#[source]
	pub source: serde_json::Error,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Identity {
	pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CharacterRef {
	pub character: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Identify {
	pub character: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerVariable {
	pub variable: String,
	pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Hello {
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectedCount {
	pub count: FlexId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FriendsList {
	#[serde(default)]
	pub characters: Vec<String>,
}

/// `IGN` carries a list on `init`/`list` and a single name on `add`/`delete`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IgnoreList {
	pub action: String,
	#[serde(default)]
	pub characters: Vec<String>,
	#[serde(default)]
	pub character: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GlobalOps {
	#[serde(default)]
	pub ops: Vec<String>,
}

/// One `LIS` entry: `[name, gender, status, status message]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RosterEntry(pub String, pub Gender, pub CharacterStatus, pub String);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RosterSnapshot {
	#[serde(default)]
	pub characters: Vec<RosterEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CharacterOnline {
	pub identity: String,
	#[serde(default)]
	pub gender: Gender,
	#[serde(default)]
	pub status: CharacterStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusChange {
	pub character: String,
	pub status: CharacterStatus,
	#[serde(default)]
	pub statusmsg: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypingChange {
	pub character: String,
	pub status: TypingStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PublicChannelEntry {
	pub name: String,
	#[serde(default)]
	pub mode: ChannelMode,
	#[serde(default)]
	pub characters: FlexId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PublicChannelList {
	#[serde(default)]
	pub channels: Vec<PublicChannelEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrivateChannelEntry {
	pub name: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub characters: FlexId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrivateChannelList {
	#[serde(default)]
	pub channels: Vec<PrivateChannelEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelJoin {
	pub channel: String,
	pub character: Identity,
	#[serde(default)]
	pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelLeave {
	pub channel: String,
	pub character: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelInitial {
	pub channel: String,
	#[serde(default)]
	pub users: Vec<Identity>,
	#[serde(default)]
	pub mode: ChannelMode,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelOps {
	pub channel: String,
	#[serde(default)]
	pub oplist: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelDescription {
	pub channel: String,
	#[serde(default)]
	pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelModeChange {
	pub channel: String,
	pub mode: ChannelMode,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelStatusChange {
	pub channel: String,
	pub status: String,
}

/// `CKU`, `CBU` and `CTU`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelModeration {
	pub operator: String,
	pub channel: String,
	pub character: String,
	#[serde(default)]
	pub length: Option<FlexId>,
}

/// `COA`, `COR` and `CSO`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelPromotion {
	pub channel: String,
	pub character: String,
}

/// `MSG` and `LRP`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelMessage {
	pub channel: String,
	pub character: String,
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrivateMessage {
	pub character: String,
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Roll {
	#[serde(default)]
	pub channel: Option<String>,
	#[serde(default)]
	pub recipient: Option<String>,
	pub character: String,
	pub message: String,
	#[serde(default, rename = "type")]
	pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemMessage {
	pub message: String,
	#[serde(default)]
	pub channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorMessage {
	pub number: FlexId,
	#[serde(default)]
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Broadcast {
	pub message: String,
	#[serde(default)]
	pub character: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelInvite {
	pub sender: String,
	pub title: String,
	pub name: String,
}

/// `SFC`: a new staff report or a moderator picking one up.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StaffCall {
	pub action: String,
	#[serde(default)]
	pub callid: FlexString,
	#[serde(default)]
	pub character: Option<String>,
	#[serde(default)]
	pub moderator: Option<String>,
	#[serde(default)]
	pub report: Option<String>,
	#[serde(default)]
	pub logid: Option<FlexId>,
	#[serde(default)]
	pub timestamp: Option<FlexId>,
}

/// `RTB`: site-side events relayed into chat.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bridge {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub sender: Option<String>,
	#[serde(default)]
	pub subject: Option<String>,
	#[serde(default)]
	pub id: Option<FlexId>,
	#[serde(default)]
	pub target_type: Option<String>,
	#[serde(default)]
	pub target: Option<String>,
	#[serde(default)]
	pub target_id: Option<FlexId>,
	#[serde(default)]
	pub parent_id: Option<FlexId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Uptime {
	#[serde(default)]
	pub time: Option<FlexId>,
	#[serde(default)]
	pub starttime: Option<FlexId>,
	#[serde(default)]
	pub startstring: Option<String>,
	#[serde(default)]
	pub accepted: Option<FlexId>,
	#[serde(default)]
	pub channels: Option<FlexId>,
	#[serde(default)]
	pub users: Option<FlexId>,
	#[serde(default)]
	pub maxusers: Option<FlexId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerCommand {
	Identify(Identify),
	Variable(ServerVariable),
	Hello(Hello),
	ConnectedCount(ConnectedCount),
	Friends(FriendsList),
	Ignore(IgnoreList),
	GlobalOps(GlobalOps),
	GlobalPromote(CharacterRef),
	GlobalDemote(CharacterRef),
	Roster(RosterSnapshot),
	Online(CharacterOnline),
	Offline(CharacterRef),
	Status(StatusChange),
	Typing(TypingChange),
	PublicChannels(PublicChannelList),
	PrivateChannels(PrivateChannelList),
	Join(ChannelJoin),
	Leave(ChannelLeave),
	InitialChannelData(ChannelInitial),
	ChannelOps(ChannelOps),
	Description(ChannelDescription),
	ModeChange(ChannelModeChange),
	ChannelStatus(ChannelStatusChange),
	Kick(ChannelModeration),
	Ban(ChannelModeration),
	Timeout(ChannelModeration),
	Promote(ChannelPromotion),
	Demote(ChannelPromotion),
	SetOwner(ChannelPromotion),
	Message(ChannelMessage),
	PrivateMessage(PrivateMessage),
	Ad(ChannelMessage),
	Roll(Roll),
	System(SystemMessage),
	Error(ErrorMessage),
	Broadcast(Broadcast),
	Invite(ChannelInvite),
	StaffCall(StaffCall),
	Bridge(Bridge),
	Uptime(Uptime),
	Unknown(RawCommand),
}

fn payload<T: DeserializeOwned>(raw: &RawCommand) -> Result<T, serde_json::Error> {
	serde_json::from_value(Value::Object(raw.args.clone()))
}

impl ServerCommand {
	/// Decode a raw command into its typed form.
	///
	/// Unrecognised codes become [`ServerCommand::Unknown`]; a recognised code
	/// with a payload that does not fit its shape is an error carrying the raw
	/// command back to the caller.
	pub fn decode(raw: RawCommand) -> Result<Self, DecodeError> {
		let decoded = match raw.code.as_str() {
			"IDN" => payload(&raw).map(Self::Identify),
			"VAR" => payload(&raw).map(Self::Variable),
			"HLO" => payload(&raw).map(Self::Hello),
			"CON" => payload(&raw).map(Self::ConnectedCount),
			"FRL" => payload(&raw).map(Self::Friends),
			"IGN" => payload(&raw).map(Self::Ignore),
			"ADL" => payload(&raw).map(Self::GlobalOps),
			"AOP" => payload(&raw).map(Self::GlobalPromote),
			"DOP" => payload(&raw).map(Self::GlobalDemote),
			"LIS" => payload(&raw).map(Self::Roster),
			"NLN" => payload(&raw).map(Self::Online),
			"FLN" => payload(&raw).map(Self::Offline),
			"STA" => payload(&raw).map(Self::Status),
			"TPN" => payload(&raw).map(Self::Typing),
			"CHA" => payload(&raw).map(Self::PublicChannels),
			"ORS" => payload(&raw).map(Self::PrivateChannels),
			"JCH" => payload(&raw).map(Self::Join),
			"LCH" => payload(&raw).map(Self::Leave),
			"ICH" => payload(&raw).map(Self::InitialChannelData),
			"COL" => payload(&raw).map(Self::ChannelOps),
			"CDS" => payload(&raw).map(Self::Description),
			"RMO" => payload(&raw).map(Self::ModeChange),
			"RST" => payload(&raw).map(Self::ChannelStatus),
			"CKU" => payload(&raw).map(Self::Kick),
			"CBU" => payload(&raw).map(Self::Ban),
			"CTU" => payload(&raw).map(Self::Timeout),
			"COA" => payload(&raw).map(Self::Promote),
			"COR" => payload(&raw).map(Self::Demote),
			"CSO" => payload(&raw).map(Self::SetOwner),
			"MSG" => payload(&raw).map(Self::Message),
			"PRI" => payload(&raw).map(Self::PrivateMessage),
			"LRP" => payload(&raw).map(Self::Ad),
			"RLL" => payload(&raw).map(Self::Roll),
			"SYS" => payload(&raw).map(Self::System),
			"ERR" => payload(&raw).map(Self::Error),
			"BRO" => payload(&raw).map(Self::Broadcast),
			"CIU" => payload(&raw).map(Self::Invite),
			"SFC" => payload(&raw).map(Self::StaffCall),
			"RTB" => payload(&raw).map(Self::Bridge),
			"UPT" => payload(&raw).map(Self::Uptime),
			_ => return Ok(Self::Unknown(raw)),
		};

		decoded.map_err(|source| DecodeError {
			code: raw.code.as_str().to_string(),
			raw,
			source,
		})
	}

	/// Decode, falling back to [`ServerCommand::Unknown`] on a shape mismatch.
	pub fn decode_lossy(raw: RawCommand) -> (Self, Option<serde_json::Error>) {
		match Self::decode(raw) {
			Ok(cmd) => (cmd, None),
			Err(err) => (Self::Unknown(err.raw), Some(err.source)),
		}
	}

	pub fn code(&self) -> &str {
		match self {
			Self::Identify(_) => "IDN",
			Self::Variable(_) => "VAR",
			Self::Hello(_) => "HLO",
			Self::ConnectedCount(_) => "CON",
			Self::Friends(_) => "FRL",
			Self::Ignore(_) => "IGN",
			Self::GlobalOps(_) => "ADL",
			Self::GlobalPromote(_) => "AOP",
			Self::GlobalDemote(_) => "DOP",
			Self::Roster(_) => "LIS",
			Self::Online(_) => "NLN",
			Self::Offline(_) => "FLN",
			Self::Status(_) => "STA",
			Self::Typing(_) => "TPN",
			Self::PublicChannels(_) => "CHA",
			Self::PrivateChannels(_) => "ORS",
			Self::Join(_) => "JCH",
			Self::Leave(_) => "LCH",
			Self::InitialChannelData(_) => "ICH",
			Self::ChannelOps(_) => "COL",
			Self::Description(_) => "CDS",
			Self::ModeChange(_) => "RMO",
			Self::ChannelStatus(_) => "RST",
			Self::Kick(_) => "CKU",
			Self::Ban(_) => "CBU",
			Self::Timeout(_) => "CTU",
			Self::Promote(_) => "COA",
			Self::Demote(_) => "COR",
			Self::SetOwner(_) => "CSO",
			Self::Message(_) => "MSG",
			Self::PrivateMessage(_) => "PRI",
			Self::Ad(_) => "LRP",
			Self::Roll(_) => "RLL",
			Self::System(_) => "SYS",
			Self::Error(_) => "ERR",
			Self::Broadcast(_) => "BRO",
			Self::Invite(_) => "CIU",
			Self::StaffCall(_) => "SFC",
			Self::Bridge(_) => "RTB",
			Self::Uptime(_) => "UPT",
			Self::Unknown(raw) => raw.code.as_str(),
		}
	}
}

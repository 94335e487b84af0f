#![forbid(unsafe_code)]

//! Ticket acquisition over the site's JSON endpoint.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, warn};

use crate::error::ClientCoreError;
use crate::secret::SecretString;

pub const DEFAULT_TICKET_URL: &str = "https://www.f-list.net/json/getApiTicket.php";

/// Tickets expire after half an hour; refresh ahead of that.
pub const TICKET_REFRESH_INTERVAL: Duration = Duration::from_secs(25 * 60);

/// Latest ticket, shared between the refresher and the connection manager.
#[derive(Debug, Clone, Default)]
pub struct SharedTicket(Arc<RwLock<SecretString>>);

impl SharedTicket {
	pub fn new(ticket: SecretString) -> Self {
		Self(Arc::new(RwLock::new(ticket)))
	}

	pub fn current(&self) -> SecretString {
		self.0.read().clone()
	}

	pub fn set(&self, ticket: SecretString) {
		*self.0.write() = ticket;
	}
}

/// One friend pairing: which of our characters is friends with whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendLink {
	pub own: String,
	pub other: String,
}

#[derive(Debug, Clone)]
pub struct TicketGrant {
	pub ticket: SecretString,
	pub characters: Vec<String>,
	pub default_character: Option<String>,
	pub friends: Vec<FriendLink>,
	pub bookmarks: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FriendEntry {
	source_name: String,
	dest_name: String,
}

#[derive(Debug, Deserialize)]
struct BookmarkEntry {
	name: String,
}

#[derive(Debug, Deserialize)]
struct TicketResponse {
	#[serde(default)]
	ticket: String,
	#[serde(default)]
	characters: Vec<String>,
	#[serde(default)]
	default_character: Option<String>,
	#[serde(default)]
	friends: Vec<FriendEntry>,
	#[serde(default)]
	bookmarks: Vec<BookmarkEntry>,
	#[serde(default)]
	error: String,
}

impl TicketGrant {
	/// Parse an endpoint response body.
	pub fn from_json(body: &str) -> Result<Self, ClientCoreError> {
		let resp: TicketResponse =
			serde_json::from_str(body).map_err(|e| ClientCoreError::Ticket(format!("malformed response: {e}")))?;

		if !resp.error.is_empty() {
			return Err(ClientCoreError::Ticket(resp.error));
		}
		if resp.ticket.is_empty() {
			return Err(ClientCoreError::Ticket("response carried no ticket".to_string()));
		}

		Ok(Self {
			ticket: SecretString::new(resp.ticket),
			characters: resp.characters,
			default_character: resp.default_character.filter(|c| !c.is_empty()),
			friends: resp
				.friends
				.into_iter()
				.map(|f| FriendLink {
					own: f.source_name,
					other: f.dest_name,
				})
				.collect(),
			bookmarks: resp.bookmarks.into_iter().map(|b| b.name).collect(),
		})
	}
}

#[derive(Debug, Clone)]
pub struct TicketClient {
	endpoint: String,
	client: reqwest::Client,
}

impl Default for TicketClient {
	fn default() -> Self {
		Self::new(DEFAULT_TICKET_URL)
	}
}

impl TicketClient {
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self {
			endpoint: endpoint.into(),
			client: reqwest::Client::new(),
		}
	}

	pub async fn fetch(&self, account: &str, password: &SecretString) -> Result<TicketGrant, ClientCoreError> {
		let form = [
			("account", account),
			("password", password.expose()),
			("no_characters", "false"),
			("no_friends", "false"),
			("no_bookmarks", "false"),
		];

		let body = self
			.client
			.post(&self.endpoint)
			.form(&form)
			.send()
			.await?
			.error_for_status()?
			.text()
			.await?;

		TicketGrant::from_json(&body)
	}
}

/// Refresh `shared` every `every` until the task is aborted.
pub fn spawn_ticket_refresher(
	client: TicketClient,
	account: String,
	password: SecretString,
	shared: SharedTicket,
	every: Duration,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut ticks = interval_at(Instant::now() + every, every);
		loop {
			ticks.tick().await;
			match client.fetch(&account, &password).await {
				Ok(grant) => {
					shared.set(grant.ticket);
					debug!(account = %account, "ticket refreshed");
				}
				Err(e) => warn!(error = %e, account = %account, "ticket refresh failed"),
			}
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn grant_parses_lists() {
		let body = r#"{
			"ticket": "abc",
			"characters": ["Alice", "Alicia"],
			"default_character": "Alice",
			"friends": [{"source_name": "Alice", "dest_name": "Bob"}],
			"bookmarks": [{"name": "Carol"}],
			"error": ""
		}"#;
		let grant = TicketGrant::from_json(body).unwrap();
		assert_eq!(grant.ticket.expose(), "abc");
		assert_eq!(grant.characters, vec!["Alice", "Alicia"]);
		assert_eq!(grant.default_character.as_deref(), Some("Alice"));
		assert_eq!(
			grant.friends,
			vec![FriendLink {
				own: "Alice".into(),
				other: "Bob".into()
			}]
		);
		assert_eq!(grant.bookmarks, vec!["Carol"]);
	}

	#[test]
	fn error_field_is_surfaced() {
		let err = TicketGrant::from_json(r#"{"error":"Login failed."}"#).unwrap_err();
		assert!(matches!(err, ClientCoreError::Ticket(msg) if msg == "Login failed."));
	}

	#[test]
	fn missing_ticket_is_an_error() {
		assert!(TicketGrant::from_json(r#"{"error":""}"#).is_err());
		assert!(TicketGrant::from_json("not json").is_err());
	}

	#[test]
	fn shared_ticket_updates() {
		let shared = SharedTicket::new(SecretString::new("one"));
		let other = shared.clone();
		other.set(SecretString::new("two"));
		assert_eq!(shared.current().expose(), "two");
	}
}

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, anyhow};
use fchat_client_core::{ConnectionEvent, SharedTicket, TicketClient, WsTransport, spawn_ticket_refresher};
use fchat_domain::CharacterName;
use fchat_session::{Collaborators, FileChatLogger, Notification, Session, TomlSettingsStore, Update, default_config_path, load_config_from_path};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: fchat_headless [--config path] [--character name]\n\
\n\
Options:\n\
\t--config      Config file (default: ~/.fchat/config.toml)\n\
\t--character   Character to log in as (default: from config or the account default)\n\
\t--help        Show this help\n\
"
	);
	std::process::exit(2)
}

struct Args {
	config: Option<PathBuf>,
	character: Option<String>,
}

fn parse_args() -> Args {
	let mut args = Args {
		config: None,
		character: None,
	};

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--config" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				args.config = Some(PathBuf::from(v));
			}
			"--character" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--character must be non-empty");
					usage_and_exit();
				}
				args.character = Some(v);
			}
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}
	args
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG")
		.unwrap_or_else(|_| "info,fchat_session=debug,fchat_client_core=debug".to_string());

	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::new(filter))
		.with(tracing_subscriber::fmt::layer().with_target(false))
		.init();
}

fn init_metrics(bind: Option<&str>) {
	let Some(bind) = bind else {
		return;
	};

	match bind.parse::<std::net::SocketAddr>() {
		Ok(addr) => {
			if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
				.with_http_listener(addr)
				.install()
			{
				warn!(error = %e, "failed to start metrics exporter");
			} else {
				info!(%addr, "metrics exporter listening");
			}
		}
		Err(e) => {
			warn!(error = %e, %bind, "invalid metrics bind address (expected host:port)");
		}
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();

	let args = parse_args();
	let config_path = match args.config {
		Some(p) => p,
		None => default_config_path()?,
	};
	let cfg = load_config_from_path(&config_path)?;
	info!(path = %config_path.display(), "loaded session config (toml + env overrides)");

	if cfg.account.is_empty() || cfg.password.is_empty() {
		return Err(anyhow!("account and password are required (config file or FCHAT_ACCOUNT/FCHAT_PASSWORD)"));
	}

	init_metrics(cfg.metrics_bind.as_deref());

	let tickets = TicketClient::new(cfg.ticket_url.clone());
	let grant = tickets
		.fetch(&cfg.account, &cfg.password)
		.await
		.context("fetch login ticket")?;
	info!(characters = grant.characters.len(), "ticket acquired");

	let character = args
		.character
		.or_else(|| cfg.character.clone())
		.or_else(|| grant.default_character.clone())
		.or_else(|| grant.characters.first().cloned())
		.ok_or_else(|| anyhow!("no character configured and the account has none"))?;

	let shared_ticket = SharedTicket::new(grant.ticket.clone());
	let _refresher = spawn_ticket_refresher(
		tickets,
		cfg.account.clone(),
		cfg.password.clone(),
		shared_ticket.clone(),
		cfg.ticket_refresh_interval,
	);

	let collaborators = Collaborators {
		logger: Arc::new(FileChatLogger::for_character(&character)),
		settings: Arc::new(TomlSettingsStore::for_character(&cfg.account, &character)),
	};

	let session = Session::start(
		&cfg,
		cfg.connection_config(),
		Box::new(WsTransport::new()),
		shared_ticket,
		collaborators,
	);

	{
		let mut st = session.state().write();
		st.account.name = cfg.account.clone();
		st.account.characters = grant.characters.clone();
		st.account.friends = grant
			.friends
			.iter()
			.filter(|f| f.own.eq_ignore_ascii_case(&character))
			.filter_map(|f| CharacterName::new(f.other.as_str()).ok())
			.collect();
		st.account.bookmarks = grant
			.bookmarks
			.iter()
			.filter_map(|b| CharacterName::new(b.as_str()).ok())
			.collect();
	}

	let mut updates = session.subscribe();
	session.connect(character.clone()).context("start connection")?;

	let outcome = watch_updates(&mut updates, async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			warn!(error = %e, "ctrl-c handler unavailable");
			std::future::pending::<()>().await;
		}
		info!("ctrl-c received, shutting down");
	})
	.await;

	session.shutdown();
	outcome
}

/// Log updates until `shutdown` resolves, the bus closes or the connection
/// turns fatal. A fatal connection is an error: the server cannot resume a
/// session, so the user has to restart.
async fn watch_updates(
	updates: &mut broadcast::Receiver<Notification>,
	shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
	tokio::pin!(shutdown);
	loop {
		tokio::select! {
			_ = &mut shutdown => return Ok(()),
			next = updates.recv() => match next {
				Ok(n) => {
					log_update(&n.update);
					if let Update::Connection(ConnectionEvent::Fatal { reason }) = n.update {
						return Err(anyhow!("connection lost: {reason}; restart fchat_headless to log in again"));
					}
				}
				Err(RecvError::Lagged(skipped)) => warn!(skipped, "update stream lagged"),
				Err(RecvError::Closed) => return Ok(()),
			},
		}
	}
}

fn log_update(update: &Update) {
	match update {
		Update::Message {
			channel,
			sender,
			kind,
			text,
		} => info!(channel = %channel, sender = %sender, ?kind, "{text}"),
		Update::Connection(event) => info!(?event, "connection"),
		other => info!(update = ?other, "update"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn fatal_connection_ends_the_watch_with_an_error() {
		let (tx, mut rx) = broadcast::channel(8);
		tx.send(Notification::new(Update::Connection(ConnectionEvent::Connecting))).expect("send");
		tx.send(Notification::new(Update::Connection(ConnectionEvent::Fatal {
			reason: "closed after login".to_string(),
		})))
		.expect("send");

		let err = watch_updates(&mut rx, std::future::pending()).await.expect_err("fatal");
		assert!(err.to_string().contains("closed after login"));
	}

	#[tokio::test]
	async fn shutdown_ends_the_watch_cleanly() {
		let (_tx, mut rx) = broadcast::channel::<Notification>(8);
		watch_updates(&mut rx, async {}).await.expect("clean exit");
	}
}

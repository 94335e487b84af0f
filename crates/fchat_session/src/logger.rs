#![forbid(unsafe_code)]

//! Chat logs on disk.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{BufRead as _, BufReader, Write as _};
use std::path::{Path, PathBuf};

use fchat_domain::ChannelId;
use tracing::warn;

use crate::settings::sanitize_component;
use crate::state::ChatLine;

const DEFAULT_RECENT_LINES: usize = 50;

pub trait ChatLogger: Send + Sync + 'static {
	fn log_message(&self, title: &str, id: &ChannelId, line: &ChatLine);

	/// Most recent logged lines for a channel, oldest first.
	fn get_logs(&self, title: &str, id: &ChannelId) -> Vec<String>;
}

/// Appends `[timestamp] line` to one file per channel. Private-message
/// threads go under `private/`, apart from room logs.
#[derive(Debug, Clone)]
pub struct FileChatLogger {
	root: PathBuf,
	recent: usize,
}

impl FileChatLogger {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			recent: DEFAULT_RECENT_LINES,
		}
	}

	/// `<data_dir>/fchat/logs/<character>`.
	pub fn for_character(character: &str) -> Self {
		let base = dirs::data_dir()
			.or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
			.unwrap_or_else(|| PathBuf::from("."));
		Self::new(base.join("fchat").join("logs").join(sanitize_component(character)))
	}

	pub fn with_recent_lines(mut self, recent: usize) -> Self {
		self.recent = recent;
		self
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn path_for(&self, id: &ChannelId) -> PathBuf {
		match id.private_partner() {
			Some(partner) => self.root.join("private").join(format!("{}.log", sanitize_component(partner))),
			None => self.root.join(format!("{}.log", sanitize_component(id.as_str()))),
		}
	}

	fn append(&self, path: &Path, entry: &str) -> std::io::Result<()> {
		if let Some(dir) = path.parent() {
			fs::create_dir_all(dir)?;
		}
		let mut file = OpenOptions::new().create(true).append(true).open(path)?;
		writeln!(file, "{entry}")
	}
}

impl ChatLogger for FileChatLogger {
	fn log_message(&self, title: &str, id: &ChannelId, line: &ChatLine) {
		let path = self.path_for(id);
		// One log line per entry; multi-line messages are flattened.
		let text = line.render().replace(['\r', '\n'], " ");
		let entry = format!("[{}] {}", line.at.format("%Y-%m-%d %H:%M:%S"), text);
		if let Err(e) = self.append(&path, &entry) {
			warn!(channel = %id, title, error = %e, path = %path.display(), "failed to write chat log");
		}
	}

	fn get_logs(&self, title: &str, id: &ChannelId) -> Vec<String> {
		let path = self.path_for(id);
		let file = match fs::File::open(&path) {
			Ok(f) => f,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
			Err(e) => {
				warn!(channel = %id, title, error = %e, "failed to open chat log");
				return Vec::new();
			}
		};

		let mut tail = VecDeque::with_capacity(self.recent);
		for line in BufReader::new(file).lines() {
			let Ok(line) = line else {
				break;
			};
			if tail.len() == self.recent {
				tail.pop_front();
			}
			if self.recent > 0 {
				tail.push_back(line);
			}
		}
		tail.into()
	}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullChatLogger;

impl ChatLogger for NullChatLogger {
	fn log_message(&self, _title: &str, _id: &ChannelId, _line: &ChatLine) {}

	fn get_logs(&self, _title: &str, _id: &ChannelId) -> Vec<String> {
		Vec::new()
	}
}

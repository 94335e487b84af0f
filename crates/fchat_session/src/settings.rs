#![forbid(unsafe_code)]

//! Per-character settings persistence.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Settings the session reads and writes while running.
pub trait SettingsStore: Send + Sync + 'static {
	/// Channels to rejoin after login, in join order.
	fn saved_channels(&self) -> Vec<String>;

	fn set_saved_channels(&self, channels: &[String]);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CharacterSettings {
	#[serde(default)]
	saved_channels: Vec<String>,
}

pub fn settings_dir() -> PathBuf {
	if let Some(cfg) = dirs::config_dir() {
		return cfg.join("fchat");
	}

	if let Some(home) = dirs::home_dir() {
		return home.join(".config").join("fchat");
	}

	PathBuf::from(".").join("fchat")
}

/// Keep only characters that are safe in a single path component.
pub(crate) fn sanitize_component(raw: &str) -> String {
	let cleaned: String = raw
		.trim()
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
		.collect();
	if cleaned.is_empty() { "_".to_string() } else { cleaned }
}

/// TOML file per character, loaded once and written through on change.
#[derive(Debug)]
pub struct TomlSettingsStore {
	path: PathBuf,
	cache: Mutex<CharacterSettings>,
}

impl TomlSettingsStore {
	/// `<config_dir>/fchat/<account>/<character>.toml`.
	pub fn for_character(account: &str, character: &str) -> Self {
		let path = settings_dir()
			.join(sanitize_component(account))
			.join(format!("{}.toml", sanitize_component(character)));
		Self::open(path)
	}

	pub fn open(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let cache = load_from_disk(&path).unwrap_or_default();
		Self {
			path,
			cache: Mutex::new(cache),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn persist(&self, settings: &CharacterSettings) {
		if let Some(parent) = self.path.parent()
			&& let Err(e) = fs::create_dir_all(parent)
		{
			error!("failed to create settings dir {}: {}", parent.display(), e);
		}

		match toml::to_string_pretty(settings) {
			Ok(data) => match fs::write(&self.path, data) {
				Ok(()) => info!("wrote settings file {}", self.path.display()),
				Err(e) => error!("failed to write settings file {}: {}", self.path.display(), e),
			},
			Err(e) => error!("failed to serialize settings for writing: {}", e),
		}
	}
}

fn load_from_disk(path: &Path) -> Option<CharacterSettings> {
	let data = match fs::read_to_string(path) {
		Ok(d) => d,
		Err(e) => {
			info!("no settings file at {}: {}", path.display(), e);
			return None;
		}
	};

	match toml::from_str::<CharacterSettings>(&data) {
		Ok(s) => Some(s),
		Err(e) => {
			error!("failed to parse settings TOML {}: {}", path.display(), e);
			None
		}
	}
}

impl SettingsStore for TomlSettingsStore {
	fn saved_channels(&self) -> Vec<String> {
		self.cache.lock().saved_channels.clone()
	}

	fn set_saved_channels(&self, channels: &[String]) {
		let snapshot = {
			let mut cache = self.cache.lock();
			if cache.saved_channels == channels {
				return;
			}
			cache.saved_channels = channels.to_vec();
			cache.clone()
		};
		self.persist(&snapshot);
	}
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
	saved: Mutex<Vec<String>>,
}

impl MemorySettingsStore {
	pub fn with_channels(channels: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			saved: Mutex::new(channels.into_iter().map(Into::into).collect()),
		}
	}
}

impl SettingsStore for MemorySettingsStore {
	fn saved_channels(&self) -> Vec<String> {
		self.saved.lock().clone()
	}

	fn set_saved_channels(&self, channels: &[String]) {
		*self.saved.lock() = channels.to_vec();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn toml_store_round_trips_through_disk() {
		let dir = tempfile::tempdir().expect("tempdir");
		let path = dir.path().join("acct").join("Alice.toml");

		let store = TomlSettingsStore::open(&path);
		assert!(store.saved_channels().is_empty());
		store.set_saved_channels(&["Frontpage".to_string(), "ADH-1234".to_string()]);
		assert!(path.exists());

		let reopened = TomlSettingsStore::open(&path);
		assert_eq!(reopened.saved_channels(), vec!["Frontpage", "ADH-1234"]);
	}

	#[test]
	fn corrupt_file_falls_back_to_empty() {
		let dir = tempfile::tempdir().expect("tempdir");
		let path = dir.path().join("broken.toml");
		fs::write(&path, "saved_channels = [").expect("write");

		let store = TomlSettingsStore::open(&path);
		assert!(store.saved_channels().is_empty());
	}

	#[test]
	fn path_components_are_sanitised() {
		assert_eq!(sanitize_component("Some One/../x"), "Some_One____x");
		assert_eq!(sanitize_component("   "), "_");
	}

	#[test]
	fn memory_store_keeps_order() {
		let store = MemorySettingsStore::with_channels(["b", "a"]);
		assert_eq!(store.saved_channels(), vec!["b", "a"]);
		store.set_saved_channels(&[]);
		assert!(store.saved_channels().is_empty());
	}
}

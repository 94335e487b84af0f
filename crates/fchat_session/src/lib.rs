#![forbid(unsafe_code)]

pub mod config;
pub mod events;
pub mod interpreter;
pub mod logger;
pub mod queue;
pub mod session;
pub mod settings;
pub mod state;

pub use config::{SessionConfig, default_config_path, load_config, load_config_from_path};
pub use events::{EventBus, ListKind, ModerationAction, Notification, Update};
pub use interpreter::{InterpretError, Interpreter, InterpreterConfig, Outbox};
pub use logger::{ChatLogger, FileChatLogger, NullChatLogger};
pub use queue::{CommandHandler, CommandQueue, Dispatcher, Disposition, MAX_DISPATCH_ATTEMPTS, QueuedCommand};
pub use session::{Collaborators, Session, SessionHandle};
pub use settings::{MemorySettingsStore, SettingsStore, TomlSettingsStore};
pub use state::{Channel, ChatLine, ChatState, Character, LineKind, SharedState};

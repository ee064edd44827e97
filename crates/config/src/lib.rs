//! Configuration system for the volume bot
//!
//! Layered loading: built-in defaults, then an optional JSON/YAML config
//! file, then `VOLUME_BOT__`-prefixed environment variables. Validation
//! runs after the layers are merged and rejects a config the bot could
//! not trade with.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{write_template, ConfigLoader};
pub use schema::{BotConfig, LoggingSettings, ProviderKind, SessionSettings, WalletSettings};

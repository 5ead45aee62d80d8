//! Infrastructure layer for dashboard access and external integrations
//!
//! Session management, HTML parsing, the Telegram transport and the audio
//! pipeline, plus configuration and logging setup.

pub mod audio;
pub mod config;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod session;
pub mod telegram;

// Re-export commonly used items for convenience
pub use audio::AudioPipeline;
pub use config::AppConfig;
pub use http_client::{HttpClient, HttpClientConfig};
pub use parsing::{CallTableParser, ParsingError};
pub use session::{Session, SessionError, SessionManager};
pub use telegram::TelegramNotifier;

pub mod api;
pub mod config;
mod engine;
mod integrations;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use engine::Engine;
pub use engine::MediaPlayerState;
pub use engine::PowerState;
pub use engine::State;
pub use engine::SwitchState;
pub use engine::TvCommand;

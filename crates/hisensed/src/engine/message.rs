//! Type-safe message system for hisensed
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use serde::Deserialize;
use serde::Serialize;

use super::state::MediaPlayerState;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// An entity was discovered and registered
    EntityDiscovered {
        entity_id: String,
        integration_name: String,
    },

    /// An entity was removed (configuration reload, etc.)
    EntityRemoved { entity_id: String },

    /// A media player's state changed
    MediaPlayerStateChanged {
        entity_id: String,
        state: MediaPlayerState,
    },

    /// A switch's reachability view changed
    SwitchStateChanged { entity_id: String, on: bool },
}

/// A single command against a TV entity.
///
/// Serde-tagged so the HTTP API can accept these directly as JSON bodies,
/// e.g. `{"type": "set_volume", "level": 0.4}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TvCommand {
    /// Wake the TV with a magic packet
    TurnOn,
    /// Send the power key to the TV
    TurnOff,
    /// Step the volume up by one
    VolumeUp,
    /// Step the volume down by one
    VolumeDown,
    /// Set the volume to a normalized level in [0, 1]
    SetVolume { level: f64 },
    /// Switch to a named input source
    SelectSource { source: String },
    Play,
    Pause,
    NextTrack,
    PreviousTrack,
    /// Dispatch a named remote-control command (e.g. "up", "menu")
    SendCommand { command: String },
    /// Force a refresh of the source list
    UpdateSources,
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone)]
pub enum ToIntegrationMessage {
    /// Command against a TV entity (media player or switch)
    TvCommand {
        entity_id: String,
        command: TvCommand,
    },
}

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// Power state of a television.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    #[default]
    Off,
}

impl PowerState {
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            PowerState::On
        } else {
            PowerState::Off
        }
    }
}

/// State of a media-player entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaPlayerState {
    /// Last-known power state, driven by reachability polling.
    pub power: PowerState,

    /// Volume normalized into [0, 1]. Absent until the first successful
    /// volume refresh.
    pub volume: Option<f64>,

    /// Name of the current input source, if one has been selected.
    pub source: Option<String>,

    /// Names of the available input sources, in device order.
    #[serde(default)]
    pub source_list: Vec<String>,
}

/// State of a switch entity.
///
/// The switch is a pure reachability view: on means the host answered ping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SwitchState {
    pub on: bool,
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub media_players: HashMap<String, MediaPlayerState>,
    pub switches: HashMap<String, SwitchState>,
}

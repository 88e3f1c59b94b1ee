use serde::Deserialize;

fn default_name() -> String {
    "tv".to_string()
}

fn default_model() -> String {
    "v1".to_string()
}

fn default_scan_interval_s() -> u64 {
    60
}

fn default_ping_timeout_s() -> u64 {
    1
}

fn default_port() -> u16 {
    36669
}

/// Which remote key the play action sends.
///
/// Some apps on the TV toggle playback with OK, some with the dedicated
/// pause key; this mirrors the device's own inconsistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseResume {
    Ok,
    Pause,
    #[default]
    Play,
}

/// Configuration for a single television
#[derive(Debug, Clone, Deserialize)]
pub struct TvConfig {
    /// Hostname or IP address of the TV
    pub host: String,

    /// MAC address, used for wake-on-LAN
    pub mac: String,

    /// Broadcast address for the magic packet (default: 255.255.255.255)
    #[serde(default)]
    pub broadcast_address: Option<String>,

    /// Human-readable name
    #[serde(default = "default_name")]
    pub name: String,

    /// Model tag
    #[serde(default = "default_model")]
    pub model: String,

    /// Poll interval in seconds
    #[serde(default = "default_scan_interval_s")]
    pub scan_interval_s: u64,

    /// Ping timeout in seconds
    #[serde(default = "default_ping_timeout_s")]
    pub ping_timeout_s: u64,

    /// Key to send for the play action
    #[serde(default)]
    pub pause_resume: PauseResume,

    /// Port of the TV's control service
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional username for the control service
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password for the control service
    #[serde(default)]
    pub password: Option<String>,
}

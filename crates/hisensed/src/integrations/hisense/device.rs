use super::config::TvConfig;
use super::wol;
use super::wol::WolError;

/// Identity of a television: everything needed to find it on the network.
///
/// Shared by the media-player and switch entities for the same TV.
#[derive(Debug, Clone)]
pub struct TvDevice {
    /// Config entry id, used as the entity-id suffix
    pub entry_id: String,

    /// Hostname or IP address
    pub host: String,

    /// MAC address for wake-on-LAN
    pub mac: String,

    /// Broadcast address for the magic packet
    pub broadcast_address: Option<String>,

    /// Human-readable name
    pub name: String,

    /// Model tag
    pub model: String,
}

impl TvDevice {
    pub fn from_config(entry_id: &str, config: &TvConfig) -> Self {
        Self {
            entry_id: entry_id.to_string(),
            host: config.host.clone(),
            mac: config.mac.clone(),
            broadcast_address: config.broadcast_address.clone(),
            name: config.name.clone(),
            model: config.model.clone(),
        }
    }

    /// Wake the TV with a magic packet.
    pub async fn wake(&self) -> Result<(), WolError> {
        wol::send_magic_packet(&self.mac, self.broadcast_address.as_deref()).await
    }
}

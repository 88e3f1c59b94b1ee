use std::collections::HashMap;
use std::time::Instant;

use super::client::SourceInfo;
use super::command::RemoteKey;
use super::config::PauseResume;
use super::device::TvDevice;
use crate::engine::state::MediaPlayerState;
use crate::engine::state::PowerState;

/// Full volume scale of the device.
const MAX_VOLUME: f64 = 100.0;

/// Media-player entity for a television.
///
/// Holds the last-known state between polls. The name→id source map is only
/// populated by a successful source refresh; until then source selection
/// cannot resolve ids.
#[derive(Debug, Clone)]
pub struct MediaPlayer {
    /// The television this entity belongs to
    pub device: TvDevice,

    /// Cached state as last observed
    pub state: MediaPlayerState,

    /// Map from source name to the TV's source id
    source_ids: HashMap<String, i64>,

    /// When the device was last polled
    pub last_poll: Option<Instant>,

    /// Which key the play action sends
    pause_resume: PauseResume,
}

impl MediaPlayer {
    pub fn new(device: TvDevice, pause_resume: PauseResume) -> Self {
        Self {
            device,
            state: MediaPlayerState::default(),
            source_ids: HashMap::new(),
            last_poll: None,
            pause_resume,
        }
    }

    /// Entity ID (e.g., "media_player.living_room")
    pub fn entity_id(&self) -> String {
        format!("media_player.{}", self.device.entry_id)
    }

    pub fn set_power(&mut self, power: PowerState) {
        self.state.power = power;
    }

    /// Cache a device volume (0-100), normalized into [0, 1].
    pub fn apply_volume(&mut self, device_volume: u8) {
        self.state.volume = Some((f64::from(device_volume) / MAX_VOLUME).clamp(0.0, 1.0));
    }

    /// Rebuild the source list and name→id map from a device response.
    pub fn apply_sources(&mut self, sources: &[SourceInfo]) {
        self.source_ids = sources
            .iter()
            .map(|s| (s.name.clone(), s.id))
            .collect();
        self.state.source_list = sources.iter().map(|s| s.name.clone()).collect();
    }

    /// Resolve a source name against the cached map.
    pub fn source(&self, name: &str) -> Option<SourceInfo> {
        self.source_ids.get(name).map(|id| SourceInfo {
            id: *id,
            name: name.to_string(),
        })
    }

    /// Whether a source refresh has succeeded yet.
    pub fn has_sources(&self) -> bool {
        !self.state.source_list.is_empty()
    }

    /// One volume step up or down from the cached level, clamped to [0, 1].
    /// With no cached volume the step resets to zero.
    pub fn stepped_volume(&self, up: bool) -> f64 {
        match self.state.volume {
            None => 0.0,
            Some(v) if up => (v + 1.0 / MAX_VOLUME).min(1.0),
            Some(v) => (v - 1.0 / MAX_VOLUME).max(0.0),
        }
    }

    /// Convert a normalized level into the device's 0-100 scale.
    pub fn device_volume(level: f64) -> u8 {
        (level.clamp(0.0, 1.0) * MAX_VOLUME).round() as u8
    }

    /// The key the play action sends for this TV.
    pub fn play_key(&self) -> RemoteKey {
        match self.pause_resume {
            PauseResume::Ok => RemoteKey::Ok,
            PauseResume::Pause => RemoteKey::Pause,
            PauseResume::Play => RemoteKey::Play,
        }
    }

    pub fn mark_polled(&mut self) {
        self.last_poll = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> MediaPlayer {
        let device = TvDevice {
            entry_id: "living_room".to_string(),
            host: "10.0.0.28".to_string(),
            mac: "aa:bb:cc:dd:ee:ff".to_string(),
            broadcast_address: None,
            name: "tv".to_string(),
            model: "v1".to_string(),
        };
        MediaPlayer::new(device, PauseResume::Play)
    }

    #[test]
    fn test_entity_id() {
        assert_eq!(player().entity_id(), "media_player.living_room");
    }

    #[test]
    fn test_volume_is_normalized() {
        let mut mp = player();
        mp.apply_volume(57);
        assert_eq!(mp.state.volume, Some(0.57));

        mp.apply_volume(100);
        assert_eq!(mp.state.volume, Some(1.0));
    }

    #[test]
    fn test_volume_step_without_cached_volume_resets_to_zero() {
        let mp = player();
        assert_eq!(mp.stepped_volume(true), 0.0);
        assert_eq!(mp.stepped_volume(false), 0.0);
    }

    #[test]
    fn test_volume_step_clamps() {
        let mut mp = player();
        mp.apply_volume(100);
        assert_eq!(mp.stepped_volume(true), 1.0);

        mp.apply_volume(0);
        assert_eq!(mp.stepped_volume(false), 0.0);
    }

    #[test]
    fn test_volume_step_moves_by_one() {
        let mut mp = player();
        mp.apply_volume(50);
        assert_eq!(MediaPlayer::device_volume(mp.stepped_volume(true)), 51);
        assert_eq!(MediaPlayer::device_volume(mp.stepped_volume(false)), 49);
    }

    #[test]
    fn test_device_volume_clamps() {
        assert_eq!(MediaPlayer::device_volume(-0.5), 0);
        assert_eq!(MediaPlayer::device_volume(0.4), 40);
        assert_eq!(MediaPlayer::device_volume(1.5), 100);
    }

    #[test]
    fn test_source_lookup_only_after_refresh() {
        let mut mp = player();
        assert!(!mp.has_sources());
        assert!(mp.source("HDMI 1").is_none());

        mp.apply_sources(&[
            SourceInfo {
                id: 1,
                name: "TV".to_string(),
            },
            SourceInfo {
                id: 2,
                name: "HDMI 1".to_string(),
            },
        ]);

        assert!(mp.has_sources());
        assert_eq!(mp.state.source_list, vec!["TV", "HDMI 1"]);
        assert_eq!(mp.source("HDMI 1").unwrap().id, 2);
        assert!(mp.source("HDMI 3").is_none());
    }

    #[test]
    fn test_play_key_honors_pause_resume() {
        let device = player().device;
        let mp = MediaPlayer::new(device.clone(), PauseResume::Ok);
        assert_eq!(mp.play_key(), RemoteKey::Ok);

        let mp = MediaPlayer::new(device.clone(), PauseResume::Pause);
        assert_eq!(mp.play_key(), RemoteKey::Pause);

        let mp = MediaPlayer::new(device, PauseResume::Play);
        assert_eq!(mp.play_key(), RemoteKey::Play);
    }
}

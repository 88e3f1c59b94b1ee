use std::time::Instant;

use super::device::TvDevice;
use crate::engine::state::SwitchState;

/// Switch entity for a television.
///
/// A plain on/off view of the TV driven purely by ping reachability.
#[derive(Debug, Clone)]
pub struct Switch {
    /// The television this entity belongs to
    pub device: TvDevice,

    /// Cached state as last observed
    pub state: SwitchState,

    /// When the device was last polled
    pub last_poll: Option<Instant>,
}

impl Switch {
    pub fn new(device: TvDevice) -> Self {
        Self {
            device,
            state: SwitchState::default(),
            last_poll: None,
        }
    }

    /// Entity ID (e.g., "switch.living_room")
    pub fn entity_id(&self) -> String {
        format!("switch.{}", self.device.entry_id)
    }

    /// Record the latest reachability result. Returns whether it changed.
    pub fn set_reachable(&mut self, reachable: bool) -> bool {
        let changed = self.state.on != reachable;
        self.state.on = reachable;
        changed
    }

    pub fn mark_polled(&mut self) {
        self.last_poll = Some(Instant::now());
    }
}

//! Named-command registry.
//!
//! The `send_command` service accepts string tokens ("up", "menu", "power",
//! ...) and maps them onto remote-control keys. Parsing is handled by
//! strum's `EnumString`, so the token set and the key set stay in sync.

use strum::Display;
use strum::EnumString;

/// A remote-control key understood by the TV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RemoteKey {
    Power,
    Up,
    Down,
    Left,
    Right,
    Back,
    Exit,
    Menu,
    Home,
    Ok,
    VolumeUp,
    VolumeDown,
    Mute,
    Play,
    Pause,
    Stop,
    Forwards,
    Backs,
}

impl RemoteKey {
    /// The key name on the wire, as the TV's remote service expects it.
    pub fn wire_name(&self) -> &'static str {
        match self {
            RemoteKey::Power => "KEY_POWER",
            RemoteKey::Up => "KEY_UP",
            RemoteKey::Down => "KEY_DOWN",
            RemoteKey::Left => "KEY_LEFT",
            RemoteKey::Right => "KEY_RIGHT",
            RemoteKey::Back => "KEY_RETURNS",
            RemoteKey::Exit => "KEY_EXIT",
            RemoteKey::Menu => "KEY_MENU",
            RemoteKey::Home => "KEY_HOME",
            RemoteKey::Ok => "KEY_OK",
            RemoteKey::VolumeUp => "KEY_VOLUMEUP",
            RemoteKey::VolumeDown => "KEY_VOLUMEDOWN",
            RemoteKey::Mute => "KEY_MUTE",
            RemoteKey::Play => "KEY_PLAY",
            RemoteKey::Pause => "KEY_PAUSE",
            RemoteKey::Stop => "KEY_STOP",
            RemoteKey::Forwards => "KEY_FORWARDS",
            RemoteKey::Backs => "KEY_BACK",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(pub String);

/// Look up a named command token.
pub fn parse_command(token: &str) -> Result<RemoteKey, UnknownCommand> {
    token
        .parse::<RemoteKey>()
        .map_err(|_| UnknownCommand(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tokens() {
        for token in ["up", "down", "right", "left", "back", "exit", "menu", "power"] {
            assert!(parse_command(token).is_ok(), "token {} should parse", token);
        }
        assert_eq!(parse_command("volume_up").unwrap(), RemoteKey::VolumeUp);
    }

    #[test]
    fn test_parse_unknown_token() {
        let err = parse_command("launch_nukes").unwrap_err();
        assert_eq!(err.0, "launch_nukes");
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(RemoteKey::Power.wire_name(), "KEY_POWER");
        assert_eq!(RemoteKey::VolumeUp.wire_name(), "KEY_VOLUMEUP");
        assert_eq!(RemoteKey::Forwards.wire_name(), "KEY_FORWARDS");
    }

    #[test]
    fn test_display_round_trips() {
        assert_eq!(RemoteKey::VolumeUp.to_string(), "volume_up");
        assert_eq!("volume_up".parse::<RemoteKey>().unwrap(), RemoteKey::VolumeUp);
    }
}

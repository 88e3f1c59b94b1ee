//! Wake-on-LAN.
//!
//! Powering the TV on is the one operation that cannot go through the
//! control service (the TV is off), so it is done with a magic packet to
//! the configured broadcast address.

use tokio::net::UdpSocket;

const WOL_PORT: u16 = 9;

#[derive(Debug, thiserror::Error)]
pub enum WolError {
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("failed to send magic packet: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a MAC address in colon- or dash-separated form.
pub fn parse_mac(mac: &str) -> Result<[u8; 6], WolError> {
    let parts: Vec<&str> = mac.split([':', '-']).collect();
    if parts.len() != 6 {
        return Err(WolError::InvalidMac(mac.to_string()));
    }

    let mut bytes = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        bytes[i] =
            u8::from_str_radix(part, 16).map_err(|_| WolError::InvalidMac(mac.to_string()))?;
    }
    Ok(bytes)
}

/// Build a magic packet: six 0xff bytes followed by the MAC repeated 16 times.
fn magic_packet(mac: [u8; 6]) -> [u8; 102] {
    let mut packet = [0xffu8; 102];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac);
    }
    packet
}

/// Send a wake-on-LAN magic packet for `mac`.
///
/// The packet goes to `broadcast_address` when configured, otherwise to the
/// limited broadcast address.
pub async fn send_magic_packet(mac: &str, broadcast_address: Option<&str>) -> Result<(), WolError> {
    let mac = parse_mac(mac)?;
    let packet = magic_packet(mac);

    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;

    let target = broadcast_address.unwrap_or("255.255.255.255");
    socket.send_to(&packet, (target, WOL_PORT)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mac_colon_separated() {
        assert_eq!(
            parse_mac("aa:bb:cc:dd:ee:ff").unwrap(),
            [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]
        );
    }

    #[test]
    fn test_parse_mac_dash_separated() {
        assert_eq!(
            parse_mac("00-11-22-33-44-55").unwrap(),
            [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]
        );
    }

    #[test]
    fn test_parse_mac_rejects_garbage() {
        assert!(parse_mac("not a mac").is_err());
        assert!(parse_mac("aa:bb:cc:dd:ee").is_err());
        assert!(parse_mac("aa:bb:cc:dd:ee:zz").is_err());
    }

    #[test]
    fn test_magic_packet_layout() {
        let mac = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let packet = magic_packet(mac);

        assert_eq!(&packet[..6], &[0xff; 6]);
        for chunk in packet[6..].chunks_exact(6) {
            assert_eq!(chunk, &mac);
        }
        assert_eq!(packet.len(), 102);
    }
}

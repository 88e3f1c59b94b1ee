//! Adapter to the TV's control service.
//!
//! Hisense TVs expose an MQTT broker on the set itself; control is a matter
//! of publishing to well-known topics and reading broadcast replies. The
//! `TvClient` trait is the adapter surface the rest of the integration
//! programs against, which also allows mocking the TV for tests.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::AsyncClient;
use rumqttc::Event;
use rumqttc::EventLoop;
use rumqttc::MqttOptions;
use rumqttc::Packet;
use rumqttc::QoS;

use super::command::RemoteKey;
use super::config::TvConfig;

/// Default credentials of the TV's built-in broker.
const DEFAULT_USERNAME: &str = "hisenseservice";
const DEFAULT_PASSWORD: &str = "multimqttservice";

/// Broadcast topic the TV answers volume queries on.
const VOLUME_REPLY_TOPIC: &str =
    "/remoteapp/mobile/broadcast/platform_service/actions/volumechange";

/// Broadcast topic the TV answers source-list queries on.
const SOURCE_LIST_REPLY_TOPIC: &str = "/remoteapp/mobile/broadcast/ui_service/data/sourcelist";

/// How long to wait for the TV to acknowledge or answer a request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("host {host} is unreachable")]
    Unreachable { host: String },

    #[error("timed out waiting for the TV")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request error: {0}")]
    Request(#[from] rumqttc::ClientError),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl ClientError {
    /// True when the failure means the TV simply is not on the network
    /// (powered off or unplugged), as opposed to a protocol problem.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ClientError::Unreachable { .. })
    }
}

/// An input source as reported by the TV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub id: i64,
    pub name: String,
}

/// Trait for TV control operations
///
/// This trait allows for mocking the TV for testing purposes
#[async_trait]
pub trait TvClient: Send + Sync {
    /// Send a remote-control key
    async fn send_key(&mut self, key: RemoteKey) -> Result<(), ClientError>;

    /// Power the TV off. The TV has no dedicated off command; the power
    /// key toggles, and we only send it when the TV is believed on.
    async fn power_off(&mut self) -> Result<(), ClientError> {
        self.send_key(RemoteKey::Power).await
    }

    /// Query the current volume (0-100). Returns None if the TV answered
    /// without a volume value.
    async fn get_volume(&mut self) -> Result<Option<u8>, ClientError>;

    /// Set the volume (0-100)
    async fn set_volume(&mut self, volume: u8) -> Result<(), ClientError>;

    /// Query the list of input sources
    async fn get_sources(&mut self) -> Result<Vec<SourceInfo>, ClientError>;

    /// Switch to an input source
    async fn set_source(&mut self, source: &SourceInfo) -> Result<(), ClientError>;
}

/// Extract the volume value from a volumechange payload,
/// e.g. `{"volume_type": 0, "volume_value": 57}`.
fn parse_volume_payload(payload: &[u8]) -> Result<Option<u8>, ClientError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| ClientError::Malformed(e.to_string()))?;

    Ok(value
        .get("volume_value")
        .and_then(|v| v.as_u64())
        .map(|v| v.min(100) as u8))
}

/// Extract sources from a sourcelist payload, e.g.
/// `[{"sourceid": 1, "sourcename": "TV", "displayname": "TV"}, ...]`.
///
/// Some firmware versions send source ids as strings; accept both. Entries
/// without an id or name are skipped.
fn parse_source_list_payload(payload: &[u8]) -> Result<Vec<SourceInfo>, ClientError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| ClientError::Malformed(e.to_string()))?;

    let items = value
        .as_array()
        .ok_or_else(|| ClientError::Malformed("source list is not an array".to_string()))?;

    let mut sources = Vec::with_capacity(items.len());
    for item in items {
        let id = item.get("sourceid").and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        });
        let name = item.get("sourcename").and_then(|v| v.as_str());

        if let (Some(id), Some(name)) = (id, name) {
            sources.push(SourceInfo {
                id,
                name: name.to_string(),
            });
        }
    }

    Ok(sources)
}

fn classify_connection_error(host: &str, e: rumqttc::ConnectionError) -> ClientError {
    match &e {
        rumqttc::ConnectionError::Io(io) => match io.kind() {
            std::io::ErrorKind::HostUnreachable
            | std::io::ErrorKind::NetworkUnreachable
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::TimedOut => ClientError::Unreachable {
                host: host.to_string(),
            },
            _ => ClientError::Transport(e.to_string()),
        },
        _ => ClientError::Transport(e.to_string()),
    }
}

/// Real TV client speaking to the set's built-in broker via rumqttc.
///
/// Connections are short-lived: each operation opens a session, performs a
/// publish (and possibly waits for a broadcast reply), and disconnects.
/// This mirrors how the TV's own mobile app behaves and avoids keeping an
/// idle connection to a device that disappears whenever it is powered off.
pub struct MqttTvClient {
    host: String,
    port: u16,
    client_id: String,
    username: String,
    password: String,
}

impl MqttTvClient {
    pub fn new(config: &TvConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            client_id: format!("{}$hisensed", config.mac),
            username: config
                .username
                .clone()
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            password: config
                .password
                .clone()
                .unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
        }
    }

    /// Request topic for an action of one of the TV's services.
    fn topic(&self, service: &str, action: &str) -> String {
        format!(
            "/remoteapp/tv/{}/{}/actions/{}",
            service, self.client_id, action
        )
    }

    /// Open a session: connect and wait for the broker's ConnAck.
    async fn open(&self) -> Result<Session, ClientError> {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_credentials(&self.username, &self.password);

        let (client, event_loop) = AsyncClient::new(options, 10);
        let mut session = Session {
            host: self.host.clone(),
            client,
            event_loop,
        };
        session
            .wait_for(|packet| matches!(packet, Packet::ConnAck(_)))
            .await?;
        Ok(session)
    }
}

/// A short-lived connection to the TV's broker.
struct Session {
    host: String,
    client: AsyncClient,
    event_loop: EventLoop,
}

impl Session {
    /// Poll the event loop until a packet matches, the connection fails,
    /// or the request timeout elapses.
    async fn wait_for(
        &mut self,
        mut pred: impl FnMut(&Packet) -> bool,
    ) -> Result<(), ClientError> {
        let host = self.host.clone();
        tokio::time::timeout(REQUEST_TIMEOUT, async {
            loop {
                match self.event_loop.poll().await {
                    Ok(Event::Incoming(packet)) if pred(&packet) => return Ok(()),
                    Ok(_) => continue,
                    Err(e) => return Err(classify_connection_error(&host, e)),
                }
            }
        })
        .await
        .unwrap_or(Err(ClientError::Timeout))
    }

    /// Poll the event loop until a publish arrives on `topic`.
    async fn wait_for_publish(&mut self, topic: &str) -> Result<Vec<u8>, ClientError> {
        let host = self.host.clone();
        tokio::time::timeout(REQUEST_TIMEOUT, async {
            loop {
                match self.event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == topic => {
                        return Ok(publish.payload.to_vec());
                    }
                    Ok(_) => continue,
                    Err(e) => return Err(classify_connection_error(&host, e)),
                }
            }
        })
        .await
        .unwrap_or(Err(ClientError::Timeout))
    }

    /// Publish a message and wait for the broker to acknowledge it.
    async fn send(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), ClientError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        self.wait_for(|packet| matches!(packet, Packet::PubAck(_)))
            .await
    }

    /// Publish a request and wait for the TV's reply on `reply_topic`.
    async fn request(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        reply_topic: &str,
    ) -> Result<Vec<u8>, ClientError> {
        self.client.subscribe(reply_topic, QoS::AtMostOnce).await?;
        self.wait_for(|packet| matches!(packet, Packet::SubAck(_)))
            .await?;

        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        self.wait_for_publish(reply_topic).await
    }

    async fn close(self) {
        let _ = self.client.disconnect().await;
    }
}

#[async_trait]
impl TvClient for MqttTvClient {
    async fn send_key(&mut self, key: RemoteKey) -> Result<(), ClientError> {
        let topic = self.topic("remote_service", "sendkey");
        let mut session = self.open().await?;
        let result = session
            .send(&topic, key.wire_name().as_bytes().to_vec())
            .await;
        session.close().await;
        result
    }

    async fn get_volume(&mut self) -> Result<Option<u8>, ClientError> {
        let topic = self.topic("platform_service", "getvolume");
        let mut session = self.open().await?;
        let result = session.request(&topic, Vec::new(), VOLUME_REPLY_TOPIC).await;
        session.close().await;
        parse_volume_payload(&result?)
    }

    async fn set_volume(&mut self, volume: u8) -> Result<(), ClientError> {
        let topic = self.topic("platform_service", "changevolume");
        let mut session = self.open().await?;
        let result = session
            .send(&topic, volume.to_string().into_bytes())
            .await;
        session.close().await;
        result
    }

    async fn get_sources(&mut self) -> Result<Vec<SourceInfo>, ClientError> {
        let topic = self.topic("ui_service", "sourcelist");
        let mut session = self.open().await?;
        let result = session
            .request(&topic, Vec::new(), SOURCE_LIST_REPLY_TOPIC)
            .await;
        session.close().await;
        parse_source_list_payload(&result?)
    }

    async fn set_source(&mut self, source: &SourceInfo) -> Result<(), ClientError> {
        let topic = self.topic("ui_service", "changesource");
        let payload = serde_json::json!({
            "sourceid": source.id,
            "sourcename": source.name,
        });
        let mut session = self.open().await?;
        let result = session.send(&topic, payload.to_string().into_bytes()).await;
        session.close().await;
        result
    }
}

/// Mock TV client for testing
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockTvClient {
    pub keys_sent: Vec<RemoteKey>,
    pub volume: Option<u8>,
    pub volumes_set: Vec<u8>,
    pub sources: Vec<SourceInfo>,
    pub sources_set: Vec<SourceInfo>,
    pub unreachable: bool,
}

#[cfg(test)]
impl MockTvClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_reachable(&self) -> Result<(), ClientError> {
        if self.unreachable {
            Err(ClientError::Unreachable {
                host: "mock".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[async_trait]
impl TvClient for MockTvClient {
    async fn send_key(&mut self, key: RemoteKey) -> Result<(), ClientError> {
        self.check_reachable()?;
        self.keys_sent.push(key);
        Ok(())
    }

    async fn get_volume(&mut self) -> Result<Option<u8>, ClientError> {
        self.check_reachable()?;
        Ok(self.volume)
    }

    async fn set_volume(&mut self, volume: u8) -> Result<(), ClientError> {
        self.check_reachable()?;
        self.volume = Some(volume);
        self.volumes_set.push(volume);
        Ok(())
    }

    async fn get_sources(&mut self) -> Result<Vec<SourceInfo>, ClientError> {
        self.check_reachable()?;
        Ok(self.sources.clone())
    }

    async fn set_source(&mut self, source: &SourceInfo) -> Result<(), ClientError> {
        self.check_reachable()?;
        self.sources_set.push(source.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_volume_payload() {
        let payload = br#"{"volume_type": 0, "volume_value": 57}"#;
        assert_eq!(parse_volume_payload(payload).unwrap(), Some(57));
    }

    #[test]
    fn test_parse_volume_payload_clamps() {
        let payload = br#"{"volume_value": 250}"#;
        assert_eq!(parse_volume_payload(payload).unwrap(), Some(100));
    }

    #[test]
    fn test_parse_volume_payload_without_value() {
        let payload = br#"{"volume_type": 0}"#;
        assert_eq!(parse_volume_payload(payload).unwrap(), None);
    }

    #[test]
    fn test_parse_volume_payload_malformed() {
        assert!(parse_volume_payload(b"not json").is_err());
    }

    #[test]
    fn test_parse_source_list() {
        let payload = br#"[
            {"sourceid": 1, "sourcename": "TV", "displayname": "TV"},
            {"sourceid": "2", "sourcename": "HDMI 1", "displayname": "HDMI 1"},
            {"sourcename": "broken entry"}
        ]"#;

        let sources = parse_source_list_payload(payload).unwrap();
        assert_eq!(
            sources,
            vec![
                SourceInfo {
                    id: 1,
                    name: "TV".to_string()
                },
                SourceInfo {
                    id: 2,
                    name: "HDMI 1".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_source_list_not_an_array() {
        assert!(parse_source_list_payload(br#"{"sourceid": 1}"#).is_err());
    }

    #[tokio::test]
    async fn test_mock_client_default_power_off() {
        let mut client = MockTvClient::new();
        client.power_off().await.unwrap();
        assert_eq!(client.keys_sent, vec![RemoteKey::Power]);
    }

    #[tokio::test]
    async fn test_mock_client_unreachable() {
        let mut client = MockTvClient::new();
        client.unreachable = true;
        let err = client.power_off().await.unwrap_err();
        assert!(err.is_unreachable());
    }
}

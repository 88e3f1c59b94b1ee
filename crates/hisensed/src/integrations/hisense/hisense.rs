use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::client::ClientError;
use super::client::TvClient;
use super::command;
use super::command::RemoteKey;
use super::config::TvConfig;
use super::device::TvDevice;
use super::media_player::MediaPlayer;
use super::ping;
use super::switch::Switch;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;
use crate::engine::TvCommand;
use crate::engine::state::PowerState;

const INTEGRATION_NAME: &str = "hisense";

/// One configured television: its entities, its client, its config.
struct TvHandle<C: TvClient> {
    config: TvConfig,
    client: Mutex<C>,
    media_player: Mutex<MediaPlayer>,
    switch: Mutex<Switch>,
}

/// Hisense TV integration for hisensed
///
/// Owns a media-player and a switch entity per configured TV, polls each TV
/// on its scan interval, and executes commands through the TV client.
pub struct HisenseIntegration<C: TvClient> {
    tvs: HashMap<String, Arc<TvHandle<C>>>,
    to_engine: Option<FromIntegrationSender>,
    /// Handles to the per-TV polling tasks
    poll_tasks: Vec<JoinHandle<()>>,
}

impl<C: TvClient + 'static> HisenseIntegration<C> {
    /// Create a new Hisense integration from (entry id, config, client) triples
    pub fn new(tvs: impl IntoIterator<Item = (String, TvConfig, C)>) -> Self {
        let tvs = tvs
            .into_iter()
            .map(|(entry_id, config, client)| {
                let device = TvDevice::from_config(&entry_id, &config);
                let handle = TvHandle {
                    client: Mutex::new(client),
                    media_player: Mutex::new(MediaPlayer::new(
                        device.clone(),
                        config.pause_resume,
                    )),
                    switch: Mutex::new(Switch::new(device)),
                    config,
                };
                (entry_id, Arc::new(handle))
            })
            .collect();

        Self {
            tvs,
            to_engine: None,
            poll_tasks: Vec::new(),
        }
    }

    /// Poll one TV forever on its scan interval.
    ///
    /// The first tick fires immediately so entities have state right after
    /// startup.
    async fn poll_task(handle: Arc<TvHandle<C>>, to_engine: FromIntegrationSender) {
        let period = Duration::from_secs(handle.config.scan_interval_s.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let reachable =
                match ping::host_is_reachable(&handle.config.host, handle.config.ping_timeout_s)
                    .await
                {
                    Ok(reachable) => reachable,
                    Err(e) => {
                        warn!("Ping of {} failed: {}", handle.config.host, e);
                        false
                    }
                };

            Self::apply_poll_result(&handle, reachable, Some(&to_engine)).await;
        }
    }

    /// Update both entities from a reachability result. When the TV answered,
    /// refresh the volume and (if not yet known) the source list.
    async fn apply_poll_result(
        handle: &TvHandle<C>,
        reachable: bool,
        to_engine: Option<&FromIntegrationSender>,
    ) {
        {
            let mut switch = handle.switch.lock().await;
            switch.set_reachable(reachable);
            switch.mark_polled();
            Self::report_switch(&switch, to_engine).await;
        }

        let mut media_player = handle.media_player.lock().await;
        debug!(
            "Polled TV '{}' (model {}) at {}: reachable={}",
            media_player.device.name, media_player.device.model, media_player.device.host, reachable
        );
        media_player.set_power(PowerState::from_reachable(reachable));

        if reachable {
            let mut client = handle.client.lock().await;

            match client.get_volume().await {
                Ok(Some(volume)) => media_player.apply_volume(volume),
                Ok(None) => debug!(
                    "{}: TV answered without a volume value",
                    media_player.entity_id()
                ),
                Err(e) => Self::log_client_error(&handle.config.host, "volume refresh", &e),
            }

            if !media_player.has_sources() {
                match client.get_sources().await {
                    Ok(sources) => media_player.apply_sources(&sources),
                    Err(e) => Self::log_client_error(&handle.config.host, "source refresh", &e),
                }
            }
        }

        media_player.mark_polled();
        Self::report_media_player(&media_player, to_engine).await;
    }

    fn log_client_error(host: &str, what: &str, e: &ClientError) {
        if e.is_unreachable() {
            error!("Unable to reach TV at {} for {}, likely powered off", host, what);
        } else {
            error!("{} failed for TV at {}: {}", what, host, e);
        }
    }

    /// Register an entity with the engine
    async fn register_entity(entity_id: String, to_engine: &FromIntegrationSender) {
        let msg = FromIntegrationMessage::EntityDiscovered {
            entity_id: entity_id.clone(),
            integration_name: INTEGRATION_NAME.to_string(),
        };
        if let Err(e) = to_engine.send(msg).await {
            warn!("Failed to send EntityDiscovered message: {}", e);
        } else {
            info!("Registered entity: {}", entity_id);
        }
    }

    /// Report the media player's state to the engine
    async fn report_media_player(
        media_player: &MediaPlayer,
        to_engine: Option<&FromIntegrationSender>,
    ) {
        let Some(tx) = to_engine else { return };
        let msg = FromIntegrationMessage::MediaPlayerStateChanged {
            entity_id: media_player.entity_id(),
            state: media_player.state.clone(),
        };
        if let Err(e) = tx.send(msg).await {
            warn!("Failed to send MediaPlayerStateChanged message: {}", e);
        }
    }

    /// Report the switch's state to the engine
    async fn report_switch(switch: &Switch, to_engine: Option<&FromIntegrationSender>) {
        let Some(tx) = to_engine else { return };
        let msg = FromIntegrationMessage::SwitchStateChanged {
            entity_id: switch.entity_id(),
            on: switch.state.on,
        };
        if let Err(e) = tx.send(msg).await {
            warn!("Failed to send SwitchStateChanged message: {}", e);
        }
    }

    fn entity_error(kind: std::io::ErrorKind, message: String) -> Box<dyn Error + Send> {
        Box::new(std::io::Error::new(kind, message))
    }

    /// Run a client call, turning "host unreachable" into a logged no-op.
    /// A TV that dropped off the network mid-command is almost always one
    /// that was just powered off at the wall.
    fn squash_unreachable<T>(
        host: &str,
        result: Result<T, ClientError>,
    ) -> Result<Option<T>, Box<dyn Error + Send>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_unreachable() => {
                error!("Unable to reach TV at {}, likely powered off already", host);
                Ok(None)
            }
            Err(e) => Err(Box::new(e)),
        }
    }

    /// Execute a command against one of our entities.
    async fn handle_tv_command(
        &self,
        entity_id: &str,
        command: TvCommand,
    ) -> Result<(), Box<dyn Error + Send>> {
        let Some((platform, entry_id)) = entity_id.split_once('.') else {
            return Err(Self::entity_error(
                std::io::ErrorKind::InvalidInput,
                format!("Malformed entity id: {}", entity_id),
            ));
        };

        let handle = self.tvs.get(entry_id).ok_or_else(|| {
            Self::entity_error(
                std::io::ErrorKind::NotFound,
                format!("No TV configured for entity: {}", entity_id),
            )
        })?;

        match platform {
            "media_player" => {
                Self::run_media_player_command(handle, command, self.to_engine.as_ref()).await
            }
            "switch" => Self::run_switch_command(handle, command, self.to_engine.as_ref()).await,
            _ => Err(Self::entity_error(
                std::io::ErrorKind::NotFound,
                format!("Unknown platform for entity: {}", entity_id),
            )),
        }
    }

    async fn run_media_player_command(
        handle: &TvHandle<C>,
        command: TvCommand,
        to_engine: Option<&FromIntegrationSender>,
    ) -> Result<(), Box<dyn Error + Send>> {
        let host = handle.config.host.clone();

        match command {
            TvCommand::TurnOn => {
                let mut media_player = handle.media_player.lock().await;
                media_player
                    .device
                    .wake()
                    .await
                    .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?;
                info!("Sent wake-on-LAN magic packet for {}", media_player.device.mac);

                media_player.set_power(PowerState::On);
                Self::report_media_player(&media_player, to_engine).await;
            }

            TvCommand::TurnOff => {
                debug!("Sending power off to TV at {}", host);
                let result = handle.client.lock().await.power_off().await;
                Self::squash_unreachable(&host, result)?;

                let mut media_player = handle.media_player.lock().await;
                media_player.set_power(PowerState::Off);
                Self::report_media_player(&media_player, to_engine).await;
            }

            step @ (TvCommand::VolumeUp | TvCommand::VolumeDown) => {
                let up = step == TvCommand::VolumeUp;
                let mut media_player = handle.media_player.lock().await;
                let level = media_player.stepped_volume(up);

                let result = handle
                    .client
                    .lock()
                    .await
                    .set_volume(MediaPlayer::device_volume(level))
                    .await;
                if Self::squash_unreachable(&host, result)?.is_some() {
                    media_player.state.volume = Some(level);
                    debug!("{}: volume stepped to {:.3}", media_player.entity_id(), level);
                    Self::report_media_player(&media_player, to_engine).await;
                }
            }

            TvCommand::SetVolume { level } => {
                let level = level.clamp(0.0, 1.0);
                let result = handle
                    .client
                    .lock()
                    .await
                    .set_volume(MediaPlayer::device_volume(level))
                    .await;
                if Self::squash_unreachable(&host, result)?.is_some() {
                    let mut media_player = handle.media_player.lock().await;
                    media_player.state.volume = Some(level);
                    debug!("{}: volume set to {:.3}", media_player.entity_id(), level);
                    Self::report_media_player(&media_player, to_engine).await;
                }
            }

            TvCommand::SelectSource { source } => {
                // Only valid after a successful source refresh has populated
                // the name→id map.
                let info = {
                    let media_player = handle.media_player.lock().await;
                    media_player.source(&source).ok_or_else(|| {
                        Self::entity_error(
                            std::io::ErrorKind::InvalidInput,
                            format!("Unknown source '{}' (source list not refreshed?)", source),
                        )
                    })?
                };

                let result = handle.client.lock().await.set_source(&info).await;
                if Self::squash_unreachable(&host, result)?.is_some() {
                    let mut media_player = handle.media_player.lock().await;
                    media_player.state.source = Some(source);
                    Self::report_media_player(&media_player, to_engine).await;
                }
            }

            TvCommand::Play => {
                let key = handle.media_player.lock().await.play_key();
                Self::send_key_command(handle, key).await?;
            }
            TvCommand::Pause => {
                Self::send_key_command(handle, RemoteKey::Pause).await?;
            }
            TvCommand::NextTrack => {
                Self::send_key_command(handle, RemoteKey::Forwards).await?;
            }
            TvCommand::PreviousTrack => {
                Self::send_key_command(handle, RemoteKey::Backs).await?;
            }

            TvCommand::SendCommand { command } => {
                let key = command::parse_command(&command)
                    .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?;
                Self::send_key_command(handle, key).await?;
            }

            TvCommand::UpdateSources => {
                debug!("Refreshing source list for TV at {}", host);
                let result = handle.client.lock().await.get_sources().await;
                if let Some(sources) = Self::squash_unreachable(&host, result)? {
                    let mut media_player = handle.media_player.lock().await;
                    media_player.apply_sources(&sources);
                    Self::report_media_player(&media_player, to_engine).await;
                }
            }
        }

        Ok(())
    }

    async fn run_switch_command(
        handle: &TvHandle<C>,
        command: TvCommand,
        to_engine: Option<&FromIntegrationSender>,
    ) -> Result<(), Box<dyn Error + Send>> {
        let host = handle.config.host.clone();

        match command {
            TvCommand::TurnOn => {
                let mut switch = handle.switch.lock().await;
                switch
                    .device
                    .wake()
                    .await
                    .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?;
                info!("Sent wake-on-LAN magic packet for {}", switch.device.mac);

                switch.set_reachable(true);
                Self::report_switch(&switch, to_engine).await;
            }

            TvCommand::TurnOff => {
                debug!("Sending power off to TV at {}", host);
                let result = handle.client.lock().await.power_off().await;
                Self::squash_unreachable(&host, result)?;

                let mut switch = handle.switch.lock().await;
                switch.set_reachable(false);
                Self::report_switch(&switch, to_engine).await;
            }

            other => {
                return Err(Self::entity_error(
                    std::io::ErrorKind::InvalidInput,
                    format!("Command {:?} is not supported on a switch entity", other),
                ));
            }
        }

        Ok(())
    }

    /// Send a single remote key, treating an unreachable TV as a logged no-op.
    async fn send_key_command(
        handle: &TvHandle<C>,
        key: RemoteKey,
    ) -> Result<(), Box<dyn Error + Send>> {
        debug!("Sending key {} to TV at {}", key, handle.config.host);
        let result = handle.client.lock().await.send_key(key).await;
        Self::squash_unreachable(&handle.config.host, result)?;
        Ok(())
    }
}

#[async_trait]
impl<C: TvClient + 'static> Integration for HisenseIntegration<C> {
    fn name(&self) -> &str {
        INTEGRATION_NAME
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        self.to_engine = Some(tx.clone());

        for (entry_id, handle) in &self.tvs {
            info!(
                "Setting up TV '{}' at {} (model {})",
                handle.config.name, handle.config.host, handle.config.model
            );

            Self::register_entity(format!("media_player.{}", entry_id), &tx).await;
            Self::register_entity(format!("switch.{}", entry_id), &tx).await;

            let task = tokio::spawn(Self::poll_task(handle.clone(), tx.clone()));
            self.poll_tasks.push(task);
        }

        info!("Hisense integration ready to handle commands");
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::TvCommand { entity_id, command } => {
                info!("Handling command {:?} for {}", command, entity_id);
                self.handle_tv_command(&entity_id, command).await
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("Hisense integration shutting down");
        for task in self.poll_tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::hisense::client::MockTvClient;
    use crate::integrations::hisense::client::SourceInfo;
    use tokio::sync::mpsc;

    fn tv_config() -> TvConfig {
        toml::from_str(
            r#"
            host = "10.0.0.28"
            mac = "aa:bb:cc:dd:ee:ff"
            "#,
        )
        .unwrap()
    }

    fn integration(client: MockTvClient) -> HisenseIntegration<MockTvClient> {
        HisenseIntegration::new([("living_room".to_string(), tv_config(), client)])
    }

    #[tokio::test]
    async fn test_set_volume_updates_client_and_cache() {
        let integration = integration(MockTvClient::new());

        integration
            .handle_tv_command(
                "media_player.living_room",
                TvCommand::SetVolume { level: 0.4 },
            )
            .await
            .unwrap();

        let handle = integration.tvs.get("living_room").unwrap();
        assert_eq!(handle.client.lock().await.volumes_set, vec![40]);
        assert_eq!(
            handle.media_player.lock().await.state.volume,
            Some(0.4)
        );
    }

    #[tokio::test]
    async fn test_volume_up_without_cached_volume_resets_to_zero() {
        let integration = integration(MockTvClient::new());

        integration
            .handle_tv_command("media_player.living_room", TvCommand::VolumeUp)
            .await
            .unwrap();

        let handle = integration.tvs.get("living_room").unwrap();
        assert_eq!(handle.client.lock().await.volumes_set, vec![0]);
        assert_eq!(handle.media_player.lock().await.state.volume, Some(0.0));
    }

    #[tokio::test]
    async fn test_select_source_requires_refreshed_sources() {
        let mut client = MockTvClient::new();
        client.sources = vec![SourceInfo {
            id: 2,
            name: "HDMI 1".to_string(),
        }];
        let integration = integration(client);

        // Before a refresh the name→id map is empty
        let err = integration
            .handle_tv_command(
                "media_player.living_room",
                TvCommand::SelectSource {
                    source: "HDMI 1".to_string(),
                },
            )
            .await;
        assert!(err.is_err());

        integration
            .handle_tv_command("media_player.living_room", TvCommand::UpdateSources)
            .await
            .unwrap();

        integration
            .handle_tv_command(
                "media_player.living_room",
                TvCommand::SelectSource {
                    source: "HDMI 1".to_string(),
                },
            )
            .await
            .unwrap();

        let handle = integration.tvs.get("living_room").unwrap();
        assert_eq!(
            handle.client.lock().await.sources_set,
            vec![SourceInfo {
                id: 2,
                name: "HDMI 1".to_string()
            }]
        );
        assert_eq!(
            handle.media_player.lock().await.state.source.as_deref(),
            Some("HDMI 1")
        );
    }

    #[tokio::test]
    async fn test_send_command_dispatches_named_keys() {
        let integration = integration(MockTvClient::new());

        integration
            .handle_tv_command(
                "media_player.living_room",
                TvCommand::SendCommand {
                    command: "menu".to_string(),
                },
            )
            .await
            .unwrap();

        let handle = integration.tvs.get("living_room").unwrap();
        assert_eq!(handle.client.lock().await.keys_sent, vec![RemoteKey::Menu]);
    }

    #[tokio::test]
    async fn test_send_command_rejects_unknown_tokens() {
        let integration = integration(MockTvClient::new());

        let result = integration
            .handle_tv_command(
                "media_player.living_room",
                TvCommand::SendCommand {
                    command: "frobnicate".to_string(),
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_transport_commands_send_keys() {
        let integration = integration(MockTvClient::new());

        for command in [
            TvCommand::Play,
            TvCommand::Pause,
            TvCommand::NextTrack,
            TvCommand::PreviousTrack,
        ] {
            integration
                .handle_tv_command("media_player.living_room", command)
                .await
                .unwrap();
        }

        let handle = integration.tvs.get("living_room").unwrap();
        assert_eq!(
            handle.client.lock().await.keys_sent,
            vec![
                RemoteKey::Play,
                RemoteKey::Pause,
                RemoteKey::Forwards,
                RemoteKey::Backs,
            ]
        );
    }

    #[tokio::test]
    async fn test_turn_off_on_unreachable_tv_is_not_fatal() {
        let mut client = MockTvClient::new();
        client.unreachable = true;
        let integration = integration(client);

        integration
            .handle_tv_command("media_player.living_room", TvCommand::TurnOff)
            .await
            .unwrap();

        let handle = integration.tvs.get("living_room").unwrap();
        assert_eq!(
            handle.media_player.lock().await.state.power,
            PowerState::Off
        );
    }

    #[tokio::test]
    async fn test_unknown_entity_is_an_error() {
        let integration = integration(MockTvClient::new());

        let result = integration
            .handle_tv_command("media_player.garage", TvCommand::TurnOff)
            .await;
        assert!(result.is_err());

        let result = integration
            .handle_tv_command("garbage", TvCommand::TurnOff)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_switch_rejects_media_commands() {
        let integration = integration(MockTvClient::new());

        let result = integration
            .handle_tv_command("switch.living_room", TvCommand::VolumeUp)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_poll_reachable_refreshes_volume_and_sources() {
        let mut client = MockTvClient::new();
        client.volume = Some(57);
        client.sources = vec![
            SourceInfo {
                id: 1,
                name: "TV".to_string(),
            },
            SourceInfo {
                id: 2,
                name: "HDMI 1".to_string(),
            },
        ];
        let integration = integration(client);
        let handle = integration.tvs.get("living_room").unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        HisenseIntegration::apply_poll_result(handle, true, Some(&tx)).await;

        match rx.recv().await.unwrap() {
            FromIntegrationMessage::SwitchStateChanged { entity_id, on } => {
                assert_eq!(entity_id, "switch.living_room");
                assert!(on);
            }
            other => panic!("unexpected message: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            FromIntegrationMessage::MediaPlayerStateChanged { entity_id, state } => {
                assert_eq!(entity_id, "media_player.living_room");
                assert_eq!(state.power, PowerState::On);
                assert_eq!(state.volume, Some(0.57));
                assert_eq!(state.source_list, vec!["TV", "HDMI 1"]);
            }
            other => panic!("unexpected message: {:?}", other),
        }

        assert!(handle.media_player.lock().await.last_poll.is_some());
        assert!(handle.switch.lock().await.last_poll.is_some());
    }

    #[tokio::test]
    async fn test_poll_unreachable_marks_everything_off() {
        let mut client = MockTvClient::new();
        client.volume = Some(57);
        let integration = integration(client);
        let handle = integration.tvs.get("living_room").unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        HisenseIntegration::apply_poll_result(handle, false, Some(&tx)).await;

        match rx.recv().await.unwrap() {
            FromIntegrationMessage::SwitchStateChanged { on, .. } => assert!(!on),
            other => panic!("unexpected message: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            FromIntegrationMessage::MediaPlayerStateChanged { state, .. } => {
                assert_eq!(state.power, PowerState::Off);
                // No client call happens while unreachable
                assert_eq!(state.volume, None);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}

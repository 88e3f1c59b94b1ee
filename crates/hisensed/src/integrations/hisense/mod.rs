mod client;
mod command;
mod config;
mod device;
#[allow(clippy::module_inception)]
mod hisense;
mod media_player;
mod ping;
mod switch;
mod wol;

use linkme::distributed_slice;

pub use client::MqttTvClient;
pub use config::TvConfig;
pub use hisense::HisenseIntegration;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_hisense(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    if ctx.config.integrations.hisense.is_empty() {
        return Ok(None);
    }

    let tvs: Vec<_> = ctx
        .config
        .integrations
        .hisense
        .iter()
        .map(|(entry_id, tv_config)| {
            (
                entry_id.clone(),
                tv_config.clone(),
                MqttTvClient::new(tv_config),
            )
        })
        .collect();

    Ok(Some(Box::new(HisenseIntegration::new(tvs))))
}

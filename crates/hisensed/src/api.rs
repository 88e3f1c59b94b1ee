use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::engine::TvCommand;
use crate::engine::state::State as EngineState;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
}

/// Generic acknowledgement response
#[derive(Serialize)]
struct StatusResponse {
    status: String,
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Request body for POST /v1/command
///
/// The command is flattened, e.g.
/// `{"entity_id": "media_player.living_room", "type": "set_volume", "level": 0.4}`
#[derive(Deserialize)]
struct CommandRequest {
    entity_id: String,
    #[serde(flatten)]
    command: TvCommand,
}

/// Request body for POST /v1/services/send_command
#[derive(Deserialize)]
struct SendCommandRequest {
    entity_ids: Vec<String>,
    command: String,
}

/// Request body for POST /v1/services/update_sources
#[derive(Deserialize)]
struct UpdateSourcesRequest {
    entity_ids: Vec<String>,
}

/// Shared application state
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
        }),
    )
}

/// Handler for GET /v1/state
#[tracing::instrument(skip(state))]
async fn state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/state request");
    let snapshot = state.engine.state_snapshot();
    (StatusCode::OK, Json(EngineState::clone(&snapshot)))
}

/// Handler for POST /v1/command
#[tracing::instrument(skip(state, req))]
async fn command(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommandRequest>,
) -> axum::response::Response {
    tracing::debug!("Handling /v1/command for {}", req.entity_id);

    match state.engine.send_tv_command(req.entity_id, req.command) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(StatusResponse {
                status: "accepted".to_string(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// Dispatch one command to a list of entities, 404ing on the first unknown one.
fn dispatch_to_entities(
    engine: &Engine,
    entity_ids: Vec<String>,
    command: impl Fn() -> TvCommand,
) -> axum::response::Response {
    for entity_id in entity_ids {
        if let Err(e) = engine.send_tv_command(entity_id.clone(), command()) {
            tracing::error!("Invalid entity provided in service call: {}", entity_id);
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    }

    (
        StatusCode::ACCEPTED,
        Json(StatusResponse {
            status: "accepted".to_string(),
        }),
    )
        .into_response()
}

/// Handler for POST /v1/services/send_command
#[tracing::instrument(skip(state, req))]
async fn send_command(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendCommandRequest>,
) -> axum::response::Response {
    tracing::debug!(
        "Handling /v1/services/send_command: command={} entities={:?}",
        req.command,
        req.entity_ids
    );

    dispatch_to_entities(&state.engine, req.entity_ids, || TvCommand::SendCommand {
        command: req.command.clone(),
    })
}

/// Handler for POST /v1/services/update_sources
#[tracing::instrument(skip(state, req))]
async fn update_sources(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateSourcesRequest>,
) -> axum::response::Response {
    tracing::debug!(
        "Handling /v1/services/update_sources: entities={:?}",
        req.entity_ids
    );

    dispatch_to_entities(&state.engine, req.entity_ids, || TvCommand::UpdateSources)
}

/// Create the API router with all endpoints
fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/state", get(state))
        .route("/v1/command", post(command))
        .route("/v1/services/send_command", post(send_command))
        .route("/v1/services/update_sources", post(update_sources))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the HTTP API server
///
/// This function will bind to the specified address and serve the API endpoints.
/// It will run until the provided shutdown signal is triggered.
pub async fn serve(
    listen: String,
    port: u16,
    engine: Arc<Engine>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, engine });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

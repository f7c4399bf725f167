//! Storylink API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use storylink_api::config::ServerConfig;
use storylink_api::error::AppError;
use storylink_api::sample;
use storylink_api::state::AppState;
use storylink_broker::InMemoryBroker;
use storylink_core::clock::SystemClock;
use storylink_core::rng::SystemRng;
use storylink_session::domain::identity::{ClientId, PlayerIdentity};
use storylink_sync::application::participant::{Participant, ParticipantDeps};
use storylink_sync::application::runtime;
use storylink_sync::ports::{LoggingPlayback, LoggingRenderer};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Storylink API server");

    // Read configuration from environment.
    let config = ServerConfig::from_env()?;
    let story = match &config.story_path {
        Some(path) => sample::load_story(path)?,
        None => sample::sample_story(),
    };

    // Build the hosted participant.
    let broker = Arc::new(InMemoryBroker::new());
    let client_id = ClientId::generate(config.role, &mut SystemRng::new());
    tracing::info!(client_id = %client_id, role = %config.role, "Participant identity chosen");
    let participant = Participant::new(
        PlayerIdentity::new(&config.player_name, client_id),
        config.role,
        story,
        config.sync.clone(),
        ParticipantDeps {
            channel: broker.clone(),
            clock: Arc::new(SystemClock),
            renderer: Arc::new(LoggingRenderer),
            playback: Arc::new(LoggingPlayback),
        },
    )
    .map_err(|e| AppError::Story(e.to_string()))?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (handle, participant_task) = runtime::spawn(participant, shutdown_rx);

    // Build router.
    let app_state = AppState::new(handle, broker, config.sync.topic_prefix.clone());
    let app = storylink_api::app(app_state);

    // Start server.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Cannot listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if participant_task.await.is_err() {
        tracing::warn!("Participant task ended abnormally");
    }

    Ok(())
}

//! Track relay server
//!
//! Exposes the server components for testing and embedding.

pub mod api;
pub mod error;
pub mod relay;
pub mod signaling;
pub mod state;

use anyhow::Result;
use relay::{RelaySettings, SessionController, StatusBoard};
use relay_media::Lifecycle;
use signaling::signaling_channel;
use state::{AppState, Config, SignalingMode};
use std::sync::Arc;
use tokio::io::BufReader;

/// Run the relay until Ctrl-C, or until console input ends and the last
/// session is over.
pub async fn run(config: Config) -> Result<()> {
    let (bridge, inbox) = signaling_channel(config.answer_timeout);
    let board = StatusBoard::new();
    let controller =
        SessionController::new(RelaySettings::from_config(&config), inbox, board.clone())?;

    let shutdown = Arc::new(Lifecycle::new());
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
                shutdown.cancel();
            }
        });
    }

    let mode = config.signaling_mode;
    match mode {
        SignalingMode::Http => {
            let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
            tracing::info!("Listening on {}", config.bind_address);

            let supervisor = tokio::spawn(controller.run(shutdown.token()));

            let app = api::create_router(AppState::new(config, bridge, board));
            let mut token = shutdown.token();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await?;

            shutdown.cancel();
            supervisor.await?;
        }
        SignalingMode::Console => {
            let supervisor = tokio::spawn(controller.run(shutdown.token()));

            signaling::console::run_console(
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
                bridge,
                shutdown.token(),
            )
            .await?;

            supervisor.await?;
        }
    }

    tracing::info!("Track relay stopped");
    Ok(())
}

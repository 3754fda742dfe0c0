mod router;
pub mod server;
mod state;
pub mod tracing;

pub use router::main_router;
pub use state::AppState;

use crate::config;
use crate::error::AppError;
use tokio_util::sync::CancellationToken;

/// Application entry point. Initializes tracing, configuration, and starts the server.
pub async fn run() -> Result<(), AppError> {
    // Handle healthcheck subcommand (for Docker healthcheck in distroless image)
    if std::env::args().nth(1).as_deref() == Some("healthcheck") {
        match crate::healthcheck().await {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1)
            }
        }
    }

    tracing::init_tracing();

    let settings = config::get_configuration()?;
    ::tracing::info!(
        log_directory = %settings.log_directory.display(),
        bucket = %settings.s3_bucket,
        search_engine = %settings.es_host,
        "Loaded settings"
    );

    let app_state = state::AppState::from_settings(&settings).await?;
    let app = router::main_router(app_state.pipeline, app_state.verifier);

    server::serve(app, settings.http_port, CancellationToken::new()).await
}

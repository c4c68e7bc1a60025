//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the MERA REST API on its own, with OpenAPI/Swagger UI. This is the
//! same server the workspace's main `mera-run` binary starts; having it
//! here too is convenient for development of the API crate in isolation.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Entry point for the standalone REST server.
///
/// # Environment Variables
/// - `MERA_REST_ADDR`: server address (default: "0.0.0.0:3000")
/// - `MERA_DATA_DIR`: data root (default: "/mera_data"); must exist
/// - `MERA_SIGNING_KEY`: path to a PKCS#8 PEM token-signing key
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the data directory or signing key cannot be resolved,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    api_rest::serve().await
}

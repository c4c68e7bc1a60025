//! Main entry point for the MERA application.
//!
//! Starts the REST API server (see the `api-rest` crate for the routes and
//! the `mera-core` crate for the access-control and audit logic).
//!
//! # Environment Variables
//! - `MERA_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
//! - `MERA_DATA_DIR`: data root directory (default: "/mera_data")
//! - `MERA_SIGNING_KEY`: path to the PKCS#8 PEM token-signing key; when
//!   unset an ephemeral key is generated for the lifetime of the process

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("mera=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    api_rest::serve().await
}

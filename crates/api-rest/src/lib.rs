//! # API REST
//!
//! REST boundary for MERA.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - Bearer-token authentication via a request extractor
//! - Status-code mapping from the core error taxonomy
//! - OpenAPI/Swagger documentation and CORS
//!
//! Uses `api-shared` for wire types; all business rules live in
//! `mera-core`.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod extract;
pub mod routes;

pub use routes::router;

use mera_core::{
    AccessDecisionEngine, AuditLog, CoreConfig, DashboardService, EmergencyAccessService,
    GrantService, IdentityService, RecordService,
};
use mera_credentials::{SigningKeyMaterial, TokenSigner};
use std::path::Path;
use std::sync::Arc;

/// Shared state for all request handlers: one instance of each core
/// service, all backed by the same startup-resolved configuration.
#[derive(Clone)]
pub struct AppState {
    identity: IdentityService,
    records: RecordService,
    grants: GrantService,
    engine: AccessDecisionEngine,
    emergency: EmergencyAccessService,
    dashboard: DashboardService,
    audit: AuditLog,
}

impl AppState {
    /// Builds the service graph from resolved configuration and signing
    /// key material.
    pub fn new(cfg: Arc<CoreConfig>, signer: TokenSigner) -> Self {
        Self {
            identity: IdentityService::new(cfg.clone(), signer.clone()),
            records: RecordService::new(cfg.clone()),
            grants: GrantService::new(cfg.clone()),
            engine: AccessDecisionEngine::new(cfg.clone()),
            emergency: EmergencyAccessService::new(cfg.clone(), signer),
            dashboard: DashboardService::new(cfg.clone()),
            audit: AuditLog::new(cfg),
        }
    }

    /// Resolves configuration from the environment and builds the state.
    ///
    /// # Environment Variables
    /// - `MERA_DATA_DIR`: data root (default `/mera_data`); must exist.
    /// - `MERA_SIGNING_KEY`: path to a PKCS#8 PEM signing key. When unset
    ///   an ephemeral key is generated and a warning is logged; every
    ///   outstanding token dies with the process.
    pub fn from_env() -> anyhow::Result<Self> {
        let data_dir = std::env::var("MERA_DATA_DIR")
            .unwrap_or_else(|_| mera_core::constants::DEFAULT_DATA_DIR.into());
        let data_path = Path::new(&data_dir);
        if !data_path.exists() {
            anyhow::bail!("Data directory does not exist: {}", data_path.display());
        }
        let cfg = Arc::new(CoreConfig::new(data_path.to_path_buf())?);

        let material = match std::env::var("MERA_SIGNING_KEY") {
            Ok(path) => SigningKeyMaterial::load_from_pem_file(Path::new(&path))?,
            Err(_) => {
                tracing::warn!(
                    "MERA_SIGNING_KEY not set; using an ephemeral signing key; \
                     sessions and QR tokens will not survive a restart"
                );
                SigningKeyMaterial::generate()
            }
        };
        let signer = TokenSigner::new(&material);

        Ok(Self::new(cfg, signer))
    }

    pub fn identity(&self) -> &IdentityService {
        &self.identity
    }

    pub fn records(&self) -> &RecordService {
        &self.records
    }

    pub fn grants(&self) -> &GrantService {
        &self.grants
    }

    pub fn engine(&self) -> &AccessDecisionEngine {
        &self.engine
    }

    pub fn emergency(&self) -> &EmergencyAccessService {
        &self.emergency
    }

    pub fn dashboard(&self) -> &DashboardService {
        &self.dashboard
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}

/// Binds `MERA_REST_ADDR` (default `0.0.0.0:3000`) and serves the API
/// until the process exits.
///
/// Tracing must already be initialised by the calling binary.
pub async fn serve() -> anyhow::Result<()> {
    let addr = std::env::var("MERA_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting MERA REST API on {}", addr);

    let state = AppState::from_env()?;
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

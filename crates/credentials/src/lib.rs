//! # MERA Credentials
//!
//! Credential primitives for the MERA record system:
//!
//! - Password hashing and verification (bcrypt, salted, cost-factored)
//! - Signed bearer tokens for sessions and emergency QR access (ECDSA P-256)
//! - Signing-key loading and generation (PKCS#8 PEM)
//!
//! The signing key is process-wide material: binaries load it once at startup
//! (see [`SigningKeyMaterial`]) and inject it into [`TokenSigner`] explicitly.
//! Runtime key rotation is not supported; a restart is required to pick up a
//! new key, which also invalidates all outstanding tokens.
//!
//! **No storage concerns**: this crate never touches actor or record state.
//! Deciding what a verified token is allowed to do belongs to `mera-core`.

mod keys;
mod password;
mod token;

pub use keys::SigningKeyMaterial;
pub use password::{hash_password, verify_password};
pub use token::{
    EmergencyClaims, SessionClaims, TokenPurpose, TokenSigner, DEFAULT_EMERGENCY_TTL_SECS,
    SESSION_TTL_SECS,
};

/// Errors that can occur in credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Password hashing or verification failed at the bcrypt layer.
    #[error("password hashing failed: {0}")]
    PasswordHash(bcrypt::BcryptError),

    /// The signing key file could not be read.
    #[error("failed to read signing key file: {0}")]
    KeyRead(std::io::Error),

    /// The signing key file could not be written.
    #[error("failed to write signing key file: {0}")]
    KeyWrite(std::io::Error),

    /// The signing key PEM could not be parsed.
    #[error("failed to parse signing key PEM: {0}")]
    PemParse(::pem::PemError),

    /// The PEM did not contain a usable PKCS#8 P-256 private key.
    #[error("failed to parse ECDSA private key: {0}")]
    KeyParse(Box<dyn std::error::Error + Send + Sync>),

    /// Token claims could not be serialized for signing.
    #[error("failed to serialize token claims: {0}")]
    ClaimsSerialization(serde_json::Error),

    /// The presented token failed verification.
    ///
    /// Deliberately carries no detail: malformed payloads, bad signatures,
    /// wrong purposes and expired tokens are indistinguishable to callers.
    #[error("token is invalid or expired")]
    InvalidToken,
}

pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

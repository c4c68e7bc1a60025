//! Core error taxonomy.
//!
//! One enum covers the whole domain. The first group is the external
//! taxonomy: variants the REST layer maps onto status codes. The second
//! group is internal storage and subsystem failures; these all surface to
//! external callers as a generic internal error while the full detail is
//! logged operator-side.

use mera_credentials::CredentialError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    // -- external taxonomy -------------------------------------------------
    /// Login failed. Deliberately covers both unknown email and wrong
    /// password so callers cannot enumerate accounts.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The account exists but has been soft-deactivated.
    #[error("account is deactivated")]
    AccountDeactivated,

    /// A presented token failed verification or has expired.
    #[error("token is invalid or expired")]
    TokenInvalidOrExpired,

    /// The actor is not allowed to perform the requested operation.
    #[error("insufficient permissions")]
    InsufficientPermissions,

    /// The addressed entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The operation conflicts with existing state (e.g. duplicate
    /// registration).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request was structurally valid but semantically unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // -- internal failures -------------------------------------------------
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write document: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read document: {0}")]
    FileRead(std::io::Error),
    #[error("failed to remove document: {0}")]
    FileRemove(std::io::Error),
    #[error("failed to append audit entry: {0}")]
    AuditAppend(std::io::Error),
    #[error("failed to serialize JSON: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize JSON: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),

    /// Credential subsystem failure that is not a token-verification
    /// rejection (key material problems, hashing failures).
    #[error("credential subsystem failure: {0}")]
    Credential(#[source] CredentialError),
}

impl CoreError {
    /// True for variants that surface to external callers as a generic
    /// internal error rather than a specific status.
    pub fn is_internal(&self) -> bool {
        !matches!(
            self,
            CoreError::InvalidCredentials
                | CoreError::AccountDeactivated
                | CoreError::TokenInvalidOrExpired
                | CoreError::InsufficientPermissions
                | CoreError::NotFound(_)
                | CoreError::Conflict(_)
                | CoreError::InvalidInput(_)
        )
    }
}

impl From<CredentialError> for CoreError {
    fn from(e: CredentialError) -> Self {
        match e {
            // Verification rejections are part of the external taxonomy.
            CredentialError::InvalidToken => CoreError::TokenInvalidOrExpired,
            other => CoreError::Credential(other),
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

//! Signing-key loading and generation.
//!
//! MERA signs bearer tokens with a single process-wide ECDSA P-256 key.
//! Binaries resolve the key once at startup (from a PKCS#8 PEM file when
//! `MERA_SIGNING_KEY` is configured, otherwise a freshly generated ephemeral
//! key) and pass the material into [`TokenSigner`](crate::TokenSigner).
//!
//! An ephemeral key means every restart invalidates all outstanding sessions
//! and emergency QR codes, so production deployments should always configure
//! a persistent key file.

use crate::{CredentialError, CredentialResult};
use p256::ecdsa::SigningKey;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use std::path::Path;

const PRIVATE_KEY_PEM_TAG: &str = "PRIVATE KEY";

/// Process-wide token-signing key material.
///
/// Wraps a P-256 private key so the rest of the workspace never handles raw
/// key bytes. Construct via [`load_from_pem_file`](Self::load_from_pem_file)
/// or [`generate`](Self::generate).
#[derive(Clone)]
pub struct SigningKeyMaterial {
    signing_key: SigningKey,
}

impl std::fmt::Debug for SigningKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key bytes.
        f.debug_struct("SigningKeyMaterial").finish_non_exhaustive()
    }
}

impl SigningKeyMaterial {
    /// Loads a PKCS#8 PEM-encoded P-256 private key from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::KeyRead`] if the file cannot be read,
    /// [`CredentialError::PemParse`] if it is not valid PEM, and
    /// [`CredentialError::KeyParse`] if the PEM body is not a PKCS#8 P-256
    /// private key.
    pub fn load_from_pem_file(path: &Path) -> CredentialResult<Self> {
        let pem_bytes = std::fs::read(path).map_err(CredentialError::KeyRead)?;
        let parsed = ::pem::parse(&pem_bytes).map_err(CredentialError::PemParse)?;

        if parsed.tag != PRIVATE_KEY_PEM_TAG {
            return Err(CredentialError::KeyParse(
                format!("expected '{PRIVATE_KEY_PEM_TAG}' PEM block, got '{}'", parsed.tag).into(),
            ));
        }

        let signing_key = SigningKey::from_pkcs8_der(&parsed.contents)
            .map_err(|e| CredentialError::KeyParse(Box::new(e)))?;

        Ok(Self { signing_key })
    }

    /// Generates a fresh random P-256 key.
    ///
    /// Suitable for tests and for ephemeral development use; tokens signed
    /// with a generated key do not survive a process restart.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Writes this key to `path` as PKCS#8 PEM.
    ///
    /// Used by the operator CLI to provision a persistent signing key.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::KeyParse`] if PKCS#8 encoding fails and
    /// [`CredentialError::KeyWrite`] if the file cannot be written.
    pub fn write_pem_file(&self, path: &Path) -> CredentialResult<()> {
        let der = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| CredentialError::KeyParse(Box::new(e)))?;

        let block = ::pem::Pem {
            tag: PRIVATE_KEY_PEM_TAG.to_string(),
            contents: der.as_bytes().to_vec(),
        };

        std::fs::write(path, ::pem::encode(&block)).map_err(CredentialError::KeyWrite)
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

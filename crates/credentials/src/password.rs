//! Password hashing and verification.
//!
//! Passwords are hashed with bcrypt. The cost factor is fixed at 12, which
//! keeps verification in the tens of milliseconds on current hardware; the
//! REST layer runs both operations on a blocking worker so concurrent
//! requests are not stalled by the hashing work.

use crate::{CredentialError, CredentialResult};

/// bcrypt work factor for newly hashed passwords.
///
/// Existing digests embed their own cost, so raising this only affects new
/// registrations.
const PASSWORD_HASH_COST: u32 = 12;

/// Hashes a plaintext password into an opaque, salted digest.
///
/// The digest embeds its salt and cost factor; it can be verified with
/// [`verify_password`] but never reversed.
///
/// # Errors
///
/// Returns [`CredentialError::PasswordHash`] if the bcrypt layer fails.
pub fn hash_password(password: &str) -> CredentialResult<String> {
    bcrypt::hash(password, PASSWORD_HASH_COST).map_err(CredentialError::PasswordHash)
}

/// Verifies a plaintext password against a stored digest.
///
/// # Returns
///
/// `Ok(true)` only when the password matches. A malformed digest is an
/// error, not a mismatch, so storage corruption is surfaced rather than
/// silently reported as a failed login.
pub fn verify_password(password: &str, digest: &str) -> CredentialResult<bool> {
    bcrypt::verify(password, digest).map_err(CredentialError::PasswordHash)
}

//! Signed bearer tokens for sessions and emergency QR access.
//!
//! A token is the URL-safe base64 of a JSON claims document, followed by a
//! `.` separator and the URL-safe base64 of a raw 64-byte ECDSA P-256
//! signature (`r || s`) over the claims bytes. The claims carry the subject
//! id, an optional role, a purpose tag, and issue/expiry timestamps as Unix
//! seconds.
//!
//! Purposes are strictly separated: a session token can never be redeemed on
//! the emergency path and vice versa. Verification fails closed: malformed
//! input, an unknown signature, a wrong purpose, and an expired token all
//! produce the same [`CredentialError::InvalidToken`].

use crate::{keys::SigningKeyMaterial, CredentialError, CredentialResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed validity of a session token: 7 days.
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Default validity of an emergency QR token: 1 hour.
pub const DEFAULT_EMERGENCY_TTL_SECS: i64 = 60 * 60;

/// What a token is allowed to be used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    /// Long-lived login session, carried as an Authorization bearer token.
    Session,
    /// Short-lived emergency credential, carried inside a QR payload.
    Emergency,
}

/// Wire-format claims document. Private: callers see [`SessionClaims`] or
/// [`EmergencyClaims`] instead.
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    purpose: TokenPurpose,
    iat: i64,
    exp: i64,
}

/// Verified claims of a session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionClaims {
    /// Id of the authenticated actor.
    pub actor_id: Uuid,
    /// Role string recorded at issue time. The caller must still load the
    /// actor and use the stored role; this value only routes logging.
    pub role: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Verified claims of an emergency token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmergencyClaims {
    /// Id of the patient whose emergency-visible records the token unlocks.
    pub patient_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies signed bearer tokens.
///
/// Holds the process-wide signing key; construct once at startup from
/// [`SigningKeyMaterial`] and share (it is cheap to clone).
#[derive(Clone)]
pub struct TokenSigner {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Creates a signer from loaded key material.
    pub fn new(material: &SigningKeyMaterial) -> Self {
        let signing_key = material.signing_key().clone();
        let verifying_key = *signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Issues a session token for `actor_id` with the fixed 7-day validity.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::ClaimsSerialization`] if the claims cannot
    /// be serialized.
    pub fn issue_session(&self, actor_id: Uuid, role: &str) -> CredentialResult<String> {
        self.issue_at(
            TokenPurpose::Session,
            actor_id,
            Some(role.to_string()),
            Duration::seconds(SESSION_TTL_SECS),
            Utc::now(),
        )
    }

    /// Issues an emergency token for `patient_id`.
    ///
    /// `ttl` defaults to [`DEFAULT_EMERGENCY_TTL_SECS`] when `None`. The
    /// token stays redeemable until natural expiry; there is no revocation
    /// list in this design.
    pub fn issue_emergency(
        &self,
        patient_id: Uuid,
        ttl: Option<Duration>,
    ) -> CredentialResult<String> {
        let ttl = ttl.unwrap_or_else(|| Duration::seconds(DEFAULT_EMERGENCY_TTL_SECS));
        self.issue_at(TokenPurpose::Emergency, patient_id, None, ttl, Utc::now())
    }

    /// Verifies a session token, failing closed.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidToken`] for any malformed,
    /// tampered, wrong-purpose or expired token.
    pub fn verify_session(&self, token: &str) -> CredentialResult<SessionClaims> {
        let claims = self.verify_at(token, TokenPurpose::Session, Utc::now())?;
        let role = claims.role.ok_or(CredentialError::InvalidToken)?;
        Ok(SessionClaims {
            actor_id: claims.sub,
            role,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
        })
    }

    /// Verifies an emergency token, failing closed.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidToken`] for any malformed,
    /// tampered, wrong-purpose or expired token; a valid *session* token
    /// is rejected here.
    pub fn verify_emergency(&self, token: &str) -> CredentialResult<EmergencyClaims> {
        let claims = self.verify_at(token, TokenPurpose::Emergency, Utc::now())?;
        Ok(EmergencyClaims {
            patient_id: claims.sub,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
        })
    }

    fn issue_at(
        &self,
        purpose: TokenPurpose,
        sub: Uuid,
        role: Option<String>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> CredentialResult<String> {
        let claims = TokenClaims {
            sub,
            role,
            purpose,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        let payload =
            serde_json::to_vec(&claims).map_err(CredentialError::ClaimsSerialization)?;
        let signature: Signature = self.signing_key.sign(&payload);

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    fn verify_at(
        &self,
        token: &str,
        expected_purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> CredentialResult<TokenClaims> {
        let Some((payload_b64, signature_b64)) = token.split_once('.') else {
            return Err(CredentialError::InvalidToken);
        };

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| CredentialError::InvalidToken)?;
        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| CredentialError::InvalidToken)?;
        let signature = Signature::from_slice(&signature_bytes)
            .map_err(|_| CredentialError::InvalidToken)?;

        if self.verifying_key.verify(&payload, &signature).is_err() {
            tracing::debug!("token rejected: signature mismatch");
            return Err(CredentialError::InvalidToken);
        }

        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| CredentialError::InvalidToken)?;

        if claims.purpose != expected_purpose {
            tracing::debug!(?claims.purpose, ?expected_purpose, "token rejected: wrong purpose");
            return Err(CredentialError::InvalidToken);
        }

        if now.timestamp() >= claims.exp {
            tracing::debug!(exp = claims.exp, "token rejected: expired");
            return Err(CredentialError::InvalidToken);
        }

        Ok(claims)
    }
}

fn timestamp(secs: i64) -> CredentialResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or(CredentialError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(&SigningKeyMaterial::generate())
    }

    #[test]
    fn test_session_round_trip() {
        let signer = signer();
        let actor_id = Uuid::new_v4();

        let token = signer.issue_session(actor_id, "patient").unwrap();
        let claims = signer.verify_session(&token).unwrap();

        assert_eq!(claims.actor_id, actor_id);
        assert_eq!(claims.role, "patient");
        assert_eq!(
            (claims.expires_at - claims.issued_at).num_seconds(),
            SESSION_TTL_SECS
        );
    }

    #[test]
    fn test_emergency_round_trip_with_default_ttl() {
        let signer = signer();
        let patient_id = Uuid::new_v4();

        let token = signer.issue_emergency(patient_id, None).unwrap();
        let claims = signer.verify_emergency(&token).unwrap();

        assert_eq!(claims.patient_id, patient_id);
        assert_eq!(
            (claims.expires_at - claims.issued_at).num_seconds(),
            DEFAULT_EMERGENCY_TTL_SECS
        );
    }

    #[test]
    fn test_emergency_token_valid_at_59m_expired_at_61m() {
        let signer = signer();
        let now = Utc::now();
        let token = signer
            .issue_at(
                TokenPurpose::Emergency,
                Uuid::new_v4(),
                None,
                Duration::hours(1),
                now,
            )
            .unwrap();

        assert!(signer
            .verify_at(&token, TokenPurpose::Emergency, now + Duration::minutes(59))
            .is_ok());
        assert!(signer
            .verify_at(&token, TokenPurpose::Emergency, now + Duration::minutes(61))
            .is_err());
    }

    #[test]
    fn test_purposes_are_not_interchangeable() {
        let signer = signer();
        let id = Uuid::new_v4();

        let session = signer.issue_session(id, "patient").unwrap();
        let emergency = signer.issue_emergency(id, None).unwrap();

        assert!(matches!(
            signer.verify_emergency(&session),
            Err(CredentialError::InvalidToken)
        ));
        assert!(matches!(
            signer.verify_session(&emergency),
            Err(CredentialError::InvalidToken)
        ));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let signer = signer();
        let token = signer.issue_session(Uuid::new_v4(), "patient").unwrap();

        let (payload_b64, signature_b64) = token.split_once('.').unwrap();
        let mut payload = URL_SAFE_NO_PAD.decode(payload_b64).unwrap();
        // Flip one byte of the claims document.
        payload[0] ^= 0x01;
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(&payload), signature_b64);

        assert!(matches!(
            signer.verify_session(&forged),
            Err(CredentialError::InvalidToken)
        ));
    }

    #[test]
    fn test_token_from_another_key_is_rejected() {
        let token = signer().issue_session(Uuid::new_v4(), "doctor").unwrap();
        assert!(signer().verify_session(&token).is_err());
    }

    #[test]
    fn test_garbage_input_is_rejected_not_panicking() {
        let signer = signer();
        for garbage in ["", ".", "a.b", "only-one-part", "a.b.c", "£.%"] {
            assert!(signer.verify_session(garbage).is_err());
        }
    }

    #[test]
    fn test_redemption_is_repeatable() {
        let signer = signer();
        let token = signer.issue_emergency(Uuid::new_v4(), None).unwrap();

        // No single-use constraint: the same token verifies repeatedly.
        for _ in 0..3 {
            assert!(signer.verify_emergency(&token).is_ok());
        }
    }
}

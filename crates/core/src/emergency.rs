//! Emergency QR access.
//!
//! A patient issues a short-lived signed token, renders it as a QR code
//! (UI concern), and a responder submits the scanned value anonymously.
//! Redemption is read-only and repeatable: the token stays valid until its
//! natural expiry, and there is no revocation list: issuing a token is a
//! standing disclosure decision for its lifetime. Every redemption appends
//! an audit entry before any data is returned.

use crate::audit::{AccessLogEntry, AccessType, AuditLog};
use crate::decision::{decide, AccessAction, EmergencyCredential, RequestContext};
use crate::record::EmergencyRecordView;
use crate::store::actors::ActorStore;
use crate::store::records::RecordStore;
use crate::{Actor, CoreError, CoreResult, EmergencyPatientProfile, Role};
use chrono::{Duration, Utc};
use mera_credentials::TokenSigner;
use std::sync::Arc;
use uuid::Uuid;

/// Reason string recorded on every QR redemption.
const REDEMPTION_REASON: &str = "Emergency QR code access";

/// Everything disclosed to an emergency responder in one redemption.
#[derive(Clone, Debug, PartialEq)]
pub struct EmergencyAccessBundle {
    /// Id of the audit entry recording this disclosure.
    pub access_id: Uuid,
    pub patient: EmergencyPatientProfile,
    pub emergency_records: Vec<EmergencyRecordView>,
}

/// Issues and redeems emergency tokens.
#[derive(Clone, Debug)]
pub struct EmergencyAccessService {
    signer: TokenSigner,
    actors: ActorStore,
    records: RecordStore,
    audit: AuditLog,
}

impl EmergencyAccessService {
    pub fn new(cfg: Arc<crate::CoreConfig>, signer: TokenSigner) -> Self {
        Self {
            signer,
            actors: ActorStore::new(cfg.clone()),
            records: RecordStore::new(cfg.clone()),
            audit: AuditLog::new(cfg),
        }
    }

    /// Issues an emergency token for the requesting patient themselves.
    ///
    /// # Errors
    ///
    /// [`CoreError::InsufficientPermissions`] for non-patient requesters.
    pub fn issue(&self, requester: &Actor, ttl: Option<Duration>) -> CoreResult<String> {
        if requester.role() != Role::Patient {
            return Err(CoreError::InsufficientPermissions);
        }
        let token = self.signer.issue_emergency(requester.id, ttl)?;
        tracing::info!(patient_id = %requester.id, "emergency token issued");
        Ok(token)
    }

    /// Issues an emergency token for `patient_id` (operator CLI path).
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] when the target is missing, inactive, or
    /// not a patient.
    pub fn issue_for(&self, patient_id: Uuid, ttl: Option<Duration>) -> CoreResult<String> {
        let patient = self.lookup_patient(patient_id)?;
        let token = self.signer.issue_emergency(patient.id, ttl)?;
        tracing::info!(patient_id = %patient.id, "emergency token issued via operator");
        Ok(token)
    }

    /// Redeems a scanned QR token.
    ///
    /// Verifies the token (fails closed), resolves the patient, selects the
    /// emergency-visible records through the decision engine, appends the
    /// anonymous audit entry, and only then builds the disclosed bundle.
    ///
    /// # Errors
    ///
    /// - [`CoreError::TokenInvalidOrExpired`] for any verification failure.
    /// - [`CoreError::NotFound`] when the patient is missing, inactive, or
    ///   not a patient.
    /// - Internal errors when the audit append fails, in which case
    ///   nothing is disclosed.
    pub fn redeem(&self, qr_token: &str, ctx: &RequestContext) -> CoreResult<EmergencyAccessBundle> {
        let claims = self.signer.verify_emergency(qr_token)?;
        let patient = self.lookup_patient(claims.patient_id)?;

        let profile = patient
            .emergency_profile()
            .ok_or(CoreError::NotFound("patient"))?;

        // Disclosure and audit are one unit of work: the entry commits
        // before the record reads that feed the bundle.
        let entry = AccessLogEntry {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            accessor_id: None,
            record_id: None,
            access_type: AccessType::EmergencyAccess,
            reason: REDEMPTION_REASON.to_string(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            timestamp: Utc::now(),
            emergency_token: Some(qr_token.to_string()),
        };
        self.audit.append(&entry)?;

        let emergency_records: Vec<EmergencyRecordView> = self
            .records
            .list_for_patient(patient.id)?
            .into_iter()
            .filter(|record| {
                decide(
                    None,
                    AccessAction::EmergencyRead,
                    record,
                    EmergencyCredential::Valid(&claims),
                )
                .allowed
            })
            .map(|record| record.emergency_view())
            .collect();

        tracing::info!(
            patient_id = %patient.id,
            records = emergency_records.len(),
            "emergency access granted"
        );

        Ok(EmergencyAccessBundle {
            access_id: entry.id,
            patient: profile,
            emergency_records,
        })
    }

    fn lookup_patient(&self, patient_id: Uuid) -> CoreResult<Actor> {
        let actor = self
            .actors
            .load(patient_id)?
            .ok_or(CoreError::NotFound("patient"))?;
        if actor.role() != Role::Patient || !actor.is_active {
            return Err(CoreError::NotFound("patient"));
        }
        Ok(actor)
    }
}

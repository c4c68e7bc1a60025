//! The access-decision engine.
//!
//! Every record read by any caller funnels through here. [`decide`] is the
//! pure rule evaluation; [`AccessDecisionEngine::read_record`] wraps it
//! with the audit obligation: a non-owner allow appends its audit entry
//! *before* the record leaves the engine, and an append failure fails the
//! whole request.

use crate::audit::{AccessLogEntry, AccessType, AuditLog};
use crate::grants::effective_grant_at;
use crate::record::MedicalRecord;
use crate::store::records::RecordStore;
use crate::{Actor, CoreError, CoreResult, Role};
use chrono::Utc;
use mera_credentials::EmergencyClaims;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// What the caller is trying to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessAction {
    Read,
    List,
    EmergencyRead,
}

/// Why a decision came out the way it did.
///
/// Serialised spellings are the audit-log vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessReason {
    Owner,
    GrantedAccess,
    EmergencyToken,
    InsufficientPermissions,
    InvalidToken,
}

impl AccessReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessReason::Owner => "owner",
            AccessReason::GrantedAccess => "granted-access",
            AccessReason::EmergencyToken => "emergency-token",
            AccessReason::InsufficientPermissions => "insufficient-permissions",
            AccessReason::InvalidToken => "invalid-token",
        }
    }
}

/// Outcome of a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl Decision {
    fn allow(reason: AccessReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: AccessReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// The emergency credential accompanying an anonymous request, as seen
/// after token verification.
#[derive(Clone, Copy, Debug)]
pub enum EmergencyCredential<'a> {
    /// No token was presented.
    Absent,
    /// A token was presented but failed verification.
    Invalid,
    /// A verified, unexpired emergency token.
    Valid(&'a EmergencyClaims),
}

/// Request metadata recorded with every disclosure.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub ip_address: String,
    pub user_agent: String,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            ip_address: "unknown".into(),
            user_agent: "unknown".into(),
        }
    }
}

/// Evaluates the access rules for one record. Pure: no I/O, no clock
/// beyond the caller-supplied `now` embedded in grant evaluation.
///
/// Rule order:
/// 1. the owning patient is always allowed (`owner`);
/// 2. a doctor with an effective grant is allowed (`granted-access`);
/// 3. an anonymous emergency read with a valid token for the record's
///    owner is allowed for emergency-visible records (`emergency-token`);
/// 4. everything else is denied: `invalid-token` when a token was
///    presented and failed, `insufficient-permissions` otherwise.
pub fn decide(
    actor: Option<&Actor>,
    action: AccessAction,
    record: &MedicalRecord,
    emergency: EmergencyCredential<'_>,
) -> Decision {
    if let Some(actor) = actor {
        if actor.id == record.patient_id {
            return Decision::allow(AccessReason::Owner);
        }

        if actor.role() == Role::Doctor
            && matches!(action, AccessAction::Read | AccessAction::List)
            && effective_grant_at(&record.access_grants, actor.id, Utc::now()).is_some()
        {
            return Decision::allow(AccessReason::GrantedAccess);
        }
    }

    if actor.is_none() && action == AccessAction::EmergencyRead {
        match emergency {
            EmergencyCredential::Valid(claims)
                if claims.patient_id == record.patient_id && record.is_emergency_visible =>
            {
                return Decision::allow(AccessReason::EmergencyToken);
            }
            EmergencyCredential::Invalid => return Decision::deny(AccessReason::InvalidToken),
            _ => return Decision::deny(AccessReason::InsufficientPermissions),
        }
    }

    if matches!(emergency, EmergencyCredential::Invalid) {
        return Decision::deny(AccessReason::InvalidToken);
    }
    Decision::deny(AccessReason::InsufficientPermissions)
}

/// Decision evaluation bound to storage and the audit obligation.
#[derive(Clone, Debug)]
pub struct AccessDecisionEngine {
    records: RecordStore,
    audit: AuditLog,
}

impl AccessDecisionEngine {
    pub fn new(cfg: Arc<crate::CoreConfig>) -> Self {
        Self {
            records: RecordStore::new(cfg.clone()),
            audit: AuditLog::new(cfg),
        }
    }

    /// Loads `record_id` and returns it if `actor` may read it.
    ///
    /// A non-owner allow appends a `view` audit entry before the record is
    /// returned; if the append fails, the read fails and nothing is
    /// disclosed.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] when the record does not exist.
    /// - [`CoreError::InsufficientPermissions`] when the decision denies.
    /// - [`CoreError::AuditAppend`] (internal) when the audit write fails.
    pub fn read_record(
        &self,
        actor: &Actor,
        record_id: Uuid,
        ctx: &RequestContext,
    ) -> CoreResult<MedicalRecord> {
        let record = self.records.get(record_id)?;

        let decision = decide(
            Some(actor),
            AccessAction::Read,
            &record,
            EmergencyCredential::Absent,
        );
        if !decision.allowed {
            tracing::info!(
                actor_id = %actor.id,
                record_id = %record_id,
                reason = decision.reason.as_str(),
                "record read denied"
            );
            return Err(CoreError::InsufficientPermissions);
        }

        // Owners read their own data without an audit obligation; every
        // other allow must commit its audit entry first.
        if decision.reason != AccessReason::Owner {
            self.audit.append(&AccessLogEntry {
                id: Uuid::new_v4(),
                patient_id: record.patient_id,
                accessor_id: Some(actor.id),
                record_id: Some(record.id),
                access_type: AccessType::View,
                reason: decision.reason.as_str().to_string(),
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
                timestamp: Utc::now(),
                emergency_token: None,
            })?;
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::RoleProfile;
    use crate::grants::AccessGrant;
    use crate::record::RecordCategory;
    use crate::CoreConfig;
    use chrono::{DateTime, Duration};
    use mera_types::{EmailAddress, NonEmptyText};

    fn actor(profile: RoleProfile, email: &str) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            email: EmailAddress::new(email).unwrap(),
            password_digest: "digest".into(),
            first_name: NonEmptyText::new("Test").unwrap(),
            last_name: NonEmptyText::new("Actor").unwrap(),
            phone: None,
            profile,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    fn patient(email: &str) -> Actor {
        actor(
            RoleProfile::Patient {
                date_of_birth: None,
                address: None,
                emergency_contact: None,
            },
            email,
        )
    }

    fn doctor(email: &str) -> Actor {
        actor(
            RoleProfile::Doctor {
                license_number: NonEmptyText::new("GMC-1").unwrap(),
                specialization: None,
                hospital: None,
                verified: true,
            },
            email,
        )
    }

    fn record_for(owner: &Actor) -> MedicalRecord {
        let now = Utc::now();
        MedicalRecord {
            id: Uuid::new_v4(),
            patient_id: owner.id,
            title: NonEmptyText::new("Allergy panel").unwrap(),
            description: None,
            category: RecordCategory::LabResults,
            files: Vec::new(),
            record_date: None,
            hospital: None,
            is_emergency_visible: false,
            access_grants: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn grant(doctor_id: Uuid, expires_at: DateTime<Utc>) -> AccessGrant {
        AccessGrant {
            doctor_id,
            granted: true,
            granted_at: Utc::now(),
            expires_at,
        }
    }

    fn claims_for(patient_id: Uuid) -> EmergencyClaims {
        EmergencyClaims {
            patient_id,
            issued_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn test_owner_is_allowed() {
        let owner = patient("owner@example.com");
        let record = record_for(&owner);

        let decision = decide(
            Some(&owner),
            AccessAction::Read,
            &record,
            EmergencyCredential::Absent,
        );
        assert!(decision.allowed);
        assert_eq!(decision.reason, AccessReason::Owner);
    }

    #[test]
    fn test_granted_doctor_is_allowed() {
        let owner = patient("owner@example.com");
        let doc = doctor("doc@example.com");
        let mut record = record_for(&owner);
        record
            .access_grants
            .push(grant(doc.id, Utc::now() + Duration::hours(1)));

        let decision = decide(
            Some(&doc),
            AccessAction::Read,
            &record,
            EmergencyCredential::Absent,
        );
        assert!(decision.allowed);
        assert_eq!(decision.reason, AccessReason::GrantedAccess);
    }

    #[test]
    fn test_ungranted_doctor_is_denied() {
        let owner = patient("owner@example.com");
        let doc = doctor("doc@example.com");
        let record = record_for(&owner);

        let decision = decide(
            Some(&doc),
            AccessAction::Read,
            &record,
            EmergencyCredential::Absent,
        );
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::InsufficientPermissions);
    }

    #[test]
    fn test_expired_grant_denies_with_insufficient_permissions() {
        let owner = patient("owner@example.com");
        let doc = doctor("doc@example.com");
        let mut record = record_for(&owner);
        // Granted for one minute, two minutes ago.
        record.access_grants.push(AccessGrant {
            doctor_id: doc.id,
            granted: true,
            granted_at: Utc::now() - Duration::minutes(2),
            expires_at: Utc::now() - Duration::minutes(1),
        });

        let decision = decide(
            Some(&doc),
            AccessAction::Read,
            &record,
            EmergencyCredential::Absent,
        );
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::InsufficientPermissions);
    }

    #[test]
    fn test_another_patient_is_denied() {
        let owner = patient("owner@example.com");
        let other = patient("other@example.com");
        let record = record_for(&owner);

        let decision = decide(
            Some(&other),
            AccessAction::Read,
            &record,
            EmergencyCredential::Absent,
        );
        assert!(!decision.allowed);
    }

    #[test]
    fn test_valid_emergency_token_allows_visible_records_only() {
        let owner = patient("owner@example.com");
        let mut record = record_for(&owner);
        let claims = claims_for(owner.id);

        let hidden = decide(
            None,
            AccessAction::EmergencyRead,
            &record,
            EmergencyCredential::Valid(&claims),
        );
        assert!(!hidden.allowed);

        record.is_emergency_visible = true;
        let visible = decide(
            None,
            AccessAction::EmergencyRead,
            &record,
            EmergencyCredential::Valid(&claims),
        );
        assert!(visible.allowed);
        assert_eq!(visible.reason, AccessReason::EmergencyToken);
    }

    #[test]
    fn test_emergency_token_for_wrong_patient_is_denied() {
        let owner = patient("owner@example.com");
        let mut record = record_for(&owner);
        record.is_emergency_visible = true;
        let claims = claims_for(Uuid::new_v4());

        let decision = decide(
            None,
            AccessAction::EmergencyRead,
            &record,
            EmergencyCredential::Valid(&claims),
        );
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::InsufficientPermissions);
    }

    #[test]
    fn test_failed_token_reports_invalid_token() {
        let owner = patient("owner@example.com");
        let mut record = record_for(&owner);
        record.is_emergency_visible = true;

        let decision = decide(
            None,
            AccessAction::EmergencyRead,
            &record,
            EmergencyCredential::Invalid,
        );
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::InvalidToken);
    }

    #[test]
    fn test_anonymous_plain_read_is_denied() {
        let owner = patient("owner@example.com");
        let record = record_for(&owner);

        let decision = decide(
            None,
            AccessAction::Read,
            &record,
            EmergencyCredential::Absent,
        );
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::InsufficientPermissions);
    }

    // Engine-level tests: audit coupling.

    fn engine_fixture() -> (
        tempfile::TempDir,
        Arc<CoreConfig>,
        AccessDecisionEngine,
        RecordStore,
        AuditLog,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Arc::new(CoreConfig::new(dir.path().to_path_buf()).unwrap());
        (
            dir,
            cfg.clone(),
            AccessDecisionEngine::new(cfg.clone()),
            RecordStore::new(cfg.clone()),
            AuditLog::new(cfg),
        )
    }

    #[test]
    fn test_owner_read_leaves_no_audit_entry() {
        let (_dir, _cfg, engine, records, audit) = engine_fixture();
        let owner = patient("owner@example.com");
        let record = record_for(&owner);
        records.create(&record).unwrap();

        engine
            .read_record(&owner, record.id, &RequestContext::default())
            .unwrap();

        assert!(audit.list_for_patient(owner.id, 10).unwrap().is_empty());
    }

    #[test]
    fn test_granted_read_appends_exactly_one_entry() {
        let (_dir, _cfg, engine, records, audit) = engine_fixture();
        let owner = patient("owner@example.com");
        let doc = doctor("doc@example.com");
        let mut record = record_for(&owner);
        record
            .access_grants
            .push(grant(doc.id, Utc::now() + Duration::hours(1)));
        records.create(&record).unwrap();

        engine
            .read_record(&doc, record.id, &RequestContext::default())
            .unwrap();

        let trail = audit.list_for_patient(owner.id, 10).unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].patient_id, owner.id);
        assert_eq!(trail[0].accessor_id, Some(doc.id));
        assert_eq!(trail[0].record_id, Some(record.id));
        assert_eq!(trail[0].reason, "granted-access");
    }

    #[test]
    fn test_denied_read_appends_nothing_and_errors() {
        let (_dir, _cfg, engine, records, audit) = engine_fixture();
        let owner = patient("owner@example.com");
        let doc = doctor("doc@example.com");
        let record = record_for(&owner);
        records.create(&record).unwrap();

        let result = engine.read_record(&doc, record.id, &RequestContext::default());
        assert!(matches!(result, Err(CoreError::InsufficientPermissions)));
        assert!(audit.list_for_patient(owner.id, 10).unwrap().is_empty());
    }

    #[test]
    fn test_revoked_grant_denies_on_next_read() {
        let (_dir, _cfg, engine, records, _audit) = engine_fixture();
        let owner = patient("owner@example.com");
        let doc = doctor("doc@example.com");
        let mut record = record_for(&owner);
        record
            .access_grants
            .push(grant(doc.id, Utc::now() + Duration::hours(1)));
        records.create(&record).unwrap();

        engine
            .read_record(&doc, record.id, &RequestContext::default())
            .unwrap();

        // Revoke by flipping the stored entry, as GrantService does.
        record.access_grants[0].granted = false;
        record.access_grants[0].granted_at = Utc::now();
        records.update(&record).unwrap();

        let result = engine.read_record(&doc, record.id, &RequestContext::default());
        assert!(matches!(result, Err(CoreError::InsufficientPermissions)));
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let (_dir, _cfg, engine, _records, _audit) = engine_fixture();
        let owner = patient("owner@example.com");

        let result = engine.read_record(&owner, Uuid::new_v4(), &RequestContext::default());
        assert!(matches!(result, Err(CoreError::NotFound("record"))));
    }
}

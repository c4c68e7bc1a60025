//! Access grants: patient-controlled doctor access to individual records.
//!
//! A grant is a `(record, doctor)` entry with a `granted` flag and an
//! expiry. Expiry is evaluated lazily at read time: there is no background
//! sweep, and an expired or revoked entry is treated as absent, not merely
//! flagged.
//!
//! Revocation is monotonic: a revocation defeats every grant created at or
//! before it for the same pair. Only a grant created *after* the revocation
//! (which [`GrantService::grant`] produces by updating the entry in place)
//! re-enables access.

use crate::store::actors::ActorStore;
use crate::store::records::RecordStore;
use crate::{Actor, CoreError, CoreResult, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// A single grant entry embedded in a record document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub doctor_id: Uuid,
    /// False means revoked. Revoked entries stay in the document so that
    /// revocation keeps winning over any older granted entries.
    pub granted: bool,
    /// When this entry was created or last changed.
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessGrant {
    /// True when this entry, taken alone, permits access at `now`.
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.granted && now < self.expires_at
    }
}

/// Resolves which entry (if any) governs access for `doctor_id` at `now`.
///
/// Among the entries for the pair: the most recently created non-expired
/// `granted = true` entry governs, except that a revocation defeats every
/// grant created at or before it. Expired entries never resurrect.
pub fn effective_grant_at(
    grants: &[AccessGrant],
    doctor_id: Uuid,
    now: DateTime<Utc>,
) -> Option<&AccessGrant> {
    let latest_revocation = grants
        .iter()
        .filter(|g| g.doctor_id == doctor_id && !g.granted)
        .map(|g| g.granted_at)
        .max();

    grants
        .iter()
        .filter(|g| g.doctor_id == doctor_id && g.is_effective_at(now))
        .filter(|g| latest_revocation.map_or(true, |revoked_at| g.granted_at > revoked_at))
        .max_by_key(|g| g.granted_at)
}

/// Patient-facing grant management plus the aggregate queries the
/// dashboard needs.
#[derive(Clone, Debug)]
pub struct GrantService {
    actors: ActorStore,
    records: RecordStore,
}

impl GrantService {
    pub fn new(cfg: Arc<crate::CoreConfig>) -> Self {
        Self {
            actors: ActorStore::new(cfg.clone()),
            records: RecordStore::new(cfg),
        }
    }

    /// Grants `doctor_id` access to `record_id` until `expires_at`.
    ///
    /// Creates or updates the entry for the pair. Only the record's owning
    /// patient may call this, and the grantee must be an active doctor.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] when the record or doctor is missing.
    /// - [`CoreError::InsufficientPermissions`] when `owner` does not own
    ///   the record.
    /// - [`CoreError::InvalidInput`] when the grantee is not an active
    ///   doctor or the expiry is already in the past.
    pub fn grant(
        &self,
        owner: &Actor,
        record_id: Uuid,
        doctor_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<AccessGrant> {
        let mut record = self.records.get(record_id)?;
        if record.patient_id != owner.id {
            return Err(CoreError::InsufficientPermissions);
        }

        let now = Utc::now();
        if expires_at <= now {
            return Err(CoreError::InvalidInput(
                "grant expiry must be in the future".into(),
            ));
        }

        let doctor = self.actors.get(doctor_id).map_err(|e| match e {
            CoreError::NotFound(_) => CoreError::NotFound("doctor"),
            other => other,
        })?;
        if doctor.role() != Role::Doctor || !doctor.is_active {
            return Err(CoreError::InvalidInput(
                "grantee is not an active doctor".into(),
            ));
        }

        let entry = AccessGrant {
            doctor_id,
            granted: true,
            granted_at: now,
            expires_at,
        };
        match record
            .access_grants
            .iter_mut()
            .find(|g| g.doctor_id == doctor_id)
        {
            Some(existing) => *existing = entry.clone(),
            None => record.access_grants.push(entry.clone()),
        }
        record.updated_at = now;
        self.records.update(&record)?;

        tracing::info!(
            record_id = %record_id,
            doctor_id = %doctor_id,
            expires_at = %expires_at,
            "access granted"
        );
        Ok(entry)
    }

    /// Revokes `doctor_id`'s access to `record_id`.
    ///
    /// Idempotent: revoking an absent or already-revoked grant succeeds and
    /// leaves state unchanged. Only the record's owning patient may call
    /// this.
    pub fn revoke(&self, owner: &Actor, record_id: Uuid, doctor_id: Uuid) -> CoreResult<()> {
        let mut record = self.records.get(record_id)?;
        if record.patient_id != owner.id {
            return Err(CoreError::InsufficientPermissions);
        }

        let Some(existing) = record
            .access_grants
            .iter_mut()
            .find(|g| g.doctor_id == doctor_id && g.granted)
        else {
            return Ok(());
        };

        existing.granted = false;
        existing.granted_at = Utc::now();
        record.updated_at = Utc::now();
        self.records.update(&record)?;

        tracing::info!(record_id = %record_id, doctor_id = %doctor_id, "access revoked");
        Ok(())
    }

    /// Doctor ids with an effective grant on `record_id` right now.
    pub fn list_active_grants_for(&self, record_id: Uuid) -> CoreResult<Vec<Uuid>> {
        let record = self.records.get(record_id)?;
        let now = Utc::now();

        let mut doctors: Vec<Uuid> = record
            .access_grants
            .iter()
            .map(|g| g.doctor_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .filter(|doctor_id| {
                effective_grant_at(&record.access_grants, *doctor_id, now).is_some()
            })
            .collect();
        doctors.sort();
        Ok(doctors)
    }

    /// Distinct doctors holding an effective grant on any of the patient's
    /// records. Dashboard metric.
    pub fn count_distinct_doctors_with_access(&self, patient_id: Uuid) -> CoreResult<usize> {
        let now = Utc::now();
        let mut doctors = HashSet::new();

        for record in self.records.list_for_patient(patient_id)? {
            for grant in &record.access_grants {
                if effective_grant_at(&record.access_grants, grant.doctor_id, now).is_some() {
                    doctors.insert(grant.doctor_id);
                }
            }
        }

        Ok(doctors.len())
    }
}


#[cfg(test)]
mod service_tests {
    use super::*;
    use crate::actor::RoleProfile;
    use crate::record::{NewRecord, RecordService};
    use crate::{CoreConfig, NewActor};
    use crate::identity::IdentityService;
    use chrono::Duration;
    use mera_credentials::{SigningKeyMaterial, TokenSigner};
    use mera_types::{EmailAddress, NonEmptyText};
    use uuid::Uuid;

    struct Fixture {
        _dir: tempfile::TempDir,
        identity: IdentityService,
        records: RecordService,
        grants: GrantService,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let cfg = std::sync::Arc::new(CoreConfig::new(dir.path().to_path_buf()).unwrap());
        let signer = TokenSigner::new(&SigningKeyMaterial::generate());
        Fixture {
            identity: IdentityService::new(cfg.clone(), signer),
            records: RecordService::new(cfg.clone()),
            grants: GrantService::new(cfg),
            _dir: dir,
        }
    }

    fn register(fx: &Fixture, email: &str, profile: RoleProfile) -> Actor {
        fx.identity
            .register(NewActor {
                email: EmailAddress::new(email).unwrap(),
                password: "grant-tests".into(),
                first_name: NonEmptyText::new("Test").unwrap(),
                last_name: NonEmptyText::new("Person").unwrap(),
                phone: None,
                profile,
            })
            .unwrap()
            .actor
    }

    fn patient_profile() -> RoleProfile {
        RoleProfile::Patient {
            date_of_birth: None,
            address: None,
            emergency_contact: None,
        }
    }

    fn doctor_profile() -> RoleProfile {
        RoleProfile::Doctor {
            license_number: NonEmptyText::new("GMC-9").unwrap(),
            specialization: None,
            hospital: None,
            verified: false,
        }
    }

    fn make_record(fx: &Fixture, owner: &Actor) -> Uuid {
        fx.records
            .create(
                owner,
                NewRecord {
                    title: Some(NonEmptyText::new("Scan").unwrap()),
                    ..NewRecord::default()
                },
            )
            .unwrap()
            .id
    }

    #[test]
    fn test_grant_then_listed_as_active() {
        let fx = fixture();
        let patient = register(&fx, "p@example.com", patient_profile());
        let doctor = register(&fx, "d@example.com", doctor_profile());
        let record_id = make_record(&fx, &patient);

        fx.grants
            .grant(&patient, record_id, doctor.id, Utc::now() + Duration::hours(1))
            .unwrap();

        assert_eq!(
            fx.grants.list_active_grants_for(record_id).unwrap(),
            vec![doctor.id]
        );
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let fx = fixture();
        let patient = register(&fx, "p@example.com", patient_profile());
        let doctor = register(&fx, "d@example.com", doctor_profile());
        let record_id = make_record(&fx, &patient);

        fx.grants
            .grant(&patient, record_id, doctor.id, Utc::now() + Duration::hours(1))
            .unwrap();

        // Revoking twice succeeds both times and leaves state unchanged.
        fx.grants.revoke(&patient, record_id, doctor.id).unwrap();
        fx.grants.revoke(&patient, record_id, doctor.id).unwrap();
        // And revoking a pair that never had a grant also succeeds.
        fx.grants.revoke(&patient, record_id, Uuid::new_v4()).unwrap();

        assert!(fx.grants.list_active_grants_for(record_id).unwrap().is_empty());
    }

    #[test]
    fn test_regrant_after_revoke_restores_access() {
        let fx = fixture();
        let patient = register(&fx, "p@example.com", patient_profile());
        let doctor = register(&fx, "d@example.com", doctor_profile());
        let record_id = make_record(&fx, &patient);
        let expiry = Utc::now() + Duration::hours(1);

        fx.grants.grant(&patient, record_id, doctor.id, expiry).unwrap();
        fx.grants.revoke(&patient, record_id, doctor.id).unwrap();
        fx.grants.grant(&patient, record_id, doctor.id, expiry).unwrap();

        assert_eq!(
            fx.grants.list_active_grants_for(record_id).unwrap(),
            vec![doctor.id]
        );
    }

    #[test]
    fn test_only_owner_may_grant_or_revoke() {
        let fx = fixture();
        let patient = register(&fx, "p@example.com", patient_profile());
        let intruder = register(&fx, "i@example.com", patient_profile());
        let doctor = register(&fx, "d@example.com", doctor_profile());
        let record_id = make_record(&fx, &patient);

        let granted = fx.grants.grant(
            &intruder,
            record_id,
            doctor.id,
            Utc::now() + Duration::hours(1),
        );
        assert!(matches!(granted, Err(CoreError::InsufficientPermissions)));

        let revoked = fx.grants.revoke(&intruder, record_id, doctor.id);
        assert!(matches!(revoked, Err(CoreError::InsufficientPermissions)));
    }

    #[test]
    fn test_grant_rejects_non_doctor_grantee() {
        let fx = fixture();
        let patient = register(&fx, "p@example.com", patient_profile());
        let other_patient = register(&fx, "o@example.com", patient_profile());
        let record_id = make_record(&fx, &patient);

        let result = fx.grants.grant(
            &patient,
            record_id,
            other_patient.id,
            Utc::now() + Duration::hours(1),
        );
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_grant_rejects_past_expiry() {
        let fx = fixture();
        let patient = register(&fx, "p@example.com", patient_profile());
        let doctor = register(&fx, "d@example.com", doctor_profile());
        let record_id = make_record(&fx, &patient);

        let result = fx.grants.grant(
            &patient,
            record_id,
            doctor.id,
            Utc::now() - Duration::minutes(1),
        );
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_expired_grant_is_listed_as_absent() {
        let fx = fixture();
        let patient = register(&fx, "p@example.com", patient_profile());
        let doctor = register(&fx, "d@example.com", doctor_profile());
        let record_id = make_record(&fx, &patient);

        // Grant a sliver of validity, then wait it out.
        fx.grants
            .grant(
                &patient,
                record_id,
                doctor.id,
                Utc::now() + Duration::milliseconds(50),
            )
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(80));

        assert!(fx.grants.list_active_grants_for(record_id).unwrap().is_empty());
        assert_eq!(
            fx.grants
                .count_distinct_doctors_with_access(patient.id)
                .unwrap(),
            0
        );
    }
}

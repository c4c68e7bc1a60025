//! Medical records and their projections.
//!
//! A record belongs to exactly one patient actor. It carries presentation
//! metadata (title, category, dates), zero or more opaque file references,
//! the `is_emergency_visible` flag, and the embedded access-grant
//! collection consulted by the decision engine.
//!
//! File references are metadata only; blob storage mechanics live outside
//! this core.

use crate::grants::AccessGrant;
use crate::store::records::RecordStore;
use crate::{Actor, CoreError, CoreResult, Role};
use chrono::{DateTime, Utc};
use mera_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record categories, matching the original intake form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordCategory {
    #[default]
    General,
    LabResults,
    Prescription,
    Imaging,
    Emergency,
    Consultation,
}

impl RecordCategory {
    /// Wire/storage spelling of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordCategory::General => "general",
            RecordCategory::LabResults => "lab-results",
            RecordCategory::Prescription => "prescription",
            RecordCategory::Imaging => "imaging",
            RecordCategory::Emergency => "emergency",
            RecordCategory::Consultation => "consultation",
        }
    }
}

impl std::str::FromStr for RecordCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(RecordCategory::General),
            "lab-results" => Ok(RecordCategory::LabResults),
            "prescription" => Ok(RecordCategory::Prescription),
            "imaging" => Ok(RecordCategory::Imaging),
            "emergency" => Ok(RecordCategory::Emergency),
            "consultation" => Ok(RecordCategory::Consultation),
            other => Err(CoreError::InvalidInput(format!(
                "unknown record category: '{other}'"
            ))),
        }
    }
}

/// Reference to an opaque stored blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub filename: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<NonEmptyText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<NonEmptyText>,
    pub size_bytes: u64,
}

/// A patient-owned medical record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    /// Owning patient. The owner always has implicit full access; everyone
    /// else goes through a grant or the emergency path.
    pub patient_id: Uuid,
    pub title: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<NonEmptyText>,
    #[serde(default)]
    pub category: RecordCategory,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital: Option<NonEmptyText>,
    #[serde(default)]
    pub is_emergency_visible: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_grants: Vec<AccessGrant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MedicalRecord {
    /// The reduced projection disclosed through the emergency path.
    ///
    /// Title, description, category and record date only; never files,
    /// never grants.
    pub fn emergency_view(&self) -> EmergencyRecordView {
        EmergencyRecordView {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category,
            record_date: self.record_date,
        }
    }
}

/// What an emergency responder sees of a record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmergencyRecordView {
    pub title: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<NonEmptyText>,
    pub category: RecordCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_date: Option<DateTime<Utc>>,
}

/// Input to record creation.
#[derive(Clone, Debug, Default)]
pub struct NewRecord {
    pub title: Option<NonEmptyText>,
    pub description: Option<NonEmptyText>,
    pub category: RecordCategory,
    pub files: Vec<FileRef>,
    pub record_date: Option<DateTime<Utc>>,
    pub hospital: Option<NonEmptyText>,
    pub is_emergency_visible: bool,
}

/// Owner-side record operations.
///
/// Reads by non-owners do not live here; they go through the
/// [`AccessDecisionEngine`](crate::AccessDecisionEngine) so that every
/// disclosure is audited.
#[derive(Clone, Debug)]
pub struct RecordService {
    records: RecordStore,
}

impl RecordService {
    pub fn new(cfg: std::sync::Arc<crate::CoreConfig>) -> Self {
        Self {
            records: RecordStore::new(cfg),
        }
    }

    /// Creates a record owned by `owner`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InsufficientPermissions`] unless `owner` is a patient.
    /// - [`CoreError::InvalidInput`] when the title is missing.
    /// - Storage errors from the underlying store.
    pub fn create(&self, owner: &Actor, new: NewRecord) -> CoreResult<MedicalRecord> {
        if owner.role() != Role::Patient {
            return Err(CoreError::InsufficientPermissions);
        }
        let title = new
            .title
            .ok_or_else(|| CoreError::InvalidInput("record title is required".into()))?;

        let now = Utc::now();
        let record = MedicalRecord {
            id: Uuid::new_v4(),
            patient_id: owner.id,
            title,
            description: new.description,
            category: new.category,
            files: new.files,
            record_date: new.record_date,
            hospital: new.hospital,
            is_emergency_visible: new.is_emergency_visible,
            access_grants: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.records.create(&record)?;
        tracing::info!(record_id = %record.id, patient_id = %owner.id, "record created");
        Ok(record)
    }

    /// Lists all records owned by `owner`, newest first.
    pub fn list_for_owner(&self, owner: &Actor) -> CoreResult<Vec<MedicalRecord>> {
        if owner.role() != Role::Patient {
            return Err(CoreError::InsufficientPermissions);
        }
        let mut records = self.records.list_for_patient(owner.id)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Loads a record the caller owns.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] when the record does not exist.
    /// - [`CoreError::InsufficientPermissions`] when `owner` does not own
    ///   it. Non-owner *reads* go through the decision engine instead.
    pub fn get_owned(&self, owner: &Actor, record_id: Uuid) -> CoreResult<MedicalRecord> {
        let record = self.records.get(record_id)?;
        if record.patient_id != owner.id {
            return Err(CoreError::InsufficientPermissions);
        }
        Ok(record)
    }

    /// Toggles a record's emergency visibility. Owner only.
    pub fn set_emergency_visibility(
        &self,
        owner: &Actor,
        record_id: Uuid,
        visible: bool,
    ) -> CoreResult<MedicalRecord> {
        let mut record = self.records.get(record_id)?;
        if record.patient_id != owner.id {
            return Err(CoreError::InsufficientPermissions);
        }

        record.is_emergency_visible = visible;
        record.updated_at = Utc::now();
        self.records.update(&record)?;

        tracing::info!(
            record_id = %record.id,
            visible,
            "emergency visibility changed"
        );
        Ok(record)
    }
}

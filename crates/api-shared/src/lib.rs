//! # API Shared
//!
//! Wire types shared between the REST layer and any future transport.
//!
//! These are deliberately plain: strings for roles and categories, and no
//! domain invariants. Validation happens once, at the boundary handler that
//! converts a request DTO into core types; responses are built from already
//! validated domain values.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Uniform error body for every non-2xx response.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Registration payload. Role-specific fields are flat and optional here;
/// the handler assembles the proper role profile and rejects combinations
/// that make no sense for the declared role.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct RegisterReq {
    pub email: String,
    pub password: String,
    /// One of `patient`, `doctor`, `emergency`, `admin`.
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    // Patient fields
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<EmergencyContactDto>,
    // Doctor fields
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub hospital: Option<String>,
    // Emergency-responder fields
    #[serde(default)]
    pub badge_number: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EmergencyContactDto {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

/// Actor representation returned to callers. Never carries the password
/// digest.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ActorRes {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Present only for doctor and emergency-responder roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthRes {
    pub message: String,
    pub token: String,
    pub actor: ActorRes,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FileRefDto {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub size_bytes: u64,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct CreateRecordReq {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// One of `general`, `lab-results`, `prescription`, `imaging`,
    /// `emergency`, `consultation`. Defaults to `general`.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub files: Vec<FileRefDto>,
    #[serde(default)]
    pub record_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hospital: Option<String>,
    #[serde(default)]
    pub is_emergency_visible: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RecordRes {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileRefDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital: Option<String>,
    pub is_emergency_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RecordListRes {
    pub records: Vec<RecordRes>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct VisibilityReq {
    pub is_emergency_visible: bool,
}

// ---------------------------------------------------------------------------
// Grants
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct GrantReq {
    pub doctor_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct GrantRes {
    pub doctor_id: Uuid,
    pub granted: bool,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ActiveGrantsRes {
    pub doctor_ids: Vec<Uuid>,
}

// ---------------------------------------------------------------------------
// Emergency access
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct EmergencyTokenReq {
    /// Validity in minutes; defaults to 60.
    #[serde(default)]
    pub ttl_minutes: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EmergencyTokenRes {
    /// Opaque value to embed in the QR payload.
    pub qr_token: String,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct EmergencyAccessReq {
    pub qr_token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EmergencyPatientRes {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<EmergencyContactDto>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EmergencyRecordRes {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EmergencyAccessRes {
    pub message: String,
    pub patient: EmergencyPatientRes,
    pub emergency_records: Vec<EmergencyRecordRes>,
    /// Id of the audit entry recording this disclosure.
    pub access_id: Uuid,
}

// ---------------------------------------------------------------------------
// Dashboard & audit trail
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardStatsRes {
    pub total_records: usize,
    pub shared_doctors: usize,
    pub recent_activity: usize,
    pub storage_used: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessLogEntryRes {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessor_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
    pub access_type: String,
    pub reason: String,
    pub ip_address: String,
    pub user_agent: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessLogRes {
    pub entries: Vec<AccessLogEntryRes>,
}

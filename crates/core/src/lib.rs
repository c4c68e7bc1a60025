//! # MERA Core
//!
//! Core business logic for MERA (Medical Emergency Record Access): the
//! access-control and audit engine behind a role-based medical-records
//! service.
//!
//! This crate contains pure domain operations and durable document
//! management:
//! - Actor registration, login, and session authentication
//! - Patient-owned medical records with embedded access grants
//! - The access-decision engine (owner / granted doctor / emergency token)
//! - Emergency QR token issue and redemption
//! - The append-only access log, written before any non-owner disclosure
//!
//! **No API concerns**: HTTP servers, status codes, and wire DTOs belong in
//! `api-rest` and `api-shared`.

pub mod actor;
pub mod audit;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod decision;
pub mod emergency;
pub mod error;
pub mod grants;
pub mod ids;
pub mod identity;
pub mod record;
pub mod store;

pub use actor::{Actor, EmergencyContact, EmergencyPatientProfile, NewActor, Role, RoleProfile};
pub use audit::{AccessLogEntry, AccessType, AuditLog};
pub use config::CoreConfig;
pub use dashboard::{DashboardService, DashboardStats};
pub use decision::{
    decide, AccessAction, AccessDecisionEngine, AccessReason, Decision, EmergencyCredential,
    RequestContext,
};
pub use emergency::{EmergencyAccessBundle, EmergencyAccessService};
pub use error::{CoreError, CoreResult};
pub use grants::{effective_grant_at, AccessGrant, GrantService};
pub use ids::ShardedUuid;
pub use identity::{AuthenticatedSession, IdentityService};
pub use record::{
    EmergencyRecordView, FileRef, MedicalRecord, NewRecord, RecordCategory, RecordService,
};

//! Patient dashboard metrics.

use crate::audit::AuditLog;
use crate::constants::RECENT_ACTIVITY_WINDOW_DAYS;
use crate::grants::GrantService;
use crate::store::records::RecordStore;
use crate::{Actor, CoreError, CoreResult, Role};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

/// The four dashboard tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_records: usize,
    /// Distinct doctors holding an effective grant on any record.
    pub shared_doctors: usize,
    /// Audit entries in the last seven days.
    pub recent_activity: usize,
    /// Percentage 0-100. Placeholder formula for display purposes, not a
    /// real storage accounting.
    pub storage_used: u8,
}

/// Aggregates the patient dashboard numbers.
#[derive(Clone, Debug)]
pub struct DashboardService {
    records: RecordStore,
    grants: GrantService,
    audit: AuditLog,
}

impl DashboardService {
    pub fn new(cfg: Arc<crate::CoreConfig>) -> Self {
        Self {
            records: RecordStore::new(cfg.clone()),
            grants: GrantService::new(cfg.clone()),
            audit: AuditLog::new(cfg),
        }
    }

    /// Computes the stats for the requesting patient.
    ///
    /// # Errors
    ///
    /// [`CoreError::InsufficientPermissions`] for non-patient callers.
    pub fn stats(&self, requester: &Actor) -> CoreResult<DashboardStats> {
        if requester.role() != Role::Patient {
            return Err(CoreError::InsufficientPermissions);
        }

        let total_records = self.records.count_for_patient(requester.id)?;
        let shared_doctors = self
            .grants
            .count_distinct_doctors_with_access(requester.id)?;
        let since = Utc::now() - Duration::days(RECENT_ACTIVITY_WINDOW_DAYS);
        let recent_activity = self.audit.count_since(requester.id, since)?;

        Ok(DashboardStats {
            total_records,
            shared_doctors,
            recent_activity,
            storage_used: total_records.min(100) as u8,
        })
    }
}

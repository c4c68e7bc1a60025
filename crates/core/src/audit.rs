//! Append-only access log.
//!
//! Every disclosure of a patient's data to a non-owner produces exactly one
//! entry here, written *before* the disclosure is returned. Entries are
//! JSON Lines appended to a per-patient file under the sharded audit
//! directory; nothing in normal operation mutates or deletes them.
//!
//! Append failures propagate: the decision engine treats a failed append
//! as a failed request, so there is no "allow now, log later" window.

use crate::config::CoreConfig;
use crate::constants::ACCESS_LOG_FILE_NAME;
use crate::ids::ShardedUuid;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// How the data was disclosed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessType {
    View,
    Download,
    EmergencyAccess,
    QrAccess,
}

impl AccessType {
    /// Wire/storage spelling of the access type.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::View => "view",
            AccessType::Download => "download",
            AccessType::EmergencyAccess => "emergency-access",
            AccessType::QrAccess => "qr-access",
        }
    }
}

/// One immutable disclosure event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub id: Uuid,
    /// Whose data was disclosed.
    pub patient_id: Uuid,
    /// Who saw it; `None` is anonymous emergency access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessor_id: Option<Uuid>,
    /// Which record; `None` marks a bulk/scan event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
    pub access_type: AccessType,
    pub reason: String,
    pub ip_address: String,
    pub user_agent: String,
    pub timestamp: DateTime<Utc>,
    /// The emergency token value, when one was redeemed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_token: Option<String>,
}

/// The append-only event sink, plus the read paths the dashboard uses.
#[derive(Clone, Debug)]
pub struct AuditLog {
    cfg: Arc<CoreConfig>,
}

impl AuditLog {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    fn log_file(&self, patient_id: Uuid) -> PathBuf {
        ShardedUuid::from(patient_id)
            .sharded_dir(&self.cfg.audit_dir())
            .join(ACCESS_LOG_FILE_NAME)
    }

    /// Appends `entry` durably.
    ///
    /// The serialized line is written with a single `write_all` on a file
    /// opened in append mode. Any failure is returned to the caller; it is
    /// never swallowed.
    pub fn append(&self, entry: &AccessLogEntry) -> CoreResult<()> {
        let path = self.log_file(entry.patient_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(CoreError::StorageDirCreation)?;
        }

        let mut line = serde_json::to_vec(entry).map_err(CoreError::Serialization)?;
        line.push(b'\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(CoreError::AuditAppend)?;
        file.write_all(&line).map_err(CoreError::AuditAppend)?;

        tracing::debug!(
            patient_id = %entry.patient_id,
            access_type = ?entry.access_type,
            "audit entry appended"
        );
        Ok(())
    }

    /// All entries for a patient, newest first, up to `limit`.
    ///
    /// Unparseable lines are logged and skipped so one corrupt line cannot
    /// hide the rest of the trail from the dashboard.
    pub fn list_for_patient(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> CoreResult<Vec<AccessLogEntry>> {
        let mut entries = self.read_all(patient_id)?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }

    /// Number of entries for a patient at or after `since`.
    pub fn count_since(&self, patient_id: Uuid, since: DateTime<Utc>) -> CoreResult<usize> {
        Ok(self
            .read_all(patient_id)?
            .iter()
            .filter(|e| e.timestamp >= since)
            .count())
    }

    fn read_all(&self, patient_id: Uuid) -> CoreResult<Vec<AccessLogEntry>> {
        let path = self.log_file(patient_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::FileRead(e)),
        };

        let mut entries = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AccessLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(patient_id = %patient_id, "skipping malformed audit line: {e}");
                }
            }
        }
        Ok(entries)
    }
}

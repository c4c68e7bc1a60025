//! Durable medical-record storage.
//!
//! Layout under the data directory:
//!
//! ```text
//! records/
//!   <s1>/<s2>/<record-uuid>/record.yaml   # the record document
//!   by-patient/
//!     <s1>/<s2>/<patient-uuid>/<record-uuid>   # empty marker files
//! ```
//!
//! The marker files make "all records for this patient" a single directory
//! listing instead of a full tree walk. Grant and visibility mutations go
//! through [`RecordStore::update`], whose atomic whole-document replace is
//! what serialises concurrent grant/revoke writes on the same record
//! (last-committed-write-wins).

use crate::config::CoreConfig;
use crate::constants::RECORD_FILE_NAME;
use crate::ids::ShardedUuid;
use crate::record::MedicalRecord;
use crate::store::helpers::{read_yaml, write_yaml};
use crate::{CoreError, CoreResult};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Durable store for [`MedicalRecord`] documents.
#[derive(Clone, Debug)]
pub struct RecordStore {
    cfg: Arc<CoreConfig>,
}

impl RecordStore {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    fn record_file(&self, id: Uuid) -> PathBuf {
        ShardedUuid::from(id)
            .sharded_dir(&self.cfg.records_dir())
            .join(RECORD_FILE_NAME)
    }

    fn patient_index_dir(&self, patient_id: Uuid) -> PathBuf {
        ShardedUuid::from(patient_id).sharded_dir(&self.cfg.patient_index_dir())
    }

    /// Persists a new record document and its per-patient marker.
    pub fn create(&self, record: &MedicalRecord) -> CoreResult<()> {
        write_yaml(&self.record_file(record.id), record)?;

        let index_dir = self.patient_index_dir(record.patient_id);
        fs::create_dir_all(&index_dir).map_err(CoreError::StorageDirCreation)?;
        let marker = index_dir.join(ShardedUuid::from(record.id).to_string());
        fs::write(&marker, b"").map_err(CoreError::FileWrite)?;
        Ok(())
    }

    /// Loads a record by id; `None` when absent.
    pub fn load(&self, id: Uuid) -> CoreResult<Option<MedicalRecord>> {
        read_yaml(&self.record_file(id))
    }

    /// Loads a record by id, erroring when absent.
    pub fn get(&self, id: Uuid) -> CoreResult<MedicalRecord> {
        self.load(id)?.ok_or(CoreError::NotFound("record"))
    }

    /// Replaces an existing record document atomically.
    pub fn update(&self, record: &MedicalRecord) -> CoreResult<()> {
        write_yaml(&self.record_file(record.id), record)
    }

    /// Lists every record owned by `patient_id`.
    ///
    /// Markers whose document has gone missing are logged and skipped.
    pub fn list_for_patient(&self, patient_id: Uuid) -> CoreResult<Vec<MedicalRecord>> {
        let index_dir = self.patient_index_dir(patient_id);
        let entries = match fs::read_dir(&index_dir) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::FileRead(e)),
        };

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Ok(record_id) = ShardedUuid::parse(name) else {
                tracing::warn!("ignoring malformed record marker: {name}");
                continue;
            };

            match self.load(record_id.uuid())? {
                Some(record) => records.push(record),
                None => {
                    tracing::warn!(record_id = %record_id, "record marker points at missing document");
                }
            }
        }

        Ok(records)
    }

    /// Number of records owned by `patient_id`.
    pub fn count_for_patient(&self, patient_id: Uuid) -> CoreResult<usize> {
        let index_dir = self.patient_index_dir(patient_id);
        match fs::read_dir(&index_dir) {
            Ok(it) => Ok(it.flatten().count()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(CoreError::FileRead(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordCategory;
    use chrono::Utc;
    use mera_types::NonEmptyText;

    fn store() -> (tempfile::TempDir, RecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Arc::new(CoreConfig::new(dir.path().to_path_buf()).unwrap());
        (dir, RecordStore::new(cfg))
    }

    fn record(patient_id: Uuid, title: &str) -> MedicalRecord {
        let now = Utc::now();
        MedicalRecord {
            id: Uuid::new_v4(),
            patient_id,
            title: NonEmptyText::new(title).unwrap(),
            description: None,
            category: RecordCategory::General,
            files: Vec::new(),
            record_date: None,
            hospital: None,
            is_emergency_visible: false,
            access_grants: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_create_then_get_round_trip() {
        let (_dir, store) = store();
        let rec = record(Uuid::new_v4(), "Bloods");

        store.create(&rec).unwrap();
        assert_eq!(store.get(rec.id).unwrap(), rec);
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.get(Uuid::new_v4()),
            Err(CoreError::NotFound("record"))
        ));
    }

    #[test]
    fn test_list_for_patient_only_sees_own_records() {
        let (_dir, store) = store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store.create(&record(alice, "A1")).unwrap();
        store.create(&record(alice, "A2")).unwrap();
        store.create(&record(bob, "B1")).unwrap();

        let listed = store.list_for_patient(alice).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|r| r.patient_id == alice));
        assert_eq!(store.count_for_patient(alice).unwrap(), 2);
        assert_eq!(store.count_for_patient(bob).unwrap(), 1);
    }

    #[test]
    fn test_patient_with_no_records_lists_empty() {
        let (_dir, store) = store();
        assert!(store.list_for_patient(Uuid::new_v4()).unwrap().is_empty());
        assert_eq!(store.count_for_patient(Uuid::new_v4()).unwrap(), 0);
    }

    #[test]
    fn test_update_persists_mutation() {
        let (_dir, store) = store();
        let mut rec = record(Uuid::new_v4(), "Imaging");
        store.create(&rec).unwrap();

        rec.is_emergency_visible = true;
        store.update(&rec).unwrap();

        assert!(store.get(rec.id).unwrap().is_emergency_visible);
    }
}

//! Storage-layout constants.

/// Default data directory when `MERA_DATA_DIR` is not set.
pub const DEFAULT_DATA_DIR: &str = "/mera_data";

/// Directory holding actor documents, sharded by actor id.
pub const ACTORS_DIR_NAME: &str = "actors";

/// Directory holding the hashed email → actor-id index files.
pub const EMAIL_INDEX_DIR_NAME: &str = "email-index";

/// Directory holding medical-record documents, sharded by record id.
pub const RECORDS_DIR_NAME: &str = "records";

/// Directory holding per-patient record-id marker files.
pub const PATIENT_INDEX_DIR_NAME: &str = "by-patient";

/// Directory holding per-patient append-only access logs.
pub const AUDIT_DIR_NAME: &str = "audit";

/// Actor document filename within an actor's sharded directory.
pub const ACTOR_FILE_NAME: &str = "actor.yaml";

/// Record document filename within a record's sharded directory.
pub const RECORD_FILE_NAME: &str = "record.yaml";

/// Access-log filename within a patient's sharded audit directory.
pub const ACCESS_LOG_FILE_NAME: &str = "access.jsonl";

/// Window, in days, for the dashboard "recent activity" metric.
pub const RECENT_ACTIVITY_WINDOW_DAYS: i64 = 7;

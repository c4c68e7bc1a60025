//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into core
//! services as an `Arc<CoreConfig>`. Request handlers never read environment
//! variables, which keeps behaviour consistent across multi-threaded
//! runtimes and test harnesses.

use crate::constants::{
    ACTORS_DIR_NAME, AUDIT_DIR_NAME, EMAIL_INDEX_DIR_NAME, PATIENT_INDEX_DIR_NAME,
    RECORDS_DIR_NAME,
};
use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig` rooted at `data_dir`.
    ///
    /// The directory must already exist; binaries fail fast at startup
    /// rather than silently creating a data root in the wrong place.
    /// Subdirectories (actors, records, audit) are created lazily as
    /// documents are written.
    pub fn new(data_dir: PathBuf) -> CoreResult<Self> {
        if !data_dir.is_dir() {
            return Err(CoreError::InvalidInput(format!(
                "data directory does not exist: {}",
                data_dir.display()
            )));
        }
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn actors_dir(&self) -> PathBuf {
        self.data_dir.join(ACTORS_DIR_NAME)
    }

    pub fn email_index_dir(&self) -> PathBuf {
        self.actors_dir().join(EMAIL_INDEX_DIR_NAME)
    }

    pub fn records_dir(&self) -> PathBuf {
        self.data_dir.join(RECORDS_DIR_NAME)
    }

    pub fn patient_index_dir(&self) -> PathBuf {
        self.records_dir().join(PATIENT_INDEX_DIR_NAME)
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.data_dir.join(AUDIT_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_requires_existing_directory() {
        let result = CoreConfig::new(PathBuf::from("/definitely/not/a/real/dir"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_derives_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CoreConfig::new(dir.path().to_path_buf()).unwrap();

        assert!(cfg.actors_dir().starts_with(dir.path()));
        assert!(cfg.email_index_dir().starts_with(cfg.actors_dir()));
        assert!(cfg.patient_index_dir().starts_with(cfg.records_dir()));
        assert!(cfg.audit_dir().ends_with("audit"));
    }
}

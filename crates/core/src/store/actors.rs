//! Durable actor storage.
//!
//! Layout under the data directory:
//!
//! ```text
//! actors/
//!   <s1>/<s2>/<actor-uuid>/actor.yaml     # the actor document
//!   email-index/
//!     <h1>/<h2>/<sha256(email)>           # file content: canonical actor id
//! ```
//!
//! The email index maps the SHA-256 of the canonical (lowercased) email to
//! the actor id, sharded the same two-level way as everything else. Index
//! files are created with `create_new`, which is what makes registration
//! uniqueness hold under concurrency: of two racing registrations for the
//! same address, exactly one creates the index file and the other fails
//! with a conflict.

use crate::config::CoreConfig;
use crate::constants::ACTOR_FILE_NAME;
use crate::ids::ShardedUuid;
use crate::store::helpers::{read_yaml, write_yaml};
use crate::{Actor, CoreError, CoreResult};
use mera_types::EmailAddress;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Durable store for [`Actor`] documents.
#[derive(Clone, Debug)]
pub struct ActorStore {
    cfg: Arc<CoreConfig>,
}

impl ActorStore {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    fn actor_file(&self, id: Uuid) -> PathBuf {
        ShardedUuid::from(id)
            .sharded_dir(&self.cfg.actors_dir())
            .join(ACTOR_FILE_NAME)
    }

    fn email_index_file(&self, email: &EmailAddress) -> PathBuf {
        let digest = Sha256::digest(email.as_str().as_bytes());
        let hash = hex::encode(digest);
        self.cfg
            .email_index_dir()
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(&hash)
    }

    /// Persists a new actor, claiming its email.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Conflict`] when the email is already registered.
    /// - Storage errors otherwise; a failed document write rolls the email
    ///   claim back so the address is not left orphaned.
    pub fn create(&self, actor: &Actor) -> CoreResult<()> {
        let index_path = self.email_index_file(&actor.email);
        if let Some(parent) = index_path.parent() {
            fs::create_dir_all(parent).map_err(CoreError::StorageDirCreation)?;
        }

        let mut index_file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&index_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(CoreError::Conflict(format!(
                    "email already registered: {}",
                    actor.email
                )));
            }
            Err(e) => return Err(CoreError::FileWrite(e)),
        };
        index_file
            .write_all(ShardedUuid::from(actor.id).to_string().as_bytes())
            .map_err(CoreError::FileWrite)?;

        if let Err(e) = write_yaml(&self.actor_file(actor.id), actor) {
            let _ = fs::remove_file(&index_path);
            return Err(e);
        }
        Ok(())
    }

    /// Loads an actor by id; `None` when absent.
    pub fn load(&self, id: Uuid) -> CoreResult<Option<Actor>> {
        read_yaml(&self.actor_file(id))
    }

    /// Loads an actor by id, erroring when absent.
    pub fn get(&self, id: Uuid) -> CoreResult<Actor> {
        self.load(id)?.ok_or(CoreError::NotFound("actor"))
    }

    /// Replaces an existing actor document atomically.
    pub fn update(&self, actor: &Actor) -> CoreResult<()> {
        write_yaml(&self.actor_file(actor.id), actor)
    }

    /// Looks an actor up by canonical email via the index.
    pub fn find_by_email(&self, email: &EmailAddress) -> CoreResult<Option<Actor>> {
        let index_path = self.email_index_file(email);
        let id_text = match fs::read_to_string(&index_path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoreError::FileRead(e)),
        };

        let id = ShardedUuid::parse(id_text.trim())?;
        self.load(id.uuid())
    }

    /// Walks the sharded actor tree and returns every parseable actor.
    ///
    /// Individual unreadable documents are logged and skipped; a single
    /// corrupt file must not take the operator listing down with it.
    pub fn list(&self) -> CoreResult<Vec<Actor>> {
        let mut actors = Vec::new();
        let base = self.cfg.actors_dir();

        let s1_iter = match fs::read_dir(&base) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(actors),
            Err(e) => return Err(CoreError::FileRead(e)),
        };

        for s1 in s1_iter.flatten() {
            // The email index lives alongside the shards; skip it.
            if s1.file_name() == crate::constants::EMAIL_INDEX_DIR_NAME {
                continue;
            }
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }

            for s2 in fs::read_dir(&s1_path).map_err(CoreError::FileRead)?.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }

                for entry in fs::read_dir(&s2_path).map_err(CoreError::FileRead)?.flatten() {
                    let doc = entry.path().join(ACTOR_FILE_NAME);
                    if !doc.is_file() {
                        continue;
                    }
                    match read_yaml::<Actor>(&doc) {
                        Ok(Some(actor)) => actors.push(actor),
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!("failed to parse actor at {}: {e}", doc.display());
                        }
                    }
                }
            }
        }

        Ok(actors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::RoleProfile;
    use chrono::Utc;
    use mera_types::NonEmptyText;

    fn store() -> (tempfile::TempDir, ActorStore) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Arc::new(CoreConfig::new(dir.path().to_path_buf()).unwrap());
        (dir, ActorStore::new(cfg))
    }

    fn patient(email: &str) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            email: EmailAddress::new(email).unwrap(),
            password_digest: "digest".into(),
            first_name: NonEmptyText::new("Grace").unwrap(),
            last_name: NonEmptyText::new("Hopper").unwrap(),
            phone: None,
            profile: RoleProfile::Patient {
                date_of_birth: None,
                address: None,
                emergency_contact: None,
            },
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_create_then_load_round_trip() {
        let (_dir, store) = store();
        let actor = patient("grace@example.com");

        store.create(&actor).unwrap();
        let loaded = store.get(actor.id).unwrap();
        assert_eq!(loaded, actor);
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let (_dir, store) = store();
        store.create(&patient("taken@example.com")).unwrap();

        let result = store.create(&patient("taken@example.com"));
        assert!(matches!(result, Err(CoreError::Conflict(_))));
    }

    #[test]
    fn test_email_lookup_is_case_insensitive() {
        let (_dir, store) = store();
        let actor = patient("Mixed@Example.com");
        store.create(&actor).unwrap();

        let found = store
            .find_by_email(&EmailAddress::new("mixed@EXAMPLE.COM").unwrap())
            .unwrap();
        assert_eq!(found.map(|a| a.id), Some(actor.id));
    }

    #[test]
    fn test_find_by_unknown_email_is_none() {
        let (_dir, store) = store();
        let found = store
            .find_by_email(&EmailAddress::new("nobody@example.com").unwrap())
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_update_replaces_document() {
        let (_dir, store) = store();
        let mut actor = patient("update@example.com");
        store.create(&actor).unwrap();

        actor.is_active = false;
        store.update(&actor).unwrap();

        assert!(!store.get(actor.id).unwrap().is_active);
    }

    #[test]
    fn test_list_skips_email_index() {
        let (_dir, store) = store();
        store.create(&patient("a@example.com")).unwrap();
        store.create(&patient("b@example.com")).unwrap();

        let actors = store.list().unwrap();
        assert_eq!(actors.len(), 2);
    }
}

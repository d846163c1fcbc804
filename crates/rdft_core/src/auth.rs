//! Authentication adapter: resolves a `(user_name, password)` pair to a
//! storage root, creating a private root on first sighting.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::RdftError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    id: String,
    password: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UserMap {
    users: HashMap<String, UserRecord>,
}

/// The `<storage>/data.json`-backed user directory.
///
/// Guarded by a single mutex: user lookups and registrations are rare
/// compared to the data-plane traffic they gate, so there is no need for
/// anything finer-grained.
#[derive(Debug)]
pub struct AuthStore {
    path: PathBuf,
    storage_root: PathBuf,
    users: Mutex<UserMap>,
}

/// Which storage root a resolved identity should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User { id: String },
}

impl Identity {
    /// The path, relative to the server's storage root, this identity reads
    /// and writes under.
    #[must_use]
    pub fn root_relative_path(&self) -> PathBuf {
        match self {
            Self::Anonymous => PathBuf::from("public"),
            Self::User { id } => Path::new("private").join(id),
        }
    }
}

impl AuthStore {
    /// Loads (or creates) the user map at `<storage_root>/data.json`.
    pub fn open(storage_root: impl Into<PathBuf>) -> Result<Self, RdftError> {
        let storage_root = storage_root.into();
        fs::create_dir_all(&storage_root)?;
        let path = storage_root.join("data.json");

        let users = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            UserMap::default()
        };

        let store = Self {
            path,
            storage_root,
            users: Mutex::new(users),
        };
        store.persist()?;
        Ok(store)
    }

    fn persist(&self) -> Result<(), RdftError> {
        let users = self.users.lock().expect("auth store mutex poisoned");
        let serialized = serde_json::to_string_pretty(&*users).expect("UserMap always serializes");
        fs::write(&self.path, serialized)?;
        Ok(())
    }

    /// Resolves `user_name`/`password` (for a non-anonymous request) to an
    /// [`Identity`], registering a brand-new user on first sighting.
    pub fn resolve(&self, user_name: &str, password: &str) -> Result<Identity, RdftError> {
        if user_name.is_empty() {
            return Err(RdftError::InvalidArgument("user name empty".into()));
        }

        {
            let users = self.users.lock().expect("auth store mutex poisoned");
            if let Some(record) = users.users.get(user_name) {
                if record.password != password {
                    return Err(RdftError::PermissionDenied);
                }
                return Ok(Identity::User {
                    id: record.id.clone(),
                });
            }
        }

        let id = self.allocate_fresh_id()?;
        {
            let mut users = self.users.lock().expect("auth store mutex poisoned");
            users.users.insert(
                user_name.to_string(),
                UserRecord {
                    id: id.clone(),
                    password: password.to_string(),
                },
            );
        }
        self.persist()?;
        info!(user_name, id, "registered new user");
        Ok(Identity::User { id })
    }

    fn allocate_fresh_id(&self) -> Result<String, RdftError> {
        loop {
            let id = Uuid::new_v4().to_string();
            let private_root = self.storage_root.join("private").join(&id);
            if !private_root.exists() {
                return Ok(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_resolves_to_public_root() {
        assert_eq!(Identity::Anonymous.root_relative_path(), PathBuf::from("public"));
    }

    #[test]
    fn registers_new_user_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuthStore::open(dir.path()).unwrap();
        let identity = store.resolve("alice", "hunter2").unwrap();
        let Identity::User { id } = identity else {
            panic!("expected a user identity");
        };

        let reopened = AuthStore::open(dir.path()).unwrap();
        let again = reopened.resolve("alice", "hunter2").unwrap();
        assert_eq!(again, Identity::User { id });
    }

    #[test]
    fn rejects_wrong_password_for_existing_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuthStore::open(dir.path()).unwrap();
        store.resolve("alice", "hunter2").unwrap();
        let err = store.resolve("alice", "wrong").unwrap_err();
        assert!(matches!(err, RdftError::PermissionDenied));
    }

    #[test]
    fn rejects_empty_user_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuthStore::open(dir.path()).unwrap();
        let err = store.resolve("", "pw").unwrap_err();
        assert!(matches!(err, RdftError::InvalidArgument(_)));
    }
}

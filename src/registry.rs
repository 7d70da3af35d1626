//! Registry of connected external applications
//!
//! Descriptors are serialized as JSON at a fixed path and reloaded at
//! startup. A corrupt or missing file degrades to an empty registry.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::model::{ConnectionDescriptor, ConnectionStatus};

/// Persistent CRUD over the configured external applications
pub struct ConnectionRegistry {
    path: PathBuf,
    descriptors: Mutex<Vec<ConnectionDescriptor>>,
}

impl ConnectionRegistry {
    /// Load the registry from disk. Missing or unreadable data yields an
    /// empty registry, never an error.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let descriptors = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<ConnectionDescriptor>>(&raw) {
                Ok(list) => list,
                Err(err) => {
                    warn!(path = %path.display(), %err, "corrupt connection registry, starting empty");
                    Vec::new()
                }
            },
            Err(err) => {
                debug!(path = %path.display(), %err, "no persisted connection registry");
                Vec::new()
            }
        };

        Self {
            path,
            descriptors: Mutex::new(descriptors),
        }
    }

    /// Where the registry persists between sessions
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List all configured descriptors
    pub fn list(&self) -> Vec<ConnectionDescriptor> {
        self.descriptors.lock().expect("registry poisoned").clone()
    }

    /// Look up one descriptor by id
    pub fn get(&self, id: &str) -> Option<ConnectionDescriptor> {
        self.descriptors
            .lock()
            .expect("registry poisoned")
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    /// Whether no applications are configured
    pub fn is_empty(&self) -> bool {
        self.descriptors.lock().expect("registry poisoned").is_empty()
    }

    /// Add a descriptor and persist
    pub fn add(&self, descriptor: ConnectionDescriptor) -> Result<(), Error> {
        {
            let mut descriptors = self.descriptors.lock().expect("registry poisoned");
            descriptors.push(descriptor);
        }
        self.save()
    }

    /// Edit a descriptor in place and persist. Returns false when the id
    /// is unknown.
    pub fn update<F>(&self, id: &str, edit: F) -> Result<bool, Error>
    where
        F: FnOnce(&mut ConnectionDescriptor),
    {
        let found = {
            let mut descriptors = self.descriptors.lock().expect("registry poisoned");
            match descriptors.iter_mut().find(|d| d.id == id) {
                Some(descriptor) => {
                    edit(descriptor);
                    true
                }
                None => false,
            }
        };
        if found {
            self.save()?;
        }
        Ok(found)
    }

    /// Remove a descriptor and persist. The caller is responsible for
    /// cascading removal of the descriptor's cached users.
    pub fn remove(&self, id: &str) -> Result<Option<ConnectionDescriptor>, Error> {
        let removed = {
            let mut descriptors = self.descriptors.lock().expect("registry poisoned");
            let index = descriptors.iter().position(|d| d.id == id);
            index.map(|i| descriptors.remove(i))
        };
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    /// Record the outcome of a successful sync for one descriptor
    pub fn record_sync(
        &self,
        id: &str,
        user_count: usize,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.update(id, |descriptor| {
            descriptor.user_count = user_count;
            descriptor.last_sync = Some(at);
            descriptor.status = ConnectionStatus::Connected;
        })
    }

    /// Persist the registry to disk
    pub fn save(&self) -> Result<(), Error> {
        let json = {
            let descriptors = self.descriptors.lock().expect("registry poisoned");
            serde_json::to_string_pretty(&*descriptors)?
        };
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Mint an API key for a newly registered application
    pub fn generate_api_key(live: bool) -> String {
        let env = if live { "live" } else { "test" };
        format!("sk_{}_{}", env, Uuid::new_v4().simple())
    }

    /// Validate the format of an application API key
    pub fn is_valid_api_key(key: &str) -> bool {
        (key.starts_with("sk_live_") || key.starts_with("sk_test_"))
            && key.len() > "sk_live_".len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DbKind;
    use tempfile::tempdir;

    fn descriptor(name: &str) -> ConnectionDescriptor {
        ConnectionDescriptor::new(name, "test app", DbKind::Supabase)
            .with_db_host("db.ref.supabase.co")
            .with_api_key("sk_test_key")
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("connections.json");

        let registry = ConnectionRegistry::load(&path);
        registry.add(descriptor("Acme")).unwrap();
        registry.add(descriptor("Globex")).unwrap();

        let reloaded = ConnectionRegistry::load(&path);
        let names: Vec<String> = reloaded.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Acme", "Globex"]);
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("connections.json");
        fs::write(&path, "{not json").unwrap();

        let registry = ConnectionRegistry::load(&path);
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_file_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let registry = ConnectionRegistry::load(dir.path().join("absent.json"));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_returns_the_descriptor() {
        let dir = tempdir().unwrap();
        let registry = ConnectionRegistry::load(dir.path().join("connections.json"));
        let desc = descriptor("Acme");
        let id = desc.id.clone();
        registry.add(desc).unwrap();

        let removed = registry.remove(&id).unwrap();
        assert_eq!(removed.map(|d| d.name).as_deref(), Some("Acme"));
        assert!(registry.is_empty());
        assert!(registry.remove(&id).unwrap().is_none());
    }

    #[test]
    fn record_sync_updates_bookkeeping() {
        let dir = tempdir().unwrap();
        let registry = ConnectionRegistry::load(dir.path().join("connections.json"));
        let desc = descriptor("Acme");
        let id = desc.id.clone();
        registry.add(desc).unwrap();

        let at = Utc::now();
        assert!(registry.record_sync(&id, 12, at).unwrap());

        let synced = registry.get(&id).unwrap();
        assert_eq!(synced.user_count, 12);
        assert_eq!(synced.last_sync, Some(at));
        assert_eq!(synced.status, ConnectionStatus::Connected);
    }

    #[test]
    fn minted_keys_validate() {
        let live = ConnectionRegistry::generate_api_key(true);
        let test = ConnectionRegistry::generate_api_key(false);
        assert!(live.starts_with("sk_live_"));
        assert!(test.starts_with("sk_test_"));
        assert!(ConnectionRegistry::is_valid_api_key(&live));
        assert!(ConnectionRegistry::is_valid_api_key(&test));
        assert!(!ConnectionRegistry::is_valid_api_key("sk_live_"));
        assert!(!ConnectionRegistry::is_valid_api_key("pk_live_abc"));
    }
}

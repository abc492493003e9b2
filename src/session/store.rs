use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{error, info, warn};
use parking_lot::RwLock;

use crate::models::Role;

use super::Session;

/// File-backed session record, the desktop analogue of the browser's
/// localStorage entry. Last writer wins; there is no cross-process
/// coordination beyond the file itself.
pub struct SessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Opens the store, loading any previously persisted session.
    pub fn open(path: PathBuf) -> Self {
        let current = match Self::read_file(&path) {
            Ok(session) => session,
            Err(e) => {
                // A corrupt session file is treated like a missing one.
                warn!("Failed to load persisted session: {}", e);
                None
            }
        };

        if let Some(session) = &current {
            info!("Restored session for {} ({:?})", session.email, session.role);
        }

        SessionStore {
            path,
            current: RwLock::new(current),
        }
    }

    fn read_file(path: &PathBuf) -> Result<Option<Session>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path).context("reading session file")?;
        let session = serde_json::from_str(&raw).context("parsing session file")?;
        Ok(Some(session))
    }

    /// Persists a new session, replacing any existing one.
    pub fn save(&self, session: Session) {
        if let Err(e) = self.write_file(&session) {
            // Persist failure is not fatal: the in-memory session still
            // carries the user through this run.
            error!("Failed to persist session: {}", e);
        }
        *self.current.write() = Some(session);
    }

    fn write_file(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("creating session directory")?;
        }
        let raw = serde_json::to_string_pretty(session).context("serializing session")?;
        fs::write(&self.path, raw).context("writing session file")?;
        Ok(())
    }

    /// Clears both the in-memory session and the persisted record. Called on
    /// logout and whenever the backend answers 401.
    pub fn clear(&self) {
        *self.current.write() = None;
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                error!("Failed to remove session file: {}", e);
            }
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.auth_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.current
            .read()
            .as_ref()
            .map(|s| s.role == role)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> Session {
        Session {
            user_id: 42,
            email: "ivanov@example.com".into(),
            first_name: "Ivan".into(),
            last_name: "Ivanov".into(),
            role: Role::Employee,
            auth_token: "token-a".into(),
        }
    }

    fn temp_store(name: &str) -> SessionStore {
        let mut path = std::env::temp_dir();
        path.push(format!("testdesk-session-{}-{}.json", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        SessionStore::open(path)
    }

    #[test]
    fn save_and_reload_round_trip() {
        let store = temp_store("roundtrip");
        store.save(sample_session());
        assert!(store.is_authenticated());
        assert!(store.has_role(Role::Employee));
        assert!(!store.has_role(Role::Hr));

        // Re-open from disk, as after an app restart.
        let reopened = SessionStore::open(store.path.clone());
        let session = reopened.current().unwrap();
        assert_eq!(session.user_id, 42);
        assert_eq!(session.auth_token, "token-a");
        store.clear();
    }

    #[test]
    fn clear_removes_file_and_credential() {
        let store = temp_store("clear");
        store.save(sample_session());
        assert!(store.token().is_some());

        store.clear();
        assert!(store.token().is_none());
        assert!(!store.path.exists());

        // Nothing stale survives a reopen either.
        let reopened = SessionStore::open(store.path.clone());
        assert!(!reopened.is_authenticated());
    }

    #[test]
    fn corrupt_file_is_treated_as_logged_out() {
        let mut path = std::env::temp_dir();
        path.push(format!("testdesk-session-corrupt-{}.json", std::process::id()));
        std::fs::write(&path, "{not json").unwrap();
        let store = SessionStore::open(path.clone());
        assert!(!store.is_authenticated());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn last_writer_wins() {
        let store = temp_store("lww");
        store.save(sample_session());
        let mut other = sample_session();
        other.auth_token = "token-b".into();
        store.save(other);
        assert_eq!(store.token().unwrap(), "token-b");
        store.clear();
    }
}

//! Session repository backends
//!
//! The `SessionRepository` trait is the pluggable storage seam for chat
//! sessions: a durable sled-backed store for the server, an in-memory
//! store for tests. Records are JSON-encoded sessions keyed by
//! `{userId}/{sessionId}`.

use crate::error::{Result, WorkdeskError};
use crate::sessions::ChatSession;
use directories::ProjectDirs;
use sled::Db;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// Chat session persistence
///
/// All operations are scoped by user id; listings come back sorted by
/// `updated_at` descending. Deletes are idempotent.
pub trait SessionRepository: Send + Sync {
    /// All sessions for a user, most recently updated first
    fn list(&self, user_id: &str) -> Result<Vec<ChatSession>>;

    /// One session by id, None if absent
    fn get(&self, user_id: &str, session_id: &str) -> Result<Option<ChatSession>>;

    /// Insert or replace a session
    fn upsert(&self, session: &ChatSession) -> Result<()>;

    /// Remove a session; removing an absent session is not an error
    fn delete(&self, user_id: &str, session_id: &str) -> Result<()>;
}

fn record_key(user_id: &str, session_id: &str) -> String {
    format!("{}/{}", user_id, session_id)
}

fn sort_newest_first(sessions: &mut [ChatSession]) {
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// Durable session store over an embedded `sled` database
pub struct SledSessionStore {
    db: Db,
}

impl SledSessionStore {
    /// Open or create a session store at the given path
    ///
    /// # Errors
    ///
    /// Returns `WorkdeskError::Session` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use workdesk::sessions::SledSessionStore;
    ///
    /// # fn main() -> workdesk::error::Result<()> {
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = SledSessionStore::new(dir.path().join("sessions.db"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| WorkdeskError::Session(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }

    /// Open the store at the default data-directory location
    ///
    /// `WORKDESK_SESSIONS_DB` overrides the path, which makes pointing a
    /// binary at a test database trivial.
    ///
    /// # Errors
    ///
    /// Returns `WorkdeskError::Session` if no data directory can be
    /// determined or the database cannot be opened
    pub fn open_default() -> Result<Self> {
        if let Ok(override_path) = std::env::var("WORKDESK_SESSIONS_DB") {
            return Self::new(override_path);
        }

        let proj_dirs = ProjectDirs::from("com", "workdesk", "workdesk")
            .ok_or_else(|| WorkdeskError::Session("Could not determine data directory".into()))?;
        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .map_err(|e| WorkdeskError::Session(format!("Failed to create data dir: {}", e)))?;

        Self::new(data_dir.join("sessions.db"))
    }
}

impl SessionRepository for SledSessionStore {
    fn list(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        let prefix = format!("{}/", user_id);
        let mut sessions = Vec::new();
        for entry in self.db.scan_prefix(prefix.as_bytes()) {
            let (_, value) =
                entry.map_err(|e| WorkdeskError::Session(format!("Iteration failed: {}", e)))?;
            let session: ChatSession = serde_json::from_slice(&value)
                .map_err(|e| WorkdeskError::Session(format!("Deserialization failed: {}", e)))?;
            sessions.push(session);
        }
        sort_newest_first(&mut sessions);
        Ok(sessions)
    }

    fn get(&self, user_id: &str, session_id: &str) -> Result<Option<ChatSession>> {
        let key = record_key(user_id, session_id);
        match self
            .db
            .get(key.as_bytes())
            .map_err(|e| WorkdeskError::Session(format!("Get failed: {}", e)))?
        {
            Some(bytes) => {
                let session = serde_json::from_slice(&bytes)
                    .map_err(|e| WorkdeskError::Session(format!("Deserialization failed: {}", e)))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    fn upsert(&self, session: &ChatSession) -> Result<()> {
        let key = record_key(&session.user_id, &session.id);
        let value = serde_json::to_vec(session)
            .map_err(|e| WorkdeskError::Session(format!("Serialization failed: {}", e)))?;

        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| WorkdeskError::Session(format!("Insert failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| WorkdeskError::Session(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    fn delete(&self, user_id: &str, session_id: &str) -> Result<()> {
        let key = record_key(user_id, session_id);
        self.db
            .remove(key.as_bytes())
            .map_err(|e| WorkdeskError::Session(format!("Remove failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| WorkdeskError::Session(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

/// In-memory session store for tests
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, ChatSession>>,
}

impl MemorySessionStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRepository for MemorySessionStore {
    fn list(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        let sessions = self.sessions.read().expect("lock poisoned");
        let prefix = format!("{}/", user_id);
        let mut result: Vec<ChatSession> = sessions
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, session)| session.clone())
            .collect();
        sort_newest_first(&mut result);
        Ok(result)
    }

    fn get(&self, user_id: &str, session_id: &str) -> Result<Option<ChatSession>> {
        let sessions = self.sessions.read().expect("lock poisoned");
        Ok(sessions.get(&record_key(user_id, session_id)).cloned())
    }

    fn upsert(&self, session: &ChatSession) -> Result<()> {
        let mut sessions = self.sessions.write().expect("lock poisoned");
        sessions.insert(record_key(&session.user_id, &session.id), session.clone());
        Ok(())
    }

    fn delete(&self, user_id: &str, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().expect("lock poisoned");
        sessions.remove(&record_key(user_id, session_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::ChatMessage;
    use std::thread::sleep;
    use std::time::Duration;

    fn sled_store() -> (SledSessionStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let store =
            SledSessionStore::new(dir.path().join("sessions.db")).expect("failed to open store");
        (store, dir)
    }

    fn run_repository_suite(store: &dyn SessionRepository) {
        // upsert + get
        let mut session = ChatSession::new("u1", None);
        session.push_message(ChatMessage::user("hello"));
        store.upsert(&session).expect("upsert failed");

        let loaded = store
            .get("u1", &session.id)
            .expect("get failed")
            .expect("session missing");
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.title, "hello");

        // missing id
        assert!(store.get("u1", "nope").expect("get failed").is_none());

        // per-user scoping
        let other = ChatSession::new("u2", None);
        store.upsert(&other).expect("upsert failed");
        assert_eq!(store.list("u1").expect("list failed").len(), 1);
        assert_eq!(store.list("u2").expect("list failed").len(), 1);

        // newest first
        sleep(Duration::from_millis(5));
        let mut newer = ChatSession::new("u1", None);
        newer.push_message(ChatMessage::user("newer"));
        store.upsert(&newer).expect("upsert failed");
        let listed = store.list("u1").expect("list failed");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);

        // idempotent delete
        store.delete("u1", &session.id).expect("delete failed");
        store.delete("u1", &session.id).expect("second delete failed");
        assert!(store.get("u1", &session.id).expect("get failed").is_none());
    }

    #[test]
    fn test_sled_repository_suite() {
        let (store, _dir) = sled_store();
        run_repository_suite(&store);
    }

    #[test]
    fn test_memory_repository_suite() {
        let store = MemorySessionStore::new();
        run_repository_suite(&store);
    }

    #[test]
    fn test_sled_store_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let path = dir.path().join("sessions.db");
        let session = ChatSession::new("u1", Some("persistent".to_string()));

        {
            let store = SledSessionStore::new(&path).expect("open failed");
            store.upsert(&session).expect("upsert failed");
        }

        let store = SledSessionStore::new(&path).expect("reopen failed");
        let loaded = store
            .get("u1", &session.id)
            .expect("get failed")
            .expect("session missing");
        assert_eq!(loaded.title, "persistent");
    }

    #[test]
    fn test_record_key_format() {
        assert_eq!(record_key("u1", "s1"), "u1/s1");
    }
}

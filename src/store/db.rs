//! Durable storage for the current token pair and coarse client flags.
//!
//! Reads are always served from an in-memory mirror, so callers never
//! see storage errors. Writes go through to redb when it is available;
//! when the database cannot be opened or a write fails, the store keeps
//! working memory-only and the failure is logged. A broken disk costs
//! durability across restarts, never the current session.

use redb::Database as RedbDatabase;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use super::tables::{FLAGS, TOKENS};

const ACCESS_TOKEN: &str = "access_token";
const REFRESH_TOKEN: &str = "refresh_token";
const ONBOARDING_COMPLETE: &str = "onboarding_complete";

const STORE_FILE: &str = "unear-session.redb";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
}

/// In-memory view of the persisted state. Authoritative for reads.
#[derive(Debug, Clone, Default)]
struct Mirror {
    access_token: Option<String>,
    onboarding_complete: bool,
    refresh_token: Option<String>,
}

pub struct TokenStore {
    db: Option<RedbDatabase>,
    mirror: Mutex<Mirror>,
}

impl TokenStore {
    /// Open the store under `data_dir`, falling back to memory-only
    /// operation when the database cannot be opened. Never fails.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Self {
        match Self::open_durable(data_dir.as_ref()) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    data_dir = %data_dir.as_ref().display(),
                    "Token storage unavailable, continuing memory-only; session will not survive a restart"
                );
                Self {
                    db: None,
                    mirror: Mutex::new(Mirror::default()),
                }
            }
        }
    }

    fn open_durable(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        let db = RedbDatabase::create(data_dir.join(STORE_FILE))?;

        // Create tables up front so later reads cannot hit a missing table.
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TOKENS)?;
            let _ = write_txn.open_table(FLAGS)?;
        }
        write_txn.commit()?;

        let mirror = Self::load_mirror(&db)?;
        Ok(Self {
            db: Some(db),
            mirror: Mutex::new(mirror),
        })
    }

    fn load_mirror(db: &RedbDatabase) -> Result<Mirror, StoreError> {
        let read_txn = db.begin_read()?;
        let tokens = read_txn.open_table(TOKENS)?;
        let flags = read_txn.open_table(FLAGS)?;

        Ok(Mirror {
            access_token: tokens.get(ACCESS_TOKEN)?.map(|v| v.value().to_string()),
            onboarding_complete: flags
                .get(ONBOARDING_COMPLETE)?
                .map(|v| v.value())
                .unwrap_or(false),
            refresh_token: tokens.get(REFRESH_TOKEN)?.map(|v| v.value().to_string()),
        })
    }

    /// True when the store is running without a backing database.
    pub fn is_memory_only(&self) -> bool {
        self.db.is_none()
    }

    // ===== Token material =====

    pub fn access_token(&self) -> Option<String> {
        self.mirror().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.mirror().refresh_token.clone()
    }

    pub fn set_access_token(&self, token: &str) {
        self.mirror().access_token = Some(token.to_string());
        self.write_through(|txn| {
            let mut table = txn.open_table(TOKENS)?;
            table.insert(ACCESS_TOKEN, token)?;
            Ok(())
        });
    }

    pub fn set_refresh_token(&self, token: &str) {
        self.mirror().refresh_token = Some(token.to_string());
        self.write_through(|txn| {
            let mut table = txn.open_table(TOKENS)?;
            table.insert(REFRESH_TOKEN, token)?;
            Ok(())
        });
    }

    /// Store a new access token together with its refresh token.
    ///
    /// `refresh` is `None` when the server did not rotate the refresh
    /// token; the stored one stays in place. Both slots are written in
    /// one transaction so a reader never sees a half-replaced pair.
    pub fn set_token_pair(&self, access: &str, refresh: Option<&str>) {
        {
            let mut mirror = self.mirror();
            mirror.access_token = Some(access.to_string());
            if let Some(refresh) = refresh {
                mirror.refresh_token = Some(refresh.to_string());
            }
        }
        self.write_through(|txn| {
            let mut table = txn.open_table(TOKENS)?;
            table.insert(ACCESS_TOKEN, access)?;
            if let Some(refresh) = refresh {
                table.insert(REFRESH_TOKEN, refresh)?;
            }
            Ok(())
        });
    }

    /// Remove both tokens. Flags are untouched.
    pub fn clear_tokens(&self) {
        {
            let mut mirror = self.mirror();
            mirror.access_token = None;
            mirror.refresh_token = None;
        }
        self.write_through(|txn| {
            let mut table = txn.open_table(TOKENS)?;
            let _ = table.remove(ACCESS_TOKEN)?;
            let _ = table.remove(REFRESH_TOKEN)?;
            Ok(())
        });
    }

    // ===== Client flags =====

    pub fn onboarding_complete(&self) -> bool {
        self.mirror().onboarding_complete
    }

    pub fn set_onboarding_complete(&self, complete: bool) {
        self.mirror().onboarding_complete = complete;
        self.write_through(|txn| {
            let mut table = txn.open_table(FLAGS)?;
            table.insert(ONBOARDING_COMPLETE, complete)?;
            Ok(())
        });
    }

    /// Wipe everything, flags included.
    pub fn purge(&self) {
        {
            let mut mirror = self.mirror();
            *mirror = Mirror::default();
        }
        self.write_through(|txn| {
            let mut tokens = txn.open_table(TOKENS)?;
            let _ = tokens.remove(ACCESS_TOKEN)?;
            let _ = tokens.remove(REFRESH_TOKEN)?;
            drop(tokens);
            let mut flags = txn.open_table(FLAGS)?;
            let _ = flags.remove(ONBOARDING_COMPLETE)?;
            Ok(())
        });
    }

    // ===== Internal =====

    fn mirror(&self) -> MutexGuard<'_, Mirror> {
        // The mirror is plain data; a panic while holding the lock
        // cannot leave it inconsistent, so poisoning is ignored.
        self.mirror.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `write` in a single transaction, logging instead of
    /// propagating on failure. The mirror has already been updated.
    fn write_through<F>(&self, write: F)
    where
        F: FnOnce(&redb::WriteTransaction) -> Result<(), StoreError>,
    {
        let Some(db) = &self.db else {
            return;
        };
        let result = (|| {
            let txn = db.begin_write()?;
            write(&txn)?;
            txn.commit()?;
            Ok::<(), StoreError>(())
        })();
        if let Err(e) = result {
            tracing::warn!(error = %e, "Token storage write failed; state kept in memory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_tokens_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = TokenStore::open(temp_dir.path());
        assert!(!store.is_memory_only());
        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);

        store.set_access_token("access-1");
        store.set_refresh_token("refresh-1");
        assert_eq!(store.access_token().as_deref(), Some("access-1"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));

        // A pair write replaces both slots at once.
        store.set_token_pair("access-2", Some("refresh-2"));
        assert_eq!(store.access_token().as_deref(), Some("access-2"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-2"));
    }

    #[test]
    fn test_tokens_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = TokenStore::open(temp_dir.path());
            store.set_token_pair("access-1", Some("refresh-1"));
            store.set_onboarding_complete(true);
        }

        let store = TokenStore::open(temp_dir.path());
        assert_eq!(store.access_token().as_deref(), Some("access-1"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
        assert!(store.onboarding_complete());
    }

    #[test]
    fn test_absent_refresh_keeps_stored_one() {
        let temp_dir = TempDir::new().unwrap();
        let store = TokenStore::open(temp_dir.path());

        store.set_token_pair("access-1", Some("refresh-1"));
        store.set_token_pair("access-2", None);

        assert_eq!(store.access_token().as_deref(), Some("access-2"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
    }

    #[test]
    fn test_clear_tokens_leaves_flags() {
        let temp_dir = TempDir::new().unwrap();
        let store = TokenStore::open(temp_dir.path());

        store.set_token_pair("access-1", Some("refresh-1"));
        store.set_onboarding_complete(true);
        store.clear_tokens();

        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
        assert!(store.onboarding_complete());
    }

    #[test]
    fn test_purge_wipes_everything() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = TokenStore::open(temp_dir.path());
            store.set_token_pair("access-1", Some("refresh-1"));
            store.set_onboarding_complete(true);
            store.purge();
            assert_eq!(store.access_token(), None);
            assert!(!store.onboarding_complete());
        }

        // The purge is durable too.
        let store = TokenStore::open(temp_dir.path());
        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
        assert!(!store.onboarding_complete());
    }

    #[test]
    fn test_unusable_data_dir_degrades_to_memory() {
        // A file where the data directory should be makes create_dir_all fail.
        let blocker = NamedTempFile::new().unwrap();
        let store = TokenStore::open(blocker.path());

        assert!(store.is_memory_only());

        // Everything still works, just without durability.
        store.set_token_pair("access-1", Some("refresh-1"));
        store.set_onboarding_complete(true);
        assert_eq!(store.access_token().as_deref(), Some("access-1"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
        assert!(store.onboarding_complete());

        store.clear_tokens();
        assert_eq!(store.access_token(), None);
    }
}

//! PolicyStore — redb-backed policy persistence.
//!
//! Policies are JSON-serialized into redb's `&[u8]` value column. Every
//! write that changes the stored set bumps a modify index in the same
//! transaction, so a reader that sees index N also sees every write up to N.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use tracing::debug;

use tidal_core::Policy;

use crate::error::{StoreError, StoreResult};
use crate::tables::*;

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Thread-safe policy store backed by redb.
#[derive(Clone)]
pub struct PolicyStore {
    db: Arc<Database>,
}

impl PolicyStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "policy store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory policy store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(POLICIES).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert or update one policy.
    pub fn put_policy(&self, policy: &Policy) -> StoreResult<u64> {
        self.put_policies(std::slice::from_ref(policy))
    }

    /// Insert or update several policies in one transaction. Returns the
    /// new modify index.
    pub fn put_policies(&self, policies: &[Policy]) -> StoreResult<u64> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(POLICIES).map_err(map_err!(Table))?;
            for policy in policies {
                let value = serde_json::to_vec(policy).map_err(map_err!(Serialize))?;
                table
                    .insert(policy.id.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        let index = bump_index(&txn)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count = policies.len(), index, "policies stored");
        Ok(index)
    }

    /// Get a policy by ID.
    pub fn get_policy(&self, id: &str) -> StoreResult<Option<Policy>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(POLICIES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let policy: Policy =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(policy))
            }
            None => Ok(None),
        }
    }

    /// List all policies, ordered by ID.
    pub fn list_policies(&self) -> StoreResult<Vec<Policy>> {
        Ok(self.snapshot()?.1)
    }

    /// Delete a policy by ID. Returns true if it existed.
    pub fn delete_policy(&self, id: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(POLICIES).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        if existed {
            bump_index(&txn)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%id, existed, "policy deleted");
        Ok(existed)
    }

    /// Current modify index. Zero for a store that was never written.
    pub fn index(&self) -> StoreResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let meta = txn.open_table(META).map_err(map_err!(Table))?;
        Ok(meta
            .get(INDEX_KEY)
            .map_err(map_err!(Read))?
            .map(|g| g.value())
            .unwrap_or(0))
    }

    /// The modify index and the full policy list, read consistently.
    pub fn snapshot(&self) -> StoreResult<(u64, Vec<Policy>)> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let meta = txn.open_table(META).map_err(map_err!(Table))?;
        let index = meta
            .get(INDEX_KEY)
            .map_err(map_err!(Read))?
            .map(|g| g.value())
            .unwrap_or(0);

        let table = txn.open_table(POLICIES).map_err(map_err!(Table))?;
        let mut policies = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let policy: Policy =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            policies.push(policy);
        }
        Ok((index, policies))
    }
}

fn bump_index(txn: &WriteTransaction) -> StoreResult<u64> {
    let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
    let current = meta
        .get(INDEX_KEY)
        .map_err(map_err!(Read))?
        .map(|g| g.value())
        .unwrap_or(0);
    let next = current + 1;
    meta.insert(INDEX_KEY, next).map_err(map_err!(Write))?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tidal_core::{ConfigMap, PolicyStrategy, PolicyTarget};

    fn test_policy(id: &str) -> Policy {
        Policy {
            id: id.to_string(),
            source: "local-cluster".to_string(),
            query: "cpu".to_string(),
            target: PolicyTarget {
                name: "local-cluster".to_string(),
                config: ConfigMap::from([("job".to_string(), "web".to_string())]),
            },
            strategy: PolicyStrategy {
                name: "target-value".to_string(),
                min: 1,
                max: 10,
                config: ConfigMap::new(),
            },
            interval: Duration::ZERO,
        }
    }

    #[test]
    fn policy_put_and_get() {
        let store = PolicyStore::open_in_memory().unwrap();
        let policy = test_policy("p1");
        store.put_policy(&policy).unwrap();

        assert_eq!(store.get_policy("p1").unwrap(), Some(policy));
        assert_eq!(store.get_policy("missing").unwrap(), None);
    }

    #[test]
    fn list_is_ordered_by_id() {
        let store = PolicyStore::open_in_memory().unwrap();
        store
            .put_policies(&[test_policy("b"), test_policy("a"), test_policy("c")])
            .unwrap();

        let ids: Vec<String> = store.list_policies().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn update_in_place() {
        let store = PolicyStore::open_in_memory().unwrap();
        let mut policy = test_policy("p1");
        store.put_policy(&policy).unwrap();

        policy.interval = Duration::from_secs(1);
        store.put_policy(&policy).unwrap();

        assert_eq!(store.list_policies().unwrap().len(), 1);
        assert_eq!(
            store.get_policy("p1").unwrap().unwrap().interval,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn index_advances_on_every_change() {
        let store = PolicyStore::open_in_memory().unwrap();
        assert_eq!(store.index().unwrap(), 0);

        assert_eq!(store.put_policy(&test_policy("p1")).unwrap(), 1);
        assert_eq!(store.put_policies(&[test_policy("p2"), test_policy("p3")]).unwrap(), 2);
        assert!(store.delete_policy("p2").unwrap());
        assert_eq!(store.index().unwrap(), 3);
    }

    #[test]
    fn deleting_missing_policy_keeps_index() {
        let store = PolicyStore::open_in_memory().unwrap();
        store.put_policy(&test_policy("p1")).unwrap();

        assert!(!store.delete_policy("ghost").unwrap());
        assert_eq!(store.index().unwrap(), 1);
    }

    #[test]
    fn snapshot_pairs_index_with_policies() {
        let store = PolicyStore::open_in_memory().unwrap();
        store.put_policy(&test_policy("p1")).unwrap();
        store.put_policy(&test_policy("p2")).unwrap();

        let (index, policies) = store.snapshot().unwrap();
        assert_eq!(index, 2);
        assert_eq!(policies.len(), 2);
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.redb");

        {
            let store = PolicyStore::open(&path).unwrap();
            store.put_policy(&test_policy("p1")).unwrap();
        }

        let store = PolicyStore::open(&path).unwrap();
        assert!(store.get_policy("p1").unwrap().is_some());
        assert_eq!(store.index().unwrap(), 1);
    }
}

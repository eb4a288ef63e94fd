//! # SledStore — Persistent Storage Engine
//!
//! The on-disk half of the wallet, built on sled's embedded key-value
//! store. Everything lives in a single tree named `wallet`; the slot
//! prefixes in [`crate::config`] partition the keyspace.
//!
//! sled only makes `apply_batch` atomic within one tree. Registration
//! commits the credential, the registration record and the pending-marker
//! removal in one batch, so all slots share the tree.

use sled::{Batch, Db, Tree};
use std::path::Path;

use super::store::{BatchOp, SecureStore, StoreResult, WriteBatch};

const WALLET_TREE: &str = "wallet";

/// sled-backed [`SecureStore`].
///
/// Values are stored as given. Wrap in
/// [`EncryptedStore`](super::EncryptedStore) before putting secrets in it.
///
/// # Thread Safety
///
/// sled trees support lock-free concurrent reads and serialized writes, so
/// a `SledStore` can be shared via `Arc` without extra locking.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    tree: Tree,
}

impl SledStore {
    /// Open or create a store at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that lives in a temp directory and disappears on drop.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let tree = db.open_tree(WALLET_TREE)?;
        Ok(Self { db, tree })
    }

    /// Number of entries across all slots.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl SecureStore for SledStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.tree.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.tree.remove(key.as_bytes())?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::new();
        for entry in self.tree.scan_prefix(prefix.as_bytes()) {
            let (k, v) = entry?;
            // Every key we write is UTF-8; anything else was not written by us.
            let key = String::from_utf8(k.to_vec())
                .map_err(|_| super::StoreError::Corrupt(hex::encode(&k)))?;
            out.push((key, v.to_vec()));
        }
        Ok(out)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut sled_batch = Batch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => sled_batch.insert(key.as_bytes(), value),
                BatchOp::Delete { key } => sled_batch.remove(key.as_bytes()),
            }
        }
        self.tree.apply_batch(sled_batch)?;
        Ok(())
    }

    fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

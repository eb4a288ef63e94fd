//! Encryption-at-rest wrapper.
//!
//! [`EncryptedStore`] seals every value with AES-256-GCM before handing it
//! to the inner store, using the slot key as AAD. Keys stay in the clear
//! so prefix scans keep working; they hold aliases, DIDs and credential
//! ids, none of which is secret.

use std::fmt;

use super::store::{BatchOp, SecureStore, StoreResult, WriteBatch};
use crate::config::{AES_KEY_LENGTH, DEVICE_SECRET_LENGTH};
use crate::crypto::{derive_storage_key, open, seal};

/// A [`SecureStore`] that encrypts values on the way in and decrypts them
/// on the way out.
pub struct EncryptedStore<S> {
    inner: S,
    key: [u8; AES_KEY_LENGTH],
}

impl<S: SecureStore> EncryptedStore<S> {
    /// Wrap `inner`, keying the cipher from a device secret.
    pub fn new(inner: S, device_secret: &[u8; DEVICE_SECRET_LENGTH]) -> Self {
        Self {
            inner,
            key: derive_storage_key(device_secret),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> fmt::Debug for EncryptedStore<S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedStore")
            .field("inner", &self.inner)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl<S: SecureStore> SecureStore for EncryptedStore<S> {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.inner.get(key)? {
            Some(sealed) => Ok(Some(open(&self.key, &sealed, key.as_bytes())?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let sealed = seal(&self.key, value, key.as_bytes())?;
        self.inner.set(key, &sealed)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key)
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        self.inner
            .scan_prefix(prefix)?
            .into_iter()
            .map(|(k, sealed)| {
                let plain = open(&self.key, &sealed, k.as_bytes())?;
                Ok((k, plain))
            })
            .collect()
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut sealed = WriteBatch::new();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    let ct = seal(&self.key, &value, key.as_bytes())?;
                    sealed.put(key, ct);
                }
                BatchOp::Delete { key } => sealed.delete(key),
            }
        }
        self.inner.commit(sealed)
    }

    fn flush(&self) -> StoreResult<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SledStore, StoreError};

    fn store() -> EncryptedStore<SledStore> {
        EncryptedStore::new(SledStore::open_temporary().unwrap(), &[1u8; 32])
    }

    #[test]
    fn values_are_not_stored_in_the_clear() {
        let store = store();
        store.set("credential:1", b"Ana Lee").unwrap();
        let raw = store.inner().get("credential:1").unwrap().unwrap();
        assert!(!raw.windows(7).any(|w| w == b"Ana Lee"));
        assert_eq!(store.get("credential:1").unwrap().unwrap(), b"Ana Lee");
    }

    #[test]
    fn swapped_slots_fail_to_open() {
        let store = store();
        store.set("credential:a", b"a").unwrap();
        let raw = store.inner().get("credential:a").unwrap().unwrap();
        store.inner().set("credential:b", &raw).unwrap();
        assert!(matches!(
            store.get("credential:b"),
            Err(StoreError::Encryption(_))
        ));
    }

    #[test]
    fn commit_and_scan_decrypt() {
        let store = store();
        let mut batch = WriteBatch::new();
        batch.put("credential:1", b"one".to_vec());
        batch.put("credential:2", b"two".to_vec());
        store.commit(batch).unwrap();

        let all = store.scan_prefix("credential:").unwrap();
        assert_eq!(all[0].1, b"one");
        assert_eq!(all[1].1, b"two");
    }

    #[test]
    fn wrong_device_secret_cannot_read() {
        let inner = SledStore::open_temporary().unwrap();
        let a = EncryptedStore::new(inner.clone(), &[1u8; 32]);
        a.set("registration", b"{}").unwrap();
        let b = EncryptedStore::new(inner, &[2u8; 32]);
        assert!(b.get("registration").is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let dbg = format!("{:?}", store());
        assert!(dbg.contains("<redacted>"));
    }
}

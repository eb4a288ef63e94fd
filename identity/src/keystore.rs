//! # KeyStore
//!
//! Owns the wallet's private key material. Keys are generated here,
//! persisted under an opaque alias, and used for signing here. The secret
//! half never leaves this module: callers get a [`KeyPair`] (public data
//! plus the alias) and a signature, nothing more.
//!
//! Storage layout is one slot per key, `key:<alias>`, holding a bincode
//! [`StoredKey`]. Put the store behind an
//! [`EncryptedStore`](crate::storage::EncryptedStore) and the secret is
//! sealed at rest too.
//!
//! Every operation here is synchronous and CPU-light except generation and
//! signing, which callers on an async runtime should push onto
//! `spawn_blocking`. `KeyStore` is cheap to clone for exactly that reason.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::KEY_PREFIX;
use crate::crypto::{KeyError, KeySignature, KeyType, PublicKey, WalletKeypair};
use crate::storage::{SecureStore, StoreError, StoreExt, WriteBatch};
use crate::timestamp;

/// Errors produced by the key store.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

/// Public view of a stored key pair.
///
/// `key_id` is the only handle to the private half. Immutable once
/// created; rotation means a new `KeyPair`, never an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub key_id: String,
    pub key_type: KeyType,
    pub public_key: PublicKey,
    pub created: DateTime<Utc>,
}

/// On-disk record. Never leaves this module.
#[derive(Serialize, Deserialize)]
struct StoredKey {
    key_type: KeyType,
    public_key: Vec<u8>,
    secret: Vec<u8>,
    created: i64,
}

/// Generates, stores and signs with wallet keys.
#[derive(Debug, Clone)]
pub struct KeyStore {
    store: Arc<dyn SecureStore>,
}

impl KeyStore {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store }
    }

    fn slot(key_id: &str) -> String {
        format!("{KEY_PREFIX}{key_id}")
    }

    /// Create and persist a new key pair under a fresh random alias.
    ///
    /// Not idempotent: every call is a new key.
    pub fn generate_key_pair(&self, key_type: KeyType) -> KeyStoreResult<KeyPair> {
        self.generate_key_pair_with_id(&Uuid::new_v4().to_string(), key_type)
    }

    /// [`generate_key_pair`](Self::generate_key_pair) for an algorithm named
    /// by string, as the mobile layer passes it (`ED25519`, `EC_SECP256K1`).
    pub fn generate_key_pair_named(&self, algorithm: &str) -> KeyStoreResult<KeyPair> {
        let key_type: KeyType = algorithm.parse().map_err(|e| match e {
            KeyError::UnsupportedAlgorithm(a) => {
                KeyStoreError::KeyGeneration(format!("unsupported algorithm {a}"))
            }
            other => KeyStoreError::KeyGeneration(other.to_string()),
        })?;
        self.generate_key_pair(key_type)
    }

    /// Create and persist a new key pair under a caller-chosen alias.
    ///
    /// Registration picks the alias up front and records it before the key
    /// exists, so a crash in between can be reconciled. Refuses to
    /// overwrite an existing key.
    pub fn generate_key_pair_with_id(
        &self,
        key_id: &str,
        key_type: KeyType,
    ) -> KeyStoreResult<KeyPair> {
        let slot = Self::slot(key_id);
        if self.store.contains(&slot)? {
            return Err(KeyStoreError::KeyGeneration(format!(
                "alias {key_id} already holds a key"
            )));
        }

        let keypair = WalletKeypair::generate(key_type)
            .map_err(|e| KeyStoreError::KeyGeneration(e.to_string()))?;
        let public_key = keypair.public_key();
        let created = timestamp::now();

        let record = StoredKey {
            key_type,
            public_key: public_key.as_bytes().to_vec(),
            secret: keypair.secret_bytes().to_vec(),
            created: created.timestamp(),
        };
        let bytes = bincode::serialize(&record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store.set(&slot, &bytes)?;

        info!(key_id, %key_type, "generated key pair");

        Ok(KeyPair {
            key_id: key_id.to_string(),
            key_type,
            public_key,
            created,
        })
    }

    /// Look up a key pair by alias.
    pub fn get_key_pair(&self, key_id: &str) -> KeyStoreResult<Option<KeyPair>> {
        debug!(key_id, "key lookup");
        let Some(record) = self.load(key_id)? else {
            return Ok(None);
        };
        let public_key = PublicKey::from_bytes(record.key_type, &record.public_key)
            .map_err(|_| StoreError::Corrupt(Self::slot(key_id)))?;
        let created = Utc
            .timestamp_opt(record.created, 0)
            .single()
            .ok_or_else(|| StoreError::Corrupt(Self::slot(key_id)))?;
        Ok(Some(KeyPair {
            key_id: key_id.to_string(),
            key_type: record.key_type,
            public_key,
            created,
        }))
    }

    /// Sign `message` with the key stored under `key_id`.
    ///
    /// Assumes any user-presence gate has already been satisfied.
    pub fn sign(&self, key_id: &str, message: &[u8]) -> KeyStoreResult<KeySignature> {
        let record = self
            .load(key_id)?
            .ok_or_else(|| KeyStoreError::KeyNotFound(key_id.to_string()))?;
        let keypair = WalletKeypair::from_secret_bytes(record.key_type, &record.secret)
            .map_err(|e| KeyStoreError::Signing(e.to_string()))?;
        keypair
            .sign(message)
            .map_err(|e| KeyStoreError::Signing(e.to_string()))
    }

    /// Remove a key pair. Irreversible.
    pub fn delete_key_pair(&self, key_id: &str) -> KeyStoreResult<()> {
        let slot = Self::slot(key_id);
        if !self.store.contains(&slot)? {
            return Err(KeyStoreError::KeyNotFound(key_id.to_string()));
        }
        self.store.delete(&slot)?;
        info!(key_id, "deleted key pair");
        Ok(())
    }

    /// Queue removal of a key pair in a caller's batch.
    pub fn stage_delete(&self, batch: &mut WriteBatch, key_id: &str) {
        batch.delete(Self::slot(key_id));
    }

    fn load(&self, key_id: &str) -> KeyStoreResult<Option<StoredKey>> {
        Ok(self.store.get_bincode(&Self::slot(key_id))?)
    }
}

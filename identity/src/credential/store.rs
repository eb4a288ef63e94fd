//! Credential persistence, one slot per credential: `credential:<id>`.
//!
//! Saving or deleting a credential touches exactly one slot no matter how
//! many the wallet holds.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::envelope::SignedCredential;
use crate::config::{CREDENTIAL_ID_PREFIX, CREDENTIAL_PREFIX};
use crate::storage::{SecureStore, StoreError, StoreExt, StoreResult, WriteBatch};

#[derive(Debug, Clone)]
pub struct CredentialStore {
    store: Arc<dyn SecureStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store }
    }

    fn slot(id: &str) -> String {
        format!("{CREDENTIAL_PREFIX}{id}")
    }

    /// Slot id for a credential. Credentials without an `id` get a fresh
    /// `urn:uuid:` slot.
    fn slot_id(credential: &SignedCredential) -> String {
        credential
            .id()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{CREDENTIAL_ID_PREFIX}{}", Uuid::new_v4()))
    }

    /// Persist a credential, replacing any previous one with the same id.
    /// Returns the id it was stored under.
    pub fn save(&self, credential: &SignedCredential) -> StoreResult<String> {
        let mut batch = WriteBatch::new();
        let id = self.stage_save(&mut batch, credential)?;
        self.store.commit(batch)?;
        debug!(credential_id = %id, "stored credential");
        Ok(id)
    }

    /// Queue a save in a caller's batch.
    pub fn stage_save(
        &self,
        batch: &mut WriteBatch,
        credential: &SignedCredential,
    ) -> StoreResult<String> {
        let id = Self::slot_id(credential);
        batch.put_json(Self::slot(&id), credential)?;
        Ok(id)
    }

    pub fn get(&self, id: &str) -> StoreResult<Option<SignedCredential>> {
        self.store.get_json(&Self::slot(id))
    }

    pub fn list(&self) -> StoreResult<Vec<SignedCredential>> {
        self.store
            .scan_prefix(CREDENTIAL_PREFIX)?
            .into_iter()
            .map(|(slot, bytes)| {
                serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Serialization(format!("{slot}: {e}")))
            })
            .collect()
    }

    /// Credentials where `did` is the subject or the issuer.
    pub fn list_for_identifier(&self, did: &str) -> StoreResult<Vec<SignedCredential>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|c| c.subject_id() == Some(did) || c.issuer() == Some(did))
            .collect())
    }

    /// Remove a credential. Returns whether it existed.
    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        let slot = Self::slot(id);
        let existed = self.store.contains(&slot)?;
        self.store.delete(&slot)?;
        Ok(existed)
    }

    /// Queue removal of every credential naming `did`. Returns the ids
    /// staged for deletion.
    pub fn stage_purge(&self, batch: &mut WriteBatch, did: &str) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();
        for (slot, bytes) in self.store.scan_prefix(CREDENTIAL_PREFIX)? {
            let credential: SignedCredential = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(format!("{slot}: {e}")))?;
            if credential.subject_id() == Some(did) || credential.issuer() == Some(did) {
                batch.delete(slot.clone());
                ids.push(slot[CREDENTIAL_PREFIX.len()..].to_string());
            }
        }
        Ok(ids)
    }
}

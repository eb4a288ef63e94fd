//! # RegistrationOrchestrator
//!
//! Drives the registration state machine and owns the device's single
//! registration record. All mutations of that record go through here.
//!
//! ## Ordering
//!
//! `register` performs its side effects in this order:
//!
//! 1. Pending marker (names the key alias up front).
//! 2. Key pair, reused if the marker's alias already holds one.
//! 3. Identifier record, reused if present.
//! 4. Presence check, when biometric protection is on.
//! 5. Credential issuance on a blocking thread.
//! 6. One batch: credential, registration record, marker removal.
//!
//! A failure anywhere rolls back steps 1-3 in a single batch. If the
//! rollback itself fails the marker stays behind and the next call picks
//! up where this one stopped.
//!
//! ## Concurrency
//!
//! A `tokio::sync::Mutex` serializes `register`, so concurrent callers
//! queue and the second one observes the first one's record. Deletion
//! never waits: it fails fast with `RegistrationInProgress`.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::membership::{membership_claims, MembershipTerms};
use super::presence::UserPresence;
use super::record::{
    MembershipTier, PendingRegistration, PersonalInfo, RegistrationRecord, RegistrationState,
    RegistrationStatus, SecurityPreferences,
};
use super::{RegistrationError, RegistrationResult};
use crate::config::{
    IdentityConfig, MembershipIssuer, DID_KEY_METHOD, REGISTRATION_PENDING_SLOT,
    REGISTRATION_SLOT,
};
use crate::credential::{
    CredentialIssuer, CredentialStore, CredentialVerifier, SignedCredential, VerificationFailure,
    VerificationResult,
};
use crate::did::{IdentifierManager, IdentifierRecord};
use crate::keystore::{KeyPair, KeyStore};
use crate::storage::{SecureStore, StoreExt, StoreResult, WriteBatch};
use crate::timestamp;

const PRESENCE_REASON: &str = "Confirm to sign your Sevis wallet membership credential";

/// The registered identity as one view: record, identifier, credential.
#[derive(Debug, Clone)]
pub struct WalletIdentity {
    pub record: RegistrationRecord,
    pub identifier: Option<IdentifierRecord>,
    pub credential: Option<SignedCredential>,
}

pub struct RegistrationOrchestrator {
    store: Arc<dyn SecureStore>,
    keys: KeyStore,
    identifiers: Arc<IdentifierManager>,
    issuer: CredentialIssuer,
    verifier: CredentialVerifier,
    credentials: CredentialStore,
    presence: Arc<dyn UserPresence>,
    config: IdentityConfig,
    state: RwLock<RegistrationState>,
    op_lock: Mutex<()>,
}

impl std::fmt::Debug for RegistrationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationOrchestrator")
            .field("state", &*self.state.read())
            .field("key_type", &self.config.default_key_type)
            .finish_non_exhaustive()
    }
}

impl RegistrationOrchestrator {
    /// Build an orchestrator and recover its state from the store.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn SecureStore>,
        keys: KeyStore,
        identifiers: Arc<IdentifierManager>,
        issuer: CredentialIssuer,
        verifier: CredentialVerifier,
        credentials: CredentialStore,
        presence: Arc<dyn UserPresence>,
        config: IdentityConfig,
    ) -> StoreResult<Self> {
        let initial = if store.contains(REGISTRATION_SLOT)? {
            RegistrationState::Registered
        } else {
            RegistrationState::Unregistered
        };
        if store.contains(REGISTRATION_PENDING_SLOT)? {
            info!("found interrupted registration; it will resume on the next register call");
        }
        Ok(Self {
            store,
            keys,
            identifiers,
            issuer,
            verifier,
            credentials,
            presence,
            config,
            state: RwLock::new(initial),
            op_lock: Mutex::new(()),
        })
    }

    pub fn state(&self) -> RegistrationState {
        *self.state.read()
    }

    /// The stored registration record, if any.
    pub fn registration(&self) -> RegistrationResult<Option<RegistrationRecord>> {
        Ok(self.store.get_json(REGISTRATION_SLOT)?)
    }

    /// Register the device: key, identifier, membership credential.
    ///
    /// Idempotent. A device that is already registered gets its existing
    /// record back and nothing new is created.
    pub async fn register(
        &self,
        info: PersonalInfo,
        prefs: SecurityPreferences,
    ) -> RegistrationResult<RegistrationRecord> {
        info.validate()?;

        let _op = self.op_lock.lock().await;
        if let Some(existing) = self.registration()? {
            *self.state.write() = RegistrationState::Registered;
            debug!(did = %existing.did, "already registered");
            return Ok(existing);
        }

        let mut transition = Transition::begin(&self.state);
        match self.run_registration(info, prefs).await {
            Ok(record) => {
                transition.finish(RegistrationState::Registered);
                info!(did = %record.did, key_id = %record.key_id, "registration complete");
                Ok(record)
            }
            Err(cause) => {
                warn!(error = %cause, "registration failed; rolling back");
                match self.rollback() {
                    Ok(()) => Err(cause),
                    Err(rollback) => Err(RegistrationError::PartialRegistration {
                        cause: cause.to_string(),
                        rollback: rollback.to_string(),
                    }),
                }
            }
        }
    }

    async fn run_registration(
        &self,
        info: PersonalInfo,
        prefs: SecurityPreferences,
    ) -> RegistrationResult<RegistrationRecord> {
        let pending = match self
            .store
            .get_json::<PendingRegistration>(REGISTRATION_PENDING_SLOT)?
        {
            Some(pending) => {
                info!(key_id = %pending.key_id, "resuming interrupted registration");
                pending
            }
            None => {
                let pending = PendingRegistration {
                    key_id: Uuid::new_v4().to_string(),
                    key_type: self.config.default_key_type,
                    started: timestamp::now(),
                };
                let mut batch = WriteBatch::new();
                batch.put_json(REGISTRATION_PENDING_SLOT, &pending)?;
                self.store.commit(batch)?;
                pending
            }
        };

        let key = self.key_for(&pending).await?;
        let identifier = self.identifiers.register_identifier(&key)?;

        if prefs.biometric_enabled && !self.presence.confirm(PRESENCE_REASON).await {
            return Err(RegistrationError::PresenceDenied);
        }

        let issuer_id = match &self.config.membership_issuer {
            MembershipIssuer::Placeholder(issuer) => issuer.clone(),
            MembershipIssuer::SelfIssued => identifier.did.to_string(),
        };
        let wallet_id = Uuid::new_v4().to_string();
        let tier = MembershipTier::Basic;
        let claims = membership_claims(
            &MembershipTerms {
                holder: &identifier.did,
                issuer: &issuer_id,
                wallet_id: &wallet_id,
                tier,
                issued: timestamp::now(),
            },
            &info,
            &prefs,
        );

        let issuer = self.issuer.clone();
        let key_id = key.key_id.clone();
        let credential =
            tokio::task::spawn_blocking(move || issuer.issue_credential(claims, &key_id))
                .await
                .map_err(|e| RegistrationError::TaskFailed(e.to_string()))??;

        let mut batch = WriteBatch::new();
        let credential_id = self.credentials.stage_save(&mut batch, &credential)?;
        let record = RegistrationRecord {
            key_id: key.key_id,
            did: identifier.did,
            personal_info: info,
            security_preferences: prefs,
            credential_id,
            wallet_id,
            verification_level: tier,
            registered_at: timestamp::now(),
        };
        batch.put_json(REGISTRATION_SLOT, &record)?;
        batch.delete(REGISTRATION_PENDING_SLOT);
        self.store.commit(batch)?;

        Ok(record)
    }

    /// The key named by the pending marker, generated if it does not exist yet.
    async fn key_for(&self, pending: &PendingRegistration) -> RegistrationResult<KeyPair> {
        if let Some(existing) = self.keys.get_key_pair(&pending.key_id)? {
            debug!(key_id = %existing.key_id, "reusing key from interrupted registration");
            return Ok(existing);
        }
        let keys = self.keys.clone();
        let key_id = pending.key_id.clone();
        let key_type = pending.key_type;
        let key = tokio::task::spawn_blocking(move || {
            keys.generate_key_pair_with_id(&key_id, key_type)
        })
        .await
        .map_err(|e| RegistrationError::TaskFailed(e.to_string()))??;
        Ok(key)
    }

    /// Undo a failed attempt: key, identifier and marker go in one batch.
    fn rollback(&self) -> RegistrationResult<()> {
        let Some(pending) = self
            .store
            .get_json::<PendingRegistration>(REGISTRATION_PENDING_SLOT)?
        else {
            return Ok(());
        };

        let mut batch = WriteBatch::new();
        let mut did = None;
        if let Some(key) = self.keys.get_key_pair(&pending.key_id)? {
            let derived = self
                .identifiers
                .derive_identifier(&key.public_key, DID_KEY_METHOD)?;
            self.identifiers.stage_removal(&mut batch, &derived);
            did = Some(derived);
        }
        self.keys.stage_delete(&mut batch, &pending.key_id);
        batch.delete(REGISTRATION_PENDING_SLOT);
        self.store.commit(batch)?;

        if let Some(did) = &did {
            self.identifiers.forget(did);
        }
        info!(key_id = %pending.key_id, "rolled back registration attempt");
        Ok(())
    }

    /// Whether the device holds a registration. Reads only.
    pub fn check_status(&self) -> RegistrationResult<RegistrationStatus> {
        let state = self.state();
        let Some(record) = self.registration()? else {
            return Ok(RegistrationStatus {
                registered: false,
                state,
                did: None,
            });
        };
        let registered = self.identifiers.get_identifier(&record.did)?.is_some();
        Ok(RegistrationStatus {
            registered,
            state,
            did: Some(record.did.to_string()),
        })
    }

    /// Record, identifier and membership credential of the current
    /// registration.
    pub fn current_identity(&self) -> RegistrationResult<Option<WalletIdentity>> {
        let Some(record) = self.registration()? else {
            return Ok(None);
        };
        let identifier = self.identifiers.get_identifier(&record.did)?;
        let credential = self.credentials.get(&record.credential_id)?;
        Ok(Some(WalletIdentity {
            record,
            identifier,
            credential,
        }))
    }

    /// Verify the stored membership credential.
    pub async fn verify_membership(&self) -> RegistrationResult<VerificationResult> {
        let record = self
            .registration()?
            .ok_or(RegistrationError::NotRegistered)?;
        Ok(match self.credentials.get(&record.credential_id)? {
            Some(credential) => self.verifier.verify(&credential).await,
            None => VerificationResult::invalid(VerificationFailure::Structural(format!(
                "membership credential {} is missing",
                record.credential_id
            ))),
        })
    }

    /// Replace the security preferences on the existing record.
    pub async fn update_security_preferences(
        &self,
        prefs: SecurityPreferences,
    ) -> RegistrationResult<RegistrationRecord> {
        let _op = self
            .op_lock
            .try_lock()
            .map_err(|_| RegistrationError::RegistrationInProgress)?;
        let mut record = self
            .registration()?
            .ok_or(RegistrationError::NotRegistered)?;
        record.security_preferences = prefs;
        let mut batch = WriteBatch::new();
        batch.put_json(REGISTRATION_SLOT, &record)?;
        self.store.commit(batch)?;
        Ok(record)
    }

    /// Delete the registration: key, identifier (tombstoned), every
    /// credential naming the identifier, and the record itself, in one
    /// batch. Leftovers of an interrupted registration are rolled back.
    pub async fn delete_registration(&self) -> RegistrationResult<()> {
        let _op = self
            .op_lock
            .try_lock()
            .map_err(|_| RegistrationError::RegistrationInProgress)?;

        let Some(record) = self.registration()? else {
            if self.store.contains(REGISTRATION_PENDING_SLOT)? {
                self.rollback()?;
                *self.state.write() = RegistrationState::Unregistered;
                return Ok(());
            }
            return Err(RegistrationError::NotRegistered);
        };

        let mut batch = WriteBatch::new();
        let purged = self
            .credentials
            .stage_purge(&mut batch, &record.did.to_string())?;
        self.identifiers.stage_deactivation(&mut batch, &record.did);
        self.keys.stage_delete(&mut batch, &record.key_id);
        batch.delete(REGISTRATION_SLOT);
        batch.delete(REGISTRATION_PENDING_SLOT);
        self.store.commit(batch)?;

        self.identifiers.forget(&record.did);
        *self.state.write() = RegistrationState::Deleted;
        info!(
            did = %record.did,
            credentials = purged.len(),
            "registration deleted"
        );
        Ok(())
    }
}

/// Holds the state at `Registering` until finished. Dropping it unfinished
/// (error or cancelled future) puts the state back to `Unregistered`.
struct Transition<'a> {
    state: &'a RwLock<RegistrationState>,
    done: bool,
}

impl<'a> Transition<'a> {
    fn begin(state: &'a RwLock<RegistrationState>) -> Self {
        *state.write() = RegistrationState::Registering;
        Self { state, done: false }
    }

    fn finish(&mut self, next: RegistrationState) {
        *self.state.write() = next;
        self.done = true;
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        if !self.done {
            *self.state.write() = RegistrationState::Unregistered;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::presence::AlwaysPresent;
    use crate::storage::SledStore;
    use async_trait::async_trait;

    struct DenyPresence;

    #[async_trait]
    impl UserPresence for DenyPresence {
        async fn confirm(&self, _reason: &str) -> bool {
            false
        }
    }

    fn orchestrator_with(
        presence: Arc<dyn UserPresence>,
        config: IdentityConfig,
    ) -> (Arc<dyn SecureStore>, RegistrationOrchestrator) {
        let store: Arc<dyn SecureStore> = Arc::new(SledStore::open_temporary().unwrap());
        let keys = KeyStore::new(store.clone());
        let ids = Arc::new(IdentifierManager::new(store.clone()));
        let issuer = CredentialIssuer::new(keys.clone(), ids.clone(), config.credential_validity);
        let verifier = CredentialVerifier::new(
            ids.clone(),
            config.clock_skew,
            config.trusted_placeholder_issuers.clone(),
        );
        let credentials = CredentialStore::new(store.clone());
        let orch = RegistrationOrchestrator::new(
            store.clone(),
            keys,
            ids,
            issuer,
            verifier,
            credentials,
            presence,
            config,
        )
        .unwrap();
        (store, orch)
    }

    fn orchestrator() -> (Arc<dyn SecureStore>, RegistrationOrchestrator) {
        orchestrator_with(Arc::new(AlwaysPresent), IdentityConfig::default())
    }

    fn ana() -> PersonalInfo {
        PersonalInfo::new("Ana", "Lee", "ana@example.com")
    }

    fn prefs(biometric: bool) -> SecurityPreferences {
        SecurityPreferences::new(biometric, "device-1")
    }

    #[tokio::test]
    async fn test_register_produces_verifiable_membership() {
        let (_, orch) = orchestrator();
        assert_eq!(orch.state(), RegistrationState::Unregistered);

        let record = orch.register(ana(), prefs(false)).await.unwrap();
        assert_eq!(orch.state(), RegistrationState::Registered);
        assert!(record.did.to_string().starts_with("did:key:z6Mk"));

        let status = orch.check_status().unwrap();
        assert!(status.registered);
        assert_eq!(status.did.as_deref(), Some(record.did.to_string().as_str()));

        assert!(orch.verify_membership().await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_register_twice_returns_same_record() {
        let (store, orch) = orchestrator();
        let first = orch.register(ana(), prefs(false)).await.unwrap();
        let second = orch.register(ana(), prefs(false)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.scan_prefix("key:").unwrap().len(), 1);
        assert_eq!(store.scan_prefix("credential:").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_info_writes_nothing() {
        let (store, orch) = orchestrator();
        let err = orch
            .register(PersonalInfo::new("Ana", "Lee", "not-an-email"), prefs(false))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidPersonalInfo(_)));
        assert!(store.scan_prefix("").unwrap().is_empty());
        assert_eq!(orch.state(), RegistrationState::Unregistered);
    }

    #[tokio::test]
    async fn test_presence_denied_rolls_back() {
        let (store, orch) = orchestrator_with(Arc::new(DenyPresence), IdentityConfig::default());
        let err = orch.register(ana(), prefs(true)).await.unwrap_err();
        assert!(matches!(err, RegistrationError::PresenceDenied));
        assert!(store.scan_prefix("").unwrap().is_empty());
        assert_eq!(orch.state(), RegistrationState::Unregistered);
    }

    #[tokio::test]
    async fn test_presence_not_asked_without_biometrics() {
        let (_, orch) = orchestrator_with(Arc::new(DenyPresence), IdentityConfig::default());
        assert!(orch.register(ana(), prefs(false)).await.is_ok());
    }

    #[tokio::test]
    async fn test_self_issued_membership() {
        let config = IdentityConfig {
            membership_issuer: MembershipIssuer::SelfIssued,
            trusted_placeholder_issuers: Vec::new(),
            ..Default::default()
        };
        let (_, orch) = orchestrator_with(Arc::new(AlwaysPresent), config);
        let record = orch.register(ana(), prefs(false)).await.unwrap();
        let identity = orch.current_identity().unwrap().unwrap();
        let credential = identity.credential.unwrap();
        assert_eq!(credential.issuer(), Some(record.did.to_string().as_str()));
        assert!(orch.verify_membership().await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_delete_clears_everything_but_the_tombstone() {
        let (store, orch) = orchestrator();
        let record = orch.register(ana(), prefs(false)).await.unwrap();
        orch.delete_registration().await.unwrap();

        assert_eq!(orch.state(), RegistrationState::Deleted);
        assert!(!orch.check_status().unwrap().registered);
        assert!(store.scan_prefix("key:").unwrap().is_empty());
        assert!(store.scan_prefix("credential:").unwrap().is_empty());
        assert!(store.get(REGISTRATION_SLOT).unwrap().is_none());
        assert!(store
            .get(&format!("did-deactivated:{}", record.did))
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_delete_when_unregistered() {
        let (_, orch) = orchestrator();
        assert!(matches!(
            orch.delete_registration().await,
            Err(RegistrationError::NotRegistered)
        ));
    }

    #[tokio::test]
    async fn test_register_after_delete_mints_new_identity() {
        let (_, orch) = orchestrator();
        let first = orch.register(ana(), prefs(false)).await.unwrap();
        orch.delete_registration().await.unwrap();
        let second = orch.register(ana(), prefs(false)).await.unwrap();
        assert_ne!(first.did, second.did);
        assert_eq!(orch.state(), RegistrationState::Registered);
    }

    #[tokio::test]
    async fn test_update_security_preferences() {
        let (_, orch) = orchestrator();
        orch.register(ana(), prefs(false)).await.unwrap();
        let updated = orch
            .update_security_preferences(prefs(true))
            .await
            .unwrap();
        assert!(updated.security_preferences.biometric_enabled);
        assert_eq!(orch.registration().unwrap().unwrap(), updated);
    }

    #[tokio::test]
    async fn test_delete_while_registering_is_refused() {
        let (_, orch) = orchestrator();
        let _held = orch.op_lock.lock().await;
        assert!(matches!(
            orch.delete_registration().await,
            Err(RegistrationError::RegistrationInProgress)
        ));
    }
}

//! # WalletContext
//!
//! Wires the identity core together over one shared store. Everything is
//! built here, once, from an [`IdentityConfig`]; components never reach
//! for globals.

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{IdentityConfig, DEVICE_SECRET_LENGTH};
use crate::credential::{CredentialIssuer, CredentialStore, CredentialVerifier};
use crate::did::IdentifierManager;
use crate::keystore::KeyStore;
use crate::registration::{AlwaysPresent, RegistrationOrchestrator, UserPresence};
use crate::storage::{EncryptedStore, SecureStore, SledStore, StoreResult};

#[derive(Debug, Clone)]
pub struct WalletContext {
    config: IdentityConfig,
    store: Arc<dyn SecureStore>,
    keys: KeyStore,
    identifiers: Arc<IdentifierManager>,
    issuer: CredentialIssuer,
    verifier: CredentialVerifier,
    credentials: CredentialStore,
    registration: Arc<RegistrationOrchestrator>,
}

impl WalletContext {
    /// Build every component over `store`.
    pub fn initialize(
        config: IdentityConfig,
        store: Arc<dyn SecureStore>,
        presence: Arc<dyn UserPresence>,
    ) -> StoreResult<Self> {
        let keys = KeyStore::new(store.clone());
        let identifiers = Arc::new(IdentifierManager::new(store.clone()));
        let issuer = CredentialIssuer::new(
            keys.clone(),
            identifiers.clone(),
            config.credential_validity,
        );
        let verifier = CredentialVerifier::new(
            identifiers.clone(),
            config.clock_skew,
            config.trusted_placeholder_issuers.clone(),
        );
        let credentials = CredentialStore::new(store.clone());
        let registration = Arc::new(RegistrationOrchestrator::new(
            store.clone(),
            keys.clone(),
            identifiers.clone(),
            issuer.clone(),
            verifier.clone(),
            credentials.clone(),
            presence,
            config.clone(),
        )?);

        info!(
            key_type = %config.default_key_type,
            state = ?registration.state(),
            "wallet context initialized"
        );

        Ok(Self {
            config,
            store,
            keys,
            identifiers,
            issuer,
            verifier,
            credentials,
            registration,
        })
    }

    /// Open the encrypted on-disk wallet at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        device_secret: &[u8; DEVICE_SECRET_LENGTH],
        config: IdentityConfig,
        presence: Arc<dyn UserPresence>,
    ) -> StoreResult<Self> {
        let sled = SledStore::open(path)?;
        let store: Arc<dyn SecureStore> = Arc::new(EncryptedStore::new(sled, device_secret));
        Self::initialize(config, store, presence)
    }

    /// In-memory wallet that vanishes on drop. Presence is always confirmed.
    pub fn open_temporary(config: IdentityConfig) -> StoreResult<Self> {
        let store: Arc<dyn SecureStore> = Arc::new(SledStore::open_temporary()?);
        Self::initialize(config, store, Arc::new(AlwaysPresent))
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SecureStore> {
        &self.store
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn identifiers(&self) -> &Arc<IdentifierManager> {
        &self.identifiers
    }

    pub fn issuer(&self) -> &CredentialIssuer {
        &self.issuer
    }

    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn registration(&self) -> &RegistrationOrchestrator {
        &self.registration
    }

    /// Flush pending writes. Call before the process exits.
    pub fn shutdown(&self) -> StoreResult<()> {
        self.store.flush()?;
        info!("wallet context shut down");
        Ok(())
    }
}

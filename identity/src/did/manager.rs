//! # IdentifierManager
//!
//! Derives identifiers from public keys, remembers which identifiers this
//! device registered, and resolves identifiers back to keys.
//!
//! Resolution goes tombstone check, then cache, then resolver. The
//! tombstone check always hits storage, so a deleted registration stops
//! resolving the moment its batch commits, cache or no cache.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::document::DidDocument;
use super::resolver::{DidResolver, KeyDidResolver};
use super::{Did, DidError};
use crate::config::{
    DID_DEACTIVATED_PREFIX, DID_KEY_METHOD, DID_PREFIX, RESOLUTION_CACHE_CAPACITY,
};
use crate::crypto::PublicKey;
use crate::keystore::KeyPair;
use crate::storage::{SecureStore, StoreError, StoreExt, WriteBatch};
use crate::timestamp;

/// Persisted record of an identifier registered on this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    pub did: Did,
    /// Alias of the key pair the identifier was derived from.
    pub key_id: String,
    pub public_key: PublicKey,
    pub created: DateTime<Utc>,
}

impl IdentifierRecord {
    pub fn method(&self) -> &str {
        self.did.method()
    }
}

/// Bounded resolution cache, evicting in insertion order.
#[derive(Debug)]
struct ResolutionCache {
    capacity: usize,
    entries: HashMap<Did, PublicKey>,
    order: VecDeque<Did>,
}

impl ResolutionCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, did: &Did) -> Option<PublicKey> {
        self.entries.get(did).cloned()
    }

    fn insert(&mut self, did: Did, public_key: PublicKey) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(did.clone(), public_key).is_some() {
            return;
        }
        self.order.push_back(did);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, did: &Did) {
        if self.entries.remove(did).is_some() {
            self.order.retain(|d| d != did);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct IdentifierManager {
    store: Arc<dyn SecureStore>,
    resolvers: HashMap<String, Arc<dyn DidResolver>>,
    cache: RwLock<ResolutionCache>,
}

impl fmt::Debug for IdentifierManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.resolvers.keys().collect();
        methods.sort();
        f.debug_struct("IdentifierManager")
            .field("methods", &methods)
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

impl IdentifierManager {
    /// A manager that speaks `did:key`.
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        let mut resolvers: HashMap<String, Arc<dyn DidResolver>> = HashMap::new();
        resolvers.insert(DID_KEY_METHOD.to_string(), Arc::new(KeyDidResolver));
        Self {
            store,
            resolvers,
            cache: RwLock::new(ResolutionCache::new(RESOLUTION_CACHE_CAPACITY)),
        }
    }

    /// Override how many resolved identifiers stay in memory.
    pub fn with_cache_capacity(self, capacity: usize) -> Self {
        *self.cache.write() = ResolutionCache::new(capacity);
        self
    }

    /// Add (or replace) the resolver for a method.
    pub fn with_resolver(mut self, resolver: Arc<dyn DidResolver>) -> Self {
        self.resolvers.insert(resolver.method().to_string(), resolver);
        self
    }

    pub fn supports(&self, method: &str) -> bool {
        self.resolvers.contains_key(method)
    }

    fn resolver(&self, method: &str) -> Result<&Arc<dyn DidResolver>, DidError> {
        self.resolvers
            .get(method)
            .ok_or_else(|| DidError::UnsupportedMethod(method.to_string()))
    }

    fn record_slot(did: &Did) -> String {
        format!("{DID_PREFIX}{did}")
    }

    fn tombstone_slot(did: &Did) -> String {
        format!("{DID_DEACTIVATED_PREFIX}{did}")
    }

    // -- Derivation ---------------------------------------------------------

    /// Derive the identifier for `public_key` under `method`.
    ///
    /// Pure: no storage, no clock. Same input, same output.
    pub fn derive_identifier(&self, public_key: &PublicKey, method: &str) -> Result<Did, DidError> {
        self.resolver(method)?.derive(public_key)
    }

    // -- Registry -----------------------------------------------------------

    /// Record the `did:key` identifier for `key` as belonging to this
    /// device. Returns the existing record if there already is one.
    pub fn register_identifier(&self, key: &KeyPair) -> Result<IdentifierRecord, DidError> {
        let did = self.derive_identifier(&key.public_key, DID_KEY_METHOD)?;
        if let Some(existing) = self.get_identifier(&did)? {
            debug!(%did, "identifier already registered");
            return Ok(existing);
        }

        let record = IdentifierRecord {
            did: did.clone(),
            key_id: key.key_id.clone(),
            public_key: key.public_key.clone(),
            created: timestamp::now(),
        };

        let mut batch = WriteBatch::new();
        batch.put_bincode(Self::record_slot(&did), &record)?;
        batch.delete(Self::tombstone_slot(&did));
        self.store.commit(batch)?;

        info!(%did, key_id = %key.key_id, "registered identifier");
        Ok(record)
    }

    pub fn get_identifier(&self, did: &Did) -> Result<Option<IdentifierRecord>, DidError> {
        Ok(self.store.get_bincode(&Self::record_slot(did))?)
    }

    /// Every identifier registered on this device.
    pub fn list_identifiers(&self) -> Result<Vec<IdentifierRecord>, DidError> {
        self.store
            .scan_prefix(DID_PREFIX)?
            .into_iter()
            .map(|(slot, bytes)| {
                bincode::deserialize(&bytes).map_err(|_| DidError::Storage(StoreError::Corrupt(slot)))
            })
            .collect()
    }

    pub fn is_deactivated(&self, did: &Did) -> Result<bool, DidError> {
        Ok(self.store.contains(&Self::tombstone_slot(did))?)
    }

    /// Queue removal of `did`'s record plus a tombstone in a caller's batch.
    ///
    /// Once committed, [`resolve`](Self::resolve) reports the identifier as
    /// deactivated.
    pub fn stage_deactivation(&self, batch: &mut WriteBatch, did: &Did) {
        batch.delete(Self::record_slot(did));
        batch.put(
            Self::tombstone_slot(did),
            timestamp::format(&timestamp::now()).into_bytes(),
        );
    }

    /// Queue removal of `did`'s record without a tombstone. Used to roll
    /// back a registration that never became visible.
    pub fn stage_removal(&self, batch: &mut WriteBatch, did: &Did) {
        batch.delete(Self::record_slot(did));
    }

    /// Drop `did` from the resolution cache.
    pub fn forget(&self, did: &Did) {
        self.cache.write().remove(did);
    }

    // -- Resolution ---------------------------------------------------------

    /// Resolve an identifier string to its public key.
    pub async fn resolve(&self, identifier: &str) -> Result<PublicKey, DidError> {
        let did: Did = identifier.parse()?;
        self.resolve_did(&did).await
    }

    pub async fn resolve_did(&self, did: &Did) -> Result<PublicKey, DidError> {
        if self.is_deactivated(did)? {
            return Err(DidError::Deactivated(did.to_string()));
        }

        let cached = self.cache.read().get(did);
        if let Some(pk) = cached {
            return Ok(pk);
        }

        let resolver = self.resolver(did.method())?.clone();
        let public_key = resolver.resolve(did).await?;
        debug!(%did, "resolved identifier");
        self.cache.write().insert(did.clone(), public_key.clone());
        Ok(public_key)
    }

    /// Resolve a verification method reference (`did:...#fragment`).
    ///
    /// For `did:key` the fragment, when present, must be the method-specific
    /// id; anything else points at a key the identifier does not have.
    pub async fn resolve_verification_method(
        &self,
        reference: &str,
    ) -> Result<(Did, PublicKey), DidError> {
        let (did, fragment) = Did::parse_url(reference)?;
        if did.method() == DID_KEY_METHOD {
            if let Some(fragment) = fragment.as_deref() {
                if fragment != did.method_specific_id() {
                    return Err(DidError::MalformedIdentifier(format!(
                        "{reference} does not name the key of {did}"
                    )));
                }
            }
        }
        let public_key = self.resolve_did(&did).await?;
        Ok((did, public_key))
    }

    /// W3C DID document for `did`. Carries `created` when the identifier
    /// was registered on this device.
    pub async fn document(&self, did: &Did) -> Result<DidDocument, DidError> {
        let public_key = self.resolve_did(did).await?;
        let created = self.get_identifier(did)?.map(|r| r.created);
        Ok(DidDocument::for_key(did, &public_key, created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyType;
    use crate::keystore::KeyStore;
    use crate::storage::SledStore;
    use async_trait::async_trait;

    fn setup() -> (Arc<dyn SecureStore>, KeyStore, IdentifierManager) {
        let store: Arc<dyn SecureStore> = Arc::new(SledStore::open_temporary().unwrap());
        let keys = KeyStore::new(store.clone());
        let ids = IdentifierManager::new(store.clone());
        (store, keys, ids)
    }

    #[test]
    fn derive_is_pure_and_deterministic() {
        let (_, keys, ids) = setup();
        let kp = keys.generate_key_pair(KeyType::Ed25519).unwrap();
        let a = ids.derive_identifier(&kp.public_key, "key").unwrap();
        let b = ids.derive_identifier(&kp.public_key, "key").unwrap();
        assert_eq!(a, b);
        assert!(ids.get_identifier(&a).unwrap().is_none());
    }

    #[test]
    fn derive_with_unknown_method_fails() {
        let (_, keys, ids) = setup();
        let kp = keys.generate_key_pair(KeyType::Ed25519).unwrap();
        assert!(matches!(
            ids.derive_identifier(&kp.public_key, "ethr"),
            Err(DidError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn register_is_idempotent() {
        let (_, keys, ids) = setup();
        let kp = keys.generate_key_pair(KeyType::Secp256k1).unwrap();
        let first = ids.register_identifier(&kp).unwrap();
        let second = ids.register_identifier(&kp).unwrap();
        assert_eq!(first, second);
        assert_eq!(ids.list_identifiers().unwrap().len(), 1);
        assert_eq!(first.method(), "key");
    }

    #[tokio::test]
    async fn resolve_recovers_public_key() {
        let (_, keys, ids) = setup();
        let kp = keys.generate_key_pair(KeyType::Ed25519).unwrap();
        let did = ids.derive_identifier(&kp.public_key, "key").unwrap();
        assert_eq!(ids.resolve(&did.to_string()).await.unwrap(), kp.public_key);
        // Second hit comes from the cache and agrees.
        assert_eq!(ids.resolve(&did.to_string()).await.unwrap(), kp.public_key);
    }

    #[tokio::test]
    async fn resolve_reports_unsupported_and_malformed() {
        let (_, _, ids) = setup();
        assert!(matches!(
            ids.resolve("did:web:example.com").await,
            Err(DidError::UnsupportedMethod(_))
        ));
        assert!(matches!(
            ids.resolve("not a did").await,
            Err(DidError::MalformedIdentifier(_))
        ));
        assert!(matches!(
            ids.resolve("did:key:zzzz").await,
            Err(DidError::MalformedIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn deactivation_blocks_resolution_even_when_cached() {
        let (store, keys, ids) = setup();
        let kp = keys.generate_key_pair(KeyType::Ed25519).unwrap();
        let record = ids.register_identifier(&kp).unwrap();
        ids.resolve_did(&record.did).await.unwrap();

        let mut batch = WriteBatch::new();
        ids.stage_deactivation(&mut batch, &record.did);
        store.commit(batch).unwrap();

        assert!(ids.get_identifier(&record.did).unwrap().is_none());
        assert!(matches!(
            ids.resolve_did(&record.did).await,
            Err(DidError::Deactivated(_))
        ));
    }

    #[tokio::test]
    async fn resolution_cache_stays_bounded() {
        let (store, keys, _) = setup();
        let ids = IdentifierManager::new(store).with_cache_capacity(2);
        let mut dids = Vec::new();
        for _ in 0..3 {
            let kp = keys.generate_key_pair(KeyType::Ed25519).unwrap();
            let did = ids.derive_identifier(&kp.public_key, "key").unwrap();
            assert_eq!(ids.resolve_did(&did).await.unwrap(), kp.public_key);
            dids.push(did);
        }
        assert_eq!(ids.cache.read().len(), 2);
        assert!(ids.cache.read().get(&dids[0]).is_none());
        assert!(ids.cache.read().get(&dids[2]).is_some());

        // Evicted identifiers still resolve; they are just re-derived.
        assert!(ids.resolve_did(&dids[0]).await.is_ok());
        assert_eq!(ids.cache.read().len(), 2);

        ids.forget(&dids[0]);
        assert!(ids.cache.read().get(&dids[0]).is_none());
        assert_eq!(ids.cache.read().len(), 1);
    }

    #[tokio::test]
    async fn verification_method_fragment_must_match_key() {
        let (_, keys, ids) = setup();
        let kp = keys.generate_key_pair(KeyType::Ed25519).unwrap();
        let did = ids.derive_identifier(&kp.public_key, "key").unwrap();

        let (resolved, pk) = ids
            .resolve_verification_method(&did.verification_method_id())
            .await
            .unwrap();
        assert_eq!(resolved, did);
        assert_eq!(pk, kp.public_key);

        let wrong = format!("{did}#key-1");
        assert!(matches!(
            ids.resolve_verification_method(&wrong).await,
            Err(DidError::MalformedIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn document_carries_created_for_registered_ids() {
        let (_, keys, ids) = setup();
        let kp = keys.generate_key_pair(KeyType::Ed25519).unwrap();
        let record = ids.register_identifier(&kp).unwrap();
        let doc = ids.document(&record.did).await.unwrap();
        assert_eq!(doc.created, Some(record.created));

        let other = keys.generate_key_pair(KeyType::Ed25519).unwrap();
        let other_did = ids.derive_identifier(&other.public_key, "key").unwrap();
        assert!(ids.document(&other_did).await.unwrap().created.is_none());
    }

    struct StaticResolver(PublicKey);

    #[async_trait]
    impl DidResolver for StaticResolver {
        fn method(&self) -> &str {
            "example"
        }

        fn derive(&self, _public_key: &PublicKey) -> Result<Did, DidError> {
            Ok(Did::new("example", "alice"))
        }

        async fn resolve(&self, _did: &Did) -> Result<PublicKey, DidError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn custom_resolver_plugs_in() {
        let (store, keys, _) = setup();
        let kp = keys.generate_key_pair(KeyType::Ed25519).unwrap();
        let ids = IdentifierManager::new(store)
            .with_resolver(Arc::new(StaticResolver(kp.public_key.clone())));
        assert!(ids.supports("example"));
        assert_eq!(ids.resolve("did:example:alice").await.unwrap(), kp.public_key);
    }
}

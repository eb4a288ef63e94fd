//! The resolution capability.
//!
//! A [`DidResolver`] knows one DID method: how to derive an identifier for
//! a public key and how to get the key back. `did:key` does both in
//! memory. A ledger- or web-backed method would do network I/O in
//! `resolve`, which is why it is async.

use async_trait::async_trait;

use super::{key_method, Did, DidError};
use crate::config::DID_KEY_METHOD;
use crate::crypto::PublicKey;

#[async_trait]
pub trait DidResolver: Send + Sync {
    /// Method name this resolver answers for (`key`, `web`, ...).
    fn method(&self) -> &str;

    /// Derive the identifier for `public_key`. Must be deterministic.
    fn derive(&self, public_key: &PublicKey) -> Result<Did, DidError>;

    /// Resolve `did` to its current verification key.
    async fn resolve(&self, did: &Did) -> Result<PublicKey, DidError>;
}

/// Resolver for `did:key`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDidResolver;

#[async_trait]
impl DidResolver for KeyDidResolver {
    fn method(&self) -> &str {
        DID_KEY_METHOD
    }

    fn derive(&self, public_key: &PublicKey) -> Result<Did, DidError> {
        Ok(key_method::derive(public_key))
    }

    async fn resolve(&self, did: &Did) -> Result<PublicKey, DidError> {
        key_method::invert(did)
    }
}

//! # Decentralized Identifiers
//!
//! Wallet identities are W3C DIDs. The default method is `did:key`, where
//! the identifier *is* the public key (multicodec-tagged, multibase
//! encoded), so resolution is a decode, not a lookup.
//!
//! ## DID Format
//!
//! ```text
//! did:key:z6Mk...   (Ed25519)
//! did:key:zQ3s...   (secp256k1)
//! ```
//!
//! Other methods plug in through the [`DidResolver`] capability without
//! the issuer or verifier noticing.
//!
//! ## Standards References
//!
//! - [DID Core v1.0](https://www.w3.org/TR/did-core/)
//! - [The did:key Method](https://w3c-ccg.github.io/did-method-key/)

pub mod document;
pub mod key_method;
pub mod manager;
pub mod resolver;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::storage::StoreError;

pub use document::{DidDocument, VerificationMethod};
pub use manager::{IdentifierManager, IdentifierRecord};
pub use resolver::{DidResolver, KeyDidResolver};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during DID operations.
#[derive(Debug, Error)]
pub enum DidError {
    /// No resolver is registered for this method.
    #[error("unsupported DID method: {0}")]
    UnsupportedMethod(String),

    /// The string is not a DID, or its method-specific id does not decode.
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// The identifier was tombstoned when its registration was deleted.
    #[error("identifier has been deactivated: {0}")]
    Deactivated(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Did
// ---------------------------------------------------------------------------

/// A parsed `did:<method>:<method-specific-id>` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did {
    method: String,
    id: String,
}

impl Did {
    pub fn new(method: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            id: id.into(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The method-specific identifier: everything after `did:<method>:`.
    pub fn method_specific_id(&self) -> &str {
        &self.id
    }

    /// Default verification method reference for this DID.
    ///
    /// For `did:key` the fragment is the method-specific id itself.
    pub fn verification_method_id(&self) -> String {
        format!("{self}#{}", self.id)
    }

    /// Split a DID URL (`did:...#fragment`) into the DID and its fragment.
    pub fn parse_url(url: &str) -> Result<(Did, Option<String>), DidError> {
        match url.split_once('#') {
            Some((did, fragment)) if !fragment.is_empty() => {
                Ok((did.parse()?, Some(fragment.to_string())))
            }
            Some(_) => Err(DidError::MalformedIdentifier(format!(
                "empty fragment in {url}"
            ))),
            None => Ok((url.parse()?, None)),
        }
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "did:{}:{}", self.method, self.id)
    }
}

impl FromStr for Did {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some("did"), Some(method), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(DidError::MalformedIdentifier(format!(
                "expected 'did:<method>:<id>', got '{s}'"
            )));
        };

        let method_ok = !method.is_empty()
            && method
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
        if !method_ok {
            return Err(DidError::MalformedIdentifier(format!(
                "invalid method name '{method}'"
            )));
        }

        let id_ok = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '%'));
        if !id_ok {
            return Err(DidError::MalformedIdentifier(format!(
                "invalid method-specific id in '{s}'"
            )));
        }

        Ok(Did::new(method, id))
    }
}

impl TryFrom<String> for Did {
    type Error = DidError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.to_string()
    }
}

//! W3C DID documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Did, DidError};
use crate::config::DID_CONTEXT;
use crate::crypto::{KeyType, PublicKey};

/// A W3C DID Document describing a wallet identity.
///
/// Wallet identities are single-key, so every verification relationship
/// points at the same method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    pub id: String,

    #[serde(rename = "verificationMethod")]
    pub verification_method: Vec<VerificationMethod>,

    pub authentication: Vec<String>,

    #[serde(rename = "assertionMethod")]
    pub assertion_method: Vec<String>,

    /// When the identifier was registered on this device. Absent for
    /// identifiers we only resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

/// A verification method entry in a DID Document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationMethod {
    pub id: String,

    #[serde(rename = "type")]
    pub type_: String,

    pub controller: String,

    /// Multibase (base58btc) of `multicodec || key`.
    #[serde(rename = "publicKeyMultibase")]
    pub public_key_multibase: String,
}

fn suite_context(key_type: KeyType) -> &'static str {
    match key_type {
        KeyType::Ed25519 => "https://w3id.org/security/suites/ed25519-2020/v1",
        KeyType::Secp256k1 => "https://w3id.org/security/suites/secp256k1-2019/v1",
    }
}

impl DidDocument {
    /// Build the single-key document for `did`.
    pub fn for_key(did: &Did, public_key: &PublicKey, created: Option<DateTime<Utc>>) -> Self {
        let did_string = did.to_string();
        let vm_id = did.verification_method_id();
        let key_type = public_key.key_type();

        Self {
            context: vec![DID_CONTEXT.to_string(), suite_context(key_type).to_string()],
            id: did_string.clone(),
            verification_method: vec![VerificationMethod {
                id: vm_id.clone(),
                type_: key_type.verification_key_type().to_string(),
                controller: did_string,
                public_key_multibase: public_key.to_multibase(),
            }],
            authentication: vec![vm_id.clone()],
            assertion_method: vec![vm_id],
            created,
        }
    }

    pub fn to_json(&self) -> Result<String, DidError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DidError::MalformedIdentifier(format!("document serialization: {e}")))
    }
}

//! Linked-data style proofs attached to credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::KeyType;
use crate::timestamp;

/// Signature suite of a proof. One per supported key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofType {
    Ed25519Signature2020,
    EcdsaSecp256k1Signature2019,
}

impl ProofType {
    pub fn for_key_type(key_type: KeyType) -> Self {
        match key_type {
            KeyType::Ed25519 => ProofType::Ed25519Signature2020,
            KeyType::Secp256k1 => ProofType::EcdsaSecp256k1Signature2019,
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            ProofType::Ed25519Signature2020 => KeyType::Ed25519,
            ProofType::EcdsaSecp256k1Signature2019 => KeyType::Secp256k1,
        }
    }
}

impl fmt::Display for ProofType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Signature plus the metadata needed to check it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "type")]
    pub proof_type: ProofType,

    #[serde(with = "timestamp::serde_seconds")]
    pub created: DateTime<Utc>,

    /// DID URL of the signing key, `did:key:z...#z...`.
    pub verification_method: String,

    pub proof_purpose: String,

    /// Multibase (base58btc) signature over the canonical claim bytes.
    pub proof_value: String,
}

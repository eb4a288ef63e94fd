//! The signed credential envelope: claims plus proof, serialized as one
//! flat W3C JSON object.

use serde::{Deserialize, Serialize};

use super::claims::ClaimSet;
use super::proof::Proof;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedCredential {
    #[serde(flatten)]
    pub claims: ClaimSet,
    pub proof: Proof,
}

impl SignedCredential {
    pub fn id(&self) -> Option<&str> {
        self.claims.id.as_deref()
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.claims.subject_id()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.claims.issuer.as_deref()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

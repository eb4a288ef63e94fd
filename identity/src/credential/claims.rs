//! Claim sets: the unsigned body of a verifiable credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::{BASE_CREDENTIAL_TYPE, W3C_CREDENTIALS_CONTEXT};
use crate::did::Did;
use crate::timestamp;

/// Attributes asserted about the holder.
///
/// `id` is the holder's DID; every other attribute is a free-form claim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CredentialSubject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(flatten)]
    pub claims: BTreeMap<String, Value>,
}

/// The W3C credential body that gets canonicalized and signed.
///
/// Required for issuance: subject id, issuer, issuance date. Everything
/// else is optional or filled in by the issuer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSet {
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Ordered, duplicate-free, base tag first.
    #[serde(rename = "type")]
    pub types: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::serde_seconds_opt"
    )]
    pub issuance_date: Option<DateTime<Utc>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::serde_seconds_opt"
    )]
    pub expiration_date: Option<DateTime<Utc>>,

    pub credential_subject: CredentialSubject,
}

impl Default for ClaimSet {
    fn default() -> Self {
        Self {
            context: vec![W3C_CREDENTIALS_CONTEXT.to_string()],
            id: None,
            types: vec![BASE_CREDENTIAL_TYPE.to_string()],
            issuer: None,
            issuance_date: None,
            expiration_date: None,
            credential_subject: CredentialSubject::default(),
        }
    }
}

impl ClaimSet {
    /// W3C context and the base type tag, nothing else.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        if !self.context.contains(&context) {
            self.context.push(context);
        }
        self
    }

    /// Append a type tag. Duplicates are ignored.
    pub fn with_type(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.types.contains(&tag) {
            self.types.push(tag);
        }
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_subject(mut self, subject: &Did) -> Self {
        self.credential_subject.id = Some(subject.to_string());
        self
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.credential_subject
            .claims
            .insert(name.into(), value.into());
        self
    }

    pub fn issued_at(mut self, ts: DateTime<Utc>) -> Self {
        self.issuance_date = Some(ts);
        self
    }

    pub fn expires_at(mut self, ts: DateTime<Utc>) -> Self {
        self.expiration_date = Some(ts);
        self
    }

    pub fn has_type(&self, tag: &str) -> bool {
        self.types.iter().any(|t| t == tag)
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.credential_subject.id.as_deref()
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.credential_subject.claims.get(name)
    }
}

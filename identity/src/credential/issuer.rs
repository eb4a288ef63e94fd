//! # CredentialIssuer
//!
//! Turns a claim set into a signed credential:
//!
//! 1. Validate the required fields (subject, issuer, issuance date).
//! 2. Fill in what the caller left open: a `urn:uuid:` id, and an
//!    expiration one validity window after issuance.
//! 3. Canonicalize the claims.
//! 4. Sign the canonical bytes with the key store.
//! 5. Attach a proof pointing at the signer's verification method.
//!
//! Not idempotent. Issuing the same claims twice yields two credentials
//! with different ids, which is correct: each issuance is its own event.
//! Avoiding accidental duplicates is the orchestrator's job.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::canonical::{CanonicalBytes, CanonicalizationError};
use super::claims::ClaimSet;
use super::envelope::SignedCredential;
use super::proof::{Proof, ProofType};
use crate::config::{
    BASE_CREDENTIAL_TYPE, CREDENTIAL_ID_PREFIX, DID_KEY_METHOD, PROOF_PURPOSE_ASSERTION,
    W3C_CREDENTIALS_CONTEXT,
};
use crate::did::{Did, DidError, IdentifierManager};
use crate::keystore::{KeyStore, KeyStoreError};
use crate::timestamp;

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("invalid claim set: {0}")]
    InvalidClaimSet(String),

    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error(transparent)]
    Identifier(#[from] DidError),
}

#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    keys: KeyStore,
    identifiers: Arc<IdentifierManager>,
    default_validity: Option<Duration>,
}

impl CredentialIssuer {
    pub fn new(
        keys: KeyStore,
        identifiers: Arc<IdentifierManager>,
        default_validity: Option<Duration>,
    ) -> Self {
        Self {
            keys,
            identifiers,
            default_validity,
        }
    }

    /// Sign `claims` with the key stored under `signer_key_id`.
    ///
    /// CPU-bound; async callers should run it on `spawn_blocking`.
    pub fn issue_credential(
        &self,
        mut claims: ClaimSet,
        signer_key_id: &str,
    ) -> Result<SignedCredential, IssueError> {
        validate(&claims)?;

        let issued = claims
            .issuance_date
            .ok_or_else(|| IssueError::InvalidClaimSet("issuanceDate is required".into()))?;
        if claims.expiration_date.is_none() {
            if let Some(validity) = self.default_validity {
                let window = chrono::Duration::from_std(validity).map_err(|_| {
                    IssueError::InvalidClaimSet("validity window out of range".into())
                })?;
                claims.expiration_date = Some(issued + window);
            }
        }
        if claims.id.is_none() {
            claims.id = Some(format!("{CREDENTIAL_ID_PREFIX}{}", Uuid::new_v4()));
        }

        let signer = self
            .keys
            .get_key_pair(signer_key_id)?
            .ok_or_else(|| KeyStoreError::KeyNotFound(signer_key_id.to_string()))?;
        let signer_did = self
            .identifiers
            .derive_identifier(&signer.public_key, DID_KEY_METHOD)?;

        let canonical = CanonicalBytes::new(&claims)?;
        let signature = self.keys.sign(signer_key_id, canonical.as_bytes())?;

        let proof = Proof {
            proof_type: ProofType::for_key_type(signer.key_type),
            created: timestamp::now(),
            verification_method: signer_did.verification_method_id(),
            proof_purpose: PROOF_PURPOSE_ASSERTION.to_string(),
            proof_value: signature.to_multibase(),
        };

        info!(
            credential_id = claims.id.as_deref().unwrap_or_default(),
            issuer = claims.issuer.as_deref().unwrap_or_default(),
            signer = %signer_did,
            "issued credential"
        );

        Ok(SignedCredential { claims, proof })
    }
}

fn validate(claims: &ClaimSet) -> Result<(), IssueError> {
    let invalid = |msg: &str| Err(IssueError::InvalidClaimSet(msg.to_string()));

    match claims.subject_id() {
        None => return invalid("credentialSubject.id is required"),
        Some(id) => {
            if id.parse::<Did>().is_err() {
                return invalid("credentialSubject.id must be a DID");
            }
        }
    }
    match claims.issuer.as_deref() {
        None | Some("") => return invalid("issuer is required"),
        Some(_) => {}
    }
    if claims.issuance_date.is_none() {
        return invalid("issuanceDate is required");
    }
    if claims.context.first().map(String::as_str) != Some(W3C_CREDENTIALS_CONTEXT) {
        return invalid("@context must start with the W3C credentials context");
    }
    if !claims.has_type(BASE_CREDENTIAL_TYPE) {
        return invalid("type must include VerifiableCredential");
    }
    if claims.types.iter().all(|t| t == BASE_CREDENTIAL_TYPE) {
        return invalid("type needs a tag besides VerifiableCredential");
    }
    let mut seen = HashSet::new();
    if !claims.types.iter().all(|t| seen.insert(t.as_str())) {
        return invalid("type tags must be unique");
    }
    if let (Some(issued), Some(expires)) = (claims.issuance_date, claims.expiration_date) {
        if expires < issued {
            return invalid("expirationDate precedes issuanceDate");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CREDENTIAL_VALIDITY;
    use crate::crypto::{KeySignature, KeyType};
    use crate::storage::{SecureStore, SledStore};

    struct Fixture {
        keys: KeyStore,
        ids: Arc<IdentifierManager>,
        issuer: CredentialIssuer,
    }

    fn fixture(validity: Option<Duration>) -> Fixture {
        let store: Arc<dyn SecureStore> = Arc::new(SledStore::open_temporary().unwrap());
        let keys = KeyStore::new(store.clone());
        let ids = Arc::new(IdentifierManager::new(store));
        let issuer = CredentialIssuer::new(keys.clone(), ids.clone(), validity);
        Fixture { keys, ids, issuer }
    }

    fn claims_for(f: &Fixture, kt: KeyType) -> (String, ClaimSet) {
        let kp = f.keys.generate_key_pair(kt).unwrap();
        let did = f.ids.derive_identifier(&kp.public_key, "key").unwrap();
        let claims = ClaimSet::new()
            .with_type("TestCredential")
            .with_issuer(did.to_string())
            .with_subject(&did)
            .with_claim("firstName", "Ana")
            .issued_at(timestamp::now());
        (kp.key_id, claims)
    }

    #[test]
    fn issued_signature_covers_canonical_claims() {
        let f = fixture(Some(DEFAULT_CREDENTIAL_VALIDITY));
        for kt in [KeyType::Ed25519, KeyType::Secp256k1] {
            let (key_id, claims) = claims_for(&f, kt);
            let cred = f.issuer.issue_credential(claims, &key_id).unwrap();

            let kp = f.keys.get_key_pair(&key_id).unwrap().unwrap();
            let bytes = CanonicalBytes::new(&cred.claims).unwrap();
            let sig = KeySignature::from_multibase(&cred.proof.proof_value).unwrap();
            assert!(kp.public_key.verify(bytes.as_bytes(), &sig));
            assert_eq!(cred.proof.proof_type, ProofType::for_key_type(kt));
            assert_eq!(cred.proof.proof_purpose, "assertionMethod");
        }
    }

    #[test]
    fn default_validity_and_id_filled_in() {
        let f = fixture(Some(DEFAULT_CREDENTIAL_VALIDITY));
        let (key_id, claims) = claims_for(&f, KeyType::Ed25519);
        let cred = f.issuer.issue_credential(claims, &key_id).unwrap();

        let issued = cred.claims.issuance_date.unwrap();
        let expires = cred.claims.expiration_date.unwrap();
        assert_eq!((expires - issued).num_days(), 365);
        assert!(cred.id().unwrap().starts_with("urn:uuid:"));
    }

    #[test]
    fn caller_expiration_wins() {
        let f = fixture(Some(DEFAULT_CREDENTIAL_VALIDITY));
        let (key_id, claims) = claims_for(&f, KeyType::Ed25519);
        let expires = claims.issuance_date.unwrap() + chrono::Duration::days(7);
        let cred = f
            .issuer
            .issue_credential(claims.expires_at(expires), &key_id)
            .unwrap();
        assert_eq!(cred.claims.expiration_date, Some(expires));
    }

    #[test]
    fn no_default_validity_means_no_expiration() {
        let f = fixture(None);
        let (key_id, claims) = claims_for(&f, KeyType::Ed25519);
        let cred = f.issuer.issue_credential(claims, &key_id).unwrap();
        assert!(cred.claims.expiration_date.is_none());
    }

    #[test]
    fn missing_required_fields_rejected() {
        let f = fixture(None);
        let (key_id, claims) = claims_for(&f, KeyType::Ed25519);

        let mut no_subject = claims.clone();
        no_subject.credential_subject.id = None;
        let mut no_issuer = claims.clone();
        no_issuer.issuer = None;
        let mut no_date = claims.clone();
        no_date.issuance_date = None;
        let mut no_base = claims.clone();
        no_base.types.retain(|t| t != "VerifiableCredential");
        let mut base_only = claims.clone();
        base_only.types = vec!["VerifiableCredential".into()];
        let mut repeated = claims.clone();
        repeated.types.push("TestCredential".into());
        let mut repeated_base = claims.clone();
        repeated_base.types = vec!["VerifiableCredential".into(), "VerifiableCredential".into()];

        for bad in [
            no_subject,
            no_issuer,
            no_date,
            no_base,
            base_only,
            repeated,
            repeated_base,
        ] {
            assert!(matches!(
                f.issuer.issue_credential(bad, &key_id),
                Err(IssueError::InvalidClaimSet(_))
            ));
        }
    }

    #[test]
    fn floats_in_claims_are_refused() {
        let f = fixture(None);
        let (key_id, claims) = claims_for(&f, KeyType::Ed25519);
        let err = f
            .issuer
            .issue_credential(claims.with_claim("score", 0.5), &key_id)
            .unwrap_err();
        assert!(matches!(err, IssueError::Canonicalization(_)));
    }

    #[test]
    fn unknown_signer_fails() {
        let f = fixture(None);
        let (_, claims) = claims_for(&f, KeyType::Ed25519);
        let err = f.issuer.issue_credential(claims, "ghost").unwrap_err();
        assert!(matches!(
            err,
            IssueError::KeyStore(KeyStoreError::KeyNotFound(_))
        ));
    }

    #[test]
    fn reissuing_identical_claims_gives_distinct_credentials() {
        let f = fixture(None);
        let (key_id, claims) = claims_for(&f, KeyType::Ed25519);
        let a = f.issuer.issue_credential(claims.clone(), &key_id).unwrap();
        let b = f.issuer.issue_credential(claims, &key_id).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.proof.proof_value, b.proof.proof_value);
    }
}

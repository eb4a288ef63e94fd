//! # CredentialVerifier
//!
//! Three checks, cheapest first:
//!
//! 1. **Structural**: required fields present, base type tag present,
//!    proof well-formed. No crypto, no clock.
//! 2. **Temporal**: not expired, not issued in the future beyond the
//!    tolerated clock skew.
//! 3. **Cryptographic**: resolve the proof's verification method, bind it
//!    to the issuer, recompute the canonical claim bytes and check the
//!    signature.
//!
//! An invalid credential is an expected outcome, not an error, so
//! verification always returns a [`VerificationResult`] and never `Err`.
//! The verifier has no side effects beyond the resolver cache and may be
//! called concurrently on the same input.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::canonical::CanonicalBytes;
use super::envelope::SignedCredential;
use crate::config::{BASE_CREDENTIAL_TYPE, PROOF_PURPOSE_ASSERTION, W3C_CREDENTIALS_CONTEXT};
use crate::crypto::KeySignature;
use crate::did::{Did, DidError, IdentifierManager};
use crate::timestamp;

/// Why a credential failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum VerificationFailure {
    #[error("structurally invalid: {0}")]
    Structural(String),

    #[error("credential expired at {}", timestamp::format(.0))]
    Expired(#[serde(with = "timestamp::serde_seconds")] DateTime<Utc>),

    #[error("credential issued in the future ({})", timestamp::format(.0))]
    ClockSkew(#[serde(with = "timestamp::serde_seconds")] DateTime<Utc>),

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("unsupported DID method: {0}")]
    UnsupportedMethod(String),

    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    #[error("identifier cannot be resolved: {0}")]
    UnresolvableIdentifier(String),
}

impl From<DidError> for VerificationFailure {
    fn from(err: DidError) -> Self {
        match err {
            DidError::UnsupportedMethod(m) => VerificationFailure::UnsupportedMethod(m),
            DidError::MalformedIdentifier(m) => VerificationFailure::MalformedIdentifier(m),
            other @ (DidError::Deactivated(_) | DidError::Storage(_)) => {
                VerificationFailure::UnresolvableIdentifier(other.to_string())
            }
        }
    }
}

/// Outcome of [`CredentialVerifier::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<VerificationFailure>,
}

impl VerificationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: VerificationFailure) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl From<Result<(), VerificationFailure>> for VerificationResult {
    fn from(r: Result<(), VerificationFailure>) -> Self {
        match r {
            Ok(()) => Self::valid(),
            Err(reason) => Self::invalid(reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    identifiers: Arc<IdentifierManager>,
    clock_skew: Duration,
    trusted_placeholder_issuers: Vec<String>,
}

impl CredentialVerifier {
    pub fn new(
        identifiers: Arc<IdentifierManager>,
        clock_skew: Duration,
        trusted_placeholder_issuers: Vec<String>,
    ) -> Self {
        Self {
            identifiers,
            clock_skew,
            trusted_placeholder_issuers,
        }
    }

    /// Verify against the current time.
    pub async fn verify(&self, credential: &SignedCredential) -> VerificationResult {
        self.verify_at(credential, Utc::now()).await
    }

    /// Verify against a caller-supplied clock reading. The clock is read
    /// once, by the caller, so repeated calls with the same `now` agree.
    pub async fn verify_at(
        &self,
        credential: &SignedCredential,
        now: DateTime<Utc>,
    ) -> VerificationResult {
        let result = self.check(credential, now).await;
        if let Err(reason) = &result {
            debug!(
                credential_id = credential.id().unwrap_or_default(),
                %reason,
                "credential rejected"
            );
        }
        result.into()
    }

    /// Parse and verify a JSON credential. Unparseable input is a
    /// structural failure.
    pub async fn verify_json(&self, json: &str) -> VerificationResult {
        match SignedCredential::from_json(json) {
            Ok(credential) => self.verify(&credential).await,
            Err(e) => VerificationResult::invalid(VerificationFailure::Structural(e.to_string())),
        }
    }

    async fn check(
        &self,
        credential: &SignedCredential,
        now: DateTime<Utc>,
    ) -> Result<(), VerificationFailure> {
        let (issued, signature) = check_structure(credential)?;
        self.check_time(credential, issued, now)?;
        self.check_signature(credential, &signature).await
    }

    fn check_time(
        &self,
        credential: &SignedCredential,
        issued: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), VerificationFailure> {
        if let Some(expires) = credential.claims.expiration_date {
            if now > expires {
                return Err(VerificationFailure::Expired(expires));
            }
        }
        let skew = chrono::Duration::from_std(self.clock_skew)
            .unwrap_or_else(|_| chrono::Duration::zero());
        if issued > now + skew {
            return Err(VerificationFailure::ClockSkew(issued));
        }
        Ok(())
    }

    async fn check_signature(
        &self,
        credential: &SignedCredential,
        signature: &KeySignature,
    ) -> Result<(), VerificationFailure> {
        let (signer, public_key) = self
            .identifiers
            .resolve_verification_method(&credential.proof.verification_method)
            .await?;

        self.check_issuer_binding(credential, &signer)?;

        if credential.proof.proof_type.key_type() != public_key.key_type() {
            return Err(VerificationFailure::SignatureInvalid(format!(
                "{} proof from a {} key",
                credential.proof.proof_type,
                public_key.key_type()
            )));
        }

        let canonical = CanonicalBytes::new(&credential.claims)
            .map_err(|e| VerificationFailure::Structural(e.to_string()))?;

        if public_key.verify(canonical.as_bytes(), signature) {
            Ok(())
        } else {
            Err(VerificationFailure::SignatureInvalid(
                "signature does not match claims".into(),
            ))
        }
    }

    /// The issuer must be the DID that signed, unless it is one of the
    /// explicitly trusted placeholder issuers.
    fn check_issuer_binding(
        &self,
        credential: &SignedCredential,
        signer: &Did,
    ) -> Result<(), VerificationFailure> {
        let issuer = credential.issuer().unwrap_or_default();
        if issuer == signer.to_string() {
            return Ok(());
        }
        if self.trusted_placeholder_issuers.iter().any(|t| t == issuer) {
            warn!(
                issuer,
                signer = %signer,
                "accepting holder-signed credential from placeholder issuer (non-production trust)"
            );
            return Ok(());
        }
        Err(VerificationFailure::SignatureInvalid(format!(
            "issuer {issuer} did not sign this credential"
        )))
    }
}

/// Everything that can be checked without a clock or a key.
fn check_structure(
    credential: &SignedCredential,
) -> Result<(DateTime<Utc>, KeySignature), VerificationFailure> {
    let structural = |msg: &str| VerificationFailure::Structural(msg.to_string());
    let claims = &credential.claims;

    if claims.context.first().map(String::as_str) != Some(W3C_CREDENTIALS_CONTEXT) {
        return Err(structural("@context must start with the W3C credentials context"));
    }
    if !claims.has_type(BASE_CREDENTIAL_TYPE) {
        return Err(structural("type does not include VerifiableCredential"));
    }
    match claims.subject_id() {
        Some(id) if id.parse::<Did>().is_ok() => {}
        Some(_) => return Err(structural("credentialSubject.id is not a DID")),
        None => return Err(structural("credentialSubject.id is missing")),
    }
    if claims.issuer.as_deref().map_or(true, str::is_empty) {
        return Err(structural("issuer is missing"));
    }
    let issued = claims
        .issuance_date
        .ok_or_else(|| structural("issuanceDate is missing"))?;
    if let Some(expires) = claims.expiration_date {
        if expires < issued {
            return Err(structural("expirationDate precedes issuanceDate"));
        }
    }

    let proof = &credential.proof;
    if proof.proof_purpose != PROOF_PURPOSE_ASSERTION {
        return Err(structural("proofPurpose must be assertionMethod"));
    }
    let signature = KeySignature::from_multibase(&proof.proof_value)
        .map_err(|e| VerificationFailure::Structural(format!("proofValue: {e}")))?;

    Ok((issued, signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_CLOCK_SKEW, DEFAULT_CREDENTIAL_VALIDITY, PLACEHOLDER_ISSUER_DID};
    use crate::credential::{ClaimSet, CredentialIssuer};
    use crate::crypto::KeyType;
    use crate::keystore::KeyStore;
    use crate::storage::{SecureStore, SledStore};
    use serde_json::json;

    struct Fixture {
        keys: KeyStore,
        ids: Arc<IdentifierManager>,
        issuer: CredentialIssuer,
        verifier: CredentialVerifier,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn SecureStore> = Arc::new(SledStore::open_temporary().unwrap());
        let keys = KeyStore::new(store.clone());
        let ids = Arc::new(IdentifierManager::new(store));
        let issuer =
            CredentialIssuer::new(keys.clone(), ids.clone(), Some(DEFAULT_CREDENTIAL_VALIDITY));
        let verifier = CredentialVerifier::new(
            ids.clone(),
            DEFAULT_CLOCK_SKEW,
            vec![PLACEHOLDER_ISSUER_DID.to_string()],
        );
        Fixture {
            keys,
            ids,
            issuer,
            verifier,
        }
    }

    fn issue(f: &Fixture, kt: KeyType, issuer: Option<&str>) -> SignedCredential {
        let kp = f.keys.generate_key_pair(kt).unwrap();
        let did = f.ids.derive_identifier(&kp.public_key, "key").unwrap();
        let claims = ClaimSet::new()
            .with_type("TestCredential")
            .with_issuer(issuer.map(str::to_string).unwrap_or_else(|| did.to_string()))
            .with_subject(&did)
            .with_claim("firstName", "Ana")
            .with_claim("email", "ana@example.com")
            .issued_at(timestamp::now());
        f.issuer.issue_credential(claims, &kp.key_id).unwrap()
    }

    fn reason(r: VerificationResult) -> VerificationFailure {
        assert!(!r.valid);
        r.reason.unwrap()
    }

    #[tokio::test]
    async fn fresh_credential_verifies() {
        let f = fixture();
        for kt in [KeyType::Ed25519, KeyType::Secp256k1] {
            let cred = issue(&f, kt, None);
            let r = f.verifier.verify(&cred).await;
            assert!(r.is_valid(), "{kt}: {:?}", r.reason);
        }
    }

    #[tokio::test]
    async fn verification_is_repeatable() {
        let f = fixture();
        let cred = issue(&f, KeyType::Ed25519, None);
        let now = Utc::now();
        let a = f.verifier.verify_at(&cred, now).await;
        let b = f.verifier.verify_at(&cred, now).await;
        assert_eq!(a, b);
        assert!(a.valid);
    }

    #[tokio::test]
    async fn tampered_claim_fails_signature() {
        let f = fixture();
        let mut cred = issue(&f, KeyType::Ed25519, None);
        cred.claims
            .credential_subject
            .claims
            .insert("firstName".into(), json!("Anb"));
        assert!(matches!(
            reason(f.verifier.verify(&cred).await),
            VerificationFailure::SignatureInvalid(_)
        ));
    }

    #[tokio::test]
    async fn expired_beats_signature() {
        let f = fixture();
        let mut cred = issue(&f, KeyType::Ed25519, None);
        // Garbage signature, but expired: the cheaper check reports first.
        cred.proof.proof_value = KeySignature::from_bytes(vec![0u8; 64]).to_multibase();
        let later = cred.claims.expiration_date.unwrap() + chrono::Duration::seconds(1);
        assert!(matches!(
            reason(f.verifier.verify_at(&cred, later).await),
            VerificationFailure::Expired(_)
        ));
    }

    #[tokio::test]
    async fn future_issuance_beyond_skew_rejected() {
        let f = fixture();
        let cred = issue(&f, KeyType::Ed25519, None);
        let issued = cred.claims.issuance_date.unwrap();

        let within = issued - chrono::Duration::minutes(4);
        assert!(f.verifier.verify_at(&cred, within).await.valid);

        let beyond = issued - chrono::Duration::minutes(6);
        assert!(matches!(
            reason(f.verifier.verify_at(&cred, beyond).await),
            VerificationFailure::ClockSkew(_)
        ));
    }

    #[tokio::test]
    async fn missing_base_type_is_structural() {
        let f = fixture();
        let mut cred = issue(&f, KeyType::Ed25519, None);
        cred.claims.types.retain(|t| t != "VerifiableCredential");
        assert!(matches!(
            reason(f.verifier.verify(&cred).await),
            VerificationFailure::Structural(_)
        ));
    }

    #[tokio::test]
    async fn unsupported_method_is_distinct() {
        let f = fixture();
        let mut cred = issue(&f, KeyType::Ed25519, None);
        cred.proof.verification_method = "did:web:example.com#key-1".into();
        assert!(matches!(
            reason(f.verifier.verify(&cred).await),
            VerificationFailure::UnsupportedMethod(m) if m == "web"
        ));
    }

    #[tokio::test]
    async fn malformed_verification_method() {
        let f = fixture();
        let mut cred = issue(&f, KeyType::Ed25519, None);
        cred.proof.verification_method = "did:key:zNotAKey#zNotAKey".into();
        assert!(matches!(
            reason(f.verifier.verify(&cred).await),
            VerificationFailure::MalformedIdentifier(_)
        ));
    }

    #[tokio::test]
    async fn signer_must_be_issuer() {
        let f = fixture();
        let cred = issue(&f, KeyType::Ed25519, Some("did:key:z6MkSomeoneElse"));
        assert!(matches!(
            reason(f.verifier.verify(&cred).await),
            VerificationFailure::SignatureInvalid(_)
        ));
    }

    #[tokio::test]
    async fn placeholder_issuer_trusted_only_when_listed() {
        let f = fixture();
        let cred = issue(&f, KeyType::Ed25519, Some(PLACEHOLDER_ISSUER_DID));
        assert!(f.verifier.verify(&cred).await.valid);

        let strict = CredentialVerifier::new(f.ids.clone(), DEFAULT_CLOCK_SKEW, vec![]);
        assert!(matches!(
            reason(strict.verify(&cred).await),
            VerificationFailure::SignatureInvalid(_)
        ));
    }

    #[tokio::test]
    async fn swapped_proof_type_rejected() {
        let f = fixture();
        let mut cred = issue(&f, KeyType::Ed25519, None);
        cred.proof.proof_type = crate::credential::ProofType::EcdsaSecp256k1Signature2019;
        assert!(matches!(
            reason(f.verifier.verify(&cred).await),
            VerificationFailure::SignatureInvalid(_)
        ));
    }

    #[tokio::test]
    async fn json_roundtrip_verifies_and_garbage_is_structural() {
        let f = fixture();
        let cred = issue(&f, KeyType::Secp256k1, None);
        let json = cred.to_json().unwrap();
        assert!(f.verifier.verify_json(&json).await.valid);

        assert!(matches!(
            reason(f.verifier.verify_json("{\"type\": 3}").await),
            VerificationFailure::Structural(_)
        ));
    }

    #[test]
    fn result_serializes_with_typed_reason() {
        let r = VerificationResult::invalid(VerificationFailure::SignatureInvalid("x".into()));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["valid"], false);
        assert_eq!(v["reason"]["kind"], "signature_invalid");
        let ok = serde_json::to_value(VerificationResult::valid()).unwrap();
        assert!(ok.get("reason").is_none());
    }
}

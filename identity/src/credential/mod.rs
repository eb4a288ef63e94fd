//! # Verifiable Credentials
//!
//! W3C Verifiable Credentials (data model v1) signed with the wallet's
//! keys.
//!
//! ## Architecture
//!
//! ```text
//! claims.rs     — ClaimSet, CredentialSubject (the signed body)
//! canonical.rs  — CanonicalBytes: the only way to get signable bytes
//! proof.rs      — Proof, ProofType
//! envelope.rs   — SignedCredential = claims + proof, one flat JSON object
//! issuer.rs     — CredentialIssuer
//! verifier.rs   — CredentialVerifier, VerificationResult
//! store.rs      — CredentialStore, one slot per credential
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! ClaimSet ─→ CanonicalBytes ─→ KeyStore::sign ─→ SignedCredential ─→ CredentialStore
//!                                                        │
//!                                 CredentialVerifier ←───┘
//!                                        │
//!                         IdentifierManager::resolve
//! ```

pub mod canonical;
pub mod claims;
pub mod envelope;
pub mod issuer;
pub mod proof;
pub mod store;
pub mod verifier;

pub use canonical::{CanonicalBytes, CanonicalizationError};
pub use claims::{ClaimSet, CredentialSubject};
pub use envelope::SignedCredential;
pub use issuer::{CredentialIssuer, IssueError};
pub use proof::{Proof, ProofType};
pub use store::CredentialStore;
pub use verifier::{CredentialVerifier, VerificationFailure, VerificationResult};

// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Sevis Wallet — Identity Core
//!
//! Self-sovereign identity for the Sevis wallet. A device generates its own
//! keys, derives a `did:key` identifier from them, and signs W3C verifiable
//! credentials about its holder. Nothing here needs a server.
//!
//! ## Architecture
//!
//! Layered bottom-up; each layer only talks to the ones beneath it:
//!
//! - **storage** — `SecureStore` trait, sled backend, AES-256-GCM wrapper.
//! - **crypto** — Ed25519 and secp256k1 keys, at-rest encryption.
//! - **keystore** — Key pairs by alias. Private halves never leave it.
//! - **did** — `did:key` derivation, resolution, identifier registry.
//! - **credential** — Canonical bytes, issuance, verification, storage.
//! - **registration** — The onboarding state machine.
//! - **context** — Wires all of the above over one store.
//! - **config** — Wire constants and runtime knobs.
//!
//! ## Ground Rules
//!
//! 1. Signatures cover canonical bytes only. One serializer, no exceptions.
//! 2. Multi-slot writes are batched. A crash leaves all or nothing.
//! 3. Verification never throws. It returns a result with a reason.

pub mod config;
pub mod context;
pub mod credential;
pub mod crypto;
pub mod did;
pub mod keystore;
pub mod registration;
pub mod storage;
pub mod timestamp;

pub use config::{IdentityConfig, MembershipIssuer};
pub use context::WalletContext;
pub use credential::{
    ClaimSet, CredentialIssuer, CredentialVerifier, SignedCredential, VerificationFailure,
    VerificationResult,
};
pub use crypto::KeyType;
pub use did::{Did, IdentifierManager};
pub use keystore::{KeyPair, KeyStore};
pub use registration::{
    PersonalInfo, RegistrationError, RegistrationOrchestrator, SecurityPreferences,
};

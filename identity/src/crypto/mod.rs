//! # Cryptographic Primitives
//!
//! Everything that touches key material or ciphertext lives here.
//!
//! - **Ed25519** and **secp256k1 ECDSA** for signatures.
//! - **AES-256-GCM** for encrypting the wallet's storage at rest.
//! - **BLAKE3** for deriving the storage key from the device secret.
//!
//! Thin, type-safe wrappers over audited crates. Nothing clever.

pub mod encryption;
pub mod keys;

pub use encryption::{derive_storage_key, open, seal, EncryptionError};
pub use keys::{KeyError, KeySignature, KeyType, PublicKey, WalletKeypair};

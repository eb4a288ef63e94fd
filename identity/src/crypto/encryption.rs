//! # At-Rest Encryption
//!
//! AES-256-GCM for everything the wallet writes to disk. Key pairs,
//! identifier records, credentials: all of it is sealed before it reaches
//! sled, so a copied data directory is a pile of noise without the device
//! secret.
//!
//! ## Nonce management
//!
//! Random 96-bit nonces from `OsRng`. The birthday bound is ~2^48 messages
//! per key, which a single wallet will not approach in its lifetime.
//!
//! ## Slot binding
//!
//! Every value is sealed with its storage key as AAD. Moving a ciphertext
//! from `credential:a` to `credential:b` (or from a credential slot into
//! the registration slot) fails authentication instead of silently
//! decrypting into the wrong place.
//!
//! ## Wire format
//!
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH, DEVICE_SECRET_LENGTH, STORAGE_KEY_CONTEXT};

/// Errors that can occur during encryption/decryption.
///
/// A wrong key and a tampered ciphertext report the same error.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("ciphertext too short: must be at least {AES_NONCE_LENGTH} bytes")]
    CiphertextTooShort,

    #[error("random source unavailable")]
    RandomSourceUnavailable,
}

/// Derive the at-rest encryption key from a device secret.
///
/// BLAKE3 in key-derivation mode with a fixed context string, so the same
/// device secret can key other things later without the outputs colliding.
pub fn derive_storage_key(device_secret: &[u8; DEVICE_SECRET_LENGTH]) -> [u8; AES_KEY_LENGTH] {
    blake3::derive_key(STORAGE_KEY_CONTEXT, device_secret)
}

/// Seal `plaintext`, authenticating `aad` alongside it.
///
/// Returns `nonce || ciphertext`.
pub fn seal(
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|_| EncryptionError::RandomSourceUnavailable)?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut out = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a value produced by [`seal`]. The AAD must match exactly.
pub fn open(
    key: &[u8; AES_KEY_LENGTH],
    data: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    if data.len() < AES_NONCE_LENGTH {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = data.split_at(AES_NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::DecryptFailed)?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), Payload { msg: ciphertext, aad })
        .map_err(|_| EncryptionError::DecryptFailed)
}

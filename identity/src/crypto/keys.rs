//! # Key Material
//!
//! Keypair generation, public-key encoding and signatures for wallet
//! identities. Two algorithms are supported:
//!
//! - **Ed25519** via `ed25519-dalek`. Deterministic, compact, fast. The
//!   default for new wallets.
//! - **secp256k1 ECDSA** via `k256`. What most of the SSI ecosystem's
//!   `did:key` tooling still reaches for, so we speak it too.
//!
//! ## Security considerations
//!
//! - Fresh keys come from `OsRng`. If the OS RNG fails we return an error
//!   rather than quietly falling back to something weaker.
//! - Secret scalars are zeroized on drop by both underlying crates.
//! - `WalletKeypair` does not implement `Serialize` and its `Debug` impl
//!   prints only the public half. Secret bytes are crate-private and only
//!   the key store reads them.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey,
};
use k256::ecdsa::{
    signature::{Signer as EcdsaSigner, Verifier as EcdsaVerifier},
    Signature as EcdsaSignature, SigningKey as EcdsaSigningKey,
    VerifyingKey as EcdsaVerifyingKey,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{
    ED25519_PUBLIC_KEY_LENGTH, MAX_KEYGEN_ATTEMPTS, MULTIBASE_BASE58BTC, MULTICODEC_ED25519_PUB,
    MULTICODEC_SECP256K1_PUB, SECP256K1_PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SIGNATURE_LENGTH,
};

/// Errors that can occur during key operations.
///
/// Messages never include key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("random source unavailable: {0}")]
    RandomSourceUnavailable(String),

    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid {0} public key bytes")]
    InvalidPublicKey(KeyType),

    #[error("malformed multibase value: {0}")]
    MalformedMultibase(String),

    #[error("signing failed")]
    SigningFailed,
}

// ---------------------------------------------------------------------------
// KeyType
// ---------------------------------------------------------------------------

/// Signature algorithm of a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Ed25519,
    Secp256k1,
}

impl KeyType {
    /// Canonical display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "Ed25519",
            KeyType::Secp256k1 => "Secp256k1",
        }
    }

    /// Multicodec prefix used when embedding a public key in `did:key`.
    pub fn multicodec(&self) -> [u8; 2] {
        match self {
            KeyType::Ed25519 => MULTICODEC_ED25519_PUB,
            KeyType::Secp256k1 => MULTICODEC_SECP256K1_PUB,
        }
    }

    /// Inverse of [`multicodec`](Self::multicodec).
    pub fn from_multicodec(prefix: [u8; 2]) -> Option<Self> {
        match prefix {
            MULTICODEC_ED25519_PUB => Some(KeyType::Ed25519),
            MULTICODEC_SECP256K1_PUB => Some(KeyType::Secp256k1),
            _ => None,
        }
    }

    /// Encoded public key length in bytes.
    pub fn public_key_len(&self) -> usize {
        match self {
            KeyType::Ed25519 => ED25519_PUBLIC_KEY_LENGTH,
            KeyType::Secp256k1 => SECP256K1_PUBLIC_KEY_LENGTH,
        }
    }

    /// Verification method type used in DID documents.
    pub fn verification_key_type(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "Ed25519VerificationKey2020",
            KeyType::Secp256k1 => "EcdsaSecp256k1VerificationKey2019",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = KeyError;

    /// Accepts the display names plus the upper-case spellings the mobile
    /// layer uses (`ED25519`, `EC_SECP256K1`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(KeyType::Ed25519),
            "secp256k1" | "ec_secp256k1" | "es256k" => Ok(KeyType::Secp256k1),
            _ => Err(KeyError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// WalletKeypair
// ---------------------------------------------------------------------------

/// A signing key pair of one of the supported algorithms.
pub enum WalletKeypair {
    Ed25519(SigningKey),
    Secp256k1(EcdsaSigningKey),
}

impl WalletKeypair {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate(key_type: KeyType) -> Result<Self, KeyError> {
        for _ in 0..MAX_KEYGEN_ATTEMPTS {
            let mut seed = [0u8; SECRET_KEY_LENGTH];
            OsRng
                .try_fill_bytes(&mut seed)
                .map_err(|e| KeyError::RandomSourceUnavailable(e.to_string()))?;

            match Self::from_secret_bytes(key_type, &seed) {
                Ok(kp) => return Ok(kp),
                // Only secp256k1 can reject a seed (zero or >= group order).
                Err(KeyError::InvalidSecretKey) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(KeyError::RandomSourceUnavailable(
            "RNG repeatedly produced invalid scalars".into(),
        ))
    }

    /// Rebuild a key pair from its 32-byte secret.
    pub fn from_secret_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != SECRET_KEY_LENGTH {
            return Err(KeyError::InvalidSecretKey);
        }
        match key_type {
            KeyType::Ed25519 => {
                let mut seed = [0u8; SECRET_KEY_LENGTH];
                seed.copy_from_slice(bytes);
                Ok(WalletKeypair::Ed25519(SigningKey::from_bytes(&seed)))
            }
            KeyType::Secp256k1 => EcdsaSigningKey::from_slice(bytes)
                .map(WalletKeypair::Secp256k1)
                .map_err(|_| KeyError::InvalidSecretKey),
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            WalletKeypair::Ed25519(_) => KeyType::Ed25519,
            WalletKeypair::Secp256k1(_) => KeyType::Secp256k1,
        }
    }

    /// The public half, in the encoding `did:key` embeds.
    pub fn public_key(&self) -> PublicKey {
        match self {
            WalletKeypair::Ed25519(sk) => PublicKey {
                key_type: KeyType::Ed25519,
                bytes: sk.verifying_key().to_bytes().to_vec(),
            },
            WalletKeypair::Secp256k1(sk) => PublicKey {
                key_type: KeyType::Secp256k1,
                bytes: sk.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
            },
        }
    }

    /// Sign a message. Ed25519 signs the raw bytes; ECDSA signs their
    /// SHA-256 digest and returns the 64-byte compact `r || s` form.
    pub fn sign(&self, message: &[u8]) -> Result<KeySignature, KeyError> {
        let bytes = match self {
            WalletKeypair::Ed25519(sk) => {
                let sig: DalekSignature =
                    sk.try_sign(message).map_err(|_| KeyError::SigningFailed)?;
                sig.to_bytes().to_vec()
            }
            WalletKeypair::Secp256k1(sk) => {
                let sig: EcdsaSignature = EcdsaSigner::try_sign(sk, message)
                    .map_err(|_| KeyError::SigningFailed)?;
                sig.to_bytes().to_vec()
            }
        };
        Ok(KeySignature { bytes })
    }

    /// Raw secret scalar. Only the key store gets to call this.
    pub(crate) fn secret_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        match self {
            WalletKeypair::Ed25519(sk) => sk.to_bytes(),
            WalletKeypair::Secp256k1(sk) => {
                let mut out = [0u8; SECRET_KEY_LENGTH];
                out.copy_from_slice(&sk.to_bytes());
                out
            }
        }
    }
}

impl fmt::Debug for WalletKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Public half only. Always.
        write!(f, "WalletKeypair({}, pub={})", self.key_type(), self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// A public key tagged with its algorithm.
///
/// Ed25519 keys are the raw 32-byte point; secp256k1 keys are 33-byte
/// compressed SEC1 points.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPublicKey")]
pub struct PublicKey {
    key_type: KeyType,
    bytes: Vec<u8>,
}

/// Unchecked wire form. Deserialization goes through [`PublicKey::from_bytes`].
#[derive(Deserialize)]
struct RawPublicKey {
    key_type: KeyType,
    bytes: Vec<u8>,
}

impl TryFrom<RawPublicKey> for PublicKey {
    type Error = KeyError;

    fn try_from(raw: RawPublicKey) -> Result<Self, Self::Error> {
        Self::from_bytes(raw.key_type, &raw.bytes)
    }
}

impl PublicKey {
    /// Validate and wrap raw public key bytes.
    ///
    /// Rejects wrong lengths and byte strings that are not points on the
    /// curve. Anything that makes it past here can be handed to a verifier.
    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != key_type.public_key_len() {
            return Err(KeyError::InvalidPublicKey(key_type));
        }
        match key_type {
            KeyType::Ed25519 => {
                let mut arr = [0u8; ED25519_PUBLIC_KEY_LENGTH];
                arr.copy_from_slice(bytes);
                VerifyingKey::from_bytes(&arr).map_err(|_| KeyError::InvalidPublicKey(key_type))?;
            }
            KeyType::Secp256k1 => {
                EcdsaVerifyingKey::from_sec1_bytes(bytes)
                    .map_err(|_| KeyError::InvalidPublicKey(key_type))?;
            }
        }
        Ok(Self {
            key_type,
            bytes: bytes.to_vec(),
        })
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Verify a signature. Returns `false` for any failure, including a
    /// signature of the wrong length.
    pub fn verify(&self, message: &[u8], signature: &KeySignature) -> bool {
        let Ok(sig_bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature.as_bytes()) else {
            return false;
        };
        match self.key_type {
            KeyType::Ed25519 => {
                let Ok(pk_bytes) = <[u8; ED25519_PUBLIC_KEY_LENGTH]>::try_from(self.bytes.as_slice())
                else {
                    return false;
                };
                let Ok(vk) = VerifyingKey::from_bytes(&pk_bytes) else {
                    return false;
                };
                vk.verify(message, &DalekSignature::from_bytes(&sig_bytes))
                    .is_ok()
            }
            KeyType::Secp256k1 => {
                let Ok(vk) = EcdsaVerifyingKey::from_sec1_bytes(&self.bytes) else {
                    return false;
                };
                let Ok(sig) = EcdsaSignature::from_slice(&sig_bytes) else {
                    return false;
                };
                EcdsaVerifier::verify(&vk, message, &sig).is_ok()
            }
        }
    }

    /// Multibase (base58btc) encoding of `multicodec || key`. This is the
    /// method-specific id of a `did:key` identifier.
    pub fn to_multibase(&self) -> String {
        let mut buf = Vec::with_capacity(2 + self.bytes.len());
        buf.extend_from_slice(&self.key_type.multicodec());
        buf.extend_from_slice(&self.bytes);
        format!("{}{}", MULTIBASE_BASE58BTC, bs58::encode(buf).into_string())
    }

    /// Inverse of [`to_multibase`](Self::to_multibase).
    pub fn from_multibase(s: &str) -> Result<Self, KeyError> {
        let encoded = s
            .strip_prefix(MULTIBASE_BASE58BTC)
            .ok_or_else(|| KeyError::MalformedMultibase("expected base58btc 'z' prefix".into()))?;
        let decoded = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| KeyError::MalformedMultibase(e.to_string()))?;
        if decoded.len() < 2 {
            return Err(KeyError::MalformedMultibase("missing multicodec prefix".into()));
        }
        let prefix = [decoded[0], decoded[1]];
        let key_type = KeyType::from_multicodec(prefix).ok_or_else(|| {
            KeyError::UnsupportedAlgorithm(format!("multicodec 0x{}", hex::encode(prefix)))
        })?;
        Self::from_bytes(key_type, &decoded[2..])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "PublicKey({}, {})", self.key_type, &hex[..16.min(hex.len())])
    }
}

// ---------------------------------------------------------------------------
// KeySignature
// ---------------------------------------------------------------------------

/// A 64-byte signature produced by [`WalletKeypair::sign`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    bytes: Vec<u8>,
}

impl KeySignature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Multibase base58btc, the `proofValue` encoding.
    pub fn to_multibase(&self) -> String {
        format!(
            "{}{}",
            MULTIBASE_BASE58BTC,
            bs58::encode(&self.bytes).into_string()
        )
    }

    pub fn from_multibase(s: &str) -> Result<Self, KeyError> {
        let encoded = s
            .strip_prefix(MULTIBASE_BASE58BTC)
            .ok_or_else(|| KeyError::MalformedMultibase("expected base58btc 'z' prefix".into()))?;
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| KeyError::MalformedMultibase(e.to_string()))?;
        Ok(Self { bytes })
    }
}

impl fmt::Debug for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeySignature({}...)", &hex::encode(&self.bytes)[..16.min(self.bytes.len() * 2)])
    }
}

//! # Identity Configuration & Constants
//!
//! Every magic string in the identity core lives here. Contexts, type tags,
//! multicodec prefixes, storage slot names: if it shows up on the wire or on
//! disk, it is defined once, in this file.
//!
//! Changing any of the wire-facing values after wallets are in the field
//! invalidates every credential they hold, so treat them as frozen.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::keys::KeyType;

// ---------------------------------------------------------------------------
// Credential Vocabulary
// ---------------------------------------------------------------------------

/// The W3C Verifiable Credentials v1 JSON-LD context. Must be the first
/// entry of every credential's `@context`.
pub const W3C_CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// Sevis wallet vocabulary context, appended after the W3C context on
/// membership credentials.
pub const WALLET_CREDENTIALS_CONTEXT: &str = "https://seviswallet.app/credentials/v1";

/// Base type tag every credential carries.
pub const BASE_CREDENTIAL_TYPE: &str = "VerifiableCredential";

/// Type tag of the membership credential issued at registration.
pub const MEMBERSHIP_CREDENTIAL_TYPE: &str = "SevisWalletMembershipCredential";

/// Placeholder issuer for membership credentials.
///
/// This is not a resolvable DID. It stands in for a backend issuer whose
/// key the device never holds; until that exists, membership credentials
/// are signed by the holder's own key and verifiers must list this value
/// in [`IdentityConfig::trusted_placeholder_issuers`] to accept them.
pub const PLACEHOLDER_ISSUER_DID: &str = "did:key:sevis-wallet-issuer";

/// Prefix for credential identifiers. Followed by a v4 UUID.
pub const CREDENTIAL_ID_PREFIX: &str = "urn:uuid:";

/// Proof purpose recorded on every proof we produce.
pub const PROOF_PURPOSE_ASSERTION: &str = "assertionMethod";

// ---------------------------------------------------------------------------
// DID Parameters
// ---------------------------------------------------------------------------

/// The default (and currently only) DID method.
pub const DID_KEY_METHOD: &str = "key";

/// Multibase prefix for base58btc.
pub const MULTIBASE_BASE58BTC: char = 'z';

/// Multicodec varint for an Ed25519 public key (`0xed`).
pub const MULTICODEC_ED25519_PUB: [u8; 2] = [0xed, 0x01];

/// Multicodec varint for a compressed secp256k1 public key (`0xe7`).
pub const MULTICODEC_SECP256K1_PUB: [u8; 2] = [0xe7, 0x01];

/// JSON-LD context of a DID document.
pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 public key length in bytes.
pub const ED25519_PUBLIC_KEY_LENGTH: usize = 32;

/// Compressed SEC1 secp256k1 public key length in bytes.
pub const SECP256K1_PUBLIC_KEY_LENGTH: usize = 33;

/// Secret scalar length for both supported curves.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Both Ed25519 and compact ECDSA signatures are 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve. Always twelve.
pub const AES_NONCE_LENGTH: usize = 12;

/// Length of the device secret the encrypted store is keyed from.
pub const DEVICE_SECRET_LENGTH: usize = 32;

/// BLAKE3 `derive_key` context for the at-rest encryption key.
pub const STORAGE_KEY_CONTEXT: &str = "sevis-wallet 2026-01-01 secure-store v1";

/// How many times key generation retries when the RNG hands back bytes
/// that are not a valid secp256k1 scalar. The odds of needing even one
/// retry are ~2^-128.
pub const MAX_KEYGEN_ATTEMPTS: usize = 4;

/// Resolved identifiers kept in memory. Past this the oldest entry is
/// evicted; a miss just re-derives the key.
pub const RESOLUTION_CACHE_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Default credential validity: one year from issuance.
pub const DEFAULT_CREDENTIAL_VALIDITY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Tolerated clock skew for issuance timestamps that appear to be in the
/// future. Phones drift; five minutes covers every device we've seen.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(5 * 60);

// ---------------------------------------------------------------------------
// Storage Layout
// ---------------------------------------------------------------------------

/// Key pair slots: `key:<alias>`.
pub const KEY_PREFIX: &str = "key:";

/// Identifier slots: `did:<did>`.
pub const DID_PREFIX: &str = "did:";

/// Tombstones for deactivated identifiers: `did-deactivated:<did>`.
pub const DID_DEACTIVATED_PREFIX: &str = "did-deactivated:";

/// Credential slots: `credential:<credential-id>`.
pub const CREDENTIAL_PREFIX: &str = "credential:";

/// The single, device-scoped registration record.
pub const REGISTRATION_SLOT: &str = "registration";

/// Marker written while a registration is in flight. Survives crashes so
/// the next attempt can reconcile instead of generating a second key.
pub const REGISTRATION_PENDING_SLOT: &str = "registration-pending";

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Who signs the membership credential issued at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "issuer")]
pub enum MembershipIssuer {
    /// Holder-signed, with `issuer` set to a placeholder string that a
    /// verifier must explicitly trust. Non-production trust.
    Placeholder(String),
    /// Holder-signed with `issuer` set to the holder's own DID.
    SelfIssued,
}

impl Default for MembershipIssuer {
    fn default() -> Self {
        MembershipIssuer::Placeholder(PLACEHOLDER_ISSUER_DID.to_string())
    }
}

/// Runtime knobs for the identity core.
///
/// Constructed once and handed to [`crate::context::WalletContext`]; no
/// component reads configuration from globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Algorithm used when registration generates the device key.
    pub default_key_type: KeyType,

    /// Issuer of the membership credential.
    pub membership_issuer: MembershipIssuer,

    /// Validity window applied when a claim set carries no expiration.
    /// `None` issues credentials that never expire.
    #[serde(with = "duration_secs_opt")]
    pub credential_validity: Option<Duration>,

    /// How far in the future an issuance timestamp may be before the
    /// verifier reports clock skew.
    #[serde(with = "duration_secs")]
    pub clock_skew: Duration,

    /// Issuer strings the verifier accepts without binding them to the
    /// proof's verification method.
    pub trusted_placeholder_issuers: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default_key_type: KeyType::Ed25519,
            membership_issuer: MembershipIssuer::default(),
            credential_validity: Some(DEFAULT_CREDENTIAL_VALIDITY),
            clock_skew: DEFAULT_CLOCK_SKEW,
            trusted_placeholder_issuers: vec![PLACEHOLDER_ISSUER_DID.to_string()],
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod duration_secs_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

//! The `did:key` method.
//!
//! `did:key:` + multibase(base58btc, multicodec-prefix || public key).
//! Derivation and inversion are both pure, so resolution never leaves the
//! process.

use super::{Did, DidError};
use crate::config::DID_KEY_METHOD;
use crate::crypto::PublicKey;

/// Derive the `did:key` identifier embedding `public_key`.
///
/// Same key in, same identifier out. Every time.
pub fn derive(public_key: &PublicKey) -> Did {
    Did::new(DID_KEY_METHOD, public_key.to_multibase())
}

/// Recover the public key embedded in a `did:key` identifier.
pub fn invert(did: &Did) -> Result<PublicKey, DidError> {
    if did.method() != DID_KEY_METHOD {
        return Err(DidError::UnsupportedMethod(did.method().to_string()));
    }
    PublicKey::from_multibase(did.method_specific_id())
        .map_err(|e| DidError::MalformedIdentifier(format!("{did}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyType, WalletKeypair};

    #[test]
    fn derive_is_deterministic() {
        let kp = WalletKeypair::from_secret_bytes(KeyType::Ed25519, &[99u8; 32]).unwrap();
        assert_eq!(derive(&kp.public_key()), derive(&kp.public_key()));
    }

    #[test]
    fn invert_recovers_key_for_both_types() {
        for kt in [KeyType::Ed25519, KeyType::Secp256k1] {
            let pk = WalletKeypair::generate(kt).unwrap().public_key();
            let did = derive(&pk);
            assert_eq!(invert(&did).unwrap(), pk);
        }
    }

    #[test]
    fn known_prefixes() {
        let ed = WalletKeypair::generate(KeyType::Ed25519).unwrap().public_key();
        assert!(derive(&ed).to_string().starts_with("did:key:z6Mk"));
        let k1 = WalletKeypair::generate(KeyType::Secp256k1).unwrap().public_key();
        assert!(derive(&k1).to_string().starts_with("did:key:zQ3s"));
    }

    #[test]
    fn invert_rejects_other_methods() {
        let did = Did::new("web", "example.com");
        assert!(matches!(invert(&did), Err(DidError::UnsupportedMethod(m)) if m == "web"));
    }

    #[test]
    fn invert_rejects_garbage() {
        let did = Did::new("key", "z111");
        assert!(matches!(invert(&did), Err(DidError::MalformedIdentifier(_))));
        let did = Did::new("key", "abc");
        assert!(matches!(invert(&did), Err(DidError::MalformedIdentifier(_))));
    }
}

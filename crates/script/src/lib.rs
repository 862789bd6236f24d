//! Standard script classification and block signature verification.

pub mod standard;

mod secp;

use ppcd_consensus::Hash256;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey};

pub use standard::{classify_script_pubkey, pubkey_from_p2pk, ScriptType};

/// Verifies a DER-encoded ECDSA signature over a 32-byte digest.
///
/// Signatures from old minters are not always strictly DER, so lax parsing
/// is used, matching the legacy client.
pub fn verify_hash_signature(pubkey: &[u8], signature: &[u8], digest: &Hash256) -> bool {
    let Ok(pubkey) = PublicKey::from_slice(pubkey) else {
        return false;
    };
    let Ok(signature) = Signature::from_der_lax(signature) else {
        return false;
    };
    let Ok(message) = Message::from_digest_slice(digest) else {
        return false;
    };
    secp::secp256k1_verify()
        .verify_ecdsa(&message, &signature, &pubkey)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::{Secp256k1, SecretKey};

    fn keypair() -> (SecretKey, PublicKey) {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[0x11u8; 32]).expect("secret key");
        let public = PublicKey::from_secret_key(&secp, &secret);
        (secret, public)
    }

    #[test]
    fn signature_round_trip() {
        let secp = Secp256k1::new();
        let (secret, public) = keypair();
        let digest = [0x42u8; 32];
        let message = Message::from_digest_slice(&digest).expect("message");
        let signature = secp.sign_ecdsa(&message, &secret).serialize_der();

        assert!(verify_hash_signature(
            &public.serialize(),
            &signature,
            &digest
        ));
        assert!(verify_hash_signature(
            &public.serialize_uncompressed(),
            &signature,
            &digest
        ));
    }

    #[test]
    fn tampered_signature_fails() {
        let secp = Secp256k1::new();
        let (secret, public) = keypair();
        let digest = [0x42u8; 32];
        let message = Message::from_digest_slice(&digest).expect("message");
        let mut signature = secp.sign_ecdsa(&message, &secret).serialize_der().to_vec();
        signature[5] ^= 0xff;

        assert!(!verify_hash_signature(&public.serialize(), &signature, &digest));
    }

    #[test]
    fn wrong_digest_fails() {
        let secp = Secp256k1::new();
        let (secret, public) = keypair();
        let message = Message::from_digest_slice(&[0x42u8; 32]).expect("message");
        let signature = secp.sign_ecdsa(&message, &secret).serialize_der();

        assert!(!verify_hash_signature(
            &public.serialize(),
            &signature,
            &[0x43u8; 32]
        ));
    }
}

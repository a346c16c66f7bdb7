//! Signing keys
//!
//! secp256k1 keys in the Cosmos layout: compressed 33-byte public key,
//! bech32 address over RIPEMD160(SHA256(pubkey)), 64-byte compact
//! signatures over SHA256(sign bytes).

use super::proto::{to_any, Secp256k1PubKey, SECP256K1_PUBKEY_TYPE_URL};
use crate::error::{ArbError, ArbResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bech32::{ToBase32, Variant};
use prost_types::Any;
use ripemd::Ripemd160;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use std::fmt;

pub struct SignerKey {
    secp: Secp256k1<All>,
    secret: SecretKey,
    public: PublicKey,
}

impl SignerKey {
    pub fn from_hex(hex_key: &str) -> ArbResult<Self> {
        let bytes = hex::decode(hex_key.trim().trim_start_matches("0x"))
            .map_err(|e| ArbError::Config(format!("signing key is not hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> ArbResult<Self> {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| ArbError::Config(format!("invalid secp256k1 key: {}", e)))?;
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self {
            secp,
            secret,
            public,
        })
    }

    /// Compressed SEC1 public key
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public.serialize()
    }

    pub fn public_key_any(&self) -> Any {
        to_any(
            SECP256K1_PUBKEY_TYPE_URL,
            &Secp256k1PubKey {
                key: self.public_key_bytes().to_vec(),
            },
        )
    }

    pub fn address(&self, prefix: &str) -> ArbResult<String> {
        let sha = Sha256::digest(self.public_key_bytes());
        let hash = Ripemd160::digest(sha);
        bech32::encode(prefix, hash.to_base32(), Variant::Bech32)
            .map_err(|e| ArbError::Config(format!("bech32 prefix '{}': {}", prefix, e)))
    }

    /// ECDSA over SHA256(sign_bytes), 64-byte r||s (low-S)
    pub fn sign(&self, sign_bytes: &[u8]) -> ArbResult<Vec<u8>> {
        let digest = Sha256::digest(sign_bytes);
        let msg = Message::from_digest_slice(&digest)
            .map_err(|e| ArbError::Signing(format!("sign digest: {}", e)))?;
        let sig = self.secp.sign_ecdsa(&msg, &self.secret);
        Ok(sig.serialize_compact().to_vec())
    }
}

impl fmt::Debug for SignerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerKey({})", hex::encode(self.public_key_bytes()))
    }
}

/// The key an account signs with, plus any co-signers of a multi-factor
/// (smart-account) authenticator.
#[derive(Debug)]
pub struct SigningParty {
    pub key: SignerKey,
    pub cosigners: Vec<SignerKey>,
}

impl SigningParty {
    pub fn new(key: SignerKey, cosigners: Vec<SignerKey>) -> Self {
        Self { key, cosigners }
    }

    pub fn from_hex(key_hex: &str, cosigner_hex: &[String]) -> ArbResult<Self> {
        let key = SignerKey::from_hex(key_hex)?;
        let cosigners = cosigner_hex
            .iter()
            .map(|h| SignerKey::from_hex(h))
            .collect::<ArbResult<Vec<_>>>()?;
        Ok(Self::new(key, cosigners))
    }

    /// Signature bytes for one signer slot. With co-signers configured, each
    /// co-signer signs the same bytes and the result is a JSON array of their
    /// base64 signatures in configuration order.
    pub fn signature_over(&self, sign_bytes: &[u8]) -> ArbResult<Vec<u8>> {
        if self.cosigners.is_empty() {
            return self.key.sign(sign_bytes);
        }
        let compound = self
            .cosigners
            .iter()
            .map(|c| c.sign(sign_bytes).map(|sig| BASE64.encode(sig)))
            .collect::<ArbResult<Vec<String>>>()?;
        serde_json::to_vec(&compound)
            .map_err(|e| ArbError::Signing(format!("compound signature: {}", e)))
    }
}

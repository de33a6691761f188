use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use curve25519_dalek::edwards::CompressedEdwardsY;
use rand::RngCore;
use sha2::{Digest, Sha512};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};

const SEAL_CONTEXT: &str = "indigo 2024 sealed box v1";
const AGREEMENT_CONTEXT: &str = "indigo 2024 key agreement v1";

/// Anonymous sealed box: ephemeral X25519 key, nonce and ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    /// Ephemeral X25519 public key used for key exchange.
    pub ephemeral_pubkey: [u8; 32],
    /// 12-byte nonce for ChaCha20-Poly1305.
    pub nonce: [u8; 12],
    /// Encrypted data (ciphertext + 16-byte Poly1305 tag).
    pub ciphertext: Vec<u8>,
}

impl SealedBox {
    /// Serialize to bytes: ephemeral_pubkey (32) + nonce (12) + ciphertext (variable).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 12 + self.ciphertext.len());
        out.extend_from_slice(&self.ephemeral_pubkey);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < 44 + 16 {
            return Err(CryptoError::DecryptionError("sealed box too short".into()));
        }
        let mut ephemeral_pubkey = [0u8; 32];
        ephemeral_pubkey.copy_from_slice(&bytes[..32]);
        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(&bytes[32..44]);
        Ok(Self {
            ephemeral_pubkey,
            nonce,
            ciphertext: bytes[44..].to_vec(),
        })
    }
}

/// X25519 secret for an Ed25519 key pair: the clamped low half of
/// SHA-512(seed), the same scalar Ed25519 signs with.
fn x25519_secret(keypair: &KeyPair) -> StaticSecret {
    let mut seed = keypair.seed_bytes();
    let digest = Sha512::digest(seed);
    seed.zeroize();
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&digest[..32]);
    let secret = StaticSecret::from(scalar);
    scalar.zeroize();
    secret
}

/// Montgomery form of an Ed25519 public key.
pub fn x25519_public_key(pubkey: &PublicKey) -> Result<[u8; 32], CryptoError> {
    let point = CompressedEdwardsY(*pubkey.as_bytes())
        .decompress()
        .ok_or_else(|| CryptoError::InvalidInput("verkey is not a curve point".into()))?;
    Ok(point.to_montgomery().to_bytes())
}

/// Symmetric key shared between a local key pair and a peer's public key.
/// Both sides derive the same value.
pub fn key_agreement(
    local: &KeyPair,
    peer: &PublicKey,
) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let secret = x25519_secret(local);
    let peer_x = X25519PublicKey::from(x25519_public_key(peer)?);
    let shared = secret.diffie_hellman(&peer_x);
    if !shared.was_contributory() {
        return Err(CryptoError::InvalidInput("low-order peer key".into()));
    }
    Ok(Zeroizing::new(blake3::derive_key(
        AGREEMENT_CONTEXT,
        shared.as_bytes(),
    )))
}

fn cipher(key: &[u8; 32]) -> Result<ChaCha20Poly1305, CryptoError> {
    ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| CryptoError::EncryptionError(format!("cipher init failed: {}", e)))
}

/// ChaCha20-Poly1305 with a fresh random nonce. Returns (nonce, ciphertext || tag).
pub fn aead_seal(
    key: &[u8; 32],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<([u8; 12], Vec<u8>), CryptoError> {
    let mut nonce_bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let ciphertext = cipher(key)?
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionError(format!("encryption failed: {}", e)))?;
    Ok((nonce_bytes, ciphertext))
}

pub fn aead_open(
    key: &[u8; 32],
    nonce: &[u8; 12],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    cipher(key)?
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|e| CryptoError::DecryptionError(format!("decryption failed: {}", e)))
}

fn seal_key(shared: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> Zeroizing<[u8; 32]> {
    let mut input = Zeroizing::new(Vec::with_capacity(96));
    input.extend_from_slice(shared);
    input.extend_from_slice(ephemeral);
    input.extend_from_slice(recipient);
    Zeroizing::new(blake3::derive_key(SEAL_CONTEXT, &input))
}

/// Encrypt for the holder of `recipient` without revealing the sender.
pub fn seal(plaintext: &[u8], recipient: &PublicKey) -> Result<SealedBox, CryptoError> {
    let recipient_x = x25519_public_key(recipient)?;

    let mut ephemeral_secret_bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut ephemeral_secret_bytes);
    let ephemeral_secret = StaticSecret::from(ephemeral_secret_bytes);
    ephemeral_secret_bytes.zeroize();
    let ephemeral_pubkey = X25519PublicKey::from(&ephemeral_secret).to_bytes();

    let shared = ephemeral_secret.diffie_hellman(&X25519PublicKey::from(recipient_x));
    let key = seal_key(shared.as_bytes(), &ephemeral_pubkey, &recipient_x);
    let (nonce, ciphertext) = aead_seal(&key, plaintext, &ephemeral_pubkey)?;

    Ok(SealedBox {
        ephemeral_pubkey,
        nonce,
        ciphertext,
    })
}

/// Open a sealed box with the recipient's key pair.
pub fn open_sealed(sealed: &SealedBox, recipient: &KeyPair) -> Result<Vec<u8>, CryptoError> {
    let recipient_x = x25519_public_key(&recipient.public_key())?;
    let secret = x25519_secret(recipient);
    let shared = secret.diffie_hellman(&X25519PublicKey::from(sealed.ephemeral_pubkey));
    let key = seal_key(shared.as_bytes(), &sealed.ephemeral_pubkey, &recipient_x);
    aead_open(&key, &sealed.nonce, &sealed.ciphertext, &sealed.ephemeral_pubkey)
}

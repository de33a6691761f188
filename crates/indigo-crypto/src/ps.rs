//! Pointcheval-Sanders signatures over BN254.
//!
//! A signature on messages `m_0..m_{n-1}` is `(σ1, σ2)` with
//! `σ2 = (x + Σ y_i·m_i)·σ1`, and it verifies when
//! `e(σ1, X̃ + Σ m_i·Ỹ_i) = e(σ2, g2)`. The holder re-randomizes it to
//! `(r·σ1, r·(σ2 + t·σ1))` before every presentation and proves knowledge
//! of `t` and the hidden messages, so two presentations of one signature
//! share no group element.

use ark_bn254::Bn254;
use ark_ec::pairing::Pairing;
use ark_std::Zero;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::CryptoError;
use crate::group::{
    canonical_bytes, g1, g2, random_scalar, read_canonical, scalar_from_wide, Gt, Point, Point2,
    Scalar, Secret, G1, G2,
};

/// Issuer secret `(x, y_0..y_{n-1})`.
pub struct SigningKey {
    x: Scalar,
    y: Vec<Scalar>,
}

impl SigningKey {
    /// Key for `len` messages, derived from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32], len: usize) -> Self {
        let derive = |label: &[u8], index: u64| {
            let mut hasher = blake3::Hasher::new_keyed(seed);
            hasher.update(label);
            hasher.update(&index.to_le_bytes());
            let mut wide = [0u8; 64];
            hasher.finalize_xof().fill(&mut wide);
            scalar_from_wide(&wide)
        };
        Self {
            x: derive(b"x", 0),
            y: (0..len as u64).map(|i| derive(b"y", i)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            x: Point2(g2() * self.x),
            y: self.y.iter().map(|y| Point2(g2() * y)).collect(),
            y1: self.y.iter().map(|y| Point(g1() * y)).collect(),
        }
    }

    pub fn sign(&self, messages: &[Scalar]) -> Result<Signature, CryptoError> {
        if messages.len() != self.len() {
            return Err(CryptoError::InvalidInput(format!(
                "key signs {} messages, got {}",
                self.len(),
                messages.len()
            )));
        }
        let exponent = self
            .y
            .iter()
            .zip(messages)
            .fold(self.x, |acc, (y, m)| acc + *y * m);
        let sigma1 = g1() * random_scalar();
        Ok(Signature {
            sigma1: Point(sigma1),
            sigma2: Point(sigma1 * exponent),
        })
    }

    /// Sign the `known` messages together with those hidden in
    /// `commitment = t·g1 + Σ m_j·Y_j`. The result verifies only after the
    /// holder removes `t` with [`Signature::unblind`].
    pub fn sign_committed(
        &self,
        commitment: &G1,
        known: &BTreeMap<usize, Scalar>,
    ) -> Result<Signature, CryptoError> {
        let mut exponent = self.x;
        for (index, message) in known {
            let y = self.y.get(*index).ok_or_else(|| {
                CryptoError::InvalidInput(format!("message index {} out of range", index))
            })?;
            exponent += *y * message;
        }
        let u = random_scalar();
        Ok(Signature {
            sigma1: Point(g1() * u),
            sigma2: Point((g1() * exponent + *commitment) * u),
        })
    }
}

/// Public half of a [`SigningKey`]: `X̃ = x·g2`, `Ỹ_i = y_i·g2` and the G1
/// bases `Y_i = y_i·g1` used to commit to hidden messages at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyingKey {
    pub x: Point2,
    pub y: Vec<Point2>,
    pub y1: Vec<Point>,
}

impl VerifyingKey {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn commitment_base(&self, index: usize) -> Option<G1> {
        self.y1.get(index).map(|p| p.0)
    }

    pub fn to_hex(&self) -> String {
        let y: Vec<G2> = self.y.iter().map(|p| p.0).collect();
        let y1: Vec<G1> = self.y1.iter().map(|p| p.0).collect();
        let mut bytes = canonical_bytes(&self.x.0);
        bytes.extend(canonical_bytes(&y));
        bytes.extend(canonical_bytes(&y1));
        hex::encode(bytes)
    }

    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(encoded)
            .map_err(|e| CryptoError::InvalidInput(format!("invalid verifying key hex: {}", e)))?;
        let mut reader = bytes.as_slice();
        let x: G2 = read_canonical(&mut reader, "verifying key")?;
        let y: Vec<G2> = read_canonical(&mut reader, "verifying key")?;
        let y1: Vec<G1> = read_canonical(&mut reader, "verifying key")?;
        if !reader.is_empty() || y.len() != y1.len() {
            return Err(CryptoError::InvalidInput("malformed verifying key".into()));
        }
        Ok(Self {
            x: Point2(x),
            y: y.into_iter().map(Point2).collect(),
            y1: y1.into_iter().map(Point).collect(),
        })
    }

    pub fn verify(&self, signature: &Signature, messages: &[Scalar]) -> bool {
        if messages.len() != self.len() || signature.sigma1.0.is_zero() {
            return false;
        }
        let key = self
            .y
            .iter()
            .zip(messages)
            .fold(self.x.0, |acc, (y, m)| acc + y.0 * m);
        Bn254::pairing(signature.sigma1.0, key) == Bn254::pairing(signature.sigma2.0, g2())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub sigma1: Point,
    pub sigma2: Point,
}

impl Signature {
    pub fn unblind(&self, blinding: &Scalar) -> Self {
        Self {
            sigma1: self.sigma1,
            sigma2: Point(self.sigma2.0 - self.sigma1.0 * blinding),
        }
    }

    /// `(r·σ1, r·(σ2 + t·σ1))`: a fresh-looking signature on the same
    /// messages, valid for the key shifted by `t·g2`.
    fn randomize(&self, r: &Scalar, t: &Scalar) -> Self {
        Self {
            sigma1: Point(self.sigma1.0 * r),
            sigma2: Point((self.sigma2.0 + self.sigma1.0 * t) * r),
        }
    }
}

/// Holder side of a signature proof between commitment and challenge.
pub struct SignatureProver {
    signature: Signature,
    blinding: Scalar,
    blinding_nonce: Scalar,
    hidden: BTreeMap<usize, (Scalar, Scalar)>,
    commitment: Gt,
}

impl SignatureProver {
    /// Re-randomize `signature` and commit to every message outside
    /// `revealed`. A nonce given in `nonces` replaces the random one for that
    /// message, so its response can be matched across proofs.
    pub fn commit(
        key: &VerifyingKey,
        signature: &Signature,
        messages: &[Scalar],
        revealed: &BTreeSet<usize>,
        nonces: &BTreeMap<usize, Scalar>,
    ) -> Result<Self, CryptoError> {
        if messages.len() != key.len() {
            return Err(CryptoError::ZkpError(format!(
                "key covers {} messages, got {}",
                key.len(),
                messages.len()
            )));
        }
        if let Some(index) = revealed.iter().find(|i| **i >= key.len()) {
            return Err(CryptoError::ZkpError(format!(
                "revealed index {} out of range",
                index
            )));
        }

        let t = random_scalar();
        let randomized = signature.randomize(&random_scalar(), &t);
        let blinding_nonce = random_scalar();

        let mut base = g2() * blinding_nonce;
        let mut hidden = BTreeMap::new();
        for (index, message) in messages.iter().enumerate() {
            if revealed.contains(&index) {
                continue;
            }
            let nonce = nonces.get(&index).copied().unwrap_or_else(random_scalar);
            base += key.y[index].0 * nonce;
            hidden.insert(index, (*message, nonce));
        }

        Ok(Self {
            commitment: Bn254::pairing(randomized.sigma1.0, base),
            signature: randomized,
            blinding: t,
            blinding_nonce,
            hidden,
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn commitment(&self) -> &Gt {
        &self.commitment
    }

    pub fn nonce(&self, index: usize) -> Option<Scalar> {
        self.hidden.get(&index).map(|(_, nonce)| *nonce)
    }

    pub fn respond(self, challenge: &Scalar) -> SignatureProof {
        SignatureProof {
            signature: self.signature,
            z_blinding: Secret(self.blinding_nonce + *challenge * self.blinding),
            z_messages: self
                .hidden
                .into_iter()
                .map(|(index, (message, nonce))| (index, Secret(nonce + *challenge * message)))
                .collect(),
        }
    }
}

/// Randomized signature plus responses for the blinding and every hidden
/// message, keyed by message index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureProof {
    pub signature: Signature,
    pub z_blinding: Secret,
    pub z_messages: BTreeMap<usize, Secret>,
}

impl SignatureProof {
    pub fn response(&self, index: usize) -> Option<Scalar> {
        self.z_messages.get(&index).map(|z| z.0)
    }

    /// The prover commitment implied by the responses under `challenge`.
    /// `None` when `revealed` and the hidden responses do not partition the
    /// key's messages, or when σ1 is the identity.
    pub fn implied_commitment(
        &self,
        key: &VerifyingKey,
        revealed: &BTreeMap<usize, Scalar>,
        challenge: &Scalar,
    ) -> Option<Gt> {
        let sigma1 = self.signature.sigma1.0;
        if sigma1.is_zero() || revealed.len() + self.z_messages.len() != key.len() {
            return None;
        }

        let mut known = key.x.0;
        for (index, message) in revealed {
            if self.z_messages.contains_key(index) {
                return None;
            }
            known += key.y.get(*index)?.0 * message;
        }
        let mut responses = g2() * self.z_blinding.0;
        for (index, z) in &self.z_messages {
            responses += key.y.get(*index)?.0 * z.0;
        }

        let statement = Bn254::pairing(self.signature.sigma2.0, g2()) - Bn254::pairing(sigma1, known);
        Some(Bn254::pairing(sigma1, responses) - statement * *challenge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::h1;
    use ark_std::One;

    fn messages(n: u64) -> Vec<Scalar> {
        (1..=n).map(|i| Scalar::from(i * 7)).collect()
    }

    #[test]
    fn test_sign_verify() {
        let key = SigningKey::from_seed(&[3u8; 32], 3);
        let vk = key.verifying_key();
        let m = messages(3);
        let sig = key.sign(&m).unwrap();
        assert!(vk.verify(&sig, &m));

        let mut wrong = m.clone();
        wrong[1] += Scalar::one();
        assert!(!vk.verify(&sig, &wrong));
        assert!(key.sign(&m[..2]).is_err());
    }

    #[test]
    fn test_seed_pins_key() {
        let a = SigningKey::from_seed(&[9u8; 32], 2).verifying_key();
        let b = SigningKey::from_seed(&[9u8; 32], 2).verifying_key();
        let c = SigningKey::from_seed(&[8u8; 32], 2).verifying_key();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(VerifyingKey::from_hex(&a.to_hex()).unwrap(), a);
        assert!(VerifyingKey::from_hex(&a.to_hex()[..40]).is_err());
    }

    #[test]
    fn test_identity_signature_rejected() {
        let key = SigningKey::from_seed(&[1u8; 32], 1);
        let sig = Signature {
            sigma1: Point(G1::zero()),
            sigma2: Point(G1::zero()),
        };
        assert!(!key.verifying_key().verify(&sig, &[Scalar::one()]));
    }

    #[test]
    fn test_blind_issuance() {
        let key = SigningKey::from_seed(&[5u8; 32], 3);
        let vk = key.verifying_key();
        let m = messages(3);

        let t = random_scalar();
        let commitment = g1() * t + vk.commitment_base(0).unwrap() * m[0];
        let known = BTreeMap::from([(1, m[1]), (2, m[2])]);
        let blinded = key.sign_committed(&commitment, &known).unwrap();
        assert!(!vk.verify(&blinded, &m));
        assert!(vk.verify(&blinded.unblind(&t), &m));

        let out_of_range = BTreeMap::from([(7, m[1])]);
        assert!(key.sign_committed(&commitment, &out_of_range).is_err());
    }

    fn show(
        vk: &VerifyingKey,
        sig: &Signature,
        m: &[Scalar],
        revealed: &BTreeSet<usize>,
    ) -> (SignatureProof, Gt, Scalar) {
        let prover = SignatureProver::commit(vk, sig, m, revealed, &BTreeMap::new()).unwrap();
        let commitment = *prover.commitment();
        let c = random_scalar();
        (prover.respond(&c), commitment, c)
    }

    #[test]
    fn test_show_implies_prover_commitment() {
        let key = SigningKey::from_seed(&[2u8; 32], 4);
        let vk = key.verifying_key();
        let m = messages(4);
        let sig = key.sign(&m).unwrap();

        let revealed_idx = BTreeSet::from([1, 3]);
        let (proof, commitment, c) = show(&vk, &sig, &m, &revealed_idx);
        let revealed = BTreeMap::from([(1, m[1]), (3, m[3])]);
        assert_eq!(proof.implied_commitment(&vk, &revealed, &c), Some(commitment));

        let lie = BTreeMap::from([(1, m[1] + Scalar::one()), (3, m[3])]);
        assert_ne!(proof.implied_commitment(&vk, &lie, &c), Some(commitment));
    }

    #[test]
    fn test_show_coverage_enforced() {
        let key = SigningKey::from_seed(&[2u8; 32], 3);
        let vk = key.verifying_key();
        let m = messages(3);
        let sig = key.sign(&m).unwrap();
        let (proof, _, c) = show(&vk, &sig, &m, &BTreeSet::from([1]));

        // Missing index 1 entirely.
        assert!(proof.implied_commitment(&vk, &BTreeMap::new(), &c).is_none());
        // Index 0 both revealed and hidden.
        let overlap = BTreeMap::from([(0, m[0])]);
        assert!(proof.implied_commitment(&vk, &overlap, &c).is_none());
    }

    #[test]
    fn test_presentations_unlinkable() {
        let key = SigningKey::from_seed(&[4u8; 32], 2);
        let vk = key.verifying_key();
        let m = messages(2);
        let sig = key.sign(&m).unwrap();
        let revealed = BTreeSet::from([1]);

        let (a, _, _) = show(&vk, &sig, &m, &revealed);
        let (b, _, _) = show(&vk, &sig, &m, &revealed);
        assert_ne!(a.signature.sigma1, b.signature.sigma1);
        assert_ne!(a.signature.sigma2, b.signature.sigma2);
        assert_ne!(a.signature.sigma1, sig.sigma1);
        assert_ne!(a.response(0), b.response(0));
    }

    #[test]
    fn test_pinned_nonce_links_responses() {
        let key = SigningKey::from_seed(&[6u8; 32], 2);
        let vk = key.verifying_key();
        let m = messages(2);
        let sig = key.sign(&m).unwrap();
        let nonce = random_scalar();
        let pinned = BTreeMap::from([(0, nonce)]);

        let a = SignatureProver::commit(&vk, &sig, &m, &BTreeSet::new(), &pinned).unwrap();
        let b = SignatureProver::commit(&vk, &sig, &m, &BTreeSet::new(), &pinned).unwrap();
        assert_eq!(a.nonce(0), Some(nonce));
        let c = random_scalar();
        assert_eq!(a.respond(&c).response(0), b.respond(&c).response(0));
    }

    #[test]
    fn test_forged_signature_has_no_valid_show() {
        let key = SigningKey::from_seed(&[7u8; 32], 1);
        let vk = key.verifying_key();
        let m = messages(1);
        let forged = Signature {
            sigma1: Point(g1()),
            sigma2: Point(h1()),
        };
        let (proof, commitment, c) = show(&vk, &forged, &m, &BTreeSet::new());
        assert_ne!(proof.implied_commitment(&vk, &BTreeMap::new(), &c), Some(commitment));
    }
}

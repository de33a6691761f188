use ark_serialize::CanonicalSerialize;

use crate::group::{canonical_bytes, scalar_from_wide, Scalar};

/// Fiat-Shamir transcript over BLAKE3.
///
/// Every message is framed with its label and length. Challenges are
/// squeezed from the running state and fed back in, so two challenges drawn
/// in sequence differ.
#[derive(Clone)]
pub struct Transcript {
    hasher: blake3::Hasher,
}

impl Transcript {
    pub fn new(protocol: &[u8]) -> Self {
        let mut transcript = Self {
            hasher: blake3::Hasher::new_derive_key("indigo 2024 transcript v1"),
        };
        transcript.append_message(b"protocol", protocol);
        transcript
    }

    pub fn append_message(&mut self, label: &[u8], message: &[u8]) {
        self.hasher.update(&(label.len() as u64).to_le_bytes());
        self.hasher.update(label);
        self.hasher.update(&(message.len() as u64).to_le_bytes());
        self.hasher.update(message);
    }

    pub fn append_u64(&mut self, label: &[u8], value: u64) {
        self.append_message(label, &value.to_le_bytes());
    }

    /// Append any group element or scalar in its compressed encoding.
    pub fn append_element<T: CanonicalSerialize>(&mut self, label: &[u8], element: &T) {
        self.append_message(label, &canonical_bytes(element));
    }

    pub fn challenge_scalar(&mut self, label: &[u8]) -> Scalar {
        self.append_message(b"challenge", label);
        let mut wide = [0u8; 64];
        self.hasher.finalize_xof().fill(&mut wide);
        let challenge = scalar_from_wide(&wide);
        self.append_element(b"challenge-out", &challenge);
        challenge
    }
}

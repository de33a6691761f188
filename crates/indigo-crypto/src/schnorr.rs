//! Sigma protocols made non-interactive with [`Transcript`].

use ark_std::Zero;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::group::{random_scalar, Scalar, Secret, G1};
use crate::transcript::Transcript;

/// Proof of knowledge of `x_1..x_n` with `P = Σ x_i·B_i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentationProof {
    pub challenge: Secret,
    pub responses: Vec<Secret>,
}

fn combine(bases: &[G1], scalars: &[Scalar]) -> G1 {
    bases
        .iter()
        .zip(scalars)
        .fold(G1::zero(), |acc, (base, s)| acc + *base * s)
}

impl RepresentationProof {
    pub fn prove(
        transcript: &mut Transcript,
        bases: &[G1],
        witness: &[Scalar],
        statement: &G1,
    ) -> Result<Self, CryptoError> {
        if bases.is_empty() || bases.len() != witness.len() {
            return Err(CryptoError::ZkpError(format!(
                "{} bases for {} witness values",
                bases.len(),
                witness.len()
            )));
        }

        let nonces: Vec<Scalar> = bases.iter().map(|_| random_scalar()).collect();
        let t = combine(bases, &nonces);

        transcript.append_element(b"statement", statement);
        transcript.append_element(b"commitment", &t);
        let c = transcript.challenge_scalar(b"representation");

        let responses = nonces
            .iter()
            .zip(witness)
            .map(|(k, x)| Secret(*k + c * x))
            .collect();

        Ok(Self {
            challenge: Secret(c),
            responses,
        })
    }

    pub fn verify(&self, transcript: &mut Transcript, bases: &[G1], statement: &G1) -> bool {
        if bases.is_empty() || bases.len() != self.responses.len() {
            return false;
        }
        let c = self.challenge.0;
        let responses: Vec<Scalar> = self.responses.iter().map(|s| s.0).collect();
        let t = combine(bases, &responses) - *statement * c;

        transcript.append_element(b"statement", statement);
        transcript.append_element(b"commitment", &t);
        transcript.challenge_scalar(b"representation") == c
    }
}

//! Range proofs by bit decomposition.
//!
//! A commitment `D = d·g1 + ρ·h1` is split into 64 bit commitments
//! `B_j = b_j·g1 + ρ_j·h1` with `Σ 2^j·B_j = D`. Each `B_j` carries a
//! Cramer-Damgård-Schoenmakers OR-proof that it commits to 0 or 1, which
//! shows `d` lies in `[0, 2^64)` without revealing it.

use ark_ff::Field;
use ark_std::Zero;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::group::{g1, h1, random_scalar, Point, Scalar, Secret, G1};
use crate::transcript::Transcript;

pub const RANGE_BITS: usize = 64;

/// Commitment to a single bit plus its OR-proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitProof {
    pub commitment: Point,
    pub e0: Secret,
    pub e1: Secret,
    pub z0: Secret,
    pub z1: Secret,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeProof {
    pub bits: Vec<BitProof>,
}

fn power_of_two(j: usize) -> Scalar {
    Scalar::from(1u64 << j)
}

fn bind_statement(transcript: &mut Transcript, commitment: &G1) {
    transcript.append_element(b"range-commitment", commitment);
    transcript.append_u64(b"range-bits", RANGE_BITS as u64);
}

fn bit_challenge(
    transcript: &mut Transcript,
    j: usize,
    bit_commitment: &G1,
    a0: &G1,
    a1: &G1,
) -> Scalar {
    transcript.append_u64(b"bit", j as u64);
    transcript.append_element(b"B", bit_commitment);
    transcript.append_element(b"A0", a0);
    transcript.append_element(b"A1", a1);
    transcript.challenge_scalar(b"bit-challenge")
}

impl RangeProof {
    /// Prove that `commitment = value·g1 + blinding·h1`.
    pub fn prove(
        transcript: &mut Transcript,
        value: u64,
        blinding: &Scalar,
        commitment: &G1,
    ) -> Result<Self, CryptoError> {
        if g1() * Scalar::from(value) + h1() * blinding != *commitment {
            return Err(CryptoError::ZkpError(
                "witness does not open the commitment".into(),
            ));
        }
        bind_statement(transcript, commitment);

        let mut bit_blindings: Vec<Scalar> = (0..RANGE_BITS - 1).map(|_| random_scalar()).collect();
        let partial: Scalar = bit_blindings
            .iter()
            .enumerate()
            .map(|(j, rho)| power_of_two(j) * rho)
            .sum();
        let top_weight = power_of_two(RANGE_BITS - 1)
            .inverse()
            .ok_or_else(|| CryptoError::ZkpError("zero bit weight".into()))?;
        let top = top_weight * (*blinding - partial);
        bit_blindings.push(top);

        let mut bits = Vec::with_capacity(RANGE_BITS);
        for (j, rho) in bit_blindings.iter().enumerate() {
            let bit = (value >> j) & 1 == 1;
            let b_j = if bit { g1() + h1() * rho } else { h1() * rho };
            let y0 = b_j;
            let y1 = b_j - g1();

            let k = random_scalar();
            let (sim_e, sim_z) = (random_scalar(), random_scalar());
            let (a0, a1) = if bit {
                (h1() * sim_z - y0 * sim_e, h1() * k)
            } else {
                (h1() * k, h1() * sim_z - y1 * sim_e)
            };

            let e = bit_challenge(transcript, j, &b_j, &a0, &a1);
            let real_e = e - sim_e;
            let real_z = k + real_e * *rho;
            let (e0, e1, z0, z1) = if bit {
                (sim_e, real_e, sim_z, real_z)
            } else {
                (real_e, sim_e, real_z, sim_z)
            };

            bits.push(BitProof {
                commitment: Point(b_j),
                e0: Secret(e0),
                e1: Secret(e1),
                z0: Secret(z0),
                z1: Secret(z1),
            });
        }

        Ok(Self { bits })
    }

    pub fn verify(&self, transcript: &mut Transcript, commitment: &G1) -> bool {
        if self.bits.len() != RANGE_BITS {
            return false;
        }
        let recombined = self
            .bits
            .iter()
            .enumerate()
            .fold(G1::zero(), |acc, (j, bit)| {
                acc + bit.commitment.0 * power_of_two(j)
            });
        if recombined != *commitment {
            return false;
        }

        bind_statement(transcript, commitment);
        for (j, bit) in self.bits.iter().enumerate() {
            let y0 = bit.commitment.0;
            let y1 = y0 - g1();
            let a0 = h1() * bit.z0.0 - y0 * bit.e0.0;
            let a1 = h1() * bit.z1.0 - y1 * bit.e1.0;
            let e = bit_challenge(transcript, j, &y0, &a0, &a1);
            if bit.e0.0 + bit.e1.0 != e {
                return false;
            }
        }
        true
    }
}

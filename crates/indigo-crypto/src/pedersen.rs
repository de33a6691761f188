use serde::{Deserialize, Serialize};

use crate::group::{g1, h1, random_scalar, Point, Scalar, Secret, G1};

/// Pedersen commitment `v·g1 + r·h1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Commitment(pub Point);

impl Commitment {
    pub fn point(&self) -> G1 {
        self.0 .0
    }
}

/// Committed value and blinding factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    pub value: Secret,
    pub blinding: Secret,
}

impl Opening {
    pub fn new(value: Scalar, blinding: Scalar) -> Self {
        Self {
            value: Secret(value),
            blinding: Secret(blinding),
        }
    }

    /// Fresh blinding for `value`.
    pub fn random(value: Scalar) -> Self {
        Self::new(value, random_scalar())
    }

    pub fn commit(&self) -> Commitment {
        Commitment(Point(commit(self.value.0, self.blinding.0)))
    }

    pub fn opens(&self, commitment: &Commitment) -> bool {
        self.commit() == *commitment
    }
}

pub fn commit(value: Scalar, blinding: Scalar) -> G1 {
    g1() * value + h1() * blinding
}

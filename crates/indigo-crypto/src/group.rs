//! BN254 group elements and scalars with hex serialization.

use ark_bn254::{Bn254, Fq, G1Affine, G1Projective, G2Projective};
use ark_ec::pairing::PairingOutput;
use ark_ec::{AffineRepr, PrimeGroup};
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{UniformRand, Zero};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::sync::OnceLock;

use crate::error::CryptoError;

pub use ark_bn254::Fr as Scalar;

pub type G1 = G1Projective;
pub type G2 = G2Projective;
pub type Gt = PairingOutput<Bn254>;

pub fn g1() -> G1 {
    G1::generator()
}

pub fn g2() -> G2 {
    G2::generator()
}

/// Blinding generator for Pedersen commitments. Hashed onto the curve so
/// nobody knows log_g1(h1).
pub fn h1() -> G1 {
    static H: OnceLock<G1> = OnceLock::new();
    *H.get_or_init(|| hash_to_g1(b"pedersen generator H"))
}

/// Try-and-increment map onto G1. BN254 G1 has cofactor 1, so every curve
/// point found is in the group.
pub fn hash_to_g1(message: &[u8]) -> G1 {
    let mut counter = 0u64;
    loop {
        let mut hasher = blake3::Hasher::new_derive_key("indigo 2024 hash to bn254 g1");
        hasher.update(message);
        hasher.update(&counter.to_le_bytes());
        let mut wide = [0u8; 64];
        hasher.finalize_xof().fill(&mut wide);

        let x = Fq::from_le_bytes_mod_order(&wide[..48]);
        if let Some(point) = G1Affine::get_point_from_x_unchecked(x, wide[63] & 1 == 1) {
            let point = point.clear_cofactor().into_group();
            if !point.is_zero() {
                return point;
            }
        }
        counter += 1;
    }
}

pub fn random_scalar() -> Scalar {
    Scalar::rand(&mut rand::rngs::OsRng)
}

/// Map a signed integer into the scalar field.
pub fn scalar_from_i128(value: i128) -> Scalar {
    let magnitude = Scalar::from(value.unsigned_abs());
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Uniform scalar from wide hash output.
pub fn scalar_from_wide(bytes: &[u8; 64]) -> Scalar {
    Scalar::from_le_bytes_mod_order(bytes)
}

/// Scalar derived from a stored 32-byte secret.
pub fn scalar_from_secret(secret: &[u8; 32]) -> Scalar {
    let mut hasher = blake3::Hasher::new_derive_key("indigo 2024 secret to bn254 scalar");
    hasher.update(secret);
    let mut wide = [0u8; 64];
    hasher.finalize_xof().fill(&mut wide);
    scalar_from_wide(&wide)
}

/// Compressed canonical encoding.
pub fn canonical_bytes<T: CanonicalSerialize>(value: &T) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.compressed_size());
    // Writing into a Vec cannot fail.
    let _ = value.serialize_compressed(&mut bytes);
    bytes
}

/// Read one validated element off the front of `reader`.
pub fn read_canonical<T: CanonicalDeserialize>(
    reader: &mut &[u8],
    what: &str,
) -> Result<T, CryptoError> {
    T::deserialize_compressed(reader)
        .map_err(|e| CryptoError::InvalidInput(format!("invalid {}: {}", what, e)))
}

fn decode_hex<T: CanonicalDeserialize>(encoded: &str, what: &str) -> Result<T, CryptoError> {
    let bytes = hex::decode(encoded)
        .map_err(|e| CryptoError::InvalidInput(format!("invalid {} hex: {}", what, e)))?;
    let mut reader = bytes.as_slice();
    let value = read_canonical(&mut reader, what)?;
    if !reader.is_empty() {
        return Err(CryptoError::InvalidInput(format!("trailing bytes after {}", what)));
    }
    Ok(value)
}

macro_rules! hex_wire {
    ($name:ident, $inner:ty, $what:literal) => {
        impl $name {
            pub fn to_hex(&self) -> String {
                hex::encode(canonical_bytes(&self.0))
            }

            pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
                decode_hex(encoded, $what).map(Self)
            }
        }

        impl From<$inner> for $name {
            fn from(inner: $inner) -> Self {
                Self(inner)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let encoded = String::deserialize(deserializer)?;
                $name::from_hex(&encoded).map_err(de::Error::custom)
            }
        }
    };
}

/// G1 element, compressed hex on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point(pub G1);

/// G2 element, compressed hex on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point2(pub G2);

/// Canonical scalar, hex on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Secret(pub Scalar);

hex_wire!(Point, G1, "g1 point");
hex_wire!(Point2, G2, "g2 point");
hex_wire!(Secret, Scalar, "scalar");

//! Π_elog: proof that an ElGamal-style commitment `(A, B) = (b G, b Y + x G)`
//! was computed correctly, for public `Y`, `G` and known secrets `b`, `x`
//! (used by presignature generation to bind a nonce commitment to the
//! signer's El-Gamal key, spec §4.8).
//!
//! A two-secret sigma protocol in the same Fiat-Shamir style as
//! [`generic_ec_zkp::schnorr_pok`] (ephemeral commitment, hash challenge,
//! linear response), generalised from one secret to the pair `(b, x)`.

use generic_ec::{
    hash_to_curve::{self, FromHash},
    Curve, Point, Scalar,
};
use rand_core::{CryptoRng, RngCore};

pub struct Data<E: Curve> {
    pub y: Point<E>,
    pub a: Point<E>,
    pub b: Point<E>,
}

#[derive(Clone)]
pub struct Proof<E: Curve> {
    commit_a: Point<E>,
    commit_b: Point<E>,
    z_b: Scalar<E>,
    z_x: Scalar<E>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid hash-to-curve tag")]
    InvalidTag,
    #[error("failed to derive fiat-shamir challenge")]
    ChallengeDerivation,
    #[error("proof does not satisfy the verification equations")]
    Invalid,
}

fn challenge<E: Curve>(
    sid: &[u8],
    data: &Data<E>,
    commit_a: &Point<E>,
    commit_b: &Point<E>,
) -> Result<Scalar<E>, Error>
where
    Scalar<E>: FromHash,
{
    let tag = hash_to_curve::Tag::new(sid).ok_or(Error::InvalidTag)?;
    Scalar::<E>::hash_concat(
        tag,
        &[
            data.y.to_be_bytes().as_ref(),
            data.a.to_be_bytes().as_ref(),
            data.b.to_be_bytes().as_ref(),
            commit_a.to_be_bytes().as_ref(),
            commit_b.to_be_bytes().as_ref(),
        ],
    )
    .map_err(|_| Error::ChallengeDerivation)
}

/// Proves that `data.a = b * G` and `data.b = b * data.y + x * G` for known
/// `b`, `x`.
pub fn prove<E: Curve, R: RngCore + CryptoRng>(
    rng: &mut R,
    sid: &[u8],
    data: &Data<E>,
    b: &Scalar<E>,
    x: &Scalar<E>,
) -> Result<Proof<E>, Error>
where
    Scalar<E>: FromHash,
{
    let b_prime = Scalar::<E>::random(rng);
    let x_prime = Scalar::<E>::random(rng);
    let commit_a = Point::generator() * b_prime;
    let commit_b = data.y * b_prime + Point::generator() * x_prime;

    let e = challenge(sid, data, &commit_a, &commit_b)?;
    let z_b = b_prime + e * b;
    let z_x = x_prime + e * x;

    Ok(Proof {
        commit_a,
        commit_b,
        z_b,
        z_x,
    })
}

/// Verifies a [`Proof`].
pub fn verify<E: Curve>(sid: &[u8], data: &Data<E>, proof: &Proof<E>) -> Result<(), Error>
where
    Scalar<E>: FromHash,
{
    let e = challenge(sid, data, &proof.commit_a, &proof.commit_b)?;

    let lhs_a = Point::generator() * proof.z_b;
    let rhs_a = proof.commit_a + data.a * e;
    if lhs_a != rhs_a {
        return Err(Error::Invalid);
    }

    let lhs_b = data.y * proof.z_b + Point::generator() * proof.z_x;
    let rhs_b = proof.commit_b + data.b * e;
    if lhs_b != rhs_b {
        return Err(Error::Invalid);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use generic_ec::curves::Secp256k1;

    #[test]
    fn honest_proof_verifies() {
        let mut rng = rand_dev::DevRng::new();
        let y_secret = Scalar::<Secp256k1>::random(&mut rng);
        let y = Point::generator() * y_secret;
        let b = Scalar::<Secp256k1>::random(&mut rng);
        let x = Scalar::<Secp256k1>::random(&mut rng);
        let a = Point::generator() * b;
        let b_point = y * b + Point::generator() * x;
        let data = Data { y, a, b: b_point };

        let proof = prove(&mut rng, b"sid", &data, &b, &x).unwrap();
        verify(b"sid", &data, &proof).expect("honest proof should verify");
    }

    #[test]
    fn tampered_b_fails() {
        let mut rng = rand_dev::DevRng::new();
        let y_secret = Scalar::<Secp256k1>::random(&mut rng);
        let y = Point::generator() * y_secret;
        let b = Scalar::<Secp256k1>::random(&mut rng);
        let x = Scalar::<Secp256k1>::random(&mut rng);
        let a = Point::generator() * b;
        let wrong_b_point = y * b + Point::generator() * x + Point::generator();
        let data = Data { y, a, b: wrong_b_point };

        let proof = prove(&mut rng, b"sid", &data, &b, &x).unwrap();
        assert!(verify(b"sid", &data, &proof).is_err());
    }
}

//! Π_prm: non-interactive proof of knowledge of `lambda` such that `t = s^lambda
//! mod N`, which a party must supply alongside its ring-Pedersen parameters
//! so peers can check they weren't chosen maliciously (spec §4.3/§4.4).
//!
//! Standard sigma protocol for discrete log in an unknown-order group,
//! repeated `M` times and Fiat-Shamir'd into a single message.

use digest::Digest;
use paillier_zk::unknown_order::BigNumber;
use rand_core::{CryptoRng, RngCore};

/// Number of repetitions; each repetition contributes one challenge bit, so
/// soundness error is `2^-SECURITY`.
pub const SECURITY: usize = 80;

/// Public statement: the ring-Pedersen parameters being proven well-formed.
pub struct Data<'a> {
    pub n: &'a BigNumber,
    pub s: &'a BigNumber,
    pub t: &'a BigNumber,
}

#[derive(Debug, Clone)]
pub struct Proof<const M: usize> {
    commitments: [BigNumber; M],
    challenge: [bool; M],
    responses: [BigNumber; M],
}

fn derive_challenge<D: Digest, const M: usize>(
    shared_state: D,
    data: &Data<'_>,
    commitments: &[BigNumber; M],
) -> [bool; M] {
    let mut hasher = shared_state;
    hasher.update(data.n.to_bytes());
    hasher.update(data.s.to_bytes());
    hasher.update(data.t.to_bytes());
    for a in commitments {
        hasher.update(a.to_bytes());
    }
    let digest = hasher.finalize();
    let mut bits = [false; M];
    for (i, bit) in bits.iter_mut().enumerate() {
        let byte = digest[i % digest.len()];
        *bit = (byte >> (i % 8)) & 1 == 1;
    }
    bits
}

/// Proves knowledge of `lambda` with `t = s^lambda mod N`, where `phi_n =
/// (p-1)(q-1)` is the (secret) order of the multiplicative group.
pub fn prove<D: Digest, R: RngCore + CryptoRng, const M: usize>(
    shared_state: D,
    rng: &mut R,
    data: Data<'_>,
    phi_n: &BigNumber,
    lambda: &BigNumber,
) -> Proof<M> {
    let exps: Vec<BigNumber> = (0..M).map(|_| BigNumber::from_rng(phi_n, rng)).collect();
    let commitments: [BigNumber; M] = core::array::from_fn(|i| {
        data.s
            .powmod(&exps[i], data.n)
            .unwrap_or_else(|_| BigNumber::one())
    });
    let challenge = derive_challenge(shared_state, &data, &commitments);
    let responses: [BigNumber; M] = core::array::from_fn(|i| {
        if challenge[i] {
            (&exps[i] + lambda) % phi_n
        } else {
            exps[i].clone()
        }
    });
    Proof {
        commitments,
        challenge,
        responses,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("challenge recomputed from the transcript doesn't match the proof")]
    ChallengeMismatch,
    #[error("response {0} doesn't satisfy s^z = A t^e (mod N)")]
    BadResponse(usize),
}

/// Verifies a [`Proof`] against the public `Data`.
pub fn verify<D: Digest, const M: usize>(
    shared_state: D,
    data: Data<'_>,
    proof: &Proof<M>,
) -> Result<(), VerificationError> {
    let expected_challenge = derive_challenge(shared_state, &data, &proof.commitments);
    if expected_challenge != proof.challenge {
        return Err(VerificationError::ChallengeMismatch);
    }
    for i in 0..M {
        let lhs = data
            .s
            .powmod(&proof.responses[i], data.n)
            .map_err(|_| VerificationError::BadResponse(i))?;
        let rhs = if proof.challenge[i] {
            lhs_expected(data.n, &proof.commitments[i], data.t)
        } else {
            proof.commitments[i].clone()
        };
        if lhs != rhs {
            return Err(VerificationError::BadResponse(i));
        }
    }
    Ok(())
}

fn lhs_expected(n: &BigNumber, a: &BigNumber, t: &BigNumber) -> BigNumber {
    (a * t) % n
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Sha256;

    fn sample_instance(rng: &mut rand_dev::DevRng) -> (BigNumber, BigNumber, BigNumber, BigNumber, BigNumber) {
        let p = BigNumber::safe_prime_from_rng(256, rng);
        let q = BigNumber::safe_prime_from_rng(256, rng);
        let n = &p * &q;
        let phi_n = (&p - 1) * (&q - 1);
        let r = BigNumber::from_rng(&n, rng);
        let lambda = BigNumber::from_rng(&phi_n, rng);
        let s = r.modmul(&r, &n);
        let t = s.powmod(&lambda, &n).unwrap();
        (n, phi_n, s, t, lambda)
    }

    #[test]
    fn honestly_generated_proof_verifies() {
        let mut rng = rand_dev::DevRng::new();
        let (n, phi_n, s, t, lambda) = sample_instance(&mut rng);
        let data = Data { n: &n, s: &s, t: &t };
        let proof = prove::<_, _, 16>(Sha256::new(), &mut rng, Data { n: &n, s: &s, t: &t }, &phi_n, &lambda);
        verify::<_, 16>(Sha256::new(), data, &proof).expect("honest proof should verify");
    }

    #[test]
    fn wrong_lambda_is_rejected() {
        let mut rng = rand_dev::DevRng::new();
        let (n, phi_n, s, t, _lambda) = sample_instance(&mut rng);
        let wrong_lambda = BigNumber::from_rng(&phi_n, &mut rng);
        let data = Data { n: &n, s: &s, t: &t };
        let proof = prove::<_, _, 16>(
            Sha256::new(),
            &mut rng,
            Data { n: &n, s: &s, t: &t },
            &phi_n,
            &wrong_lambda,
        );
        assert!(verify::<_, 16>(Sha256::new(), data, &proof).is_err());
    }
}

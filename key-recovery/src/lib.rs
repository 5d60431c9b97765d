//! Private-key recovery from a threshold of Birkhoff key shares (spec
//! §4.11): given `≥ t` `(share, bk)` pairs and the claimed public key,
//! recombine the private key and check it against the claim.

use generic_ec::{Curve, Point, Scalar, SecretScalar};
use thiserror::Error;
use tss_core::BkParameter;

/// Recombines `shares` (at least `t` of them) via their Birkhoff
/// coefficients and checks the result against `claimed_pubkey`.
///
/// `compute_bk_coefficient` returns coefficients in its own `(rank, x)`
/// sorted order, not the caller's; sort-then-unpermute like every other
/// call site in this workspace so `lambdas[k]` lines up with `shares[k]`.
///
/// Every supplied `BkParameter` carries its real rank from key generation
/// (spec §4.1); unlike a rank-0-only recombination, this correctly recovers
/// keys shared at ranks above 0, not only plain Shamir shares.
pub fn recover_private_key<E: Curve>(
    shares: &[(Scalar<E>, BkParameter<E>)],
    t: usize,
    claimed_pubkey: Point<E>,
) -> Result<SecretScalar<E>, RecoveryError> {
    if shares.len() < t {
        return Err(RecoveryError::NotEnoughShares);
    }

    let bks: Vec<BkParameter<E>> = shares.iter().map(|(_, bk)| *bk).collect();
    let mut order: Vec<usize> = (0..bks.len()).collect();
    order.sort_by(|&a, &b| {
        bks[a]
            .rank
            .cmp(&bks[b].rank)
            .then_with(|| bks[a].x.to_be_bytes().cmp(&bks[b].x.to_be_bytes()))
    });
    let sorted_bks: Vec<_> = order.iter().map(|&i| bks[i]).collect();
    let lambdas_sorted = tss_core::compute_bk_coefficient(&sorted_bks, t)
        .map_err(RecoveryError::Birkhoff)?;
    let mut lambdas = vec![Scalar::<E>::zero(); bks.len()];
    for (pos, &orig_idx) in order.iter().take(t).enumerate() {
        lambdas[orig_idx] = lambdas_sorted[pos];
    }

    let mut private = Scalar::<E>::zero();
    for (idx, (share, _)) in shares.iter().enumerate() {
        private = private + lambdas[idx] * share;
    }
    let mut private = SecretScalar::new(&mut { private });

    if Point::generator() * &private != claimed_pubkey {
        return Err(RecoveryError::PubKeyMismatch);
    }

    Ok(private)
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("fewer shares supplied than the threshold")]
    NotEnoughShares,
    #[error("failed to compute birkhoff coefficients for the supplied shares")]
    Birkhoff(#[source] tss_core::BirkhoffError),
    #[error("recombined private key doesn't match the claimed public key")]
    PubKeyMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use generic_ec::{curves::Secp256k1, Point, Scalar};

    fn poly_eval(coeffs: &[Scalar<Secp256k1>], x: Scalar<Secp256k1>) -> Scalar<Secp256k1> {
        let mut acc = Scalar::zero();
        let mut pow = Scalar::from(1u32);
        for c in coeffs {
            acc = acc + *c * pow;
            pow = pow * x;
        }
        acc
    }

    #[test]
    fn recovers_plain_shamir_shares() {
        let mut rng = rand_dev::DevRng::new();
        let coeffs = vec![
            Scalar::<Secp256k1>::random(&mut rng),
            Scalar::<Secp256k1>::random(&mut rng),
            Scalar::<Secp256k1>::random(&mut rng),
        ];
        let secret = coeffs[0];
        let pubkey = Point::generator() * secret;

        let shares: Vec<_> = (1..=4u64)
            .map(|x| {
                let x = Scalar::<Secp256k1>::from(x);
                let bk = BkParameter::new(x, 0);
                (poly_eval(&coeffs, x), bk)
            })
            .collect();

        let recovered = recover_private_key(&shares, 3, pubkey).expect("recovers");
        assert_eq!(recovered.as_ref(), &secret);
    }

    #[test]
    fn rejects_mismatched_pubkey() {
        let mut rng = rand_dev::DevRng::new();
        let coeffs = vec![
            Scalar::<Secp256k1>::random(&mut rng),
            Scalar::<Secp256k1>::random(&mut rng),
        ];
        let shares: Vec<_> = (1..=3u64)
            .map(|x| {
                let x = Scalar::<Secp256k1>::from(x);
                (poly_eval(&coeffs, x), BkParameter::new(x, 0))
            })
            .collect();
        let wrong_pubkey = Point::generator() * Scalar::<Secp256k1>::random(&mut rng);
        assert!(matches!(
            recover_private_key(&shares, 2, wrong_pubkey),
            Err(RecoveryError::PubKeyMismatch)
        ));
    }
}

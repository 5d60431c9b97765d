//! Single-point-of-failure ("spof") centralized key generation.
//!
//! Useful for tests and for bootstrapping a key outside of a live DKG
//! session. Never use this in production: whoever runs it learns the whole
//! private key.

use generic_ec::{hash_to_curve::FromHash, Curve, Point, Scalar, SecretScalar};
use rand_core::{CryptoRng, RngCore};
use tss_core::{BkParameter, Polynomial};

use crate::{security_level::SecurityLevel, IncompleteKeyShare};

/// Centrally generates `n` plain-Shamir (rank 0) incomplete key shares for a
/// `t`-out-of-`n` scheme, from a freshly sampled secret key.
pub fn mock_keygen<E, L, R>(
    rng: &mut R,
    t: u16,
    n: u16,
) -> Vec<IncompleteKeyShare<E, L>>
where
    E: Curve,
    Scalar<E>: FromHash,
    L: SecurityLevel,
    R: RngCore + CryptoRng,
{
    let secret = Scalar::<E>::random(rng);
    mock_keygen_from_secret(rng, t, n, secret)
}

/// As [`mock_keygen`], but the shared secret key is supplied rather than
/// sampled (useful for reproducing literal test vectors such as spec §8 S4,
/// where the secret is fixed to `1`).
pub fn mock_keygen_from_secret<E, L, R>(
    rng: &mut R,
    t: u16,
    n: u16,
    secret: Scalar<E>,
) -> Vec<IncompleteKeyShare<E, L>>
where
    E: Curve,
    L: SecurityLevel,
    R: RngCore + CryptoRng,
{
    let poly: Polynomial<E> = Polynomial::sample_with_const_term(rng, usize::from(t) - 1, secret);
    let bks: Vec<BkParameter<E>> = (1..=n)
        .map(|x| BkParameter::new(Scalar::from(u32::from(x)), 0))
        .collect();
    let public_shares: Vec<Point<E>> = bks
        .iter()
        .map(|bk| Point::generator() * poly.evaluate(&bk.x))
        .collect();
    let shared_public_key = Point::generator() * secret;

    let mut rid = L::Rid::default();
    rng.fill_bytes(rid.as_mut());

    (0..n)
        .map(|i| {
            let mut x = poly.evaluate(&bks[usize::from(i)].x);
            IncompleteKeyShare {
                i,
                b: bks[usize::from(i)],
                shared_public_key,
                rid: rid.clone(),
                bks: bks.clone(),
                public_shares: public_shares.clone(),
                x: SecretScalar::new(&mut x),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use generic_ec::curves::Secp256k1;
    use key_share_security_level_for_tests::Test128;

    mod key_share_security_level_for_tests {
        use crate::security_level::SecurityLevel;
        use libpaillier::unknown_order::BigNumber;

        #[derive(Clone)]
        pub struct Test128;
        #[derive(Clone, Debug, Default, PartialEq, Eq)]
        pub struct Rid([u8; 16]);
        impl AsRef<[u8]> for Rid {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
        impl AsMut<[u8]> for Rid {
            fn as_mut(&mut self) -> &mut [u8] {
                &mut self.0
            }
        }
        impl SecurityLevel for Test128 {
            const SECURITY_BITS: u32 = 128;
            const SECURITY_BYTES: usize = 16;
            const ELL: usize = 128;
            const EPSILON: usize = 128;
            const ELL_PRIME: usize = 512;
            type Rid = Rid;
            fn q() -> BigNumber {
                BigNumber::one() << 128
            }
        }
    }

    #[test]
    fn mock_shares_reconstruct_and_validate() {
        let mut rng = rand_dev::DevRng::new();
        let shares = mock_keygen::<Secp256k1, Test128, _>(&mut rng, 3, 5);
        assert_eq!(shares.len(), 5);
        for share in &shares {
            share.validate().expect("mock share should validate");
        }
    }
}

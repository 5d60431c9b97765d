//! Centralized ("trusted dealer") key generation: skips the DKG and
//! key-refresh protocols and produces complete, ready-to-sign key shares
//! directly. Useful for tests and benchmarks. Never use this in production:
//! whoever runs it learns the whole private key.

use generic_ec::{hash_to_curve::FromHash, Curve, Point, Scalar, SecretScalar};
use key_share::{security_level::SecurityLevel, InvalidKeyShare, KeyShare, PartyAux, Valid};
use rand_core::{CryptoRng, RngCore};
use thiserror::Error;
use tss_paillier::{ring_pedersen, InvalidPrimes, PaillierKeyPair, PregeneratedPrimes};

/// Centrally generates `n` complete, `n`-out-of-`n` key shares: plain-Shamir
/// (rank 0) signing shares plus freshly generated Paillier/ring-Pedersen
/// auxiliary data for every party.
pub fn mock_keygen<E, L, R>(
    rng: &mut R,
    n: u16,
) -> Result<Vec<Valid<KeyShare<E, L>>>, MockKeygenError>
where
    E: Curve,
    Scalar<E>: FromHash,
    L: SecurityLevel,
    R: RngCore + CryptoRng,
{
    let core_shares = key_share::trusted_dealer::mock_keygen::<E, L, _>(rng, n, n);

    let mut primes = Vec::with_capacity(core_shares.len());
    let mut parties = Vec::with_capacity(core_shares.len());
    let mut els = Vec::with_capacity(core_shares.len());
    for _ in &core_shares {
        let keypair = PaillierKeyPair::from_primes(PregeneratedPrimes::<L>::generate(rng))?;
        let rp = ring_pedersen::generate(rng, &keypair);
        let y = Scalar::<E>::random(rng);
        parties.push(PartyAux {
            N: keypair.n.clone(),
            s: rp.params.s,
            t: rp.params.t,
            Y: Point::generator() * y,
        });
        primes.push((keypair.p, keypair.q));
        els.push(y);
    }

    core_shares
        .into_iter()
        .zip(primes)
        .zip(els)
        .map(|((core, (p, q)), mut y)| {
            KeyShare {
                core,
                p,
                q,
                y: SecretScalar::new(&mut y),
                parties: parties.clone(),
            }
            .try_into()
            .map_err(MockKeygenError::InvalidShare)
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum MockKeygenError {
    #[error("generated paillier primes were invalid")]
    InvalidPrimes(#[from] InvalidPrimes),
    #[error("generated key share was invalid")]
    InvalidShare(#[source] InvalidKeyShare),
}

#[cfg(test)]
mod tests {
    use super::*;
    use generic_ec::curves::Secp256k1;
    use key_share::security_level::ReasonablySecure;

    #[test]
    fn mock_shares_reconstruct_and_validate() {
        let mut rng = rand_dev::DevRng::new();
        let shares = mock_keygen::<Secp256k1, ReasonablySecure, _>(&mut rng, 3).unwrap();
        assert_eq!(shares.len(), 3);
        for share in &shares {
            share.validate().expect("mock share should validate");
        }
    }
}

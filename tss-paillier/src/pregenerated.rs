//! Slow safe-prime generation, split out so it can be precomputed ahead of
//! an actual protocol run (spec §4.3 notes this is the dominant cost of
//! DKG/reshare).

use key_share::SecurityLevel;
use paillier_zk::unknown_order::BigNumber;
use rand_core::RngCore;

/// A pair of safe primes `p`, `q` generated ahead of time, for a security
/// level `L`.
#[derive(Clone)]
pub struct PregeneratedPrimes<L> {
    p: BigNumber,
    q: BigNumber,
    _security_level: core::marker::PhantomData<L>,
}

impl<L: SecurityLevel> PregeneratedPrimes<L> {
    pub fn new(p: BigNumber, q: BigNumber) -> Self {
        Self {
            p,
            q,
            _security_level: core::marker::PhantomData,
        }
    }

    pub fn split(self) -> (BigNumber, BigNumber) {
        (self.p, self.q)
    }

    /// Generates two `4 * SECURITY_BITS`-bit safe primes. Takes a long time.
    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        Self {
            p: BigNumber::safe_prime_from_rng(4 * L::SECURITY_BITS, rng),
            q: BigNumber::safe_prime_from_rng(4 * L::SECURITY_BITS, rng),
            _security_level: core::marker::PhantomData,
        }
    }
}

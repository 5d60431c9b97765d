//! Paillier keypair wrapper: a decryption key plus the derived encryption
//! key, built from a pair of pregenerated safe primes (spec §4.3).

use generic_ec::{Curve, Scalar};
use paillier_zk::{
    libpaillier,
    libpaillier::EncryptionKey,
    unknown_order::BigNumber,
    BigNumberExt, SafePaillierDecryptionExt, SafePaillierEncryptionExt,
};
use rand_core::RngCore;
use thiserror::Error;

use crate::pregenerated::PregeneratedPrimes;

/// A Paillier keypair: `N = p q`, the decryption key derived from `p`, `q`,
/// and the matching encryption key.
#[derive(Clone)]
pub struct PaillierKeyPair {
    pub p: BigNumber,
    pub q: BigNumber,
    pub n: BigNumber,
    dec: libpaillier::DecryptionKey,
}

#[derive(Debug, Error)]
#[error("`p`, `q` don't form a valid paillier key pair")]
pub struct InvalidPrimes;

impl PaillierKeyPair {
    pub fn from_primes<L>(primes: PregeneratedPrimes<L>) -> Result<Self, InvalidPrimes> {
        let (p, q) = primes.split();
        Self::from_pq(p, q)
    }

    pub fn from_pq(p: BigNumber, q: BigNumber) -> Result<Self, InvalidPrimes> {
        let n = &p * &q;
        let dec = libpaillier::DecryptionKey::with_primes_unchecked(&p, &q).ok_or(InvalidPrimes)?;
        Ok(Self { p, q, n, dec })
    }

    pub fn encryption_key(&self) -> &libpaillier::EncryptionKey {
        self.dec.encryption_key()
    }

    /// `phi(N) = (p - 1)(q - 1)`
    pub fn phi_n(&self) -> BigNumber {
        (&self.p - 1) * (&self.q - 1)
    }

    /// Encrypts `m` under a freshly sampled nonce, returning the ciphertext
    /// and the nonce used. `None` on the (vanishingly rare) case that `m` is
    /// outside the plaintext space.
    pub fn encrypt_with_random<R: RngCore>(
        &self,
        rng: &mut R,
        m: &BigNumber,
    ) -> Option<(BigNumber, BigNumber)> {
        let nonce = BigNumber::from_rng(self.encryption_key().n(), rng);
        let c = self.encryption_key().encrypt_with(m, &nonce).ok()?;
        Some((c, nonce))
    }

    pub fn decrypt(&self, ciphertext: &BigNumber) -> Option<BigNumber> {
        self.dec.decrypt_to_bigint(ciphertext).ok()
    }
}

/// Samples `x <- Z^*_N`.
pub fn sample_bigint_in_mult_group<R: RngCore>(rng: &mut R, n: &BigNumber) -> BigNumber {
    loop {
        let x = BigNumber::from_rng(n, rng);
        if x.gcd(n) == BigNumber::one() {
            break x;
        }
    }
}

/// Constructs an `EncryptionKey` from `N = p * q` alone, for a peer whose
/// primes we don't know.
pub fn encryption_key_from_n(n: &BigNumber) -> EncryptionKey {
    #[allow(clippy::expect_used)]
    EncryptionKey::from_bytes(n.to_bytes()).expect("`from_bytes` should never fail")
}

/// Converts a scalar to its big-endian `BigNumber` representation, for
/// Paillier-encrypting a share.
pub fn scalar_to_bignumber<E: Curve>(scalar: impl AsRef<Scalar<E>>) -> BigNumber {
    BigNumber::from_slice(scalar.as_ref().to_be_bytes())
}

/// Rounded-down integer square root, found by binary search. Used to bound
/// `N`'s square root for the Π_fac range proof.
pub fn sqrt(x: &BigNumber) -> BigNumber {
    let mut low = BigNumber::one();
    let mut high = x.clone();
    while low < &high - 1 {
        let mid = (&high + &low) / 2;
        let test: BigNumber = &mid * &mid;
        match test.cmp(x) {
            core::cmp::Ordering::Equal => return mid,
            core::cmp::Ordering::Less => low = mid,
            core::cmp::Ordering::Greater => high = mid,
        }
    }
    low
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pregenerated::PregeneratedPrimes;
    use key_share::security_level::ReasonablySecure;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let mut rng = rand_dev::DevRng::new();
        let primes = PregeneratedPrimes::<ReasonablySecure>::generate(&mut rng);
        let keypair = PaillierKeyPair::from_primes(primes).expect("valid primes");
        let m = BigNumber::from(42u32);
        let (c, _nonce) = keypair.encrypt_with_random(&mut rng, &m).expect("m in range");
        let decrypted = keypair.decrypt(&c).expect("valid ciphertext");
        assert_eq!(decrypted, m);
    }
}

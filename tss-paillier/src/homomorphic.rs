//! Paillier's additive homomorphism: `Dec(c1 * c2 mod N^2) = Dec(c1) + Dec(c2)`
//! and `Dec(c^k mod N^2) = k * Dec(c)` (spec §4.3). MtA share conversion in
//! signing builds on these two operations alone.

use paillier_zk::{libpaillier::EncryptionKey, unknown_order::BigNumber};

fn n_squared(enc: &EncryptionKey) -> BigNumber {
    enc.n() * enc.n()
}

/// `c1 (+) c2`, i.e. a ciphertext decrypting to the sum of the two plaintexts.
pub fn add_ciphertexts(enc: &EncryptionKey, c1: &BigNumber, c2: &BigNumber) -> BigNumber {
    (c1 * c2) % n_squared(enc)
}

/// `k (*) c`, i.e. a ciphertext decrypting to `k` times the plaintext.
/// `None` on the (vanishingly rare) case that the modular exponentiation
/// fails; callers must not silently treat that as an encryption of zero.
pub fn scalar_mul_ciphertext(enc: &EncryptionKey, c: &BigNumber, k: &BigNumber) -> Option<BigNumber> {
    c.powmod(k, &n_squared(enc)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::PaillierKeyPair;
    use crate::pregenerated::PregeneratedPrimes;
    use key_share::security_level::ReasonablySecure;

    #[test]
    fn add_then_decrypt_sums_plaintexts() {
        let mut rng = rand_dev::DevRng::new();
        let primes = PregeneratedPrimes::<ReasonablySecure>::generate(&mut rng);
        let kp = PaillierKeyPair::from_primes(primes).expect("valid primes");
        let (c1, _) = kp
            .encrypt_with_random(&mut rng, &BigNumber::from(11u32))
            .expect("in range");
        let (c2, _) = kp
            .encrypt_with_random(&mut rng, &BigNumber::from(31u32))
            .expect("in range");
        let sum = add_ciphertexts(kp.encryption_key(), &c1, &c2);
        assert_eq!(kp.decrypt(&sum).expect("valid ciphertext"), BigNumber::from(42u32));
    }

    #[test]
    fn scalar_mul_then_decrypt_scales_plaintext() {
        let mut rng = rand_dev::DevRng::new();
        let primes = PregeneratedPrimes::<ReasonablySecure>::generate(&mut rng);
        let kp = PaillierKeyPair::from_primes(primes).expect("valid primes");
        let (c, _) = kp
            .encrypt_with_random(&mut rng, &BigNumber::from(6u32))
            .expect("in range");
        let scaled = scalar_mul_ciphertext(kp.encryption_key(), &c, &BigNumber::from(7u32))
            .expect("exponent in range");
        assert_eq!(kp.decrypt(&scaled).expect("valid ciphertext"), BigNumber::from(42u32));
    }
}

//! Ring-Pedersen parameters `(N, s, t)` derived from the same safe primes as
//! a party's Paillier key, plus the trapdoor `lambda` needed to prove
//! knowledge of them (Π_prm, spec §4.3/§4.4).

use paillier_zk::unknown_order::BigNumber;
use rand_core::RngCore;

use crate::keypair::{sample_bigint_in_mult_group, PaillierKeyPair};

/// Public ring-Pedersen parameters, shared with every other party.
#[derive(Debug, Clone)]
pub struct RingPedersenParams {
    pub n: BigNumber,
    pub s: BigNumber,
    pub t: BigNumber,
}

/// Ring-Pedersen parameters plus the trapdoor `lambda` such that `t = s^lambda
/// mod N`, kept by the party that generated them to prove Π_prm.
pub struct RingPedersenSecrets {
    pub params: RingPedersenParams,
    pub lambda: BigNumber,
}

/// Generates ring-Pedersen parameters over the same `N = p q` as `keypair`.
pub fn generate<R: RngCore>(rng: &mut R, keypair: &PaillierKeyPair) -> RingPedersenSecrets {
    let phi_n = keypair.phi_n();
    let r = sample_bigint_in_mult_group(rng, &keypair.n);
    let lambda = BigNumber::from_rng(&phi_n, rng);
    let t = r.modmul(&r, &keypair.n);
    let s = t
        .powmod(&lambda, &keypair.n)
        .expect("powmod over phi(N)-bounded exponent is always defined");
    RingPedersenSecrets {
        params: RingPedersenParams {
            n: keypair.n.clone(),
            s,
            t,
        },
        lambda,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pregenerated::PregeneratedPrimes;
    use key_share::security_level::ReasonablySecure;

    #[test]
    fn generated_params_satisfy_t_eq_s_pow_lambda() {
        let mut rng = rand_dev::DevRng::new();
        let primes = PregeneratedPrimes::<ReasonablySecure>::generate(&mut rng);
        let keypair = PaillierKeyPair::from_primes(primes).expect("valid primes");
        let secrets = generate(&mut rng, &keypair);
        let recomputed = secrets
            .params
            .s
            .powmod(&secrets.lambda, &secrets.params.n)
            .unwrap();
        assert_eq!(recomputed, secrets.params.t);
    }
}

//! Paillier keypairs and ring-Pedersen parameters shared by the DKG, reshare
//! and ECDSA signing protocols.

pub mod homomorphic;
pub mod keypair;
pub mod pregenerated;
pub mod ring_pedersen;

pub use homomorphic::{add_ciphertexts, scalar_mul_ciphertext};
pub use keypair::{
    encryption_key_from_n, sample_bigint_in_mult_group, scalar_to_bignumber, sqrt, InvalidPrimes,
    PaillierKeyPair,
};
pub use pregenerated::PregeneratedPrimes;
pub use ring_pedersen::{RingPedersenParams, RingPedersenSecrets};

pub use paillier_zk;
pub use paillier_zk::libpaillier;

//! Zero-knowledge proof battery for threshold ECDSA: re-exports the
//! paillier-zk proof suite under short aliases matching the CGGMP21 paper's
//! naming, plus local proofs the paper needs that aren't in `paillier-zk`
//! (Π_prm ring-Pedersen parameters, Π_elog ElGamal consistency).

pub mod elog;
pub mod ring_pedersen_parameters;

pub use generic_ec_zkp::schnorr_pok;

pub use paillier_zk::{
    group_element_vs_paillier_encryption_in_range as log_star,
    no_small_factor::non_interactive as no_small_factor, paillier_affine_operation_in_range as aff_g,
    paillier_blum_modulus as mod_proof, paillier_encryption_in_range as enc,
};

pub use paillier_zk::{libpaillier, unknown_order, BigNumberExt};

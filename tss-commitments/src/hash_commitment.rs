//! Thin wrapper around [`generic_ec_zkp::hash_commitment`] binding a
//! commitment to a session id and a peer's bk parameter, per spec §4.2:
//! `commitment = H(sid || peer_bk || salt || msg)`.

use digest::Digest;
use generic_ec::{Curve, Scalar};
use generic_ec_zkp::hash_commitment::{self, HashCommit};
use rand_core::{CryptoRng, RngCore};

/// Commits to an arbitrary byte message, bound to a session id and the
/// committing party's bk parameter (its evaluation point and rank).
pub fn commit<E: Curve, D: Digest, R: RngCore + CryptoRng>(
    rng: &mut R,
    sid: &[u8],
    peer_x: &Scalar<E>,
    peer_rank: u8,
    msg: &[u8],
) -> (HashCommit<D>, hash_commitment::DecommitNonce<D>) {
    HashCommit::<D>::builder()
        .mix_bytes(sid)
        .mix_bytes(peer_x.to_be_bytes())
        .mix(peer_rank)
        .mix_bytes(msg)
        .commit(rng)
}

/// Verifies a previously produced commitment against the revealed message
/// and decommitment nonce.
pub fn verify<E: Curve, D: Digest>(
    sid: &[u8],
    peer_x: &Scalar<E>,
    peer_rank: u8,
    msg: &[u8],
    commitment: &HashCommit<D>,
    decommit: &hash_commitment::DecommitNonce<D>,
) -> Result<(), impl core::fmt::Debug> {
    HashCommit::<D>::builder()
        .mix_bytes(sid)
        .mix_bytes(peer_x.to_be_bytes())
        .mix(peer_rank)
        .mix_bytes(msg)
        .verify(commitment, decommit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use generic_ec::curves::Secp256k1;
    use sha2::Sha256;

    #[test]
    fn commit_then_verify_succeeds() {
        let mut rng = rand_dev::DevRng::new();
        let x = Scalar::<Secp256k1>::from(7u32);
        let (commitment, decommit) = commit::<_, Sha256, _>(&mut rng, b"sid", &x, 0, b"hello");
        verify::<Secp256k1, Sha256>(b"sid", &x, 0, b"hello", &commitment, &decommit)
            .expect("matching decommitment should verify");
    }

    #[test]
    fn tampered_message_fails_verification() {
        let mut rng = rand_dev::DevRng::new();
        let x = Scalar::<Secp256k1>::from(7u32);
        let (commitment, decommit) = commit::<_, Sha256, _>(&mut rng, b"sid", &x, 0, b"hello");
        assert!(
            verify::<Secp256k1, Sha256>(b"sid", &x, 0, b"goodbye", &commitment, &decommit).is_err()
        );
    }
}

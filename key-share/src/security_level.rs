//! Compile-time security parameters.
//!
//! `SecurityLevel` is the compile-time configuration surface shared by every
//! protocol: it fixes the byte-length of the randomness/session tag (`Rid`),
//! the bit-length of generated Paillier primes, and the Π_enc/Π_aff-g/Π_log*
//! statistical security parameters `ELL`/`EPSILON`/`q()`.

use libpaillier::unknown_order::BigNumber;

/// A security level determines sizes of primes, security parameters of
/// proofs, etc.
///
/// Cryptographic assumptions for the currently implemented protocols don't
/// depend on any particular security level; the choice only trades off
/// runtime for the bound on the adversary's success probability.
pub trait SecurityLevel: Clone + Send + Sync + 'static {
    /// Security level expressed in bits, used for e.g. Paillier prime generation.
    const SECURITY_BITS: u32;
    /// [`SECURITY_BITS`](Self::SECURITY_BITS), in bytes.
    const SECURITY_BYTES: usize;

    /// Bit length of a plaintext that range proofs (Π_enc, Π_aff-g) bound.
    const ELL: usize;
    /// Epsilon parameter for range proofs challenges.
    const EPSILON: usize;
    /// Bit length of plaintext that's used in a group-vs-paillier range proof (Π_log*).
    const ELL_PRIME: usize;

    /// Randomness/session tag: `rid` in the CGGMP21 paper, XORed across all
    /// parties at DKG/reshare to produce a common session-binding tag.
    type Rid: AsRef<[u8]> + AsMut<[u8]> + Default + Clone + Send + Sync + 'static;

    /// A bound used by Π_enc/Π_aff-g/Π_log* (roughly, the order of the curve).
    fn q() -> BigNumber;
}

/// Default security level: 384-bit primes, matches the CGGMP21 paper's
/// suggested parameters. Uses a 32-byte rid (same as a SHA256 digest size).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReasonablySecure;

/// 32-byte rid newtype implementing `AsRef<[u8]>`/`AsMut<[u8]>`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rid32(pub [u8; 32]);
impl AsRef<[u8]> for Rid32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
impl AsMut<[u8]> for Rid32 {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl SecurityLevel for ReasonablySecure {
    const SECURITY_BITS: u32 = 384;
    const SECURITY_BYTES: usize = 48;
    const ELL: usize = 256;
    const EPSILON: usize = 320;
    const ELL_PRIME: usize = 848;

    type Rid = Rid32;

    fn q() -> BigNumber {
        // Conservative bound used by range proofs; matches the CGGMP21
        // reference parameters (2^256). Range proofs only need an upper
        // bound on the secret, not the exact group order, so this is
        // curve-agnostic on purpose.
        BigNumber::one() << 256
    }
}

//! Shared fixtures for the scenario tests in `tests/`.

use key_share::security_level::SecurityLevel;
use paillier_zk::unknown_order::BigNumber;

/// A 128-bit security level, traded down from
/// [`key_share::security_level::ReasonablySecure`]'s 384 bits so that the
/// safe-prime generation a key refresh needs stays fast enough to run in
/// every scenario test rather than against a handful of precomputed keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fast128;

/// 16-byte rid newtype implementing `AsRef<[u8]>`/`AsMut<[u8]>`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rid16(pub [u8; 16]);

impl AsRef<[u8]> for Rid16 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Rid16 {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl SecurityLevel for Fast128 {
    const SECURITY_BITS: u32 = 128;
    const SECURITY_BYTES: usize = 16;
    const ELL: usize = 128;
    const EPSILON: usize = 128;
    const ELL_PRIME: usize = 512;

    type Rid = Rid16;

    fn q() -> BigNumber {
        BigNumber::one() << 128
    }
}

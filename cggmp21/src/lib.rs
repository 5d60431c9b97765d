//! Threshold ECDSA signing (CGGMP21): distributed key generation, proactive
//! key refresh, and multi-party signing, built on the Birkhoff-generalised
//! key shares in [`key_share`].
//!
//! - [`keygen`] (re-exported from `cggmp21-keygen`) runs the DKG.
//! - [`key_refresh`] turns a DKG output into a [`key_share::KeyShare`] by
//!   generating Paillier/ring-Pedersen auxiliary data, or refreshes an
//!   existing one.
//! - [`sign`] runs the multiplicative-to-additive presignature and signing
//!   rounds against a complete key share.

pub mod key_refresh;
pub mod sign;

#[cfg(feature = "spof")]
pub mod trusted_dealer;

/// Curves this workspace builds `generic-ec` support for, gated behind the
/// matching `curve-*` feature on [`generic_ec`].
pub mod supported_curves {
    #[cfg(feature = "curve-secp256k1")]
    pub use generic_ec::curves::Secp256k1;
    #[cfg(feature = "curve-secp256r1")]
    pub use generic_ec::curves::Secp256r1;
    #[cfg(feature = "curve-stark")]
    pub use generic_ec::curves::Stark;
}

pub use key_share::{self, security_level, IncompleteKeyShare, KeyShare, SecurityLevel, Valid};

pub use cggmp21_keygen::{self as keygen, KeygenBuilder};

pub use tss_core::BkParameter;
pub use tss_engine::{ExecutionId, ProtocolChoice};

pub use key_refresh::{KeyRefreshBuilder, KeyRefreshError, PregeneratedPrimes};
pub use sign::{Signature, SigningBuilder, SigningError};

pub use generic_ec;
pub use round_based;

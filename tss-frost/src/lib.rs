//! FROST (Flexible Round-Optimized Schnorr Threshold signatures), two
//! rounds, generic over any `generic_ec::Curve` (spec §4.9). Built on the
//! same Birkhoff-generalised [`key_share::IncompleteKeyShare`] the rest of
//! the workspace uses — FROST needs no Paillier/ring-Pedersen auxiliary
//! data, so the plain core share is enough.

pub mod sign;

pub use sign::{FrostSigningBuilder, FrostSigningError, Signature};

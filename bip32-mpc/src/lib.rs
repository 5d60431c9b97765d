//! Two-party BIP-32 hardened child-key derivation under threshold (spec
//! §4.10). Alice and Bob hold additive shares of a parent private key;
//! HMAC-SHA512 is evaluated as a boolean circuit under Yao garbled
//! circuits with 1-out-of-2 OT extension ([`ot_gc`]), and a Paillier-based
//! blinded-equality check ([`tss_paillier`]) confirms both parties
//! evaluated it identically before either commits to a derived share.
//!
//! Parsing the circuit out of a Bristol Fashion file, and compiling a
//! scalar/index pair into that circuit's specific input-wire encoding, are
//! both treated as black-box collaborators (spec §1) — this crate expects
//! a [`ot_gc::Circuit`] plus a [`CircuitLayout`] and the caller's own input
//! bits already in that circuit's wire order.

pub mod derive;

pub use derive::{CircuitLayout, DeriveBuilder, DeriveError, DerivedChild};

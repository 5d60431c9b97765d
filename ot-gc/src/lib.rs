//! Oblivious transfer and Yao garbled circuits (spec §4.4 capability G,
//! §4.10). This crate provides the two-party building blocks the BIP-32
//! threshold child-key derivation is built from:
//!
//! - [`base_ot`]: a small number of 1-out-of-2 OTs over a Diffie-Hellman
//!   group, expensive (one group exponentiation per OT) but simple, used
//!   only to bootstrap the extension.
//! - [`extension`]: the IKNP OT extension, turning a handful of base OTs
//!   into as many bulk OTs as a circuit needs, at the cost of a PRG call
//!   (AES in CTR mode) per OT instead of a group operation.
//! - [`circuit`] / [`garble`]: an in-memory boolean-circuit representation
//!   (AND/XOR/INV gates) and free-XOR, point-and-permute Yao garbling and
//!   evaluation over it.
//!
//! Parsing circuits out of the Bristol Fashion file format is out of
//! scope here; [`circuit::Circuit`] is built programmatically (or by a
//! caller-supplied parser) and handed to [`garble`] as-is.

pub mod base_ot;
pub mod circuit;
pub mod extension;
pub mod garble;

pub use base_ot::{BaseOtReceiver, BaseOtSender, OtError};
pub use circuit::{Circuit, Gate};
pub use extension::{ExtendedOtReceiver, ExtendedOtSender};
pub use garble::{EvaluatedCircuit, GarbledCircuit, Garbler, Label};

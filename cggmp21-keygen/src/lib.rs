//! Distributed key generation for threshold signature schemes, generalised
//! to Birkhoff shares so a party can hold a higher-rank share (spec §3,
//! §4.6).

pub mod keygen;

pub use keygen::{KeygenBuilder, KeygenError, Msg};

pub use key_share;
pub use tss_core::BkParameter;

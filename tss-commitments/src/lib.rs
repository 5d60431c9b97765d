//! Polynomial and hash commitments used across the DKG, reshare and FROST
//! protocols, generalised from plain Shamir to Birkhoff-rank shares.

pub mod feldman;
pub mod hash_commitment;
pub mod pedersen;

pub use feldman::FeldmanCommitments;
pub use pedersen::PedersenCommitments;

//! Key share types shared by every threshold signature scheme in this
//! workspace (DKG output, reshare output, and the auxiliary Paillier/Pedersen
//! data signing needs).

mod key_share;
pub mod security_level;
pub mod valid;

#[cfg(feature = "spof")]
pub mod trusted_dealer;

pub use key_share::{IncompleteKeyShare, InvalidKeyShare, KeyShare, PartyAux};
pub use security_level::SecurityLevel;
pub use tss_core::BkParameter;
pub use valid::Valid;

pub use generic_ec;
pub use libpaillier;

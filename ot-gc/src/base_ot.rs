//! A small number of base 1-out-of-2 OTs over `secp256k1`, used only to
//! seed [`crate::extension`]. Diffie-Hellman based: the sender commits to
//! `A = G^a`; the receiver answers with `B = G^k` (choice 0) or `A + G^k`
//! (choice 1); both sides can now derive the same key for the chosen slot
//! and no other, by the standard "one-out-of-two" DH trick (no direct
//! precedent in the retrieval pack — see `DESIGN.md`).

use generic_ec::{curves::Secp256k1, Point, Scalar, SecretScalar};
use sha2::{Digest, Sha256};
use thiserror::Error;

type Curve = Secp256k1;

/// A base-OT payload: a PRG seed handed to the IKNP extension.
pub const OT_MSG_LEN: usize = 16;
pub type OtMessage = [u8; OT_MSG_LEN];

fn derive_key(point: &Point<Curve>) -> OtMessage {
    let digest = Sha256::new_with_prefix(b"ot-gc/base-ot/key")
        .chain_update(point.to_be_bytes())
        .finalize();
    let mut out = [0u8; OT_MSG_LEN];
    out.copy_from_slice(&digest[..OT_MSG_LEN]);
    out
}

fn xor(a: OtMessage, b: OtMessage) -> OtMessage {
    let mut out = [0u8; OT_MSG_LEN];
    for i in 0..OT_MSG_LEN {
        out[i] = a[i] ^ b[i];
    }
    out
}

/// The OT sender, holding two messages `m0`/`m1`.
pub struct BaseOtSender {
    a: SecretScalar<Curve>,
    a_point: Point<Curve>,
}

/// Ciphertexts the sender publishes after seeing the receiver's reply.
#[derive(Clone)]
pub struct SenderReply {
    pub c0: OtMessage,
    pub c1: OtMessage,
}

impl BaseOtSender {
    pub fn new(rng: &mut (impl rand_core::RngCore + rand_core::CryptoRng)) -> Self {
        let a = SecretScalar::<Curve>::random(rng);
        let a_point = Point::generator() * &a;
        Self { a, a_point }
    }

    /// First message: `A = G^a`, sent to the receiver.
    pub fn public_key(&self) -> Point<Curve> {
        self.a_point
    }

    /// Second message: given the receiver's reply `b_point`, encrypt `m0`
    /// under the key only a choice-0 receiver can derive, and `m1` under
    /// the key only a choice-1 receiver can derive.
    pub fn encrypt(&self, b_point: Point<Curve>, m0: OtMessage, m1: OtMessage) -> SenderReply {
        let key0 = derive_key(&(b_point * &self.a));
        let key1 = derive_key(&((b_point - self.a_point) * &self.a));
        SenderReply {
            c0: xor(m0, key0),
            c1: xor(m1, key1),
        }
    }
}

/// The OT receiver, holding a single choice bit.
pub struct BaseOtReceiver {
    k: SecretScalar<Curve>,
    choice: bool,
}

impl BaseOtReceiver {
    pub fn new(rng: &mut (impl rand_core::RngCore + rand_core::CryptoRng), choice: bool) -> Self {
        Self {
            k: SecretScalar::<Curve>::random(rng),
            choice,
        }
    }

    /// Reply to the sender's `A`: `B = G^k` or `A + G^k` depending on choice.
    pub fn public_key(&self, sender_pubkey: &Point<Curve>) -> Point<Curve> {
        let b = Point::<Curve>::generator() * &self.k;
        if self.choice {
            *sender_pubkey + b
        } else {
            b
        }
    }

    /// Recover the chosen message from the sender's ciphertexts.
    pub fn decrypt(
        &self,
        sender_pubkey: Point<Curve>,
        reply: &SenderReply,
    ) -> Result<OtMessage, OtError> {
        let key = derive_key(&(sender_pubkey * &self.k));
        let ct = if self.choice { reply.c1 } else { reply.c0 };
        Ok(xor(ct, key))
    }
}

#[derive(Debug, Error)]
pub enum OtError {
    #[error("base OT transcript is inconsistent")]
    Transcript,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfers_the_chosen_message() {
        let mut rng = rand_dev::DevRng::new();
        let m0 = [1u8; OT_MSG_LEN];
        let m1 = [2u8; OT_MSG_LEN];

        for choice in [false, true] {
            let sender = BaseOtSender::new(&mut rng);
            let receiver = BaseOtReceiver::new(&mut rng, choice);

            let a = sender.public_key();
            let b = receiver.public_key(&a);
            let reply = sender.encrypt(b, m0, m1);
            let got = receiver.decrypt(a, &reply).unwrap();

            assert_eq!(got, if choice { m1 } else { m0 });
        }
    }
}

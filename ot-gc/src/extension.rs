//! IKNP-style OT extension: a handful of [`crate::base_ot`] instances,
//! expanded by an AES-keyed PRG into as many bulk OTs as a circuit needs.
//!
//! `KAPPA` base OTs run once per session; after that every additional OT
//! costs one PRG call instead of a group exponentiation. The correlation
//! trick is the textbook one: the extension-sender holds a random
//! `KAPPA`-bit string `Δ` and, for every OT instance `j`, can only ever
//! recover one of the two keys the extension-receiver's columns encode —
//! which one depends on the receiver's choice bit `r_j`. No direct
//! precedent in the retrieval pack for this construction; see `DESIGN.md`.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use generic_ec::{curves::Secp256k1, Point};
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use crate::base_ot::{BaseOtReceiver, BaseOtSender, OtMessage, SenderReply, OT_MSG_LEN};

type Curve = Secp256k1;

/// Number of base OTs (and PRG-expanded correlation rows). 128 matches the
/// usual statistical security target for IKNP-style extension.
pub const KAPPA: usize = 128;

fn prg_block(seed: &OtMessage, counter: u64) -> [u8; 16] {
    let cipher = Aes128::new(GenericArray::from_slice(seed));
    let mut block = [0u8; 16];
    block[..8].copy_from_slice(&counter.to_be_bytes());
    let mut block = GenericArray::from(block);
    cipher.encrypt_block(&mut block);
    block.into()
}

fn prg_expand(seed: &OtMessage, out_len_bytes: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(out_len_bytes + 16);
    let mut counter = 0u64;
    while out.len() < out_len_bytes {
        out.extend_from_slice(&prg_block(seed, counter));
        counter += 1;
    }
    out.truncate(out_len_bytes);
    out
}

fn get_bit(bytes: &[u8], idx: usize) -> bool {
    (bytes[idx / 8] >> (idx % 8)) & 1 == 1
}

fn set_bit(bytes: &mut [u8], idx: usize, val: bool) {
    if val {
        bytes[idx / 8] |= 1 << (idx % 8);
    }
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &b) in bits.iter().enumerate() {
        if b {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

fn xor_bytes(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

fn extract_column(rows: &[Vec<u8>], col_idx: usize) -> Vec<u8> {
    let mut out = vec![0u8; rows.len().div_ceil(8)];
    for (i, row) in rows.iter().enumerate() {
        if get_bit(row, col_idx) {
            set_bit(&mut out, i, true);
        }
    }
    out
}

fn hash_column(j: usize, col_bits: &[u8]) -> OtMessage {
    let digest = Sha256::new_with_prefix(b"ot-gc/extension/key")
        .chain_update((j as u64).to_be_bytes())
        .chain_update(col_bits)
        .finalize();
    let mut out = [0u8; OT_MSG_LEN];
    out.copy_from_slice(&digest[..OT_MSG_LEN]);
    out
}

fn xor_msg(a: OtMessage, b: OtMessage) -> OtMessage {
    let mut out = [0u8; OT_MSG_LEN];
    for i in 0..OT_MSG_LEN {
        out[i] = a[i] ^ b[i];
    }
    out
}

/// Plays the base-OT *receiver* role `KAPPA` times, with choice bits `Δ`.
/// Becomes the extension *sender*: it will hold one of the two messages
/// per bulk OT instance, selected by the (unknown to it) receiver choice.
pub struct ExtendedOtSender {
    delta: Vec<bool>,
    base: Vec<BaseOtReceiver>,
    seeds: Vec<OtMessage>,
}

impl ExtendedOtSender {
    pub fn new(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let delta: Vec<bool> = (0..KAPPA).map(|_| rng.next_u32() & 1 == 1).collect();
        let base = delta
            .iter()
            .map(|&d| BaseOtReceiver::new(rng, d))
            .collect();
        Self {
            delta,
            base,
            seeds: Vec::new(),
        }
    }

    /// Reply to the extension-receiver's `KAPPA` base-OT sender keys.
    pub fn base_ot_round1(&self, sender_keys: &[Point<Curve>]) -> Vec<Point<Curve>> {
        self.base
            .iter()
            .zip(sender_keys)
            .map(|(r, a)| r.public_key(a))
            .collect()
    }

    /// Finish the base OTs, recovering one seed `k_i^{Δ_i}` per row.
    pub fn base_ot_round2(
        &mut self,
        sender_keys: &[Point<Curve>],
        replies: &[SenderReply],
    ) -> Result<(), crate::OtError> {
        self.seeds = self
            .base
            .iter()
            .zip(sender_keys)
            .zip(replies)
            .map(|((r, a), reply)| r.decrypt(*a, reply))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    /// Given the receiver's correction rows `u_1..u_KAPPA` (each
    /// `num_ots` bits, packed), derive the key this party can recover for
    /// OT instance `j` depending on the (unknown) receiver choice bit.
    pub fn extend(&self, correction_rows: &[Vec<u8>], num_ots: usize) -> ExtendedOtSenderKeys {
        let num_bytes = num_ots.div_ceil(8);
        let q_rows: Vec<Vec<u8>> = self
            .seeds
            .iter()
            .zip(&self.delta)
            .zip(correction_rows)
            .map(|((seed, &d), u)| {
                let t = prg_expand(seed, num_bytes);
                if d {
                    xor_bytes(&t, u)
                } else {
                    t
                }
            })
            .collect();
        let delta_bytes = pack_bits(&self.delta);
        ExtendedOtSenderKeys {
            q_rows,
            delta_bytes,
            num_ots,
        }
    }
}

/// Per-instance key pairs derived by the extension sender; one of
/// `key0`/`key1` is used to mask each of the sender's two real OT
/// messages before broadcasting the ciphertexts.
pub struct ExtendedOtSenderKeys {
    q_rows: Vec<Vec<u8>>,
    delta_bytes: Vec<u8>,
    num_ots: usize,
}

impl ExtendedOtSenderKeys {
    pub fn encrypt(&self, j: usize, m0: OtMessage, m1: OtMessage) -> (OtMessage, OtMessage) {
        assert!(j < self.num_ots);
        let col = extract_column(&self.q_rows, j);
        let key0 = hash_column(j, &col);
        let col_xor_delta = xor_bytes(&col, &self.delta_bytes);
        let key1 = hash_column(j, &col_xor_delta);
        (xor_msg(m0, key0), xor_msg(m1, key1))
    }
}

/// Plays the base-OT *sender* role `KAPPA` times, offering random seed
/// pairs `(k_i^0, k_i^1)`. Becomes the extension *receiver*, holding the
/// real choice bits for the bulk OTs.
pub struct ExtendedOtReceiver {
    base: Vec<BaseOtSender>,
    seed_pairs: Vec<(OtMessage, OtMessage)>,
}

impl ExtendedOtReceiver {
    pub fn new(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let mut base = Vec::with_capacity(KAPPA);
        let mut seed_pairs = Vec::with_capacity(KAPPA);
        for _ in 0..KAPPA {
            base.push(BaseOtSender::new(rng));
            let mut k0 = [0u8; OT_MSG_LEN];
            let mut k1 = [0u8; OT_MSG_LEN];
            rng.fill_bytes(&mut k0);
            rng.fill_bytes(&mut k1);
            seed_pairs.push((k0, k1));
        }
        Self { base, seed_pairs }
    }

    pub fn base_ot_public_keys(&self) -> Vec<Point<Curve>> {
        self.base.iter().map(|s| s.public_key()).collect()
    }

    pub fn base_ot_replies(
        &self,
        extension_sender_keys: &[Point<Curve>],
    ) -> Vec<SenderReply> {
        self.base
            .iter()
            .zip(&self.seed_pairs)
            .zip(extension_sender_keys)
            .map(|((s, (k0, k1)), b)| s.encrypt(*b, *k0, *k1))
            .collect()
    }

    /// Prepare the correction rows for choice bits `r` (one per bulk OT
    /// instance), and keep the matching key material to decrypt later.
    pub fn extend(&self, choice_bits: &[bool]) -> (Vec<Vec<u8>>, ExtendedOtReceiverKeys) {
        let num_ots = choice_bits.len();
        let num_bytes = num_ots.div_ceil(8);
        let r_bytes = pack_bits(choice_bits);

        let mut t0_rows = Vec::with_capacity(KAPPA);
        let mut correction_rows = Vec::with_capacity(KAPPA);
        for (k0, k1) in &self.seed_pairs {
            let t0 = prg_expand(k0, num_bytes);
            let t1 = prg_expand(k1, num_bytes);
            correction_rows.push(xor_bytes(&xor_bytes(&t0, &t1), &r_bytes));
            t0_rows.push(t0);
        }
        (
            correction_rows,
            ExtendedOtReceiverKeys {
                t0_rows,
                choice_bits: choice_bits.to_vec(),
            },
        )
    }
}

pub struct ExtendedOtReceiverKeys {
    t0_rows: Vec<Vec<u8>>,
    choice_bits: Vec<bool>,
}

impl ExtendedOtReceiverKeys {
    /// Decrypt the sender's ciphertext pair for OT instance `j`, yielding
    /// the message selected by this receiver's `choice_bits[j]`.
    pub fn decrypt(&self, j: usize, ciphertexts: (OtMessage, OtMessage)) -> OtMessage {
        let col = extract_column(&self.t0_rows, j);
        let key = hash_column(j, &col);
        let ct = if self.choice_bits[j] {
            ciphertexts.1
        } else {
            ciphertexts.0
        };
        xor_msg(ct, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extends_many_ots_from_few_base_ots() {
        let mut rng = rand_dev::DevRng::new();

        let mut ext_sender = ExtendedOtSender::new(&mut rng);
        let ext_receiver = ExtendedOtReceiver::new(&mut rng);

        let base_a = ext_receiver.base_ot_public_keys();
        let base_b = ext_sender.base_ot_round1(&base_a);
        let base_replies = ext_receiver.base_ot_replies(&base_b);
        ext_sender.base_ot_round2(&base_a, &base_replies).unwrap();

        let num_ots = 37;
        let choices: Vec<bool> = (0..num_ots).map(|i| i % 3 == 0).collect();
        let (correction_rows, receiver_keys) = ext_receiver.extend(&choices);
        let sender_keys = ext_sender.extend(&correction_rows, num_ots);

        for j in 0..num_ots {
            let m0 = [j as u8; OT_MSG_LEN];
            let m1 = [(j as u8).wrapping_add(100); OT_MSG_LEN];
            let ciphertexts = sender_keys.encrypt(j, m0, m1);
            let got = receiver_keys.decrypt(j, ciphertexts);
            assert_eq!(got, if choices[j] { m1 } else { m0 }, "ot #{j}");
        }
    }
}

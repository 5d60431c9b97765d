//! The four-phase two-party derivation protocol (spec §4.10): Initial,
//! OtReceiver/OtSendResponse, EncH, Sh2Hash.
//!
//! Both parties simultaneously garble their own copy of the (caller
//! supplied) HMAC-SHA512 circuit for the other to evaluate — a dual-
//! execution shape, per the spec's "each party garbles its half" wording
//! — rather than the more common single-garbler/single-evaluator 2PC. OT
//! extension ([`ot_gc::extension`]) carries the labels each side needs for
//! bits only the *other* side holds.

use digest::Digest;
use generic_ec::{
    curves::Secp256k1,
    hash_to_curve::{self, FromHash},
    Curve, Point, Scalar, SecretScalar,
};
use generic_ec_zkp::schnorr_pok;
use key_share::SecurityLevel;
use ot_gc::{
    extension::{ExtendedOtReceiver, ExtendedOtSender},
    garble::{EvaluatedCircuit, GarbledCircuit, Garbler, Label},
    Circuit,
};
use paillier_zk::{
    libpaillier::EncryptionKey, unknown_order::BigNumber, BigNumberExt, SafePaillierEncryptionExt,
};
use rand_core::{CryptoRng, RngCore};
use round_based::{
    rounds_router::{simple_store::RoundInput, RoundsRouter},
    Delivery, Mpc, MpcParty, Outgoing, ProtocolMessage,
};
use sha2::Sha512;
use thiserror::Error;
use tss_engine::{execution_id::ProtocolChoice, progress::Tracer, ExecutionId};
use tss_paillier::{encryption_key_from_n, PaillierKeyPair};

/// Which of a caller-supplied circuit's input wires belong to which party.
/// Translating a share/index pair into the bits that land on these wires
/// is the caller's responsibility (the circuit itself is out of scope
/// here, same as the Bristol parser it would normally come from).
#[derive(Debug, Clone)]
pub struct CircuitLayout {
    pub party0_input_wires: Vec<usize>,
    pub party1_input_wires: Vec<usize>,
}

impl CircuitLayout {
    fn mine(&self, my_index: u16) -> &[usize] {
        if my_index == 0 {
            &self.party0_input_wires
        } else {
            &self.party1_input_wires
        }
    }

    fn theirs(&self, my_index: u16) -> &[usize] {
        if my_index == 0 {
            &self.party1_input_wires
        } else {
            &self.party0_input_wires
        }
    }
}

#[derive(ProtocolMessage, Clone)]
pub enum Msg<E: Curve> {
    Round1(MsgRound1<E>),
    Round2(MsgRound2<E>),
    Round3(MsgRound3),
    Round4(MsgRound4),
    Round5(MsgRound5),
    Round6(MsgRound6),
    Round7(MsgRound7),
}

/// Phase 1, "Initial": public key share, garbled circuit, this party's own
/// direct input labels, and the first OT flight for evaluating the peer.
#[derive(Clone)]
pub struct MsgRound1<E: Curve> {
    share_point: Point<E>,
    sch_commit: schnorr_pok::Commit<E>,
    paillier_n: BigNumber,
    garbled: GarbledCircuit,
    own_direct_labels: Vec<(usize, Label)>,
    ot_evaluator_base_keys: Vec<Point<Secp256k1>>,
}

/// Phase 2, "OtReceiver": reply to the peer's base-OT flight, plus the
/// Schnorr proof over the combined public key.
#[derive(Clone)]
pub struct MsgRound2<E: Curve> {
    ot_garbler_base_keys: Vec<Point<Secp256k1>>,
    sch_proof: schnorr_pok::Proof<E>,
}

/// Phase 2 continued, "OtSendResponse": completes the base OTs and sends
/// the IKNP correlation rows for this party's real input bits.
#[derive(Clone)]
pub struct MsgRound3 {
    base_ot_replies: Vec<ot_gc::base_ot::SenderReply>,
    correction_rows: Vec<Vec<u8>>,
}

/// The garbler's OT ciphertexts for every wire the peer needs labels for.
#[derive(Clone)]
pub struct MsgRound4 {
    ciphertexts: Vec<(usize, (Label, Label))>,
}

/// Phase 3, "EncH": `Enc(-h2)` under this party's own Paillier key.
#[derive(Clone)]
pub struct MsgRound5 {
    c_eh: BigNumber,
}

/// Phase 4, "Sh2Hash". Only meaningful from party 1 ("receiver") to party
/// 0 ("originator"); party 0's own message here is an unused placeholder,
/// kept so both directions of the round carry a message.
#[derive(Clone)]
pub struct MsgRound6 {
    blinded_result: BigNumber,
    hash_commit: [u8; 32],
}

/// Party 0's verdict on the Sh2Hash check. Party 1's message is an unused
/// placeholder symmetric to [`MsgRound6`]'s.
#[derive(Clone)]
pub struct MsgRound7 {
    consistent: bool,
}

pub struct DerivedChild<E: Curve> {
    pub child_share: SecretScalar<E>,
    pub child_chain_code: [u8; 32],
}

/// BIP-32's hardened/non-hardened boundary: indices `>= HARDENED_BOUND` are
/// hardened (derived from the parent private key); indices below it are
/// non-hardened (derived from the parent public key).
pub const HARDENED_BOUND: u32 = 0x8000_0000;

/// Checks `child_index` against [`HARDENED_BOUND`] for the derivation path
/// the caller picked, before any protocol messages are exchanged.
fn check_child_index<IErr, OErr>(child_index: u32, hardened: bool) -> Result<(), DeriveError<IErr, OErr>> {
    if hardened && child_index < HARDENED_BOUND {
        Err(DeriveError::ErrNonHardenedKey(child_index))
    } else if !hardened && child_index >= HARDENED_BOUND {
        Err(DeriveError::ErrHardenedKey(child_index))
    } else {
        Ok(())
    }
}

pub struct DeriveBuilder<'a, E, L, D = sha2::Sha256> {
    execution_id: ExecutionId<'a, E, L, D>,
    tracer: Option<&'a mut dyn Tracer>,
}

impl<'a, E: Curve, L: SecurityLevel> DeriveBuilder<'a, E, L, sha2::Sha256> {
    pub fn new(execution_id: ExecutionId<'a, E, L, sha2::Sha256>) -> Self {
        Self {
            execution_id,
            tracer: None,
        }
    }
}

impl<'a, E: Curve, L: SecurityLevel, D: Digest> DeriveBuilder<'a, E, L, D> {
    pub fn set_execution_id(mut self, execution_id: ExecutionId<'a, E, L, D>) -> Self {
        self.execution_id = execution_id;
        self
    }

    pub fn set_progress_tracer(mut self, tracer: &'a mut dyn Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn derive<R, M>(
        self,
        rng: &mut R,
        my_index: u16,
        child_index: u32,
        hardened: bool,
        my_share: SecretScalar<E>,
        parent_public_key: Point<E>,
        circuit: Circuit,
        layout: CircuitLayout,
        my_input_bits: Vec<bool>,
        my_paillier: PaillierKeyPair,
        party: M,
    ) -> Result<DerivedChild<E>, DeriveError<M::ReceiveError, M::SendError>>
    where
        R: RngCore + CryptoRng,
        M: Mpc<ProtocolMessage = Msg<E>>,
        Scalar<E>: FromHash,
    {
        check_child_index(child_index, hardened)?;
        run_derive(
            rng,
            self.execution_id,
            my_index,
            my_share,
            parent_public_key,
            circuit,
            layout,
            my_input_bits,
            my_paillier,
            party,
            self.tracer,
        )
        .await
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_derive<R, M, E, L, D>(
    rng: &mut R,
    execution_id: ExecutionId<'_, E, L, D>,
    my_index: u16,
    my_share: SecretScalar<E>,
    parent_public_key: Point<E>,
    circuit: Circuit,
    layout: CircuitLayout,
    my_input_bits: Vec<bool>,
    my_paillier: PaillierKeyPair,
    party: M,
    mut tracer: Option<&mut dyn Tracer>,
) -> Result<DerivedChild<E>, DeriveError<M::ReceiveError, M::SendError>>
where
    R: RngCore + CryptoRng,
    M: Mpc<ProtocolMessage = Msg<E>>,
    E: Curve,
    L: SecurityLevel,
    D: Digest,
    Scalar<E>: FromHash,
{
    tracer.protocol_begins();

    let n = 2u16;
    let peer = 1 - my_index;

    let MpcParty { delivery, .. } = party.into_party();
    let (incomings, mut outgoings) = delivery.split();

    let mut rounds = RoundsRouter::<Msg<E>>::builder();
    let round1 = rounds.add_round(RoundInput::<MsgRound1<E>>::p2p(my_index, n));
    let round2 = rounds.add_round(RoundInput::<MsgRound2<E>>::p2p(my_index, n));
    let round3 = rounds.add_round(RoundInput::<MsgRound3>::p2p(my_index, n));
    let round4 = rounds.add_round(RoundInput::<MsgRound4>::p2p(my_index, n));
    let round5 = rounds.add_round(RoundInput::<MsgRound5>::p2p(my_index, n));
    let round6 = rounds.add_round(RoundInput::<MsgRound6>::p2p(my_index, n));
    let round7 = rounds.add_round(RoundInput::<MsgRound7>::p2p(my_index, n));
    let mut rounds = rounds.listen(incomings);

    let eval_id = execution_id.evaluate(ProtocolChoice::Bip32Derive);
    let sid = eval_id.as_slice();
    let tag_htc = hash_to_curve::Tag::new(sid).ok_or(DeriveError::Bug(Bug::InvalidTag))?;

    // --- Phase 1: Initial ---------------------------------------------
    tracer.stage("Garble own circuit, commit to Paillier key, prove share contribution");

    let garbler = Garbler::new(circuit.clone(), rng);
    let garbled = garbler.garbled_circuit();

    let own_direct_labels: Vec<(usize, Label)> = layout
        .mine(my_index)
        .iter()
        .zip(&my_input_bits)
        .map(|(&wire, &bit)| (wire, garbler.input_label(wire, bit)))
        .collect();

    let (sch_secret, sch_commit) = schnorr_pok::prover_commits_ephemeral_secret::<E, _>(rng);
    let share_point = Point::generator() * &my_share;

    let my_ot_evaluator = ExtendedOtReceiver::new(rng);
    let ot_evaluator_base_keys = my_ot_evaluator.base_ot_public_keys();

    outgoings
        .send(Outgoing::p2p(
            peer,
            Msg::Round1(MsgRound1 {
                share_point,
                sch_commit: sch_commit.clone(),
                paillier_n: my_paillier.n.clone(),
                garbled: garbled.clone(),
                own_direct_labels,
                ot_evaluator_base_keys,
            }),
        ))
        .await
        .map_err(DeriveError::SendError)?;

    let round1_msgs = rounds.complete(round1).await.map_err(DeriveError::ReceiveMessage)?;
    let peer_msg1 = round1_msgs
        .iter_indexed()
        .next()
        .ok_or(DeriveError::Bug(Bug::NoPeer))?
        .2
        .clone();

    let combined_public_key = share_point + peer_msg1.share_point;
    if combined_public_key != parent_public_key {
        return Err(DeriveError::Aborted(AbortReason::PublicKeyMismatch));
    }

    // --- Phase 2: OtReceiver / OtSendResponse --------------------------
    tracer.stage("Run OT extension for both directions of circuit evaluation");

    let my_ot_garbler = ExtendedOtSender::new(rng);
    let ot_garbler_base_keys = my_ot_garbler.base_ot_round1(&peer_msg1.ot_evaluator_base_keys);

    let challenge = schnorr_pok::Challenge {
        nonce: Scalar::<E>::hash_concat(
            tag_htc,
            &[&my_index.to_be_bytes(), share_point.to_be_bytes().as_ref()],
        )
        .map_err(|e| DeriveError::Bug(Bug::HashToScalarError(e)))?,
    };
    let sch_proof = schnorr_pok::prove(&sch_secret, &challenge, &my_share);

    outgoings
        .send(Outgoing::p2p(
            peer,
            Msg::Round2(MsgRound2 {
                ot_garbler_base_keys,
                sch_proof,
            }),
        ))
        .await
        .map_err(DeriveError::SendError)?;

    let round2_msgs = rounds.complete(round2).await.map_err(DeriveError::ReceiveMessage)?;
    let peer_msg2 = round2_msgs
        .iter_indexed()
        .next()
        .ok_or(DeriveError::Bug(Bug::NoPeer))?
        .2
        .clone();

    let peer_challenge = schnorr_pok::Challenge {
        nonce: Scalar::<E>::hash_concat(
            tag_htc,
            &[&peer.to_be_bytes(), peer_msg1.share_point.to_be_bytes().as_ref()],
        )
        .map_err(|e| DeriveError::Bug(Bug::HashToScalarError(e)))?,
    };
    if peer_msg2
        .sch_proof
        .verify(&peer_msg1.sch_commit, &peer_challenge, &peer_msg1.share_point)
        .is_err()
    {
        return Err(DeriveError::Aborted(AbortReason::SchnorrProofInvalid));
    }

    let base_ot_replies = my_ot_evaluator.base_ot_replies(&peer_msg2.ot_garbler_base_keys);
    // `my_input_bits` is indexed in `layout.mine(my_index)` order, same as
    // `own_direct_labels` above — those are exactly the wires only this
    // party knows the real bit for, which is also the OT choice vector
    // needed to evaluate the peer's garbled circuit.
    let (correction_rows, my_ot_receiver_keys) = my_ot_evaluator.extend(&my_input_bits);

    outgoings
        .send(Outgoing::p2p(
            peer,
            Msg::Round3(MsgRound3 {
                base_ot_replies,
                correction_rows,
            }),
        ))
        .await
        .map_err(DeriveError::SendError)?;

    let round3_msgs = rounds.complete(round3).await.map_err(DeriveError::ReceiveMessage)?;
    let peer_msg3 = round3_msgs
        .iter_indexed()
        .next()
        .ok_or(DeriveError::Bug(Bug::NoPeer))?
        .2
        .clone();

    let mut my_ot_garbler = my_ot_garbler;
    my_ot_garbler
        .base_ot_round2(&peer_msg1.ot_evaluator_base_keys, &peer_msg3.base_ot_replies)
        .map_err(|_| DeriveError::Aborted(AbortReason::OtTranscript))?;

    let num_ots = layout.theirs(my_index).len();
    let sender_keys = my_ot_garbler.extend(&peer_msg3.correction_rows, num_ots);
    let ciphertexts: Vec<(usize, (Label, Label))> = layout
        .theirs(my_index)
        .iter()
        .enumerate()
        .map(|(j, &wire)| {
            let (l0, l1) = garbler.wire_labels(wire);
            (wire, sender_keys.encrypt(j, l0, l1))
        })
        .collect();

    outgoings
        .send(Outgoing::p2p(peer, Msg::Round4(MsgRound4 { ciphertexts })))
        .await
        .map_err(DeriveError::SendError)?;

    let round4_msgs = rounds.complete(round4).await.map_err(DeriveError::ReceiveMessage)?;
    let peer_msg4 = round4_msgs
        .iter_indexed()
        .next()
        .ok_or(DeriveError::Bug(Bug::NoPeer))?
        .2
        .clone();

    // --- Evaluate the peer's circuit -----------------------------------
    tracer.stage("Evaluate peer's garbled circuit");

    let mut input_labels = vec![[0u8; ot_gc::garble::LABEL_LEN]; circuit.num_inputs];
    for &(wire, label) in &peer_msg1.own_direct_labels {
        input_labels[wire] = label;
    }
    for (j, &wire) in layout.mine(my_index).iter().enumerate() {
        input_labels[wire] = my_ot_receiver_keys.decrypt(j, peer_msg4.ciphertexts[j].1);
    }
    let evaluated: EvaluatedCircuit = peer_msg1
        .garbled
        .evaluate(&input_labels)
        .map_err(|_| DeriveError::Aborted(AbortReason::GarbledEvaluationFailed))?;
    let my_decoded = peer_msg1
        .garbled
        .decode(&evaluated)
        .map_err(|_| DeriveError::Aborted(AbortReason::GarbledEvaluationFailed))?;

    let decoded_bytes = pack_bits(&my_decoded);
    if decoded_bytes.len() < 64 {
        return Err(DeriveError::Bug(Bug::CircuitOutputTooShort));
    }
    let mut h2_hasher = Sha512::new();
    digest::Digest::update(&mut h2_hasher, sid);
    digest::Digest::update(&mut h2_hasher, &decoded_bytes);
    let h2_bytes: [u8; 64] = digest::Digest::finalize(h2_hasher).into();
    let h2 = BigNumber::from_slice(&h2_bytes);

    // --- Phase 3: EncH ---------------------------------------------------
    tracer.stage("Encrypt evaluation hash under own Paillier key");

    let neg_h2 = (&my_paillier.n - (&h2 % &my_paillier.n)) % &my_paillier.n;
    let (c_eh, _nonce) = my_paillier
        .encrypt_with_random(rng, &neg_h2)
        .ok_or(DeriveError::Bug(Bug::PaillierEncryptOutOfRange))?;

    outgoings
        .send(Outgoing::p2p(peer, Msg::Round5(MsgRound5 { c_eh })))
        .await
        .map_err(DeriveError::SendError)?;

    let round5_msgs = rounds.complete(round5).await.map_err(DeriveError::ReceiveMessage)?;
    let peer_msg5 = round5_msgs
        .iter_indexed()
        .next()
        .ok_or(DeriveError::Bug(Bug::NoPeer))?
        .2
        .clone();

    // --- Phase 4: Sh2Hash --------------------------------------------------
    tracer.stage("Blinded consistency check between both evaluations");

    let originator_n = if my_index == 0 {
        my_paillier.n.clone()
    } else {
        peer_msg1.paillier_n.clone()
    };
    let originator_enc = encryption_key_from_n(&originator_n);

    let round6_out = if my_index == 1 {
        let c_eh_originator = peer_msg5.c_eh.clone();
        let (h2_under_originator, _) = encrypt_under(rng, &originator_enc, &originator_n, &h2)
            .ok_or(DeriveError::Bug(Bug::PaillierEncryptOutOfRange))?;
        let c_sum = paillier_add(&originator_enc, &c_eh_originator, &h2_under_originator);

        let rho = sample_in_mult_group(rng, &originator_n);
        let s = BigNumber::from_rng(&originator_n, rng);
        let c_scaled = paillier_scalar_mul(&originator_enc, &c_sum, &rho)
            .ok_or(DeriveError::Bug(Bug::PaillierEncryptOutOfRange))?;
        let (enc_s, _) = encrypt_under(rng, &originator_enc, &originator_n, &s)
            .ok_or(DeriveError::Bug(Bug::PaillierEncryptOutOfRange))?;
        let c_result = paillier_add(&originator_enc, &c_scaled, &enc_s);

        let hash_commit = hash_s_and_h2(&s, &h2);

        MsgRound6 {
            blinded_result: c_result,
            hash_commit,
        }
    } else {
        MsgRound6 {
            blinded_result: BigNumber::zero(),
            hash_commit: [0u8; 32],
        }
    };

    outgoings
        .send(Outgoing::p2p(peer, Msg::Round6(round6_out)))
        .await
        .map_err(DeriveError::SendError)?;

    let round6_msgs = rounds.complete(round6).await.map_err(DeriveError::ReceiveMessage)?;
    let peer_msg6 = round6_msgs
        .iter_indexed()
        .next()
        .ok_or(DeriveError::Bug(Bug::NoPeer))?
        .2
        .clone();

    let consistent = if my_index == 0 {
        let value = my_paillier
            .decrypt(&peer_msg6.blinded_result)
            .ok_or(DeriveError::Bug(Bug::PaillierDecryptFailed))?;
        hash_s_and_h2(&value, &h2) == peer_msg6.hash_commit
    } else {
        true // party 1 defers to party 0's verdict, delivered next round
    };

    let round7_out = if my_index == 0 {
        MsgRound7 { consistent }
    } else {
        MsgRound7 { consistent: true }
    };

    outgoings
        .send(Outgoing::p2p(peer, Msg::Round7(round7_out)))
        .await
        .map_err(DeriveError::SendError)?;

    let round7_msgs = rounds.complete(round7).await.map_err(DeriveError::ReceiveMessage)?;
    let peer_msg7 = round7_msgs
        .iter_indexed()
        .next()
        .ok_or(DeriveError::Bug(Bug::NoPeer))?
        .2
        .clone();

    let final_consistent = if my_index == 0 { consistent } else { peer_msg7.consistent };
    if !final_consistent {
        return Err(DeriveError::Aborted(AbortReason::EvaluationMismatch));
    }

    // --- Derive the hardened child share -----------------------------------
    let il_bytes = &decoded_bytes[..32];
    let ir_bytes: [u8; 32] = decoded_bytes[32..64]
        .try_into()
        .map_err(|_| DeriveError::Bug(Bug::CircuitOutputTooShort))?;

    let il = Scalar::<E>::from_be_bytes(il_bytes).map_err(|e| DeriveError::Bug(Bug::InvalidPointEncoding(e)))?;
    let inv2 = Scalar::<E>::from(2u32)
        .invert()
        .ok_or(DeriveError::Bug(Bug::NoInverse))?;
    let half_il = il * inv2;

    let mut child_scalar = *my_share.as_ref() + half_il;
    let child_share = SecretScalar::new(&mut child_scalar);

    tracer.protocol_ends();

    Ok(DerivedChild {
        child_share,
        child_chain_code: ir_bytes,
    })
}

fn sample_in_mult_group(rng: &mut (impl RngCore + CryptoRng), n: &BigNumber) -> BigNumber {
    tss_paillier::sample_bigint_in_mult_group(rng, n)
}

fn encrypt_under(
    rng: &mut (impl RngCore + CryptoRng),
    enc: &EncryptionKey,
    n: &BigNumber,
    m: &BigNumber,
) -> Option<(BigNumber, BigNumber)> {
    let nonce = BigNumber::from_rng(n, rng);
    let c = enc.encrypt_with(m, &nonce).ok()?;
    Some((c, nonce))
}

fn paillier_add(enc: &EncryptionKey, a: &BigNumber, b: &BigNumber) -> BigNumber {
    tss_paillier::add_ciphertexts(enc, a, b)
}

fn paillier_scalar_mul(enc: &EncryptionKey, c: &BigNumber, k: &BigNumber) -> Option<BigNumber> {
    tss_paillier::scalar_mul_ciphertext(enc, c, k)
}

fn hash_s_and_h2(s: &BigNumber, h2: &BigNumber) -> [u8; 32] {
    use sha2::{Digest as _, Sha256};
    let digest = Sha256::new_with_prefix(b"bip32-mpc/sh2hash")
        .chain_update(s.to_bytes())
        .chain_update(h2.to_bytes())
        .finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
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

#[derive(Debug, Error)]
pub enum DeriveError<IErr, OErr> {
    #[error("protocol was aborted: {0:?}")]
    Aborted(AbortReason),
    #[error("receiving a message failed")]
    ReceiveMessage(#[source] round_based::rounds_router::errors::CompleteRoundError<IErr>),
    #[error("sending a message failed")]
    SendError(#[source] OErr),
    #[error("internal bug")]
    Bug(#[source] Bug),
    #[error("index {0:#x} is in the hardened range (>= 0x80000000); use hardened derivation instead")]
    ErrHardenedKey(u32),
    #[error("index {0:#x} is below the hardened range (< 0x80000000); use non-hardened derivation instead")]
    ErrNonHardenedKey(u32),
}

#[derive(Debug)]
pub enum AbortReason {
    PublicKeyMismatch,
    SchnorrProofInvalid,
    OtTranscript,
    GarbledEvaluationFailed,
    EvaluationMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestError = DeriveError<std::io::Error, std::io::Error>;

    #[test]
    fn non_hardened_index_is_allowed_on_non_hardened_path() {
        let result: Result<(), TestError> = check_child_index(0, false);
        assert!(result.is_ok());
        let result: Result<(), TestError> = check_child_index(HARDENED_BOUND - 1, false);
        assert!(result.is_ok());
    }

    #[test]
    fn hardened_index_is_rejected_on_non_hardened_path() {
        let result: Result<(), TestError> = check_child_index(HARDENED_BOUND, false);
        assert!(matches!(result, Err(DeriveError::ErrHardenedKey(idx)) if idx == HARDENED_BOUND));
    }

    #[test]
    fn hardened_index_is_allowed_on_hardened_path() {
        let result: Result<(), TestError> = check_child_index(HARDENED_BOUND, true);
        assert!(result.is_ok());
        let result: Result<(), TestError> = check_child_index(u32::MAX, true);
        assert!(result.is_ok());
    }

    #[test]
    fn non_hardened_index_is_rejected_on_hardened_path() {
        let result: Result<(), TestError> = check_child_index(HARDENED_BOUND - 1, true);
        assert!(matches!(result, Err(DeriveError::ErrNonHardenedKey(idx)) if idx == HARDENED_BOUND - 1));
    }
}

#[derive(Debug, Error)]
pub enum Bug {
    #[error("no peer message in a two-party round")]
    NoPeer,
    #[error("`Tag` appears to be invalid `generic_ec::hash_to_curve::Tag`")]
    InvalidTag,
    #[error("failed to hash to scalar")]
    HashToScalarError(#[source] generic_ec::errors::HashError),
    #[error("circuit output is shorter than the 64 bytes a HMAC-SHA512 result needs")]
    CircuitOutputTooShort,
    #[error("plaintext out of the paillier encryption range")]
    PaillierEncryptOutOfRange,
    #[error("paillier decryption failed")]
    PaillierDecryptFailed,
    #[error("invalid point/scalar encoding")]
    InvalidPointEncoding(#[source] generic_ec::errors::InvalidScalar),
    #[error("scalar has no inverse")]
    NoInverse,
}

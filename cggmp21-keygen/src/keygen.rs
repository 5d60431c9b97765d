//! Distributed key generation (spec §4.6): `n` parties jointly sample a
//! random polynomial's shares, each party's share generalised to a
//! Birkhoff parameter `(x_i, rank_i)` rather than a plain index, and end up
//! holding an [`IncompleteKeyShare`] whose shared public key none of them
//! ever learned the private key behind.
//!
//! Follows the commit/decommit/prove round shape the key refresh protocol
//! uses (`cggmp21::key_refresh`), adapted from Paillier/ring-Pedersen setup
//! to polynomial secret sharing.

use digest::Digest;
use generic_ec::{
    hash_to_curve::{self, FromHash},
    Curve, Point, Scalar, SecretScalar,
};
use generic_ec_zkp::{hash_commitment::HashCommit, schnorr_pok};
use key_share::{IncompleteKeyShare, SecurityLevel, Valid};
use rand_core::{CryptoRng, RngCore};
use round_based::{
    rounds_router::{simple_store::RoundInput, RoundsRouter},
    Delivery, Mpc, MpcParty, Outgoing, ProtocolMessage,
};
use thiserror::Error;
use tss_commitments::{feldman::FeldmanCommitments, hash_commitment};
use tss_core::{BkParameter, Polynomial};
use tss_engine::{
    blame::{collect_blame, try_collect_blame, AbortBlame},
    echo::{self, EchoHash},
    execution_id::ProtocolChoice,
    progress::Tracer,
    ExecutionId,
};

#[derive(ProtocolMessage, Clone)]
pub enum Msg<E: Curve, D: Digest> {
    Round1(MsgRound1<D>),
    Round2(MsgRound2<E, D>),
    Echo(MsgEcho),
    Round3(MsgRound3<E>),
}

/// Commitment to this party's round-2 message.
#[derive(Clone)]
pub struct MsgRound1<D: Digest> {
    commitment: HashCommit<D>,
}

/// Decommitment: this party's bk parameter, its Feldman commitments to the
/// polynomial it sampled, its contribution to the shared random tag, and a
/// Schnorr commitment proving (in round 3) that it knows the constant term.
#[derive(Clone)]
pub struct MsgRound2<E: Curve, D: Digest> {
    bk: BkParameter<E>,
    feldman_coeffs: Vec<Point<E>>,
    rho_bytes: Vec<u8>,
    sch_commit: schnorr_pok::Commit<E>,
    decommit: hash_commitment::DecommitNonce<D>,
}

/// Unicast: this party's share of the other party's polynomial, plus a
/// Schnorr proof of knowledge of its own constant term.
#[derive(Clone)]
pub struct MsgRound3<E: Curve> {
    share: Scalar<E>,
    sch_proof: schnorr_pok::Proof<E>,
}

/// Echo of the hash of every round-2 decommitment this party received (spec
/// §4.5 echo-broadcast wrapper); catches a relay that shows different
/// parties different round-2 contents.
#[derive(Clone)]
pub struct MsgEcho {
    hash: Vec<u8>,
}

/// Builds and runs a DKG session.
pub struct KeygenBuilder<'a, E, L, D>
where
    E: Curve,
    L: SecurityLevel,
    D: Digest,
{
    i: u16,
    n: u16,
    t: u16,
    bk: BkParameter<E>,
    execution_id: ExecutionId<'a, E, L, D>,
    tracer: Option<&'a mut dyn Tracer>,
}

impl<'a, E, L, D> KeygenBuilder<'a, E, L, D>
where
    E: Curve,
    L: SecurityLevel,
    D: Digest,
{
    /// Starts building a DKG session for party `i` of `n`, with threshold
    /// `t`, where `i` holds the plain-Shamir (rank 0) share at `x = i + 1`
    /// unless overridden with [`Self::with_bk`].
    pub fn new(i: u16, n: u16, t: u16) -> Self
    where
        Scalar<E>: From<u32>,
    {
        Self {
            i,
            n,
            t,
            bk: BkParameter::new(Scalar::from(u32::from(i) + 1), 0),
            execution_id: ExecutionId::default(),
            tracer: None,
        }
    }

    pub fn with_bk(mut self, bk: BkParameter<E>) -> Self {
        self.bk = bk;
        self
    }

    pub fn set_execution_id(mut self, execution_id: ExecutionId<'a, E, L, D>) -> Self {
        self.execution_id = execution_id;
        self
    }

    pub fn set_progress_tracer(mut self, tracer: &'a mut dyn Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub async fn start<R, M>(
        self,
        rng: &mut R,
        party: M,
    ) -> Result<Valid<IncompleteKeyShare<E, L>>, KeygenError<M::ReceiveError, M::SendError>>
    where
        R: RngCore + CryptoRng,
        M: Mpc<ProtocolMessage = Msg<E, D>>,
        Scalar<E>: FromHash,
        D: Digest<OutputSize = digest::typenum::U32> + Clone + 'static,
    {
        run_keygen(
            rng,
            party,
            self.i,
            self.n,
            self.t,
            self.bk,
            self.execution_id,
            self.tracer,
        )
        .await
    }
}

fn round2_payload<E: Curve>(
    coeffs: &[Point<E>],
    sch_commit: &schnorr_pok::Commit<E>,
    rho_bytes: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    for c in coeffs {
        out.extend_from_slice(c.to_be_bytes().as_ref());
    }
    out.extend_from_slice(sch_commit.0.to_be_bytes().as_ref());
    out.extend_from_slice(rho_bytes);
    out
}

#[allow(clippy::too_many_arguments)]
async fn run_keygen<R, M, E, L, D>(
    rng: &mut R,
    party: M,
    i: u16,
    n: u16,
    t: u16,
    my_bk: BkParameter<E>,
    execution_id: ExecutionId<'_, E, L, D>,
    mut tracer: Option<&mut dyn Tracer>,
) -> Result<Valid<IncompleteKeyShare<E, L>>, KeygenError<M::ReceiveError, M::SendError>>
where
    R: RngCore + CryptoRng,
    M: Mpc<ProtocolMessage = Msg<E, D>>,
    E: Curve,
    L: SecurityLevel,
    Scalar<E>: FromHash,
    D: Digest<OutputSize = digest::typenum::U32> + Clone + 'static,
{
    tracer.protocol_begins();

    tracer.stage("Setup networking");
    let MpcParty { delivery, .. } = party.into_party();
    let (incomings, mut outgoings) = delivery.split();

    let mut rounds = RoundsRouter::<Msg<E, D>>::builder();
    let round1 = rounds.add_round(RoundInput::<MsgRound1<D>>::broadcast(i, n));
    let round2 = rounds.add_round(RoundInput::<MsgRound2<E, D>>::broadcast(i, n));
    let echo_round = rounds.add_round(RoundInput::<MsgEcho>::broadcast(i, n));
    let round3 = rounds.add_round(RoundInput::<MsgRound3<E>>::p2p(i, n));
    let mut rounds = rounds.listen(incomings);

    tracer.stage("Precompute execution id");
    let eval_execution_id = execution_id.evaluate(ProtocolChoice::Keygen);
    let sid = eval_execution_id.as_slice();
    let tag_htc = hash_to_curve::Tag::new(sid).ok_or(Bug::InvalidHashToCurveTag)?;

    tracer.stage("Sample polynomial and commit to it");
    let poly = Polynomial::<E>::sample(rng, usize::from(t) - 1);
    let feldman = FeldmanCommitments::commit(&poly);
    let (sch_secret, sch_commit) = schnorr_pok::prover_commits_ephemeral_secret::<E, _>(rng);

    let mut rho_bytes = vec![0u8; L::SECURITY_BYTES];
    rng.fill_bytes(&mut rho_bytes);

    let (hash_commit, decommit) = hash_commitment::commit::<E, D, _>(
        rng,
        sid,
        &my_bk.x,
        my_bk.rank,
        &round2_payload(&feldman.coeffs, &sch_commit, &rho_bytes),
    );

    tracer.send_msg();
    outgoings
        .send(Outgoing::broadcast(Msg::Round1(MsgRound1 {
            commitment: hash_commit,
        })))
        .await
        .map_err(KeygenError::SendError)?;
    tracer.msg_sent();

    tracer.round_begins();
    tracer.receive_msgs();
    let commitments = rounds
        .complete(round1)
        .await
        .map_err(KeygenError::ReceiveMessage)?;
    tracer.msgs_received();

    let decommitment = MsgRound2 {
        bk: my_bk,
        feldman_coeffs: feldman.coeffs.clone(),
        rho_bytes: rho_bytes.clone(),
        sch_commit: sch_commit.clone(),
        decommit,
    };
    tracer.send_msg();
    outgoings
        .send(Outgoing::broadcast(Msg::Round2(decommitment.clone())))
        .await
        .map_err(KeygenError::SendError)?;
    tracer.msg_sent();

    tracer.round_begins();
    tracer.receive_msgs();
    let decommitments = rounds
        .complete(round2)
        .await
        .map_err(KeygenError::ReceiveMessage)?;
    tracer.msgs_received();

    tracer.stage("Validate round 1 decommitments");
    let blame = collect_blame(&decommitments, &commitments, |_j, d, commitment| {
        hash_commitment::verify::<E, D>(
            sid,
            &d.bk.x,
            d.bk.rank,
            &round2_payload(&d.feldman_coeffs, &d.sch_commit, &d.rho_bytes),
            &commitment.commitment,
            &d.decommit,
        )
        .is_err()
    });
    if !blame.is_empty() {
        return Err(KeygenError::Aborted(blame));
    }

    tracer.stage("Validate data sizes");
    let blame = tss_engine::blame::collect_simple_blame(&decommitments, |d| {
        d.feldman_coeffs.len() != usize::from(t) || d.rho_bytes.len() != L::SECURITY_BYTES
    });
    if !blame.is_empty() {
        return Err(KeygenError::Aborted(blame));
    }

    tracer.stage("Echo round-2 decommitments");
    let mut payloads_by_index: Vec<(u16, Vec<u8>)> = vec![(
        i,
        round2_payload(&feldman.coeffs, &sch_commit, &rho_bytes),
    )];
    for (j, _, d) in decommitments.iter_indexed() {
        payloads_by_index.push((j, round2_payload(&d.feldman_coeffs, &d.sch_commit, &d.rho_bytes)));
    }
    payloads_by_index.sort_by_key(|(j, _)| *j);
    let echo_hash =
        EchoHash::compute::<D>(payloads_by_index.into_iter().map(|(_, payload)| payload));
    tracer.send_msg();
    outgoings
        .send(Outgoing::broadcast(Msg::Echo(MsgEcho {
            hash: echo_hash.as_bytes().to_vec(),
        })))
        .await
        .map_err(KeygenError::SendError)?;
    tracer.msg_sent();

    tracer.round_begins();
    tracer.receive_msgs();
    let echoes = rounds
        .complete(echo_round)
        .await
        .map_err(KeygenError::ReceiveMessage)?;
    tracer.msgs_received();

    tracer.stage("Verify round-2 echoes agree");
    let blame = echo::verify_echoes(&echoes, |m: &MsgEcho| m.hash.as_slice());
    if !blame.is_empty() {
        return Err(KeygenError::Aborted(blame));
    }

    tracer.stage("Combine shared randomness and bk parameters");
    let rho: Vec<u8> = decommitments
        .iter()
        .map(|d| &d.rho_bytes)
        .fold(rho_bytes.clone(), tss_engine::blame::xor_array);

    let mut bks: Vec<(u16, BkParameter<E>)> = vec![(i, my_bk)];
    let mut all_coeffs: Vec<(u16, Vec<Point<E>>)> = vec![(i, feldman.coeffs.clone())];
    for (j, _, d) in decommitments.iter_indexed() {
        bks.push((j, d.bk));
        all_coeffs.push((j, d.feldman_coeffs.clone()));
    }
    bks.sort_by_key(|(j, _)| *j);
    all_coeffs.sort_by_key(|(j, _)| *j);
    let bks: Vec<BkParameter<E>> = bks.into_iter().map(|(_, b)| b).collect();
    let all_coeffs: Vec<Vec<Point<E>>> = all_coeffs.into_iter().map(|(_, c)| c).collect();

    tracer.stage("Compute and send shares");
    let my_share = poly.evaluate_derivative(usize::from(my_bk.rank), &my_bk.x);
    let mut my_secret = poly.evaluate(&Scalar::from(0u32));
    let challenge_i = Scalar::<E>::hash_concat(tag_htc, &[&i.to_be_bytes(), rho.as_ref()])
        .map_err(Bug::HashToScalarError)?;
    let challenge_i = schnorr_pok::Challenge { nonce: challenge_i };
    let sch_proof = schnorr_pok::prove(
        &sch_secret,
        &challenge_i,
        &SecretScalar::new(&mut my_secret),
    );

    for (j, _, d) in decommitments.iter_indexed() {
        let share = poly.evaluate_derivative(usize::from(d.bk.rank), &d.bk.x);
        tracer.send_msg();
        outgoings
            .send(Outgoing::p2p(
                j,
                Msg::Round3(MsgRound3 {
                    share,
                    sch_proof: sch_proof.clone(),
                }),
            ))
            .await
            .map_err(KeygenError::SendError)?;
        tracer.msg_sent();
    }

    tracer.round_begins();
    tracer.receive_msgs();
    let shares_msg = rounds
        .complete(round3)
        .await
        .map_err(KeygenError::ReceiveMessage)?;
    tracer.msgs_received();

    tracer.stage("Validate received shares against Feldman commitments and Schnorr proofs");
    let blame = try_collect_blame(&decommitments, &shares_msg, |j, d, msg| {
        let expected_share_point = FeldmanCommitments {
            coeffs: d.feldman_coeffs.clone(),
        }
        .evaluate(&my_bk);
        if expected_share_point != Point::generator() * msg.share {
            return Ok(true);
        }

        let challenge_j = Scalar::<E>::hash_concat(tag_htc, &[&j.to_be_bytes(), rho.as_ref()])
            .map_err(Bug::HashToScalarError)?;
        let challenge_j = schnorr_pok::Challenge { nonce: challenge_j };
        let constant_term = FeldmanCommitments {
            coeffs: d.feldman_coeffs.clone(),
        }
        .public_key();
        Ok(msg
            .sch_proof
            .verify(&d.sch_commit, &challenge_j, &constant_term)
            .is_err())
    })?;
    if !blame.is_empty() {
        return Err(KeygenError::Aborted(blame));
    }

    tracer.stage("Aggregate own share and public shares");
    let mut x = shares_msg.iter().fold(my_share, |acc, m| acc + m.share);
    let x = SecretScalar::new(&mut x);

    let shared_public_key = all_coeffs
        .iter()
        .map(|c| {
            FeldmanCommitments {
                coeffs: c.clone(),
            }
            .public_key()
        })
        .fold(Point::zero(), |acc, p| acc + p);

    let public_shares: Vec<Point<E>> = bks
        .iter()
        .map(|bk| {
            all_coeffs
                .iter()
                .map(|c| FeldmanCommitments { coeffs: c.clone() }.evaluate(bk))
                .fold(Point::zero(), |acc, p| acc + p)
        })
        .collect();

    let mut rid = L::Rid::default();
    let rid_len = rid.as_mut().len();
    rid.as_mut().copy_from_slice(&rho[..rid_len]);

    tracer.stage("Validate and output the key share");
    let core_share = IncompleteKeyShare {
        i,
        b: my_bk,
        shared_public_key,
        rid,
        bks,
        public_shares,
        x,
    };
    let share = Valid::try_from(core_share).map_err(|_| Bug::InvalidShare)?;

    tracer.protocol_ends();
    Ok(share)
}

#[derive(Debug, Error)]
pub enum KeygenError<RecvErr, SendErr> {
    #[error("send message")]
    SendError(#[source] SendErr),
    #[error("receive message")]
    ReceiveMessage(#[source] round_based::rounds_router::errors::CompleteRoundError<RecvErr>),
    #[error("protocol was maliciously aborted")]
    Aborted(Vec<AbortBlame>),
    #[error("internal bug")]
    Bug(#[from] Bug),
}

#[derive(Debug, Error)]
pub enum Bug {
    #[error("`sid` cannot be turned into a `generic_ec` hash-to-curve tag")]
    InvalidHashToCurveTag,
    #[error("couldn't hash a message to a scalar")]
    HashToScalarError(#[source] generic_ec::errors::HashError),
    #[error("the key share we just assembled fails its own validation")]
    InvalidShare,
}

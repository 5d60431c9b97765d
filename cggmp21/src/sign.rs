//! Threshold ECDSA signing (CGGMP21 §4.8): MtA share conversion over
//! additively homomorphic Paillier encryption, a battery of Π_enc/Π_aff-g/
//! Π_log* range proofs, and an identifiable-abort check on the final
//! `δ·G = Δ` consistency equation.
//!
//! Every party runs with the full complete [`KeyShare`] produced by
//! [`crate::key_refresh`]; the signers taking part in a given session are
//! named by their original keygen index in [`SigningBuilder::new`].

use digest::Digest;
use generic_ec::{Curve, Point, Scalar};
use paillier_zk::{
    unknown_order::BigNumber, BigNumberExt, SafePaillierDecryptionExt, SafePaillierEncryptionExt,
};
use rand_core::{CryptoRng, RngCore};
use round_based::{
    rounds_router::{simple_store::RoundInput, RoundsRouter},
    Delivery, Mpc, MpcParty, Outgoing, ProtocolMessage,
};
use thiserror::Error;
use tss_core::BkParameter;
use tss_engine::{
    blame::{collect_simple_blame, iter_peers, AbortBlame},
    execution_id::ProtocolChoice,
    progress::Tracer,
    ExecutionId,
};
use tss_paillier::{
    add_ciphertexts, encryption_key_from_n, sample_bigint_in_mult_group, scalar_mul_ciphertext,
    scalar_to_bignumber, PaillierKeyPair,
};
use tss_zk::{aff_g as π_aff_g, enc as π_enc, log_star as π_log_star};

use key_share::{KeyShare, SecurityLevel};

/// Message of the signing protocol
#[derive(ProtocolMessage, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum Msg<E: Curve> {
    Round1(MsgRound1),
    Round2Bcast(MsgRound2Bcast<E>),
    Round2P2p(MsgRound2P2p),
    Round3(MsgRound3<E>),
    Round4(MsgRound4<E>),
    Round5(MsgRound5<E>),
}

/// K_i, G_i and their range proofs
#[derive(Clone)]
pub struct MsgRound1 {
    K: BigNumber,
    G: BigNumber,
    enc_proof_k: π_enc::Proof,
    enc_proof_g: π_enc::Proof,
}

/// Γ_i = γ_i G, broadcast once so every peer's aff-g verification has the
/// public commitment to compare against
#[derive(Clone)]
pub struct MsgRound2Bcast<E: Curve> {
    Gamma: Point<E>,
}

/// D_{i,j}, F_{i,j} (MtA for δ) and D̂_{i,j}, F̂_{i,j} (MtA for χ), sent i -> j
#[derive(Clone)]
pub struct MsgRound2P2p {
    D: BigNumber,
    F: BigNumber,
    D_hat: BigNumber,
    F_hat: BigNumber,
    aff_g_proof: π_aff_g::Proof,
    aff_g_hat_proof: π_aff_g::Proof,
}

/// δ_i, Δ_i and the proof that Δ_i is consistent with K_i
#[derive(Clone)]
pub struct MsgRound3<E: Curve> {
    delta: Scalar<E>,
    Delta: Point<E>,
    log_star_proof: π_log_star::Proof,
}

/// σ_i, the final partial signature
#[derive(Clone)]
pub struct MsgRound4<E: Curve> {
    sigma: Scalar<E>,
}

/// Identifiable-abort evidence, published only on `δG ≠ Δ` (round 4):
/// every party's ephemeral `k_i`, `γ_i` and the masking values it chose for
/// each peer's δ-path MtA. None of this touches the secret key share or the
/// χ-path, so revealing it after an abort leaks nothing beyond this failed
/// session's own (now-discarded) nonces.
#[derive(Clone)]
pub struct MsgRound5<E: Curve> {
    k: Scalar<E>,
    gamma: Scalar<E>,
    k_nonce: BigNumber,
    gamma_nonce: BigNumber,
    openings: Vec<DeltaOpening<E>>,
}

/// `β_{i,peer}`, the mask party `i` chose when it sent its δ-path MtA
/// message to `peer`.
#[derive(Clone)]
pub struct DeltaOpening<E: Curve> {
    peer: u16,
    beta: Scalar<E>,
}

/// A complete ECDSA signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature<E: Curve> {
    pub r: Scalar<E>,
    pub s: Scalar<E>,
}

pub struct SigningBuilder<'a, E, L, D = sha2::Sha256>
where
    E: Curve,
    L: SecurityLevel,
    D: Digest,
{
    key_share: &'a KeyShare<E, L>,
    signers: Vec<u16>,
    execution_id: ExecutionId<'a, E, L, D>,
    tracer: Option<&'a mut dyn Tracer>,
}

impl<'a, E, L, D> SigningBuilder<'a, E, L, D>
where
    E: Curve,
    L: SecurityLevel,
    D: Digest,
{
    /// Starts a signing session against `key_share`, with `signers` naming
    /// the (≥ t) parties taking part by their original keygen index. The
    /// local party's own index must appear in `signers`.
    pub fn new(key_share: &'a KeyShare<E, L>, signers: Vec<u16>) -> Self {
        Self {
            key_share,
            signers,
            execution_id: Default::default(),
            tracer: None,
        }
    }

    /// Specifies another hash function to use
    ///
    /// _Caution_: this function overwrites [execution ID](Self::set_execution_id). Make sure
    /// you specify execution ID **after** calling this function.
    pub fn set_digest<D2: Digest>(self) -> SigningBuilder<'a, E, L, D2> {
        SigningBuilder {
            key_share: self.key_share,
            signers: self.signers,
            execution_id: Default::default(),
            tracer: None,
        }
    }

    pub fn set_execution_id(self, execution_id: ExecutionId<'a, E, L, D>) -> Self {
        Self {
            execution_id,
            ..self
        }
    }

    pub fn set_progress_tracer(mut self, tracer: &'a mut dyn Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Runs the signing protocol to completion, producing a signature over
    /// `message_digest` (the already-hashed message).
    pub async fn sign<R, M>(
        self,
        rng: &mut R,
        party: M,
        message_digest: Scalar<E>,
    ) -> Result<Signature<E>, SigningError<M::ReceiveError, M::SendError>>
    where
        R: RngCore + CryptoRng,
        M: Mpc<ProtocolMessage = Msg<E>>,
        E: Curve,
        L: SecurityLevel,
        D: Digest<OutputSize = digest::typenum::U32> + Clone + 'static,
    {
        run_signing(
            rng,
            party,
            self.execution_id,
            self.tracer,
            self.key_share,
            &self.signers,
            message_digest,
        )
        .await
    }
}

/// Sorts `bks` by `(rank, x)`, computes Birkhoff coefficients over the
/// sorted order, then un-permutes the result back so `lambdas[k]` lines up
/// with `bks[k]` again. `compute_bk_coefficient` itself returns coefficients
/// in its own sorted order, not the caller's.
fn bk_lambdas_in_original_order<E: Curve>(
    bks: &[BkParameter<E>],
) -> Result<Vec<Scalar<E>>, tss_core::BirkhoffError> {
    let t = bks.len();
    let mut order: Vec<usize> = (0..t).collect();
    order.sort_by(|&a, &b| {
        bks[a]
            .rank
            .cmp(&bks[b].rank)
            .then_with(|| bks[a].x.to_be_bytes().cmp(&bks[b].x.to_be_bytes()))
    });
    let sorted_bks: Vec<_> = order.iter().map(|&i| bks[i]).collect();
    let lambdas_sorted = tss_core::compute_bk_coefficient(&sorted_bks, t)?;
    let mut lambdas = vec![Scalar::<E>::zero(); t];
    for (pos, &orig_idx) in order.iter().enumerate() {
        lambdas[orig_idx] = lambdas_sorted[pos];
    }
    Ok(lambdas)
}

/// Reduces a point's affine x-coordinate to a scalar mod the curve order,
/// as required to turn the signature nonce `R` into `r`.
fn point_x_as_scalar<E: Curve>(p: &Point<E>) -> Result<Scalar<E>, Bug> {
    let bytes = p.to_be_bytes();
    let bytes: &[u8] = bytes.as_ref();
    let x_bytes = bytes.get(1..).ok_or(Bug::InvalidPointEncoding)?;
    Scalar::<E>::from_be_bytes(x_bytes).map_err(|_| Bug::InvalidPointEncoding)
}

#[allow(non_snake_case)]
#[allow(clippy::too_many_arguments)]
async fn run_signing<R, M, E, L, D>(
    rng: &mut R,
    party: M,
    execution_id: ExecutionId<'_, E, L, D>,
    mut tracer: Option<&mut dyn Tracer>,
    key_share: &KeyShare<E, L>,
    signers: &[u16],
    message_digest: Scalar<E>,
) -> Result<Signature<E>, SigningError<M::ReceiveError, M::SendError>>
where
    R: RngCore + CryptoRng,
    M: Mpc<ProtocolMessage = Msg<E>>,
    E: Curve,
    L: SecurityLevel,
    D: Digest<OutputSize = digest::typenum::U32> + Clone + 'static,
{
    tracer.protocol_begins();

    let t = u16::try_from(signers.len()).map_err(|_| Bug::TooManyParties)?;
    let my_keygen_index = key_share.core.i;
    let my_local_index = signers
        .iter()
        .position(|&k| k == my_keygen_index)
        .ok_or(Bug::NotASigner)?;
    let i = u16::try_from(my_local_index).map_err(|_| Bug::TooManyParties)?;

    tracer.stage("Setup networking");
    let MpcParty { delivery, .. } = party.into_party();
    let (incomings, mut outgoings) = delivery.split();

    let mut rounds = RoundsRouter::<Msg<E>>::builder();
    let round1 = rounds.add_round(RoundInput::<MsgRound1>::broadcast(i, t));
    let round2_bcast = rounds.add_round(RoundInput::<MsgRound2Bcast<E>>::broadcast(i, t));
    let round2_p2p = rounds.add_round(RoundInput::<MsgRound2P2p>::p2p(i, t));
    let round3 = rounds.add_round(RoundInput::<MsgRound3<E>>::broadcast(i, t));
    let round4 = rounds.add_round(RoundInput::<MsgRound4<E>>::broadcast(i, t));
    let round5 = rounds.add_round(RoundInput::<MsgRound5<E>>::broadcast(i, t));
    let mut rounds = rounds.listen(incomings);

    tracer.stage("Precompute execution id and shared state");
    let execution_id = execution_id.evaluate(ProtocolChoice::Signing);
    let sid = execution_id.as_slice();
    let shared_state = D::new_with_prefix(sid);

    tracer.stage("Compute Birkhoff coefficients for this signing session");
    let signing_bks: Vec<BkParameter<E>> = signers
        .iter()
        .map(|&k| key_share.core.bks[usize::from(k)])
        .collect();
    let lambdas =
        bk_lambdas_in_original_order(&signing_bks).map_err(|_| Bug::BirkhoffCoefficients)?;
    let my_lambda = lambdas[my_local_index];

    tracer.stage("Assemble own Paillier keypair and refined share");
    let own_keypair = PaillierKeyPair::from_pq(key_share.p.clone(), key_share.q.clone())
        .map_err(|_| Bug::PaillierKeyError)?;
    let own_n = own_keypair.n.clone();
    let own_aux = &key_share.parties[usize::from(my_keygen_index)];
    let x_i_refined = my_lambda * key_share.core.x.as_ref();
    let my_refined_point = key_share.core.public_shares[usize::from(my_keygen_index)] * &my_lambda;

    let enc_security = π_enc::SecurityParams {
        l: L::ELL,
        epsilon: L::EPSILON,
        q: L::q(),
    };
    let aff_g_security = π_aff_g::SecurityParams {
        l: L::ELL,
        epsilon: L::EPSILON,
        q: L::q(),
    };
    let log_star_security = π_log_star::SecurityParams {
        l: L::ELL_PRIME,
        epsilon: L::EPSILON,
        q: L::q(),
    };
    let own_zk_aux = π_enc::Aux {
        s: own_aux.s.clone(),
        t: own_aux.t.clone(),
        rsa_modulo: own_aux.N.clone(),
    };

    // Round 1
    tracer.round_begins();

    tracer.stage("Sample k_i, γ_i");
    let k_i = Scalar::<E>::random(rng);
    let gamma_i = Scalar::<E>::random(rng);
    if k_i == Scalar::<E>::zero() {
        return Err(SigningError::Aborted(ProtocolAbortReason::ZeroK));
    }
    let k_i_bn = scalar_to_bignumber::<E>(&k_i);
    let gamma_i_bn = scalar_to_bignumber::<E>(&gamma_i);

    tracer.stage("Encrypt K_i, G_i");
    let (K, k_nonce) = own_keypair
        .encrypt_with_random(rng, &k_i_bn)
        .ok_or(Bug::PaillierEnc)?;
    let (G, g_nonce) = own_keypair
        .encrypt_with_random(rng, &gamma_i_bn)
        .ok_or(Bug::PaillierEnc)?;

    tracer.stage("Prove Πenc for K_i, G_i");
    let enc_proof_k = π_enc::non_interactive::prove(
        shared_state.clone(),
        &own_zk_aux,
        π_enc::Data {
            key: own_keypair.encryption_key(),
            ciphertext: &K,
        },
        π_enc::PrivateData {
            plaintext: &k_i_bn,
            nonce: &k_nonce,
        },
        &enc_security,
        rng,
    )
    .map_err(Bug::PiEnc)?;
    let enc_proof_g = π_enc::non_interactive::prove(
        shared_state.clone(),
        &own_zk_aux,
        π_enc::Data {
            key: own_keypair.encryption_key(),
            ciphertext: &G,
        },
        π_enc::PrivateData {
            plaintext: &gamma_i_bn,
            nonce: &g_nonce,
        },
        &enc_security,
        rng,
    )
    .map_err(Bug::PiEnc)?;

    tracer.send_msg();
    outgoings
        .send(Outgoing::broadcast(Msg::Round1(MsgRound1 {
            K: K.clone(),
            G: G.clone(),
            enc_proof_k,
            enc_proof_g,
        })))
        .await
        .map_err(SigningError::SendError)?;
    tracer.msg_sent();

    // Round 2
    tracer.round_begins();

    tracer.receive_msgs();
    let round1_msgs = rounds
        .complete(round1)
        .await
        .map_err(SigningError::ReceiveMessage)?;
    tracer.msgs_received();

    tracer.stage("Validate Πenc for peers' K_j, G_j");
    let blame = collect_simple_blame(&round1_msgs, |m| {
        let data_k = π_enc::Data {
            key: own_keypair.encryption_key(),
            ciphertext: &m.K,
        };
        let data_g = π_enc::Data {
            key: own_keypair.encryption_key(),
            ciphertext: &m.G,
        };
        π_enc::non_interactive::verify(shared_state.clone(), &own_zk_aux, &data_k, &enc_security, &m.enc_proof_k)
            .is_err()
            || π_enc::non_interactive::verify(
                shared_state.clone(),
                &own_zk_aux,
                &data_g,
                &enc_security,
                &m.enc_proof_g,
            )
            .is_err()
    });
    if !blame.is_empty() {
        return Err(SigningError::Aborted2(ProtocolAborted::invalid_enc_proof(
            blame,
        )));
    }

    tracer.send_msg();
    let Gamma_i = Point::generator() * &gamma_i;
    outgoings
        .send(Outgoing::broadcast(Msg::Round2Bcast(MsgRound2Bcast {
            Gamma: Gamma_i,
        })))
        .await
        .map_err(SigningError::SendError)?;
    tracer.msg_sent();

    tracer.stage("Compute MtA shares for each peer");
    let mut betas = vec![BigNumber::zero(); usize::from(t)];
    let mut beta_hats = vec![BigNumber::zero(); usize::from(t)];
    for j in iter_peers(i, t) {
        let peer_keygen_index = signers[usize::from(j)];
        let peer_msg = round1_msgs
            .iter_indexed()
            .find(|(pj, _, _)| *pj == j)
            .map(|(_, _, m)| m)
            .ok_or(Bug::NotASigner)?;
        let peer_aux = &key_share.parties[usize::from(peer_keygen_index)];
        let peer_enc = encryption_key_from_n(&peer_aux.N);

        let beta = sample_bigint_in_mult_group(rng, &peer_aux.N);
        let beta_hat = sample_bigint_in_mult_group(rng, &peer_aux.N);
        let neg_beta = (&peer_aux.N - &beta) % &peer_aux.N;
        let neg_beta_hat = (&peer_aux.N - &beta_hat) % &peer_aux.N;

        let k_j_gamma_i = scalar_mul_ciphertext(&peer_enc, &peer_msg.K, &gamma_i_bn)
            .ok_or(Bug::PaillierEnc)?;
        let d_nonce = sample_bigint_in_mult_group(rng, &peer_aux.N);
        let neg_beta_ct = peer_enc
            .encrypt_with(&neg_beta, &d_nonce)
            .map_err(|_| Bug::PaillierEnc)?;
        let D = add_ciphertexts(&peer_enc, &k_j_gamma_i, &neg_beta_ct);
        let f_nonce = sample_bigint_in_mult_group(rng, &own_n);
        let F = own_keypair
            .encryption_key()
            .encrypt_with(&beta, &f_nonce)
            .map_err(|_| Bug::PaillierEnc)?;

        let x_i_refined_bn = scalar_to_bignumber::<E>(&x_i_refined);
        let k_j_x_i = scalar_mul_ciphertext(&peer_enc, &peer_msg.K, &x_i_refined_bn)
            .ok_or(Bug::PaillierEnc)?;
        let d_hat_nonce = sample_bigint_in_mult_group(rng, &peer_aux.N);
        let neg_beta_hat_ct = peer_enc
            .encrypt_with(&neg_beta_hat, &d_hat_nonce)
            .map_err(|_| Bug::PaillierEnc)?;
        let D_hat = add_ciphertexts(&peer_enc, &k_j_x_i, &neg_beta_hat_ct);
        let f_hat_nonce = sample_bigint_in_mult_group(rng, &own_n);
        let F_hat = own_keypair
            .encryption_key()
            .encrypt_with(&beta_hat, &f_hat_nonce)
            .map_err(|_| Bug::PaillierEnc)?;

        let aff_g_proof = π_aff_g::non_interactive::prove(
            shared_state.clone(),
            &π_aff_g::Aux {
                s: peer_aux.s.clone(),
                t: peer_aux.t.clone(),
                rsa_modulo: peer_aux.N.clone(),
            },
            π_aff_g::Data {
                key0: &peer_enc,
                key1: own_keypair.encryption_key(),
                c: &peer_msg.K,
                d: &D,
                y: &F,
                x: Gamma_i,
            },
            π_aff_g::PrivateData {
                x: &gamma_i_bn,
                y: &beta,
                nonce: &d_nonce,
                nonce_y: &f_nonce,
            },
            &aff_g_security,
            rng,
        )
        .map_err(Bug::PiAffG)?;

        let aff_g_hat_proof = π_aff_g::non_interactive::prove(
            shared_state.clone(),
            &π_aff_g::Aux {
                s: peer_aux.s.clone(),
                t: peer_aux.t.clone(),
                rsa_modulo: peer_aux.N.clone(),
            },
            π_aff_g::Data {
                key0: &peer_enc,
                key1: own_keypair.encryption_key(),
                c: &peer_msg.K,
                d: &D_hat,
                y: &F_hat,
                x: my_refined_point,
            },
            π_aff_g::PrivateData {
                x: &x_i_refined_bn,
                y: &beta_hat,
                nonce: &d_hat_nonce,
                nonce_y: &f_hat_nonce,
            },
            &aff_g_security,
            rng,
        )
        .map_err(Bug::PiAffG)?;

        betas[usize::from(j)] = beta;
        beta_hats[usize::from(j)] = beta_hat;

        tracer.send_msg();
        outgoings
            .send(Outgoing::p2p(
                j,
                Msg::Round2P2p(MsgRound2P2p {
                    D,
                    F,
                    D_hat,
                    F_hat,
                    aff_g_proof,
                    aff_g_hat_proof,
                }),
            ))
            .await
            .map_err(SigningError::SendError)?;
        tracer.msg_sent();
    }

    // Round 3
    tracer.round_begins();

    tracer.receive_msgs();
    let gammas = rounds
        .complete(round2_bcast)
        .await
        .map_err(SigningError::ReceiveMessage)?;
    let mtas = rounds
        .complete(round2_p2p)
        .await
        .map_err(SigningError::ReceiveMessage)?;
    tracer.msgs_received();

    let Gamma: Point<E> = gammas
        .iter_indexed()
        .map(|(_, _, m)| m.Gamma)
        .fold(Gamma_i, |acc, g| acc + g);

    tracer.stage("Decrypt incoming MtA shares, verify aff-g proofs");
    let mut alpha_sum = Scalar::<E>::zero();
    let mut alpha_hat_sum = Scalar::<E>::zero();
    let mut aff_g_blame = Vec::new();
    for (j, msg_id, m) in mtas.iter_indexed() {
        let sender_keygen_index = signers[usize::from(j)];
        let sender_aux = &key_share.parties[usize::from(sender_keygen_index)];
        let sender_gamma = gammas.iter_indexed().find(|(sj, _, _)| *sj == j).map(|(_, _, g)| g.Gamma);
        let Some(sender_gamma) = sender_gamma else {
            aff_g_blame.push(AbortBlame::new(j, msg_id, msg_id));
            continue;
        };
        let ok_d = π_aff_g::non_interactive::verify(
            shared_state.clone(),
            &π_aff_g::Aux {
                s: own_aux.s.clone(),
                t: own_aux.t.clone(),
                rsa_modulo: own_aux.N.clone(),
            },
            &π_aff_g::Data {
                key0: own_keypair.encryption_key(),
                key1: &encryption_key_from_n(&sender_aux.N),
                c: &K,
                d: &m.D,
                y: &m.F,
                x: sender_gamma,
            },
            &aff_g_security,
            &m.aff_g_proof,
        )
        .is_ok();
        let ok_d_hat = π_aff_g::non_interactive::verify(
            shared_state.clone(),
            &π_aff_g::Aux {
                s: own_aux.s.clone(),
                t: own_aux.t.clone(),
                rsa_modulo: own_aux.N.clone(),
            },
            &π_aff_g::Data {
                key0: own_keypair.encryption_key(),
                key1: &encryption_key_from_n(&sender_aux.N),
                c: &K,
                d: &m.D_hat,
                y: &m.F_hat,
                x: my_refined_point,
            },
            &aff_g_security,
            &m.aff_g_hat_proof,
        )
        .is_ok();
        if !ok_d || !ok_d_hat {
            aff_g_blame.push(AbortBlame::new(j, msg_id, msg_id));
            continue;
        }

        let alpha_bytes = own_keypair.decrypt(&m.D).ok_or(Bug::PaillierDec)?;
        let alpha_hat_bytes = own_keypair.decrypt(&m.D_hat).ok_or(Bug::PaillierDec)?;
        alpha_sum = alpha_sum + alpha_bytes.to_scalar::<E>();
        alpha_hat_sum = alpha_hat_sum + alpha_hat_bytes.to_scalar::<E>();
    }
    if !aff_g_blame.is_empty() {
        return Err(SigningError::Aborted2(ProtocolAborted::invalid_aff_g_proof(
            aff_g_blame,
        )));
    }

    tracer.stage("Compute δ_i, χ_i, Δ_i");
    let beta_sum = betas
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != usize::from(i))
        .fold(Scalar::<E>::zero(), |acc, (_, b)| acc + b.to_scalar::<E>());
    let beta_hat_sum = beta_hats
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != usize::from(i))
        .fold(Scalar::<E>::zero(), |acc, (_, b)| acc + b.to_scalar::<E>());

    let delta_i = gamma_i * k_i + alpha_sum + beta_sum;
    let chi_i = x_i_refined * k_i + alpha_hat_sum + beta_hat_sum;
    let Delta_i = Gamma * &k_i;

    let log_star_proof = π_log_star::non_interactive::prove(
        shared_state.clone(),
        &own_zk_aux,
        π_log_star::Data {
            key: own_keypair.encryption_key(),
            ciphertext: &K,
            g: Gamma,
            x: Delta_i,
        },
        π_log_star::PrivateData {
            x: &k_i_bn,
            nonce: &k_nonce,
        },
        &log_star_security,
        rng,
    )
    .map_err(Bug::PiLogStar)?;

    tracer.send_msg();
    outgoings
        .send(Outgoing::broadcast(Msg::Round3(MsgRound3 {
            delta: delta_i,
            Delta: Delta_i,
            log_star_proof,
        })))
        .await
        .map_err(SigningError::SendError)?;
    tracer.msg_sent();

    // Round 4
    tracer.round_begins();

    tracer.receive_msgs();
    let round3_msgs = rounds
        .complete(round3)
        .await
        .map_err(SigningError::ReceiveMessage)?;
    tracer.msgs_received();

    tracer.stage("Validate Πlog* for δ_j, Δ_j");
    let mut log_star_blame = Vec::new();
    for (j, msg_id, m) in round3_msgs.iter_indexed() {
        let sender_keygen_index = signers[usize::from(j)];
        let sender_aux = &key_share.parties[usize::from(sender_keygen_index)];
        let sender_K = round1_msgs
            .iter_indexed()
            .find(|(pj, _, _)| *pj == j)
            .map(|(_, _, m)| &m.K);
        let Some(sender_K) = sender_K else {
            log_star_blame.push(AbortBlame::new(j, msg_id, msg_id));
            continue;
        };
        let ok = π_log_star::non_interactive::verify(
            shared_state.clone(),
            &π_log_star::Aux {
                s: sender_aux.s.clone(),
                t: sender_aux.t.clone(),
                rsa_modulo: sender_aux.N.clone(),
            },
            &π_log_star::Data {
                key: &encryption_key_from_n(&sender_aux.N),
                ciphertext: sender_K,
                g: Gamma,
                x: m.Delta,
            },
            &log_star_security,
            &m.log_star_proof,
        )
        .is_ok();
        if !ok {
            log_star_blame.push(AbortBlame::new(j, msg_id, msg_id));
        }
    }
    if !log_star_blame.is_empty() {
        return Err(SigningError::Aborted2(ProtocolAborted::invalid_log_star_proof(
            log_star_blame,
        )));
    }

    tracer.stage("Combine δ, Δ and verify consistency");
    let delta: Scalar<E> = round3_msgs
        .iter_indexed()
        .map(|(_, _, m)| m.delta)
        .fold(delta_i, |acc, d| acc + d);
    let Delta: Point<E> = round3_msgs
        .iter_indexed()
        .map(|(_, _, m)| m.Delta)
        .fold(Delta_i, |acc, d| acc + d);

    if delta == Scalar::<E>::zero() {
        return Err(SigningError::Aborted(ProtocolAbortReason::ZeroK));
    }
    if Point::generator() * &delta != Delta {
        tracer.stage("δG != Δ: publish identifiable-abort evidence for the δ-path MtA");
        let openings = iter_peers(i, t)
            .map(|j| DeltaOpening {
                peer: j,
                beta: betas[usize::from(j)].to_scalar::<E>(),
            })
            .collect();
        tracer.send_msg();
        outgoings
            .send(Outgoing::broadcast(Msg::Round5(MsgRound5 {
                k: k_i,
                gamma: gamma_i,
                k_nonce: k_nonce.clone(),
                gamma_nonce: g_nonce.clone(),
                openings,
            })))
            .await
            .map_err(SigningError::SendError)?;
        tracer.msg_sent();

        tracer.receive_msgs();
        let round5_msgs = rounds
            .complete(round5)
            .await
            .map_err(SigningError::ReceiveMessage)?;
        tracer.msgs_received();

        let parties = identify_delta_cheaters(&round1_msgs, &round3_msgs, &round5_msgs, signers, key_share);
        let parties = if parties.is_empty() {
            // The arithmetic below should always pinpoint at least one party
            // whenever the recombination actually failed; if it somehow
            // doesn't, fall back to blaming the whole signer set rather than
            // claiming success.
            round3_msgs
                .iter_indexed()
                .map(|(j, msg_id, _)| AbortBlame::new(j, msg_id, msg_id))
                .collect()
        } else {
            parties
        };
        return Err(SigningError::Aborted2(ProtocolAborted::delta_mismatch(
            parties,
        )));
    }

    tracer.stage("Compute R, r");
    let delta_inv = delta.invert().ok_or(Bug::ZeroDelta)?;
    let R = Gamma * &delta_inv;
    if R == Point::zero() {
        return Err(SigningError::Aborted(ProtocolAbortReason::ZeroR));
    }
    let r = point_x_as_scalar(&R)?;

    tracer.stage("Compute and broadcast σ_i");
    let sigma_i = k_i * message_digest + r * chi_i;
    tracer.send_msg();
    outgoings
        .send(Outgoing::broadcast(Msg::Round4(MsgRound4 { sigma: sigma_i })))
        .await
        .map_err(SigningError::SendError)?;
    tracer.msg_sent();

    tracer.receive_msgs();
    let round4_msgs = rounds
        .complete(round4)
        .await
        .map_err(SigningError::ReceiveMessage)?;
    tracer.msgs_received();

    tracer.stage("Assemble and verify signature");
    let s: Scalar<E> = round4_msgs
        .iter_indexed()
        .map(|(_, _, m)| m.sigma)
        .fold(sigma_i, |acc, x| acc + x);
    if s == Scalar::<E>::zero() {
        return Err(SigningError::Aborted(ProtocolAbortReason::ZeroS));
    }

    let public_key = key_share.core.shared_public_key;
    if !verify_ecdsa(public_key, message_digest, r, s) {
        return Err(SigningError::Aborted(ProtocolAbortReason::VerifyFailed));
    }

    tracer.protocol_ends();
    Ok(Signature { r, s })
}

/// Recombines every signer's declared `δ_i` (round 3) from the round-5
/// evidence and compares it against what they actually broadcast, pinpointing
/// whichever signer's declared value doesn't follow from their own revealed
/// `(k_i, γ_i)` and the β masks exchanged with every peer. A signer whose
/// revealed `(k_i, γ_i, k_nonce, γ_nonce)` doesn't even re-encrypt to their
/// own round-1 `K_i`/`G_i` is blamed immediately, without needing the
/// recombination at all.
#[allow(non_snake_case)]
fn identify_delta_cheaters<E, L>(
    round1_msgs: &round_based::rounds_router::simple_store::RoundMsgs<MsgRound1>,
    round3_msgs: &round_based::rounds_router::simple_store::RoundMsgs<MsgRound3<E>>,
    round5_msgs: &round_based::rounds_router::simple_store::RoundMsgs<MsgRound5<E>>,
    signers: &[u16],
    key_share: &KeyShare<E, L>,
) -> Vec<AbortBlame>
where
    E: Curve,
    L: SecurityLevel,
{
    let t = signers.len();
    let mut beta = vec![vec![None; t]; t];
    for (sender, _, m) in round5_msgs.iter_indexed() {
        for opening in &m.openings {
            let peer = usize::from(opening.peer);
            if peer < t {
                beta[usize::from(sender)][peer] = Some(opening.beta);
            }
        }
    }

    let mut blame = Vec::new();
    for (p, msg_id, m5) in round5_msgs.iter_indexed() {
        let p_usize = usize::from(p);

        let Some((_, r1_id, m1)) = round1_msgs.iter_indexed().find(|(j, _, _)| *j == p) else {
            blame.push(AbortBlame::new(p, msg_id, msg_id));
            continue;
        };
        let Some((_, r3_id, m3)) = round3_msgs.iter_indexed().find(|(j, _, _)| *j == p) else {
            blame.push(AbortBlame::new(p, msg_id, msg_id));
            continue;
        };

        let peer_keygen_index = signers[p_usize];
        let peer_aux = &key_share.parties[usize::from(peer_keygen_index)];
        let peer_enc = encryption_key_from_n(&peer_aux.N);

        let k_ct = peer_enc.encrypt_with(&scalar_to_bignumber::<E>(&m5.k), &m5.k_nonce);
        let gamma_ct = peer_enc.encrypt_with(&scalar_to_bignumber::<E>(&m5.gamma), &m5.gamma_nonce);
        let opens_cleanly =
            matches!(&k_ct, Ok(c) if *c == m1.K) && matches!(&gamma_ct, Ok(c) if *c == m1.G);
        if !opens_cleanly {
            blame.push(AbortBlame::new(p, r1_id, msg_id));
            continue;
        }

        let mut declared = m5.gamma * m5.k;
        let mut consistent = true;
        for j in iter_peers(p, t as u16) {
            let j_usize = usize::from(j);
            let (Some(beta_jp), Some((_, _, m5j))) = (
                beta[j_usize][p_usize],
                round5_msgs.iter_indexed().find(|(idx, _, _)| *idx == j),
            ) else {
                consistent = false;
                break;
            };
            declared = declared + (m5.k * m5j.gamma - beta_jp);
        }
        if consistent {
            for j in iter_peers(p, t as u16) {
                match beta[p_usize][usize::from(j)] {
                    Some(beta_pj) => declared = declared + beta_pj,
                    None => {
                        consistent = false;
                        break;
                    }
                }
            }
        }
        if !consistent {
            blame.push(AbortBlame::new(p, msg_id, msg_id));
            continue;
        }

        if declared != m3.delta {
            blame.push(AbortBlame::new(p, r3_id, msg_id));
        }
    }
    blame
}

/// Stock single-party ECDSA verification: `R' = m s^-1 G + r s^-1 PK`, check
/// `R'.x == r`.
fn verify_ecdsa<E: Curve>(
    public_key: Point<E>,
    message_digest: Scalar<E>,
    r: Scalar<E>,
    s: Scalar<E>,
) -> bool {
    let Some(s_inv) = s.invert() else {
        return false;
    };
    let u1 = message_digest * s_inv;
    let u2 = r * s_inv;
    let R = Point::generator() * u1 + public_key * u2;
    match point_x_as_scalar(&R) {
        Ok(x) => x == r,
        Err(_) => false,
    }
}

#[derive(Debug, Error)]
pub enum SigningError<IErr, OErr> {
    #[error("protocol was aborted: {0}")]
    Aborted(ProtocolAbortReason),
    #[error("protocol was aborted by malicious party")]
    Aborted2(#[source] ProtocolAborted),
    #[error("receive message")]
    ReceiveMessage(
        #[source]
        round_based::rounds_router::CompleteRoundError<
            round_based::rounds_router::simple_store::RoundInputError,
            IErr,
        >,
    ),
    #[error("send message")]
    SendError(#[source] OErr),
    #[error("internal error")]
    InternalError(#[from] Bug),
}

/// Unexpected error in operation not caused by other parties
#[derive(Debug, Error)]
pub enum Bug {
    #[error("local party isn't part of the named signer set")]
    NotASigner,
    #[error("too many parties for u16 indices")]
    TooManyParties,
    #[error("unexpected error when creating paillier decryption key")]
    PaillierKeyError,
    #[error("paillier encryption failed")]
    PaillierEnc,
    #[error("couldn't decrypt a paillier ciphertext")]
    PaillierDec,
    #[error("couldn't prove a pi enc statement")]
    PiEnc(#[source] paillier_zk::Error),
    #[error("couldn't prove a pi aff-g statement")]
    PiAffG(#[source] paillier_zk::Error),
    #[error("couldn't prove a pi log* statement")]
    PiLogStar(#[source] paillier_zk::Error),
    #[error("failed to compute birkhoff coefficients for the signer set")]
    BirkhoffCoefficients,
    #[error("delta is zero, can't invert")]
    ZeroDelta,
    #[error("point has unexpected encoding")]
    InvalidPointEncoding,
}

/// Numeric edge cases the protocol aborts on (spec §4.8); not attributable
/// to a specific malicious party.
#[derive(Debug, Error)]
pub enum ProtocolAbortReason {
    #[error("k_i sampled as zero")]
    ZeroK,
    #[error("R is the identity point")]
    ZeroR,
    #[error("s is zero")]
    ZeroS,
    #[error("assembled signature doesn't verify")]
    VerifyFailed,
}

/// Error indicating that protocol was aborted by malicious party
#[derive(Debug, Error)]
#[error("Protocol aborted; malicious parties: {parties:?}; reason: {reason}")]
pub struct ProtocolAborted {
    pub reason: ProtocolAbortedReason,
    pub parties: Vec<AbortBlame>,
}

#[derive(Debug, Error)]
pub enum ProtocolAbortedReason {
    #[error("invalid Πenc proof")]
    InvalidEncProof,
    #[error("invalid Πaff-g proof")]
    InvalidAffGProof,
    #[error("invalid Πlog* proof")]
    InvalidLogStarProof,
    #[error("δ G != Δ, but every individual Πlog* proof checked out")]
    DeltaMismatch,
}

macro_rules! make_factory {
    ($function:ident, $reason:ident) => {
        fn $function(parties: Vec<AbortBlame>) -> Self {
            Self {
                reason: ProtocolAbortedReason::$reason,
                parties,
            }
        }
    };
}
impl ProtocolAborted {
    make_factory!(invalid_enc_proof, InvalidEncProof);
    make_factory!(invalid_aff_g_proof, InvalidAffGProof);
    make_factory!(invalid_log_star_proof, InvalidLogStarProof);
    make_factory!(delta_mismatch, DeltaMismatch);
}

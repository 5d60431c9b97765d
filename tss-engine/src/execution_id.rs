//! Session-binding tag mixed into every hash commitment, challenge and
//! signature produced during a protocol run, so that transcripts from
//! distinct sessions (or distinct protocols run over the same session id)
//! can never be confused with one another (spec §4.5).

use core::marker::PhantomData;
use digest::Digest;
use generic_ec::Curve;
use key_share::SecurityLevel;

/// Which protocol a session id is bound to. Mixed into the evaluated
/// execution id so a transcript from one protocol can't be replayed as
/// though it belonged to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolChoice {
    Keygen,
    KeyRefresh,
    Presignature,
    Signing,
    FrostKeygen,
    FrostSigning,
    Bip32Derive,
}

impl ProtocolChoice {
    fn tag(self) -> &'static [u8] {
        match self {
            ProtocolChoice::Keygen => b"keygen",
            ProtocolChoice::KeyRefresh => b"key-refresh",
            ProtocolChoice::Presignature => b"presignature",
            ProtocolChoice::Signing => b"signing",
            ProtocolChoice::FrostKeygen => b"frost-keygen",
            ProtocolChoice::FrostSigning => b"frost-signing",
            ProtocolChoice::Bip32Derive => b"bip32-derive",
        }
    }
}

/// Builder for a session id: an application-supplied byte string, scoped to
/// a curve/security-level/digest combination so it can't be mixed up with an
/// execution id meant for a different instantiation.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionId<'a, E, L, D> {
    sid: &'a [u8],
    _curve: PhantomData<E>,
    _level: PhantomData<L>,
    _digest: PhantomData<D>,
}

impl<'a, E: Curve, L: SecurityLevel, D: Digest> ExecutionId<'a, E, L, D> {
    /// A new execution id built from an application-supplied session id.
    /// Every party running the protocol must supply the same bytes.
    pub fn new(sid: &'a [u8]) -> Self {
        Self {
            sid,
            _curve: PhantomData,
            _level: PhantomData,
            _digest: PhantomData,
        }
    }

    /// Binds this session id to a specific protocol, producing the byte
    /// string actually mixed into commitments and challenges.
    pub fn evaluate(self, protocol: ProtocolChoice) -> EvaluatedExecutionId {
        let digest = D::new()
            .chain_update(self.sid)
            .chain_update(protocol.tag())
            .chain_update(core::any::type_name::<E>().as_bytes())
            .finalize();
        EvaluatedExecutionId(digest.to_vec())
    }
}

impl<'a, E, L, D> Default for ExecutionId<'a, E, L, D> {
    fn default() -> Self {
        Self {
            sid: b"",
            _curve: PhantomData,
            _level: PhantomData,
            _digest: PhantomData,
        }
    }
}

/// The evaluated, protocol-bound session tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatedExecutionId(Vec<u8>);

impl EvaluatedExecutionId {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generic_ec::curves::Secp256k1;
    use key_share::security_level::ReasonablySecure;
    use sha2::Sha256;

    #[test]
    fn distinct_protocol_choices_evaluate_differently() {
        let eid = ExecutionId::<Secp256k1, ReasonablySecure, Sha256>::new(b"session-1");
        let a = eid.evaluate(ProtocolChoice::Keygen);
        let b = eid.evaluate(ProtocolChoice::KeyRefresh);
        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn same_session_and_protocol_evaluate_identically() {
        let eid = ExecutionId::<Secp256k1, ReasonablySecure, Sha256>::new(b"session-1");
        let a = eid.evaluate(ProtocolChoice::Keygen);
        let b = eid.evaluate(ProtocolChoice::Keygen);
        assert_eq!(a.as_slice(), b.as_slice());
    }
}

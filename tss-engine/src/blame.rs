//! Identifiable-abort bookkeeping: when a protocol detects a faulty
//! message, it reports which party sent it rather than just failing (spec
//! §4.5, §6 "identifiable abort").

use round_based::{rounds_router::simple_store::RoundMsgs, MsgId, PartyIndex};

/// A party that can be blamed for breaking the protocol, and the messages
/// that prove it.
#[derive(Debug)]
pub struct AbortBlame {
    pub faulty_party: PartyIndex,
    pub data_message: MsgId,
    pub proof_message: MsgId,
}

impl AbortBlame {
    pub fn new(faulty_party: PartyIndex, data_message: MsgId, proof_message: MsgId) -> Self {
        Self {
            faulty_party,
            data_message,
            proof_message,
        }
    }
}

/// Filter returns `true` for every faulty `(data, proof)` message pair.
pub fn collect_blame<D, P, F>(
    data_messages: &RoundMsgs<D>,
    proof_messages: &RoundMsgs<P>,
    mut filter: F,
) -> Vec<AbortBlame>
where
    F: FnMut(PartyIndex, &D, &P) -> bool,
{
    data_messages
        .iter_indexed()
        .zip(proof_messages.iter_indexed())
        .filter_map(|((j, data_id, data), (_, proof_id, proof))| {
            filter(j, data, proof).then(|| AbortBlame::new(j, data_id, proof_id))
        })
        .collect()
}

/// Like [`collect_blame`], but data and proof are the same message.
pub fn collect_simple_blame<D, F>(messages: &RoundMsgs<D>, mut filter: F) -> Vec<AbortBlame>
where
    F: FnMut(&D) -> bool,
{
    messages
        .iter_indexed()
        .filter_map(|(j, id, data)| filter(data).then(|| AbortBlame::new(j, id, id)))
        .collect()
}

/// Like [`collect_blame`], but the filter can fail; any failure aborts the
/// whole collection (e.g. an unrecoverable hash-to-scalar error).
pub fn try_collect_blame<E, D, P, F>(
    data_messages: &RoundMsgs<D>,
    proof_messages: &RoundMsgs<P>,
    mut filter: F,
) -> Result<Vec<AbortBlame>, E>
where
    F: FnMut(PartyIndex, &D, &P) -> Result<bool, E>,
{
    let mut out = Vec::new();
    for ((j, data_id, data), (_, proof_id, proof)) in data_messages
        .iter_indexed()
        .zip(proof_messages.iter_indexed())
    {
        if filter(j, data, proof)? {
            out.push(AbortBlame::new(j, data_id, proof_id));
        }
    }
    Ok(out)
}

/// Iterates the peers of party `i` among `n` parties (every index but `i`).
pub fn iter_peers(i: u16, n: u16) -> impl Iterator<Item = u16> {
    (0..n).filter(move |&x| x != i)
}

/// Drops the `n`-th item from an iterator.
pub fn but_nth<T, I: IntoIterator<Item = T>>(n: u16, iter: I) -> impl Iterator<Item = T> {
    iter.into_iter()
        .enumerate()
        .filter(move |(idx, _)| *idx != usize::from(n))
        .map(|(_, x)| x)
}

/// Given a list indexed by `iter_peers(j, n)` order (i.e. every party's
/// entry in `j`'s per-peer data, excluding `j` itself), finds party `i`'s
/// entry.
pub fn mine_from<T>(i: u16, j: u16, items: &[T]) -> &T {
    let idx = if i < j { i } else { i - 1 };
    &items[usize::from(idx)]
}

/// XORs `b` into `a` in place and returns it; used to combine every party's
/// contribution into a shared random tag (the `rid` of spec §3).
pub fn xor_array<A, B>(mut a: A, b: B) -> A
where
    A: AsMut<[u8]>,
    B: AsRef<[u8]>,
{
    a.as_mut()
        .iter_mut()
        .zip(b.as_ref())
        .for_each(|(x, y)| *x ^= *y);
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iter_peers_excludes_self() {
        let peers: Vec<u16> = iter_peers(2, 5).collect();
        assert_eq!(peers, vec![0, 1, 3, 4]);
    }

    #[test]
    fn mine_from_maps_back_to_peer_position() {
        // party 3's per-peer data, built over iter_peers(3, 5) = [0,1,2,4]
        let data = vec!["for-0", "for-1", "for-2", "for-4"];
        assert_eq!(*mine_from(0, 3, &data), "for-0");
        assert_eq!(*mine_from(4, 3, &data), "for-4");
    }

    #[test]
    fn xor_array_combines_bytes() {
        let a = [0b1010u8, 0b0011];
        let b = [0b0101u8, 0b0110];
        assert_eq!(xor_array(a, b), [0b1111, 0b0101]);
    }
}

//! Birkhoff interpolation: generalised Shamir secret sharing where each
//! share is the value of a derivative of the sharing polynomial, evaluated
//! at a per-party point.
//!
//! See spec §3 ("BkParameter") and §4.1 for the exact formulas implemented
//! here.

use core::cmp::Ordering;

use generic_ec::{Curve, Scalar};
use thiserror::Error;

/// Per-share parameters: the evaluation point `x` and the differentiation
/// order (`rank`) at which the share was taken. `rank = 0` is plain Shamir.
#[derive(Debug, Clone, Copy)]
pub struct BkParameter<E: Curve> {
    pub x: Scalar<E>,
    pub rank: u8,
}

impl<E: Curve> BkParameter<E> {
    pub fn new(x: Scalar<E>, rank: u8) -> Self {
        Self { x, rank }
    }

    /// Two bk parameters denote "the same share" iff `(x, rank)` match.
    pub fn same_share(&self, other: &Self) -> bool {
        self.rank == other.rank && cmp_scalar(&self.x, &other.x) == Ordering::Equal
    }
}

fn cmp_scalar<E: Curve>(a: &Scalar<E>, b: &Scalar<E>) -> Ordering {
    a.to_be_bytes().cmp(&b.to_be_bytes())
}

/// Sorts bk parameters ascending by `(rank, x)`, as required by the
/// "enough-rank" ordering check.
fn sorted_indices<E: Curve>(bks: &[BkParameter<E>]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..bks.len()).collect();
    idx.sort_by(|&i, &j| {
        bks[i]
            .rank
            .cmp(&bks[j].rank)
            .then_with(|| cmp_scalar(&bks[i].x, &bks[j].x))
    });
    idx
}

/// Checks the "enough-rank" prefix condition: after sorting by `(rank asc, x
/// asc)`, every prefix of length `k` has maximum rank `< k`.
fn enough_rank<E: Curve>(bks: &[BkParameter<E>]) -> bool {
    let order = sorted_indices(bks);
    for (k, &idx) in order.iter().enumerate() {
        if usize::from(bks[idx].rank) >= k + 1 {
            return false;
        }
    }
    true
}

#[derive(Debug, Error)]
pub enum BirkhoffError {
    #[error("field order is too small or not prime")]
    InvalidField,
    #[error("fewer bk parameters supplied than the threshold")]
    LargerThreshold,
    #[error("birkhoff matrix is not invertible (e.g. duplicate evaluation point)")]
    NotInvertableMatrix,
    #[error("no size-t subset of the supplied bk parameters satisfies the enough-rank property")]
    NoValidBks,
    #[error(
        "a size-t subset satisfies the enough-rank property but its birkhoff matrix is singular \
         (e.g. a duplicate (x, rank) pair)"
    )]
    InvalidBks,
}

/// `falling_factorial(n, k) = n! / (n-k)! = n (n-1) ... (n-k+1)`, computed in
/// the scalar field (all operands are small non-negative integers so no
/// field-order assumption beyond "large enough" is needed).
fn falling_factorial<E: Curve>(n: usize, k: usize) -> Scalar<E> {
    let mut acc = Scalar::<E>::from(1u32);
    for m in 0..k {
        acc = acc * Scalar::<E>::from((n - m) as u32);
    }
    acc
}

/// `x^p` via square-and-multiply.
fn pow<E: Curve>(x: &Scalar<E>, mut p: usize) -> Scalar<E> {
    let mut base = *x;
    let mut acc = Scalar::<E>::from(1u32);
    while p > 0 {
        if p & 1 == 1 {
            acc = acc * base;
        }
        base = base * base;
        p >>= 1;
    }
    acc
}

/// Builds the `t x t` Birkhoff matrix for the given (already size-`t`) bk
/// selection: row `i`, column `j` is `d^{r_i}/dx^{r_i} x^j` evaluated at
/// `x_i`, i.e. `falling_factorial(j, r_i) * x_i^{j - r_i}` (zero if `j <
/// r_i`).
fn birkhoff_matrix<E: Curve>(bks: &[BkParameter<E>]) -> Vec<Vec<Scalar<E>>> {
    let t = bks.len();
    bks.iter()
        .map(|bk| derivative_eval_coefficients(&bk.x, bk.rank, t))
        .collect()
}

/// Coefficients `[falling_factorial(j, rank) * x^(j-rank) for j in
/// 0..num_coeffs]`, i.e. the row of the Birkhoff matrix a party with bk
/// parameter `(x, rank)` would occupy against a polynomial with
/// `num_coeffs` coefficients. Used by Feldman/Pedersen commitment
/// verification to recombine public coefficient commitments without
/// needing the polynomial itself (spec §4.2).
pub fn derivative_eval_coefficients<E: Curve>(
    x: &Scalar<E>,
    rank: u8,
    num_coeffs: usize,
) -> Vec<Scalar<E>> {
    let r = usize::from(rank);
    (0..num_coeffs)
        .map(|j| {
            if j < r {
                Scalar::zero()
            } else {
                falling_factorial::<E>(j, r) * pow(x, j - r)
            }
        })
        .collect()
}

/// Inverts a square matrix over the scalar field via Gauss-Jordan
/// elimination with partial pivoting on "is nonzero".
fn invert_matrix<E: Curve>(m: &[Vec<Scalar<E>>]) -> Result<Vec<Vec<Scalar<E>>>, BirkhoffError> {
    let n = m.len();
    let mut a: Vec<Vec<Scalar<E>>> = m.to_vec();
    let mut inv: Vec<Vec<Scalar<E>>> = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j {
                        Scalar::from(1u32)
                    } else {
                        Scalar::zero()
                    }
                })
                .collect()
        })
        .collect();

    for col in 0..n {
        // find a pivot row with a nonzero entry in this column
        let pivot = (col..n).find(|&r| a[r][col] != Scalar::zero());
        let pivot = pivot.ok_or(BirkhoffError::NotInvertableMatrix)?;
        a.swap(col, pivot);
        inv.swap(col, pivot);

        let inv_pivot = a[col][col]
            .invert()
            .ok_or(BirkhoffError::NotInvertableMatrix)?;
        for j in 0..n {
            a[col][j] = a[col][j] * inv_pivot;
            inv[col][j] = inv[col][j] * inv_pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == Scalar::zero() {
                continue;
            }
            for j in 0..n {
                a[row][j] = a[row][j] - factor * a[col][j];
                inv[row][j] = inv[row][j] - factor * inv[col][j];
            }
        }
    }

    Ok(inv)
}

/// Computes the Birkhoff interpolation coefficients `[lambda_i]` such that
/// `f(0) = sum_i lambda_i * f^{(r_i)}(x_i)` for any polynomial `f` of degree
/// `< t`, given a size->=`t` set of bk parameters (only the first `t`, after
/// sorting by `(rank, x)`, are used).
pub fn compute_bk_coefficient<E: Curve>(
    bks: &[BkParameter<E>],
    t: usize,
) -> Result<Vec<Scalar<E>>, BirkhoffError> {
    if t == 0 {
        return Err(BirkhoffError::InvalidField);
    }
    if bks.len() < t {
        return Err(BirkhoffError::LargerThreshold);
    }
    let order = sorted_indices(bks);
    let selection: Vec<BkParameter<E>> = order[..t].iter().map(|&i| bks[i]).collect();

    let matrix = birkhoff_matrix(&selection);
    let inv = invert_matrix(&matrix)?;

    // lambda is row 0 of the inverse, but re-indexed back to the caller's
    // original ordering of `bks[..t]` isn't meaningful since we reordered;
    // callers address coefficients by the (sorted) selection order.
    Ok(inv[0].clone())
}

/// Full Birkhoff matrix inverse, needed by [`add_share_coefficients`].
fn compute_bk_matrix_inverse<E: Curve>(
    selection: &[BkParameter<E>],
) -> Result<Vec<Vec<Scalar<E>>>, BirkhoffError> {
    invert_matrix(&birkhoff_matrix(selection))
}

/// Validates that some size-`t` subset of `bks` is both "enough-rank" and
/// produces an invertible Birkhoff matrix.
///
/// - `Err(NoValidBks)`: no size-`t` subset passes the enough-rank prefix test.
/// - `Err(InvalidBks)`: a size-`t` subset passes the rank test but its matrix
///   is singular (e.g. a duplicate `(x, rank)` pair).
pub fn check_valid<E: Curve>(bks: &[BkParameter<E>], t: usize) -> Result<(), BirkhoffError> {
    if bks.len() < t || t == 0 {
        return Err(BirkhoffError::LargerThreshold);
    }

    let mut saw_rank_valid_subset = false;
    for combo in combinations(bks.len(), t) {
        let subset: Vec<BkParameter<E>> = combo.iter().map(|&i| bks[i]).collect();
        if !enough_rank(&subset) {
            continue;
        }
        saw_rank_valid_subset = true;
        if compute_bk_matrix_inverse(&subset).is_ok() {
            return Ok(());
        }
    }

    if saw_rank_valid_subset {
        Err(BirkhoffError::InvalidBks)
    } else {
        Err(BirkhoffError::NoValidBks)
    }
}

/// Coefficients a new, joining party (with bk `(x_new, r_new)`) would use to
/// express its share as a linear combination of the `t` existing parties'
/// shares, without re-running the whole DKG: for each existing party `i`,
///
/// `lambda_new,i = sum_{k=r_new}^{t-1} falling_factorial(k, k - r_new) *
/// x_new^{k - r_new} * (B^-1)_{k,i}`
pub fn add_share_coefficients<E: Curve>(
    existing: &[BkParameter<E>],
    t: usize,
    x_new: Scalar<E>,
    r_new: u8,
) -> Result<Vec<Scalar<E>>, BirkhoffError> {
    if existing.len() < t {
        return Err(BirkhoffError::LargerThreshold);
    }
    let order = sorted_indices(existing);
    let selection: Vec<BkParameter<E>> = order[..t].iter().map(|&i| existing[i]).collect();
    let inv = compute_bk_matrix_inverse(&selection)?;

    let r_new = usize::from(r_new);
    let mut out = vec![Scalar::<E>::zero(); t];
    for k in r_new..t {
        let factor = falling_factorial::<E>(k, k - r_new) * pow(&x_new, k - r_new);
        for i in 0..t {
            out[i] = out[i] + factor * inv[k][i];
        }
    }
    Ok(out)
}

/// Generates every size-`k` combination of indices `0..n`, in lexicographic
/// order. `n` choose `k` is assumed small (bounded by the number of parties
/// in a TSS instance).
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    if k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(k);
    fn go(start: usize, n: usize, k: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for i in start..n {
            current.push(i);
            go(i + 1, n, k, current, out);
            current.pop();
        }
    }
    go(0, n, k, &mut current, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use generic_ec::curves::Secp256k1;

    fn bk(x: u32, rank: u8) -> BkParameter<Secp256k1> {
        BkParameter::new(Scalar::from(x), rank)
    }

    #[test]
    fn plain_shamir_reconstructs_secret() {
        let secret = Scalar::<Secp256k1>::from(1234u32);
        let poly = crate::polynomial::Polynomial::from_coeffs(vec![
            secret,
            Scalar::from(7u32),
            Scalar::from(3u32),
        ]);
        let bks = vec![bk(1, 0), bk(2, 0), bk(3, 0)];
        let shares: Vec<_> = bks.iter().map(|b| poly.evaluate(&b.x)).collect();
        let lambdas = compute_bk_coefficient(&bks, 3).unwrap();
        let reconstructed = lambdas
            .iter()
            .zip(&shares)
            .fold(Scalar::zero(), |acc, (l, s)| acc + *l * s);
        assert_eq!(reconstructed, secret);
    }

    #[test]
    fn mixed_rank_reconstructs_secret() {
        // f(x) = 5 + 11x + 13x^2 + 17x^3
        let secret = Scalar::<Secp256k1>::from(5u32);
        let poly = crate::polynomial::Polynomial::from_coeffs(vec![
            secret,
            Scalar::from(11u32),
            Scalar::from(13u32),
            Scalar::from(17u32),
        ]);
        let bks = vec![bk(1, 0), bk(2, 1), bk(3, 2), bk(4, 3)];
        let shares: Vec<_> = bks
            .iter()
            .map(|b| poly.evaluate_derivative(usize::from(b.rank), &b.x))
            .collect();
        let lambdas = compute_bk_coefficient(&bks, 4).unwrap();
        let reconstructed = lambdas
            .iter()
            .zip(&shares)
            .fold(Scalar::zero(), |acc, (l, s)| acc + *l * s);
        assert_eq!(reconstructed, secret);
    }

    #[test]
    fn duplicate_x_is_not_invertible() {
        let bks = vec![bk(1, 0), bk(1, 0), bk(2, 0)];
        assert!(matches!(
            compute_bk_coefficient(&bks, 3),
            Err(BirkhoffError::NotInvertableMatrix)
        ));
    }

    #[test]
    fn duplicate_bk_among_threshold_is_invalid_bks() {
        let bks = vec![bk(1, 0), bk(1, 0), bk(2, 0)];
        assert!(matches!(check_valid(&bks, 3), Err(BirkhoffError::InvalidBks)));
    }

    #[test]
    fn not_enough_rank_is_no_valid_bks() {
        // three parties all at rank 1: the enough-rank prefix test requires
        // max rank < k for every prefix length k, so three rank-1 parties
        // (threshold 3) never qualify.
        let bks = vec![bk(1, 1), bk(2, 1), bk(3, 1)];
        assert!(matches!(check_valid(&bks, 3), Err(BirkhoffError::NoValidBks)));
    }
}

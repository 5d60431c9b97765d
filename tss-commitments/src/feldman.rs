//! Feldman commitment: publish `C_j = f_j * G` for every coefficient `f_j`
//! of the sharing polynomial, generalised to Birkhoff ranks (spec §4.2).
//!
//! A plain Shamir share at `x` is verified against `sum_j x^j C_j`; a
//! Birkhoff share at `(x, rank)` is verified against the same sum but with
//! the `x^j` monomials replaced by the rank's derivative-evaluation
//! coefficients (see [`tss_core::derivative_eval_coefficients`]).

use generic_ec::{Curve, Point, Scalar};
use tss_core::{BkParameter, Polynomial};

/// Public commitments to every coefficient of a sharing polynomial.
#[derive(Debug, Clone)]
pub struct FeldmanCommitments<E: Curve> {
    pub coeffs: Vec<Point<E>>,
}

impl<E: Curve> FeldmanCommitments<E> {
    /// Commits to every coefficient of `poly`.
    pub fn commit(poly: &Polynomial<E>) -> Self {
        let coeffs = poly.coeffs().iter().map(|f| Point::generator() * f).collect();
        Self { coeffs }
    }

    /// Number of coefficients committed to (`degree + 1`).
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// The committed polynomial's constant term, `f(0) * G`.
    pub fn public_key(&self) -> Point<E> {
        self.coeffs.first().copied().unwrap_or(Point::zero())
    }

    /// Recombines the coefficient commitments into the expected public
    /// share for a party holding bk parameter `bk`, i.e. `(G f)^{(rank)}(x)`.
    pub fn evaluate(&self, bk: &BkParameter<E>) -> Point<E> {
        let scalars = tss_core::derivative_eval_coefficients(&bk.x, bk.rank, self.coeffs.len());
        scalars
            .iter()
            .zip(&self.coeffs)
            .fold(Point::zero(), |acc, (s, c)| acc + *c * s)
    }

    /// Checks that `claimed_share * G` matches the recombined commitment
    /// for `bk`, i.e. verifies a revealed share `x_bk` without learning it.
    pub fn verify_share(&self, bk: &BkParameter<E>, claimed_share: &Scalar<E>) -> bool {
        self.evaluate(bk) == Point::generator() * claimed_share
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generic_ec::curves::Secp256k1;

    #[test]
    fn plain_shamir_share_matches_commitment() {
        let secret = Scalar::<Secp256k1>::from(42u32);
        let poly = Polynomial::from_coeffs(vec![secret, Scalar::from(9u32), Scalar::from(2u32)]);
        let commitments = FeldmanCommitments::commit(&poly);
        assert_eq!(commitments.public_key(), Point::generator() * secret);

        let bk = BkParameter::new(Scalar::from(5u32), 0);
        let share = poly.evaluate(&bk.x);
        assert!(commitments.verify_share(&bk, &share));
    }

    #[test]
    fn derivative_share_matches_commitment() {
        // f(x) = 3 + 4x + 5x^2 + 6x^3
        let secret = Scalar::<Secp256k1>::from(3u32);
        let poly = Polynomial::from_coeffs(vec![
            secret,
            Scalar::from(4u32),
            Scalar::from(5u32),
            Scalar::from(6u32),
        ]);
        let commitments = FeldmanCommitments::commit(&poly);

        let bk = BkParameter::new(Scalar::from(7u32), 2);
        let share = poly.evaluate_derivative(2, &bk.x);
        assert!(commitments.verify_share(&bk, &share));
    }

    #[test]
    fn wrong_share_fails_verification() {
        let secret = Scalar::<Secp256k1>::from(42u32);
        let poly = Polynomial::from_coeffs(vec![secret, Scalar::from(9u32)]);
        let commitments = FeldmanCommitments::commit(&poly);
        let bk = BkParameter::new(Scalar::from(5u32), 0);
        let wrong = Scalar::<Secp256k1>::from(1u32);
        assert!(!commitments.verify_share(&bk, &wrong));
    }
}

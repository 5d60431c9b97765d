//! Pedersen commitment: like [`crate::feldman`] but hiding, by committing to
//! `f_j * G + g_j * H` where `g` is an independently sampled salt polynomial
//! and `H` is a second generator with unknown discrete log wrt `G` (spec
//! §4.2). A share reveals both `f(x)` and `g(x)` (or their rank-derivatives)
//! so the verifier never learns `f`'s coefficients from the commitments
//! alone.

use generic_ec::{Curve, Point, Scalar};
use tss_core::{BkParameter, Polynomial};

/// Public commitments to the coefficients of a secret polynomial `f` blinded
/// by a salt polynomial `g`.
#[derive(Debug, Clone)]
pub struct PedersenCommitments<E: Curve> {
    pub coeffs: Vec<Point<E>>,
    pub h: Point<E>,
}

impl<E: Curve> PedersenCommitments<E> {
    /// Commits to `f` and `g` (must have equal degree) under hiding
    /// generator `h`.
    pub fn commit(f: &Polynomial<E>, g: &Polynomial<E>, h: Point<E>) -> Self {
        assert_eq!(f.coeffs().len(), g.coeffs().len(), "salt polynomial degree must match");
        let coeffs = f
            .coeffs()
            .iter()
            .zip(g.coeffs())
            .map(|(fj, gj)| Point::generator() * fj + h * gj)
            .collect();
        Self { coeffs, h }
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    fn recombine(&self, bk: &BkParameter<E>) -> Point<E> {
        let scalars = tss_core::derivative_eval_coefficients(&bk.x, bk.rank, self.coeffs.len());
        scalars
            .iter()
            .zip(&self.coeffs)
            .fold(Point::zero(), |acc, (s, c)| acc + *c * s)
    }

    /// Verifies a revealed `(f_share, g_share)` pair against the commitments
    /// for bk parameter `bk`.
    pub fn verify_share(
        &self,
        bk: &BkParameter<E>,
        f_share: &Scalar<E>,
        g_share: &Scalar<E>,
    ) -> bool {
        self.recombine(bk) == Point::generator() * f_share + self.h * g_share
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generic_ec::{
        curves::Secp256k1,
        hash_to_curve::{self, FromHash},
    };

    fn hiding_generator() -> Point<Secp256k1> {
        let tag = hash_to_curve::Tag::new(b"tss-commitments/pedersen/h").expect("valid tag");
        let s = Scalar::<Secp256k1>::hash_concat(tag, &[b"h" as &[u8]]).expect("hash to scalar");
        Point::generator() * s
    }

    #[test]
    fn plain_share_verifies() {
        let secret = Scalar::<Secp256k1>::from(11u32);
        let f = Polynomial::from_coeffs(vec![secret, Scalar::from(2u32)]);
        let g = Polynomial::from_coeffs(vec![Scalar::from(99u32), Scalar::from(5u32)]);
        let h = hiding_generator();
        let commitments = PedersenCommitments::commit(&f, &g, h);

        let bk = BkParameter::new(Scalar::from(3u32), 0);
        let f_share = f.evaluate(&bk.x);
        let g_share = g.evaluate(&bk.x);
        assert!(commitments.verify_share(&bk, &f_share, &g_share));
    }

    #[test]
    fn wrong_salt_share_fails() {
        let secret = Scalar::<Secp256k1>::from(11u32);
        let f = Polynomial::from_coeffs(vec![secret, Scalar::from(2u32)]);
        let g = Polynomial::from_coeffs(vec![Scalar::from(99u32), Scalar::from(5u32)]);
        let h = hiding_generator();
        let commitments = PedersenCommitments::commit(&f, &g, h);

        let bk = BkParameter::new(Scalar::from(3u32), 0);
        let f_share = f.evaluate(&bk.x);
        let wrong_g_share = Scalar::<Secp256k1>::from(0u32);
        assert!(!commitments.verify_share(&bk, &f_share, &wrong_g_share));
    }
}

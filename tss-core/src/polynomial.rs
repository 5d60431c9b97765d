//! Polynomials over the scalar field of a curve.

use generic_ec::{Curve, Scalar};
use rand_core::{CryptoRng, RngCore};

/// A polynomial `f(x) = coeffs[0] + coeffs[1] x + ... + coeffs[d] x^d` over
/// the scalar field of curve `E`.
///
/// The constant term `coeffs[0]` is "the secret" when the polynomial is used
/// for Shamir-like sharing.
#[derive(Debug, Clone)]
pub struct Polynomial<E: Curve> {
    coeffs: Vec<Scalar<E>>,
}

impl<E: Curve> Polynomial<E> {
    /// Builds a polynomial from its coefficients, lowest degree first.
    pub fn from_coeffs(coeffs: Vec<Scalar<E>>) -> Self {
        Self { coeffs }
    }

    /// Samples a random polynomial of the given degree.
    pub fn sample<R: RngCore + CryptoRng>(rng: &mut R, degree: usize) -> Self {
        let coeffs = (0..=degree).map(|_| Scalar::random(rng)).collect();
        Self { coeffs }
    }

    /// Samples a random polynomial of the given degree whose constant term is `secret`.
    pub fn sample_with_const_term<R: RngCore + CryptoRng>(
        rng: &mut R,
        degree: usize,
        secret: Scalar<E>,
    ) -> Self {
        let mut poly = Self::sample(rng, degree);
        poly.coeffs[0] = secret;
        poly
    }

    /// Degree of the polynomial (number of coefficients minus one).
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    pub fn coeffs(&self) -> &[Scalar<E>] {
        &self.coeffs
    }

    pub fn set_constant(&mut self, value: Scalar<E>) {
        if self.coeffs.is_empty() {
            self.coeffs.push(value);
        } else {
            self.coeffs[0] = value;
        }
    }

    /// Evaluates the polynomial at `x` using Horner's method.
    pub fn evaluate(&self, x: &Scalar<E>) -> Scalar<E> {
        let mut acc = Scalar::zero();
        for c in self.coeffs.iter().rev() {
            acc = acc * x + c;
        }
        acc
    }

    /// Returns the `k`-fold derivative of the polynomial.
    ///
    /// The result has degree `max(0, degree - k)`; differentiating past the
    /// degree yields the zero polynomial (a single zero coefficient).
    pub fn differentiate(&self, k: usize) -> Self {
        if k == 0 {
            return self.clone();
        }
        if k > self.degree() {
            return Self {
                coeffs: vec![Scalar::zero()],
            };
        }
        // coeffs'[j] = coeffs[j+k] * falling_factorial(j+k, k)
        let mut out = Vec::with_capacity(self.coeffs.len() - k);
        for j in 0..(self.coeffs.len() - k) {
            let mut factor = Scalar::<E>::from(1u32);
            for m in 0..k {
                factor = factor * Scalar::<E>::from((j + k - m) as u32);
            }
            out.push(self.coeffs[j + k] * factor);
        }
        Self { coeffs: out }
    }

    /// Evaluates the `k`-fold derivative of the polynomial at `x`.
    pub fn evaluate_derivative(&self, k: usize, x: &Scalar<E>) -> Scalar<E> {
        self.differentiate(k).evaluate(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generic_ec::curves::Secp256k1;

    #[test]
    fn degree_matches_coeff_count() {
        let p: Polynomial<Secp256k1> =
            Polynomial::from_coeffs(vec![Scalar::from(1u32), Scalar::from(2u32)]);
        assert_eq!(p.degree(), 1);
    }

    #[test]
    fn evaluate_horner_matches_naive() {
        let coeffs = vec![Scalar::from(3u32), Scalar::from(5u32), Scalar::from(7u32)];
        let p: Polynomial<Secp256k1> = Polynomial::from_coeffs(coeffs.clone());
        let x = Scalar::from(4u32);
        let naive = coeffs[0] + coeffs[1] * x + coeffs[2] * x * x;
        assert_eq!(p.evaluate(&x), naive);
    }

    #[test]
    fn first_derivative_of_quadratic() {
        // f(x) = 3 + 5x + 7x^2  =>  f'(x) = 5 + 14x
        let p: Polynomial<Secp256k1> =
            Polynomial::from_coeffs(vec![Scalar::from(3u32), Scalar::from(5u32), Scalar::from(7u32)]);
        let d = p.differentiate(1);
        assert_eq!(d.coeffs(), &[Scalar::from(5u32), Scalar::from(14u32)]);
    }

    #[test]
    fn differentiate_past_degree_is_zero() {
        let p: Polynomial<Secp256k1> =
            Polynomial::from_coeffs(vec![Scalar::from(3u32), Scalar::from(5u32)]);
        let d = p.differentiate(5);
        assert_eq!(d.coeffs(), &[Scalar::from(0u32)]);
    }
}

//! Secret-sharing substrate shared by every protocol in this workspace:
//! polynomials over a curve's scalar field, and Birkhoff interpolation
//! (generalised Shamir secret sharing with per-party differentiation rank).

pub mod birkhoff;
pub mod polynomial;

pub use birkhoff::{
    add_share_coefficients, check_valid, compute_bk_coefficient, derivative_eval_coefficients,
    BirkhoffError, BkParameter,
};
pub use polynomial::Polynomial;

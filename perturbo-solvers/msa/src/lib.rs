//! Successive-averages solvers for the perturbo equilibrium seams.
//!
//! Implements [`perturbo_core::EquilibriumEvaluator`] with the method of
//! successive averages (user equilibrium) and marginal-cost averaging
//! (system optimum), and [`perturbo_core::RouteCoupling`] with Yen's
//! k-cheapest-path enumeration.

mod coupling;
mod evaluator;
mod paths;

pub use coupling::KspCoupling;
pub use evaluator::MsaEvaluator;

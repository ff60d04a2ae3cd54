//! Authorization decisions over the caller's policies.
//!
//! [`crate::model::Rule::can_invoke`] and [`crate::model::Policy::can_invoke`]
//! are the pure matching functions; [`PolicyEvaluator`] loads the policies
//! and turns "no matching rule" into a denial.

mod evaluator;

pub use evaluator::{Decision, PolicyEvaluator};

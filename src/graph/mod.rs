//! Equations and the graph that orders them.
pub mod dag;
pub mod equation;
pub mod expr;

// Re-export key types for convenient access
pub use dag::{EquationGraph, ExecutionPlan};
pub use equation::{Dependency, Equation, Formula};
pub use expr::{Expr, Inputs};

//! Ready-made equation sets.
pub mod dairy;

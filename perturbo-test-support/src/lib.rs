//! Shared test utilities used across perturbo crates: canonical networks,
//! deterministic test doubles for the solver seams, and a tracing recording
//! layer for asserting structured diagnostics.

pub mod networks;
pub mod oracles;
pub mod scripted;
pub mod tracing;

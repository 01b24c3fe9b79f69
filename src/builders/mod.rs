//! Builders that assemble the admission layer from configuration.

pub mod gate_builder;

pub use gate_builder::{build_gate, AdmissionGate, GateParts};

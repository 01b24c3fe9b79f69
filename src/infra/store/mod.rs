//! Submission and object store backends.

pub mod memory;

pub use memory::{InMemoryObjectStore, InMemorySubmissionStore};

//! Infrastructure adapters for brokers, submission/object stores and fleet signals.

pub mod broker;
pub mod signals;
pub mod store;

pub use broker::{FileBroker, InMemoryBroker};
pub use signals::ReportedUtilization;
pub use store::{InMemoryObjectStore, InMemorySubmissionStore};

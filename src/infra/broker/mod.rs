//! Broker backends.

pub mod file;
pub mod memory;

pub use file::FileBroker;
pub use memory::InMemoryBroker;

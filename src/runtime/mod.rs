//! Runtime adapters and API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{
    autoscale_targets, health, list_pools, submit, submit_source, Health, PoolSnapshot,
    SourceSubmission, SubmitResponse,
};
pub use tokio_spawner::TokioSpawner;

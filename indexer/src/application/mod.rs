pub mod cleanup;
pub mod pipeline;
pub mod scheduler;

pub use cleanup::CleanupJob;
pub use pipeline::{HeightLocks, Pipeline, RunMode};
pub use scheduler::Scheduler;

//! Vignette Worker Library
//!
//! Deferred execution of thumbnail generation. A triggering request hands jobs to an
//! [`EndOfRequestScheduler`], which deduplicates them and passes them on to the
//! [`JobQueue`] once the request is over. The queue runs jobs on a bounded worker pool
//! through a [`JobHandler`], normally the [`GenerationJobHandler`].

pub mod context;
pub mod coordinator;
pub mod handler;
pub mod queue;
pub mod request_scope;
pub mod scheduler;

pub use context::{empty_handler_weak, JobHandler, JobOutcome};
pub use coordinator::{ExecutionMode, RequestOutcome, ThumbnailCoordinator};
pub use handler::GenerationJobHandler;
pub use queue::{JobQueue, JobQueueConfig, QueueStats};
pub use request_scope::EndOfRequestScheduler;
pub use scheduler::{JobSink, Scheduler};

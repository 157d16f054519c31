//! Scheduled video post worker.
//!
//! This crate provides:
//! - Submission validation and logo staging
//! - A timer-driven scheduler with bounded concurrency
//! - The fetch, compose and publish pipeline
//! - Per-job scratch storage released on every exit path
//! - Graceful shutdown

pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod publish;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod scratch;
pub mod service;

pub use config::WorkerConfig;
pub use directory::{DestinationDirectory, StaticDirectory};
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use orchestrator::Pipeline;
pub use publish::{
    PublishError, PublishReceipt, Publisher, PublisherSet, SocialPagePublisher,
    VideoHostPublisher,
};
pub use registry::JobRegistry;
pub use scheduler::Scheduler;
pub use scratch::{JobScratch, ScratchSpace};
pub use service::JobService;

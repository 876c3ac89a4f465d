//! # Optimizer Module
//!
//! Orchestrazione dei job, separata in due sottomoduli:
//! - `job_scheduler`: pool limitato, polling e drain dei job
//! - `task_optimizer`: corpo del singolo job (classifica e dispatch)

pub mod job_scheduler;
pub mod task_optimizer;

pub use job_scheduler::{JobId, JobScheduler, JobState};
pub use task_optimizer::TaskOptimizer;

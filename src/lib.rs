pub mod cache;
pub mod config;
pub mod corpus;
pub mod schedule;
pub mod scheduler;

pub use config::Config;
pub use scheduler::{Scheduler, SchedulerError};

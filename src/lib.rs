pub mod config;
pub mod db;
pub mod error;
pub mod explain;
pub mod export;
pub mod trainer;
pub mod workload;

pub use error::{Result, WorkloadError};

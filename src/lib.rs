// src/lib.rs

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod fs_store; // file:// backend
pub mod key;
pub mod latency;
pub mod memory_store; // mem:// backend and fault injection for tests
pub mod metrics;
pub mod operation;
pub mod progress;
pub mod runner;
pub mod size_parser;
pub mod storage;

pub use context::BenchmarkContext;
pub use error::{ExecutionError, ProvisioningError};
pub use key::{object_key, KeyGenerator};
pub use latency::Latency;
pub use operation::{Operation, ReadOperation};
pub use storage::{create_store_for_uri, ObjectStream, StorageClient};

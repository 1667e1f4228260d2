pub mod cache;
pub mod checksum;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod lock;
pub mod remote;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use client::{Client, DialReport, ExecutorUpdate, ServiceOutcome};
pub use config::ClientConfig;
pub use context::{Context, ContextKey};
pub use error::{ClientError, RemoteError, Result};
pub use remote::{ExecutorStream, RemoteServices};
pub use types::{ClientRole, ExecutorInfo, InstanceId, ServiceInfo, SupportedOps};

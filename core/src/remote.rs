//! Remote service facade
//!
//! The client consumes the control plane through this trait. Transport,
//! TLS and wire encoding live in the implementation.

use std::collections::HashMap;

use tokio::io::AsyncRead;

use crate::context::Context;
use crate::error::RemoteError;
use crate::store::Store;
use crate::types::{ExecutorInfo, InstanceId, ServiceInfo, SupportedOps};

/// Byte stream of an executor binary
pub type ExecutorStream = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait::async_trait]
pub trait RemoteServices: Send + Sync {
    /// Name the remote server reports for itself
    fn server_name(&self) -> String;

    /// All services, keyed by name
    async fn services(&self, ctx: &Context) -> Result<HashMap<String, ServiceInfo>, RemoteError>;

    /// All executors, keyed by executor name
    async fn executors(&self, ctx: &Context)
        -> Result<HashMap<String, ExecutorInfo>, RemoteError>;

    /// Download the executor binary called `name`
    async fn executor_get(&self, ctx: &Context, name: &str) -> Result<ExecutorStream, RemoteError>;

    /// Operations `service` supports on this node
    async fn supported(
        &self,
        ctx: &Context,
        service: &ServiceInfo,
        store: &mut Store,
    ) -> Result<SupportedOps, RemoteError>;

    /// This node's identity for `service`. `RemoteError::NotImplemented` is
    /// an expected outcome for drivers without instance IDs.
    async fn instance_id(
        &self,
        ctx: &Context,
        service: &ServiceInfo,
        store: &mut Store,
    ) -> Result<InstanceId, RemoteError>;
}

//! Storage client core
//!
//! `Client` owns the caches and drives the bootstrap sequence:
//!
//! - `dial`: list services, refresh the executor (agents only), then resolve
//!   supported operations and instance IDs per service
//! - `update_executor`: checksum-guarded executor download under the
//!   cross-process lock
//!
//! Caches start empty and are read-only outside `dial`. A pass builds its
//! tables on the side and swaps them in only once every step succeeded.

mod dial;
mod executor;
mod services;


pub use dial::DialReport;
pub use executor::ExecutorUpdate;
pub use services::ServiceOutcome;

use std::path::Path;
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::{ClientConfig, ServerConfig};
use crate::context::Context;
use crate::error::{ClientError, Result};
use crate::host::get_host;
use crate::lock::{FileMutex, NamedMutex};
use crate::remote::RemoteServices;
use crate::types::{ClientRole, ExecutorInfo, InstanceId, PathConfig, ServiceInfo, SupportedOps};

pub struct Client {
    remote: Arc<dyn RemoteServices>,
    role: ClientRole,
    paths: PathConfig,
    server: ServerConfig,
    no_download: bool,
    ctx: Context,
    lsx_mutex: Arc<dyn NamedMutex>,
    tables: Tables,
}

/// The four lookup tables filled by a bootstrap pass
#[derive(Debug, Default, Clone)]
pub(crate) struct Tables {
    pub(crate) executors: Cache<ExecutorInfo>,
    pub(crate) services: Cache<ServiceInfo>,
    pub(crate) supported: Cache<SupportedOps>,
    pub(crate) instance_ids: Cache<InstanceId>,
}

impl Tables {
    pub(crate) fn service(&self, name: &str) -> Result<&ServiceInfo> {
        self.services
            .get(name)
            .ok_or_else(|| ClientError::UnknownService {
                name: name.to_string(),
            })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("role", &self.role)
            .field("lsx", &self.paths.lsx)
            .field("executors", &self.tables.executors.len())
            .field("services", &self.tables.services.len())
            .field("instance_ids", &self.tables.instance_ids.len())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client with empty caches. The executor lock is a file lock
    /// at the configured lock path.
    pub fn new(config: ClientConfig, remote: Arc<dyn RemoteServices>) -> Result<Self> {
        config.validate()?;
        let paths = config.paths();
        let lsx_mutex: Arc<dyn NamedMutex> = Arc::new(FileMutex::new(paths.lsx_lock.clone()));
        Ok(Self {
            remote,
            role: config.client_type,
            paths,
            server: config.server,
            no_download: config.executor.no_download,
            ctx: Context::new(),
            lsx_mutex,
            tables: Tables::default(),
        })
    }

    /// Replace the executor lock
    pub fn with_mutex(mut self, mutex: Arc<dyn NamedMutex>) -> Self {
        self.lsx_mutex = mutex;
        self
    }

    pub fn role(&self) -> ClientRole {
        self.role
    }

    pub fn is_controller(&self) -> bool {
        self.role == ClientRole::Controller
    }

    /// Context established by the last `dial`
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn server_name(&self) -> String {
        self.remote.server_name()
    }

    /// Logical host of the configured server endpoint
    pub fn host(&self) -> String {
        get_host(
            &self.server.proto,
            &self.server.address,
            self.server.tls.as_ref(),
        )
    }

    pub fn executor_path(&self) -> &Path {
        self.paths.lsx()
    }

    pub fn executor_info(&self, name: &str) -> Option<&ExecutorInfo> {
        self.tables.executors.get(name)
    }

    /// Look up a service in the service cache
    pub fn service_info(&self, name: &str) -> Result<&ServiceInfo> {
        self.tables.service(name)
    }

    pub fn service_names(&self) -> Vec<String> {
        self.tables.services.keys()
    }

    pub fn cached_supported(&self, service: &str) -> Option<SupportedOps> {
        self.tables.supported.get(service).copied()
    }

    pub fn cached_instance_id(&self, service: &str) -> Option<&InstanceId> {
        self.tables.instance_ids.get(service)
    }

    fn require_agent(&self, op: &'static str) -> Result<()> {
        if self.is_controller() {
            return Err(ClientError::UnsupportedForRole {
                role: self.role,
                op,
            });
        }
        Ok(())
    }
}

//! In-process fake of the remote service facade

use md5::{Digest, Md5};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::context::Context;
use crate::error::RemoteError;
use crate::remote::{ExecutorStream, RemoteServices};
use crate::store::Store;
use crate::types::{ExecutorInfo, InstanceId, ServiceInfo, SupportedOps};

/// How the fake answers an instance ID request
#[derive(Debug, Clone)]
pub enum IdentityBehavior {
    Id(String),
    NotImplemented,
    Fail(String),
}

pub struct FakeRemote {
    pub executor_name: String,
    binary: Mutex<Vec<u8>>,
    services: Mutex<HashMap<String, ServiceInfo>>,
    supported: Mutex<HashMap<String, SupportedOps>>,
    identities: Mutex<HashMap<String, IdentityBehavior>>,
    pub fail_services: AtomicBool,
    pub fail_executor_get: AtomicBool,
    pub downloads: AtomicUsize,
    pub instance_id_calls: Mutex<Vec<String>>,
    pub supported_calls: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn new(executor_name: &str, binary: &[u8]) -> Self {
        Self {
            executor_name: executor_name.to_string(),
            binary: Mutex::new(binary.to_vec()),
            services: Mutex::new(HashMap::new()),
            supported: Mutex::new(HashMap::new()),
            identities: Mutex::new(HashMap::new()),
            fail_services: AtomicBool::new(false),
            fail_executor_get: AtomicBool::new(false),
            downloads: AtomicUsize::new(0),
            instance_id_calls: Mutex::new(Vec::new()),
            supported_calls: Mutex::new(Vec::new()),
        }
    }

    /// Register a service supporting instance IDs
    pub fn with_service(self, name: &str, identity: IdentityBehavior) -> Self {
        self.with_service_ops(name, SupportedOps::INSTANCE_ID, identity)
    }

    pub fn with_service_ops(
        self,
        name: &str,
        ops: SupportedOps,
        identity: IdentityBehavior,
    ) -> Self {
        self.services
            .lock()
            .insert(name.to_string(), ServiceInfo::new(name, name));
        self.supported.lock().insert(name.to_string(), ops);
        self.identities.lock().insert(name.to_string(), identity);
        self
    }

    pub fn set_binary(&self, binary: &[u8]) {
        *self.binary.lock() = binary.to_vec();
    }

    pub fn set_identity(&self, name: &str, identity: IdentityBehavior) {
        self.identities.lock().insert(name.to_string(), identity);
    }

    pub fn checksum(&self) -> String {
        hex::encode(Md5::digest(&*self.binary.lock()))
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteServices for FakeRemote {
    fn server_name(&self) -> String {
        "fake-server".to_string()
    }

    async fn services(
        &self,
        _ctx: &Context,
    ) -> Result<HashMap<String, ServiceInfo>, RemoteError> {
        if self.fail_services.load(Ordering::SeqCst) {
            return Err(RemoteError::transport(anyhow::anyhow!("connection refused")));
        }
        Ok(self.services.lock().clone())
    }

    async fn executors(
        &self,
        _ctx: &Context,
    ) -> Result<HashMap<String, ExecutorInfo>, RemoteError> {
        let mut info = ExecutorInfo::new(self.executor_name.clone(), self.checksum());
        info.size = self.binary.lock().len() as u64;
        Ok(HashMap::from([(self.executor_name.clone(), info)]))
    }

    async fn executor_get(
        &self,
        _ctx: &Context,
        name: &str,
    ) -> Result<ExecutorStream, RemoteError> {
        if self.fail_executor_get.load(Ordering::SeqCst) {
            return Err(RemoteError::transport(anyhow::anyhow!("stream reset")));
        }
        if name != self.executor_name {
            return Err(RemoteError::transport(anyhow::anyhow!("no executor {}", name)));
        }
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Cursor::new(self.binary.lock().clone())))
    }

    async fn supported(
        &self,
        _ctx: &Context,
        service: &ServiceInfo,
        _store: &mut Store,
    ) -> Result<SupportedOps, RemoteError> {
        self.supported_calls.lock().push(service.name.clone());
        Ok(self
            .supported
            .lock()
            .get(&service.name)
            .copied()
            .unwrap_or_default())
    }

    async fn instance_id(
        &self,
        _ctx: &Context,
        service: &ServiceInfo,
        store: &mut Store,
    ) -> Result<InstanceId, RemoteError> {
        self.instance_id_calls.lock().push(service.name.clone());
        let behavior = self.identities.lock().get(&service.name).cloned();
        match behavior {
            Some(IdentityBehavior::Id(id)) => {
                let iid = InstanceId::new(id, service.driver.name.clone());
                store.set_as(format!("{}.instanceID", service.name), &iid);
                Ok(iid)
            }
            Some(IdentityBehavior::NotImplemented) => Err(RemoteError::NotImplemented),
            Some(IdentityBehavior::Fail(msg)) => Err(RemoteError::transport(anyhow::anyhow!(msg))),
            None => Err(RemoteError::NotImplemented),
        }
    }
}

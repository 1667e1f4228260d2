//! Service capability and instance identity resolution

use std::collections::HashMap;

use super::{Client, Tables};
use crate::context::Context;
use crate::error::{ClientError, RemoteError, Result};
use crate::store::Store;
use crate::types::{InstanceId, ServiceInfo, SupportedOps};

/// Per-service result of a bootstrap pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// Instance ID resolved and cached
    Ready(InstanceId),
    /// The service supports no executor operations on this node
    Unsupported,
    /// The service does not implement instance ID resolution
    IdentityUnavailable,
}

impl ServiceOutcome {
    pub fn instance_id(&self) -> Option<&InstanceId> {
        match self {
            Self::Ready(iid) => Some(iid),
            _ => None,
        }
    }
}

impl Client {
    /// Fill `tables.services` from the remote service listing
    pub(crate) async fn refresh_services(
        &self,
        ctx: &Context,
        tables: &mut Tables,
    ) -> Result<Vec<String>> {
        let services: HashMap<String, ServiceInfo> = self
            .remote
            .services(ctx)
            .await
            .map_err(|e| ClientError::remote("services", self.remote.server_name(), e))?;

        tables.services.replace_all(services);
        Ok(tables.services.keys())
    }

    /// Supported operations of `service` on this node, cached after the
    /// first remote lookup
    pub(crate) async fn supported(
        &self,
        ctx: &Context,
        tables: &mut Tables,
        service: &str,
        store: &mut Store,
    ) -> Result<SupportedOps> {
        self.require_agent("supported")?;
        if let Some(ops) = tables.supported.get(service) {
            return Ok(*ops);
        }

        let info = tables.service(service)?;
        let ops = self
            .remote
            .supported(ctx, info, store)
            .await
            .map_err(|e| ClientError::remote("supported", service, e))?;

        tables.supported.insert(service, ops);
        Ok(ops)
    }

    /// Instance ID of this node for `service`, cached after the first
    /// successful remote lookup
    pub(crate) async fn instance_id(
        &self,
        ctx: &Context,
        tables: &mut Tables,
        service: &str,
        store: &mut Store,
    ) -> Result<InstanceId> {
        self.require_agent("instance_id")?;
        if let Some(iid) = tables.instance_ids.get(service) {
            return Ok(iid.clone());
        }

        let info = tables.service(service)?;
        let iid = self
            .remote
            .instance_id(ctx, info, store)
            .await
            .map_err(|e| ClientError::remote("instance_id", service, e))?;

        tables.instance_ids.insert(service, iid.clone());
        Ok(iid)
    }

    /// Resolve supported operations, then the instance ID when the service
    /// supports anything at all
    pub(crate) async fn resolve_service(
        &self,
        ctx: &Context,
        tables: &mut Tables,
        service: &str,
        store: &mut Store,
    ) -> Result<ServiceOutcome> {
        tracing::info!("initializing supported cache");
        let ops = self.supported(ctx, tables, service, store).await?;

        if ops.is_none() {
            tracing::warn!("executor not supported");
            return Ok(ServiceOutcome::Unsupported);
        }

        tracing::info!("initializing instance ID cache");
        match self.instance_id(ctx, tables, service, store).await {
            Ok(iid) => Ok(ServiceOutcome::Ready(iid)),
            Err(ClientError::Remote {
                source: RemoteError::NotImplemented,
                ..
            }) => {
                tracing::warn!("cannot get instance ID: not implemented");
                Ok(ServiceOutcome::IdentityUnavailable)
            }
            Err(e) => Err(e),
        }
    }
}

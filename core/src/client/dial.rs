//! Bootstrap sequence

use std::collections::BTreeMap;
use tracing::Instrument;

use super::{Client, ExecutorUpdate, ServiceOutcome, Tables};
use crate::context::{Context, ContextKey};
use crate::error::{ClientError, Result};
use crate::store::Store;
use crate::types::ClientRole;

/// What a successful `dial` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialReport {
    pub role: ClientRole,
    /// Services listed by the remote side, sorted
    pub services: Vec<String>,
    /// `None` for controllers or when executor download is disabled
    pub executor: Option<ExecutorUpdate>,
    /// Per-service outcome, empty for controllers
    pub outcomes: BTreeMap<String, ServiceOutcome>,
}

impl DialReport {
    pub fn ready(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ServiceOutcome::Ready(_)))
            .map(|(name, _)| name.as_str())
    }
}

impl Client {
    /// Bring the client into a working state against the remote side.
    ///
    /// Either every step succeeds or the first fatal error is returned.
    /// Unsupported services and services without instance IDs are recorded
    /// in the report and do not stop the pass. The caches and context are
    /// replaced only when the whole pass succeeds; a failed pass leaves the
    /// previous ones in place.
    pub async fn dial(&mut self, ctx: &Context) -> Result<DialReport> {
        let mut next = Tables::default();
        let services = self
            .refresh_services(ctx, &mut next)
            .instrument(ctx.span())
            .await?;

        let mut report = DialReport {
            role: self.role,
            services: services.clone(),
            executor: None,
            outcomes: BTreeMap::new(),
        };

        // controller clients do not have any additional dialer logic
        if self.is_controller() {
            self.tables = next;
            return Ok(report);
        }

        let host = self.host();
        let ctx = ctx
            .with_value(ContextKey::Server, self.remote.server_name())
            .with_value(ContextKey::Host, host);

        if self.no_download {
            next.executors = self.tables.executors.clone();
        } else {
            let span = ctx.span();
            async {
                tracing::info!("initializing executors cache");
                self.refresh_executors(&ctx, &mut next).await?;
                report.executor = Some(self.update_executor_from(&ctx, &next).await?);
                Ok::<(), ClientError>(())
            }
            .instrument(span)
            .await?;
        }

        let mut store = Store::new();
        for service in &services {
            let ctx = ctx.with_value(ContextKey::Service, service.as_str());
            let outcome = self
                .resolve_service(&ctx, &mut next, service, &mut store)
                .instrument(ctx.span())
                .await?;
            report.outcomes.insert(service.clone(), outcome);
        }

        self.tables = next;
        self.ctx = ctx;
        Ok(report)
    }
}

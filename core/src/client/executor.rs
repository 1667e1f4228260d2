//! Executor update protocol
//!
//! The whole check-and-replace runs under the executor lock:
//!
//! | Local file | Checksum | Result |
//! |---|---|---|
//! | missing | - | download |
//! | present | differs from remote | download |
//! | present | matches remote | no-op |
//!
//! Only checksum agreement is trusted. The written length is reported but
//! not compared with the advertised size, and the new file is not re-hashed
//! after the write.

use std::collections::HashMap;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;

use super::{Client, Tables};
use crate::checksum::file_md5;
use crate::context::Context;
use crate::error::{ClientError, Result};
use crate::lock::LockGuard;
use crate::types::ExecutorInfo;

/// Outcome of an executor update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorUpdate {
    /// Local checksum already matched the remote one
    UpToDate,
    /// The binary was (re)written
    Downloaded { bytes: u64 },
}

impl ExecutorUpdate {
    pub fn is_download(&self) -> bool {
        matches!(self, Self::Downloaded { .. })
    }
}

impl Client {
    /// Fill `tables.executors` from the remote executor listing
    pub(crate) async fn refresh_executors(
        &self,
        ctx: &Context,
        tables: &mut Tables,
    ) -> Result<Vec<String>> {
        self.require_agent("executors")?;

        let executors: HashMap<String, ExecutorInfo> = self
            .remote
            .executors(ctx)
            .await
            .map_err(|e| ClientError::remote("executors", self.remote.server_name(), e))?;

        tables.executors.replace_all(executors);
        Ok(tables.executors.keys())
    }

    /// Bring the local executor in line with the remote checksum
    pub async fn update_executor(&self, ctx: &Context) -> Result<ExecutorUpdate> {
        self.update_executor_from(ctx, &self.tables).await
    }

    /// Same as `update_executor`, checked against the executor entries of
    /// `tables`
    pub(crate) async fn update_executor_from(
        &self,
        ctx: &Context,
        tables: &Tables,
    ) -> Result<ExecutorUpdate> {
        self.require_agent("update_executor")?;
        tracing::debug!("updating executor");

        let info = self.lookup_executor(tables)?;
        let guard = LockGuard::acquire(self.lsx_mutex.clone()).await?;
        let outcome = self.update_executor_locked(ctx, info).await;
        let released = guard.release();

        // a broken lock outranks whatever happened inside it
        released?;
        outcome
    }

    /// Checksum of the local executor binary
    pub async fn executor_checksum(&self, ctx: &Context) -> Result<String> {
        self.require_agent("executor_checksum")?;
        self.local_checksum(ctx).await
    }

    /// Unconditionally download the executor, holding the executor lock
    pub async fn download_executor(&self, ctx: &Context) -> Result<ExecutorUpdate> {
        self.require_agent("download_executor")?;

        let guard = LockGuard::acquire(self.lsx_mutex.clone()).await?;
        let outcome = self.download_locked(ctx).await;
        let released = guard.release();

        released?;
        outcome
    }

    fn executor_name(&self) -> Result<&str> {
        self.paths
            .executor_name()
            .ok_or_else(|| ClientError::UnknownExecutor {
                path: self.paths.lsx.clone(),
            })
    }

    fn lookup_executor<'a>(&self, tables: &'a Tables) -> Result<&'a ExecutorInfo> {
        let name = self.executor_name()?;
        tables
            .executors
            .get(name)
            .ok_or_else(|| ClientError::UnknownExecutor {
                path: self.paths.lsx.clone(),
            })
    }

    async fn update_executor_locked(
        &self,
        ctx: &Context,
        info: &ExecutorInfo,
    ) -> Result<ExecutorUpdate> {
        let lsx = &self.paths.lsx;
        let exists = tokio::fs::try_exists(lsx)
            .await
            .map_err(|e| ClientError::io(lsx, e))?;

        if !exists {
            tracing::debug!("executor does not exist, download executor");
            return self.download_locked(ctx).await;
        }

        tracing::debug!("executor exists, getting local checksum");
        let checksum = self.local_checksum(ctx).await?;

        if !checksum.eq_ignore_ascii_case(&info.md5_checksum) {
            tracing::debug!(
                remote_checksum = %info.md5_checksum,
                local_checksum = %checksum,
                "executor checksums do not match, download executor"
            );
            return self.download_locked(ctx).await;
        }

        Ok(ExecutorUpdate::UpToDate)
    }

    async fn local_checksum(&self, ctx: &Context) -> Result<String> {
        let lsx = &self.paths.lsx;
        let checksum = file_md5(lsx)
            .instrument(ctx.span())
            .await
            .map_err(|e| ClientError::io(lsx, e))?;
        tracing::debug!(local_checksum = %checksum, "got local executor checksum");
        Ok(checksum)
    }

    async fn download_locked(&self, ctx: &Context) -> Result<ExecutorUpdate> {
        tracing::debug!("downloading executor");
        let name = self.executor_name()?;
        let lsx = &self.paths.lsx;

        let mut stream = self
            .remote
            .executor_get(ctx, name)
            .await
            .map_err(|e| ClientError::remote("executor_get", name, e))?;

        let mut options = OpenOptions::new();
        options.create(true).read(true).write(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o755);

        let mut file = options
            .open(lsx)
            .await
            .map_err(|e| ClientError::io(lsx, e))?;

        let bytes = tokio::io::copy(&mut stream, &mut file)
            .await
            .map_err(|e| ClientError::io(lsx, e))?;
        file.flush().await.map_err(|e| ClientError::io(lsx, e))?;
        file.sync_all().await.map_err(|e| ClientError::io(lsx, e))?;

        // mode() only applies on create
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(lsx, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(|e| ClientError::io(lsx, e))?;
        }

        tracing::debug!(bytes, "downloaded executor");
        Ok(ExecutorUpdate::Downloaded { bytes })
    }
}

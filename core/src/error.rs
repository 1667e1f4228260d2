//! Structured error types for the storage client core
//!
//! Every fatal outcome of the bootstrap sequence is a `ClientError`. The two
//! tolerated per-service outcomes (service unsupported, instance ID not
//! implemented) are not errors at this level; see `client::ServiceOutcome`.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::types::ClientRole;

/// Error returned by a `RemoteServices` implementation
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The remote side does not implement the requested operation
    #[error("not implemented")]
    NotImplemented,

    /// Any other transport or remote failure
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl RemoteError {
    /// Wrap an arbitrary error as a transport failure
    pub fn transport(err: impl Into<anyhow::Error>) -> Self {
        Self::Transport(err.into())
    }
}

/// Primary error type for client operations
#[derive(Error, Debug)]
pub enum ClientError {
    // =========================================================================
    // Role / Lookup Errors
    // =========================================================================
    /// An agent-only operation was invoked on a controller client
    #[error("{op} is not supported for client type {role}")]
    UnsupportedForRole { role: ClientRole, op: &'static str },

    /// The configured executor is not advertised by the remote side
    #[error("unknown executor: {path}")]
    UnknownExecutor { path: PathBuf },

    /// The service is not present in the service cache
    #[error("unknown service: {name}")]
    UnknownService { name: String },

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// Failure reported by the remote service facade
    #[error("{op} failed for {target}: {source}")]
    Remote {
        op: &'static str,
        target: String,
        #[source]
        source: RemoteError,
    },

    // =========================================================================
    // Filesystem / Lock Errors
    // =========================================================================
    /// Filesystem failure while checksumming or downloading the executor
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The executor lock could not be acquired
    #[error("failed to acquire executor lock {path}: {source}")]
    LockAcquire {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The executor lock could not be released. Mutual exclusion can no
    /// longer be trusted once this is returned.
    #[error("failed to release executor lock {path}: {source}")]
    LockRelease {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    pub(crate) fn remote(op: &'static str, target: impl Into<String>, source: RemoteError) -> Self {
        Self::Remote {
            op,
            target: target.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if the error is a role violation
    pub fn is_role_violation(&self) -> bool {
        matches!(self, Self::UnsupportedForRole { .. })
    }

    /// Check if the remote side reported the operation as not implemented
    pub fn is_not_implemented(&self) -> bool {
        matches!(
            self,
            Self::Remote {
                source: RemoteError::NotImplemented,
                ..
            }
        )
    }

    /// Check if the error means a process-level invariant no longer holds.
    /// Callers should stop the process rather than retry.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::LockRelease { .. })
    }
}

/// Result type alias using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

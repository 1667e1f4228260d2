//! Shared data model
//!
//! Descriptors received from the remote service facade and the small value
//! types the client keeps in its caches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Client posture, fixed at construction
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Manages cluster-wide state. Never runs an executor.
    Controller,

    /// Runs on a storage-consuming host and keeps a local executor current.
    #[default]
    #[serde(alias = "integration")]
    Agent,
}

impl ClientRole {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Controller => "controller",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Driver metadata attached to a service
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DriverInfo {
    pub name: String,
    #[serde(default, rename = "type")]
    pub driver_type: Option<String>,
    #[serde(default)]
    pub next_device: Option<String>,
}

/// A storage service exposed by the remote control plane
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub driver: DriverInfo,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: DriverInfo {
                name: driver.into(),
                ..DriverInfo::default()
            },
        }
    }
}

/// An executor binary advertised by the remote side
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExecutorInfo {
    pub name: String,
    /// Lower-case hex MD5 of the remote binary
    #[serde(rename = "md5checksum")]
    pub md5_checksum: String,
    #[serde(default)]
    pub size: u64,
}

impl ExecutorInfo {
    pub fn new(name: impl Into<String>, md5_checksum: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            md5_checksum: md5_checksum.into(),
            size: 0,
        }
    }
}

/// Set of executor operations a service supports on this node
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SupportedOps(u32);

impl SupportedOps {
    pub const NONE: Self = Self(0);
    pub const INSTANCE_ID: Self = Self(1);
    pub const NEXT_DEVICE: Self = Self(1 << 1);
    pub const LOCAL_DEVICES: Self = Self(1 << 2);
    pub const WAIT_FOR_DEVICE: Self = Self(1 << 3);
    pub const MOUNT: Self = Self(1 << 4);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SupportedOps {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Opaque token identifying this node to a service
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct InstanceId {
    pub id: String,
    #[serde(default)]
    pub driver: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl InstanceId {
    pub fn new(id: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            driver: driver.into(),
            fields: BTreeMap::new(),
        }
    }
}

/// TLS settings relevant to host resolution
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TlsConfig {
    #[serde(default)]
    pub server_name: Option<String>,
}

/// Local filesystem locations owned by the host, read-only to the client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathConfig {
    /// Absolute path of the executor binary
    pub lsx: PathBuf,
    /// Lock file serializing executor updates across processes
    pub lsx_lock: PathBuf,
}

impl PathConfig {
    /// Use `<lsx>.lock` as the lock file
    pub fn new(lsx: impl Into<PathBuf>) -> Self {
        let lsx = lsx.into();
        let mut lock = lsx.clone().into_os_string();
        lock.push(".lock");
        Self {
            lsx,
            lsx_lock: PathBuf::from(lock),
        }
    }

    pub fn with_lock(mut self, lock: impl Into<PathBuf>) -> Self {
        self.lsx_lock = lock.into();
        self
    }

    /// Executor name, the last segment of the executor path
    pub fn executor_name(&self) -> Option<&str> {
        self.lsx.file_name().and_then(|name| name.to_str())
    }

    pub fn lsx(&self) -> &Path {
        &self.lsx
    }
}

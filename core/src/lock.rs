//! Cross-process executor lock
//!
//! Independently running clients on one host serialize executor updates
//! through a named mutex. `FileMutex` backs it with an advisory exclusive
//! `flock` on a lock file.
//!
//! # Release semantics
//!
//! A failed release means two processes may both believe they own the
//! executor, so it is never swallowed:
//!
//! - `LockGuard::release` reports it as `ClientError::LockRelease`.
//! - A guard dropped without an explicit release (panic, cancelled future)
//!   still releases. If that fails it logs at `error` and panics, or aborts
//!   the process when the thread is already unwinding.

use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use crate::error::{ClientError, Result};

/// Named, process-external mutual exclusion
#[async_trait::async_trait]
pub trait NamedMutex: Send + Sync {
    /// Path or name identifying the mutex
    fn name(&self) -> &Path;

    /// Block until exclusive ownership is obtained
    async fn acquire(&self) -> io::Result<()>;

    /// Give up ownership. Fails if the mutex is not held.
    fn release(&self) -> io::Result<()>;
}

/// Advisory file lock.
///
/// `flock` only excludes other open file descriptions, so callers sharing
/// one `FileMutex` are queued on an in-process gate first.
pub struct FileMutex {
    path: PathBuf,
    gate: Arc<tokio::sync::Mutex<()>>,
    held: Mutex<Option<(File, OwnedMutexGuard<()>)>>,
}

impl FileMutex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            gate: Arc::new(tokio::sync::Mutex::new(())),
            held: Mutex::new(None),
        }
    }
}

impl std::fmt::Debug for FileMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMutex")
            .field("path", &self.path)
            .field("held", &self.held.lock().is_some())
            .finish()
    }
}

#[async_trait::async_trait]
impl NamedMutex for FileMutex {
    fn name(&self) -> &Path {
        &self.path
    }

    async fn acquire(&self) -> io::Result<()> {
        let permit = self.gate.clone().lock_owned().await;
        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || -> io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(io::Error::other)??;

        *self.held.lock() = Some((file, permit));
        Ok(())
    }

    fn release(&self) -> io::Result<()> {
        let (file, _permit) = self.held.lock().take().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("lock not held: {}", self.path.display()),
            )
        })?;
        FileExt::unlock(&file)
    }
}

/// Ownership of an acquired `NamedMutex`
#[must_use = "dropping the guard releases the lock immediately"]
pub struct LockGuard {
    mutex: Arc<dyn NamedMutex>,
    released: bool,
}

impl LockGuard {
    /// Acquire `mutex`, waiting for other holders to release it
    pub async fn acquire(mutex: Arc<dyn NamedMutex>) -> Result<Self> {
        tracing::debug!(lock = %mutex.name().display(), "waiting on executor lock");
        mutex
            .acquire()
            .await
            .map_err(|source| ClientError::LockAcquire {
                path: mutex.name().to_path_buf(),
                source,
            })?;
        Ok(Self {
            mutex,
            released: false,
        })
    }

    /// Release the lock, surfacing failure as `ClientError::LockRelease`
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        tracing::debug!(lock = %self.mutex.name().display(), "signalling executor lock");
        self.mutex
            .release()
            .map_err(|source| ClientError::LockRelease {
                path: self.mutex.name().to_path_buf(),
                source,
            })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.mutex.release() {
            let lock = self.mutex.name().display();
            tracing::error!(%lock, error = %err, "failed to release executor lock");
            if std::thread::panicking() {
                std::process::abort();
            }
            panic!("failed to release executor lock {}: {}", lock, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_release_without_acquire_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mutex = FileMutex::new(dir.path().join("lsx.lock"));
        let err = mutex.release().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_guard_release_reports_broken_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mutex = Arc::new(FileMutex::new(dir.path().join("lsx.lock")));
        let guard = LockGuard::acquire(mutex.clone()).await.unwrap();

        // someone else released it underneath us
        mutex.release().unwrap();

        let err = guard.release().unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[tokio::test]
    async fn test_second_holder_waits_for_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lsx.lock");
        let first: Arc<dyn NamedMutex> = Arc::new(FileMutex::new(&path));
        let second: Arc<dyn NamedMutex> = Arc::new(FileMutex::new(&path));

        let guard = LockGuard::acquire(first.clone()).await.unwrap();

        let waiter = tokio::spawn(async move {
            let guard = LockGuard::acquire(second).await.unwrap();
            guard.release().unwrap();
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished());

        guard.release().unwrap();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("second holder acquired the lock")
            .unwrap();
    }

    #[tokio::test]
    async fn test_shared_instance_queues_in_process() {
        let dir = tempfile::tempdir().unwrap();
        let mutex: Arc<dyn NamedMutex> = Arc::new(FileMutex::new(dir.path().join("lsx.lock")));

        let guard = LockGuard::acquire(mutex.clone()).await.unwrap();
        let waiter = tokio::spawn({
            let mutex = mutex.clone();
            async move {
                let guard = LockGuard::acquire(mutex).await.unwrap();
                guard.release().unwrap();
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        guard.release().unwrap();
        waiter.await.unwrap();
    }

    struct StuckMutex {
        path: PathBuf,
    }

    #[async_trait::async_trait]
    impl NamedMutex for StuckMutex {
        fn name(&self) -> &Path {
            &self.path
        }

        async fn acquire(&self) -> io::Result<()> {
            Ok(())
        }

        fn release(&self) -> io::Result<()> {
            Err(io::Error::other("lock file vanished"))
        }
    }

    #[tokio::test]
    #[should_panic(expected = "failed to release executor lock")]
    async fn test_dropped_guard_with_broken_release_panics() {
        let mutex: Arc<dyn NamedMutex> = Arc::new(StuckMutex {
            path: PathBuf::from("/run/lsx.lock"),
        });
        let guard = LockGuard::acquire(mutex).await.unwrap();
        drop(guard);
    }

    #[tokio::test]
    async fn test_drop_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mutex: Arc<dyn NamedMutex> = Arc::new(FileMutex::new(dir.path().join("lsx.lock")));
        {
            let _guard = LockGuard::acquire(mutex.clone()).await.unwrap();
        }
        let guard = LockGuard::acquire(mutex).await.unwrap();
        guard.release().unwrap();
    }
}

//! The lock file that marks a submission of one kind as in flight, so that a second process
//! neither submits the same rows again nor edits them mid-flight.
//!
//! A lock records the process that took it and when. A submission never outlives its request
//! timeout by much, so a lock older than that is left over from a process that was killed and is
//! taken over. The lock is removed when the `SubmitLock` is dropped, which also covers a
//! submission future that is cancelled.

use crate::args::KindArgs;
use crate::commands::Out;
use crate::error::ImportError;
use crate::model::Kind;
use crate::{utils, Config, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// How long past the request timeout a lock is still trusted.
const LOCK_GRACE: Duration = Duration::from_secs(60);

/// What is written into the lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    started_at: DateTime<Utc>,
}

impl LockInfo {
    fn now() -> Self {
        Self {
            pid: std::process::id(),
            started_at: Utc::now(),
        }
    }
}

/// Holds the submission lock of one kind until dropped.
#[derive(Debug)]
pub(super) struct SubmitLock {
    path: PathBuf,
}

impl SubmitLock {
    /// Takes the lock of `kind`, taking over a stale one.
    ///
    /// # Errors
    /// - `AlreadySubmitting` when another submission holds a lock that is not stale.
    pub(super) async fn acquire(config: &Config, kind: Kind) -> Result<Self> {
        let path = config.lock_path(kind);
        if !utils::create_exclusive(&path).await? {
            if is_held(config, &path).await? {
                return Err(ImportError::AlreadySubmitting.into());
            }
            warn!("Taking over the stale submission lock {}", path.display());
            utils::remove_file(&path).await?;
            if !utils::create_exclusive(&path).await? {
                return Err(ImportError::AlreadySubmitting.into());
            }
        }
        let lock = Self { path };
        let info =
            serde_json::to_string(&LockInfo::now()).context("Unable to serialize the lock")?;
        utils::write(&lock.path, info).await?;
        debug!("Acquired the submission lock {}", lock.path.display());
        Ok(lock)
    }
}

impl Drop for SubmitLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Released the submission lock {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Unable to remove the submission lock {}: {e}",
                self.path.display()
            ),
        }
    }
}

/// Staged rows must not change under a submission running in another process. A stale lock does
/// not count.
pub(super) async fn ensure_not_submitting(config: &Config, kind: Kind) -> Result<()> {
    let path = config.lock_path(kind);
    if is_held(config, &path).await? {
        return Err(ImportError::AlreadySubmitting.into());
    }
    Ok(())
}

/// Whether `path` is a lock that a live submission may still hold.
async fn is_held(config: &Config, path: &Path) -> Result<bool> {
    let Some(age) = lock_age(path).await? else {
        return Ok(false);
    };
    let held = age <= config.request_timeout() + LOCK_GRACE;
    if !held {
        debug!("The lock {} is {}s old", path.display(), age.as_secs());
    }
    Ok(held)
}

/// The age of the lock at `path`, or `None` when there is no lock. A lock whose contents cannot be
/// read, for example one that is still being written, is dated by its modification time.
async fn lock_age(path: &Path) -> Result<Option<Duration>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Unable to read the lock {}", path.display()))
        }
    };
    if let Ok(info) = serde_json::from_str::<LockInfo>(&contents) {
        let age = (Utc::now() - info.started_at).to_std().unwrap_or_default();
        return Ok(Some(age));
    }
    let modified = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata
            .modified()
            .with_context(|| format!("Unable to date the lock {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Unable to read the lock {}", path.display()))
        }
    };
    Ok(Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default(),
    ))
}

/// Removes the submission lock of `args.kind()` whatever its age. For use when a submission was
/// interrupted and the lock is known to be left over.
pub async fn unlock(config: Config, args: KindArgs) -> Result<Out<()>> {
    let kind = args.kind();
    let path = config.lock_path(kind);
    if lock_age(&path).await?.is_none() {
        return Ok(Out::new_message(format!(
            "No hay un envío de {} en curso",
            kind.label()
        )));
    }
    utils::remove_file(&path).await?;
    info!("Removed the submission lock {}", path.display());
    Ok(Out::new_message(format!(
        "Se liberó el bloqueo de envío de {}",
        kind.label()
    )))
}

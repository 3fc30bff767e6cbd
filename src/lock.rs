// File: src/lock.rs
//! Advisory write lock for a single profile record.
//!
//! The lock is a marker file created with `create_new`, so acquisition is an
//! atomic filesystem operation that also works across processes. The guard
//! removes the marker when dropped.

use crate::config::LockConfig;
use crate::error::{PrefsError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Held write lock. Released on drop.
#[derive(Debug)]
pub struct ProfileLock {
    path: PathBuf,
}

impl ProfileLock {
    /// Tries to create the marker at `path`, backing off between attempts.
    pub fn acquire(path: &Path, config: &LockConfig) -> Result<Self> {
        let attempts = config.max_attempts.max(1);

        for attempt in 1..=attempts {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // holder pid is informational only
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!(lock = %path.display(), attempt, "Acquired profile lock");
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::clear_if_stale(path, config) {
                        continue;
                    }
                    if attempt < attempts {
                        thread::sleep(config.retry_interval);
                    }
                }
                Err(e) => return Err(PrefsError::Io(e)),
            }
        }

        Err(PrefsError::LockTimeout {
            path: path.to_path_buf(),
            attempts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes a marker older than `stale_after`. Returns true if one was removed.
    fn clear_if_stale(path: &Path, config: &LockConfig) -> bool {
        let Some(stale_after) = config.stale_after else {
            return false;
        };
        if !is_older_than(path, stale_after) {
            return false;
        }
        Self::reclaim(path, stale_after)
    }

    /// Moves the marker aside under a unique name and deletes it only if the
    /// moved file is still stale. Two writers racing on one stale marker can
    /// then never both remove it: the loser either fails the rename or moves
    /// the winner's fresh marker, which it puts back.
    fn reclaim(path: &Path, stale_after: Duration) -> bool {
        let aside = aside_path(path);
        if fs::rename(path, &aside).is_err() {
            return false;
        }

        if is_older_than(&aside, stale_after) {
            warn!(lock = %path.display(), "Removing stale profile lock");
            if let Err(e) = fs::remove_file(&aside) {
                warn!(lock = %aside.display(), error = %e, "Failed to delete stale profile lock");
            }
            return true;
        }

        // hard_link refuses to replace a marker created in the meantime
        if let Err(e) = fs::hard_link(&aside, path) {
            warn!(lock = %path.display(), error = %e, "Could not restore live profile lock");
        }
        let _ = fs::remove_file(&aside);
        false
    }
}

fn is_older_than(path: &Path, limit: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > limit)
}

/// `<lock>.stale.<pid>.<seq>.<nanos>`
fn aside_path(path: &Path) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".stale.{}.{}.{}", std::process::id(), seq, nanos));
    PathBuf::from(name)
}

impl Drop for ProfileLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(lock = %self.path.display(), error = %e, "Failed to release profile lock");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Instant;

    fn fast_config(attempts: u32) -> LockConfig {
        LockConfig {
            max_attempts: attempts,
            retry_interval: Duration::from_millis(5),
            stale_after: None,
        }
    }

    #[test]
    fn acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.lock");

        let guard = ProfileLock::acquire(&path, &fast_config(3)).unwrap();
        assert!(path.exists());
        assert_eq!(guard.path(), path.as_path());
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn contention_times_out_within_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.lock");
        let _held = ProfileLock::acquire(&path, &fast_config(1)).unwrap();

        let started = Instant::now();
        let err = ProfileLock::acquire(&path, &fast_config(4)).unwrap_err();
        assert!(matches!(err, PrefsError::LockTimeout { attempts: 4, .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
        // the failed attempt must not remove someone else's marker
        assert!(path.exists());
    }

    #[test]
    fn released_even_when_holder_panics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.lock");
        let p = path.clone();

        let result = std::panic::catch_unwind(move || {
            let _guard = ProfileLock::acquire(&p, &fast_config(1)).unwrap();
            panic!("writer blew up");
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn stale_marker_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.lock");
        fs::write(&path, "99999\n").unwrap();

        let config = LockConfig {
            max_attempts: 2,
            retry_interval: Duration::from_millis(5),
            stale_after: Some(Duration::ZERO),
        };
        thread::sleep(Duration::from_millis(20));
        let guard = ProfileLock::acquire(&path, &config).unwrap();
        assert!(path.exists());
        drop(guard);
    }

    fn backdate(path: &Path, by: Duration) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - by)
            .unwrap();
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".stale."))
            .collect()
    }

    #[test]
    fn late_reclaimer_leaves_the_new_holder_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.lock");
        fs::write(&path, "99999\n").unwrap();
        backdate(&path, Duration::from_secs(3600));

        let config = LockConfig {
            max_attempts: 2,
            retry_interval: Duration::from_millis(5),
            stale_after: Some(Duration::from_secs(30)),
        };

        // both writers saw the old marker as stale; the first one wins it
        let _winner = ProfileLock::acquire(&path, &config).unwrap();
        let winner_pid = fs::read_to_string(&path).unwrap();

        // the second one acts on its outdated view
        assert!(!ProfileLock::reclaim(&path, Duration::from_secs(30)));
        assert_eq!(fs::read_to_string(&path).unwrap(), winner_pid);
        assert!(leftovers(dir.path()).is_empty());

        let err = ProfileLock::acquire(&path, &config).unwrap_err();
        assert!(matches!(err, PrefsError::LockTimeout { .. }));
    }

    #[test]
    fn reclaimed_marker_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.lock");
        fs::write(&path, "99999\n").unwrap();
        backdate(&path, Duration::from_secs(3600));

        assert!(ProfileLock::reclaim(&path, Duration::from_secs(30)));
        assert!(!path.exists());
        assert!(leftovers(dir.path()).is_empty());
    }
}

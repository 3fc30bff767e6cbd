// File: src/persistence.rs
use crate::config::LockConfig;
use crate::core::types::Profile;
use crate::degrade::{DegradeReason, Degradable};
use crate::error::{PrefsError, Result};
use crate::lock::ProfileLock;
use crate::migration::{decode_record, RecordState};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::Builder;
use tracing::{debug, error, info, warn};

const RECORD_SUFFIX: &str = "_preferences.json";
const LOCK_SUFFIX: &str = ".lock";

/// Durable home of every user's profile: one JSON record per user.
///
/// Writes take the per-profile lock and replace the record by renaming a
/// fully written temp file over it. Reads take no lock.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
    lock: LockConfig,
}

impl ProfileStore {
    pub fn open(dir: impl Into<PathBuf>, lock: LockConfig) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, lock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Canonical record path for `user_id`.
    pub fn profile_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", record_key(user_id), RECORD_SUFFIX))
    }

    fn lock_path(&self, user_id: &str) -> PathBuf {
        let mut name = self.profile_path(user_id).into_os_string();
        name.push(LOCK_SUFFIX);
        PathBuf::from(name)
    }

    /// Loads the profile for `user_id`.
    ///
    /// A missing record yields a fresh profile. An unreadable one yields a
    /// fresh profile marked `Degraded`. A legacy record is migrated and
    /// written back under the lock. A record with inconsistent totals is
    /// repaired in memory and marked `Degraded`.
    pub fn load(&self, user_id: &str) -> Degradable<Profile> {
        let path = self.profile_path(user_id);
        match read_record(&path) {
            Ok(None) => {
                debug!(user_id, "No stored profile, starting fresh");
                Degradable::Ok(Profile::new(user_id))
            }
            Ok(Some((profile, RecordState::Current))) => Degradable::Ok(profile),
            Ok(Some((profile, RecordState::Repaired))) => {
                Degradable::Degraded(profile, DegradeReason::RepairedRecord)
            }
            Ok(Some((profile, RecordState::Migrated))) => match self.persist_migration(user_id) {
                Ok(fresh) => {
                    info!(user_id, "Migrated legacy profile to version 2.0");
                    Degradable::Ok(fresh)
                }
                Err(e) => {
                    error!(user_id, error = %e, "Failed to persist migrated profile");
                    Degradable::Degraded(
                        profile,
                        DegradeReason::MigrationNotPersisted(e.to_string()),
                    )
                }
            },
            Err(e) => {
                warn!(user_id, path = %path.display(), error = %e, "Failed to load profile, using an empty one");
                Degradable::Degraded(
                    Profile::new(user_id),
                    DegradeReason::CorruptRecord(e.to_string()),
                )
            }
        }
    }

    /// Rewrites a legacy record in the current shape. The record is read
    /// again under the lock and only written if it is still legacy, so a
    /// swipe committed since the unlocked read is kept.
    fn persist_migration(&self, user_id: &str) -> Result<Profile> {
        let _guard = ProfileLock::acquire(&self.lock_path(user_id), &self.lock)?;
        match read_record(&self.profile_path(user_id))? {
            Some((mut profile, RecordState::Migrated)) => {
                self.write_locked(&mut profile)?;
                Ok(profile)
            }
            Some((profile, _)) => Ok(profile),
            None => Ok(Profile::new(user_id)),
        }
    }

    /// Persists `profile`, stamping `last_updated`. Failures are logged and
    /// reported as `false`.
    pub fn save(&self, profile: &mut Profile) -> bool {
        match self.try_save(profile) {
            Ok(()) => true,
            Err(e) => {
                error!(user_id = %profile.user_id, error = %e, "Failed to save profile");
                false
            }
        }
    }

    /// Like [`ProfileStore::save`] but returns the reason for a failure.
    pub fn try_save(&self, profile: &mut Profile) -> Result<()> {
        let _guard = ProfileLock::acquire(&self.lock_path(&profile.user_id), &self.lock)?;
        self.write_locked(profile)
    }

    /// Replaces the stored profile with an empty one.
    pub fn reset(&self, user_id: &str) -> bool {
        let mut fresh = Profile::new(user_id);
        let ok = self.save(&mut fresh);
        if ok {
            info!(user_id, "Profile reset");
        }
        ok
    }

    /// Read-modify-write under the profile lock.
    ///
    /// `f` sees the freshest committed record. If `f` fails nothing is
    /// written and its error is returned. If the lock is busy or the write
    /// fails, `f` is applied to an unlocked read and the result comes back
    /// `Degraded`.
    pub fn update_with<F>(&self, user_id: &str, f: F) -> Result<Degradable<Profile>>
    where
        F: FnOnce(&mut Profile) -> Result<()>,
    {
        let guard = match ProfileLock::acquire(&self.lock_path(user_id), &self.lock) {
            Ok(guard) => guard,
            Err(e) => {
                let reason = match e {
                    PrefsError::LockTimeout { attempts, .. } => {
                        DegradeReason::LockContention { attempts }
                    }
                    other => DegradeReason::WriteFailed(other.to_string()),
                };
                warn!(user_id, %reason, "Profile lock unavailable");
                let mut profile = self.read_current(user_id);
                f(&mut profile)?;
                return Ok(Degradable::Degraded(profile, reason));
            }
        };

        let mut profile = self.read_current(user_id);
        f(&mut profile)?;

        let result = match self.write_locked(&mut profile) {
            Ok(()) => Degradable::Ok(profile),
            Err(e) => {
                error!(user_id, error = %e, "Failed to save profile");
                Degradable::Degraded(profile, DegradeReason::WriteFailed(e.to_string()))
            }
        };
        drop(guard);
        Ok(result)
    }

    /// Decodes the record without writing anything back. Migration and
    /// repair happen in memory only.
    fn read_current(&self, user_id: &str) -> Profile {
        match read_record(&self.profile_path(user_id)) {
            Ok(Some((profile, _))) => profile,
            Ok(None) => Profile::new(user_id),
            Err(e) => {
                warn!(user_id, error = %e, "Stored profile unreadable, using a fresh one");
                Profile::new(user_id)
            }
        }
    }

    /// Writes to a temp file beside the record and renames it into place.
    /// The caller must hold the profile lock.
    fn write_locked(&self, profile: &mut Profile) -> Result<()> {
        profile.last_updated = Utc::now();
        let path = self.profile_path(&profile.user_id);

        let temp_file = Builder::new()
            .prefix(&format!(".{}", record_key(&profile.user_id)))
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;

        {
            let mut writer = BufWriter::new(temp_file.as_file());
            serde_json::to_writer_pretty(&mut writer, &*profile)?;
            writer.flush()?;
        }
        temp_file.as_file().sync_all()?;

        // an early return above drops `temp_file`, which deletes it
        temp_file.persist(&path)?;
        debug!(user_id = %profile.user_id, path = %path.display(), "Saved profile");
        Ok(())
    }
}

/// `Ok(None)` when no record exists.
fn read_record(path: &Path) -> Result<Option<(Profile, RecordState)>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value: serde_json::Value = serde_json::from_reader(BufReader::new(file))?;
    decode_record(value).map(Some)
}

/// Filename-safe key for a user id. Plain ids are used as they are; anything
/// that could escape the directory is hashed.
fn record_key(user_id: &str) -> String {
    let plain = !user_id.is_empty()
        && !user_id.starts_with('.')
        && user_id.len() <= 128
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if plain {
        user_id.to_string()
    } else {
        let digest = Sha256::digest(user_id.as_bytes());
        hex::encode(digest)[..32].to_string()
    }
}

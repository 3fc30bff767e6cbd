// File: src/degrade.rs
use std::fmt;

/// Why a best-effort result is not fully trustworthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradeReason {
    /// The durable record could not be read or parsed; an empty profile was used.
    CorruptRecord(String),
    /// The write lock stayed busy for the whole retry budget.
    LockContention { attempts: u32 },
    /// Writing or renaming the record failed.
    WriteFailed(String),
    /// A legacy record was migrated in memory but the rewrite did not stick.
    MigrationNotPersisted(String),
    /// The record's totals disagreed with its tag counters and were
    /// recomputed. The fix is written with the next update.
    RepairedRecord,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::CorruptRecord(e) => write!(f, "corrupt profile record: {}", e),
            DegradeReason::LockContention { attempts } => {
                write!(f, "profile lock busy after {} attempts", attempts)
            }
            DegradeReason::WriteFailed(e) => write!(f, "profile write failed: {}", e),
            DegradeReason::MigrationNotPersisted(e) => {
                write!(f, "migrated profile not persisted: {}", e)
            }
            DegradeReason::RepairedRecord => {
                write!(f, "profile totals were inconsistent and have been recomputed")
            }
        }
    }
}

/// A value that is always usable, optionally flagged as degraded.
///
/// Preference learning is advisory, so storage failures never take the value
/// away from the caller. They only mark it.
#[derive(Debug, Clone, PartialEq)]
pub enum Degradable<T> {
    Ok(T),
    Degraded(T, DegradeReason),
}

impl<T> Degradable<T> {
    pub fn value(&self) -> &T {
        match self {
            Degradable::Ok(v) | Degradable::Degraded(v, _) => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Degradable::Ok(v) | Degradable::Degraded(v, _) => v,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Degradable::Degraded(..))
    }

    pub fn reason(&self) -> Option<&DegradeReason> {
        match self {
            Degradable::Ok(_) => None,
            Degradable::Degraded(_, reason) => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Degradable<U> {
        match self {
            Degradable::Ok(v) => Degradable::Ok(f(v)),
            Degradable::Degraded(v, reason) => Degradable::Degraded(f(v), reason),
        }
    }
}

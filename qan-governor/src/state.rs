use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use qan_common::QanError;
use serde::{Deserialize, Serialize};

const STATE_FILE_NAME: &str = "governor_state";
const STALE_AFTER: Duration = Duration::from_secs(60 * 60);
const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

/// The on-disk shape of a governor's learned state (§6 persisted state). Self-describing
/// JSON so the file is inspectable without this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorState {
    pub fast_ema_value: f64,
    pub slow_ema_value: f64,
    pub interval_ns: u64,
    pub timestamp: DateTime<Utc>,
}

impl GovernorState {
    /// Writes the state file atomically: serialize to a temp file in the same directory,
    /// then rename over the real path. A crash mid-write leaves the previous file (or
    /// nothing) intact, never a half-written one.
    pub fn save(&self, dir: &Path) -> Result<(), QanError> {
        fs::create_dir_all(dir).map_err(io_to_state_error)?;
        fs::set_permissions(dir, fs::Permissions::from_mode(DIR_MODE)).map_err(io_to_state_error)?;

        let final_path = dir.join(STATE_FILE_NAME);
        let tmp_path = dir.join(format!("{}.tmp", STATE_FILE_NAME));

        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| QanError::state(format!("failed to serialize governor state: {}", e)))?;
        fs::write(&tmp_path, &body).map_err(io_to_state_error)?;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(FILE_MODE))
            .map_err(io_to_state_error)?;
        fs::rename(&tmp_path, &final_path).map_err(io_to_state_error)?;
        Ok(())
    }

    /// Restores state from `dir` iff the file exists, is not malformed, and its mtime is
    /// within the last hour (§8 invariant 9). Any other condition is treated as "start
    /// cold", never a fatal error.
    pub fn load(dir: &Path) -> Option<Self> {
        let path = dir.join(STATE_FILE_NAME);
        let metadata = fs::metadata(&path).ok()?;
        let modified = metadata.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).ok()?;
        if age > STALE_AFTER {
            return None;
        }
        let body = fs::read(&path).ok()?;
        serde_json::from_slice(&body).ok()
    }

    /// Best-effort removal, used by `Governor::reset`. Absence of the file is not an error.
    pub fn remove(dir: &Path) {
        let _ = fs::remove_file(dir.join(STATE_FILE_NAME));
    }
}

fn io_to_state_error(err: io::Error) -> QanError {
    QanError::state(format!("governor state io error: {}", err))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration as StdDuration;

    fn sample_state() -> GovernorState {
        GovernorState {
            fast_ema_value: 0.42,
            slow_ema_value: 0.10,
            interval_ns: 2_000_000_000,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let state = sample_state();
        state.save(dir.path()).unwrap();

        let loaded = GovernorState::load(dir.path()).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn load_returns_none_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GovernorState::load(dir.path()).is_none());
    }

    #[test]
    fn load_returns_none_when_stale() {
        let dir = tempfile::tempdir().unwrap();
        let state = sample_state();
        state.save(dir.path()).unwrap();

        let path = dir.path().join(STATE_FILE_NAME);
        let stale = SystemTime::now() - StdDuration::from_secs(2 * 60 * 60);
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(stale)).unwrap();

        assert!(GovernorState::load(dir.path()).is_none());
    }
}

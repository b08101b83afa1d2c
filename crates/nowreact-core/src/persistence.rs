//! File persistence for the canvas snapshot.
//!
//! The state file is pretty-printed JSON so it diffs cleanly:
//!
//! ```json
//! {
//!   "height": 1,
//!   "namespace": "nowreact",
//!   "emojis": ["", "😀", ...]
//! }
//! ```
//!
//! Saves are atomic. The document is written to a temporary file in the
//! target directory, fsynced, renamed over the target, and the directory is
//! fsynced. A concurrent reader sees either the old file or the new one,
//! never a prefix.
//!
//! Loading distinguishes a missing file (first run, returns a fresh canvas)
//! from a file that exists but cannot be used (an error the caller must
//! surface). These functions block; async callers run them on
//! [`tokio::task::spawn_blocking`].

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use nowreact_types::{GridSize, INITIAL_HEIGHT, Snapshot};

/// Errors raised while reading or writing the state file.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The file or its directory could not be read, written, or renamed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path the operation was working on.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not a well-formed snapshot document.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// Path of the file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The file parsed but its contents are unusable.
    #[error("invalid state in {}: {reason}", path.display())]
    Invalid {
        /// Path of the file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// The snapshot could not be encoded.
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A save did not finish within its time budget.
    #[error("save to {} timed out after {}ms", path.display(), after.as_millis())]
    Timeout {
        /// Target path of the abandoned save.
        path: PathBuf,
        /// The budget that was exceeded.
        after: Duration,
    },

    /// A previous save timed out and has not finished yet.
    #[error("previous save to {} is still running", path.display())]
    Stalled {
        /// Target path of the stalled save.
        path: PathBuf,
    },

    /// The blocking save task panicked or was cancelled.
    #[error("save task failed: {0}")]
    Task(String),
}

impl PersistError {
    /// Whether this error means the file exists but its content is bad, as
    /// opposed to the file being unreachable.
    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Invalid { .. })
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of [`load_from_disk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded {
    /// No state file existed; this is a fresh canvas.
    Absent(Snapshot),
    /// The state file was read and validated.
    Restored(Snapshot),
}

impl Loaded {
    /// The snapshot, whichever way it was obtained.
    pub fn into_snapshot(self) -> Snapshot {
        match self {
            Self::Absent(snapshot) | Self::Restored(snapshot) => snapshot,
        }
    }

    /// Whether the snapshot came from disk.
    pub const fn is_restored(&self) -> bool {
        matches!(self, Self::Restored(_))
    }
}

/// Read the snapshot stored at `path`.
///
/// A missing file yields [`Loaded::Absent`] with a fresh canvas of `size`
/// in `namespace`.
///
/// # Errors
///
/// - [`PersistError::Io`] if the file exists but cannot be read.
/// - [`PersistError::Parse`] if it is not a snapshot document, including
///   a cell list whose length is not a perfect square.
/// - [`PersistError::Invalid`] if its height is below 1 or its grid does
///   not match `size`.
pub fn load_from_disk(
    path: &Path,
    size: GridSize,
    namespace: &str,
) -> Result<Loaded, PersistError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No state file, starting fresh canvas");
            return Ok(Loaded::Absent(Snapshot::fresh(size, namespace)));
        }
        Err(e) => return Err(PersistError::io(path, e)),
    };

    let snapshot: Snapshot =
        serde_json::from_slice(&bytes).map_err(|source| PersistError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if snapshot.height < INITIAL_HEIGHT {
        return Err(PersistError::Invalid {
            path: path.to_path_buf(),
            reason: format!("height {} is below {INITIAL_HEIGHT}", snapshot.height),
        });
    }
    let stored = snapshot.grid.size();
    if stored != size {
        return Err(PersistError::Invalid {
            path: path.to_path_buf(),
            reason: format!(
                "grid is {0}x{0} but the node is configured for {1}x{1}",
                stored.side(),
                size.side()
            ),
        });
    }

    tracing::info!(
        path = %path.display(),
        height = snapshot.height,
        filled = snapshot.grid.filled(),
        "State restored"
    );
    Ok(Loaded::Restored(snapshot))
}

/// Atomically replace the file at `path` with `snapshot`.
///
/// Creates the parent directory if needed (mode `0755` on Unix).
///
/// # Errors
///
/// Returns [`PersistError::Io`] if the directory cannot be created or any
/// step of the write fails, and [`PersistError::Serialize`] if encoding
/// fails. The previous file, if any, is left intact on error.
pub fn save_to_disk(path: &Path, snapshot: &Snapshot) -> Result<(), PersistError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    create_state_dir(dir)?;

    let mut body = serde_json::to_vec_pretty(snapshot).map_err(PersistError::Serialize)?;
    body.push(b'\n');

    let mut tmp = tempfile::Builder::new()
        .prefix(".state-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| PersistError::io(dir, e))?;
    tmp.write_all(&body)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| PersistError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| PersistError::io(path, e.error))?;
    sync_dir(dir)?;

    tracing::debug!(path = %path.display(), bytes = body.len(), "State saved");
    Ok(())
}

#[cfg(unix)]
fn create_state_dir(dir: &Path) -> Result<(), PersistError> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(dir)
        .map_err(|e| PersistError::io(dir, e))
}

#[cfg(not(unix))]
fn create_state_dir(dir: &Path) -> Result<(), PersistError> {
    std::fs::create_dir_all(dir).map_err(|e| PersistError::io(dir, e))
}

// Makes the rename durable. Directories cannot be opened for sync on
// non-Unix targets.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), PersistError> {
    std::fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| PersistError::io(dir, e))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn sync_dir(_dir: &Path) -> Result<(), PersistError> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nowreact_types::DEFAULT_NAMESPACE;

    use super::*;

    fn size(side: usize) -> GridSize {
        GridSize::new(side).unwrap()
    }

    #[test]
    fn missing_file_is_a_fresh_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_from_disk(&dir.path().join("state.json"), size(16), DEFAULT_NAMESPACE)
            .unwrap();
        assert!(!loaded.is_restored());
        let snap = loaded.into_snapshot();
        assert_eq!(snap.height, 1);
        assert_eq!(snap.namespace, "nowreact");
        assert_eq!(snap.grid.cells().len(), 256);
        assert!(snap.grid.cells().iter().all(String::is_empty));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut snap = Snapshot::fresh(size(4), "round-trip");
        snap.height = 7;
        snap.grid.set(0, "😀".to_owned()).unwrap();
        snap.grid.set(15, "🔥".to_owned()).unwrap();

        save_to_disk(&path, &snap).unwrap();
        let loaded = load_from_disk(&path, size(4), DEFAULT_NAMESPACE).unwrap();
        assert!(loaded.is_restored());
        assert_eq!(loaded.into_snapshot(), snap);
    }

    #[test]
    fn saved_file_is_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        save_to_disk(&path, &Snapshot::fresh(size(1), "ns")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"height\": 1"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["namespace"], "ns");
        assert_eq!(value["emojis"], serde_json::json!([""]));
    }

    #[test]
    fn save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join(".nowreact");
        let path = nested.join("state.json");
        save_to_disk(&path, &Snapshot::default()).unwrap();
        assert!(path.is_file());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&nested).unwrap().permissions().mode();
            assert_eq!(mode & 0o002, 0, "state dir must not be world-writable");
        }
    }

    #[test]
    fn overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut snap = Snapshot::fresh(size(2), "ns");
        for height in 1..=5 {
            snap.height = height;
            save_to_disk(&path, &snap).unwrap();
        }
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("state.json")]);
        let loaded = load_from_disk(&path, size(2), "ns").unwrap().into_snapshot();
        assert_eq!(loaded.height, 5);
    }

    #[test]
    fn corrupt_file_is_an_error_not_a_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{\"height\": 3, \"namespace\": \"x\", \"emo").unwrap();

        let err = load_from_disk(&path, size(16), DEFAULT_NAMESPACE).unwrap_err();
        assert!(matches!(err, PersistError::Parse { .. }));
        assert!(err.is_corrupt());
    }

    #[test]
    fn non_square_grid_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"height":1,"namespace":"x","emojis":["a","b"]}"#).unwrap();

        let err = load_from_disk(&path, size(16), DEFAULT_NAMESPACE).unwrap_err();
        assert!(matches!(err, PersistError::Parse { .. }));
    }

    #[test]
    fn wrong_grid_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        save_to_disk(&path, &Snapshot::fresh(size(4), "ns")).unwrap();

        let err = load_from_disk(&path, size(16), DEFAULT_NAMESPACE).unwrap_err();
        assert!(matches!(err, PersistError::Invalid { .. }));
        assert!(err.to_string().contains("4x4"));
    }

    #[test]
    fn zero_height_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"height":0,"namespace":"x","emojis":[""]}"#).unwrap();

        let err = load_from_disk(&path, size(1), DEFAULT_NAMESPACE).unwrap_err();
        assert!(matches!(err, PersistError::Invalid { .. }));
    }

    #[test]
    fn unreadable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory exists at the state path, so the read fails.
        let path = dir.path().join("state.json");
        std::fs::create_dir(&path).unwrap();

        let err = load_from_disk(&path, size(16), DEFAULT_NAMESPACE).unwrap_err();
        assert!(matches!(err, PersistError::Io { .. }));
        assert!(!err.is_corrupt());
    }

    #[test]
    fn failed_save_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let snap = Snapshot::fresh(size(2), "ns");
        save_to_disk(&path, &snap).unwrap();

        // The parent of the target is a regular file, so the save fails.
        let blocked = path.join("nested.json");
        assert!(save_to_disk(&blocked, &snap).is_err());
        assert_eq!(
            load_from_disk(&path, size(2), "ns").unwrap().into_snapshot(),
            snap
        );
    }
}

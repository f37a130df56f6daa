//! Shard Handler
//!
//! A shard handler owns one mutual-exclusion stripe and performs every
//! file-level operation for session IDs whose first character maps to it.
//! All 64 handlers share the same save root; the stripe partitions
//! *concurrency*, not storage.
//!
//! ## Locking
//!
//! The stripe mutex is held for the entire duration of each operation,
//! including the expiry scan's full directory walk. Reads serialize with
//! writes and with scans on the same shard; operations on different shards
//! share no state and run fully in parallel. The trade-off is tail latency
//! on a shard that is mid-scan, not safety.
//!
//! ## On-disk layout
//!
//! ```text
//! <root>/<first-two-characters-of-id>/<full-id>
//! ```
//!
//! One file per session, content = raw payload bytes, no header or framing.
//! Subdirectories are created 0700 and session files 0600 (owner-only).

use crate::store::error::{SessionError, SessionResult};
use bytes::Bytes;
use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::error;

/// One lock stripe plus the file operations it guards.
///
/// Callers must hand this handler only IDs that passed [`crate::id::is_valid`]:
/// path construction slices the first two bytes of the ID.
#[derive(Debug)]
pub(crate) struct ShardHandler {
    save_path: PathBuf,
    expire_interval: Duration,
    stripe: Mutex<()>,
}

impl ShardHandler {
    pub(crate) fn new(save_path: PathBuf, expire_interval: Duration) -> Self {
        Self {
            save_path,
            expire_interval,
            stripe: Mutex::new(()),
        }
    }

    /// Writes a brand-new session file.
    ///
    /// Creates the two-character subdirectory if needed, then creates the
    /// file exclusively. An existing file is reported as
    /// [`SessionError::AlreadyExists`] so the coordinator can regenerate
    /// the ID and retry.
    pub(crate) fn create(&self, id: &str, data: &[u8]) -> SessionResult<()> {
        let _guard = self.stripe.lock().unwrap();

        let dir = self.subdir_path(id);
        if !dir.is_dir() {
            make_private_dir(&dir).map_err(|e| {
                error!(path = %dir.display(), error = %e, "session subdirectory create failed");
                SessionError::io("create subdirectory", &dir, e)
            })?;
        }

        let path = self.session_path(id);
        let mut file = match open_exclusive(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SessionError::AlreadyExists { id: id.to_string() });
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "session file create failed");
                return Err(SessionError::io("create", &path, e));
            }
        };

        write_new_session(&mut file, &path, data).map_err(|e| {
            error!(path = %path.display(), error = %e, "session file write failed");
            SessionError::io("create", &path, e)
        })
    }

    /// Replaces the content of an existing session file in full.
    ///
    /// The file is truncated before the new payload is written, so nothing
    /// of the old content survives even when the new payload is shorter.
    /// A missing file (or missing parent directory, which only the create
    /// path may establish) is [`SessionError::NotFound`].
    pub(crate) fn update(&self, id: &str, data: &[u8]) -> SessionResult<()> {
        let _guard = self.stripe.lock().unwrap();

        let path = self.session_path(id);
        let mut file = match OpenOptions::new().write(true).truncate(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SessionError::NotFound { id: id.to_string() });
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "session file open for update failed");
                return Err(SessionError::io("update", &path, e));
            }
        };

        file.write_all(data).map_err(|e| {
            error!(path = %path.display(), error = %e, "session file update failed");
            SessionError::io("update", &path, e)
        })
    }

    /// Removes a session file. Absence is success: delete is idempotent.
    pub(crate) fn delete(&self, id: &str) -> SessionResult<()> {
        let _guard = self.stripe.lock().unwrap();

        let path = self.session_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                error!(path = %path.display(), error = %e, "session file delete failed");
                Err(SessionError::io("delete", &path, e))
            }
        }
    }

    /// Reads the full session payload, or fails; no partial reads.
    pub(crate) fn read(&self, id: &str) -> SessionResult<Bytes> {
        let _guard = self.stripe.lock().unwrap();

        let path = self.session_path(id);
        match fs::read(&path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(SessionError::NotFound { id: id.to_string() })
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "session file read failed");
                Err(SessionError::io("read", &path, e))
            }
        }
    }

    /// Returns the session file's last-access time as recorded by the
    /// filesystem. Mount options such as `noatime` make this value
    /// platform-dependent; it is also the clock the expiry scan uses.
    pub(crate) fn timestamp(&self, id: &str) -> SessionResult<SystemTime> {
        let _guard = self.stripe.lock().unwrap();

        let path = self.session_path(id);
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SessionError::NotFound { id: id.to_string() });
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "session file stat failed");
                return Err(SessionError::io("timestamp", &path, e));
            }
        };

        meta.accessed()
            .map_err(|e| SessionError::io("timestamp", &path, e))
    }

    /// Scans every subdirectory whose name begins with `prefix` and deletes
    /// session files whose last-access time is older than the expire
    /// interval. Returns the number of sessions removed.
    ///
    /// Subdirectory names are two characters but matching is by the single
    /// leading character: each scan covers exactly the subdirectories of
    /// the IDs this shard owns.
    ///
    /// The first failure aborts the scan; the next scheduled sweep starts
    /// an independent rescan from scratch.
    pub(crate) fn purge_expired(&self, prefix: char) -> SessionResult<u64> {
        let _guard = self.stripe.lock().unwrap();

        let now = SystemTime::now();
        let mut removed = 0u64;

        let entries = fs::read_dir(&self.save_path).map_err(|e| {
            error!(path = %self.save_path.display(), error = %e, "sessions directory scan failed");
            SessionError::io("purge scan", &self.save_path, e)
        })?;

        for entry in entries {
            let entry =
                entry.map_err(|e| SessionError::io("purge scan", &self.save_path, e))?;

            let name = entry.file_name();
            if !name.to_str().is_some_and(|n| n.starts_with(prefix)) {
                continue;
            }
            let is_dir = entry
                .file_type()
                .map_err(|e| SessionError::io("purge scan", entry.path(), e))?
                .is_dir();
            if !is_dir {
                continue;
            }

            removed += self.purge_subdir(&entry.path(), now)?;
        }

        Ok(removed)
    }

    fn purge_subdir(&self, subdir: &Path, now: SystemTime) -> SessionResult<u64> {
        let mut removed = 0u64;

        let files = fs::read_dir(subdir).map_err(|e| {
            error!(path = %subdir.display(), error = %e, "sessions subdirectory scan failed");
            SessionError::io("purge scan", subdir, e)
        })?;

        for file in files {
            let file = file.map_err(|e| SessionError::io("purge scan", subdir, e))?;
            let path = file.path();

            let meta = file.metadata().map_err(|e| {
                error!(path = %path.display(), error = %e, "session file stat failed");
                SessionError::io("purge stat", &path, e)
            })?;
            let accessed = meta
                .accessed()
                .map_err(|e| SessionError::io("purge stat", &path, e))?;

            let age = now.duration_since(accessed).unwrap_or(Duration::ZERO);
            if age <= self.expire_interval {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    error!(path = %path.display(), error = %e, "expired session delete failed");
                    return Err(SessionError::io("purge delete", &path, e));
                }
            }
        }

        Ok(removed)
    }

    fn subdir_path(&self, id: &str) -> PathBuf {
        self.save_path.join(&id[..2])
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.save_path.join(&id[..2]).join(id)
    }
}

/// Creates a directory with owner-only permissions.
fn make_private_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}

/// Writes the payload into a freshly created session file.
///
/// A failed write removes the file again before the error propagates: a
/// session file that exists must always be a fully written one, and the
/// create retry loop relies on a failed path being left clear.
fn write_new_session(file: &mut File, path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Err(e) = file.write_all(data) {
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

/// Opens a new file exclusively (fails if it already exists) with
/// owner-only permissions.
fn open_exclusive(path: &Path) -> std::io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    opts.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    fn handler(dir: &TempDir, expire_interval: Duration) -> ShardHandler {
        ShardHandler::new(dir.path().to_path_buf(), expire_interval)
    }

    #[test]
    fn test_create_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir, YEAR);

        h.create("AbXXXXXXXX", b"hello world").unwrap();
        assert_eq!(h.read("AbXXXXXXXX").unwrap(), Bytes::from("hello world"));
    }

    #[test]
    fn test_create_writes_to_two_char_subdirectory() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir, YEAR);

        h.create("AbXXXXXXXX", b"payload").unwrap();
        assert!(dir.path().join("Ab").join("AbXXXXXXXX").is_file());
    }

    #[test]
    fn test_create_existing_reports_already_exists() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir, YEAR);

        h.create("AbXXXXXXXX", b"first").unwrap();
        let err = h.create("AbXXXXXXXX", b"second").unwrap_err();
        assert!(matches!(err, SessionError::AlreadyExists { .. }));

        // The original payload is untouched.
        assert_eq!(h.read("AbXXXXXXXX").unwrap(), Bytes::from("first"));
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir, YEAR);

        let err = h.read("AbMISSING0").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_truncates_longer_payload() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir, YEAR);

        h.create("AbXXXXXXXX", b"a much longer original payload").unwrap();
        h.update("AbXXXXXXXX", b"short").unwrap();
        assert_eq!(h.read("AbXXXXXXXX").unwrap(), Bytes::from("short"));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir, YEAR);

        let err = h.update("AbMISSING0", b"data").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir, YEAR);

        h.create("AbXXXXXXXX", b"payload").unwrap();
        h.delete("AbXXXXXXXX").unwrap();
        h.delete("AbXXXXXXXX").unwrap();
        assert!(h.read("AbXXXXXXXX").unwrap_err().is_not_found());
    }

    #[test]
    fn test_timestamp_of_fresh_session_is_recent() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir, YEAR);

        h.create("AbXXXXXXXX", b"payload").unwrap();
        let ts = h.timestamp("AbXXXXXXXX").unwrap();
        let age = SystemTime::now().duration_since(ts).unwrap_or_default();
        assert!(age < Duration::from_secs(60));
    }

    #[test]
    fn test_timestamp_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir, YEAR);

        assert!(h.timestamp("AbMISSING0").unwrap_err().is_not_found());
    }

    #[test]
    fn test_purge_removes_sessions_older_than_interval() {
        let dir = TempDir::new().unwrap();
        // Zero interval: anything with a past access time is expired.
        let h = handler(&dir, Duration::ZERO);

        h.create("AbXXXXXXXX", b"stale").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(h.purge_expired('A').unwrap(), 1);
        assert!(h.read("AbXXXXXXXX").unwrap_err().is_not_found());
    }

    #[test]
    fn test_purge_keeps_sessions_within_interval() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir, YEAR);

        h.create("AbXXXXXXXX", b"fresh").unwrap();
        assert_eq!(h.purge_expired('A').unwrap(), 0);
        assert_eq!(h.read("AbXXXXXXXX").unwrap(), Bytes::from("fresh"));
    }

    #[test]
    fn test_failed_write_leaves_no_session_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("AbXXXXXXXX");
        fs::write(&path, b"half-written").unwrap();

        // A read-only handle makes every write fail, like a full disk would.
        let mut file = fs::File::open(&path).unwrap();
        assert!(write_new_session(&mut file, &path, b"payload").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_other_shards_proceed_while_one_stripe_is_held() {
        let dir = TempDir::new().unwrap();
        let a = handler(&dir, YEAR);
        let z = handler(&dir, YEAR);
        z.create("ZzXXXXXXXX", b"z-shard").unwrap();

        // Park the 'A' stripe for the duration, as a long purge scan would.
        let _scan = a.stripe.lock().unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let worker = std::thread::spawn(move || {
            let data = z.read("ZzXXXXXXXX").unwrap();
            z.create("ZyXXXXXXXX", b"another").unwrap();
            z.delete("ZyXXXXXXXX").unwrap();
            tx.send(data).unwrap();
        });

        let data = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("operation on an unrelated shard blocked");
        assert_eq!(data, Bytes::from("z-shard"));
        worker.join().unwrap();
    }

    #[test]
    fn test_purge_only_touches_matching_prefix() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir, Duration::ZERO);

        h.create("AbSTALE000", b"a-shard").unwrap();
        h.create("ZzSTALE000", b"z-shard").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(h.purge_expired('A').unwrap(), 1);
        assert_eq!(h.read("ZzSTALE000").unwrap(), Bytes::from("z-shard"));
    }
}

//! Store Coordinator
//!
//! [`SessionStore`] owns the configuration and a fixed table of 64 shard
//! handlers, one per alphabet symbol, built once at startup and immutable
//! for the store's lifetime. Every ID-keyed call is routed to the owning
//! handler by the ID's first character, so a given ID always lands on the
//! same lock stripe.

use crate::id;
use crate::store::error::{SessionError, SessionResult};
use crate::store::handler::ShardHandler;
use bytes::Bytes;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::info;

/// Configuration for a [`SessionStore`].
///
/// All four knobs are independent; [`Default`] gives the stock setup:
/// `./sessions` root, strength 8 (80-character IDs), sessions expire after
/// 365 days, the sweeper runs every 24 hours.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory session files are kept under
    pub save_path: PathBuf,
    /// Number of 10-character random chunks per session ID
    pub strength: usize,
    /// Age (since last access) after which a session is purged
    pub expire_interval: Duration,
    /// How often the background sweeper runs a full purge scan
    pub purge_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from("./sessions"),
            strength: 8,
            expire_interval: Duration::from_secs(365 * 24 * 60 * 60),
            purge_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// A file-backed session store keyed by random tokens.
///
/// The store is a plain operation set with no transport attached: create,
/// read, update, delete, inspect the last-access timestamp, and purge
/// expired sessions. Every call blocks until the filesystem operation
/// completes. Wrap the store in an [`std::sync::Arc`] to share it across
/// threads or tasks; all operations take `&self`.
///
/// # Example
///
/// ```no_run
/// use sessionfs::{SessionStore, StoreConfig};
///
/// let store = SessionStore::new(StoreConfig::default()).unwrap();
///
/// let id = store.create(b"payload").unwrap();
/// assert_eq!(store.read(&id).unwrap().as_ref(), b"payload");
/// store.delete(&id).unwrap();
/// ```
#[derive(Debug)]
pub struct SessionStore {
    /// One handler per alphabet symbol, indexed by alphabet position
    handlers: Vec<ShardHandler>,
    strength: usize,
    purge_interval: Duration,
}

impl SessionStore {
    /// Opens a session store over `config.save_path`.
    ///
    /// An absent save root is created with owner-only permissions. A save
    /// root that exists but is not a directory is a
    /// [`SessionError::NotADirectory`] configuration error.
    pub fn new(config: StoreConfig) -> SessionResult<Self> {
        match fs::metadata(&config.save_path) {
            Ok(meta) if !meta.is_dir() => {
                return Err(SessionError::NotADirectory(config.save_path));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                make_save_root(&config.save_path)
                    .map_err(|e| SessionError::io("create save path", &config.save_path, e))?;
            }
            Err(e) => {
                return Err(SessionError::io("stat save path", &config.save_path, e));
            }
        }

        let handlers = (0..id::ALPHABET.len())
            .map(|_| ShardHandler::new(config.save_path.clone(), config.expire_interval))
            .collect();

        info!(
            save_path = %config.save_path.display(),
            strength = config.strength,
            "session store opened with 64 shards"
        );

        Ok(Self {
            handlers,
            strength: config.strength,
            purge_interval: config.purge_interval,
        })
    }

    /// Creates a new session holding `data` and returns its ID.
    ///
    /// IDs are regenerated and retried on collision until a create
    /// succeeds, so `AlreadyExists` never reaches the caller; with the
    /// default 480-bit ID space the first attempt is expected to win.
    pub fn create(&self, data: &[u8]) -> SessionResult<String> {
        loop {
            let id = id::generate(self.strength)?;
            match self.handler_for(&id)?.create(&id, data) {
                Ok(()) => return Ok(id),
                Err(SessionError::AlreadyExists { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Reads the full payload of a session.
    pub fn read(&self, id: &str) -> SessionResult<Bytes> {
        self.handler_for(id)?.read(id)
    }

    /// Replaces a session's payload in full.
    pub fn update(&self, id: &str, data: &[u8]) -> SessionResult<()> {
        self.handler_for(id)?.update(id, data)
    }

    /// Deletes a session. Deleting a session that does not exist is a
    /// successful no-op.
    pub fn delete(&self, id: &str) -> SessionResult<()> {
        self.handler_for(id)?.delete(id)
    }

    /// Returns a session's last-access time as recorded by the filesystem.
    pub fn timestamp(&self, id: &str) -> SessionResult<SystemTime> {
        self.handler_for(id)?.timestamp(id)
    }

    /// Rotates a session: reads its payload, deletes it, and creates a
    /// fresh session with the same payload under a new ID.
    ///
    /// Useful against session fixation: the payload survives, the token
    /// does not. The three steps are not atomic; a failure between delete
    /// and create loses the session.
    pub fn reset(&self, id: &str) -> SessionResult<String> {
        let data = self.read(id)?;
        self.delete(id)?;
        self.create(&data)
    }

    /// Runs the expiry scan on every shard in alphabet order and returns
    /// the total number of sessions removed.
    ///
    /// The first shard to fail aborts the remaining scans for this cycle;
    /// the next cycle starts a fresh, independent rescan.
    pub fn purge_expired(&self) -> SessionResult<u64> {
        let mut removed = 0u64;
        for (i, handler) in self.handlers.iter().enumerate() {
            removed += handler.purge_expired(id::ALPHABET[i] as char)?;
        }
        Ok(removed)
    }

    /// The configured interval between background purge sweeps.
    pub fn purge_interval(&self) -> Duration {
        self.purge_interval
    }

    /// Routes an ID to its owning shard handler by the first character.
    fn handler_for(&self, id: &str) -> SessionResult<&ShardHandler> {
        if !id::is_valid(id) {
            return Err(SessionError::InvalidId { id: id.to_string() });
        }
        // is_valid guarantees the first byte maps into the table.
        let index = id::shard_index(id.as_bytes()[0]).unwrap();
        Ok(&self.handlers[index])
    }
}

/// Creates the save root with owner-only permissions.
fn make_save_root(path: &std::path::Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}

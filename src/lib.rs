//! # sessionfs - A File-Backed Session Store
//!
//! sessionfs stores opaque byte payloads on disk, keyed by randomly
//! generated tokens. It supports create, read, update, delete, last-access
//! inspection, and periodic expiry of stale sessions, and nothing else:
//! the store is transport-agnostic and any server in front of it is an
//! ordinary caller.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           sessionfs                             │
//! │                                                                 │
//! │  caller ──> SessionStore ──(route by first ID char)──┐          │
//! │                  │                                   ▼          │
//! │                  │                         ┌──────────────────┐ │
//! │  ┌────────────┐  │                         │  ShardHandler    │ │
//! │  │ID Generator│<─┘ (create retry loop)     │  (64 stripes,    │ │
//! │  └────────────┘                            │   one Mutex each)│ │
//! │                                            └────────┬─────────┘ │
//! │  ┌──────────────────────────┐                       ▼           │
//! │  │       PurgeSweeper       │──> purge    <root>/<id[0..2]>/<id>│
//! │  │  (background tokio task) │    scan         (filesystem)      │
//! │  └──────────────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use sessionfs::{start_purge_sweeper, SessionStore, StoreConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> sessionfs::SessionResult<()> {
//!     // Open the store (creates ./sessions if absent)
//!     let store = Arc::new(SessionStore::new(StoreConfig::default())?);
//!
//!     // Start the background purge sweeper
//!     let _sweeper = start_purge_sweeper(Arc::clone(&store));
//!
//!     // Create, read, update, delete
//!     let id = store.create(b"payload")?;
//!     let _payload = store.read(&id)?;
//!     store.update(&id, b"new payload")?;
//!     store.delete(&id)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`id`]: session ID generation over a 64-symbol URL-safe alphabet
//! - [`store`]: the coordinating store, shard handlers, and purge sweeper
//!
//! ## Design Highlights
//!
//! ### Sharded Locking
//!
//! The store keeps 64 shard handlers, one per alphabet symbol, each with
//! its own mutex held for the full duration of every operation on that
//! shard. Sessions whose IDs start with different characters never block
//! one another, even while one shard is mid-scan.
//!
//! ### Expiry by Last Access
//!
//! The purge sweeper periodically walks the save tree and deletes session
//! files whose filesystem last-access time is older than the configured
//! expire interval. Mount options that suppress access-time updates
//! (`noatime`) weaken this clock; see [`SessionStore::timestamp`].
//!
//! ### Everything Is a Result
//!
//! All failures, including entropy-source failures during ID generation,
//! come back as [`SessionError`] values. The library never terminates the
//! process.

pub mod id;
pub mod store;

// Re-export commonly used types for convenience
pub use store::{
    start_purge_sweeper, PurgeSweeper, SessionError, SessionResult, SessionStore, StoreConfig,
};

/// Version of sessionfs
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

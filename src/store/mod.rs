//! Session Store Module
//!
//! The coordinating store, its shard handlers, and the background purge
//! sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SessionStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │Shard 'A'│ │Shard 'B'│ │Shard 'C'│ │ ... 64  │           │
//! │  │ Mutex   │ │ Mutex   │ │ Mutex   │ │ shards  │           │
//! │  └────┬────┘ └────┬────┘ └────┬────┘ └────┬────┘           │
//! └───────┼───────────┼───────────┼───────────┼─────────────────┘
//!         ▼           ▼           ▼           ▼
//!               <root>/<id[0..2]>/<id>  (filesystem)
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │       PurgeSweeper        │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! The store routes every ID-keyed call to the shard owning the ID's
//! first character. Shards are a concurrency partition only; all 64
//! write into the same save root.

pub mod coordinator;
pub mod error;
pub(crate) mod handler;
pub mod sweeper;

// Re-export commonly used types
pub use coordinator::{SessionStore, StoreConfig};
pub use error::{SessionError, SessionResult};
pub use sweeper::{start_purge_sweeper, PurgeSweeper};

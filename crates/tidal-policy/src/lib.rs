//! tidal-policy — where scaling policies come from.
//!
//! The agent consumes policies through the [`PolicySource`] contract: a
//! change feed that delivers the full policy set whenever it changes, and
//! point lookups by ID. [`StorePolicySource`] implements it on top of a
//! redb-backed [`PolicyStore`] whose modify index is polled for changes.
//!
//! # Architecture
//!
//! ```text
//! PolicyStore (redb)
//!   ├── policies: id → JSON policy
//!   └── meta: "index" → u64, bumped on every write
//!
//! StorePolicySource
//!   ├── get(id)   → read one policy
//!   └── notify()  → watcher task polling the index
//!        ├── index advanced → full policy list on the policy channel
//!        └── read failure   → error channel
//! ```

pub mod blocking;
pub mod error;
pub mod file;
pub mod source;
pub mod store;
pub mod tables;

pub use error::{PolicyFileError, PolicySourceError, StoreError, StoreResult};
pub use file::PolicyFile;
pub use source::{PolicyFeed, PolicySource, StorePolicySource};
pub use store::PolicyStore;

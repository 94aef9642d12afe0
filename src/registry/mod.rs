//! Single-flight registry of media handles
//!
//! The registry maps `(host, name)` to the one running handle for that
//! resource, starting it on first access. Concurrent first accesses may each
//! start a handle, but only one survives registration; the rest are shut
//! down and their callers get the winner.
//!
//! # Architecture
//!
//! ```text
//!                           MediaRegistry (clone)
//!                     ┌─────────────────────────────┐
//!        find ───────►│ RegistryTable (DashMap)     │◄──── writes ────┐
//!                     └─────────────────────────────┘                 │
//!                                                                     │
//!        open ──► Opener ──► detect chain ──► HandleStarter           │
//!                   │                               │                 │
//!                   │          register / watch     ▼                 │
//!                   └──────────────────────────► Coordinator ─────────┘
//!                                                   ▲     │
//!                              exit watchers ───────┘     └──► events
//! ```
//!
//! # Lock-Free Reads
//!
//! `find` reads the table directly and never waits on the coordinator. Only
//! the coordinator inserts or deletes, one request at a time, which makes
//! check-then-insert atomic without a global lock on the read path.

pub mod config;
mod coordinator;
pub mod entry;
pub mod error;
pub mod event;
pub mod key;
pub mod monitor;
mod opener;
pub mod store;
pub mod table;

pub use config::{HostConfig, RegistryConfig, DEFAULT_MAX_ALIAS_HOPS, DEFAULT_REMOTE_TIMEOUT};
pub use entry::{EntryListing, RegistryEntry};
pub use error::RegistryError;
pub use event::RegistryEvent;
pub use key::RegistryKey;
pub use monitor::MonitorToken;
pub use store::{MediaRegistry, WeakRegistry};
pub use table::RegistryTable;

//! # tally-station: Station Runtime for Tally Ledger
//!
//! What one POS terminal runs next to its UI. Stations never talk to each
//! other directly; the per-store lock document in the shared store is the
//! only coordination between them.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Station Runtime                                │
//! │                                                                         │
//! │   UI action                                                             │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  ┌────────────────┐   try_lock / release   ┌─────────────────────────┐  │
//! │  │  OrderEditor   │───────────────────────►│    LockCoordinator      │  │
//! │  │                │                        │  lo_<store_id> document │  │
//! │  │ tally-core     │                        └────────────▲────────────┘  │
//! │  │ mutation       │                                     │               │
//! │  └───────┬────────┘                                     │ settle        │
//! │          │ put(order, rev)                 ┌────────────┴────────────┐  │
//! │          ▼                                 │       Reconciler        │  │
//! │  ┌─────────────────────────────┐           │  interval + commands    │  │
//! │  │   DocumentStore (tally-db)  │◄──────────┤                         │  │
//! │  └─────────────────────────────┘           └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`config`] - `station.toml` with `TALLY_*` environment overrides
//! - [`lock`] - Lock document operations
//! - [`editor`] - Lock, mutate, persist, release
//! - [`reconciler`] - Background settling of released locks
//! - [`error`] - Station error types

pub mod config;
pub mod editor;
pub mod error;
pub mod lock;
pub mod reconciler;

pub use config::StationConfig;
pub use editor::OrderEditor;
pub use error::{StationError, StationResult};
pub use lock::{LockCoordinator, LockEntry, LockStatus, LockTable, OrderRev};
pub use reconciler::{Reconciler, ReconcilerConfig, ReconcilerHandle};

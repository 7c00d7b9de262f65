//! Filesystem indexing and interactive search core.
//!
//! This crate provides:
//! - An arena-backed per-root entry tree and a flat, sorted index array
//!   over every indexed root
//! - A directory scanner with exclude rules
//! - A compact binary persistence format for the indexed tree
//! - A multi-threaded query engine (plain, wildcard, and regex matching)
//! - A refcounted, lockable database and a single-worker query coordinator
//!   with a replace-latest mailbox

pub mod array;
pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod error;
pub mod node_id;
pub mod persistence;
pub mod pool;
pub mod query;
pub mod scanner;
pub mod tree;
pub mod types;

pub use array::{compare_entries, natural_cmp, EntryRef, IndexArray};
pub use cancel::{CancellationHandle, CancellationToken};
pub use coordinator::Coordinator;
pub use database::{build_incremental_snapshot, build_initial_snapshot, Database, Snapshot};
pub use error::{Error, Result};
pub use node_id::{NodeId, OptionNodeId};
pub use pool::{Entry, EntryPool};
pub use query::QueryEngine;
pub use scanner::ScanPolicy;
pub use tree::RootTree;
pub use types::{
    ExcludePath, FilterKind, IncludePath, Query, QueryFilterSpec, QueryFlags, QueryObserver,
    SearchResult,
};

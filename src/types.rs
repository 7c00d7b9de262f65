//! Shared data types for scan policy and query submission (§3, §6.2, §6.4).

use std::path::PathBuf;

use crate::array::EntryRef;

/// One configured indexed root (§3 "Include path").
#[derive(Debug, Clone)]
pub struct IncludePath {
    pub path: PathBuf,
    pub enabled: bool,
    /// Re-walk the filesystem instead of loading the persisted tree.
    pub update: bool,
    pub last_scanned_at: Option<i64>,
}

impl IncludePath {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            enabled: true,
            update: true,
            last_scanned_at: None,
        }
    }
}

/// A directory prefix excluded from scanning (§3 "Exclude path").
#[derive(Debug, Clone)]
pub struct ExcludePath {
    pub path: PathBuf,
    pub enabled: bool,
}

/// Coarse pre-match rule layered in front of token matching (§3 "Query").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    #[default]
    Any,
    FilesOnly,
    FoldersOnly,
    WithQuery,
}

/// Per-token and per-filter flags controlling how matching is compiled.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryFlags {
    pub match_case: bool,
    pub auto_match_case: bool,
    pub enable_regex: bool,
    pub search_in_path: bool,
    pub auto_search_in_path: bool,
    pub pass_on_empty: bool,
}

/// Raw (uncompiled) filter specification supplied at submission time.
#[derive(Debug, Clone, Default)]
pub struct QueryFilterSpec {
    pub kind: FilterKind,
    pub query: String,
    pub search_in_path: bool,
}

/// A compiled search request: text, flags, optional filter, result cap.
/// `database` is cloned (incrementing its refcount) for the lifetime of the
/// query (§3).
pub struct Query {
    pub text: String,
    pub database: crate::database::Database,
    pub flags: QueryFlags,
    pub filter: Option<QueryFilterSpec>,
    /// 0 means unlimited.
    pub max_results: usize,
    pub observer: Box<dyn QueryObserver>,
}

/// Callback pair invoked by the coordinator when a submitted query settles
/// (§9 "Unbounded void* callbacks" — a trait replaces the opaque
/// user-pointer callback pair from the original).
pub trait QueryObserver: Send {
    fn on_result(&self, result: SearchResult);
    fn on_cancelled(&self);
}

/// `{ matches, num_folders, num_files }` (§3 "Result"). Does not carry a
/// back-reference to the query: the observer that receives it already owns
/// that context.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub matches: Vec<EntryRef>,
    pub num_folders: u32,
    pub num_files: u32,
}

//! Multi-threaded query execution over a database snapshot (§4.6).
//!
//! The engine owns a [`rayon::ThreadPool`] sized `min(cpu_count, 64)`,
//! created once and reused across every query it runs — this mirrors the
//! original's persistent `fsearch_thread_pool` and its `db_search`
//! contiguous-range partitioning (`num_items_per_thread = len / threads`,
//! last worker absorbs the remainder).

use std::cmp::min;

use rayon::prelude::*;

use crate::array::EntryRef;
use crate::cancel::CancellationToken;
use crate::database::Snapshot;
use crate::error::Result;
use crate::types::{QueryFilterSpec, QueryFlags, SearchResult};

use super::filter::CompiledFilter;
use super::token::{compile_tokens, Token};

const MAX_WORKERS: usize = 64;

/// Owns the query engine's dedicated thread pool.
pub struct QueryEngine {
    pool: rayon::ThreadPool,
}

impl QueryEngine {
    pub fn new() -> Self {
        let workers = min(num_cpus(), MAX_WORKERS).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fsearch-query-{i}"))
            .build()
            .expect("failed to build query engine thread pool");
        Self { pool }
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs a query against `snapshot`. Returns `None` if `cancel` was
    /// observed before the merge step completed (§4.6, §5 "Cancellation").
    pub fn run(
        &self,
        query_text: &str,
        flags: QueryFlags,
        filter_spec: Option<&QueryFilterSpec>,
        max_results: usize,
        snapshot: &Snapshot,
        cancel: &CancellationToken,
    ) -> Result<Option<SearchResult>> {
        let filter = filter_spec
            .map(|spec| CompiledFilter::compile(spec, &flags))
            .transpose()?;

        if query_text.is_empty() && flags.pass_on_empty {
            return Ok(Some(self.run_empty_query_fast_path(
                filter.as_ref(),
                max_results,
                snapshot,
                cancel,
            )));
        }
        if query_text.is_empty() && !flags.pass_on_empty {
            return Ok(Some(SearchResult::default()));
        }

        let tokens = compile_tokens(query_text, &flags)?;
        Ok(self.run_tokenized(&tokens, flags, filter.as_ref(), max_results, snapshot, cancel))
    }

    fn run_empty_query_fast_path(
        &self,
        filter: Option<&CompiledFilter>,
        max_results: usize,
        snapshot: &Snapshot,
        cancel: &CancellationToken,
    ) -> SearchResult {
        let mut result = SearchResult::default();
        let array = snapshot.array.as_slice();
        for (i, entry_ref) in array.iter().enumerate() {
            if cancel.is_cancelled_sparse(i).is_none() {
                return SearchResult::default();
            }
            let entry = snapshot.entry(*entry_ref);
            if let Some(filter) = filter {
                let full_path = lazy_full_path(snapshot, *entry_ref, filter.search_in_path);
                if !filter.passes(entry.is_dir, &entry.name, full_path.as_deref().unwrap_or(&entry.name)) {
                    continue;
                }
            }
            if max_results != 0 && result.matches.len() >= max_results {
                break;
            }
            count_match(&mut result, entry.is_dir);
            result.matches.push(*entry_ref);
        }
        result
    }

    fn run_tokenized(
        &self,
        tokens: &[Token],
        flags: QueryFlags,
        filter: Option<&CompiledFilter>,
        max_results: usize,
        snapshot: &Snapshot,
        cancel: &CancellationToken,
    ) -> Option<SearchResult> {
        let array = snapshot.array.as_slice();
        let len = array.len();
        let worker_count = min(self.worker_count(), len.max(1));
        let ranges = partition_ranges(len, worker_count);

        let per_worker: Vec<Vec<EntryRef>> = self.pool.install(|| {
            ranges
                .par_iter()
                .map(|range| {
                    let mut local = Vec::with_capacity(range.len() + 1);
                    for i in range.clone() {
                        if cancel.is_cancelled_sparse(i).is_none() {
                            return Vec::new();
                        }
                        let entry_ref = array[i];
                        let entry = snapshot.entry(entry_ref);

                        if let Some(filter) = filter {
                            let full_path = lazy_full_path(snapshot, entry_ref, filter.search_in_path);
                            if !filter.passes(
                                entry.is_dir,
                                &entry.name,
                                full_path.as_deref().unwrap_or(&entry.name),
                            ) {
                                continue;
                            }
                        }

                        let mut cached_path: Option<Vec<u8>> = None;
                        let matched = tokens.iter().all(|token| {
                            let use_path =
                                flags.search_in_path || (flags.auto_search_in_path && token.has_path_separator);
                            if use_path {
                                if cached_path.is_none() {
                                    cached_path = lazy_full_path(snapshot, entry_ref, true);
                                }
                                token.matches(cached_path.as_deref().unwrap_or(&entry.name))
                            } else {
                                token.matches(&entry.name)
                            }
                        });
                        if matched {
                            local.push(entry_ref);
                        }
                    }
                    local
                })
                .collect()
        });

        if cancel.is_cancelled().is_none() {
            return None;
        }

        let mut result = SearchResult::default();
        'merge: for worker_matches in per_worker {
            for entry_ref in worker_matches {
                if max_results != 0 && result.matches.len() >= max_results {
                    break 'merge;
                }
                let entry = snapshot.entry(entry_ref);
                count_match(&mut result, entry.is_dir);
                result.matches.push(entry_ref);
            }
        }
        Some(result)
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn count_match(result: &mut SearchResult, is_dir: bool) {
    if is_dir {
        result.num_folders += 1;
    } else {
        result.num_files += 1;
    }
}

fn lazy_full_path(snapshot: &Snapshot, entry_ref: EntryRef, needed: bool) -> Option<Vec<u8>> {
    if !needed {
        return None;
    }
    let mut buf = Vec::new();
    let pool = &snapshot.roots[entry_ref.root as usize].pool;
    crate::tree::build_full_path_into(pool, entry_ref.node, &mut buf);
    Some(buf)
}

/// Splits `[0, len)` into `workers` near-equal contiguous ranges; the last
/// range absorbs the remainder.
fn partition_ranges(len: usize, workers: usize) -> Vec<std::ops::Range<usize>> {
    if workers == 0 || len == 0 {
        return Vec::new();
    }
    let chunk = len / workers;
    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for i in 0..workers {
        let end = if i == workers - 1 { len } else { start + chunk };
        ranges.push(start..end);
        start = end;
    }
    ranges
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

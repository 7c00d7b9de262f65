//! The refcounted, lockable bundle of all per-root trees and the index
//! array (§3 "Database", §4.7).
//!
//! The original's manual refcount-plus-mutex is replaced by `Arc` doing the
//! refcounting for free (`Database::clone`/`drop` are `ref`/`unref`) wrapped
//! around a `Mutex<Arc<Snapshot>>`: the mutex is only ever held long enough
//! to swap the pointer. A running query clones the `Arc<Snapshot>` once up
//! front and then reads it lock-free for as long as it runs, so a
//! concurrent rebuild can swap in a new snapshot without blocking or
//! invalidating the query's view (§5 "Shared-resource discipline").

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::array::{compare_entries, EntryRef, IndexArray};
use crate::cancel::CancellationToken;
use crate::config::database_path_for_root;
use crate::error::Result;
use crate::persistence::{read_tree, write_tree};
use crate::pool::DEFAULT_BLOCK_SIZE;
use crate::scanner::{compile_exclude_patterns, scan as scan_root, ScanPolicy};
use crate::tree::{n_nodes, traverse, RootTree};
use crate::types::{ExcludePath, IncludePath};

/// An immutable, point-in-time view of every indexed root plus the sorted
/// array over them. Queries hold an `Arc<Snapshot>` for their entire run.
pub struct Snapshot {
    pub roots: Vec<RootTree>,
    pub array: IndexArray,
    pub num_entries: u32,
    pub num_folders: u32,
    pub num_files: u32,
    pub scanned_at: i64,
}

impl Snapshot {
    pub fn entry(&self, r: EntryRef) -> &crate::pool::Entry {
        self.roots[r.root as usize].pool.get(r.node)
    }

    pub fn empty() -> Self {
        Self {
            roots: Vec::new(),
            array: IndexArray::build(0),
            num_entries: 0,
            num_folders: 0,
            num_files: 0,
            scanned_at: 0,
        }
    }
}

/// Builds the flat array from scratch: traversal order, sort by
/// `(is_dir desc, name natural-order)`, then write `pos` back into every
/// entry (§4.7 "Initial build").
pub fn build_initial_snapshot(mut roots: Vec<RootTree>) -> Snapshot {
    let total: usize = roots.iter().map(|t| n_nodes(&t.pool, t.root) as usize).sum();
    let mut array = IndexArray::build(total);
    let mut num_folders = 0u32;
    let mut num_files = 0u32;

    for (root_index, root) in roots.iter().enumerate() {
        traverse(&root.pool, root.root, &mut |node| {
            if root.pool.get(node).is_dir {
                num_folders += 1;
            } else {
                num_files += 1;
            }
            array.append(EntryRef::new(root_index as u32, node));
        });
    }

    array.sort(|a, b| compare_entries(&roots, a, b));
    for (i, entry_ref) in array.as_slice().iter().enumerate() {
        roots[entry_ref.root as usize].pool.get_mut(entry_ref.node).pos = i as u32;
    }

    Snapshot {
        roots,
        array,
        num_entries: num_folders + num_files,
        num_folders,
        num_files,
        scanned_at: unix_now(),
    }
}

/// Builds the flat array by trusting each entry's already-correct `pos`
/// (loaded straight from persistence, §4.7 "Incremental update") — no sort,
/// no write-back.
pub fn build_incremental_snapshot(roots: Vec<RootTree>) -> Snapshot {
    let total: usize = roots.iter().map(|t| n_nodes(&t.pool, t.root) as usize).sum();
    let mut array = IndexArray::build(total);
    let mut num_folders = 0u32;
    let mut num_files = 0u32;

    for (root_index, root) in roots.iter().enumerate() {
        traverse(&root.pool, root.root, &mut |node| {
            let entry = root.pool.get(node);
            if entry.is_dir {
                num_folders += 1;
            } else {
                num_files += 1;
            }
            array.insert_at(entry.pos as usize, EntryRef::new(root_index as u32, node));
        });
    }

    Snapshot {
        roots,
        array,
        num_entries: num_folders + num_files,
        num_folders,
        num_files,
        scanned_at: unix_now(),
    }
}

/// Convenience used directly by tests that only need a sorted snapshot of
/// an already-built set of roots.
pub fn build_snapshot(roots: Vec<RootTree>) -> Snapshot {
    build_initial_snapshot(roots)
}

struct Inner {
    includes: Mutex<Vec<IncludePath>>,
    excludes: Vec<ExcludePath>,
    exclude_file_patterns: Vec<String>,
    exclude_hidden: bool,
    current: Mutex<Arc<Snapshot>>,
}

/// The owned, refcounted, lockable bundle of roots + index array (§3, §4.7).
///
/// `Database` is itself a cheap `Arc` handle: cloning it is `ref()`,
/// dropping the last clone is `unref()`. The inner `Mutex<Arc<Snapshot>>` is
/// only touched by [`Database::snapshot`] (a quick clone-and-release) and by
/// [`Database::scan`]/[`Database::load`] when swapping in a freshly built
/// snapshot.
#[derive(Clone)]
pub struct Database(Arc<Inner>);

impl Database {
    pub fn new(
        includes: Vec<IncludePath>,
        excludes: Vec<ExcludePath>,
        exclude_file_patterns: Vec<String>,
        exclude_hidden: bool,
    ) -> Self {
        Self(Arc::new(Inner {
            includes: Mutex::new(includes),
            excludes,
            exclude_file_patterns,
            exclude_hidden,
            current: Mutex::new(Arc::new(Snapshot::empty())),
        }))
    }

    /// The number of live handles to this database (includes this one).
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Clones out the current snapshot pointer under a brief lock; the
    /// returned `Arc` can be read for as long as the caller likes without
    /// holding the database's mutex (§5).
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.0.current.lock().clone()
    }

    fn scan_policy(&self) -> ScanPolicy {
        let exclude_dirs: Vec<PathBuf> = self
            .0
            .excludes
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.path.clone())
            .collect();
        let (patterns, errors) = compile_exclude_patterns(&self.0.exclude_file_patterns);
        for err in errors {
            log::warn!("exclude file pattern rejected: {err}");
        }
        ScanPolicy {
            exclude_hidden: self.0.exclude_hidden,
            exclude_dirs,
            exclude_file_patterns: patterns,
            follow_symlinks: false,
        }
    }

    /// For every enabled include: re-walk if `update` is set, otherwise try
    /// `load`, falling back to a walk if the persisted tree is missing or
    /// corrupt. Rebuilds the flat array from scratch if anything was
    /// scanned; otherwise merges the loaded roots incrementally (§4.7). A
    /// freshly scanned root is only saved *after* that rebuild has written
    /// its sorted `pos` values back — saving straight out of the scanner
    /// would persist every entry's default `pos = 0` and collapse the array
    /// to length 1 on the next incremental load (§4.3, §4.7, §8).
    ///
    /// Returns `Ok(false)` if `cancel` fired before every include finished;
    /// the snapshot is left untouched in that case, matching the scanner's
    /// own all-or-nothing cancellation semantics.
    pub fn scan(&self, cancel: &CancellationToken, mut progress: impl FnMut(&str)) -> Result<bool> {
        let policy = self.scan_policy();
        let mut roots = Vec::new();
        let mut scanned_indices = Vec::new();
        let mut any_scanned = false;

        let mut includes = self.0.includes.lock();
        for include in includes.iter_mut() {
            if !include.enabled {
                continue;
            }
            if include.update {
                let Some(tree) = scan_root(&include.path, &policy, cancel, &mut progress)? else {
                    return Ok(false);
                };
                include.last_scanned_at = Some(unix_now());
                any_scanned = true;
                scanned_indices.push(roots.len());
                roots.push(tree);
            } else {
                match load_root(&include.path) {
                    Ok(tree) => roots.push(tree),
                    Err(err) => {
                        log::warn!(
                            "failed to load persisted index for {}: {err}; falling back to scan",
                            include.path.display()
                        );
                        let Some(tree) = scan_root(&include.path, &policy, cancel, &mut progress)? else {
                            return Ok(false);
                        };
                        include.last_scanned_at = Some(unix_now());
                        any_scanned = true;
                        scanned_indices.push(roots.len());
                        roots.push(tree);
                    }
                }
            }
        }
        drop(includes);

        let snapshot = if any_scanned {
            build_initial_snapshot(roots)
        } else {
            build_incremental_snapshot(roots)
        };
        for root_index in scanned_indices {
            save_root(&snapshot.roots[root_index])?;
        }
        *self.0.current.lock() = Arc::new(snapshot);
        Ok(true)
    }

    /// Loads every enabled include from persistence; never scans. A missing
    /// or corrupt persisted tree for one root fails the whole load (callers
    /// that want scan fallback should call [`Database::scan`] instead).
    pub fn load(&self, mut progress: impl FnMut(&str)) -> Result<()> {
        let includes = self.0.includes.lock();
        let mut roots = Vec::with_capacity(includes.len());
        for include in includes.iter() {
            if !include.enabled {
                continue;
            }
            progress(&include.path.to_string_lossy());
            roots.push(load_root(&include.path)?);
        }
        drop(includes);
        *self.0.current.lock() = Arc::new(build_incremental_snapshot(roots));
        Ok(())
    }

    /// Writes every per-root tree in the current snapshot to its hashed
    /// path (§4.5, §6.1).
    pub fn save(&self) -> Result<()> {
        let snapshot = self.snapshot();
        for root in &snapshot.roots {
            save_root(root)?;
        }
        Ok(())
    }
}

fn display_name_for_path(path: &Path) -> String {
    if path == Path::new("/") {
        String::new()
    } else {
        path.to_string_lossy().into_owned()
    }
}

fn save_root(tree: &RootTree) -> Result<()> {
    let display_name = String::from_utf8_lossy(&tree.pool.get(tree.root).name).into_owned();
    let path = database_path_for_root(&display_name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    write_tree(tree, &mut writer)
}

fn load_root(include_path: &Path) -> Result<RootTree> {
    let display_name = display_name_for_path(include_path);
    let path = database_path_for_root(&display_name);
    let file = File::open(&path)?;
    let mut reader = std::io::BufReader::new(file);
    read_tree(&mut reader, DEFAULT_BLOCK_SIZE)
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn isolate_xdg_data_home(dir: &Path) {
        // Safety: test-only; no other thread reads/writes this env var concurrently.
        unsafe { std::env::set_var("XDG_DATA_HOME", dir) };
    }

    #[test]
    fn scan_builds_sorted_snapshot() {
        let data_home = tempdir().unwrap();
        isolate_xdg_data_home(data_home.path());

        let root = tempdir().unwrap();
        fs::write(root.path().join("a.txt"), b"1").unwrap();
        fs::create_dir(root.path().join("b")).unwrap();
        fs::write(root.path().join("b/c.txt"), b"22").unwrap();

        let db = Database::new(vec![IncludePath::new(root.path().to_path_buf())], vec![], vec![], false);
        let cancel = CancellationToken::noop();
        db.scan(&cancel, |_| {}).unwrap();

        let snapshot = db.snapshot();
        assert_eq!(snapshot.num_entries, 3);
        assert_eq!(snapshot.array.len(), 3);
        for (i, entry_ref) in snapshot.array.as_slice().iter().enumerate() {
            assert_eq!(snapshot.entry(*entry_ref).pos as usize, i);
        }
    }

    #[test]
    fn ref_count_tracks_clones() {
        let db = Database::new(vec![], vec![], vec![], false);
        assert_eq!(db.ref_count(), 1);
        let second = db.clone();
        assert_eq!(db.ref_count(), 2);
        drop(second);
        assert_eq!(db.ref_count(), 1);
    }

    #[test]
    fn save_then_load_round_trips() {
        let data_home = tempdir().unwrap();
        isolate_xdg_data_home(data_home.path());

        let root = tempdir().unwrap();
        fs::write(root.path().join("a.txt"), b"1").unwrap();
        fs::create_dir(root.path().join("b")).unwrap();
        fs::write(root.path().join("b/c.txt"), b"22").unwrap();

        let include = IncludePath::new(root.path().to_path_buf());
        let db = Database::new(vec![include.clone()], vec![], vec![], false);
        let cancel = CancellationToken::noop();
        db.scan(&cancel, |_| {}).unwrap();
        let scanned_count = db.snapshot().num_entries;

        let mut loaded_include = include;
        loaded_include.update = false;
        let db2 = Database::new(vec![loaded_include], vec![], vec![], false);
        db2.load(|_| {}).unwrap();
        let loaded = db2.snapshot();

        // Regression guard: the persisted `pos` values must already be the
        // *sorted* positions written back by the scan's snapshot build, not
        // the scanner's default `pos = 0` — otherwise the incremental build
        // collapses every entry onto array index 0 (§4.3, §4.7, §8).
        assert_eq!(loaded.num_entries, scanned_count);
        assert_eq!(loaded.array.len(), scanned_count as usize);
        for (i, entry_ref) in loaded.array.as_slice().iter().enumerate() {
            assert_eq!(loaded.entry(*entry_ref).pos as usize, i);
        }
    }
}

//! Directory walk that populates a [`RootTree`] from the filesystem.
//!
//! Single-threaded, one root per call. All allocation goes through the
//! root's own [`EntryPool`]; the tree is discarded en bloc on cancellation,
//! so nothing here needs to unwind partial state by hand.

use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::node_id::NodeId;
use crate::tree::{prepend_child, RootTree};

/// Longest single path component this crate will index. The original keeps
/// a fixed `PATH_MAX`-sized stack buffer; entries whose *name* alone would
/// overflow a sane buffer are rejected rather than silently truncated.
const MAX_NAME_LEN: usize = 4096;

/// How often [`scan`] emits a progress callback.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Directory/file inclusion-exclusion policy (§4.4). A value, not a callback
/// set: every field is plain data the scanner consults per-candidate.
#[derive(Debug, Clone, Default)]
pub struct ScanPolicy {
    pub exclude_hidden: bool,
    /// Enabled exclude-directory paths, matched as a full-path equality
    /// against the candidate directory (not a prefix of descendants — a
    /// directory match prevents recursion, which excludes descendants as a
    /// side effect of never visiting them).
    pub exclude_dirs: Vec<PathBuf>,
    /// Compiled basename glob patterns; any match drops the candidate.
    pub exclude_file_patterns: Vec<glob::Pattern>,
    /// Whether to descend into symlinked directories. Off by default.
    pub follow_symlinks: bool,
}

/// Builds `exclude_file_patterns` from raw glob text, reporting individual
/// compile failures (§7 `BadPattern`) without aborting the whole policy —
/// the scan proceeds with whichever patterns did compile.
pub fn compile_exclude_patterns(raw: &[String]) -> (Vec<glob::Pattern>, Vec<String>) {
    let mut compiled = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();
    for pattern in raw {
        match glob::Pattern::new(pattern) {
            Ok(p) => compiled.push(p),
            Err(err) => errors.push(format!("{pattern}: {err}")),
        }
    }
    (compiled, errors)
}

/// Walks `root_path` and returns a freshly populated tree, `Ok(None)` if
/// cancelled before completion (the caller discards whatever was built), or
/// `Err` on I/O failure opening the root itself or a name too long to index.
/// Per-entry I/O errors below the root are swallowed (§4.4, §7).
pub fn scan(
    root_path: &Path,
    policy: &ScanPolicy,
    cancel: &CancellationToken,
    mut progress: impl FnMut(&str),
) -> Result<Option<RootTree>> {
    let display_name = display_name_for_root(root_path);
    fs::read_dir(root_path)?; // fail fast if the root itself is unreadable

    let root_metadata = fs::symlink_metadata(root_path)?;
    let mut tree = RootTree::new_root(
        crate::pool::DEFAULT_BLOCK_SIZE,
        display_name.as_bytes(),
        mtime_secs(&root_metadata),
        0,
    );

    let mut last_progress = Instant::now();
    let completed = walk_dir(
        &mut tree,
        tree.root,
        root_path,
        policy,
        cancel,
        &mut progress,
        &mut last_progress,
    )?;
    Ok(completed.then_some(tree))
}

fn display_name_for_root(root_path: &Path) -> String {
    if root_path == Path::new("/") {
        String::new()
    } else {
        root_path.to_string_lossy().into_owned()
    }
}

fn mtime_secs(metadata: &fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Returns `Ok(true)` if the subtree rooted at `parent` was fully walked,
/// `Ok(false)` if cancellation was observed and the walk stopped early.
#[allow(clippy::too_many_arguments)]
fn walk_dir(
    tree: &mut RootTree,
    parent: NodeId,
    dir_path: &Path,
    policy: &ScanPolicy,
    cancel: &CancellationToken,
    progress: &mut impl FnMut(&str),
    last_progress: &mut Instant,
) -> Result<bool> {
    if cancel.is_cancelled().is_none() {
        return Ok(false);
    }
    if last_progress.elapsed() >= PROGRESS_INTERVAL {
        progress(&dir_path.to_string_lossy());
        *last_progress = Instant::now();
    }

    let read_dir = match fs::read_dir(dir_path) {
        Ok(rd) => rd,
        Err(err) => {
            log::trace!("skipping unreadable directory {}: {err}", dir_path.display());
            return Ok(true);
        }
    };

    for dirent in read_dir {
        let dirent = match dirent {
            Ok(d) => d,
            Err(err) => {
                log::trace!("skipping unreadable entry in {}: {err}", dir_path.display());
                continue;
            }
        };
        let name = dirent.file_name();
        if name == "." || name == ".." {
            continue;
        }
        if name.len() > MAX_NAME_LEN {
            return Err(Error::NameTooLong(name.to_string_lossy().into_owned()));
        }
        if policy.exclude_hidden && name.as_bytes().first() == Some(&b'.') {
            continue;
        }
        if policy
            .exclude_file_patterns
            .iter()
            .any(|p| p.matches(&name.to_string_lossy()))
        {
            continue;
        }

        let candidate_path = dir_path.join(&name);
        let metadata = match fs::symlink_metadata(&candidate_path) {
            Ok(m) => m,
            Err(err) => {
                log::trace!("skipping {}: {err}", candidate_path.display());
                continue;
            }
        };

        let is_symlink = metadata.file_type().is_symlink();
        let resolved_metadata = if is_symlink && policy.follow_symlinks {
            match fs::metadata(&candidate_path) {
                Ok(m) => Some(m),
                Err(_) => None,
            }
        } else if is_symlink {
            None
        } else {
            Some(metadata.clone())
        };

        let Some(resolved_metadata) = resolved_metadata else {
            continue;
        };
        let is_dir = resolved_metadata.is_dir();

        if is_dir && policy.exclude_dirs.iter().any(|p| p == &candidate_path) {
            continue;
        }

        let node = tree.pool.alloc();
        {
            let entry = tree.pool.get_mut(node);
            entry.name = name.as_bytes().to_vec();
            entry.mtime = mtime_secs(&resolved_metadata);
            entry.size = if is_dir { 0 } else { resolved_metadata.len() as i64 };
            entry.is_dir = is_dir;
            entry.pos = 0;
        }
        prepend_child(&mut tree.pool, parent, node);

        if is_dir {
            let completed = walk_dir(
                tree,
                node,
                &candidate_path,
                policy,
                cancel,
                progress,
                last_progress,
            )?;
            if !completed {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::children_for_each;
    use tempfile::tempdir;

    fn child_names(tree: &RootTree, node: NodeId) -> Vec<String> {
        let mut names = Vec::new();
        children_for_each(&tree.pool, node, |c| {
            names.push(String::from_utf8_lossy(&tree.pool.get(c).name).into_owned());
        });
        names.sort();
        names
    }

    #[test]
    fn scans_small_tree() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"1").unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/c.txt"), b"22").unwrap();

        let policy = ScanPolicy::default();
        let cancel = CancellationToken::noop();
        let tree = scan(dir.path(), &policy, &cancel, |_| {}).unwrap().unwrap();

        assert_eq!(child_names(&tree, tree.root), vec!["a.txt", "b"]);
        let mut found_c = false;
        crate::tree::traverse(&tree.pool, tree.root, &mut |n| {
            let e = tree.pool.get(n);
            if e.name == b"c.txt" {
                found_c = true;
                assert_eq!(e.size, 2);
            }
        });
        assert!(found_c);
    }

    #[test]
    fn exclude_hidden_drops_dotfiles() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"1").unwrap();
        fs::write(dir.path().join(".hidden"), b"1").unwrap();

        let mut policy = ScanPolicy::default();
        policy.exclude_hidden = true;
        let cancel = CancellationToken::noop();
        let tree = scan(dir.path(), &policy, &cancel, |_| {}).unwrap().unwrap();
        assert_eq!(child_names(&tree, tree.root), vec!["a.txt"]);

        policy.exclude_hidden = false;
        let tree = scan(dir.path(), &policy, &cancel, |_| {}).unwrap().unwrap();
        assert_eq!(child_names(&tree, tree.root), vec![".hidden", "a.txt"]);
    }

    #[test]
    fn cancellation_aborts_before_completion() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        let (cancel, handle) = CancellationToken::new();
        handle.cancel();
        let result = scan(dir.path(), &ScanPolicy::default(), &cancel, |_| {});
        assert!(matches!(result, Ok(None)));
    }
}

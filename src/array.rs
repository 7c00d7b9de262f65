//! The flat, sorted projection of every entry across all indexed roots.
//!
//! The tree (§4.2) is good for building and walking one root; it is useless
//! for "scan everything in parallel". The index array exists solely for the
//! query engine: one contiguous, sorted `Vec` that workers can slice into
//! disjoint ranges with no synchronization.

use std::cmp::Ordering;

use crate::node_id::NodeId;
use crate::pool::EntryPool;
use crate::tree::RootTree;

/// A reference to an [`Entry`](crate::pool::Entry) living in one of a
/// database's per-root pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef {
    pub root: u32,
    pub node: NodeId,
}

impl EntryRef {
    pub fn new(root: u32, node: NodeId) -> Self {
        Self { root, node }
    }
}

/// Flat, ordered sequence of [`EntryRef`]s.
///
/// Callers look up the pool for `entry.root` themselves (the array has no
/// opinion on how pools are stored); this keeps the array generic over the
/// database's root list without borrowing it.
#[derive(Debug, Default, Clone)]
pub struct IndexArray {
    entries: Vec<EntryRef>,
}

impl IndexArray {
    /// Allocates an array with room for `capacity` entries; starts empty.
    pub fn build(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Places `entry` at index `i`, growing the backing vector if needed.
    /// Caller guarantees non-overlapping writes across the whole build.
    pub fn insert_at(&mut self, i: usize, entry: EntryRef) {
        if i >= self.entries.len() {
            self.entries
                .resize(i + 1, EntryRef::new(0, NodeId::new(0)));
        }
        self.entries[i] = entry;
    }

    pub fn append(&mut self, entry: EntryRef) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, i: usize) -> EntryRef {
        self.entries[i]
    }

    pub fn as_slice(&self) -> &[EntryRef] {
        &self.entries
    }

    /// Stable sort by `compare`.
    pub fn sort(&mut self, mut compare: impl FnMut(EntryRef, EntryRef) -> Ordering) {
        self.entries.sort_by(|a, b| compare(*a, *b));
    }

    /// Stable sort taking an opaque context, needed by the database when the
    /// comparator must look entries up in per-root pools it owns.
    pub fn sort_with<C>(&mut self, ctx: &C, mut compare: impl FnMut(&C, EntryRef, EntryRef) -> Ordering) {
        self.entries.sort_by(|a, b| compare(ctx, *a, *b));
    }

    /// Binary search by `key`; `compare` orders a candidate entry against
    /// `key`. Requires the array to already be sorted by that same order.
    pub fn binary_search<K, C>(
        &self,
        key: &K,
        mut compare: impl FnMut(&C, EntryRef, &K) -> Ordering,
        ctx: &C,
    ) -> Option<usize> {
        self.entries
            .binary_search_by(|candidate| compare(ctx, *candidate, key))
            .ok()
    }

    /// Writes `i` back into each entry's `pos` field. This is the only link
    /// from a sorted array position back to the entry; the query engine's
    /// result-assembly step depends on it being current after every sort.
    pub fn write_back_positions(&self, pools: &mut [EntryPool]) {
        for (i, entry_ref) in self.entries.iter().enumerate() {
            pools[entry_ref.root as usize].get_mut(entry_ref.node).pos = i as u32;
        }
    }
}

/// `folders_first(a, b)` then `natural_order(a.name, b.name)` (§4.7).
pub fn compare_entries(roots: &[RootTree], a: EntryRef, b: EntryRef) -> Ordering {
    let entry_a = roots[a.root as usize].pool.get(a.node);
    let entry_b = roots[b.root as usize].pool.get(b.node);
    match (entry_a.is_dir, entry_b.is_dir) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => natural_cmp(&entry_a.name, &entry_b.name),
    }
}

/// Case-preserving, numeric-aware comparison: `"file2" < "file10"`.
///
/// Walks both strings in lockstep; whenever both cursors sit on an ASCII
/// digit, switches into a numeric submode that compares the full digit runs
/// by value (leading zeros do not change magnitude, so "007" == "7" but the
/// shorter run still sorts first on a tie, matching `strverscmp`). Outside
/// digit runs, bytes are folded to lowercase to pick an order, but two names
/// that fold equal are never reported `Equal` unless they are byte-identical
/// — the exact bytes (case included) break the tie so the comparison stays
/// case-preserving, not case-insensitive: `"Alpha"` sorts immediately next to
/// `"alpha"`, never collapsed into it.
pub fn natural_cmp(a: &[u8], b: &[u8]) -> Ordering {
    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        let (ca, cb) = (a[i], b[j]);
        if ca.is_ascii_digit() && cb.is_ascii_digit() {
            let (next_i, va) = read_digit_run(a, i);
            let (next_j, vb) = read_digit_run(b, j);
            match va.cmp(&vb) {
                Ordering::Equal => {
                    // Equal value: shorter run (fewer leading zeros) first.
                    match (next_i - i).cmp(&(next_j - j)) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                }
                other => return other,
            }
            i = next_i;
            j = next_j;
            continue;
        }
        let fold_a = ca.to_ascii_lowercase();
        let fold_b = cb.to_ascii_lowercase();
        if fold_a != fold_b {
            return fold_a.cmp(&fold_b);
        }
        i += 1;
        j += 1;
    }
    match (a.len() - i).cmp(&(b.len() - j)) {
        Ordering::Equal => a.cmp(b),
        other => other,
    }
}

fn read_digit_run(s: &[u8], start: usize) -> (usize, u128) {
    let mut end = start;
    let mut value: u128 = 0;
    while end < s.len() && s[end].is_ascii_digit() {
        value = value.saturating_mul(10).saturating_add((s[end] - b'0') as u128);
        end += 1;
    }
    (end, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_cmp_orders_digit_runs_by_value() {
        assert_eq!(natural_cmp(b"file2", b"file10"), Ordering::Less);
        assert_eq!(natural_cmp(b"file10", b"file2"), Ordering::Greater);
        assert_eq!(natural_cmp(b"file2", b"file2"), Ordering::Equal);
    }

    #[test]
    fn natural_cmp_is_case_preserving_not_case_insensitive() {
        // Case folding picks the bucket, but same-length names that only
        // differ by case are never collapsed to `Equal` — the exact bytes
        // break the tie, so "Alpha" sorts strictly before "alpha".
        assert_eq!(natural_cmp(b"Alpha", b"alpha"), Ordering::Less);
        assert_eq!(natural_cmp(b"alpha", b"Alpha"), Ordering::Greater);
        assert_eq!(natural_cmp(b"Alpha", b"Alpha"), Ordering::Equal);
        assert_eq!(natural_cmp(b"Alpha", b"beta"), Ordering::Less);
    }

    #[test]
    fn natural_cmp_equal_value_shorter_run_first() {
        assert_eq!(natural_cmp(b"file07", b"file7"), Ordering::Greater);
    }

    #[test]
    fn index_array_sorts_folders_first_then_natural_order() {
        let mut tree = RootTree::new_root(16, b"", 0, 0);
        let mut array = IndexArray::build(4);
        let names: Vec<(&str, bool)> =
            vec![("b.txt", false), ("a.txt", false), ("dir2", true), ("dir10", true)];
        for (name, is_dir) in names {
            let id = tree.pool.alloc();
            let e = tree.pool.get_mut(id);
            e.name = name.as_bytes().to_vec();
            e.is_dir = is_dir;
            crate::tree::prepend_child(&mut tree.pool, tree.root, id);
            array.append(EntryRef::new(0, id));
        }
        array.sort(|a, b| compare_entries(std::slice::from_ref(&tree), a, b));
        let ordered: Vec<Vec<u8>> = array
            .as_slice()
            .iter()
            .map(|r| tree.pool.get(r.node).name.clone())
            .collect();
        assert_eq!(
            ordered,
            vec![
                b"dir2".to_vec(),
                b"dir10".to_vec(),
                b"a.txt".to_vec(),
                b"b.txt".to_vec(),
            ]
        );
    }
}

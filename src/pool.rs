//! Bump-allocated storage for filesystem entries.
//!
//! Millions of small, short-lived nodes are allocated per scan and then
//! released all at once. A generic allocator with per-node free (like the
//! teacher's mmap-backed `Slab`) buys nothing here and costs a freelist;
//! what the scanner actually needs is append-only growth and instant
//! bulk release, so this is a block allocator with a bump pointer, not a
//! freelist-backed slab.

use crate::node_id::{NodeId, OptionNodeId};

/// A single filesystem entry: either a file or a directory.
///
/// `name` is an opaque filesystem byte string, not guaranteed to be valid
/// UTF-8 on POSIX; only display-time conversion is lossy (spec's design
/// notes, "mixed C-string/UTF-8 handling").
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: Vec<u8>,
    pub mtime: i64,
    pub size: i64,
    pub is_dir: bool,
    /// Index into the sorted index array; meaningful only after the array
    /// has been built and sorted (§4.3).
    pub pos: u32,
    pub parent: OptionNodeId,
    pub first_child: OptionNodeId,
    pub next_sibling: OptionNodeId,
}

impl Entry {
    fn zeroed() -> Self {
        Self {
            name: Vec::new(),
            mtime: 0,
            size: 0,
            is_dir: false,
            pos: 0,
            parent: OptionNodeId::none(),
            first_child: OptionNodeId::none(),
            next_sibling: OptionNodeId::none(),
        }
    }
}

/// Default block size: 10,000 entries per block, matching the original
/// implementation's `BTREE_NODE_POOL_BLOCK_ELEMENTS`.
pub const DEFAULT_BLOCK_SIZE: usize = 10_000;

/// Append-only arena of [`Entry`] values, allocated in fixed-size blocks.
///
/// `alloc()` hands out a `NodeId`, never a reference, so nothing is
/// invalidated when a new block is pushed — there is no pointer to
/// invalidate in the first place. The block structure still matters: it
/// bounds the cost of growth to "push one more block" rather than
/// reallocating and copying everything scanned so far.
pub struct EntryPool {
    blocks: Vec<Vec<Entry>>,
    block_size: usize,
}

impl EntryPool {
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be positive");
        Self {
            blocks: Vec::new(),
            block_size,
        }
    }

    /// Allocates a zero-initialised entry and returns its handle. Never
    /// returns an error in practice (the OS allocator aborts on real
    /// exhaustion); the capacity check exists so bulk-reader code that
    /// pre-declares a node count can fail gracefully instead of panicking
    /// on a corrupt, wildly-oversized count.
    pub fn alloc(&mut self) -> NodeId {
        if self.blocks.is_empty() || self.blocks.last().unwrap().len() == self.block_size {
            self.blocks.push(Vec::with_capacity(self.block_size));
        }
        let block_index = self.blocks.len() - 1;
        let block = self.blocks.last_mut().unwrap();
        let slot_in_block = block.len();
        block.push(Entry::zeroed());
        NodeId::new(block_index * self.block_size + slot_in_block)
    }

    pub fn get(&self, id: NodeId) -> &Entry {
        let (block, slot) = self.locate(id);
        &self.blocks[block][slot]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Entry {
        let (block, slot) = self.locate(id);
        &mut self.blocks[block][slot]
    }

    pub fn len(&self) -> usize {
        self.blocks.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every block at once. Any `NodeId` obtained before this call
    /// becomes meaningless; the caller is expected to have discarded all of
    /// them (e.g. along with the tree root they pointed into).
    pub fn free_all(&mut self) {
        self.blocks.clear();
    }

    fn locate(&self, id: NodeId) -> (usize, usize) {
        let index = id.get();
        (index / self.block_size, index % self.block_size)
    }
}

impl Default for EntryPool {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

//! Compact node handles into the entry pool.
//!
//! A tree built from raw linked pointers (parent/child/sibling cycles) is
//! replaced here with a plain arena: `NodeId` is an index into an
//! [`crate::pool::EntryPool`], and parent/first_child/next_sibling links are
//! `OptionNodeId` rather than raw pointers. This sidesteps the aliasing
//! concerns of the intrusive pointer tree entirely (see spec's design notes)
//! while keeping the same O(1) prepend / cheap traversal shape.

/// A compact 32-bit handle into an entry pool.
///
/// u32::MAX is reserved as the "no node" sentinel used by `OptionNodeId`,
/// which limits a single pool to a bit under 4 billion entries — far beyond
/// any real filesystem's entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const INVALID: Self = Self(u32::MAX);

    #[inline]
    pub fn new(index: usize) -> Self {
        assert!(index < u32::MAX as usize, "node id must be less than u32::MAX");
        Self(index as u32)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

/// A space-efficient `Option<NodeId>`: 4 bytes instead of 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct OptionNodeId(u32);

impl OptionNodeId {
    #[inline]
    pub const fn none() -> Self {
        Self(u32::MAX)
    }

    #[inline]
    pub fn some(id: NodeId) -> Self {
        Self(id.0)
    }

    #[inline]
    pub fn from_option(id: Option<NodeId>) -> Self {
        id.map_or(Self::none(), Self::some)
    }

    #[inline]
    pub fn to_option(self) -> Option<NodeId> {
        if self.0 == u32::MAX {
            None
        } else {
            Some(NodeId(self.0))
        }
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for OptionNodeId {
    fn default() -> Self {
        Self::none()
    }
}

impl From<Option<NodeId>> for OptionNodeId {
    fn from(id: Option<NodeId>) -> Self {
        Self::from_option(id)
    }
}

impl From<OptionNodeId> for Option<NodeId> {
    fn from(id: OptionNodeId) -> Self {
        id.to_option()
    }
}

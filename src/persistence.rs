//! Binary save/load of a single [`RootTree`] (§4.5).
//!
//! Format: 4-byte magic `"FSDB"`, `major`/`minor` version bytes, a `u32`
//! total node count, then a pre-order node stream terminated by
//! zero-length-name delimiters that tell the reader when to pop back up a
//! level. Every field is little-endian.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};
use crate::node_id::NodeId;
use crate::tree::{children_for_each, n_nodes, RootTree};

const MAGIC: &[u8; 4] = b"FSDB";
const MAJOR_VERSION: u8 = 0;
const MINOR_VERSION: u8 = 1;

/// Serialises `tree` to `writer` in the format described in §4.5.
pub fn write_tree(tree: &RootTree, writer: &mut impl Write) -> Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&[MAJOR_VERSION, MINOR_VERSION])?;
    let total = n_nodes(&tree.pool, tree.root);
    writer.write_all(&total.to_le_bytes())?;
    write_node(tree, tree.root, writer, true)?;
    Ok(())
}

fn write_node(tree: &RootTree, node: NodeId, writer: &mut impl Write, is_root: bool) -> Result<()> {
    let entry = tree.pool.get(node);
    let name: &[u8] = if is_root && entry.name.is_empty() {
        b"/"
    } else {
        &entry.name
    };
    let name_len: u16 = name
        .len()
        .try_into()
        .map_err(|_| Error::NameTooLong(String::from_utf8_lossy(name).into_owned()))?;
    writer.write_all(&name_len.to_le_bytes())?;
    writer.write_all(name)?;
    writer.write_all(&[entry.is_dir as u8])?;
    writer.write_all(&(entry.size as u64).to_le_bytes())?;
    writer.write_all(&(entry.mtime as u64).to_le_bytes())?;
    writer.write_all(&entry.pos.to_le_bytes())?;

    let mut children = Vec::new();
    children_for_each(&tree.pool, node, |c| children.push(c));
    for child in children {
        write_node(tree, child, writer, false)?;
    }
    // End-of-children delimiter: pops the reader back up one level.
    writer.write_all(&0u16.to_le_bytes())?;
    Ok(())
}

/// Reads a tree previously written by [`write_tree`]. Any short read or
/// unsupported version fails with [`Error::Corrupt`] /
/// [`Error::VersionMismatch`]; the partially built pool is simply dropped by
/// the caller.
pub fn read_tree(reader: &mut impl Read, block_size: usize) -> Result<RootTree> {
    let mut magic = [0u8; 4];
    read_exact_corrupt(reader, &mut magic)?;
    if &magic != MAGIC {
        return Err(Error::Corrupt("bad magic".into()));
    }

    let mut version = [0u8; 2];
    read_exact_corrupt(reader, &mut version)?;
    let (major, minor) = (version[0], version[1]);
    if major != MAJOR_VERSION || minor != MINOR_VERSION {
        return Err(Error::VersionMismatch { major, minor });
    }

    let mut count_buf = [0u8; 4];
    read_exact_corrupt(reader, &mut count_buf)?;
    let _total_node_count = u32::from_le_bytes(count_buf);

    let mut pool = crate::pool::EntryPool::new(block_size);
    let mut root: Option<NodeId> = None;
    let mut prev: Option<NodeId> = None;

    loop {
        let mut len_buf = [0u8; 2];
        read_exact_corrupt(reader, &mut len_buf)?;
        let name_len = u16::from_le_bytes(len_buf);

        if name_len == 0 {
            let Some(current) = prev else {
                return Err(Error::Corrupt("delimiter with no open node".into()));
            };
            prev = pool.get(current).parent.to_option();
            if prev.is_none() {
                break;
            }
            continue;
        }

        let mut name = vec![0u8; name_len as usize];
        read_exact_corrupt(reader, &mut name)?;
        if root.is_none() && name == b"/" {
            name.clear();
        }

        let mut is_dir_buf = [0u8; 1];
        read_exact_corrupt(reader, &mut is_dir_buf)?;
        let is_dir = is_dir_buf[0] != 0;

        let mut size_buf = [0u8; 8];
        read_exact_corrupt(reader, &mut size_buf)?;
        let size = u64::from_le_bytes(size_buf) as i64;

        let mut mtime_buf = [0u8; 8];
        read_exact_corrupt(reader, &mut mtime_buf)?;
        let mtime = u64::from_le_bytes(mtime_buf) as i64;

        let mut pos_buf = [0u8; 4];
        read_exact_corrupt(reader, &mut pos_buf)?;
        let pos = u32::from_le_bytes(pos_buf);

        let node = pool.alloc();
        {
            let e = pool.get_mut(node);
            e.name = name;
            e.is_dir = is_dir;
            e.size = size;
            e.mtime = mtime;
            e.pos = pos;
        }

        match prev {
            None => {
                root = Some(node);
            }
            Some(parent) => {
                crate::tree::prepend_child(&mut pool, parent, node);
            }
        }
        prev = Some(node);
    }

    let root = root.ok_or_else(|| Error::Corrupt("empty tree".into()))?;
    Ok(RootTree { pool, root })
}

fn read_exact_corrupt(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::Corrupt("truncated database file".into()),
        _ => Error::Io(err),
    })
}

//! XDG data directory resolution and per-root persistence paths (§6.1, §6.6).

use std::path::PathBuf;

use sha2::{Digest, Sha256};

/// `$XDG_DATA_HOME` or `$HOME/.local/share`, joined with `fsearch`.
pub fn data_dir() -> PathBuf {
    let base = std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from(".local/share"));
    base.join("fsearch")
}

/// `<data_dir>/database/<sha256(display_path)>/database.db` (§4.5, §6.1).
/// The hashing input is the root's display path — `"/"` for the filesystem
/// root, otherwise the absolute path text.
pub fn database_path_for_root(display_path: &str) -> PathBuf {
    let hash_input = if display_path.is_empty() {
        "/"
    } else {
        display_path
    };
    let mut hasher = Sha256::new();
    hasher.update(hash_input.as_bytes());
    let digest = hasher.finalize();
    let hex = hex_encode(&digest);
    data_dir().join("database").join(hex).join("database.db")
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(s, "{byte:02x}").expect("writing to a String cannot fail");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_hashes_to_same_location() {
        let a = database_path_for_root("/home/user");
        let b = database_path_for_root("/home/user");
        assert_eq!(a, b);
    }

    #[test]
    fn different_paths_hash_differently() {
        let a = database_path_for_root("/home/user");
        let b = database_path_for_root("/home/other");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_root_hashes_as_slash() {
        let a = database_path_for_root("");
        let b = database_path_for_root("/");
        assert_eq!(a, b);
    }
}

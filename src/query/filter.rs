//! Compiled filter (§3 "Filter", §4.6 "Filter pass").

use crate::error::Result;
use crate::types::{FilterKind, QueryFilterSpec, QueryFlags};

use super::token::{compile_tokens, Token};

/// A filter ready to evaluate against candidate entries.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    pub kind: FilterKind,
    pub tokens: Vec<Token>,
    pub search_in_path: bool,
}

impl CompiledFilter {
    pub fn compile(spec: &QueryFilterSpec, flags: &QueryFlags) -> Result<Self> {
        let tokens = if spec.query.is_empty() {
            Vec::new()
        } else {
            compile_tokens(&spec.query, flags)?
        };
        Ok(Self {
            kind: spec.kind,
            tokens,
            search_in_path: spec.search_in_path,
        })
    }

    /// Filter pass (§4.6 step 1): kind check, then every filter token must
    /// match (AND) against the filter's chosen haystack.
    pub fn passes(&self, is_dir: bool, basename: &[u8], full_path: &[u8]) -> bool {
        match self.kind {
            FilterKind::FilesOnly if is_dir => return false,
            FilterKind::FoldersOnly if !is_dir => return false,
            _ => {}
        }
        let haystack = if self.search_in_path { full_path } else { basename };
        self.tokens.iter().all(|t| t.matches(haystack))
    }
}

//! Per-token compilation (§4.6): classify each token's text into a matcher,
//! honoring `enable_regex` (whole-query override), wildcard detection, and
//! auto-case-sensitivity.

use crate::error::{Error, Result};
use crate::types::QueryFlags;

use super::tokenize::tokenize;

/// Characters that make a query text into a single whole-query regex token
/// when `enable_regex` is set.
const REGEX_METACHARS: &[char] = &['$', '{', '(', ')', '*', '+', '.', '?', '[', '\\', '^', '|', '}'];

#[derive(Clone)]
pub enum Matcher {
    PlainCaseSensitive,
    PlainCaseInsensitive,
    PlainCaseInsensitiveUnicode,
    Wildcard(regex::bytes::Regex),
    WildcardCaseInsensitive(regex::bytes::Regex),
    Regex(regex::bytes::Regex),
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Matcher::PlainCaseSensitive => write!(f, "PlainCaseSensitive"),
            Matcher::PlainCaseInsensitive => write!(f, "PlainCaseInsensitive"),
            Matcher::PlainCaseInsensitiveUnicode => write!(f, "PlainCaseInsensitiveUnicode"),
            Matcher::Wildcard(_) => write!(f, "Wildcard"),
            Matcher::WildcardCaseInsensitive(_) => write!(f, "WildcardCaseInsensitive"),
            Matcher::Regex(_) => write!(f, "Regex"),
        }
    }
}

/// A compiled query sub-pattern (§3 "Token").
#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
    pub has_path_separator: bool,
    pub matcher: Matcher,
}

impl Token {
    pub fn matches(&self, haystack: &[u8]) -> bool {
        match &self.matcher {
            Matcher::PlainCaseSensitive => contains_bytes(haystack, self.text.as_bytes()),
            Matcher::PlainCaseInsensitive => {
                contains_ascii_case_insensitive(haystack, self.text.as_bytes())
            }
            Matcher::PlainCaseInsensitiveUnicode => {
                let haystack_str = String::from_utf8_lossy(haystack).to_lowercase();
                haystack_str.contains(&self.text.to_lowercase())
            }
            Matcher::Wildcard(re) | Matcher::WildcardCaseInsensitive(re) | Matcher::Regex(re) => {
                re.is_match(haystack)
            }
        }
    }
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    memchr::memmem::find(haystack, needle).is_some()
}

fn contains_ascii_case_insensitive(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle))
}

/// Compiles `query_text` into the tokens that must all match (AND) for an
/// entry to pass the token phase (§4.6). Returns one regex token if
/// `flags.enable_regex` and the text contains a regex metacharacter;
/// otherwise tokenizes on whitespace/quotes and classifies each token.
pub fn compile_tokens(query_text: &str, flags: &QueryFlags) -> Result<Vec<Token>> {
    if flags.enable_regex && query_text.chars().any(|c| REGEX_METACHARS.contains(&c)) {
        let case_insensitive = !effective_case_sensitive(query_text, flags);
        let pattern = if case_insensitive {
            format!("(?i){query_text}")
        } else {
            query_text.to_string()
        };
        let re = regex::bytes::Regex::new(&pattern)
            .map_err(|err| Error::BadPattern(err.to_string()))?;
        return Ok(vec![Token {
            text: query_text.to_string(),
            has_path_separator: query_text.contains('/'),
            matcher: Matcher::Regex(re),
        }]);
    }

    tokenize(query_text)
        .into_iter()
        .map(|text| compile_token(&text, flags))
        .collect()
}

fn effective_case_sensitive(text: &str, flags: &QueryFlags) -> bool {
    if flags.auto_match_case && text.chars().any(|c| c.is_uppercase()) {
        true
    } else {
        flags.match_case
    }
}

fn compile_token(text: &str, flags: &QueryFlags) -> Result<Token> {
    let has_path_separator = text.contains('/');
    let case_sensitive = effective_case_sensitive(text, flags);
    let is_wildcard = text.contains('*') || text.contains('?');

    let matcher = if is_wildcard {
        let pattern = wildcard_to_regex(text, case_sensitive);
        let re = regex::bytes::Regex::new(&pattern).map_err(|err| Error::BadPattern(err.to_string()))?;
        if case_sensitive {
            Matcher::Wildcard(re)
        } else {
            Matcher::WildcardCaseInsensitive(re)
        }
    } else if case_sensitive {
        Matcher::PlainCaseSensitive
    } else if text.is_ascii() {
        Matcher::PlainCaseInsensitive
    } else {
        Matcher::PlainCaseInsensitiveUnicode
    };

    Ok(Token {
        text: text.to_string(),
        has_path_separator,
        matcher,
    })
}

/// Translates a shell-style wildcard (`*`, `?`, everything else literal)
/// into an anchored regex pattern.
fn wildcard_to_regex(pattern: &str, case_sensitive: bool) -> String {
    let mut out = String::new();
    if !case_sensitive {
        out.push_str("(?i)");
    }
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

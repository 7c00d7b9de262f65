//! Whitespace/quote tokenizer (§4.6). Deliberately lexer-free: no grammar,
//! no operators, just "split on whitespace, quotes group, backslash escapes".

/// Splits `text` into token strings. A run of whitespace separates tokens; a
/// double quote opens/closes a verbatim span where only `\` is special
/// (escapes the next byte); a bare `\` outside quotes escapes the next byte
/// too. An empty or all-whitespace `text` yields an empty list.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                '"' => in_quotes = false,
                _ => current.push(c),
            }
            in_token = true;
            continue;
        }
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_token = true;
            }
            '"' => {
                in_quotes = true;
                in_token = true;
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            _ => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

//! Statement splitting for multi-statement scripts
//!
//! A notebook cell may hold several statements; each one is executed and
//! reported on its own. [`split_statements`] walks the script one
//! character at a time and only treats `;` as a boundary when it sits in
//! plain SQL text, not inside a string, quoted identifier, dollar-quoted
//! body or block comment.
//!
//! The scanner never fails. Unterminated constructs swallow the rest of the
//! input, which then becomes part of the last statement.


/// Where the scanner currently is
#[derive(Debug, Clone, PartialEq, Eq)]
enum LexState {
    Normal,
    /// Inside `'...'`
    SingleQuote,
    /// Inside `"..."`
    QuotedIdentifier,
    /// Inside a dollar-quoted body; holds the full opening tag, e.g. `$fn$`
    DollarQuote(String),
    /// Inside `/* ... */`
    BlockComment,
}

/// Accumulates the text of one statement
#[derive(Default)]
struct StatementBuffer {
    text: String,
    /// Set once anything other than whitespace, comments or the terminator
    /// has been seen
    has_code: bool,
}

impl StatementBuffer {
    fn push(&mut self, c: char) {
        self.text.push(c);
    }

    fn push_code(&mut self, c: char) {
        if !c.is_whitespace() {
            self.has_code = true;
        }
        self.text.push(c);
    }

    fn push_str(&mut self, s: &str) {
        self.has_code = true;
        self.text.push_str(s);
    }

    /// Emit the statement if it holds any code and start a new one
    fn finish(&mut self, out: &mut Vec<String>) {
        if self.has_code {
            out.push(self.text.trim().to_string());
        }
        self.text.clear();
        self.has_code = false;
    }
}

/// Split a SQL script into individually executable statements
///
/// Each statement keeps its terminating `;` (the last one may have none)
/// and any comments that precede it, and is trimmed of surrounding
/// whitespace. Statements made of nothing but whitespace and comments are
/// dropped.
///
/// ```
/// use sqlnb_query::split_statements;
///
/// let statements = split_statements("SELECT ';'; SELECT 2");
/// assert_eq!(statements, vec!["SELECT ';';", "SELECT 2"]);
/// ```
pub fn split_statements(script: &str) -> Vec<String> {
    let chars: Vec<char> = script.chars().collect();
    let len = chars.len();

    let mut statements = Vec::new();
    let mut current = StatementBuffer::default();
    let mut state = LexState::Normal;
    let mut i = 0;

    while i < len {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match &state {
            LexState::Normal => match c {
                '-' if next == Some('-') => {
                    // Line comment: copy through the newline, if any
                    while i < len {
                        current.push(chars[i]);
                        i += 1;
                        if chars[i - 1] == '\n' {
                            break;
                        }
                    }
                    continue;
                }
                '/' if next == Some('*') => {
                    current.push(c);
                    current.push('*');
                    state = LexState::BlockComment;
                    i += 2;
                    continue;
                }
                '\'' => {
                    current.push_code(c);
                    state = LexState::SingleQuote;
                }
                '"' => {
                    current.push_code(c);
                    state = LexState::QuotedIdentifier;
                }
                '$' => {
                    // `$` continues an identifier such as `a$b`
                    let in_identifier = i > 0 && is_identifier_char(chars[i - 1]);
                    if let Some(tag) = dollar_tag_at(&chars, i).filter(|_| !in_identifier) {
                        i += tag.chars().count();
                        current.push_str(&tag);
                        state = LexState::DollarQuote(tag);
                        continue;
                    }
                    current.push_code(c);
                }
                ';' => {
                    current.push(c);
                    current.finish(&mut statements);
                }
                _ => current.push_code(c),
            },

            LexState::SingleQuote | LexState::QuotedIdentifier => {
                let quote = if state == LexState::SingleQuote {
                    '\''
                } else {
                    '"'
                };
                current.push(c);
                if c == quote {
                    // A doubled quote is an escaped quote, not a close
                    if next == Some(quote) {
                        current.push(quote);
                        i += 2;
                        continue;
                    }
                    state = LexState::Normal;
                }
            }

            LexState::DollarQuote(tag) => {
                if c == '$' && starts_with_at(&chars, i, tag) {
                    let tag_len = tag.chars().count();
                    current.text.push_str(tag);
                    state = LexState::Normal;
                    i += tag_len;
                    continue;
                }
                current.push(c);
            }

            LexState::BlockComment => {
                if c == '*' && next == Some('/') {
                    current.push(c);
                    current.push('/');
                    state = LexState::Normal;
                    i += 2;
                    continue;
                }
                current.push(c);
            }
        }

        i += 1;
    }

    if state != LexState::Normal {
        tracing::debug!(?state, "script ended inside an unterminated construct");
    }
    current.finish(&mut statements);
    statements
}

/// The dollar-quote tag starting at `start`, if there is one
///
/// A tag is `$`, zero or more word characters, then `$`. Anything else
/// (a `$1` parameter, a lone `$`) is not a tag.
fn dollar_tag_at(chars: &[char], start: usize) -> Option<String> {
    let mut end = start + 1;
    while end < chars.len() && is_word_char(chars[end]) {
        end += 1;
    }
    if chars.get(end) == Some(&'$') {
        Some(chars[start..=end].iter().collect())
    } else {
        None
    }
}

fn starts_with_at(chars: &[char], start: usize, pattern: &str) -> bool {
    let mut pos = start;
    for expected in pattern.chars() {
        if chars.get(pos) != Some(&expected) {
            return false;
        }
        pos += 1;
    }
    true
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

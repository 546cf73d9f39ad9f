//! Statement splitting for migration scripts.
//!
//! The database only accepts one statement per request, so scripts are cut
//! on top-level `;` terminators. A `;` inside a string literal, a quoted
//! identifier, or a comment is part of the surrounding text and never ends a
//! statement.

/// Lexical state of the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backtick,
    LineComment,
    BlockComment,
}

impl LexState {
    /// Closing character for the quoted states
    fn closing_quote(self) -> Option<char> {
        match self {
            LexState::SingleQuoted => Some('\''),
            LexState::DoubleQuoted => Some('"'),
            LexState::Backtick => Some('`'),
            _ => None,
        }
    }
}

/// How a scanned character relates to the statement structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    /// Plain SQL outside quotes and comments
    Code,
    /// Inside (or delimiting) a string literal or quoted identifier
    Quoted,
    /// Inside (or delimiting) a comment
    Comment,
    /// Top-level `;`
    Terminator,
}

/// Walk `sql` once, classifying every character.
///
/// Unterminated quotes and comments swallow the rest of the input.
fn scan<F>(sql: &str, mut emit: F)
where
    F: FnMut(char, CharClass),
{
    let mut state = LexState::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            LexState::Normal => match c {
                ';' => emit(c, CharClass::Terminator),
                '\'' => {
                    state = LexState::SingleQuoted;
                    emit(c, CharClass::Quoted);
                }
                '"' => {
                    state = LexState::DoubleQuoted;
                    emit(c, CharClass::Quoted);
                }
                '`' => {
                    state = LexState::Backtick;
                    emit(c, CharClass::Quoted);
                }
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    state = LexState::LineComment;
                    emit('-', CharClass::Comment);
                    emit('-', CharClass::Comment);
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = LexState::BlockComment;
                    emit('/', CharClass::Comment);
                    emit('*', CharClass::Comment);
                }
                _ => emit(c, CharClass::Code),
            },
            LexState::SingleQuoted | LexState::DoubleQuoted | LexState::Backtick => {
                emit(c, CharClass::Quoted);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        emit(escaped, CharClass::Quoted);
                    }
                } else if Some(c) == state.closing_quote() {
                    state = LexState::Normal;
                }
            }
            LexState::LineComment => {
                if c == '\n' {
                    state = LexState::Normal;
                    emit(c, CharClass::Code);
                } else {
                    emit(c, CharClass::Comment);
                }
            }
            LexState::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = LexState::Normal;
                    emit('*', CharClass::Comment);
                    emit('/', CharClass::Comment);
                } else {
                    emit(c, CharClass::Comment);
                }
            }
        }
    }
}

/// Accumulates characters of the statement currently being scanned
#[derive(Default)]
struct StatementBuffer {
    statements: Vec<String>,
    current: String,
    has_content: bool,
}

impl StatementBuffer {
    fn push(&mut self, c: char, class: CharClass) {
        match class {
            CharClass::Terminator => self.flush(),
            CharClass::Comment => self.current.push(c),
            CharClass::Code | CharClass::Quoted => {
                if !c.is_whitespace() {
                    self.has_content = true;
                }
                self.current.push(c);
            }
        }
    }

    /// Close the current fragment; comment- or whitespace-only fragments
    /// carry nothing to execute and are dropped.
    fn flush(&mut self) {
        if self.has_content {
            self.statements.push(self.current.trim().to_string());
        }
        self.current.clear();
        self.has_content = false;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.statements
    }
}

/// Split a SQL script into trimmed statements on top-level `;`.
///
/// The terminator itself is not included. Comments that share a fragment
/// with real SQL are kept verbatim.
///
/// # Examples
/// ```
/// use chm_core::splitter::split_statements;
/// let stmts = split_statements("INSERT INTO t VALUES ('a;b'); SELECT 1;");
/// assert_eq!(stmts, vec!["INSERT INTO t VALUES ('a;b')", "SELECT 1"]);
/// ```
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut buffer = StatementBuffer::default();
    scan(sql, |c, class| buffer.push(c, class));
    buffer.finish()
}

/// Remove comments and blank out quoted text.
///
/// Each removed comment collapses to a single space so neighbouring tokens
/// do not fuse. A quoted run keeps its delimiters but loses its contents,
/// unless `keep` accepts the masked text that precedes it; kept runs are
/// copied verbatim.
///
/// # Examples
/// ```
/// use chm_core::splitter::mask_literals;
/// let masked = mask_literals("SELECT 'a;b' -- note", |_| false);
/// assert_eq!(masked, "SELECT '' ");
/// ```
pub fn mask_literals<F>(sql: &str, mut keep: F) -> String
where
    F: FnMut(&str) -> bool,
{
    let mut out = String::with_capacity(sql.len());
    let mut in_comment = false;
    // Opening delimiter of the quoted run being blanked
    let mut blanking: Option<char> = None;
    let mut in_quote = false;

    scan(sql, |c, class| {
        if class != CharClass::Quoted && in_quote {
            if let Some(delimiter) = blanking.take() {
                out.push(delimiter);
            }
            in_quote = false;
        }
        match class {
            CharClass::Comment => {
                if !in_comment {
                    out.push(' ');
                    in_comment = true;
                }
                return;
            }
            CharClass::Quoted if !in_quote => {
                in_quote = true;
                if !keep(&out) {
                    blanking = Some(c);
                }
                out.push(c);
            }
            CharClass::Quoted => {
                if blanking.is_none() {
                    out.push(c);
                }
            }
            CharClass::Code | CharClass::Terminator => out.push(c),
        }
        in_comment = false;
    });
    if let Some(delimiter) = blanking {
        out.push(delimiter);
    }
    out
}

#[cfg(test)]
#[path = "splitter_test.rs"]
mod tests;

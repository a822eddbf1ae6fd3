//! Regex-driven tokenizer for PHP sources.
//!
//! Only what declaration parsing needs is distinguished; comments and
//! whitespace are dropped.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identifier or namespace-qualified name (`Foo`, `\App\Foo`, `App\Models\`)
    Name(String),
    /// Variable without the `$` sigil
    Variable(String),
    /// String literal, quotes removed and escapes processed
    Str(String),
    Number(String),
    /// `#[`
    AttributeOpen,
    /// `...`
    Ellipsis,
    /// `::`
    DoubleColon,
    /// `=>`
    Arrow,
    Punct(char),
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        matches!(self, Token::Punct(p) if *p == c)
    }

    /// Case-insensitive keyword check.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Name(n) if n.eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(n) => f.write_str(n),
            Token::Variable(v) => write!(f, "${v}"),
            Token::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Token::Number(n) => f.write_str(n),
            Token::AttributeOpen => f.write_str("#["),
            Token::Ellipsis => f.write_str("..."),
            Token::DoubleColon => f.write_str("::"),
            Token::Arrow => f.write_str("=>"),
            Token::Punct(c) => write!(f, "{c}"),
        }
    }
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"(?s)",
            r"(?P<ws>\s+)",
            r"|(?P<tag><\?php|<\?=|\?>)",
            r"|(?P<attr>#\[)",
            r"|(?P<comment>//[^\n]*|#[^\n]*|/\*.*?\*/)",
            r"|(?P<sq>'(?:[^'\\]|\\.)*')",
            r#"|(?P<dq>"(?:[^"\\]|\\.)*")"#,
            r"|(?P<var>\$[A-Za-z_][A-Za-z0-9_]*)",
            r"|(?P<name>\\?[A-Za-z_][A-Za-z0-9_]*(?:\\[A-Za-z_][A-Za-z0-9_]*)*\\?)",
            r"|(?P<number>0[xX][0-9a-fA-F_]+|0[bB][01_]+|[0-9][0-9_]*(?:\.[0-9][0-9_]*)?(?:[eE][+-]?[0-9]+)?|\.[0-9]+)",
            r"|(?P<ellipsis>\.\.\.)",
            r"|(?P<dcolon>::)",
            r"|(?P<arrow>=>)",
            r"|(?P<punct>.)",
        ))
        .expect("token pattern is a valid regex")
    })
}

/// Split PHP source into tokens.
///
/// Unterminated strings or comments degrade to punctuation tokens instead of
/// failing; declaration parsing tolerates the noise.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for caps in token_pattern().captures_iter(source) {
        if caps.name("ws").is_some() || caps.name("tag").is_some() || caps.name("comment").is_some() {
            continue;
        }
        let token = if caps.name("attr").is_some() {
            Token::AttributeOpen
        } else if let Some(m) = caps.name("sq") {
            Token::Str(unescape_single(strip_quotes(m.as_str())))
        } else if let Some(m) = caps.name("dq") {
            Token::Str(unescape_double(strip_quotes(m.as_str())))
        } else if let Some(m) = caps.name("var") {
            Token::Variable(m.as_str()[1..].to_string())
        } else if let Some(m) = caps.name("name") {
            Token::Name(m.as_str().to_string())
        } else if let Some(m) = caps.name("number") {
            Token::Number(m.as_str().to_string())
        } else if caps.name("ellipsis").is_some() {
            Token::Ellipsis
        } else if caps.name("dcolon").is_some() {
            Token::DoubleColon
        } else if caps.name("arrow").is_some() {
            Token::Arrow
        } else if let Some(c) = caps.name("punct").and_then(|m| m.as_str().chars().next()) {
            Token::Punct(c)
        } else {
            continue;
        };
        tokens.push(token);
    }
    tokens
}

fn strip_quotes(s: &str) -> &str {
    &s[1..s.len() - 1]
}

fn unescape_single(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('\'') | Some('\\') => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}

fn unescape_double(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('$') => out.push('$'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

//! Tokenizer (§4.5): a single regex alternation scanned left to right,
//! grounded on the teacher's pattern of compiling its matchers once via
//! `once_cell::sync::Lazy` rather than re-building them per call.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Ident(String),
    String(String),
    Number(String),
    Comma,
    LParen,
    RParen,
    Star,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Semicolon,
    Dot,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier {s:?}"),
            Token::String(s) => format!("string {s:?}"),
            Token::Number(s) => format!("number {s}"),
            Token::Comma => ",".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Star => "*".into(),
            Token::Eq => "=".into(),
            Token::NotEq => "<>".into(),
            Token::Lt => "<".into(),
            Token::LtEq => "<=".into(),
            Token::Gt => ">".into(),
            Token::GtEq => ">=".into(),
            Token::Semicolon => ";".into(),
            Token::Dot => ".".into(),
        }
    }
}

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?P<ws>\s+)"#,
        r#"|(?P<string>'(?:\\.|[^'\\])*')"#,
        r#"|(?P<number>-?\d+(?:\.\d+)?)"#,
        r#"|(?P<ident>[A-Za-z_][A-Za-z0-9_]*)"#,
        r#"|(?P<ne><>|!=)"#,
        r#"|(?P<lte><=)"#,
        r#"|(?P<gte>>=)"#,
        r#"|(?P<lt><)"#,
        r#"|(?P<gt>>)"#,
        r#"|(?P<eq>=)"#,
        r#"|(?P<comma>,)"#,
        r#"|(?P<lparen>\()"#,
        r#"|(?P<rparen>\))"#,
        r#"|(?P<star>\*)"#,
        r#"|(?P<semi>;)"#,
        r#"|(?P<dot>\.)"#,
    ))
    .expect("token pattern is a fixed, tested regex")
});

/// Splits a single statement into tokens. Unrecognized characters are
/// silently dropped from between matches (the parser reports the real
/// error once it hits an unexpected token further down the line).
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for caps in TOKEN_PATTERN.captures_iter(input) {
        if caps.name("ws").is_some() {
            continue;
        }
        if let Some(m) = caps.name("string") {
            let raw = m.as_str();
            let inner = &raw[1..raw.len() - 1];
            tokens.push(Token::String(unescape_string(inner)));
        } else if let Some(m) = caps.name("number") {
            tokens.push(Token::Number(m.as_str().to_string()));
        } else if let Some(m) = caps.name("ident") {
            tokens.push(Token::Ident(m.as_str().to_string()));
        } else if caps.name("ne").is_some() {
            tokens.push(Token::NotEq);
        } else if caps.name("lte").is_some() {
            tokens.push(Token::LtEq);
        } else if caps.name("gte").is_some() {
            tokens.push(Token::GtEq);
        } else if caps.name("lt").is_some() {
            tokens.push(Token::Lt);
        } else if caps.name("gt").is_some() {
            tokens.push(Token::Gt);
        } else if caps.name("eq").is_some() {
            tokens.push(Token::Eq);
        } else if caps.name("comma").is_some() {
            tokens.push(Token::Comma);
        } else if caps.name("lparen").is_some() {
            tokens.push(Token::LParen);
        } else if caps.name("rparen").is_some() {
            tokens.push(Token::RParen);
        } else if caps.name("star").is_some() {
            tokens.push(Token::Star);
        } else if caps.name("semi").is_some() {
            tokens.push(Token::Semicolon);
        } else if caps.name("dot").is_some() {
            tokens.push(Token::Dot);
        }
    }
    tokens
}

/// Resolves backslash escapes inside a quoted string literal's contents
/// (`\'` -> `'`, `\\` -> `\`; any other escaped character passes through
/// unescaped, per §4.5).
fn unescape_string(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

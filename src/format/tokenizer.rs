//! Lexer for format expressions
//!
//! Only `/ + , ( )` and bracketed filters are structural. Everything else,
//! including dashes, dots and whitespace-separated pieces, is glued into one
//! name token because format ids are free-form strings
//! (`mp4-baseline-16x9` is a single selector).

use crate::utils::error::{GrabError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A bare selector: `best`, `mp4`, `hls-720p`, ...
    Name(String),
    /// Contents of a `[...]` filter, brackets stripped
    Filter(String),
    /// One of `/ + , ( )`
    Op(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Character offset of the first character of the token
    pub start: usize,
}

const UNBALANCED: &str = "Missing closing/opening brackets or parenthesis";

pub(crate) fn syntax_error(spec: &str, note: impl Into<String>, position: usize) -> GrabError {
    GrabError::FormatSyntax {
        note: note.into(),
        spec: spec.to_string(),
        position,
    }
}

/// Split a format expression into tokens, checking bracket and parenthesis balance
pub fn tokenize(spec: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = spec.chars().collect();
    let mut tokens = Vec::new();
    let mut name = String::new();
    let mut name_start = 0;
    let mut depth = 0usize;
    let mut pos = 0;

    fn flush(tokens: &mut Vec<Token>, name: &mut String, start: usize) {
        if !name.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Name(std::mem::take(name)),
                start,
            });
        }
    }

    while pos < chars.len() {
        let c = chars[pos];
        match c {
            '[' => {
                flush(&mut tokens, &mut name, name_start);
                let close = chars[pos + 1..]
                    .iter()
                    .position(|&ch| ch == ']' || ch == '[')
                    .map(|offset| pos + 1 + offset);
                match close {
                    Some(end) if chars[end] == ']' => {
                        let body: String = chars[pos + 1..end].iter().collect();
                        tokens.push(Token {
                            kind: TokenKind::Filter(body.trim().to_string()),
                            start: pos,
                        });
                        pos = end + 1;
                        continue;
                    }
                    Some(nested) => return Err(syntax_error(spec, UNBALANCED, nested)),
                    None => return Err(syntax_error(spec, UNBALANCED, chars.len())),
                }
            }
            ']' => return Err(syntax_error(spec, UNBALANCED, pos)),
            '(' | ')' | '/' | '+' | ',' => {
                flush(&mut tokens, &mut name, name_start);
                if c == '(' {
                    depth += 1;
                } else if c == ')' {
                    if depth == 0 {
                        return Err(syntax_error(spec, UNBALANCED, pos));
                    }
                    depth -= 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Op(c),
                    start: pos,
                });
            }
            c if c.is_whitespace() => {}
            _ => {
                if name.is_empty() {
                    name_start = pos;
                }
                name.push(c);
            }
        }
        pos += 1;
    }
    flush(&mut tokens, &mut name, name_start);

    if depth != 0 {
        return Err(syntax_error(spec, UNBALANCED, chars.len()));
    }
    Ok(tokens)
}

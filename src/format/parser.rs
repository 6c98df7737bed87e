//! Recursive-descent parser turning a token stream into a selector tree
//!
//! Precedence from loosest to tightest: `,` then `/` then `+`. Parentheses
//! group, and any operand may carry trailing `[...]` filters.

use super::filter::FormatFilter;
use super::tokenizer::{syntax_error, tokenize, Token, TokenKind};
use crate::utils::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorKind {
    /// `best`, `bestaudio`, an extension or a literal format id
    Single(String),
    /// `left/right`: right is only consulted when left yields nothing
    PickFirst(Box<Selector>, Box<Selector>),
    /// `video+audio`
    Merge(Box<Selector>, Box<Selector>),
    /// `( ... )`, holding a comma list of its own
    Group(Vec<Selector>),
}

/// One node of a compiled format expression
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub kind: SelectorKind,
    pub filters: Vec<FormatFilter>,
}

impl Selector {
    fn new(kind: SelectorKind) -> Self {
        Self {
            kind,
            filters: Vec::new(),
        }
    }
}

struct Parser<'a> {
    spec: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_op(&self) -> Option<char> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Op(c),
                ..
            }) => Some(*c),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn end_position(&self) -> usize {
        self.spec.chars().count()
    }

    fn here(&self) -> usize {
        self.peek()
            .map(|t| t.start)
            .unwrap_or_else(|| self.end_position())
    }

    /// Whether the upcoming token can begin an operand
    fn at_operand(&self) -> bool {
        matches!(
            self.peek().map(|t| &t.kind),
            Some(TokenKind::Name(_)) | Some(TokenKind::Filter(_)) | Some(TokenKind::Op('('))
        )
    }

    fn parse_list(&mut self, in_group: bool) -> Result<Vec<Selector>> {
        let mut items = Vec::new();
        loop {
            let closing = self.peek().is_none() || (in_group && self.peek_op() == Some(')'));
            if closing {
                if items.is_empty() {
                    let note = if in_group {
                        "Empty group"
                    } else {
                        "Empty format specification"
                    };
                    return Err(syntax_error(self.spec, note, self.here()));
                }
                return Ok(items);
            }

            items.push(self.parse_choice()?);

            match self.peek().map(|t| (t.kind.clone(), t.start)) {
                None => return Ok(items),
                Some((TokenKind::Op(')'), _)) if in_group => return Ok(items),
                Some((TokenKind::Op(','), start)) => {
                    self.pos += 1;
                    let dangling =
                        self.peek().is_none() || (in_group && self.peek_op() == Some(')'));
                    if dangling {
                        return Err(syntax_error(
                            self.spec,
                            "\",\" must be followed by a format selector",
                            start,
                        ));
                    }
                }
                Some((TokenKind::Op(c), start)) => {
                    return Err(syntax_error(
                        self.spec,
                        format!("Unexpected \"{}\"", c),
                        start,
                    ))
                }
                Some((_, start)) => {
                    return Err(syntax_error(
                        self.spec,
                        "Unexpected format selector",
                        start,
                    ))
                }
            }
        }
    }

    fn parse_choice(&mut self) -> Result<Selector> {
        let mut left = self.parse_merge()?;
        while self.peek_op() == Some('/') {
            let slash = self.here();
            self.pos += 1;
            if !self.at_operand() {
                return Err(syntax_error(
                    self.spec,
                    "\"/\" must be followed by a format selector",
                    slash,
                ));
            }
            let right = self.parse_merge()?;
            left = Selector::new(SelectorKind::PickFirst(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_merge(&mut self) -> Result<Selector> {
        let video = self.parse_operand()?;
        if self.peek_op() != Some('+') {
            return Ok(video);
        }
        let plus = self.here();
        self.pos += 1;
        if !self.at_operand() {
            return Err(syntax_error(
                self.spec,
                "\"+\" must be between two format selectors",
                plus,
            ));
        }
        let audio = self.parse_operand()?;
        if self.peek_op() == Some('+') {
            return Err(syntax_error(self.spec, "Unexpected \"+\"", self.here()));
        }
        Ok(Selector::new(SelectorKind::Merge(
            Box::new(video),
            Box::new(audio),
        )))
    }

    fn parse_operand(&mut self) -> Result<Selector> {
        let start = self.here();
        let mut selector = match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Name(name)) => {
                self.pos += 1;
                Selector::new(SelectorKind::Single(name))
            }
            // A bare filter applies to the default selection
            Some(TokenKind::Filter(_)) => Selector::new(SelectorKind::Single("best".to_string())),
            Some(TokenKind::Op('(')) => {
                self.pos += 1;
                let inner = self.parse_list(true)?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::Op(')'),
                        ..
                    }) => Selector::new(SelectorKind::Group(inner)),
                    _ => {
                        return Err(syntax_error(
                            self.spec,
                            "Missing closing/opening brackets or parenthesis",
                            start,
                        ))
                    }
                }
            }
            Some(TokenKind::Op('+')) => {
                return Err(syntax_error(
                    self.spec,
                    "\"+\" must be between two format selectors",
                    start,
                ))
            }
            Some(TokenKind::Op(c)) => {
                return Err(syntax_error(
                    self.spec,
                    format!("\"{}\" must follow a format selector", c),
                    start,
                ))
            }
            None => {
                return Err(syntax_error(
                    self.spec,
                    "Expected a format selector",
                    start,
                ))
            }
        };

        while let Some(Token {
            kind: TokenKind::Filter(body),
            start,
        }) = self.peek().cloned()
        {
            self.pos += 1;
            let filter =
                FormatFilter::parse(&body).map_err(|note| syntax_error(self.spec, note, start))?;
            selector.filters.push(filter);
        }
        Ok(selector)
    }
}

/// Parse a whole expression into its top-level comma list
pub fn parse(spec: &str) -> Result<Vec<Selector>> {
    let tokens = tokenize(spec)?;
    let mut parser = Parser {
        spec,
        tokens,
        pos: 0,
    };
    parser.parse_list(false)
}

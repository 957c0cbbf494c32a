//! Parser for the Structured Text dialect.
//!
//! The parser is a hand-written recursive-descent parser over the non-trivia
//! token stream. It stops at the first error: device programs are compiled
//! as a whole and a partially understood program is never executed.

pub mod ast;
mod declarations;
mod expressions;
mod statements;

use smol_str::SmolStr;
use thiserror::Error;

use crate::lexer::{lex, Token, TokenKind};
use crate::line_index::LineIndex;

pub use ast::Program;

/// A syntax error with the 1-based line it was detected on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number.
    pub line: u32,
    /// Description of the problem.
    pub message: SmolStr,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(line: u32, message: impl Into<SmolStr>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Result type of the parser.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parses a complete program.
pub fn parse(source: &str) -> ParseResult<Program> {
    let mut parser = Parser::new(source);
    parser.parse_program()
}

/// The parser state.
pub(crate) struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    lines: LineIndex,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        let tokens = lex(source)
            .into_iter()
            .filter(|token| !token.kind.is_trivia())
            .collect();
        Self {
            source,
            tokens,
            pos: 0,
            lines: LineIndex::new(source),
        }
    }

    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut name = None;
        let wrapped = self.eat(TokenKind::KwProgram);
        if wrapped {
            name = Some(self.expect_ident("program name")?);
        }

        let mut var_blocks = Vec::new();
        while self.at(TokenKind::KwVar) || self.at(TokenKind::KwVarTemp) {
            var_blocks.push(self.parse_var_block()?);
        }

        let terminator = if wrapped {
            TokenKind::KwEndProgram
        } else {
            TokenKind::Eof
        };
        let body = self.parse_stmt_list(&[terminator])?;

        if wrapped {
            self.expect(TokenKind::KwEndProgram)?;
            self.eat(TokenKind::Semicolon);
        }
        if !self.at_end() {
            return Err(self.unexpected("end of program"));
        }

        Ok(Program {
            name,
            var_blocks,
            body,
        })
    }

    // ---------------------------------------------------------------------
    // Token helpers
    // ---------------------------------------------------------------------

    pub(crate) fn current(&self) -> TokenKind {
        self.nth(0)
    }

    pub(crate) fn nth(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map_or(TokenKind::Eof, |token| token.kind)
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.current() == kind
    }

    pub(crate) fn at_any(&self, kinds: &[TokenKind]) -> bool {
        kinds.contains(&self.current())
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Text of the current token (empty at end of input).
    pub(crate) fn text(&self) -> &'src str {
        self.tokens
            .get(self.pos)
            .map_or("", |token| token.text(self.source))
    }

    /// Line of the current token, or of the last token at end of input.
    pub(crate) fn line(&self) -> u32 {
        let token = self
            .tokens
            .get(self.pos)
            .or_else(|| self.tokens.last());
        token.map_or(1, |token| self.lines.line_of(token.range.start()))
    }

    pub(crate) fn bump(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    pub(crate) fn expect_ident(&mut self, what: &str) -> ParseResult<SmolStr> {
        if self.at(TokenKind::Ident) {
            let name = SmolStr::new(self.text());
            self.bump();
            Ok(name)
        } else {
            Err(self.unexpected(what))
        }
    }

    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        let found = if self.at_end() {
            TokenKind::Eof.describe().to_string()
        } else if self.at(TokenKind::Error) {
            format!("invalid token `{}`", self.text())
        } else {
            format!("`{}`", self.text())
        };
        ParseError::new(self.line(), format!("expected {expected}, found {found}"))
    }

    /// Source text between two token indices (inclusive start, exclusive end).
    pub(crate) fn slice_tokens(&self, start: usize, end: usize) -> &'src str {
        let (Some(first), Some(last)) = (self.tokens.get(start), self.tokens.get(end.wrapping_sub(1)))
        else {
            return "";
        };
        let from = usize::from(first.range.start());
        let to = usize::from(last.range.end());
        &self.source[from..to]
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_parses_to_empty_program() {
        let program = parse("").unwrap();
        assert!(program.body.is_empty());
        assert!(program.var_blocks.is_empty());
    }

    #[test]
    fn program_wrapper_is_optional() {
        let bare = parse("VAR x : INT; END_VAR\nx := 1;").unwrap();
        let wrapped = parse("PROGRAM Main\nVAR x : INT; END_VAR\nx := 1;\nEND_PROGRAM").unwrap();
        assert_eq!(bare.name, None);
        assert_eq!(wrapped.name.as_deref(), Some("Main"));
        assert_eq!(bare.body.len(), wrapped.body.len());
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let err = parse("PROGRAM Main\nEND_PROGRAM\nx := 1;").unwrap_err();
        assert_eq!(err.line, 3);
    }
}

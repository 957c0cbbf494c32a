//! Lexer for the Structured Text dialect.
//!
//! This module tokenizes program source into a stream of tokens with their
//! byte ranges in the source text. Trivia is kept so callers can reconstruct
//! the source; the parser skips it.

mod tokens;

pub use tokens::TokenKind;

use logos::Logos;
use text_size::{TextRange, TextSize};

/// A token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The byte range of the token in the source text.
    pub range: TextRange,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub fn new(kind: TokenKind, range: TextRange) -> Self {
        Self { kind, range }
    }

    /// Returns the token text within `source`.
    #[must_use]
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        &source[self.range]
    }
}

/// Lexer for Structured Text source code.
///
/// The lexer is an iterator over tokens. Unrecognized characters and
/// unterminated comments come back as `TokenKind::Error`.
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, TokenKind>,
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer for the given source text.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.inner.next()?;
        let span = self.inner.span();
        let kind = kind.unwrap_or(TokenKind::Error);
        let range = TextRange::new(
            TextSize::from(span.start as u32),
            TextSize::from(span.end as u32),
        );
        Some(Token::new(kind, range))
    }
}

/// Lex the entire source and return all tokens, trivia included.
#[must_use]
pub fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).collect()
}

/// Lex source and return tokens paired with their text.
#[must_use]
pub fn lex_with_text(source: &str) -> Vec<(Token, &str)> {
    Lexer::new(source)
        .map(|token| (token, token.text(source)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .into_iter()
            .filter(|t| !t.kind.is_trivia())
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_lexer_basic() {
        assert_eq!(
            kinds("x := 42;"),
            vec![
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::IntLiteral,
                TokenKind::Semicolon
            ]
        );
    }

    #[test]
    fn test_lexer_preserves_positions() {
        let tokens = lex("abc := 123");
        assert_eq!(tokens[0].range, TextRange::new(0.into(), 3.into()));
        assert_eq!(tokens[1].range, TextRange::new(3.into(), 4.into()));
        assert_eq!(tokens[2].range, TextRange::new(4.into(), 6.into()));
    }

    #[test]
    fn test_device_call_is_dotted_identifiers() {
        assert_eq!(
            kinds("Device.WriteCoil(3, TRUE);"),
            vec![
                TokenKind::Ident,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::IntLiteral,
                TokenKind::Comma,
                TokenKind::KwTrue,
                TokenKind::RParen,
                TokenKind::Semicolon
            ]
        );
    }

    #[test]
    fn test_keywords_ignore_case() {
        assert_eq!(
            kinds("if x <> 1 then end_if"),
            vec![
                TokenKind::KwIf,
                TokenKind::Ident,
                TokenKind::Neq,
                TokenKind::IntLiteral,
                TokenKind::KwThen,
                TokenKind::KwEndIf
            ]
        );
    }

    #[test]
    fn test_range_is_not_a_real() {
        assert_eq!(
            kinds("1..5"),
            vec![TokenKind::IntLiteral, TokenKind::DotDot, TokenKind::IntLiteral]
        );
    }

    #[test]
    fn test_unterminated_comment_is_error() {
        let tokens = lex("x := 1; (* never closed");
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Error));
    }
}

//! Token definitions for the Structured Text dialect.
//!
//! The dialect is the subset of IEC 61131-3 Structured Text that device logic
//! programs use: variable blocks, the usual control statements, arithmetic and
//! boolean operators, and calls (including `Device.*` I/O calls, which lex as
//! ordinary identifiers joined by dots).

use logos::Logos;

/// Consumes a `(* ... *)` comment after its opener. Comments nest; an
/// unterminated one swallows the rest of the input and lexes as an error.
fn lex_block_comment(lex: &mut logos::Lexer<TokenKind>) -> bool {
    let rest = lex.remainder().as_bytes();
    let mut depth = 1_u32;
    let mut pos = 0;
    while let Some(pair) = rest.get(pos..pos + 2) {
        match pair {
            b"(*" => {
                depth += 1;
                pos += 2;
            }
            b"*)" => {
                depth -= 1;
                pos += 2;
                if depth == 0 {
                    lex.bump(pos);
                    return true;
                }
            }
            _ => pos += 1,
        }
    }
    lex.bump(rest.len());
    false
}

/// All token kinds of the dialect.
///
/// Keywords are matched case-insensitively. Type names (`BOOL`, `INT`, ...)
/// are plain identifiers and are resolved by the compiler.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u16)]
pub enum TokenKind {
    // trivia
    /// Whitespace (spaces, tabs, newlines)
    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    /// Single-line comment: // ...
    #[regex(r"//[^\r\n]*", allow_greedy = true)]
    LineComment,

    /// Block comment: (* ... *), nesting allowed.
    #[token("(*", lex_block_comment)]
    BlockComment,

    // punctuation
    #[token(";")]
    Semicolon,

    #[token(":")]
    Colon,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token("..")]
    DotDot,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    // operators
    #[token(":=")]
    Assign,

    #[token("=")]
    Eq,

    #[token("<>")]
    Neq,

    #[token("<")]
    Lt,

    #[token("<=")]
    LtEq,

    #[token(">")]
    Gt,

    #[token(">=")]
    GtEq,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("**")]
    Power,

    /// `&` (alias of AND)
    #[token("&")]
    Ampersand,

    // keywords - program and declarations
    #[token("PROGRAM", ignore(case))]
    KwProgram,

    #[token("END_PROGRAM", ignore(case))]
    KwEndProgram,

    #[token("VAR", ignore(case))]
    KwVar,

    #[token("VAR_TEMP", ignore(case))]
    KwVarTemp,

    #[token("END_VAR", ignore(case))]
    KwEndVar,

    #[token("CONSTANT", ignore(case))]
    KwConstant,

    #[token("RETAIN", ignore(case))]
    KwRetain,

    // keywords - control flow
    #[token("IF", ignore(case))]
    KwIf,

    #[token("THEN", ignore(case))]
    KwThen,

    #[token("ELSIF", ignore(case))]
    KwElsif,

    #[token("ELSE", ignore(case))]
    KwElse,

    #[token("END_IF", ignore(case))]
    KwEndIf,

    #[token("CASE", ignore(case))]
    KwCase,

    #[token("OF", ignore(case))]
    KwOf,

    #[token("END_CASE", ignore(case))]
    KwEndCase,

    #[token("FOR", ignore(case))]
    KwFor,

    #[token("TO", ignore(case))]
    KwTo,

    #[token("BY", ignore(case))]
    KwBy,

    #[token("DO", ignore(case))]
    KwDo,

    #[token("END_FOR", ignore(case))]
    KwEndFor,

    #[token("WHILE", ignore(case))]
    KwWhile,

    #[token("END_WHILE", ignore(case))]
    KwEndWhile,

    #[token("REPEAT", ignore(case))]
    KwRepeat,

    #[token("UNTIL", ignore(case))]
    KwUntil,

    #[token("END_REPEAT", ignore(case))]
    KwEndRepeat,

    #[token("EXIT", ignore(case))]
    KwExit,

    #[token("RETURN", ignore(case))]
    KwReturn,

    // keywords - operators and literals
    #[token("AND", ignore(case))]
    KwAnd,

    #[token("OR", ignore(case))]
    KwOr,

    #[token("XOR", ignore(case))]
    KwXor,

    #[token("NOT", ignore(case))]
    KwNot,

    #[token("MOD", ignore(case))]
    KwMod,

    #[token("TRUE", ignore(case))]
    KwTrue,

    #[token("FALSE", ignore(case))]
    KwFalse,

    // literals
    /// Integer literal: 123, 16#FF, 2#1010, 8#77, with `_` separators.
    #[regex(r"[0-9]([0-9]|_[0-9])*")]
    #[regex(r"16#[0-9A-Fa-f]([0-9A-Fa-f]|_[0-9A-Fa-f])*")]
    #[regex(r"2#[01]([01]|_[01])*")]
    #[regex(r"8#[0-7]([0-7]|_[0-7])*")]
    IntLiteral,

    /// Real literal: 3.14, 1.0E10, 2.5e-3
    #[regex(r"[0-9]([0-9]|_[0-9])*\.[0-9]([0-9]|_[0-9])*([eE][+-]?[0-9]([0-9]|_[0-9])*)?")]
    RealLiteral,

    /// Time literal: T#1h30m, TIME#500ms, T#1.5s
    #[regex(
        r"(?:T|TIME)#[+-]?(?:[0-9]+(?:\.[0-9]+)?(?:ms|d|h|m|s))(?:_?(?:[0-9]+(?:\.[0-9]+)?(?:ms|d|h|m|s)))*",
        ignore(case)
    )]
    TimeLiteral,

    /// String literal: 'text' or "text", `$` escapes.
    #[regex(r"'([^$'\r\n]|\$\$|\$[LlNnRrTt]|\$')*'", priority = 2)]
    #[regex(r#""([^$"\r\n]|\$\$|\$[LlNnRrTt]|\$")*""#, priority = 2)]
    StringLiteral,

    // identifiers
    /// Identifier: starts with letter or underscore
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    // special tokens
    /// Lexer error - unrecognized character or malformed literal
    #[default]
    Error,

    /// End of input (never produced by the lexer itself)
    Eof,
}

impl TokenKind {
    /// Returns `true` if this token is trivia (whitespace or comment).
    #[inline]
    #[must_use]
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            Self::Whitespace | Self::LineComment | Self::BlockComment
        )
    }

    /// Returns `true` if this token is a keyword.
    #[must_use]
    pub fn is_keyword(self) -> bool {
        (self as u16) >= (Self::KwProgram as u16) && (self as u16) <= (Self::KwFalse as u16)
    }

    /// Returns `true` if this token is a literal.
    #[must_use]
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            Self::IntLiteral
                | Self::RealLiteral
                | Self::TimeLiteral
                | Self::StringLiteral
                | Self::KwTrue
                | Self::KwFalse
        )
    }

    /// Returns `true` if this token can start an expression.
    #[must_use]
    pub fn can_start_expr(self) -> bool {
        self.is_literal()
            || matches!(
                self,
                Self::Ident | Self::LParen | Self::Minus | Self::Plus | Self::KwNot
            )
    }

    /// Human-readable description used in parse errors.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::Whitespace => "whitespace",
            Self::LineComment | Self::BlockComment => "comment",
            Self::Semicolon => "';'",
            Self::Colon => "':'",
            Self::Comma => "','",
            Self::Dot => "'.'",
            Self::DotDot => "'..'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Assign => "':='",
            Self::Eq => "'='",
            Self::Neq => "'<>'",
            Self::Lt => "'<'",
            Self::LtEq => "'<='",
            Self::Gt => "'>'",
            Self::GtEq => "'>='",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Slash => "'/'",
            Self::Power => "'**'",
            Self::Ampersand => "'&'",
            Self::KwProgram => "PROGRAM",
            Self::KwEndProgram => "END_PROGRAM",
            Self::KwVar => "VAR",
            Self::KwVarTemp => "VAR_TEMP",
            Self::KwEndVar => "END_VAR",
            Self::KwConstant => "CONSTANT",
            Self::KwRetain => "RETAIN",
            Self::KwIf => "IF",
            Self::KwThen => "THEN",
            Self::KwElsif => "ELSIF",
            Self::KwElse => "ELSE",
            Self::KwEndIf => "END_IF",
            Self::KwCase => "CASE",
            Self::KwOf => "OF",
            Self::KwEndCase => "END_CASE",
            Self::KwFor => "FOR",
            Self::KwTo => "TO",
            Self::KwBy => "BY",
            Self::KwDo => "DO",
            Self::KwEndFor => "END_FOR",
            Self::KwWhile => "WHILE",
            Self::KwEndWhile => "END_WHILE",
            Self::KwRepeat => "REPEAT",
            Self::KwUntil => "UNTIL",
            Self::KwEndRepeat => "END_REPEAT",
            Self::KwExit => "EXIT",
            Self::KwReturn => "RETURN",
            Self::KwAnd => "AND",
            Self::KwOr => "OR",
            Self::KwXor => "XOR",
            Self::KwNot => "NOT",
            Self::KwMod => "MOD",
            Self::KwTrue => "TRUE",
            Self::KwFalse => "FALSE",
            Self::IntLiteral => "integer literal",
            Self::RealLiteral => "real literal",
            Self::TimeLiteral => "time literal",
            Self::StringLiteral => "string literal",
            Self::Ident => "identifier",
            Self::Error => "invalid token",
            Self::Eof => "end of input",
        }
    }
}

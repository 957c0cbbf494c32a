//! `subsim-syntax` - Lexer and parser for the Structured Text dialect used by
//! simulated IED logic programs.
//!
//! - **Lexer**: tokenizes source text (`logos`), keeping byte ranges
//! - **Parser**: recursive descent into a line-tagged AST
//!
//! # Example
//!
//! ```
//! use subsim_syntax::lexer::{lex, TokenKind};
//! use subsim_syntax::parser::parse;
//!
//! let tokens = lex("x := 42;");
//! assert_eq!(tokens[0].kind, TokenKind::Ident);
//!
//! let program = parse("VAR x : INT; END_VAR\nx := 42;").unwrap();
//! assert_eq!(program.body[0].line(), 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod lexer;
pub mod line_index;
pub mod parser;

pub use lexer::{lex, Lexer, Token, TokenKind};
pub use line_index::LineIndex;
pub use parser::{ast, parse, ParseError, Program};

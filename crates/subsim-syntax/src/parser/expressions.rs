//! Expression parsing.
//!
//! Operator precedence, lowest to highest:
//!
//! | level | operators            |
//! |-------|----------------------|
//! | 1     | `OR`                 |
//! | 2     | `XOR`                |
//! | 3     | `AND`, `&`           |
//! | 4     | `=`, `<>`            |
//! | 5     | `<`, `>`, `<=`, `>=` |
//! | 6     | `+`, `-`             |
//! | 7     | `*`, `/`, `MOD`      |
//! | 8     | unary `-`, `NOT`     |
//! | 9     | `**`                 |

use smol_str::SmolStr;

use crate::lexer::TokenKind;

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::{ParseError, ParseResult, Parser};

fn binary_op(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    let entry = match kind {
        TokenKind::KwOr => (BinaryOp::Or, 1),
        TokenKind::KwXor => (BinaryOp::Xor, 2),
        TokenKind::KwAnd | TokenKind::Ampersand => (BinaryOp::And, 3),
        TokenKind::Eq => (BinaryOp::Eq, 4),
        TokenKind::Neq => (BinaryOp::Ne, 4),
        TokenKind::Lt => (BinaryOp::Lt, 5),
        TokenKind::LtEq => (BinaryOp::Le, 5),
        TokenKind::Gt => (BinaryOp::Gt, 5),
        TokenKind::GtEq => (BinaryOp::Ge, 5),
        TokenKind::Plus => (BinaryOp::Add, 6),
        TokenKind::Minus => (BinaryOp::Sub, 6),
        TokenKind::Star => (BinaryOp::Mul, 7),
        TokenKind::Slash => (BinaryOp::Div, 7),
        TokenKind::KwMod => (BinaryOp::Mod, 7),
        TokenKind::Power => (BinaryOp::Pow, 8),
        _ => return None,
    };
    Some(entry)
}

/// Operand of a unary operator takes every binary operator above `*`.
const UNARY_OPERAND_MIN: u8 = 7;

impl Parser<'_> {
    /// Parse a full expression.
    pub(crate) fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some((op, prec)) = binary_op(self.current()) {
            if prec <= min_prec {
                break;
            }
            self.bump();
            // `**` is left-associative in IEC 61131-3, like the others.
            let right = self.parse_binary(prec)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.current() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::KwNot => Some(UnaryOp::Not),
            TokenKind::Plus => {
                self.bump();
                return self.parse_unary();
            }
            _ => None,
        };
        let Some(op) = op else {
            return self.parse_postfix();
        };
        self.bump();
        let operand = self.parse_binary(UNARY_OPERAND_MIN)?;
        // Fold negative numeric literals so `-32768` stays a literal.
        Ok(match (op, operand) {
            (UnaryOp::Neg, Expr::Literal(Literal::Int(value))) => {
                Expr::Literal(Literal::Int(value.wrapping_neg()))
            }
            (UnaryOp::Neg, Expr::Literal(Literal::Real(value))) => {
                Expr::Literal(Literal::Real(-value))
            }
            (op, operand) => Expr::Unary {
                op,
                expr: Box::new(operand),
            },
        })
    }

    pub(crate) fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(TokenKind::Dot) {
                let field = self.expect_ident("member name after '.'")?;
                expr = Expr::Member {
                    target: Box::new(expr),
                    field,
                };
            } else if self.eat(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.expect(TokenKind::RBracket)?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(TokenKind::LParen) {
                let args = self.parse_call_args()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_call_args(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            // Formal `IN := value` arguments are accepted and treated positionally.
            if self.at(TokenKind::Ident) && self.nth(1) == TokenKind::Assign {
                self.bump();
                self.bump();
            }
            args.push(self.parse_expression()?);
            if self.eat(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let line = self.line();
        let text = self.text();
        let expr = match self.current() {
            TokenKind::IntLiteral => Expr::Literal(Literal::Int(parse_int(text, line)?)),
            TokenKind::RealLiteral => Expr::Literal(Literal::Real(parse_real(text, line)?)),
            TokenKind::TimeLiteral => Expr::Literal(Literal::Time(parse_time(text, line)?)),
            TokenKind::StringLiteral => Expr::Literal(Literal::String(unescape_string(text))),
            TokenKind::KwTrue => Expr::Literal(Literal::Bool(true)),
            TokenKind::KwFalse => Expr::Literal(Literal::Bool(false)),
            TokenKind::Ident => Expr::Name(SmolStr::new(text)),
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.bump();
        Ok(expr)
    }
}

fn parse_int(text: &str, line: u32) -> ParseResult<i64> {
    let cleaned: String = text.chars().filter(|ch| *ch != '_').collect();
    let (radix, digits) = match cleaned.split_once('#') {
        Some(("16", digits)) => (16, digits),
        Some(("8", digits)) => (8, digits),
        Some(("2", digits)) => (2, digits),
        _ => (10, cleaned.as_str()),
    };
    i64::from_str_radix(digits, radix)
        .map_err(|_| ParseError::new(line, format!("integer literal `{text}` out of range")))
}

fn parse_real(text: &str, line: u32) -> ParseResult<f64> {
    let cleaned: String = text.chars().filter(|ch| *ch != '_').collect();
    cleaned
        .parse::<f64>()
        .map_err(|_| ParseError::new(line, format!("invalid real literal `{text}`")))
}

/// Parses `T#1h2m3s4ms` style literals into milliseconds.
fn parse_time(text: &str, line: u32) -> ParseResult<i64> {
    let invalid = || ParseError::new(line, format!("invalid time literal `{text}`"));
    let (_, body) = text.split_once('#').ok_or_else(invalid)?;
    let (negative, body) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body.strip_prefix('+').unwrap_or(body)),
    };
    let body = body.to_ascii_lowercase().replace('_', "");

    let mut total = 0.0_f64;
    let mut rest = body.as_str();
    while !rest.is_empty() {
        let number_len = rest
            .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
            .ok_or_else(invalid)?;
        let (number, tail) = rest.split_at(number_len);
        let value: f64 = number.parse().map_err(|_| invalid())?;
        let (scale, unit_len) = if tail.starts_with("ms") {
            (1.0, 2)
        } else if tail.starts_with('d') {
            (86_400_000.0, 1)
        } else if tail.starts_with('h') {
            (3_600_000.0, 1)
        } else if tail.starts_with('m') {
            (60_000.0, 1)
        } else if tail.starts_with('s') {
            (1_000.0, 1)
        } else {
            return Err(invalid());
        };
        total += value * scale;
        rest = &tail[unit_len..];
    }
    let millis = total.round() as i64;
    Ok(if negative { -millis } else { millis })
}

fn unescape_string(text: &str) -> SmolStr {
    let inner = &text[1..text.len().saturating_sub(1).max(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('L' | 'l' | 'N' | 'n') => out.push('\n'),
            Some('R' | 'r') => out.push('\r'),
            Some('T' | 't') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('$'),
        }
    }
    SmolStr::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn expr(source: &str) -> Expr {
        Parser::new(source).parse_expression().unwrap()
    }

    fn lit_int(value: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Literal::Int(value)))
    }

    #[test]
    fn precedence_mul_over_add() {
        assert_eq!(
            expr("1 + 2 * 3"),
            Expr::Binary {
                op: BinaryOp::Add,
                left: lit_int(1),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: lit_int(2),
                    right: lit_int(3),
                }),
            }
        );
    }

    #[test]
    fn comparison_binds_tighter_than_and() {
        let parsed = expr("a <> 1 AND b");
        let Expr::Binary { op, left, .. } = parsed else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::And);
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Ne, .. }));
    }

    #[test]
    fn not_applies_to_primary() {
        let parsed = expr("NOT a AND b");
        assert!(matches!(parsed, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn device_call_shape() {
        let parsed = expr("Device.ReadRegister(192)");
        let Expr::Call { callee, args } = parsed else {
            panic!("expected call");
        };
        assert_eq!(callee.dotted_path().as_deref(), Some("Device.ReadRegister"));
        assert_eq!(args, vec![Expr::Literal(Literal::Int(192))]);
    }

    #[test]
    fn literal_forms() {
        assert_eq!(parse_int("16#FF", 1), Ok(255));
        assert_eq!(parse_int("2#1010", 1), Ok(10));
        assert_eq!(parse_int("1_000", 1), Ok(1000));
        assert_eq!(parse_time("T#1s500ms", 1), Ok(1500));
        assert_eq!(parse_time("TIME#1.5m", 1), Ok(90_000));
        assert_eq!(parse_time("t#-100ms", 1), Ok(-100));
        assert_eq!(unescape_string("'a$'b$Nc'"), "a'b\nc");
        assert_eq!(expr("-5"), Expr::Literal(Literal::Int(-5)));
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let err = parse_int("99999999999999999999", 7).unwrap_err();
        assert_eq!(err.line, 7);
    }
}

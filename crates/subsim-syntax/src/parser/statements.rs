//! Statement parsing.
//!
//! Supported statements:
//! - Assignment: `x := expr;`
//! - Call statement: `Device.WriteCoil(1, TRUE);`
//! - IF/ELSIF/ELSE/END_IF
//! - CASE/OF/END_CASE
//! - FOR/TO/BY/DO/END_FOR
//! - WHILE/DO/END_WHILE
//! - REPEAT/UNTIL/END_REPEAT
//! - EXIT, RETURN
//! - Empty statement: `;`

use crate::lexer::TokenKind;

use super::ast::{BinaryOp, CaseArm, CaseLabel, Expr, Literal, Stmt};
use super::{ParseError, ParseResult, Parser};

impl Parser<'_> {
    /// Parse statements until one of `terminators` (not consumed).
    pub(crate) fn parse_stmt_list(&mut self, terminators: &[TokenKind]) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.at_any(terminators) {
            if self.at_end() {
                let expected = terminators
                    .iter()
                    .map(|kind| kind.describe())
                    .collect::<Vec<_>>()
                    .join(" or ");
                return Err(self.unexpected(&expected));
            }
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    /// Parse a single statement.
    pub(crate) fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let line = self.line();
        match self.current() {
            TokenKind::KwIf => self.parse_if_stmt(line),
            TokenKind::KwCase => self.parse_case_stmt(line),
            TokenKind::KwFor => self.parse_for_stmt(line),
            TokenKind::KwWhile => self.parse_while_stmt(line),
            TokenKind::KwRepeat => self.parse_repeat_stmt(line),
            TokenKind::KwExit => {
                self.bump();
                self.expect_semicolon()?;
                Ok(Stmt::Exit { line })
            }
            TokenKind::KwReturn => {
                self.bump();
                self.expect_semicolon()?;
                Ok(Stmt::Return { line })
            }
            TokenKind::KwVar | TokenKind::KwVarTemp => Err(ParseError::new(
                line,
                "variable blocks must precede the first statement",
            )),
            kind if kind.can_start_expr() => self.parse_assign_or_call_stmt(line),
            _ => Err(self.unexpected("statement")),
        }
    }

    fn expect_semicolon(&mut self) -> ParseResult<()> {
        if self.eat(TokenKind::Semicolon) {
            Ok(())
        } else {
            Err(self.unexpected("';' after statement"))
        }
    }

    /// `END_IF`, `END_WHILE`, ... may carry an optional `;`.
    fn end_block(&mut self, end: TokenKind) -> ParseResult<()> {
        self.expect(end)?;
        self.eat(TokenKind::Semicolon);
        Ok(())
    }

    fn parse_assign_or_call_stmt(&mut self, line: u32) -> ParseResult<Stmt> {
        let start = self.position();
        let target = self.parse_expression()?;
        if self.eat(TokenKind::Assign) {
            if !target.is_assignable() {
                let text = self.slice_tokens(start, self.position() - 1);
                return Err(ParseError::new(
                    line,
                    format!("invalid assignment target `{}`", text.trim()),
                ));
            }
            let value = self.parse_expression()?;
            self.expect_semicolon()?;
            return Ok(Stmt::Assign {
                target,
                value,
                line,
            });
        }
        if matches!(target, Expr::Call { .. }) {
            self.expect_semicolon()?;
            return Ok(Stmt::Call { expr: target, line });
        }
        if matches!(target, Expr::Binary { op: BinaryOp::Eq, .. }) && self.at(TokenKind::Semicolon)
        {
            return Err(ParseError::new(line, "expected ':=' for assignment, found '='"));
        }
        Err(self.unexpected("':=' or a call"))
    }

    fn parse_if_stmt(&mut self, line: u32) -> ParseResult<Stmt> {
        self.bump(); // IF
        let condition = self.parse_expression()?;
        self.expect(TokenKind::KwThen)?;
        let branch_end = [TokenKind::KwElsif, TokenKind::KwElse, TokenKind::KwEndIf];
        let then_block = self.parse_stmt_list(&branch_end)?;

        let mut else_if = Vec::new();
        while self.eat(TokenKind::KwElsif) {
            let cond = self.parse_expression()?;
            self.expect(TokenKind::KwThen)?;
            let block = self.parse_stmt_list(&branch_end)?;
            else_if.push((cond, block));
        }

        let else_block = if self.eat(TokenKind::KwElse) {
            self.parse_stmt_list(&[TokenKind::KwEndIf])?
        } else {
            Vec::new()
        };
        self.end_block(TokenKind::KwEndIf)?;

        Ok(Stmt::If {
            condition,
            then_block,
            else_if,
            else_block,
            line,
        })
    }

    fn parse_case_stmt(&mut self, line: u32) -> ParseResult<Stmt> {
        self.bump(); // CASE
        let selector = self.parse_expression()?;
        self.expect(TokenKind::KwOf)?;

        let mut arms = Vec::new();
        while !self.at(TokenKind::KwElse) && !self.at(TokenKind::KwEndCase) {
            if self.at_end() {
                return Err(self.unexpected("END_CASE"));
            }
            let labels = self.parse_case_labels()?;
            self.expect(TokenKind::Colon)?;
            let body = self.parse_case_body()?;
            arms.push(CaseArm { labels, body });
        }

        let else_block = if self.eat(TokenKind::KwElse) {
            self.parse_stmt_list(&[TokenKind::KwEndCase])?
        } else {
            Vec::new()
        };
        self.end_block(TokenKind::KwEndCase)?;

        Ok(Stmt::Case {
            selector,
            arms,
            else_block,
            line,
        })
    }

    fn parse_case_labels(&mut self) -> ParseResult<Vec<CaseLabel>> {
        let mut labels = Vec::new();
        loop {
            let low = self.parse_case_value()?;
            if self.eat(TokenKind::DotDot) {
                let high = self.parse_case_value()?;
                labels.push(CaseLabel::Range(low, high));
            } else {
                labels.push(CaseLabel::Single(low));
            }
            if !self.eat(TokenKind::Comma) {
                return Ok(labels);
            }
        }
    }

    fn parse_case_value(&mut self) -> ParseResult<i64> {
        let negative = self.eat(TokenKind::Minus);
        let line = self.line();
        match self.parse_postfix()? {
            Expr::Literal(Literal::Int(value)) => Ok(if negative { -value } else { value }),
            _ => Err(ParseError::new(line, "CASE labels must be integer literals")),
        }
    }

    /// A case arm body runs until the next label list, ELSE or END_CASE.
    fn parse_case_body(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            if self.at(TokenKind::KwElse) || self.at(TokenKind::KwEndCase) {
                return Ok(stmts);
            }
            if self.at_end() {
                return Err(self.unexpected("END_CASE"));
            }
            if self.at_case_label() {
                return Ok(stmts);
            }
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            stmts.push(self.parse_statement()?);
        }
    }

    fn at_case_label(&self) -> bool {
        let mut n = 0;
        loop {
            if self.nth(n) == TokenKind::Minus {
                n += 1;
            }
            if self.nth(n) != TokenKind::IntLiteral {
                return false;
            }
            n += 1;
            match self.nth(n) {
                TokenKind::Colon => return true,
                TokenKind::Comma | TokenKind::DotDot => n += 1,
                _ => return false,
            }
        }
    }

    fn parse_for_stmt(&mut self, line: u32) -> ParseResult<Stmt> {
        self.bump(); // FOR
        let control = self.expect_ident("loop variable")?;
        self.expect(TokenKind::Assign)?;
        let start = self.parse_expression()?;
        self.expect(TokenKind::KwTo)?;
        let end = self.parse_expression()?;
        let step = if self.eat(TokenKind::KwBy) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(TokenKind::KwDo)?;
        let body = self.parse_stmt_list(&[TokenKind::KwEndFor])?;
        self.end_block(TokenKind::KwEndFor)?;
        Ok(Stmt::For {
            control,
            start,
            end,
            step,
            body,
            line,
        })
    }

    fn parse_while_stmt(&mut self, line: u32) -> ParseResult<Stmt> {
        self.bump(); // WHILE
        let condition = self.parse_expression()?;
        self.expect(TokenKind::KwDo)?;
        let body = self.parse_stmt_list(&[TokenKind::KwEndWhile])?;
        self.end_block(TokenKind::KwEndWhile)?;
        Ok(Stmt::While {
            condition,
            body,
            line,
        })
    }

    fn parse_repeat_stmt(&mut self, line: u32) -> ParseResult<Stmt> {
        self.bump(); // REPEAT
        let body = self.parse_stmt_list(&[TokenKind::KwUntil])?;
        self.expect(TokenKind::KwUntil)?;
        let until = self.parse_expression()?;
        self.end_block(TokenKind::KwEndRepeat)?;
        Ok(Stmt::Repeat { body, until, line })
    }
}

//! Variable block parsing.
//!
//! ```text
//! VAR [CONSTANT | RETAIN]
//!     name : TYPE [:= expr];
//!     a, b : TYPE;
//! END_VAR
//! ```

use crate::lexer::TokenKind;

use super::ast::{VarBlock, VarBlockKind, VarDecl};
use super::{ParseResult, Parser};

impl Parser<'_> {
    pub(crate) fn parse_var_block(&mut self) -> ParseResult<VarBlock> {
        let line = self.line();
        let kind = if self.eat(TokenKind::KwVarTemp) {
            VarBlockKind::Temp
        } else {
            self.expect(TokenKind::KwVar)?;
            VarBlockKind::Var
        };

        let mut constant = false;
        let mut retain = false;
        loop {
            if self.eat(TokenKind::KwConstant) {
                constant = true;
            } else if self.eat(TokenKind::KwRetain) {
                retain = true;
            } else {
                break;
            }
        }

        let mut decls = Vec::new();
        while !self.at(TokenKind::KwEndVar) {
            if self.at_end() {
                return Err(self.unexpected("END_VAR"));
            }
            self.parse_var_decl(&mut decls)?;
        }
        self.expect(TokenKind::KwEndVar)?;
        self.eat(TokenKind::Semicolon);

        Ok(VarBlock {
            kind,
            constant,
            retain,
            decls,
            line,
        })
    }

    fn parse_var_decl(&mut self, decls: &mut Vec<VarDecl>) -> ParseResult<()> {
        let line = self.line();
        let mut names = vec![self.expect_ident("variable name")?];
        while self.eat(TokenKind::Comma) {
            names.push(self.expect_ident("variable name")?);
        }
        self.expect(TokenKind::Colon)?;
        let type_name = self.expect_ident("type name")?;
        let init = if self.eat(TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;

        for name in names {
            decls.push(VarDecl {
                name,
                type_name: type_name.clone(),
                init: init.clone(),
                line,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::{Expr, Literal, VarBlockKind};
    use crate::parser::parse;

    #[test]
    fn declarations_with_and_without_initializers() {
        let program = parse(
            "VAR\n  running : BOOL;\n  setpoint : REAL := 11.0;\n  a, b : INT := 2;\nEND_VAR",
        )
        .unwrap();
        let decls: Vec<_> = program.declarations().map(|(_, decl)| decl).collect();
        assert_eq!(decls.len(), 4);
        assert_eq!(decls[0].name, "running");
        assert_eq!(decls[0].init, None);
        assert_eq!(decls[1].line, 3);
        assert_eq!(decls[1].init, Some(Expr::Literal(Literal::Real(11.0))));
        assert_eq!(decls[3].name, "b");
        assert_eq!(decls[3].init, Some(Expr::Literal(Literal::Int(2))));
    }

    #[test]
    fn block_modifiers() {
        let program =
            parse("VAR CONSTANT LIMIT : INT := 5; END_VAR\nVAR_TEMP t : INT; END_VAR").unwrap();
        assert!(program.var_blocks[0].constant);
        assert_eq!(program.var_blocks[1].kind, VarBlockKind::Temp);
    }

    #[test]
    fn missing_type_is_reported_on_its_line() {
        let err = parse("VAR\n  x : ;\nEND_VAR").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("type name"));
    }
}

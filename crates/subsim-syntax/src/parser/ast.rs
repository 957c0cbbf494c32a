//! Abstract syntax tree for device logic programs.
//!
//! Every statement and declaration carries the 1-based source line of its
//! first token. The runtime suspends before each statement and reports that
//! line, so lines are part of the observable behavior of a program.

#![allow(missing_docs)]

use smol_str::SmolStr;

/// A parsed program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Name from an optional `PROGRAM name ... END_PROGRAM` wrapper.
    pub name: Option<SmolStr>,
    /// Variable blocks in source order.
    pub var_blocks: Vec<VarBlock>,
    /// Statement list of the program body.
    pub body: Vec<Stmt>,
}

impl Program {
    /// Iterate all declarations across blocks, in source order.
    pub fn declarations(&self) -> impl Iterator<Item = (&VarBlock, &VarDecl)> {
        self.var_blocks
            .iter()
            .flat_map(|block| block.decls.iter().map(move |decl| (block, decl)))
    }
}

/// Kind of a variable block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarBlockKind {
    /// `VAR` - persists across passes.
    Var,
    /// `VAR_TEMP` - re-initialized at the start of every pass.
    Temp,
}

/// A `VAR ... END_VAR` block.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBlock {
    pub kind: VarBlockKind,
    pub constant: bool,
    pub retain: bool,
    pub decls: Vec<VarDecl>,
    pub line: u32,
}

/// `name : TYPE [:= init];`
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: SmolStr,
    pub type_name: SmolStr,
    pub init: Option<Expr>,
    pub line: u32,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Real(f64),
    String(SmolStr),
    /// Duration in milliseconds.
    Time(i64),
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// Source spelling of the operator.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "MOD",
            Self::Pow => "**",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(SmolStr),
    /// `target.field`
    Member {
        target: Box<Expr>,
        field: SmolStr,
    },
    /// `target[index]`
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// `callee(args...)`
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Returns the dotted path of a name/member chain (`Device.WriteCoil`).
    #[must_use]
    pub fn dotted_path(&self) -> Option<String> {
        match self {
            Expr::Name(name) => Some(name.to_string()),
            Expr::Member { target, field } => {
                let mut path = target.dotted_path()?;
                path.push('.');
                path.push_str(field);
                Some(path)
            }
            _ => None,
        }
    }

    /// Returns `true` if the expression is a syntactically valid assignment
    /// target: a bare identifier or an attribute/index path rooted at one.
    #[must_use]
    pub fn is_assignable(&self) -> bool {
        match self {
            Expr::Name(_) => true,
            Expr::Member { target, .. } | Expr::Index { target, .. } => target.is_assignable(),
            _ => false,
        }
    }
}

/// A CASE label.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseLabel {
    Single(i64),
    Range(i64, i64),
}

/// One `labels : statements` arm of a CASE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub labels: Vec<CaseLabel>,
    pub body: Vec<Stmt>,
}

/// Statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign {
        target: Expr,
        value: Expr,
        line: u32,
    },
    Call {
        expr: Expr,
        line: u32,
    },
    If {
        condition: Expr,
        then_block: Vec<Stmt>,
        else_if: Vec<(Expr, Vec<Stmt>)>,
        else_block: Vec<Stmt>,
        line: u32,
    },
    Case {
        selector: Expr,
        arms: Vec<CaseArm>,
        else_block: Vec<Stmt>,
        line: u32,
    },
    For {
        control: SmolStr,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
        body: Vec<Stmt>,
        line: u32,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        line: u32,
    },
    Repeat {
        body: Vec<Stmt>,
        until: Expr,
        line: u32,
    },
    Exit {
        line: u32,
    },
    Return {
        line: u32,
    },
}

impl Stmt {
    /// Line of the statement's first token.
    #[must_use]
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Assign { line, .. }
            | Stmt::Call { line, .. }
            | Stmt::If { line, .. }
            | Stmt::Case { line, .. }
            | Stmt::For { line, .. }
            | Stmt::While { line, .. }
            | Stmt::Repeat { line, .. }
            | Stmt::Exit { line }
            | Stmt::Return { line } => *line,
        }
    }
}

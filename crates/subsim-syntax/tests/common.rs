//! Shared helpers for parser tests.
#![allow(dead_code)]

use subsim_syntax::ast::{Program, Stmt};
use subsim_syntax::parse;

pub fn parse_ok(source: &str) -> Program {
    parse(source).unwrap_or_else(|err| panic!("parse failed: {err}\n{source}"))
}

/// Flattens nested statement lists into (line, kind) pairs in source order.
pub fn outline(stmts: &[Stmt]) -> Vec<(u32, &'static str)> {
    let mut out = Vec::new();
    walk(stmts, &mut out);
    out
}

fn walk(stmts: &[Stmt], out: &mut Vec<(u32, &'static str)>) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign { line, .. } => out.push((*line, "assign")),
            Stmt::Call { line, .. } => out.push((*line, "call")),
            Stmt::If {
                line,
                then_block,
                else_if,
                else_block,
                ..
            } => {
                out.push((*line, "if"));
                walk(then_block, out);
                for (_, block) in else_if {
                    walk(block, out);
                }
                walk(else_block, out);
            }
            Stmt::Case {
                line,
                arms,
                else_block,
                ..
            } => {
                out.push((*line, "case"));
                for arm in arms {
                    walk(&arm.body, out);
                }
                walk(else_block, out);
            }
            Stmt::For { line, body, .. } => {
                out.push((*line, "for"));
                walk(body, out);
            }
            Stmt::While { line, body, .. } => {
                out.push((*line, "while"));
                walk(body, out);
            }
            Stmt::Repeat { line, body, .. } => {
                out.push((*line, "repeat"));
                walk(body, out);
            }
            Stmt::Exit { line } => out.push((*line, "exit")),
            Stmt::Return { line } => out.push((*line, "return")),
        }
    }
}

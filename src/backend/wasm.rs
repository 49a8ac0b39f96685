//! The WebAssembly text-format backend: one `i32` local per
//! assigned variable, a linear memory declaration, and a single exported
//! `$main` function.

use super::{Backend, Expr, Program, Statement};
use crate::config::TranspileOptions;
use crate::error::BackendError;
use std::collections::BTreeSet;

pub struct WasmBackend;

impl Backend for WasmBackend {
    fn name(&self) -> &'static str {
        "wasm"
    }

    fn translate(&self, program: &Program, _options: &TranspileOptions) -> Result<String, BackendError> {
        log::debug!("wasm backend: translating {} statements", program.statements.len());
        let locals = collect_locals(program);

        let mut out = String::new();
        out.push_str("(module\n");
        out.push_str("  (memory 256)\n");
        out.push_str("  (func $main\n");
        for name in &locals {
            out.push_str(&format!("    (local ${} i32)\n", name));
        }
        for statement in &program.statements {
            emit_statement(statement, &mut out)?;
        }
        out.push_str("  )\n");
        out.push_str("  (export \"main\" (func $main))\n");
        out.push_str(")\n");
        Ok(out)
    }
}

fn collect_locals(program: &Program) -> BTreeSet<String> {
    program
        .statements
        .iter()
        .filter_map(|s| match s {
            Statement::Assignment { name, .. } => Some(name.clone()),
            Statement::Expression { .. } => None,
        })
        .collect()
}

fn emit_statement(statement: &Statement, out: &mut String) -> Result<(), BackendError> {
    match statement {
        Statement::Assignment { name, value, .. } => {
            emit_expr(value, out)?;
            out.push_str(&format!("    local.set ${}\n", name));
        }
        Statement::Expression { expr, .. } => {
            emit_expr(expr, out)?;
            out.push_str("    drop\n");
        }
    }
    Ok(())
}

fn emit_expr(expr: &Expr, out: &mut String) -> Result<(), BackendError> {
    match expr {
        Expr::Number(n) => {
            out.push_str(&format!("    i32.const {}\n", *n as i64));
            Ok(())
        }
        Expr::Identifier(name) => {
            out.push_str(&format!("    local.get ${}\n", name));
            Ok(())
        }
        Expr::StringLiteral(_) => Err(BackendError::new(
            "wasm",
            "string literals have no i32 representation",
        )),
        Expr::Call { name, .. } => Err(BackendError::new(
            "wasm",
            format!("calls to {:?} require a function import or definition, neither is modeled here", name),
        )),
        Expr::Grouped(inner) => emit_expr(inner, out),
        Expr::BinaryOp { op, left, right } => {
            emit_expr(left, out)?;
            emit_expr(right, out)?;
            let instruction = match op.as_str() {
                "+" => "i32.add",
                "-" => "i32.sub",
                "*" => "i32.mul",
                "/" => "i32.div_s",
                other => return Err(BackendError::new("wasm", format!("unknown operator {:?}", other))),
            };
            out.push_str(&format!("    {}\n", instruction));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::lower_program;
    use crate::interpreter;
    use crate::peg::notation;

    fn arithmetic_grammar() -> crate::peg::Grammar {
        let text = "program   <- statement+\n\
                     statement <- IDENT \"=\" expr \";\"\n\
                     expr      <- term ((\"+\" / \"-\") term)*\n\
                     term      <- factor ((\"*\" / \"/\") factor)*\n\
                     factor    <- NUMBER / IDENT / \"(\" expr \")\"\n";
        notation::parse(text).unwrap()
    }

    #[test]
    fn declares_one_local_per_assigned_variable() {
        let grammar = arithmetic_grammar();
        let ast = interpreter::parse(&grammar, "x = 1 ; y = x + 2 ;").unwrap();
        let program = lower_program(&ast).unwrap();
        let output = WasmBackend.translate(&program, &TranspileOptions::new()).unwrap();
        assert!(output.contains("(local $x i32)"));
        assert!(output.contains("(local $y i32)"));
        assert!(output.contains("i32.add"));
    }
}

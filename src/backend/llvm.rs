//! The LLVM IR backend: one stack slot (`alloca i32`) per
//! assigned variable, SSA temporaries numbered as they are produced, and a
//! single `@main` function returning `0`.

use super::{Backend, Expr, Program, Statement};
use crate::config::TranspileOptions;
use crate::error::BackendError;
use std::collections::BTreeSet;

pub struct LlvmBackend;

impl Backend for LlvmBackend {
    fn name(&self) -> &'static str {
        "llvm"
    }

    fn translate(&self, program: &Program, _options: &TranspileOptions) -> Result<String, BackendError> {
        log::debug!("llvm backend: translating {} statements", program.statements.len());
        let locals = collect_locals(program);
        let mut out = String::new();
        out.push_str("define i32 @main() {\nentry:\n");
        for name in &locals {
            out.push_str(&format!("  %{} = alloca i32\n", name));
        }

        let mut next_temp = 0usize;
        for statement in &program.statements {
            emit_statement(statement, &mut out, &mut next_temp)?;
        }

        out.push_str("  ret i32 0\n}\n");
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

fn emit_statement(statement: &Statement, out: &mut String, next_temp: &mut usize) -> Result<(), BackendError> {
    match statement {
        Statement::Assignment { name, value, .. } => {
            let result = emit_expr(value, out, next_temp)?;
            out.push_str(&format!("  store i32 {}, i32* %{}\n", result, name));
        }
        Statement::Expression { expr, .. } => {
            emit_expr(expr, out, next_temp)?;
        }
    }
    Ok(())
}

/// Emit the instructions for `expr` and return the SSA value (either a
/// literal constant or a `%N` temporary) holding its result.
fn emit_expr(expr: &Expr, out: &mut String, next_temp: &mut usize) -> Result<String, BackendError> {
    match expr {
        Expr::Number(n) => Ok((*n as i64).to_string()),
        Expr::Identifier(name) => {
            let temp = fresh(next_temp);
            out.push_str(&format!("  {} = load i32, i32* %{}\n", temp, name));
            Ok(temp)
        }
        Expr::StringLiteral(_) => Err(BackendError::new(
            "llvm",
            "string literals are not representable as an i32 value",
        )),
        Expr::Call { name, .. } => Err(BackendError::new(
            "llvm",
            format!("calls to {:?} require a function declaration, none is modeled here", name),
        )),
        Expr::Grouped(inner) => emit_expr(inner, out, next_temp),
        Expr::BinaryOp { op, left, right } => {
            let l = emit_expr(left, out, next_temp)?;
            let r = emit_expr(right, out, next_temp)?;
            let instruction = match op.as_str() {
                "+" => "add",
                "-" => "sub",
                "*" => "mul",
                "/" => "sdiv",
                other => return Err(BackendError::new("llvm", format!("unknown operator {:?}", other))),
            };
            let temp = fresh(next_temp);
            out.push_str(&format!("  {} = {} i32 {}, {}\n", temp, instruction, l, r));
            Ok(temp)
        }
    }
}

fn fresh(next_temp: &mut usize) -> String {
    let temp = format!("%t{}", next_temp);
    *next_temp += 1;
    temp
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
    fn allocates_a_slot_per_variable_and_returns_zero() {
        let grammar = arithmetic_grammar();
        let ast = interpreter::parse(&grammar, "x = 1 + 2 ;").unwrap();
        let program = lower_program(&ast).unwrap();
        let output = LlvmBackend.translate(&program, &TranspileOptions::new()).unwrap();
        assert!(output.contains("%x = alloca i32"));
        assert!(output.contains("store i32"));
        assert!(output.trim_end().ends_with("ret i32 0\n}"));
    }
}

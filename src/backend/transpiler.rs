//! The high-level transpiler: emits an indentation-based,
//! keyword/operator-remapped rendering of a [`Program`], and offers an
//! `execute` entry point that interprets the program directly instead of
//! emitting text, returning the final variable bindings.

use super::{evaluate_expr, Backend, Expr, Program, Statement};
use crate::config::TranspileOptions;
use crate::error::BackendError;
use std::collections::HashMap;

fn is_private(name: &str) -> bool {
    name.starts_with("__")
}

pub struct Transpiler;

impl Backend for Transpiler {
    fn name(&self) -> &'static str {
        "transpiler"
    }

    fn translate(&self, program: &Program, options: &TranspileOptions) -> Result<String, BackendError> {
        log::debug!("transpiler backend: translating {} statements", program.statements.len());
        let mut out = String::new();
        if options.wrap_main {
            out.push_str(&format!("{} {{\n", options.keyword("begin")));
        }
        for statement in &program.statements {
            let indent = if options.wrap_main { "    " } else { "" };
            if options.source_map_comments {
                out.push_str(indent);
                out.push_str(&format!("// line {}\n", statement_position(statement).line));
            }
            out.push_str(indent);
            emit_statement(statement, options, &mut out)?;
            out.push('\n');
        }
        if options.wrap_main {
            out.push_str(&format!("{}\n", options.keyword("end")));
        }
        Ok(out)
    }
}

fn statement_position(statement: &Statement) -> crate::position::Position {
    match statement {
        Statement::Assignment { position, .. } => *position,
        Statement::Expression { position, .. } => *position,
    }
}

fn emit_statement(statement: &Statement, options: &TranspileOptions, out: &mut String) -> Result<(), BackendError> {
    match statement {
        Statement::Assignment { name, value, .. } => {
            out.push_str(options.keyword(name));
            out.push(' ');
            out.push_str(options.operator("="));
            out.push(' ');
            out.push_str(&emit_expr(value, options));
            out.push(';');
        }
        Statement::Expression { expr, .. } => {
            out.push_str(&emit_expr(expr, options));
            out.push(';');
        }
    }
    Ok(())
}

fn emit_expr(expr: &Expr, options: &TranspileOptions) -> String {
    match expr {
        Expr::Number(n) => format_number(*n),
        Expr::Identifier(name) => options.keyword(name).to_string(),
        Expr::StringLiteral(s) => format!("{:?}", s),
        Expr::Grouped(inner) => format!("( {} )", emit_expr(inner, options)),
        Expr::BinaryOp { op, left, right } => format!(
            "{} {} {}",
            emit_expr(left, options),
            options.operator(op),
            emit_expr(right, options)
        ),
        Expr::Call { name, args } => format!(
            "{}({})",
            options.function(name),
            args.iter().map(|a| emit_expr(a, options)).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Interpret `program` directly, in source order, returning every
/// top-level variable's final value except those whose name begins with
/// a double underscore, which are treated as private scratch bindings.
/// Bare expression statements are evaluated and their result discarded,
/// since they bind no name.
pub fn execute(program: &Program) -> Result<HashMap<String, f64>, BackendError> {
    let mut bindings = HashMap::new();
    for statement in &program.statements {
        match statement {
            Statement::Assignment { name, value, .. } => {
                let result = evaluate_expr(value, &bindings)?;
                bindings.insert(name.clone(), result);
            }
            Statement::Expression { expr, .. } => {
                evaluate_expr(expr, &bindings)?;
            }
        }
    }
    bindings.retain(|name, _| !is_private(name));
    Ok(bindings)
}

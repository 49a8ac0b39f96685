//! The ANSI C backend: every assigned variable becomes an `int` declared
//! at first assignment, wrapped in a fixed `main` preamble.

use super::{Backend, Expr, Program, Statement};
use crate::config::TranspileOptions;
use crate::error::BackendError;
use std::collections::HashSet;

pub struct CBackend;

impl Backend for CBackend {
    fn name(&self) -> &'static str {
        "c"
    }

    fn translate(&self, program: &Program, options: &TranspileOptions) -> Result<String, BackendError> {
        log::debug!("c backend: translating {} statements", program.statements.len());
        let mut out = String::new();
        out.push_str("#include <stdio.h>\n");
        out.push_str("#include <stdlib.h>\n");
        out.push_str("#include <string.h>\n\n");
        out.push_str("int main(void) {\n");

        let mut declared: HashSet<String> = HashSet::new();
        for statement in &program.statements {
            match statement {
                Statement::Assignment { name, value, .. } => {
                    let keyword = if declared.insert(name.clone()) { "int " } else { "" };
                    out.push_str(&format!(
                        "    {}{} = {};\n",
                        keyword,
                        name,
                        emit_expr(value, options)
                    ));
                }
                Statement::Expression { expr, .. } => {
                    out.push_str(&format!("    {};\n", emit_expr(expr, options)));
                }
            }
        }
        out.push_str("    return 0;\n}\n");
        Ok(out)
    }
}

fn emit_expr(expr: &Expr, options: &TranspileOptions) -> String {
    match expr {
        Expr::Number(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Expr::Identifier(name) => name.clone(),
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
            name,
            args.iter().map(|a| emit_expr(a, options)).collect::<Vec<_>>().join(", ")
        ),
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
    fn first_assignment_declares_int_later_ones_do_not() {
        let grammar = arithmetic_grammar();
        let ast = interpreter::parse(&grammar, "x = 1 ; x = x + 1 ;").unwrap();
        let program = lower_program(&ast).unwrap();
        let output = CBackend.translate(&program, &TranspileOptions::new()).unwrap();
        assert!(output.contains("int x = 1;"));
        assert!(output.contains("    x = x + 1;"));
        assert!(!output.contains("int x = x + 1;"));
    }

    #[test]
    fn emission_preserves_source_parens_and_precedence() {
        let grammar = arithmetic_grammar();
        let ast =
            interpreter::parse(&grammar, "x = 2 + 3 * 4 ; y = ( x - 1 ) * 2 ;").unwrap();
        let program = lower_program(&ast).unwrap();
        let output = CBackend.translate(&program, &TranspileOptions::new()).unwrap();
        let x_pos = output.find("int x = 2 + 3 * 4;").expect("x assignment");
        let y_pos = output.find("int y = ( x - 1 ) * 2;").expect("y assignment");
        assert!(x_pos < y_pos);
    }

    #[test]
    fn wraps_in_fixed_main_preamble() {
        let grammar = arithmetic_grammar();
        let ast = interpreter::parse(&grammar, "x = 1 ;").unwrap();
        let program = lower_program(&ast).unwrap();
        let output = CBackend.translate(&program, &TranspileOptions::new()).unwrap();
        assert!(output.starts_with("#include <stdio.h>"));
        assert!(output.contains("#include <stdlib.h>"));
        assert!(output.contains("#include <string.h>"));
        assert!(output.trim_end().ends_with("return 0;\n}"));
    }
}

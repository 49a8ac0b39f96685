//! The shared backend contract: every code-generation target implements
//! [`Backend::translate`] against the same lowered intermediate form,
//! built once here out of the grammar-agnostic `AstNode` tree.
//!
//! A grammar's rule names are whatever its author chose, so a backend
//! cannot switch on `node_type` directly — it recognizes *shapes*
//! instead: a statement list is "whatever the root's children are", an
//! assignment is "an identifier, an `=`-or-`:=` operator, an expression,
//! a terminating `;`", and an expression is "an operand, optionally
//! chained with operators and further operands".

pub mod c;
pub mod llvm;
pub mod transpiler;
pub mod wasm;

use crate::ast::AstNode;
use crate::config::TranspileOptions;
use crate::error::BackendError;
use crate::position::Position;
use std::collections::HashMap;

/// A backend turns a lowered [`Program`] into target-language text.
pub trait Backend {
    fn name(&self) -> &'static str;
    fn translate(&self, program: &Program, options: &TranspileOptions) -> Result<String, BackendError>;
}

/// A lowered, grammar-agnostic view of a parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment { name: String, value: Expr, position: Position },
    Expression { expr: Expr, position: Position },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Identifier(String),
    StringLiteral(String),
    BinaryOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// An expression written with explicit `(...)` grouping in source.
    /// Kept distinct from its inner expression so text-emitting backends
    /// can reproduce the parentheses the author wrote rather than
    /// inventing or dropping them; evaluation and non-textual backends
    /// treat it as fully transparent.
    Grouped(Box<Expr>),
    /// An identifier applied to a parenthesized, comma-separated argument
    /// list. `name` is in call position, the one place the high-level
    /// transpiler's function-remap table applies.
    Call { name: String, args: Vec<Expr> },
}

const ARITHMETIC_OPS: [&str; 4] = ["+", "-", "*", "/"];
const ASSIGNMENT_OPS: [&str; 2] = ["=", ":="];

/// Lower a parsed document into a [`Program`]. The root's children are
/// taken to be the top-level statement list, matching the usual
/// `program <- statement+` grammar shape.
pub fn lower_program(ast: &AstNode) -> Result<Program, BackendError> {
    let statements = if ast.is_leaf() {
        vec![lower_statement(ast)?]
    } else {
        ast.children
            .iter()
            .map(lower_statement)
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(Program { statements })
}

/// A statement node's immediate children follow the inline-assignment
/// shape directly:
/// `[Identifier, Operator("="|":="), expr, Operator(";")]`. A bare
/// expression statement is whatever remains once a trailing `;` operator
/// is filtered out.
fn lower_statement(node: &AstNode) -> Result<Statement, BackendError> {
    let children = &node.children;
    if let Some(op_index) = children
        .iter()
        .position(|c| c.node_type == "Operator" && ASSIGNMENT_OPS.contains(&c.value.as_deref().unwrap_or("")))
    {
        let name_node = op_index
            .checked_sub(1)
            .and_then(|i| children.get(i))
            .ok_or_else(|| BackendError::new("lowering", "assignment is missing its target identifier"))?;
        if name_node.node_type != "Identifier" {
            return Err(BackendError::new("lowering", "assignment target is not an identifier"));
        }
        let name = name_node.value.clone().unwrap_or_default();
        let rhs_node = children
            .get(op_index + 1)
            .ok_or_else(|| BackendError::new("lowering", "assignment is missing its right-hand side"))?;
        return Ok(Statement::Assignment {
            name,
            value: lower_expr_node(rhs_node)?,
            position: node.position,
        });
    }

    let filtered: Vec<AstNode> = children
        .iter()
        .filter(|c| !(c.node_type == "Operator" && c.value.as_deref() == Some(";")))
        .cloned()
        .collect();
    let expr = match filtered.as_slice() {
        [single] => lower_expr_node(single)?,
        _ if filtered.is_empty() => lower_expr_node(node)?,
        _ => lower_expr_node(&AstNode::composite(
            node.node_type.clone(),
            filtered,
            node.position,
            node.span.clone(),
        ))?,
    };
    Ok(Statement::Expression { expr, position: node.position })
}

/// Lower a single expression-shaped node. Transparently unwraps single-
/// child wrapper rules (`term <- factor`, `expr <- term`), recognizes an
/// `Identifier "(" ... ")"` shape as a call with the identifier in call
/// position, and recognizes a three-child `"(" expr ")"` shape as an
/// explicit grouping rather than a three-operand chain.
fn lower_expr_node(node: &AstNode) -> Result<Expr, BackendError> {
    if node.is_leaf() {
        return lower_leaf(node);
    }
    if node.children.len() == 1 {
        return lower_expr_node(&node.children[0]);
    }
    if node.children.len() >= 3
        && node.children[0].node_type == "Identifier"
        && is_paren(&node.children[1], "(")
        && is_paren(node.children.last().unwrap(), ")")
    {
        let name = node.children[0].value.clone().unwrap_or_default();
        let args = node.children[2..node.children.len() - 1]
            .iter()
            .filter(|c| !(c.node_type == "Operator" && c.value.as_deref() == Some(",")))
            .map(lower_expr_node)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Expr::Call { name, args });
    }
    if node.children.len() == 3 && is_paren(&node.children[0], "(") && is_paren(&node.children[2], ")") {
        return Ok(Expr::Grouped(Box::new(lower_expr_node(&node.children[1])?)));
    }

    let mut operands = Vec::new();
    let mut ops = Vec::new();
    for child in &node.children {
        if child.node_type == "Operator" && ARITHMETIC_OPS.contains(&child.value.as_deref().unwrap_or("")) {
            ops.push(child.value.clone().unwrap_or_default());
        } else {
            operands.push(lower_expr_node(child)?);
        }
    }
    let mut operands = operands.into_iter();
    let mut acc = operands
        .next()
        .ok_or_else(|| BackendError::new("lowering", "expression has no operand"))?;
    for op in ops {
        let rhs = operands
            .next()
            .ok_or_else(|| BackendError::new("lowering", "operator is missing its right-hand operand"))?;
        acc = Expr::BinaryOp {
            op,
            left: Box::new(acc),
            right: Box::new(rhs),
        };
    }
    Ok(acc)
}

fn lower_leaf(node: &AstNode) -> Result<Expr, BackendError> {
    match node.node_type.as_str() {
        "Number" => node
            .value
            .as_deref()
            .and_then(|v| v.parse::<f64>().ok())
            .map(Expr::Number)
            .ok_or_else(|| BackendError::new("lowering", "malformed number literal")),
        "Identifier" => Ok(Expr::Identifier(node.value.clone().unwrap_or_default())),
        "String" => Ok(Expr::StringLiteral(node.value.clone().unwrap_or_default())),
        other => Err(BackendError::new(
            "lowering",
            format!("{:?} is not a valid expression operand", other),
        )),
    }
}

fn is_paren(node: &AstNode, text: &str) -> bool {
    node.node_type == "Operator" && node.value.as_deref() == Some(text)
}

/// Evaluate a lowered expression against a variable environment.
pub fn evaluate_expr(expr: &Expr, bindings: &HashMap<String, f64>) -> Result<f64, BackendError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Identifier(name) => bindings
            .get(name)
            .copied()
            .ok_or_else(|| BackendError::new("execute", format!("undefined variable {:?}", name))),
        Expr::StringLiteral(_) => Err(BackendError::new("execute", "cannot evaluate a string as a number")),
        Expr::Grouped(inner) => evaluate_expr(inner, bindings),
        Expr::Call { name, .. } => Err(BackendError::new(
            "execute",
            format!("cannot evaluate a call to {:?}: no function table", name),
        )),
        Expr::BinaryOp { op, left, right } => {
            let l = evaluate_expr(left, bindings)?;
            let r = evaluate_expr(right, bindings)?;
            match op.as_str() {
                "+" => Ok(l + r),
                "-" => Ok(l - r),
                "*" => Ok(l * r),
                "/" => Ok(l / r),
                other => Err(BackendError::new("execute", format!("unknown operator {:?}", other))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn lowers_assignment_with_precedence() {
        let grammar = arithmetic_grammar();
        let ast = interpreter::parse(&grammar, "x = 2 + 3 * 4 ;").unwrap();
        let program = lower_program(&ast).unwrap();
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0] {
            Statement::Assignment { name, value, .. } => {
                assert_eq!(name, "x");
                let bindings = HashMap::new();
                assert_eq!(evaluate_expr(value, &bindings).unwrap(), 14.0);
            }
            _ => panic!("expected an assignment"),
        }
    }

    #[test]
    fn lowers_parenthesized_grouping_and_keeps_it_transparent_to_evaluation() {
        let grammar = arithmetic_grammar();
        let ast = interpreter::parse(&grammar, "x = ( 2 + 3 ) * 4 ;").unwrap();
        let program = lower_program(&ast).unwrap();
        match &program.statements[0] {
            Statement::Assignment { value, .. } => {
                assert!(matches!(value, Expr::BinaryOp { .. }));
                let result = evaluate_expr(value, &HashMap::new()).unwrap();
                assert_eq!(result, 20.0);
            }
            _ => panic!("expected an assignment"),
        }
    }

    #[test]
    fn sequential_assignments_see_earlier_bindings() {
        let grammar = arithmetic_grammar();
        let ast = interpreter::parse(&grammar, "x = 100 ; y = x + 22 ;").unwrap();
        let program = lower_program(&ast).unwrap();
        let mut bindings = HashMap::new();
        for statement in &program.statements {
            if let Statement::Assignment { name, value, .. } = statement {
                let result = evaluate_expr(value, &bindings).unwrap();
                bindings.insert(name.clone(), result);
            }
        }
        assert_eq!(bindings.get("x"), Some(&100.0));
        assert_eq!(bindings.get("y"), Some(&122.0));
    }

    #[test]
    fn pascal_style_assignment_operator_lowers_the_same_way() {
        let text = "program   <- statement+\n\
                     statement <- IDENT \":=\" expr \";\"\n\
                     expr      <- term ((\"+\" / \"-\") term)*\n\
                     term      <- factor ((\"*\" / \"/\") factor)*\n\
                     factor    <- NUMBER / IDENT / \"(\" expr \")\"\n";
        let grammar = notation::parse(text).unwrap();
        let ast = interpreter::parse(&grammar, "x := 10 ; y := x * 2 + 5 ; area := x * y ;").unwrap();
        let program = lower_program(&ast).unwrap();
        let mut bindings = HashMap::new();
        for statement in &program.statements {
            if let Statement::Assignment { name, value, .. } = statement {
                let result = evaluate_expr(value, &bindings).unwrap();
                bindings.insert(name.clone(), result);
            }
        }
        assert_eq!(bindings.get("x"), Some(&10.0));
        assert_eq!(bindings.get("y"), Some(&25.0));
        assert_eq!(bindings.get("area"), Some(&250.0));
    }

    #[test]
    fn lowers_a_call_shaped_node_with_the_identifier_in_call_position() {
        let text = "program   <- statement+\n\
                     statement <- IDENT \"=\" expr \";\"\n\
                     expr      <- term ((\"+\" / \"-\") term)*\n\
                     term      <- factor ((\"*\" / \"/\") factor)*\n\
                     factor    <- call / NUMBER / IDENT / \"(\" expr \")\"\n\
                     call      <- IDENT \"(\" expr \")\"\n";
        let grammar = notation::parse(text).unwrap();
        let ast = interpreter::parse(&grammar, "x = raiz ( 9 ) ;").unwrap();
        let program = lower_program(&ast).unwrap();
        match &program.statements[0] {
            Statement::Assignment { value, .. } => match value {
                Expr::Call { name, args } => {
                    assert_eq!(name, "raiz");
                    assert_eq!(args.len(), 1);
                    assert_eq!(args[0], Expr::Number(9.0));
                }
                other => panic!("expected a call, got {:?}", other),
            },
            _ => panic!("expected an assignment"),
        }
    }
}

//! The PEG expression tree, grammar rules, and the compiled [`Grammar`]
//! value. Grammars are built once via [`Grammar::build`], then frozen and
//! treated thereafter as immutable.

pub mod notation;

use crate::error::{GrammarError, ImplementationError};
use crate::position::Source;
use std::collections::HashMap;

/// Reserved names of the three built-in token matchers.
pub const BUILTIN_TOKENS: [&str; 3] = ["NUMBER", "IDENT", "STRING"];

pub fn is_builtin_token(name: &str) -> bool {
    BUILTIN_TOKENS.contains(&name)
}

/// A tagged PEG expression. Each variant carries exactly the
/// data it needs; two structurally equal trees are interchangeable.
#[derive(Debug, Clone, PartialEq)]
pub enum PegExpr {
    Literal(String),
    RuleRef(String),
    Sequence(Vec<PegExpr>),
    Choice(Vec<PegExpr>),
    ZeroOrMore(Box<PegExpr>),
    OneOrMore(Box<PegExpr>),
    Optional(Box<PegExpr>),
    AndPredicate(Box<PegExpr>),
    NotPredicate(Box<PegExpr>),
}

/// A named PEG rule: a unique name within its grammar, a root expression,
/// and an optional human description.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub expr: PegExpr,
    pub description: Option<String>,
}

impl Rule {
    pub fn new(name: impl Into<String>, expr: PegExpr) -> Self {
        Self {
            name: name.into(),
            expr,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A compiled grammar: a mapping from rule name to [`Rule`], a start-rule
/// name, and a descriptive label.
///
/// Every `RuleRef` in a built grammar is guaranteed to name either a rule
/// present in `rules` or a recognized built-in token — `Grammar::build`
/// rejects anything else, along with left recursion.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub label: String,
    pub start_rule: String,
    rules: HashMap<String, Rule>,
    /// Insertion order, used only to pick the default start rule and to
    /// assign stable rule ids for the packrat memo key.
    order: Vec<String>,
    rule_ids: HashMap<String, usize>,
}

impl Grammar {
    /// Compile and validate a set of rules. The first rule becomes the
    /// start rule unless `start_rule` overrides it.
    pub fn build(
        label: impl Into<String>,
        rules: Vec<Rule>,
        start_rule: Option<String>,
    ) -> Result<Grammar, GrammarError> {
        if rules.is_empty() {
            return Err(GrammarError::new(
                crate::position::Position::new(1, 1),
                "a grammar must declare at least one rule".to_string(),
            ));
        }

        let order: Vec<String> = rules.iter().map(|r| r.name.clone()).collect();
        let mut map = HashMap::with_capacity(rules.len());
        for rule in rules {
            if map.insert(rule.name.clone(), rule).is_some() {
                return Err(GrammarError::new(
                    crate::position::Position::new(1, 1),
                    format!("duplicate rule name {:?}", order.last().unwrap()),
                ));
            }
        }

        let start_rule = start_rule.unwrap_or_else(|| order[0].clone());
        if !map.contains_key(&start_rule) {
            return Err(GrammarError::new(
                crate::position::Position::new(1, 1),
                format!("start rule {:?} is not declared", start_rule),
            ));
        }

        let rule_ids = order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let grammar = Grammar {
            label: label.into(),
            start_rule,
            rules: map,
            order,
            rule_ids,
        };

        grammar
            .validate()
            .map_err(|e| GrammarError::new(crate::position::Position::new(1, 1), e.to_string()))?;

        log::debug!(
            "compiled grammar {:?} with {} rules, start rule {:?}",
            grammar.label,
            grammar.rules.len(),
            grammar.start_rule
        );

        Ok(grammar)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Stable integer id for a rule, used as half of the packrat memo key
    /// instead of the rule name string, for performance.
    pub fn rule_id(&self, name: &str) -> Option<usize> {
        self.rule_ids.get(name).copied()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Render the grammar back to PEG-like notation, one rule per line, for
    /// debugging. Not guaranteed to round-trip byte-for-byte with whatever
    /// notation produced the grammar.
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        for name in &self.order {
            let rule = &self.rules[name];
            out.push_str(&format!("{} <- {}\n", rule.name, render_expr(&rule.expr)));
        }
        out
    }

    /// Reject dangling rule references and left recursion.
    fn validate(&self) -> Result<(), ImplementationError> {
        for rule in self.rules.values() {
            self.check_references(&rule.expr)?;
        }
        for name in &self.order {
            let mut path = Vec::new();
            self.check_left_recursion(name, &mut path)?;
        }
        Ok(())
    }

    fn check_references(&self, expr: &PegExpr) -> Result<(), ImplementationError> {
        match expr {
            PegExpr::Literal(_) => Ok(()),
            PegExpr::RuleRef(name) => {
                if is_builtin_token(name) || self.rules.contains_key(name) {
                    Ok(())
                } else {
                    Err(ImplementationError::new(
                        "UnknownRule",
                        format!("rule reference {:?} does not name a declared rule or a built-in token", name),
                    ))
                }
            }
            PegExpr::Sequence(items) | PegExpr::Choice(items) => {
                items.iter().try_for_each(|e| self.check_references(e))
            }
            PegExpr::ZeroOrMore(inner)
            | PegExpr::OneOrMore(inner)
            | PegExpr::Optional(inner)
            | PegExpr::AndPredicate(inner)
            | PegExpr::NotPredicate(inner) => self.check_references(inner),
        }
    }

    /// Depth-first search over the "leftmost callable rule" relation: rule
    /// `a` left-recurses if it can reach itself through a chain of
    /// sub-expressions none of which is required to consume input first.
    fn check_left_recursion<'a>(
        &'a self,
        name: &'a str,
        path: &mut Vec<&'a str>,
    ) -> Result<(), ImplementationError> {
        if path.contains(&name) {
            path.push(name);
            return Err(ImplementationError::new(
                "LeftRecursion",
                format!("left recursion detected: {}", path.join(" -> ")),
            ));
        }
        if is_builtin_token(name) {
            return Ok(());
        }
        let rule = match self.rules.get(name) {
            Some(r) => r,
            None => return Ok(()), // already reported by check_references
        };
        path.push(name);
        let mut leftmost = Vec::new();
        self.collect_leftmost_refs(&rule.expr, &mut leftmost);
        for next in leftmost {
            self.check_left_recursion(next, path)?;
        }
        path.pop();
        Ok(())
    }

    /// Collect the rule names that could be invoked as the very first
    /// thing attempted while matching `expr`, i.e. before any element that
    /// unconditionally consumes input.
    fn collect_leftmost_refs<'a>(&'a self, expr: &'a PegExpr, out: &mut Vec<&'a str>) {
        match expr {
            PegExpr::Literal(_) => {}
            PegExpr::RuleRef(name) => out.push(name.as_str()),
            PegExpr::Sequence(items) => {
                for item in items {
                    self.collect_leftmost_refs(item, out);
                    if !self.is_nullable(item) {
                        break;
                    }
                }
            }
            PegExpr::Choice(items) => {
                for item in items {
                    self.collect_leftmost_refs(item, out);
                }
            }
            PegExpr::ZeroOrMore(inner) | PegExpr::OneOrMore(inner) | PegExpr::Optional(inner) => {
                self.collect_leftmost_refs(inner, out)
            }
            PegExpr::AndPredicate(inner) | PegExpr::NotPredicate(inner) => {
                self.collect_leftmost_refs(inner, out)
            }
        }
    }

    /// Conservative nullability used only to decide whether a left-
    /// recursion search should keep walking past a sequence element.
    /// Cycles (through non-left-recursive recursion) are treated as
    /// non-nullable, which only makes this check more conservative, never
    /// unsound: it can under-approximate nullability and stop the search
    /// early, never miss a genuine left-recursive cycle.
    fn is_nullable(&self, expr: &PegExpr) -> bool {
        self.is_nullable_visited(expr, &mut Vec::new())
    }

    fn is_nullable_visited<'a>(&'a self, expr: &'a PegExpr, visited: &mut Vec<&'a str>) -> bool {
        match expr {
            PegExpr::Literal(s) => s.is_empty(),
            PegExpr::RuleRef(name) => {
                if is_builtin_token(name) {
                    return false;
                }
                if visited.contains(&name.as_str()) {
                    return false;
                }
                match self.rules.get(name.as_str()) {
                    Some(rule) => {
                        visited.push(name.as_str());
                        let result = self.is_nullable_visited(&rule.expr, visited);
                        visited.pop();
                        result
                    }
                    None => false,
                }
            }
            PegExpr::Sequence(items) => items.iter().all(|e| self.is_nullable_visited(e, visited)),
            PegExpr::Choice(items) => items.iter().any(|e| self.is_nullable_visited(e, visited)),
            PegExpr::ZeroOrMore(_) | PegExpr::Optional(_) => true,
            PegExpr::OneOrMore(inner) => self.is_nullable_visited(inner, visited),
            PegExpr::AndPredicate(_) | PegExpr::NotPredicate(_) => true,
        }
    }
}

fn render_expr(expr: &PegExpr) -> String {
    match expr {
        PegExpr::Literal(s) => format!("{:?}", s),
        PegExpr::RuleRef(name) => name.clone(),
        PegExpr::Sequence(items) => items.iter().map(render_expr).collect::<Vec<_>>().join(" "),
        PegExpr::Choice(items) => items.iter().map(render_expr).collect::<Vec<_>>().join(" / "),
        PegExpr::ZeroOrMore(inner) => format!("({})*", render_expr(inner)),
        PegExpr::OneOrMore(inner) => format!("({})+", render_expr(inner)),
        PegExpr::Optional(inner) => format!("({})?", render_expr(inner)),
        PegExpr::AndPredicate(inner) => format!("&({})", render_expr(inner)),
        PegExpr::NotPredicate(inner) => format!("!({})", render_expr(inner)),
    }
}

/// Unused in the built-in token matchers themselves (they skip ASCII
/// whitespace directly) but kept here so callers constructing a `Source`
/// for both notation parsing and interpretation share one type.
pub fn source(text: &str) -> Source<'_> {
    Source::new(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_ref(name: &str) -> PegExpr {
        PegExpr::RuleRef(name.to_string())
    }
    fn lit(s: &str) -> PegExpr {
        PegExpr::Literal(s.to_string())
    }

    #[test]
    fn rejects_unknown_rule_reference() {
        let rules = vec![Rule::new("main", rule_ref("missing"))];
        let err = Grammar::build("g", rules, None).unwrap_err();
        assert!(err.message.contains("missing"));
    }

    #[test]
    fn rejects_direct_left_recursion() {
        // expr <- expr "+" NUMBER / NUMBER
        let expr = PegExpr::Choice(vec![
            PegExpr::Sequence(vec![rule_ref("expr"), lit("+"), rule_ref("NUMBER")]),
            rule_ref("NUMBER"),
        ]);
        let rules = vec![Rule::new("expr", expr)];
        let err = Grammar::build("g", rules, None).unwrap_err();
        assert!(err.message.to_lowercase().contains("left recursion"));
    }

    #[test]
    fn rejects_indirect_left_recursion() {
        // a <- b ; b <- a
        let rules = vec![
            Rule::new("a", rule_ref("b")),
            Rule::new("b", rule_ref("a")),
        ];
        let err = Grammar::build("g", rules, None).unwrap_err();
        assert!(err.message.to_lowercase().contains("left recursion"));
    }

    #[test]
    fn accepts_non_left_recursive_mutual_recursion() {
        // term <- NUMBER ; expr <- term ("+" term)*
        let rules = vec![
            Rule::new("term", rule_ref("NUMBER")),
            Rule::new(
                "expr",
                PegExpr::Sequence(vec![
                    rule_ref("term"),
                    PegExpr::ZeroOrMore(Box::new(PegExpr::Sequence(vec![
                        lit("+"),
                        rule_ref("term"),
                    ]))),
                ]),
            ),
        ];
        assert!(Grammar::build("g", rules, None).is_ok());
    }

    #[test]
    fn default_start_rule_is_first_declared() {
        let rules = vec![
            Rule::new("main", rule_ref("NUMBER")),
            Rule::new("other", rule_ref("IDENT")),
        ];
        let grammar = Grammar::build("g", rules, None).unwrap();
        assert_eq!(grammar.start_rule, "main");
    }
}

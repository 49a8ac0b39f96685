//! The packrat interpreter: recursive-descent PEG evaluation
//! over a compiled [`Grammar`], with per-call memoization keyed by
//! `(rule-id, position)`.

use crate::ast::AstNode;
use crate::error::SourceError;
use crate::peg::{is_builtin_token, Grammar, PegExpr};
use crate::position::Source;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A-?[0-9]+(\.[0-9]+)?").unwrap());
static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A[A-Za-z_][A-Za-z_0-9]*").unwrap());

/// A single packrat memo cell.
#[derive(Clone)]
pub enum MemoEntry {
    Failure,
    Success { node: AstNode, end: usize },
}

/// The packrat memo table, keyed by `(rule-id, position)`. Shared between
/// a one-shot [`parse`] and [`crate::incremental::IncrementalParser`],
/// which selectively invalidates and shifts entries instead of discarding
/// the whole table.
#[derive(Default, Clone)]
pub struct Cache {
    entries: HashMap<(usize, usize), MemoEntry>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, rule_id: usize, position: usize) -> Option<&MemoEntry> {
        self.entries.get(&(rule_id, position))
    }

    pub fn insert(&mut self, rule_id: usize, position: usize, entry: MemoEntry) {
        self.entries.insert((rule_id, position), entry);
    }

    pub fn remove(&mut self, rule_id: usize, position: usize) -> Option<MemoEntry> {
        self.entries.remove(&(rule_id, position))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over a snapshot of keys, for the incremental parser's
    /// invalidation pass.
    pub fn keys(&self) -> Vec<(usize, usize)> {
        self.entries.keys().copied().collect()
    }
}

/// Reserved rule id range for the three built-in token matchers, placed
/// just past the grammar's own rule ids so both kinds of memo key share
/// one `usize` space without colliding.
fn builtin_rule_id(grammar: &Grammar, name: &str) -> usize {
    let offset = crate::peg::BUILTIN_TOKENS
        .iter()
        .position(|&b| b == name)
        .expect("builtin_rule_id called with a non-builtin name");
    grammar.rule_count() + offset
}

/// The single largest byte offset reached during a parse, and the name of
/// the deepest rule attempted there. Ties at the same offset are broken
/// by last-attempted.
struct FurthestTracker {
    furthest: usize,
    deepest_rule: String,
}

impl FurthestTracker {
    fn new(start_rule: &str) -> Self {
        Self {
            furthest: 0,
            deepest_rule: start_rule.to_string(),
        }
    }

    fn record(&mut self, position: usize, rule_name: &str) {
        if position >= self.furthest {
            self.furthest = position;
            self.deepest_rule = rule_name.to_string();
        }
    }
}

/// The result of evaluating one [`PegExpr`]: the byte range of the first
/// actually-consumed character through the end of the match, and the flat
/// list of AST fragments the match contributes.
struct MatchOutcome {
    start: usize,
    end: usize,
    fragments: Vec<AstNode>,
}

impl MatchOutcome {
    fn empty(at: usize) -> Self {
        Self {
            start: at,
            end: at,
            fragments: Vec::new(),
        }
    }
}

fn skip_ascii_ws(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// A literal's text is elevated to an `"Operator"` leaf when it is made up
/// entirely of punctuation characters; any other literal (e.g. a bare
/// keyword) still contributes a leaf, typed `"Literal"`, so leaf spans
/// concatenate back to the source for literal-only grammars too.
fn is_punctuation(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| !c.is_alphanumeric() && !c.is_whitespace() && c != '_')
}

struct Ctx<'g, 's> {
    grammar: &'g Grammar,
    source: &'s Source<'s>,
    cache: &'g mut Cache,
    tracker: FurthestTracker,
}

/// Parse `text` against `grammar`'s start rule, using a fresh memo table.
pub fn parse(grammar: &Grammar, text: &str) -> Result<AstNode, SourceError> {
    let source = Source::new(text);
    let mut cache = Cache::new();
    parse_with_cache(grammar, &source, &mut cache)
}

/// Parse `text` reusing (and populating) an existing memo table — the
/// entry point the incremental parser re-invokes after applying an edit
/// and selectively invalidating stale entries.
pub fn parse_with_cache(
    grammar: &Grammar,
    source: &Source,
    cache: &mut Cache,
) -> Result<AstNode, SourceError> {
    let mut ctx = Ctx {
        grammar,
        source,
        cache,
        tracker: FurthestTracker::new(&grammar.start_rule),
    };
    match eval_rule(&mut ctx, &grammar.start_rule, 0, &grammar.start_rule) {
        Ok(outcome) => {
            log::debug!(
                "parse succeeded: {} bytes consumed, memo table has {} entries",
                outcome.end,
                ctx.cache.len()
            );
            Ok(outcome.fragments.into_iter().next().expect(
                "a rule invocation always contributes exactly one AST fragment on success",
            ))
        }
        Err(()) => {
            let position = source.position_at(ctx.tracker.furthest);
            log::debug!(
                "parse failed at {} (deepest rule {:?})",
                position,
                ctx.tracker.deepest_rule
            );
            Err(SourceError {
                line: position.line,
                column: position.column,
                furthest_position: ctx.tracker.furthest,
                deepest_rule: ctx.tracker.deepest_rule.clone(),
                message: format!(
                    "unexpected input while matching rule {:?}",
                    ctx.tracker.deepest_rule
                ),
            })
        }
    }
}

fn eval_rule(ctx: &mut Ctx, name: &str, position: usize, calling_rule: &str) -> Result<MatchOutcome, ()> {
    if is_builtin_token(name) {
        return eval_builtin(ctx, name, position, calling_rule);
    }

    let rule_id = ctx
        .grammar
        .rule_id(name)
        .expect("Grammar::build guarantees every RuleRef names a declared rule or built-in");

    if let Some(entry) = ctx.cache.get(rule_id, position) {
        log::trace!("memo hit for rule {:?} at {}", name, position);
        return match entry {
            MemoEntry::Failure => Err(()),
            MemoEntry::Success { node, end } => Ok(MatchOutcome {
                start: *end - node.span.len(),
                end: *end,
                fragments: vec![node.clone()],
            }),
        };
    }

    let rule = ctx
        .grammar
        .rule(name)
        .expect("Grammar::build guarantees every rule id resolves to a rule");
    let body = rule.expr.clone();

    let result = eval_expr(ctx, &body, position, name);
    match result {
        Ok(outcome) => {
            let span = ctx.source.slice(outcome.start, outcome.end);
            let node = AstNode::composite(
                name,
                outcome.fragments,
                ctx.source.position_at(outcome.start),
                span,
            );
            ctx.cache.insert(
                rule_id,
                position,
                MemoEntry::Success {
                    node: node.clone(),
                    end: outcome.end,
                },
            );
            Ok(MatchOutcome {
                start: outcome.start,
                end: outcome.end,
                fragments: vec![node],
            })
        }
        Err(()) => {
            ctx.cache.insert(rule_id, position, MemoEntry::Failure);
            Err(())
        }
    }
}

fn eval_builtin(ctx: &mut Ctx, name: &str, position: usize, current_rule: &str) -> Result<MatchOutcome, ()> {
    let rule_id = builtin_rule_id(ctx.grammar, name);
    if let Some(entry) = ctx.cache.get(rule_id, position) {
        return match entry {
            MemoEntry::Failure => Err(()),
            MemoEntry::Success { node, end } => Ok(MatchOutcome {
                start: *end - node.span.len(),
                end: *end,
                fragments: vec![node.clone()],
            }),
        };
    }

    let bytes = ctx.source.text.as_bytes();
    let start = skip_ascii_ws(bytes, position);

    let matched: Option<(&str, &'static str)> = match name {
        "NUMBER" => NUMBER_RE
            .find(&ctx.source.text[start..])
            .filter(|m| m.start() == 0)
            .map(|m| (m.as_str(), "Number")),
        "IDENT" => IDENT_RE
            .find(&ctx.source.text[start..])
            .filter(|m| m.start() == 0)
            .map(|m| (m.as_str(), "Identifier")),
        "STRING" => match_string_literal(ctx.source.text, start).map(|s| (s, "String")),
        other => unreachable!("not a built-in token name: {}", other),
    };

    match matched {
        Some((text, node_type)) => {
            let end = start + text.len();
            let value = if node_type == "String" {
                // Strip the surrounding quotes; the value is the raw
                // content between delimiters.
                &text[1..text.len() - 1]
            } else {
                text
            };
            let node = AstNode::leaf(node_type, value, ctx.source.position_at(start), text);
            ctx.cache.insert(
                rule_id,
                position,
                MemoEntry::Success {
                    node: node.clone(),
                    end,
                },
            );
            Ok(MatchOutcome {
                start,
                end,
                fragments: vec![node],
            })
        }
        None => {
            ctx.tracker.record(start, current_rule);
            ctx.cache.insert(rule_id, position, MemoEntry::Failure);
            Err(())
        }
    }
}

/// Scan a `STRING` token starting at a `"` or `'` byte. No escape sequence
/// is interpreted beyond recognizing `\<quote>` as not terminating the
/// literal.
fn match_string_literal(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let quote = *bytes.get(start)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let mut i = start + 1;
    loop {
        match bytes.get(i) {
            None => return None,
            Some(&b'\\') => i += 2,
            Some(&b) if b == quote => return Some(&text[start..=i]),
            Some(_) => i += 1,
        }
    }
}

fn eval_expr(ctx: &mut Ctx, expr: &PegExpr, position: usize, current_rule: &str) -> Result<MatchOutcome, ()> {
    match expr {
        PegExpr::Literal(s) => eval_literal(ctx, s, position, current_rule),
        PegExpr::RuleRef(name) => eval_rule(ctx, name, position, current_rule),
        PegExpr::Sequence(items) => eval_sequence(ctx, items, position, current_rule),
        PegExpr::Choice(items) => eval_choice(ctx, items, position, current_rule),
        PegExpr::ZeroOrMore(inner) => Ok(eval_repeat(ctx, inner, position, current_rule, 0)),
        PegExpr::OneOrMore(inner) => eval_repeat_at_least_one(ctx, inner, position, current_rule),
        PegExpr::Optional(inner) => Ok(eval_optional(ctx, inner, position, current_rule)),
        PegExpr::AndPredicate(inner) => eval_and_predicate(ctx, inner, position, current_rule),
        PegExpr::NotPredicate(inner) => eval_not_predicate(ctx, inner, position, current_rule),
    }
}

fn eval_literal(ctx: &mut Ctx, s: &str, position: usize, current_rule: &str) -> Result<MatchOutcome, ()> {
    let bytes = ctx.source.text.as_bytes();
    let start = skip_ascii_ws(bytes, position);
    if ctx.source.text[start..].as_bytes().starts_with(s.as_bytes()) {
        let end = start + s.len();
        let span = ctx.source.slice(start, end);
        let node_type = if is_punctuation(s) { "Operator" } else { "Literal" };
        let node = AstNode::leaf(node_type, span, ctx.source.position_at(start), span);
        Ok(MatchOutcome {
            start,
            end,
            fragments: vec![node],
        })
    } else {
        ctx.tracker.record(start, current_rule);
        Err(())
    }
}

fn eval_sequence(
    ctx: &mut Ctx,
    items: &[PegExpr],
    position: usize,
    current_rule: &str,
) -> Result<MatchOutcome, ()> {
    let mut cur = position;
    let mut fragments = Vec::new();
    let mut first_consuming_start = None;
    for item in items {
        let outcome = eval_expr(ctx, item, cur, current_rule)?;
        if first_consuming_start.is_none() && outcome.end > outcome.start {
            first_consuming_start = Some(outcome.start);
        }
        cur = outcome.end;
        fragments.extend(outcome.fragments);
    }
    Ok(MatchOutcome {
        start: first_consuming_start.unwrap_or(position),
        end: cur,
        fragments,
    })
}

fn eval_choice(
    ctx: &mut Ctx,
    items: &[PegExpr],
    position: usize,
    current_rule: &str,
) -> Result<MatchOutcome, ()> {
    for item in items {
        if let Ok(outcome) = eval_expr(ctx, item, position, current_rule) {
            return Ok(outcome);
        }
    }
    Err(())
}

fn eval_repeat(
    ctx: &mut Ctx,
    inner: &PegExpr,
    position: usize,
    current_rule: &str,
    min: usize,
) -> MatchOutcome {
    let mut cur = position;
    let mut fragments = Vec::new();
    let mut first_consuming_start = None;
    let mut count = 0;
    loop {
        match eval_expr(ctx, inner, cur, current_rule) {
            Ok(outcome) => {
                let zero_width = outcome.end == cur;
                if first_consuming_start.is_none() && outcome.end > outcome.start {
                    first_consuming_start = Some(outcome.start);
                }
                cur = outcome.end;
                fragments.extend(outcome.fragments);
                count += 1;
                if zero_width {
                    // An inner expression that matches empty input must not
                    // loop forever: one zero-width success terminates the
                    // repetition.
                    break;
                }
            }
            Err(()) => break,
        }
    }
    let _ = min; // zero-or-more never fails regardless of `min`; one-or-more checks separately.
    MatchOutcome {
        start: first_consuming_start.unwrap_or(position),
        end: cur,
        fragments,
    }
}

fn eval_repeat_at_least_one(
    ctx: &mut Ctx,
    inner: &PegExpr,
    position: usize,
    current_rule: &str,
) -> Result<MatchOutcome, ()> {
    let outcome = eval_repeat(ctx, inner, position, current_rule, 1);
    if outcome.fragments.is_empty() && outcome.end == position {
        // Distinguish "matched zero iterations" from "matched one
        // zero-width iteration": only the former is a OneOrMore failure.
        // A single zero-width success still counts as one iteration.
        if !matches!(eval_expr(ctx, inner, position, current_rule), Ok(_)) {
            return Err(());
        }
    }
    Ok(outcome)
}

fn eval_optional(ctx: &mut Ctx, inner: &PegExpr, position: usize, current_rule: &str) -> MatchOutcome {
    eval_expr(ctx, inner, position, current_rule).unwrap_or_else(|()| MatchOutcome::empty(position))
}

fn eval_and_predicate(
    ctx: &mut Ctx,
    inner: &PegExpr,
    position: usize,
    current_rule: &str,
) -> Result<MatchOutcome, ()> {
    eval_expr(ctx, inner, position, current_rule)?;
    Ok(MatchOutcome::empty(position))
}

fn eval_not_predicate(
    ctx: &mut Ctx,
    inner: &PegExpr,
    position: usize,
    current_rule: &str,
) -> Result<MatchOutcome, ()> {
    match eval_expr(ctx, inner, position, current_rule) {
        Ok(_) => Err(()),
        Err(()) => Ok(MatchOutcome::empty(position)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peg::notation;

    fn arithmetic_grammar() -> Grammar {
        let text = "program   <- statement+\n\
                     statement <- IDENT \"=\" expr \";\"\n\
                     expr      <- term ((\"+\" / \"-\") term)*\n\
                     term      <- factor ((\"*\" / \"/\") factor)*\n\
                     factor    <- NUMBER / IDENT / \"(\" expr \")\"\n";
        notation::parse(text).unwrap()
    }

    #[test]
    fn parses_simple_assignment() {
        let grammar = arithmetic_grammar();
        let ast = parse(&grammar, "x = 2 + 3 * 4 ;").unwrap();
        assert_eq!(ast.node_type, "program");
        assert_eq!(ast.children.len(), 1);
        assert_eq!(ast.children[0].node_type, "statement");
    }

    #[test]
    fn reports_furthest_position_on_failure() {
        let grammar = arithmetic_grammar();
        let err = parse(&grammar, "x = 2 +").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 8);
        assert!(err.deepest_rule == "term" || err.deepest_rule == "factor");
    }

    #[test]
    fn empty_source_fails_at_line_one_column_one() {
        let grammar = arithmetic_grammar();
        let err = parse(&grammar, "").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 1);
    }

    #[test]
    fn predicate_advances_position_by_zero_on_success() {
        let text = "main <- &NUMBER NUMBER\n";
        let grammar = notation::parse(text).unwrap();
        let ast = parse(&grammar, "42").unwrap();
        // The and-predicate contributes nothing; only one Number leaf.
        assert_eq!(ast.children.len(), 1);
        assert_eq!(ast.children[0].node_type, "Number");
    }

    #[test]
    fn zero_or_more_does_not_loop_on_empty_match() {
        let text = "main <- (\"a\"?)*\n";
        let grammar = notation::parse(text).unwrap();
        // Should terminate quickly rather than hang.
        let result = parse(&grammar, "");
        assert!(result.is_ok());
    }

    #[test]
    fn memoized_rule_returns_identical_result_on_repeat_lookup() {
        let grammar = arithmetic_grammar();
        let source = Source::new("x = 1 ;");
        let mut cache = Cache::new();
        let first = parse_with_cache(&grammar, &source, &mut cache).unwrap();
        let rule_id = grammar.rule_id("statement").unwrap();
        assert!(cache.get(rule_id, 0).is_some());
        let second = parse_with_cache(&grammar, &source, &mut cache).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn string_token_does_not_interpret_escapes() {
        let text = "main <- STRING\n";
        let grammar = notation::parse(text).unwrap();
        let ast = parse(&grammar, r#""a\nb""#).unwrap();
        let value = ast.children[0].value.as_deref().unwrap();
        assert_eq!(value, r"a\nb");
    }
}

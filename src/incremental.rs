//! Incremental re-parsing after a text edit.
//!
//! An edit invalidates every memo entry whose span could have overlapped
//! the edited region, and shifts the position half of every memo key that
//! lies entirely after it by the edit's length delta. The unaffected
//! entries before the edit are left untouched, so re-parsing a small,
//! localized change is proportional to the change, not to the whole
//! document — the same [`crate::interpreter::parse_with_cache`] driver is
//! then re-invoked over the adjusted cache.

use crate::ast::AstNode;
use crate::error::SourceError;
use crate::interpreter::{self, Cache, MemoEntry};
use crate::peg::Grammar;
use crate::position::Source;

/// Holds a grammar, the current source text, the most recent parse result,
/// and the packrat memo table across a sequence of edits.
pub struct IncrementalParser<'g> {
    grammar: &'g Grammar,
    text: String,
    cache: Cache,
    ast: Option<AstNode>,
}

impl<'g> IncrementalParser<'g> {
    pub fn new(grammar: &'g Grammar, text: impl Into<String>) -> Self {
        Self {
            grammar,
            text: text.into(),
            cache: Cache::new(),
            ast: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn ast(&self) -> Option<&AstNode> {
        self.ast.as_ref()
    }

    /// Parse the current text from scratch, populating the memo table for
    /// future edits.
    pub fn parse(&mut self) -> Result<&AstNode, SourceError> {
        let source = Source::new(&self.text);
        let result = interpreter::parse_with_cache(self.grammar, &source, &mut self.cache)?;
        self.ast = Some(result);
        Ok(self.ast.as_ref().unwrap())
    }

    /// Replace the byte range `start..end` of the current text with
    /// `new_text`, invalidate the memo entries the edit could have
    /// affected, shift the entries after it, and re-parse.
    pub fn apply_edit(
        &mut self,
        start: usize,
        end: usize,
        new_text: &str,
    ) -> Result<&AstNode, SourceError> {
        let delta = new_text.len() as isize - (end - start) as isize;
        self.invalidate_and_shift(start, end, delta);

        self.text.replace_range(start..end, new_text);
        self.parse()
    }

    /// Drop every memo entry whose matched span overlaps `[start, end)` —
    /// not just entries whose *start* position falls in the edited range.
    /// A rule memoized at an earlier position (the root `program` entry at
    /// position 0, for instance) can still span all the way across the
    /// edit, and returning it unchanged would silently ignore the edit.
    /// Entries positioned entirely at or after the edit's original end are
    /// shifted by `delta` instead of dropped, since they're still valid,
    /// just at a new offset.
    fn invalidate_and_shift(&mut self, start: usize, end: usize, delta: isize) {
        let mut shifted = Cache::new();
        let mut dropped = 0usize;
        for (rule_id, position) in self.cache.keys() {
            let entry = match self.cache.get(rule_id, position) {
                Some(entry) => entry.clone(),
                None => continue,
            };
            let span_end = match &entry {
                MemoEntry::Success { end, .. } => *end,
                MemoEntry::Failure => position,
            };
            if position < start && span_end <= start {
                shifted.insert(rule_id, position, entry);
            } else if position >= end {
                let new_position = (position as isize + delta) as usize;
                shifted.insert(rule_id, new_position, entry);
            } else {
                // Either starts inside the edited region, or starts before
                // it but its matched span reaches into or past it.
                dropped += 1;
            }
        }
        log::debug!(
            "edit [{}, {}) delta {}: kept {} entries, dropped {}",
            start,
            end,
            delta,
            shifted.len(),
            dropped
        );
        self.cache = shifted;
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
    fn reparses_after_a_localized_numeric_edit() {
        let grammar = arithmetic_grammar();
        let mut parser = IncrementalParser::new(&grammar, "x = 100 + 22 ;");
        parser.parse().unwrap();

        // Replace "100" with "122".
        let ast = parser.apply_edit(4, 7, "122").unwrap();
        assert_eq!(ast.node_type, "program");
        let number = ast.list_tree_with_type("Number")[0];
        assert_eq!(number.value.as_deref(), Some("122"));
        assert_eq!(parser.text(), "x = 122 + 22 ;");
    }

    #[test]
    fn edit_changes_the_returned_tree_not_a_stale_root() {
        // The root `program` entry is memoized at position 0 and spans the
        // whole document, so it overlaps every edit. A re-parse must not
        // memo-hit that stale entry and hand back the pre-edit tree.
        let grammar = arithmetic_grammar();
        let mut parser = IncrementalParser::new(&grammar, "x = 1 ;");
        parser.parse().unwrap();

        let ast = parser.apply_edit(4, 5, "2").unwrap();
        let number = ast.list_tree_with_type("Number")[0];
        assert_eq!(number.value.as_deref(), Some("2"));
        assert_eq!(ast.span, "x = 2 ;");
    }

    #[test]
    fn edit_near_the_end_does_not_invalidate_earlier_entries() {
        let grammar = arithmetic_grammar();
        let mut parser = IncrementalParser::new(&grammar, "x = 1 ;\ny = 2 ;");
        parser.parse().unwrap();

        parser.apply_edit(13, 14, "9").unwrap();
        // The table should still contain at least the entries matched
        // before the edited region (first statement).
        assert!(!parser.cache.is_empty());
    }

    #[test]
    fn repeated_edits_keep_producing_valid_parses() {
        let grammar = arithmetic_grammar();
        let mut parser = IncrementalParser::new(&grammar, "x = 1 ;");
        parser.parse().unwrap();
        parser.apply_edit(4, 5, "2").unwrap();
        let ast = parser.apply_edit(4, 5, "3").unwrap();
        assert_eq!(ast.node_type, "program");
        assert_eq!(parser.text(), "x = 3 ;");
    }
}

//! Backend configuration surface.
//!
//! `TranspileOptions` is a plain data value — the core never performs file
//! I/O or reads environment variables on its own behalf; callers are
//! responsible for loading a config file (e.g. via `serde_json`) and
//! handing the parsed struct to a backend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-target rewrite tables and defaults shared by every backend in
/// [`crate::backend`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranspileOptions {
    /// Maps a grammar-level keyword spelling (e.g. `"begin"`) to the
    /// target language's spelling (e.g. `"{"`).
    #[serde(default)]
    pub keyword_map: HashMap<String, String>,
    /// Maps a grammar-level builtin function name to the target's name.
    #[serde(default)]
    pub function_map: HashMap<String, String>,
    /// Maps a grammar-level operator spelling to the target's spelling.
    #[serde(default)]
    pub operator_map: HashMap<String, String>,
    /// Overrides the grammar's own start rule name, when a backend needs
    /// to recognize the top-level node under a different label.
    #[serde(default)]
    pub start_rule: Option<String>,
    /// Wrap emitted code in a `main`-style entry point, when the target
    /// requires one (the C and WebAssembly-text backends always do this
    /// regardless of the flag; it only affects the high-level transpiler).
    #[serde(default)]
    pub wrap_main: bool,
    /// Emit a `// line N` (or target-appropriate) comment above each
    /// statement, carrying its source position through to the output.
    #[serde(default)]
    pub source_map_comments: bool,
}

impl TranspileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyword<'a>(&'a self, grammar_spelling: &'a str) -> &'a str {
        self.keyword_map
            .get(grammar_spelling)
            .map(String::as_str)
            .unwrap_or(grammar_spelling)
    }

    pub fn function<'a>(&'a self, grammar_spelling: &'a str) -> &'a str {
        self.function_map
            .get(grammar_spelling)
            .map(String::as_str)
            .unwrap_or(grammar_spelling)
    }

    pub fn operator<'a>(&'a self, grammar_spelling: &'a str) -> &'a str {
        self.operator_map
            .get(grammar_spelling)
            .map(String::as_str)
            .unwrap_or(grammar_spelling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_spellings_pass_through_unchanged() {
        let options = TranspileOptions::new();
        assert_eq!(options.keyword("begin"), "begin");
        assert_eq!(options.operator("+"), "+");
    }

    #[test]
    fn mapped_spellings_are_rewritten() {
        let mut options = TranspileOptions::new();
        options
            .operator_map
            .insert(":=".to_string(), "=".to_string());
        assert_eq!(options.operator(":="), "=");
    }

    #[test]
    fn function_map_rewrites_call_position_names() {
        let mut options = TranspileOptions::new();
        options
            .function_map
            .insert("raiz".to_string(), "sqrt".to_string());
        assert_eq!(options.function("raiz"), "sqrt");
        assert_eq!(options.function("unmapped"), "unmapped");
    }

    #[test]
    fn round_trips_through_json() {
        let mut options = TranspileOptions::new();
        options.wrap_main = true;
        options
            .keyword_map
            .insert("begin".to_string(), "{".to_string());
        let json = serde_json::to_string(&options).unwrap();
        let back: TranspileOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.wrap_main, true);
        assert_eq!(back.keyword("begin"), "{");
    }
}

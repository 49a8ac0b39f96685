//! The PEG notation parser: turns grammar source text into a
//! compiled [`Grammar`]. Each rule occupies one logical line of the form
//! `rule_name <- pattern`; a pattern supports juxtaposition (sequence),
//! `/` (ordered choice), postfix `* + ?`, grouping `(...)`, `"..."`/`'...'`
//! literals, prefix `& !`, and bare identifiers.
//!
//! Precedence, strictest to loosest: primary < postfix < prefix < sequence
//! < choice.

use super::{Grammar, PegExpr, Rule};
use crate::error::GrammarError;
use crate::position::{Position, Source};

/// Parse PEG notation into a compiled grammar. The first rule declared
/// becomes the start rule.
pub fn parse(text: &str) -> Result<Grammar, GrammarError> {
    let source = Source::new(text);
    let tokens = lex(&source)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        source: &source,
    };
    let rules = parser.parse_rules()?;
    Grammar::build("grammar", rules, None)
}

#[derive(Debug, Clone, PartialEq)]
enum TokKind {
    Ident(String),
    Arrow,
    Slash,
    Star,
    Plus,
    Question,
    Amp,
    Bang,
    LParen,
    RParen,
    Literal(String),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokKind,
    offset: usize,
}

fn lex(source: &Source) -> Result<Vec<Token>, GrammarError> {
    let bytes = source.text.as_bytes();
    let mut i = 0usize;
    let mut tokens = Vec::new();

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        match c {
            b'<' if bytes.get(i + 1) == Some(&b'-') => {
                tokens.push(Token { kind: TokKind::Arrow, offset: start });
                i += 2;
            }
            b'/' => {
                tokens.push(Token { kind: TokKind::Slash, offset: start });
                i += 1;
            }
            b'*' => {
                tokens.push(Token { kind: TokKind::Star, offset: start });
                i += 1;
            }
            b'+' => {
                tokens.push(Token { kind: TokKind::Plus, offset: start });
                i += 1;
            }
            b'?' => {
                tokens.push(Token { kind: TokKind::Question, offset: start });
                i += 1;
            }
            b'&' => {
                tokens.push(Token { kind: TokKind::Amp, offset: start });
                i += 1;
            }
            b'!' => {
                tokens.push(Token { kind: TokKind::Bang, offset: start });
                i += 1;
            }
            b'(' => {
                tokens.push(Token { kind: TokKind::LParen, offset: start });
                i += 1;
            }
            b')' => {
                tokens.push(Token { kind: TokKind::RParen, offset: start });
                i += 1;
            }
            b'"' | b'\'' => {
                let (value, next) = lex_literal(source, i)?;
                tokens.push(Token { kind: TokKind::Literal(value), offset: start });
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let mut j = i + 1;
                while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
                    j += 1;
                }
                let name = source.text[i..j].to_string();
                tokens.push(Token { kind: TokKind::Ident(name), offset: start });
                i = j;
            }
            _ => {
                return Err(GrammarError::new(
                    source.position_at(start),
                    format!("unexpected character {:?} in grammar notation", c as char),
                ));
            }
        }
    }
    tokens.push(Token { kind: TokKind::Eof, offset: bytes.len() });
    Ok(tokens)
}

fn lex_literal(source: &Source, start: usize) -> Result<(String, usize), GrammarError> {
    let bytes = source.text.as_bytes();
    let quote = bytes[start];
    let mut i = start + 1;
    let mut value = String::new();
    loop {
        match bytes.get(i) {
            None => {
                return Err(GrammarError::new(
                    source.position_at(start),
                    "unterminated string literal".to_string(),
                ))
            }
            Some(&b) if b == quote => {
                i += 1;
                break;
            }
            Some(&b'\\') => {
                let escaped = bytes.get(i + 1).copied();
                let decoded = match escaped {
                    Some(b'"') => '"',
                    Some(b'\'') => '\'',
                    Some(b'\\') => '\\',
                    Some(b'n') => '\n',
                    Some(b't') => '\t',
                    Some(b'r') => '\r',
                    Some(other) => {
                        return Err(GrammarError::new(
                            source.position_at(i),
                            format!("invalid escape sequence '\\{}'", other as char),
                        ))
                    }
                    None => {
                        return Err(GrammarError::new(
                            source.position_at(i),
                            "dangling escape at end of literal".to_string(),
                        ))
                    }
                };
                value.push(decoded);
                i += 2;
            }
            Some(&b) => {
                value.push(b as char);
                i += 1;
            }
        }
    }
    Ok((value, i))
}

struct Parser<'t, 's> {
    tokens: &'t [Token],
    pos: usize,
    source: &'s Source<'s>,
}

impl<'t, 's> Parser<'t, 's> {
    fn peek(&self) -> &TokKind {
        &self.tokens[self.pos].kind
    }

    fn position(&self) -> Position {
        self.source.position_at(self.tokens[self.pos].offset)
    }

    fn advance(&mut self) -> TokKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn parse_rules(&mut self) -> Result<Vec<Rule>, GrammarError> {
        let mut rules = Vec::new();
        while *self.peek() != TokKind::Eof {
            rules.push(self.parse_rule()?);
        }
        if rules.is_empty() {
            return Err(GrammarError::new(
                Position::new(1, 1),
                "grammar notation declares no rules".to_string(),
            ));
        }
        Ok(rules)
    }

    fn parse_rule(&mut self) -> Result<Rule, GrammarError> {
        let name = match self.peek().clone() {
            TokKind::Ident(name) => {
                self.advance();
                name
            }
            _ => {
                return Err(GrammarError::new(
                    self.position(),
                    "expected a rule name".to_string(),
                ))
            }
        };
        if *self.peek() != TokKind::Arrow {
            return Err(GrammarError::new(
                self.position(),
                format!("expected '<-' after rule name {:?}", name),
            ));
        }
        self.advance();

        if self.at_rule_start() {
            // Empty rule body: always fails at match time.
            // `!()` composes that using only the nine declared PegExpr
            // variants — an empty Sequence always succeeds, so negating it
            // always fails, with zero width either way.
            return Ok(Rule::new(
                name,
                PegExpr::NotPredicate(Box::new(PegExpr::Sequence(Vec::new()))),
            ));
        }

        let expr = self.parse_choice()?;
        Ok(Rule::new(name, expr))
    }

    /// True when the parser is positioned at the start of the *next* rule
    /// declaration (`IDENT <-`) or at end of input — the signal that the
    /// current rule's pattern has ended. Line breaks carry no syntactic
    /// weight once tokenized; this lookahead is what makes "one rule per
    /// logical line" work without treating newlines specially.
    fn at_rule_start(&self) -> bool {
        if *self.peek() == TokKind::Eof {
            return true;
        }
        matches!(
            (&self.tokens[self.pos].kind, self.tokens.get(self.pos + 1).map(|t| &t.kind)),
            (TokKind::Ident(_), Some(TokKind::Arrow))
        )
    }

    fn parse_choice(&mut self) -> Result<PegExpr, GrammarError> {
        let mut alternatives = vec![self.parse_sequence()?];
        while *self.peek() == TokKind::Slash {
            self.advance();
            alternatives.push(self.parse_sequence()?);
        }
        if alternatives.len() == 1 {
            Ok(alternatives.pop().unwrap())
        } else {
            Ok(PegExpr::Choice(alternatives))
        }
    }

    fn parse_sequence(&mut self) -> Result<PegExpr, GrammarError> {
        let mut items = Vec::new();
        while !self.at_rule_start() && *self.peek() != TokKind::Slash && *self.peek() != TokKind::RParen {
            items.push(self.parse_prefix()?);
        }
        if items.is_empty() {
            return Err(GrammarError::new(
                self.position(),
                "expected a pattern".to_string(),
            ));
        }
        if items.len() == 1 {
            Ok(items.pop().unwrap())
        } else {
            Ok(PegExpr::Sequence(items))
        }
    }

    fn parse_prefix(&mut self) -> Result<PegExpr, GrammarError> {
        match self.peek().clone() {
            TokKind::Amp => {
                self.advance();
                self.require_operand("and-predicate '&'")?;
                Ok(PegExpr::AndPredicate(Box::new(self.parse_prefix()?)))
            }
            TokKind::Bang => {
                self.advance();
                self.require_operand("not-predicate '!'")?;
                Ok(PegExpr::NotPredicate(Box::new(self.parse_prefix()?)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn require_operand(&self, what: &str) -> Result<(), GrammarError> {
        if self.at_rule_start() || matches!(self.peek(), TokKind::Slash | TokKind::RParen | TokKind::Star | TokKind::Plus | TokKind::Question) {
            return Err(GrammarError::new(
                self.position(),
                format!("{} has no operand", what),
            ));
        }
        Ok(())
    }

    fn parse_postfix(&mut self) -> Result<PegExpr, GrammarError> {
        let primary = self.parse_primary()?;
        match self.peek() {
            TokKind::Star => {
                self.advance();
                Ok(PegExpr::ZeroOrMore(Box::new(primary)))
            }
            TokKind::Plus => {
                self.advance();
                Ok(PegExpr::OneOrMore(Box::new(primary)))
            }
            TokKind::Question => {
                self.advance();
                Ok(PegExpr::Optional(Box::new(primary)))
            }
            _ => Ok(primary),
        }
    }

    fn parse_primary(&mut self) -> Result<PegExpr, GrammarError> {
        match self.peek().clone() {
            TokKind::Literal(value) => {
                self.advance();
                Ok(PegExpr::Literal(value))
            }
            TokKind::Ident(name) => {
                self.advance();
                Ok(PegExpr::RuleRef(name))
            }
            TokKind::LParen => {
                self.advance();
                let inner = self.parse_choice()?;
                if *self.peek() != TokKind::RParen {
                    return Err(GrammarError::new(self.position(), "unclosed group: expected ')'".to_string()));
                }
                self.advance();
                Ok(inner)
            }
            TokKind::Star | TokKind::Plus | TokKind::Question => Err(GrammarError::new(
                self.position(),
                "quantifier has no operand".to_string(),
            )),
            other => Err(GrammarError::new(
                self.position(),
                format!("unexpected token {:?} in pattern", other),
            )),
        }
    }
}

//! The AST node shape — a single generic node with a string discriminator
//! rather than a closed sum type, so rule names pass through from grammar
//! to tree without a translation table. Backends depend only on the
//! string keys in [`AstNode::node_type`].

use crate::position::Position;
use ptree::TreeItem;
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// Either a rule name (composite node) or a built-in token class —
/// `"Number"`, `"Identifier"`, `"String"`, `"Operator"` (leaf nodes).
///
/// A parent node exclusively owns its children: the tree is a pure data
/// value, no shared substructure, no cycles.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AstNode {
    pub node_type: String,
    /// The matched text, present on leaf tokens and absent on composite
    /// rule nodes.
    pub value: Option<String>,
    pub children: Vec<AstNode>,
    pub position: Position,
    /// The original matched span, verbatim.
    pub span: String,
}

impl AstNode {
    pub fn new(
        node_type: impl Into<String>,
        value: Option<String>,
        children: Vec<AstNode>,
        position: Position,
        span: impl Into<String>,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            value,
            children,
            position,
            span: span.into(),
        }
    }

    /// Build a leaf node — a built-in token or a literal-derived operator.
    pub fn leaf(
        node_type: impl Into<String>,
        value: impl Into<String>,
        position: Position,
        span: impl Into<String>,
    ) -> Self {
        Self::new(node_type, Some(value.into()), Vec::new(), position, span)
    }

    /// Build a composite rule node from its sub-expressions' AST fragments.
    pub fn composite(
        rule_name: impl Into<String>,
        children: Vec<AstNode>,
        position: Position,
        span: impl Into<String>,
    ) -> Self {
        Self::new(rule_name, None, children, position, span)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl Display for AstNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({:?}) @ {}",
            self.node_type, self.value, self.position
        )
    }
}

impl TreeItem for AstNode {
    type Child = Self;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        match &self.value {
            Some(v) => write!(f, "{} {:?} @ {}", self.node_type, v, self.position),
            None => write!(f, "{} @ {}", self.node_type, self.position),
        }
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(&self.children)
    }
}

impl AstNode {
    pub fn print(&self) -> std::io::Result<()> {
        ptree::print_tree(self)
    }

    /// Search through all nested children (self included) for the first
    /// node whose type equals `node_type`.
    pub fn find_tree_with_type(&self, node_type: &str) -> Option<&AstNode> {
        if self.node_type == node_type {
            Some(self)
        } else {
            self.children
                .iter()
                .find_map(|child| child.find_tree_with_type(node_type))
        }
    }

    /// Search through all nested children and return the first match.
    pub fn find_tree<F: Fn(&AstNode) -> bool>(&self, predicate: &F) -> Option<&AstNode> {
        if predicate(self) {
            Some(self)
        } else {
            self.children.iter().find_map(|child| child.find_tree(predicate))
        }
    }

    /// Return every nested node (self included) whose type equals `node_type`.
    pub fn list_tree_with_type<'this>(&'this self, node_type: &str) -> Vec<&'this AstNode> {
        let mut found = Vec::new();
        self.walk_tree(&mut found, &|tree, list| {
            if tree.node_type == node_type {
                list.push(tree);
            }
        });
        found
    }

    pub fn get_child(&self, node_type: &str) -> Option<&AstNode> {
        self.children.iter().find(|child| child.node_type == node_type)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.node_type == node_type || self.children.iter().any(|child| child.contains(node_type))
    }

    fn walk_tree<'this, R, F: Fn(&'this Self, &mut R)>(&'this self, r: &mut R, p: &F) {
        p(self, r);
        self.children.iter().for_each(|child| child.walk_tree(r, p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(node_type: &str, value: &str) -> AstNode {
        AstNode::leaf(node_type, value, Position::new(1, 1), value)
    }

    #[test]
    fn find_tree_with_type_finds_nested_node() {
        let tree = AstNode::composite(
            "statement",
            vec![leaf("Identifier", "x"), leaf("Operator", "=")],
            Position::new(1, 1),
            "x =",
        );
        assert!(tree.find_tree_with_type("Identifier").is_some());
        assert!(tree.find_tree_with_type("Number").is_none());
    }

    #[test]
    fn list_tree_with_type_collects_every_match() {
        let tree = AstNode::composite(
            "expr",
            vec![leaf("Number", "1"), leaf("Operator", "+"), leaf("Number", "2")],
            Position::new(1, 1),
            "1 + 2",
        );
        assert_eq!(tree.list_tree_with_type("Number").len(), 2);
    }
}

//! # Group query fragments
//!
//! Solr result grouping partitions one main query by any number of
//! `group.query` fragments. Each fragment is built from a [`GroupTree`], a
//! boolean expression of `field:value` terms that may nest arbitrarily:
//!
//! ```
//! use savedsearch::group::{GroupNode, GroupTree};
//!
//! // city:Boise AND (state:Idaho OR state:Oregon)
//! let tree = GroupTree::and([
//!     GroupNode::term("city", "Boise"),
//!     GroupTree::or([GroupNode::term("state", "Idaho"), GroupNode::term("state", "Oregon")]).into(),
//! ]);
//! assert_eq!(tree.render(), "(city:Boise AND (state:Idaho OR state:Oregon))");
//! ```
//!
//! Rendering is a pure function of the tree. Fragments are collected into a
//! [`GroupQuery`] through [`GroupQuery::add_group_query`].

mod query;

pub use query::{DateFacet, GapUnit, GroupQuery};

use serde::{Deserialize, Serialize};

use crate::query::{escape, render_atom};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// One node of a group filter tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupNode {
    /// `field:value`; the value is escaped when rendered.
    Term { field: String, value: String },
    /// A fragment passed through verbatim (ranges, local params). Use sparingly.
    Raw(String),
    Tree(GroupTree),
}

impl GroupNode {
    #[inline]
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn raw(fragment: impl Into<String>) -> Self {
        Self::Raw(fragment.into())
    }

    fn render(&self) -> String {
        match self {
            Self::Term { field, value } => {
                let escaped = escape(value);
                let words: Vec<&str> = escaped.split_whitespace().collect();
                if words.is_empty() || field.trim().is_empty() {
                    String::new()
                } else {
                    render_atom(field.trim(), &words.join(" "))
                }
            }
            Self::Raw(fragment) => fragment.trim().to_string(),
            Self::Tree(tree) => tree.render(),
        }
    }
}

impl From<GroupTree> for GroupNode {
    fn from(tree: GroupTree) -> Self {
        Self::Tree(tree)
    }
}

/// A boolean subtree: children joined by one connector, optionally negated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupTree {
    pub connector: Connector,
    pub negated: bool,
    pub children: Vec<GroupNode>,
}

impl GroupTree {
    pub fn new(connector: Connector, children: impl IntoIterator<Item = GroupNode>) -> Self {
        Self {
            connector,
            negated: false,
            children: children.into_iter().collect(),
        }
    }

    #[inline]
    pub fn and(children: impl IntoIterator<Item = GroupNode>) -> Self {
        Self::new(Connector::And, children)
    }

    #[inline]
    pub fn or(children: impl IntoIterator<Item = GroupNode>) -> Self {
        Self::new(Connector::Or, children)
    }

    /// A tree holding a single `field:value` term.
    #[inline]
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::and([GroupNode::term(field, value)])
    }

    /// Flip the negation flag.
    #[inline]
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Render the tree with its own connector.
    pub fn render(&self) -> String {
        self.render_with(self.connector)
    }

    /// Render the tree, joining the top-level children with `connector`.
    /// Nested trees always use their own connector.
    ///
    /// A negated tree is always parenthesised, even with a single child, so
    /// `NOT` covers the whole group. An un-negated single child renders bare.
    ///
    /// ```
    /// use savedsearch::group::{Connector, GroupTree};
    ///
    /// let boise = GroupTree::term("city", "Boise");
    /// assert_eq!(boise.render_with(Connector::And), "city:Boise");
    /// assert_eq!(boise.negate().render_with(Connector::And), "NOT (city:Boise)");
    /// ```
    pub fn render_with(&self, connector: Connector) -> String {
        let parts: Vec<String> = self
            .children
            .iter()
            .map(GroupNode::render)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            return String::new();
        }

        let joined = parts.join(&format!(" {} ", connector.as_str()));
        if self.negated {
            format!("NOT ({joined})")
        } else if parts.len() > 1 {
            format!("({joined})")
        } else {
            joined
        }
    }
}

/// Render a complete group fragment, prefixed with a Solr tag when given.
///
/// Returns `None` for trees that render to nothing.
pub fn render_fragment(tree: &GroupTree, use_or: bool, tag: Option<&str>) -> Option<String> {
    let connector = if use_or { Connector::Or } else { tree.connector };
    let rendered = tree.render_with(connector);
    if rendered.is_empty() {
        return None;
    }

    match tag.map(sanitize_tag).filter(|tag| !tag.is_empty()) {
        Some(tag) => Some(format!("{{!tag=\"{tag}\"}} {rendered}")),
        None => Some(rendered),
    }
}

fn sanitize_tag(tag: &str) -> String {
    tag.trim().chars().filter(|ch| !matches!(ch, '"' | '{' | '}')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_term_renders_bare() {
        assert_eq!(GroupTree::term("city", "Boise").render(), "city:Boise");
    }

    #[test]
    fn multiple_children_are_parenthesised() {
        let tree = GroupTree::and([GroupNode::term("city", "Boise"), GroupNode::term("state", "Idaho")]);
        assert_eq!(tree.render(), "(city:Boise AND state:Idaho)");
    }

    #[test]
    fn nested_trees_keep_their_connector() {
        let tree = GroupTree::or([
            GroupNode::term("title", "Chef"),
            GroupTree::and([GroupNode::term("city", "Boise"), GroupNode::term("state", "Idaho")]).into(),
        ]);
        assert_eq!(tree.render(), "(title:Chef OR (city:Boise AND state:Idaho))");
    }

    #[test]
    fn deep_nesting_renders_depth_first() {
        let innermost = GroupTree::or([GroupNode::term("a", "1"), GroupNode::term("b", "2")]);
        let middle = GroupTree::and([GroupNode::term("c", "3"), innermost.into()]);
        let root = GroupTree::or([middle.into(), GroupNode::term("d", "4")]);
        assert_eq!(root.render(), "((c:3 AND (a:1 OR b:2)) OR d:4)");
    }

    #[test]
    fn negation_wraps_the_whole_tree() {
        let tree = GroupTree::and([GroupNode::term("city", "Boise"), GroupNode::term("state", "Idaho")]).negate();
        assert_eq!(tree.render(), "NOT (city:Boise AND state:Idaho)");
        assert_eq!(GroupTree::term("city", "Boise").negate().render(), "NOT (city:Boise)");
    }

    #[test]
    fn negated_subtree_inside_parent() {
        let tree = GroupTree::and([
            GroupNode::term("title", "Chef"),
            GroupTree::term("city", "Boise").negate().into(),
        ]);
        assert_eq!(tree.render(), "(title:Chef AND NOT (city:Boise))");
    }

    #[test]
    fn values_are_escaped() {
        assert_eq!(GroupTree::term("title", "C++ (Dev)").render(), "title:(C Dev)");
        assert_eq!(GroupTree::term("title", "a:b").render(), "title:a\\:b");
    }

    #[test]
    fn raw_fragments_pass_through() {
        let tree = GroupTree::and([GroupNode::raw("salary:[10 TO 20]"), GroupNode::term("city", "Boise")]);
        assert_eq!(tree.render(), "(salary:[10 TO 20] AND city:Boise)");
    }

    #[test]
    fn empty_trees_render_nothing() {
        assert_eq!(GroupTree::default().render(), "");
        assert_eq!(GroupTree::and([GroupTree::default().into()]).render(), "");
        assert_eq!(GroupTree::term("title", "+++").render(), "");
        assert!(render_fragment(&GroupTree::default(), false, Some("t")).is_none());
    }

    #[test]
    fn empty_children_do_not_leave_dangling_connectors() {
        let tree = GroupTree::and([GroupTree::default().into(), GroupNode::term("city", "Boise")]);
        assert_eq!(tree.render(), "city:Boise");
    }

    #[test]
    fn use_or_overrides_root_connector_only() {
        let tree = GroupTree::and([
            GroupNode::term("city", "Boise"),
            GroupTree::and([GroupNode::term("a", "1"), GroupNode::term("b", "2")]).into(),
        ]);
        assert_eq!(
            render_fragment(&tree, true, None).as_deref(),
            Some("(city:Boise OR (a:1 AND b:2))")
        );
        assert_eq!(
            render_fragment(&tree, false, None).as_deref(),
            Some("(city:Boise AND (a:1 AND b:2))")
        );
    }

    #[test]
    fn tags_prefix_local_params() {
        let tree = GroupTree::term("city", "Boise");
        assert_eq!(
            render_fragment(&tree, false, Some("boise")).as_deref(),
            Some("{!tag=\"boise\"} city:Boise")
        );
        assert_eq!(
            render_fragment(&tree, false, Some("  ")).as_deref(),
            Some("city:Boise")
        );
        assert_eq!(
            render_fragment(&tree, false, Some("a\"}b")).as_deref(),
            Some("{!tag=\"ab\"} city:Boise")
        );
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::Context;
use crate::error::Error;
use crate::filter::FilterExpression;
use crate::loader_tags::BlockNode;
use crate::parser::Parser;
use crate::stream::OutputStream;
use crate::value::Value;

/// Behaviour contributed by a tag's node.
pub trait TagNode: fmt::Debug + Send + Sync {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error>;

    /// Only text may precede this node in a template.
    fn must_be_first(&self) -> bool {
        false
    }

    /// Persistent nodes survive a mutating render.
    fn is_persistent(&self) -> bool {
        self.is_repeatable()
    }

    /// Repeatable nodes append their output to the preceding text on every mutating render.
    fn is_repeatable(&self) -> bool {
        false
    }

    /// Node lists owned by this node, visited when collecting blocks.
    fn child_lists(&self) -> Vec<&NodeList> {
        Vec::new()
    }

    fn as_block(&self) -> Option<&BlockNode> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextNode {
    content: String,
}

impl TextNode {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone)]
pub struct VariableNode {
    expression: FilterExpression,
}

impl VariableNode {
    pub fn new(expression: FilterExpression) -> Self {
        Self { expression }
    }

    pub fn expression(&self) -> &FilterExpression {
        &self.expression
    }
}

#[derive(Debug)]
pub enum Node {
    Text(TextNode),
    Variable(VariableNode),
    Tag(Box<dyn TagNode>),
}

impl Node {
    pub fn tag(node: impl TagNode + 'static) -> Self {
        Node::Tag(Box::new(node))
    }

    pub fn text(content: impl Into<String>) -> Self {
        Node::Text(TextNode::new(content))
    }

    pub fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        match self {
            Node::Text(text) => stream.write_str(&text.content),
            Node::Variable(var) => var.expression.render(stream, ctx).map(|_| ()),
            Node::Tag(tag) => tag.render(stream, ctx),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    pub fn must_be_first(&self) -> bool {
        matches!(self, Node::Tag(tag) if tag.must_be_first())
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Node::Tag(tag) if tag.is_persistent())
    }

    pub fn is_repeatable(&self) -> bool {
        matches!(self, Node::Tag(tag) if tag.is_repeatable())
    }
}

/// Writes `value` the way a `{{ }}` substitution does.
pub fn stream_value(
    stream: &mut OutputStream<'_>,
    value: &Value,
    ctx: &Context,
) -> Result<(), Error> {
    let mut text = value.to_safe_string();
    if ctx.autoescape() && !text.is_safe() {
        text.set_needs_escape(true);
    }
    stream.write_safe(&text)
}

/// Ordered child nodes plus whether any of them is not plain text.
#[derive(Debug, Default)]
pub struct NodeList {
    nodes: Vec<Node>,
    contains_non_text: bool,
}

impl NodeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) {
        if !node.is_text() {
            self.contains_non_text = true;
        }
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn contains_non_text(&self) -> bool {
        self.contains_non_text
    }

    pub fn first_non_text(&self) -> Option<&Node> {
        self.nodes.iter().find(|node| !node.is_text())
    }

    pub fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        for node in &self.nodes {
            node.render(stream, ctx)?;
        }
        Ok(())
    }

    /// Renders and rewrites the list in one forward pass.
    ///
    /// A node that is not persistent is folded into the preceding text node, or
    /// replaced by its output when no text precedes it. A repeatable node
    /// appends its output to the preceding text and stays in place.
    pub fn render_mutating(
        &mut self,
        stream: &mut OutputStream<'_>,
        ctx: &mut Context,
    ) -> Result<(), Error> {
        let mut idx = 0;
        while idx < self.nodes.len() {
            let mut rendered = String::new();
            {
                let mut buffer = stream.clone_into(&mut rendered);
                self.nodes[idx].render(&mut buffer, ctx)?;
            }
            stream.write_str(&rendered)?;

            let collapsible = !self.nodes[idx].is_persistent();
            let repeatable = self.nodes[idx].is_repeatable();
            let previous_text = idx > 0 && self.nodes[idx - 1].is_text();

            if (collapsible || repeatable) && previous_text {
                if let Node::Text(previous) = &mut self.nodes[idx - 1] {
                    previous.content.push_str(&rendered);
                }
                if collapsible {
                    self.nodes.remove(idx);
                    continue;
                }
            } else if collapsible {
                self.nodes[idx] = Node::text(rendered);
            }
            idx += 1;
        }
        self.contains_non_text = self.nodes.iter().any(|node| !node.is_text());
        Ok(())
    }

    /// Every block in this list, including blocks nested inside other tags.
    pub fn blocks(&self) -> Vec<&BlockNode> {
        let mut found = Vec::new();
        self.collect_blocks(&mut found);
        found
    }

    fn collect_blocks<'a>(&'a self, found: &mut Vec<&'a BlockNode>) {
        for node in &self.nodes {
            if let Node::Tag(tag) = node {
                if let Some(block) = tag.as_block() {
                    found.push(block);
                }
                for list in tag.child_lists() {
                    list.collect_blocks(found);
                }
            }
        }
    }
}

impl FromIterator<Node> for NodeList {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut list = NodeList::new();
        for node in iter {
            list.push(node);
        }
        list
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Builds the node for one `{% tag ... %}`.
///
/// `content` is the full tag content including the tag name. Factories with an
/// end tag call back into [`Parser::parse`] to consume their body.
pub trait NodeFactory: Send + Sync {
    fn get_node(&self, content: &str, parser: &mut Parser<'_>) -> Result<Node, Error>;
}

impl<F> NodeFactory for F
where
    F: Fn(&str, &mut Parser<'_>) -> Result<Node, Error> + Send + Sync,
{
    fn get_node(&self, content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
        self(content, parser)
    }
}

static SMART_SPLIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"((?:[^\s'"]*(?:(?:"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*')[^\s'"]*)+)|\S+)"#,
    )
    .expect("smart split pattern is a valid regex")
});

/// Splits on whitespace, keeping quoted runs (with escaped quotes) together.
pub fn smart_split(input: &str) -> Vec<String> {
    SMART_SPLIT_RE
        .find_iter(input)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Counter {
        persistent: bool,
        repeatable: bool,
    }

    impl TagNode for Counter {
        fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
            let n = ctx.lookup("n").as_int().unwrap_or(0) + 1;
            ctx.insert("n", n);
            stream.write_str(&n.to_string())
        }

        fn is_persistent(&self) -> bool {
            self.persistent
        }

        fn is_repeatable(&self) -> bool {
            self.repeatable
        }
    }

    fn render_mutating(list: &mut NodeList, ctx: &mut Context) -> String {
        let mut out = String::new();
        {
            let mut stream = OutputStream::new(&mut out);
            list.render_mutating(&mut stream, ctx).unwrap();
        }
        out
    }

    #[test]
    fn smart_split_keeps_quotes() {
        assert_eq!(
            smart_split(r#"with "a b" as 'c d' x"e f"y"#),
            vec!["with", "\"a b\"", "as", "'c d'", "x\"e f\"y"]
        );
        assert_eq!(
            smart_split(r#"  "esc \" quote" "#),
            vec![r#""esc \" quote""#]
        );
    }

    #[test]
    fn collapsible_nodes_reduce_to_one_text_node() {
        let mut list: NodeList = vec![
            Node::text("a"),
            Node::tag(Counter { persistent: false, repeatable: false }),
            Node::text("b"),
            Node::tag(Counter { persistent: false, repeatable: false }),
        ]
        .into_iter()
        .collect();
        let mut ctx = Context::new();
        assert_eq!(render_mutating(&mut list, &mut ctx), "a1b2");
        assert_eq!(list.len(), 1);
        assert!(!list.contains_non_text());
        assert_eq!(render_mutating(&mut list, &mut ctx), "a1b2");
    }

    #[test]
    fn leading_collapsible_node_becomes_text() {
        let mut list: NodeList = vec![Node::tag(Counter { persistent: false, repeatable: false })]
            .into_iter()
            .collect();
        let mut ctx = Context::new();
        assert_eq!(render_mutating(&mut list, &mut ctx), "1");
        assert!(matches!(list.iter().next(), Some(Node::Text(t)) if t.content() == "1"));
    }

    #[test]
    fn repeatable_nodes_stay_and_accumulate() {
        let mut list: NodeList = vec![
            Node::text("x"),
            Node::tag(Counter { persistent: true, repeatable: true }),
            Node::text("y"),
        ]
        .into_iter()
        .collect();
        let mut ctx = Context::new();
        assert_eq!(render_mutating(&mut list, &mut ctx), "x1y");
        assert_eq!(list.len(), 3);
        assert_eq!(render_mutating(&mut list, &mut ctx), "x12y");
    }
}

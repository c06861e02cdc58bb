// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::engine::Engine;
use crate::error::{Error, ErrorKind};
use crate::filter::{Filter, FilterExpression};
use crate::lexer::{Token, TokenKind};
use crate::library::Library;
use crate::node::{Node, NodeFactory, NodeList, VariableNode};

/// Builds a node tree from a token stream.
///
/// The tag and filter tables start with the engine's default libraries and
/// grow when a `{% load %}` tag opens another library mid-parse.
pub struct Parser<'e> {
    tokens: VecDeque<Token>,
    template_name: String,
    engine: &'e Engine,
    factories: HashMap<String, Arc<dyn NodeFactory>>,
    filters: HashMap<String, Arc<dyn Filter>>,
    block_names: HashSet<String>,
    extends_seen: bool,
}

impl<'e> Parser<'e> {
    pub fn new(tokens: Vec<Token>, template_name: &str, engine: &'e Engine) -> Result<Self, Error> {
        let mut parser = Self {
            tokens: tokens.into(),
            template_name: template_name.to_string(),
            engine,
            factories: HashMap::new(),
            filters: HashMap::new(),
            block_names: HashSet::new(),
            extends_seen: false,
        };
        for name in engine.default_libraries() {
            parser.load_library(name)?;
        }
        Ok(parser)
    }

    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    /// Opens a registered library and adds its tags and filters.
    pub fn load_library(&mut self, name: &str) -> Result<(), Error> {
        let library = self.engine.load_library(name)?;
        debug!(library = name, template = %self.template_name, "opening library");
        self.add_library(&library);
        Ok(())
    }

    pub fn add_library(&mut self, library: &Library) {
        for (name, factory) in library.tags() {
            self.factories.insert(name.clone(), Arc::clone(factory));
        }
        for (name, filter) in library.filters() {
            self.filters.insert(name.clone(), Arc::clone(filter));
        }
    }

    pub fn filter(&self, name: &str) -> Result<Arc<dyn Filter>, Error> {
        self.filters.get(name).cloned().ok_or_else(|| {
            Error::parse(ErrorKind::UnknownFilter, format!("Unknown filter: {name}"))
        })
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn filter_expression(&self, raw: &str) -> Result<FilterExpression, Error> {
        FilterExpression::new(raw, self)
    }

    pub fn filter_expressions<S: AsRef<str>>(
        &self,
        raws: &[S],
    ) -> Result<Vec<FilterExpression>, Error> {
        raws.iter()
            .map(|raw| self.filter_expression(raw.as_ref()))
            .collect()
    }

    /// Records a block name, failing if this template already declared it.
    pub fn claim_block_name(&mut self, name: &str) -> Result<(), Error> {
        if !self.block_names.insert(name.to_string()) {
            return Err(Error::tag_syntax(format!(
                "'block' tag with name '{name}' appears more than once"
            )));
        }
        Ok(())
    }

    /// Records an `extends` tag, failing on the second one.
    pub fn claim_extends(&mut self) -> Result<(), Error> {
        if std::mem::replace(&mut self.extends_seen, true) {
            return Err(Error::tag_syntax(
                "Extends tag may only appear once in a template.",
            ));
        }
        Ok(())
    }

    /// Error for an end tag that closed a body but does not match it.
    pub fn invalid_end_tag(&self, token: &Token, expected: &[String]) -> Error {
        Error::parse(
            ErrorKind::InvalidBlockTag,
            format!(
                "Invalid block tag: \"{}\", expected one of: ({})",
                token.content,
                expected.join(", ")
            ),
        )
        .at_line(token.line, &self.template_name)
    }

    pub fn has_next_token(&self) -> bool {
        !self.tokens.is_empty()
    }

    pub fn take_next_token(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    pub fn remove_next_token(&mut self) {
        self.tokens.pop_front();
    }

    pub fn prepend_token(&mut self, token: Token) {
        self.tokens.push_front(token);
    }

    /// Discards tokens up to and including the block tag `tag`.
    pub fn skip_past(&mut self, tag: &str) -> Result<(), Error> {
        while let Some(token) = self.tokens.pop_front() {
            if token.kind == TokenKind::Block && token.content.trim() == tag {
                return Ok(());
            }
        }
        Err(Error::parse(
            ErrorKind::UnclosedBlockTag,
            format!("No closing tag found for {tag}"),
        ))
    }

    /// Parses until a block tag named in `stop_at` (left in the stream) or the end of input.
    ///
    /// A stop tag matches on its full content or on its first word. Running out
    /// of tokens while `stop_at` is non-empty is an unclosed-tag error.
    pub fn parse(&mut self, stop_at: &[&str]) -> Result<NodeList, Error> {
        let mut list = NodeList::new();
        while let Some(token) = self.tokens.pop_front() {
            match token.kind {
                TokenKind::Text => list.push(Node::text(token.content)),
                TokenKind::Comment => {}
                TokenKind::Variable => {
                    let node = self.variable_node(&token)?;
                    list.push(node);
                }
                TokenKind::Block => {
                    let command = token.content.split_whitespace().next().unwrap_or_default();
                    if stop_at.contains(&token.content.as_str())
                        || (!command.is_empty() && stop_at.contains(&command))
                    {
                        self.prepend_token(token);
                        return Ok(list);
                    }
                    let node = self.tag_node(&token, stop_at)?;
                    if node.must_be_first() && list.contains_non_text() {
                        return Err(Error::tag_syntax(format!(
                            "Node appeared twice in template: {}",
                            token.content
                        ))
                        .at_line(token.line, &self.template_name));
                    }
                    list.push(node);
                }
            }
        }

        if !stop_at.is_empty() {
            return Err(Error::parse(
                ErrorKind::UnclosedBlockTag,
                format!(
                    "Unclosed tag in template {}. Expected one of: ({})",
                    self.template_name,
                    stop_at.join(" ")
                ),
            ));
        }
        Ok(list)
    }

    fn variable_node(&self, token: &Token) -> Result<Node, Error> {
        if token.content.is_empty() {
            let next: String = self
                .tokens
                .front()
                .map(|t| t.content.chars().take(20).collect())
                .unwrap_or_default();
            return Err(Error::parse(
                ErrorKind::EmptyVariable,
                format!("Empty variable before \"{next}\""),
            )
            .at_line(token.line, &self.template_name));
        }
        let expression = FilterExpression::new(&token.content, self)
            .map_err(|err| err.at_line(token.line, &self.template_name))?;
        Ok(Node::Variable(VariableNode::new(expression)))
    }

    fn tag_node(&mut self, token: &Token, stop_at: &[&str]) -> Result<Node, Error> {
        let Some(command) = token.content.split_whitespace().next() else {
            let message = if self.has_next_token() {
                let next: String = self
                    .tokens
                    .front()
                    .map(|t| t.content.chars().take(20).collect())
                    .unwrap_or_default();
                format!("Empty block tag before \"{next}\"")
            } else {
                "Empty block tag at end of input.".to_string()
            };
            return Err(Error::parse(ErrorKind::EmptyBlockTag, message)
                .at_line(token.line, &self.template_name));
        };

        let Some(factory) = self.factories.get(command).cloned() else {
            let mut message = format!("Unknown tag: \"{command}\"");
            if !stop_at.is_empty() {
                message.push_str(&format!(", expected one of: ({})", stop_at.join(" ")));
            }
            return Err(Error::parse(ErrorKind::InvalidBlockTag, message)
                .at_line(token.line, &self.template_name));
        };

        factory
            .get_node(&token.content, self)
            .map_err(|err| err.at_line(token.line, &self.template_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::node::TagNode;
    use crate::stream::OutputStream;
    use crate::value::Value;
    use crate::Context;

    fn engine() -> Engine {
        let lib = Library::builder()
            .tag_fn("section", |_, parser| {
                let body = parser.parse(&["endsection"])?;
                parser.remove_next_token();
                Ok(Node::tag(Section(body)))
            })
            .tag_fn("note", |_, parser| {
                parser.skip_past("endnote")?;
                Ok(Node::text(""))
            })
            .filter_fn("shout", |input, _, _, _| {
                Ok(Value::from(input.to_safe_string().as_str().to_uppercase()))
            })
            .build();
        Engine::builder()
            .library("parsertest", lib)
            .default_library("parsertest")
            .build()
    }

    #[derive(Debug)]
    struct Section(NodeList);

    impl TagNode for Section {
        fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
            stream.write_str("[")?;
            self.0.render(stream, ctx)?;
            stream.write_str("]")
        }

        fn child_lists(&self) -> Vec<&NodeList> {
            vec![&self.0]
        }
    }

    fn parse(source: &str) -> Result<NodeList, Error> {
        let engine = engine();
        let mut parser = Parser::new(tokenize(source, false), "test.html", &engine)?;
        parser.parse(&[])
    }

    fn render(list: &NodeList) -> String {
        let mut out = String::new();
        {
            let mut stream = OutputStream::new(&mut out);
            list.render(&mut stream, &mut Context::from_json(serde_json::json!({"x": "hi"})))
                .unwrap();
        }
        out
    }

    #[test]
    fn literal_text_is_a_single_text_node() {
        let list = parse("no syntax here").unwrap();
        assert_eq!(list.len(), 1);
        assert!(!list.contains_non_text());
        assert_eq!(render(&list), "no syntax here");
    }

    #[test]
    fn nested_bodies() {
        let list = parse("a{% section %}b{{ x|shout }}{% section %}c{% endsection %}{% endsection %}d")
            .unwrap();
        assert_eq!(render(&list), "a[bHI[c]]d");
    }

    #[test]
    fn skip_past_discards_body() {
        let list = parse("a{% note %}{% anything %}{{ }}{% endnote %}b").unwrap();
        assert_eq!(render(&list), "ab");
    }

    #[test]
    fn unclosed_tags_fail() {
        let err = parse("{% section %}body").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnclosedBlockTag);
        assert!(err.to_string().contains("Expected one of: (endsection)"));
    }

    #[test]
    fn unknown_tags_fail_with_location() {
        let err = parse("line one\n{% nosuchtag %}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidBlockTag);
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("Unknown tag: \"nosuchtag\", line 2, test.html"));

        let err = parse("{% section %}{% nosuchtag %}{% endsection %}").unwrap_err();
        assert!(err.to_string().contains("expected one of: (endsection)"));
    }

    #[test]
    fn empty_variables_and_tags_fail() {
        let err = parse("{{ }}after").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyVariable);
        assert!(err.to_string().contains("Empty variable before \"after\""));

        let err = parse("{% %}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyBlockTag);
    }

    #[test]
    fn filter_errors_are_located() {
        let err = parse("\n\n{{ x|nope }}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownFilter);
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn block_names_are_claimed_once() {
        let engine = engine();
        let mut parser = Parser::new(Vec::new(), "t", &engine).unwrap();
        parser.claim_block_name("content").unwrap();
        let err = parser.claim_block_name("content").unwrap_err();
        assert!(err.to_string().contains("appears more than once"));
    }
}

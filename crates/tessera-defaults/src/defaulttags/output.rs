// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Tags that post-process or re-escape the output of their body.

use once_cell::sync::Lazy;
use regex::Regex;
use tessera_engine::{
    smart_split, Context, Error, FilterExpression, Node, NodeList, OutputStream, Parser, TagNode,
    Value,
};

use super::parse_body;

static BETWEEN_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r">\s+<").expect("whitespace between tags regex"));

/// Renders `nodes` into a string using `stream`'s escaping policy.
fn render_body(
    nodes: &NodeList,
    stream: &OutputStream<'_>,
    ctx: &mut Context,
) -> Result<String, Error> {
    let mut out = String::new();
    {
        let mut buffer = stream.clone_into(&mut out);
        nodes.render(&mut buffer, ctx)?;
    }
    Ok(out)
}

/// `{% autoescape on|off %}...{% endautoescape %}`.
#[derive(Debug)]
pub struct AutoescapeNode {
    autoescape: bool,
    nodes: NodeList,
}

impl AutoescapeNode {
    pub fn is_on(&self) -> bool {
        self.autoescape
    }
}

impl TagNode for AutoescapeNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        let previous = ctx.autoescape();
        ctx.set_autoescape(self.autoescape);
        let result = self.nodes.render(stream, ctx);
        ctx.set_autoescape(previous);
        result
    }

    fn child_lists(&self) -> Vec<&NodeList> {
        vec![&self.nodes]
    }
}

pub(crate) fn autoescape_factory(content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let parts = smart_split(content);
    let [_, state] = parts.as_slice() else {
        return Err(Error::tag_syntax("autoescape takes two arguments."));
    };
    let autoescape = match state.as_str() {
        "on" => true,
        "off" => false,
        _ => return Err(Error::tag_syntax("argument must be 'on' or 'off'")),
    };
    let nodes = parse_body(parser, "endautoescape")?;
    Ok(Node::tag(AutoescapeNode { autoescape, nodes }))
}

/// `{% filter name|other %}...{% endfilter %}` pipes its rendered body
/// through a filter chain.
#[derive(Debug)]
pub struct FilterNode {
    expression: FilterExpression,
    nodes: NodeList,
}

impl FilterNode {
    const BODY: &'static str = "var";
}

impl TagNode for FilterNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        let body = render_body(&self.nodes, stream, ctx)?;
        ctx.scoped(|ctx| {
            ctx.insert(Self::BODY, Value::safe(body));
            self.expression.render(stream, ctx).map(drop)
        })
    }

    fn child_lists(&self) -> Vec<&NodeList> {
        vec![&self.nodes]
    }
}

pub(crate) fn filter_factory(content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let chain = content
        .split_whitespace()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let expression = parser.filter_expression(&format!("{}|{chain}", FilterNode::BODY))?;
    if expression
        .filters()
        .iter()
        .any(|name| *name == "safe" || *name == "escape")
    {
        return Err(Error::tag_syntax("Use the \"autoescape\" tag instead."));
    }
    let nodes = parse_body(parser, "endfilter")?;
    Ok(Node::tag(FilterNode { expression, nodes }))
}

/// Removes whitespace between HTML tags in its body.
#[derive(Debug)]
pub struct SpacelessNode {
    nodes: NodeList,
}

impl SpacelessNode {
    fn strip_spaces_between_tags(input: &str) -> String {
        BETWEEN_TAGS.replace_all(input.trim(), "><").into_owned()
    }
}

impl TagNode for SpacelessNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        let body = render_body(&self.nodes, stream, ctx)?;
        stream.write_str(&Self::strip_spaces_between_tags(&body))
    }

    fn child_lists(&self) -> Vec<&NodeList> {
        vec![&self.nodes]
    }
}

pub(crate) fn spaceless_factory(_content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let nodes = parse_body(parser, "endspaceless")?;
    Ok(Node::tag(SpacelessNode { nodes }))
}

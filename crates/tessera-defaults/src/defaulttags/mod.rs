// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The `defaulttags` library.

mod for_loop;
mod if_tag;
mod output;

pub use for_loop::ForNode;
pub use if_tag::IfNode;
pub use output::{AutoescapeNode, FilterNode, SpacelessNode};

use tessera_engine::{
    smart_split, Context, Error, FilterExpression, Library, Node, NodeList, OutputStream, Parser,
    TagNode,
};

pub fn library() -> Library {
    Library::builder()
        .tag_fn("autoescape", output::autoescape_factory)
        .tag_fn("comment", comment_factory)
        .tag_fn("filter", output::filter_factory)
        .tag_fn("firstof", firstof_factory)
        .tag_fn("for", for_loop::for_factory)
        .tag_fn("if", if_tag::if_factory)
        .tag_fn("load", load_factory)
        .tag_fn("spaceless", output::spaceless_factory)
        .tag_fn("templatetag", templatetag_factory)
        .tag_fn("with", with_factory)
        .build()
}

/// Parses up to `end` and consumes the end tag.
pub(crate) fn parse_body(parser: &mut Parser<'_>, end: &str) -> Result<NodeList, Error> {
    let nodes = parser.parse(&[end])?;
    parser.remove_next_token();
    Ok(nodes)
}

fn comment_factory(_content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    parser.skip_past("endcomment")?;
    Ok(Node::text(""))
}

fn load_factory(content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let mut parts = content.split_whitespace();
    let tag = parts.next().unwrap_or("load");
    let names: Vec<&str> = parts.collect();
    if names.is_empty() {
        return Err(Error::tag_syntax(format!("{tag} expects at least one argument")));
    }
    for name in names {
        parser.load_library(name)?;
    }
    Ok(Node::text(""))
}

/// `{% templatetag openblock %}` and friends.
#[derive(Debug)]
pub struct TemplateTagNode {
    output: &'static str,
}

fn template_tag_output(name: &str) -> Option<&'static str> {
    Some(match name {
        "openblock" => "{%",
        "closeblock" => "%}",
        "openvariable" => "{{",
        "closevariable" => "}}",
        "openbrace" => "{",
        "closebrace" => "}",
        "opencomment" => "{#",
        "closecomment" => "#}",
        _ => return None,
    })
}

impl TagNode for TemplateTagNode {
    fn render(&self, stream: &mut OutputStream<'_>, _ctx: &mut Context) -> Result<(), Error> {
        stream.write_str(self.output)
    }
}

fn templatetag_factory(content: &str, _parser: &mut Parser<'_>) -> Result<Node, Error> {
    let parts = smart_split(content);
    let Some(name) = parts.get(1) else {
        return Err(Error::tag_syntax("'templatetag' statement takes one argument"));
    };
    let output = template_tag_output(name).ok_or_else(|| Error::tag_syntax("Not a template tag"))?;
    Ok(Node::tag(TemplateTagNode { output }))
}

/// Renders the first truthy expression.
#[derive(Debug)]
pub struct FirstOfNode {
    expressions: Vec<FilterExpression>,
}

impl TagNode for FirstOfNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        for expression in &self.expressions {
            if expression.is_true(ctx)? {
                expression.render(stream, ctx)?;
                break;
            }
        }
        Ok(())
    }
}

fn firstof_factory(content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let parts = smart_split(content);
    let Some((_, args)) = parts.split_first().filter(|(_, args)| !args.is_empty()) else {
        return Err(Error::tag_syntax("firstof expects at least one argument"));
    };
    Ok(Node::tag(FirstOfNode {
        expressions: parser.filter_expressions(args)?,
    }))
}

/// `{% with expr as name %}...{% endwith %}`.
#[derive(Debug)]
pub struct WithNode {
    expression: FilterExpression,
    name: String,
    nodes: NodeList,
}

impl TagNode for WithNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        let value = self.expression.resolve_value(ctx)?;
        ctx.scoped(|ctx| {
            ctx.insert(self.name.as_str(), value);
            self.nodes.render(stream, ctx)
        })
    }

    fn child_lists(&self) -> Vec<&NodeList> {
        vec![&self.nodes]
    }
}

fn with_factory(content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let parts = smart_split(content);
    let [tag, expression, keyword, name] = parts.as_slice() else {
        return Err(Error::tag_syntax(
            "with expected format is 'value as name'",
        ));
    };
    if keyword != "as" {
        return Err(Error::tag_syntax(format!(
            "{tag} expected format is 'value as name'"
        )));
    }
    let expression = parser.filter_expression(expression)?;
    let nodes = parse_body(parser, "endwith")?;
    Ok(Node::tag(WithNode {
        expression,
        name: name.clone(),
        nodes,
    }))
}

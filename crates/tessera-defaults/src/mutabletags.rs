// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The `mutabletags` library, for templates created with
//! [`Engine::new_mutable_template`](tessera_engine::Engine::new_mutable_template).
//!
//! A mutating render folds every ordinary node into the text before it, so a
//! second render replays the first render's output. `raw` and `repeater`
//! are the exceptions.

use tessera_engine::{Context, Error, Library, Node, NodeList, OutputStream, Parser, TagNode};

use crate::defaulttags::parse_body;

pub fn library() -> Library {
    Library::builder()
        .tag_fn("raw", raw_factory)
        .tag_fn("repeater", repeater_factory)
        .build()
}

fn render_static(
    nodes: &NodeList,
    stream: &mut OutputStream<'_>,
    ctx: &mut Context,
) -> Result<(), Error> {
    let mutating = ctx.is_mutating();
    ctx.set_mutating(false);
    let result = nodes.render(stream, ctx);
    ctx.set_mutating(mutating);
    result
}

/// Stays in the tree and renders its body afresh on every pass.
#[derive(Debug)]
pub struct RawNode {
    nodes: NodeList,
}

impl TagNode for RawNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        render_static(&self.nodes, stream, ctx)
    }

    fn is_persistent(&self) -> bool {
        true
    }

    fn child_lists(&self) -> Vec<&NodeList> {
        vec![&self.nodes]
    }
}

fn raw_factory(_content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let nodes = parse_body(parser, "endraw")?;
    Ok(Node::tag(RawNode { nodes }))
}

/// Appends its output to the preceding text on every pass, accumulating
/// one copy per render.
#[derive(Debug)]
pub struct RepeaterNode {
    nodes: NodeList,
}

impl TagNode for RepeaterNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        render_static(&self.nodes, stream, ctx)
    }

    fn is_repeatable(&self) -> bool {
        true
    }

    fn child_lists(&self) -> Vec<&NodeList> {
        vec![&self.nodes]
    }
}

fn repeater_factory(_content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let nodes = parse_body(parser, "endrepeater")?;
    Ok(Node::tag(RepeaterNode { nodes }))
}

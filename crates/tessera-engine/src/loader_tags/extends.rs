// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::block::{BlockContext, BlockNode};
use super::template_engine;
use crate::context::Context;
use crate::engine::WeakEngine;
use crate::error::Error;
use crate::filter::FilterExpression;
use crate::node::{smart_split, Node, NodeList, TagNode};
use crate::parser::Parser;
use crate::render_context::NodeId;
use crate::stream::OutputStream;
use crate::value::Value;
use crate::Template;

/// `{% extends "parent" %}` plus everything after it in the template.
#[derive(Debug)]
pub struct ExtendsNode {
    parent: FilterExpression,
    nodes: NodeList,
    blocks: HashMap<String, BlockNode>,
    engine: WeakEngine,
}

impl ExtendsNode {
    pub fn parent_expression(&self) -> &FilterExpression {
        &self.parent
    }

    /// Blocks this template overrides, by name.
    pub fn blocks(&self) -> &HashMap<String, BlockNode> {
        &self.blocks
    }

    fn parent_template(&self, ctx: &mut Context) -> Result<Arc<Template>, Error> {
        let name = match self.parent.resolve_value(ctx)? {
            Value::Template(template) => return Ok(template),
            other => other.to_safe_string().into_string(),
        };
        let engine = template_engine(&self.engine)?;
        debug!(parent = %name, "resolving parent template");
        engine.load_by_name(&name).map_err(Error::at_render)
    }
}

impl TagNode for ExtendsNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        let parent = self.parent_template(ctx)?;
        let max_depth = template_engine(&self.engine)?.max_depth();
        ctx.enter_template(parent.name(), max_depth)?;

        let parent_blocks = parent.blocks();
        let parent_is_root = parent
            .nodes()
            .first_non_text()
            .is_some_and(|node| !node.must_be_first());
        ctx.render_context_mut()
            .with_data(NodeId::BLOCK_CONTEXT, |blocks: &mut BlockContext| {
                blocks.add_blocks(self.blocks.values());
                if parent_is_root {
                    blocks.add_blocks(parent_blocks.iter().copied());
                }
            });

        let result = parent.render_nested(stream, ctx);

        ctx.render_context_mut()
            .with_data(NodeId::BLOCK_CONTEXT, |blocks: &mut BlockContext| {
                blocks.remove(parent_blocks.iter().copied());
            });
        ctx.exit_template();
        result
    }

    fn must_be_first(&self) -> bool {
        true
    }

    fn child_lists(&self) -> Vec<&NodeList> {
        vec![&self.nodes]
    }
}

pub(crate) fn extends_factory(content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let parts = smart_split(content);
    let [_, parent] = parts.as_slice() else {
        return Err(Error::tag_syntax("Error: Extends tag takes only one argument"));
    };
    let parent = parser.filter_expression(parent)?;
    let nodes = parser.parse(&[])?;
    parser.claim_extends()?;

    let blocks: HashMap<String, BlockNode> = nodes
        .blocks()
        .into_iter()
        .map(|block| (block.name().to_string(), block.clone()))
        .collect();
    Ok(Node::tag(ExtendsNode {
        parent,
        nodes,
        blocks,
        engine: parser.engine().downgrade(),
    }))
}

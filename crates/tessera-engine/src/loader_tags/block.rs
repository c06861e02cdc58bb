// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::node::{Node, NodeList, TagNode};
use crate::parser::Parser;
use crate::render_context::NodeId;
use crate::safestring::SafeString;
use crate::stream::{Escape, OutputStream};
use crate::value::{Object, Value};

/// `{% block name %}...{% endblock %}`.
///
/// Clones share the body and the identity of the parsed block, which is what
/// the inheritance stack stores.
#[derive(Debug, Clone)]
pub struct BlockNode {
    id: NodeId,
    name: String,
    nodes: Arc<NodeList>,
}

impl BlockNode {
    pub fn new(name: impl Into<String>, nodes: NodeList) -> Self {
        Self {
            id: NodeId::next(),
            name: name.into(),
            nodes: Arc::new(nodes),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &NodeList {
        &self.nodes
    }

    fn render_block(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        let escaper = stream.escaper();
        ctx.scoped(|ctx| {
            let overriding = ctx
                .render_context_mut()
                .get_mut::<BlockContext>(NodeId::BLOCK_CONTEXT)
                .filter(|blocks| !blocks.is_empty())
                .map(|blocks| blocks.pop(&self.name));

            let Some(popped) = overriding else {
                ctx.insert("block", BlockVariable::value(self.clone(), escaper));
                return self.nodes.render(stream, ctx);
            };

            let active = popped.clone().unwrap_or_else(|| self.clone());
            ctx.insert("block", BlockVariable::value(active.clone(), escaper));
            let result = active.nodes.render(stream, ctx);
            if let Some(popped) = popped {
                ctx.render_context_mut()
                    .with_data(NodeId::BLOCK_CONTEXT, |blocks: &mut BlockContext| {
                        blocks.push(&self.name, popped);
                    });
            }
            result
        })
    }

    /// Output of the next ancestor override of this block, marked safe.
    fn render_super(
        &self,
        escaper: &Arc<dyn Escape>,
        ctx: &mut Context,
    ) -> Result<SafeString, Error> {
        let has_ancestor = ctx
            .render_context()
            .get::<BlockContext>(NodeId::BLOCK_CONTEXT)
            .is_some_and(|blocks| blocks.get_block(&self.name).is_some());
        if !has_ancestor {
            return Ok(SafeString::default());
        }
        let mut content = String::new();
        {
            let mut stream = OutputStream::with_escaper(&mut content, Arc::clone(escaper));
            self.render_block(&mut stream, ctx)?;
        }
        Ok(SafeString::safe(content))
    }
}

impl TagNode for BlockNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        self.render_block(stream, ctx)
    }

    fn child_lists(&self) -> Vec<&NodeList> {
        vec![&self.nodes]
    }

    fn as_block(&self) -> Option<&BlockNode> {
        Some(self)
    }
}

/// The `block` variable bound inside a block body.
#[derive(Debug)]
struct BlockVariable {
    block: BlockNode,
    escaper: Arc<dyn Escape>,
}

impl BlockVariable {
    fn value(block: BlockNode, escaper: Arc<dyn Escape>) -> Value {
        Value::Object(Arc::new(Self { block, escaper }))
    }
}

impl Object for BlockVariable {
    fn attribute(&self, name: &str, ctx: &mut Context) -> Result<Value, Error> {
        match name {
            "super" => self.block.render_super(&self.escaper, ctx).map(Value::String),
            "name" => Ok(Value::from(self.block.name())),
            _ => Ok(Value::Invalid),
        }
    }
}

/// Override stacks per block name for one render pass.
///
/// The last entry of a stack is the most derived override still pending.
#[derive(Debug, Clone, Default)]
pub struct BlockContext {
    blocks: HashMap<String, Vec<BlockNode>>,
}

impl BlockContext {
    /// Adds `blocks` beneath the overrides already registered.
    pub fn add_blocks<'a>(&mut self, blocks: impl IntoIterator<Item = &'a BlockNode>) {
        for block in blocks {
            self.blocks
                .entry(block.name.clone())
                .or_default()
                .insert(0, block.clone());
        }
    }

    pub fn get_block(&self, name: &str) -> Option<&BlockNode> {
        self.blocks.get(name).and_then(|stack| stack.last())
    }

    pub fn pop(&mut self, name: &str) -> Option<BlockNode> {
        self.blocks.get_mut(name).and_then(Vec::pop)
    }

    pub fn push(&mut self, name: &str, block: BlockNode) {
        self.blocks.entry(name.to_string()).or_default().push(block);
    }

    /// Drops the given blocks, matched by identity.
    pub fn remove<'a>(&mut self, blocks: impl IntoIterator<Item = &'a BlockNode>) {
        for block in blocks {
            if let Some(stack) = self.blocks.get_mut(&block.name) {
                if let Some(pos) = stack.iter().position(|b| b.id == block.id) {
                    stack.remove(pos);
                }
                if stack.is_empty() {
                    self.blocks.remove(&block.name);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.values().all(Vec::is_empty)
    }
}

pub(crate) fn block_factory(content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    let [_, name] = parts[..] else {
        return Err(Error::tag_syntax("block tag takes one argument"));
    };
    parser.claim_block_name(name)?;

    let nodes = parser.parse(&["endblock"])?;
    let acceptable = ["endblock".to_string(), format!("endblock {name}")];
    if let Some(end) = parser.take_next_token() {
        if !acceptable.contains(&end.content) {
            return Err(parser.invalid_end_tag(&end, &acceptable));
        }
    }
    Ok(Node::tag(BlockNode::new(name, nodes)))
}

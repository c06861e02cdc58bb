// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Template inheritance and inclusion: `block`, `extends` and `include`.

mod block;
mod extends;

use std::sync::Arc;

pub use block::{BlockContext, BlockNode};
pub use extends::ExtendsNode;

use crate::context::Context;
use crate::engine::{Engine, WeakEngine};
use crate::error::{Error, ErrorKind};
use crate::filter::FilterExpression;
use crate::library::Library;
use crate::node::{smart_split, Node, TagNode};
use crate::parser::Parser;
use crate::render_context::NodeId;
use crate::stream::OutputStream;
use crate::value::Value;
use crate::variable::unescape_string_literal;
use crate::Template;

/// The `loadertags` library every engine registers.
pub fn library() -> Library {
    Library::builder()
        .tag_fn("block", block::block_factory)
        .tag_fn("extends", extends::extends_factory)
        .tag_fn("include", include_factory)
        .build()
}

fn template_engine(engine: &WeakEngine) -> Result<Engine, Error> {
    engine
        .upgrade()
        .ok_or_else(|| Error::render(ErrorKind::TagSyntax, "Cannot load template."))
}

/// Renders `template` against the caller's context in its own render frame.
fn render_included(
    template: &Template,
    engine: &Engine,
    stream: &mut OutputStream<'_>,
    ctx: &mut Context,
) -> Result<(), Error> {
    ctx.enter_template(template.name(), engine.max_depth())?;
    let result = template.render_isolated(stream, ctx);
    ctx.exit_template();
    result
}

/// `{% include some_variable %}`, resolved on every render.
#[derive(Debug)]
pub struct IncludeNode {
    expression: FilterExpression,
    engine: WeakEngine,
}

impl TagNode for IncludeNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        let engine = template_engine(&self.engine)?;
        let template = match self.expression.resolve_value(ctx)? {
            Value::Template(template) => template,
            other => engine
                .load_by_name(other.to_safe_string().as_str())
                .map_err(Error::at_render)?,
        };
        render_included(&template, &engine, stream, ctx)
    }
}

/// `{% include "name" %}` with a literal name.
#[derive(Debug)]
pub struct ConstantIncludeNode {
    name: String,
    engine: WeakEngine,
}

impl ConstantIncludeNode {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TagNode for ConstantIncludeNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        let engine = template_engine(&self.engine)?;
        let template: Arc<Template> = engine
            .load_by_name(&self.name)
            .map_err(Error::at_render)?;
        render_included(&template, &engine, stream, ctx)?;
        if ctx.render_context().contains(NodeId::BLOCK_CONTEXT) {
            let included = template.blocks();
            ctx.render_context_mut()
                .with_data(NodeId::BLOCK_CONTEXT, |blocks: &mut BlockContext| {
                    blocks.remove(included.iter().copied());
                });
        }
        Ok(())
    }
}

fn include_factory(content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let parts = smart_split(content);
    let [_, name] = parts.as_slice() else {
        return Err(Error::tag_syntax("Error: Include tag takes only one argument"));
    };
    let engine = parser.engine().downgrade();
    let quoted = name.len() >= 2
        && ((name.starts_with('"') && name.ends_with('"'))
            || (name.starts_with('\'') && name.ends_with('\'')));
    if quoted {
        return Ok(Node::tag(ConstantIncludeNode {
            name: unescape_string_literal(name),
            engine,
        }));
    }
    Ok(Node::tag(IncludeNode {
        expression: parser.filter_expression(name)?,
        engine,
    }))
}

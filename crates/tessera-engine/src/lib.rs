#![forbid(unsafe_code)]
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Django-style text templates for Rust.
//!
//! Source text is tokenized by [`lexer`], turned into a [`NodeList`] by the
//! [`Parser`] using the tags and filters of the loaded [`Library`] values, and
//! rendered against a [`Context`]. Templates are compiled and looked up through
//! an [`Engine`]:
//!
//! ```
//! use tessera_engine::{Context, Engine};
//!
//! let engine = Engine::default();
//! let template = engine.new_template("Hello, {{ name }}!", "greeting").unwrap();
//! let mut ctx = Context::from_json(serde_json::json!({"name": "<b>World</b>"}));
//! assert_eq!(template.render(&mut ctx).unwrap(), "Hello, &lt;b&gt;World&lt;/b&gt;!");
//! ```
//!
//! Template inheritance (`block`, `extends`, `include`) is always available;
//! the general purpose tags and filters live in the `tessera-defaults` crate.

mod context;
mod engine;
mod error;
mod filter;
pub mod lexer;
mod library;
pub mod loader;
pub mod loader_tags;
mod node;
mod parser;
mod render_context;
mod safestring;
mod stream;
pub mod telemetry;
mod value;
mod variable;

pub use context::{Context, UrlType};
pub use engine::{Engine, EngineBuilder, EngineOptions, WeakEngine, DEFAULT_MAX_DEPTH, LOADER_TAGS};
pub use error::{Error, ErrorKind};
pub use filter::{Filter, FilterExpression, SafeFilter};
pub use lexer::{tokenize, Token, TokenKind};
pub use library::{Library, LibraryBuilder};
pub use loader::{
    CachingTemplateLoader, FileSystemTemplateLoader, InMemoryTemplateLoader, TemplateLoader,
};
pub use loader_tags::BlockNode;
pub use node::{smart_split, stream_value, Node, NodeFactory, NodeList, TagNode, TextNode, VariableNode};
pub use parser::Parser;
pub use render_context::{NodeId, RenderContext};
pub use safestring::{SafeString, Safety};
pub use stream::{Escape, HtmlEscaper, NoEscaper, OutputStream};
pub use value::{Object, Value};
pub use variable::{unescape_string_literal, Variable};

use std::fmt;
use std::time::Instant;

use tracing::debug;

/// A compiled template.
///
/// The node tree is immutable after compilation, so one template can be
/// rendered from several threads as long as each render has its own [`Context`].
pub struct Template {
    name: String,
    source: String,
    nodes: NodeList,
    engine: WeakEngine,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish()
    }
}

impl Template {
    pub(crate) fn new(name: &str, source: &str, nodes: NodeList, engine: WeakEngine) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            nodes,
            engine,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nodes(&self) -> &NodeList {
        &self.nodes
    }

    /// The engine that compiled this template, if it is still alive.
    pub fn engine(&self) -> Option<Engine> {
        self.engine.upgrade()
    }

    /// Every block in the template, including blocks nested in other tags.
    pub fn blocks(&self) -> Vec<&BlockNode> {
        self.nodes.blocks()
    }

    /// Renders into a new string.
    pub fn render(&self, ctx: &mut Context) -> Result<String, Error> {
        let mut out = String::new();
        {
            let mut stream = OutputStream::new(&mut out);
            self.render_to(&mut stream, ctx)?;
        }
        Ok(out)
    }

    /// Renders into `stream`. Output written before a failure stays in the stream.
    pub fn render_to(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        let started = Instant::now();
        ctx.clear_external_media();
        let result = self.render_isolated(stream, ctx);
        telemetry::record_render(&self.name, self.source.len(), started.elapsed(), result.is_ok());
        if let Err(err) = &result {
            debug!(template = %self.name, error = %err, "render failed");
        }
        result
    }

    /// Renders in a fresh render-context frame without touching per-call context state.
    pub(crate) fn render_isolated(
        &self,
        stream: &mut OutputStream<'_>,
        ctx: &mut Context,
    ) -> Result<(), Error> {
        ctx.render_context_mut().push();
        let result = self.render_nested(stream, ctx);
        ctx.render_context_mut().pop();
        result
    }

    /// Renders the node list in the caller's render-context frame.
    pub(crate) fn render_nested(
        &self,
        stream: &mut OutputStream<'_>,
        ctx: &mut Context,
    ) -> Result<(), Error> {
        self.nodes
            .render(stream, ctx)
            .map_err(|err| err.in_template(&self.name))
    }
}

/// A template whose node list is rewritten by every render.
///
/// Nodes that are not persistent are folded into the neighbouring text after
/// their first render, so later renders only re-evaluate the persistent ones.
#[derive(Debug)]
pub struct MutableTemplate {
    template: Template,
}

impl MutableTemplate {
    pub(crate) fn new(template: Template) -> Self {
        Self { template }
    }

    pub fn name(&self) -> &str {
        self.template.name()
    }

    pub fn source(&self) -> &str {
        self.template.source()
    }

    pub fn nodes(&self) -> &NodeList {
        self.template.nodes()
    }

    pub fn render(&mut self, ctx: &mut Context) -> Result<String, Error> {
        let mut out = String::new();
        {
            let mut stream = OutputStream::new(&mut out);
            self.render_to(&mut stream, ctx)?;
        }
        Ok(out)
    }

    /// Renders with the context flagged as mutating for the duration of the call.
    pub fn render_to(
        &mut self,
        stream: &mut OutputStream<'_>,
        ctx: &mut Context,
    ) -> Result<(), Error> {
        let started = Instant::now();
        let was_mutating = ctx.is_mutating();
        ctx.set_mutating(true);
        ctx.clear_external_media();
        ctx.render_context_mut().push();
        let result = self
            .template
            .nodes
            .render_mutating(stream, ctx)
            .map_err(|err| err.in_template(&self.template.name));
        ctx.render_context_mut().pop();
        ctx.set_mutating(was_mutating);
        telemetry::record_render(
            &self.template.name,
            self.template.source.len(),
            started.elapsed(),
            result.is_ok(),
        );
        result
    }
}

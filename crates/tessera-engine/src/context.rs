// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::error::{Error, ErrorKind};
use crate::render_context::RenderContext;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlType {
    #[default]
    Absolute,
    Relative,
}

/// Variable scopes and per-render settings for one render call.
///
/// Lookups scan frames innermost first. The base frame is never popped.
#[derive(Debug)]
pub struct Context {
    frames: Vec<HashMap<String, Value>>,
    autoescape: bool,
    mutating: bool,
    url_type: UrlType,
    relative_media_path: String,
    external_media: Vec<(String, String)>,
    render_context: RenderContext,
    depth: usize,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    pub fn from_map(values: HashMap<String, Value>) -> Self {
        Self {
            frames: vec![values],
            autoescape: true,
            mutating: false,
            url_type: UrlType::Absolute,
            relative_media_path: String::new(),
            external_media: Vec::new(),
            render_context: RenderContext::new(),
            depth: 0,
        }
    }

    /// Builds a context from a JSON object; any other JSON value gives an empty context.
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Object(map) => Self::from_map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
            _ => Self::new(),
        }
    }

    pub fn lookup(&self, name: &str) -> Value {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Binds `name` in the innermost frame.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value.into());
        }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Pushes a frame, runs `f`, and pops the frame again whatever `f` returns.
    pub fn scoped<R>(&mut self, f: impl FnOnce(&mut Context) -> R) -> R {
        self.push();
        let result = f(self);
        self.pop();
        result
    }

    /// Frame `depth` levels out from the innermost one.
    pub fn stack_frame(&self, depth: usize) -> Option<&HashMap<String, Value>> {
        let len = self.frames.len();
        if depth >= len {
            return None;
        }
        self.frames.get(len - 1 - depth)
    }

    pub fn autoescape(&self) -> bool {
        self.autoescape
    }

    pub fn set_autoescape(&mut self, autoescape: bool) {
        self.autoescape = autoescape;
    }

    pub fn is_mutating(&self) -> bool {
        self.mutating
    }

    pub fn set_mutating(&mut self, mutating: bool) {
        self.mutating = mutating;
    }

    pub fn url_type(&self) -> UrlType {
        self.url_type
    }

    pub fn set_url_type(&mut self, url_type: UrlType) {
        self.url_type = url_type;
    }

    pub fn relative_media_path(&self) -> &str {
        &self.relative_media_path
    }

    pub fn set_relative_media_path(&mut self, path: impl Into<String>) {
        self.relative_media_path = path.into();
    }

    pub fn add_external_media(&mut self, absolute: impl Into<String>, relative: impl Into<String>) {
        self.external_media.push((absolute.into(), relative.into()));
    }

    pub fn external_media(&self) -> &[(String, String)] {
        &self.external_media
    }

    pub(crate) fn clear_external_media(&mut self) {
        self.external_media.clear();
    }

    pub fn render_context(&self) -> &RenderContext {
        &self.render_context
    }

    pub fn render_context_mut(&mut self) -> &mut RenderContext {
        &mut self.render_context
    }

    /// Guards nested extends/include renders against unbounded recursion.
    pub(crate) fn enter_template(&mut self, name: &str, max_depth: usize) -> Result<(), Error> {
        if self.depth >= max_depth {
            return Err(Error::render(
                ErrorKind::TagSyntax,
                format!("Maximum template nesting depth of {max_depth} exceeded in {name}"),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn exit_template(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

impl From<HashMap<String, Value>> for Context {
    fn from(values: HashMap<String, Value>) -> Self {
        Self::from_map(values)
    }
}

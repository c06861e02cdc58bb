// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, ErrorKind};
use crate::lexer::tokenize;
use crate::library::Library;
use crate::loader::{FileSystemTemplateLoader, TemplateLoader};
use crate::loader_tags;
use crate::parser::Parser;
use crate::telemetry;
use crate::{MutableTemplate, Template};

/// Name of the built-in inheritance library (`block`, `extends`, `include`).
pub const LOADER_TAGS: &str = "loadertags";

/// Default nesting limit for extends and include chains.
pub const DEFAULT_MAX_DEPTH: usize = 64;

struct EngineInner {
    loaders: Vec<Arc<dyn TemplateLoader>>,
    libraries: HashMap<String, Library>,
    default_libraries: Vec<String>,
    smart_trim: bool,
    max_depth: usize,
}

/// Compiles templates and resolves template names and libraries.
///
/// An engine is immutable once built; clones share the same state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut libraries: Vec<_> = self.inner.libraries.keys().collect();
        libraries.sort();
        f.debug_struct("Engine")
            .field("loaders", &self.inner.loaders.len())
            .field("libraries", &libraries)
            .field("default_libraries", &self.inner.default_libraries)
            .field("smart_trim", &self.inner.smart_trim)
            .field("max_depth", &self.inner.max_depth)
            .finish()
    }
}

/// Non-owning handle held by compiled templates.
#[derive(Clone, Default)]
pub struct WeakEngine(Weak<EngineInner>);

impl WeakEngine {
    pub fn upgrade(&self) -> Option<Engine> {
        self.0.upgrade().map(|inner| Engine { inner })
    }
}

impl fmt::Debug for WeakEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakEngine")
            .field(&(self.0.strong_count() > 0))
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        EngineBuilder::new().build()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine(Arc::downgrade(&self.inner))
    }

    pub fn smart_trim(&self) -> bool {
        self.inner.smart_trim
    }

    pub fn max_depth(&self) -> usize {
        self.inner.max_depth
    }

    pub fn default_libraries(&self) -> &[String] {
        &self.inner.default_libraries
    }

    pub fn loaders(&self) -> &[Arc<dyn TemplateLoader>] {
        &self.inner.loaders
    }

    pub fn library_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.libraries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn load_library(&self, name: &str) -> Result<Library, Error> {
        self.inner
            .libraries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::tag_syntax(format!("Library '{name}' not found.")))
    }

    /// Compiles `source` under `name`.
    pub fn new_template(&self, source: &str, name: &str) -> Result<Arc<Template>, Error> {
        self.compile(source, name).map(Arc::new)
    }

    pub fn new_mutable_template(&self, source: &str, name: &str) -> Result<MutableTemplate, Error> {
        self.compile(source, name).map(MutableTemplate::new)
    }

    fn compile(&self, source: &str, name: &str) -> Result<Template, Error> {
        let started = Instant::now();
        let result = self.parse(source, name);
        telemetry::record_compile(name, source.len(), started.elapsed(), result.is_ok());
        match result {
            Ok(template) => Ok(template),
            Err(err) => {
                warn!(template = name, error = %err, "failed to compile template");
                Err(err)
            }
        }
    }

    fn parse(&self, source: &str, name: &str) -> Result<Template, Error> {
        let tokens = tokenize(source, self.inner.smart_trim);
        let mut parser = Parser::new(tokens, name, self)?;
        let nodes = parser.parse(&[])?;
        Ok(Template::new(name, source, nodes, self.downgrade()))
    }

    /// Asks each loader in registration order; the first template found wins.
    pub fn load_by_name(&self, name: &str) -> Result<Arc<Template>, Error> {
        for loader in &self.inner.loaders {
            if !loader.can_load_template(name) {
                continue;
            }
            if let Some(template) = loader.load_by_name(name, self)? {
                debug!(template = name, "loaded template");
                return Ok(template);
            }
        }
        warn!(template = name, "template not found");
        Err(Error::parse(
            ErrorKind::TagSyntax,
            format!("Template not found, {name}"),
        ))
    }

    pub fn load_mutable_by_name(&self, name: &str) -> Result<MutableTemplate, Error> {
        let template = self.load_by_name(name)?;
        self.new_mutable_template(template.source(), template.name())
    }

    /// `(media root, relative path)` of `file` from the first loader that knows it.
    pub fn media_uri(&self, file: &str) -> Option<(String, String)> {
        self.inner
            .loaders
            .iter()
            .filter_map(|loader| loader.media_uri(file))
            .find(|(_, relative)| !relative.is_empty())
    }
}

/// Serializable engine settings, e.g. read from a JSON config file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineOptions {
    pub smart_trim: bool,
    pub default_libraries: Option<Vec<String>>,
    pub template_dirs: Vec<PathBuf>,
    pub theme: Option<String>,
    pub max_depth: Option<usize>,
}

impl EngineOptions {
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

pub struct EngineBuilder {
    loaders: Vec<Arc<dyn TemplateLoader>>,
    libraries: HashMap<String, Library>,
    default_libraries: Vec<String>,
    smart_trim: bool,
    max_depth: usize,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        let mut libraries = HashMap::new();
        libraries.insert(LOADER_TAGS.to_string(), loader_tags::library());
        Self {
            loaders: Vec::new(),
            libraries,
            default_libraries: vec![LOADER_TAGS.to_string()],
            smart_trim: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn loader(mut self, loader: impl TemplateLoader + 'static) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    pub fn shared_loader(mut self, loader: Arc<dyn TemplateLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Registers `library` under `name` so templates can `{% load %}` it.
    pub fn library(mut self, name: impl Into<String>, library: Library) -> Self {
        self.libraries.insert(name.into(), library);
        self
    }

    /// Loads `name` into every parser before parsing starts.
    pub fn default_library(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.default_libraries.contains(&name) {
            self.default_libraries.push(name);
        }
        self
    }

    pub fn set_default_libraries<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_libraries = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn smart_trim(mut self, enabled: bool) -> Self {
        self.smart_trim = enabled;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn options(mut self, options: &EngineOptions) -> Self {
        self.smart_trim = options.smart_trim;
        if let Some(libraries) = &options.default_libraries {
            self.default_libraries = libraries.clone();
        }
        if !options.template_dirs.is_empty() {
            let mut loader = FileSystemTemplateLoader::new(options.template_dirs.clone());
            if let Some(theme) = &options.theme {
                loader = loader.with_theme(theme.clone());
            }
            self.loaders.push(Arc::new(loader));
        }
        if let Some(depth) = options.max_depth {
            self.max_depth = depth;
        }
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            inner: Arc::new(EngineInner {
                loaders: self.loaders,
                libraries: self.libraries,
                default_libraries: self.default_libraries,
                smart_trim: self.smart_trim,
                max_depth: self.max_depth,
            }),
        }
    }
}

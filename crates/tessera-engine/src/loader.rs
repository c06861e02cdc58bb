// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use crate::engine::Engine;
use crate::error::Error;
use crate::Template;

/// Resolves template names to compiled templates.
///
/// Loaders compile through the engine they are called with, so templates
/// loaded by name share the engine's libraries and settings.
pub trait TemplateLoader: Send + Sync {
    fn can_load_template(&self, name: &str) -> bool;

    /// `Ok(None)` lets the engine try the next loader.
    fn load_by_name(&self, name: &str, engine: &Engine) -> Result<Option<Arc<Template>>, Error>;

    /// `(media root, relative path)` for a media file next to the templates.
    fn media_uri(&self, _file: &str) -> Option<(String, String)> {
        None
    }
}

/// Template sources held in memory, replaceable at runtime.
#[derive(Debug, Default)]
pub struct InMemoryTemplateLoader {
    templates: RwLock<HashMap<String, String>>,
}

impl InMemoryTemplateLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_template(&self, name: impl Into<String>, source: impl Into<String>) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), source.into());
    }

    pub fn remove_template(&self, name: &str) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    fn source(&self, name: &str) -> Option<String> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

impl TemplateLoader for InMemoryTemplateLoader {
    fn can_load_template(&self, name: &str) -> bool {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    fn load_by_name(&self, name: &str, engine: &Engine) -> Result<Option<Arc<Template>>, Error> {
        match self.source(name) {
            Some(source) => engine.new_template(&source, name).map(Some),
            None => Ok(None),
        }
    }
}

/// Reads templates from an ordered list of directories.
///
/// With a theme set, `<dir>/<theme>/<name>` is searched instead of
/// `<dir>/<name>`. Names resolving outside their directory are refused.
#[derive(Debug, Clone, Default)]
pub struct FileSystemTemplateLoader {
    dirs: Vec<PathBuf>,
    theme: Option<String>,
}

impl FileSystemTemplateLoader {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
            theme: None,
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }

    fn root(&self, dir: &Path) -> PathBuf {
        match &self.theme {
            Some(theme) => dir.join(theme),
            None => dir.to_path_buf(),
        }
    }

    /// First existing file for `name` that stays inside its search directory.
    fn find(&self, name: &str) -> Option<(PathBuf, PathBuf)> {
        self.dirs.iter().find_map(|dir| {
            let root = self.root(dir);
            let path = root.join(name);
            let canonical = fs::canonicalize(&path).ok()?;
            let base = fs::canonicalize(dir).ok()?;
            (canonical.starts_with(&base) && canonical.is_file()).then_some((root, canonical))
        })
    }
}

impl TemplateLoader for FileSystemTemplateLoader {
    fn can_load_template(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn load_by_name(&self, name: &str, engine: &Engine) -> Result<Option<Arc<Template>>, Error> {
        let Some((_, path)) = self.find(name) else {
            return Ok(None);
        };
        let source = fs::read_to_string(&path).map_err(|source| Error::Io {
            name: name.to_string(),
            source,
        })?;
        debug!(template = name, path = %path.display(), "read template from disk");
        engine.new_template(&source, name).map(Some)
    }

    fn media_uri(&self, file: &str) -> Option<(String, String)> {
        let (root, _) = self.find(file)?;
        let mut base = fs::canonicalize(&root).ok()?.display().to_string();
        if !base.ends_with(std::path::MAIN_SEPARATOR) {
            base.push(std::path::MAIN_SEPARATOR);
        }
        Some((base, file.to_string()))
    }
}

/// Memoizes the templates compiled by another loader.
pub struct CachingTemplateLoader<L> {
    inner: L,
    cache: Mutex<HashMap<String, Arc<Template>>>,
}

impl<L: TemplateLoader> CachingTemplateLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn clear(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<L: TemplateLoader> TemplateLoader for CachingTemplateLoader<L> {
    fn can_load_template(&self, name: &str) -> bool {
        self.inner.can_load_template(name)
    }

    fn load_by_name(&self, name: &str, engine: &Engine) -> Result<Option<Arc<Template>>, Error> {
        if let Some(template) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Some(Arc::clone(template)));
        }
        // Compile outside the lock: nested loads may come back through this loader.
        let loaded = self.inner.load_by_name(name, engine)?;
        if let Some(template) = &loaded {
            self.cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(name.to_string(), Arc::clone(template));
        }
        Ok(loaded)
    }

    fn media_uri(&self, file: &str) -> Option<(String, String)> {
        self.inner.media_uri(file)
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::filter::{Filter, SafeFilter};
use crate::node::{Node, NodeFactory};
use crate::parser::Parser;
use crate::stream::OutputStream;
use crate::value::Value;

/// Named set of tags and filters, immutable once built and cheap to clone.
#[derive(Clone, Default)]
pub struct Library {
    tags: Arc<HashMap<String, Arc<dyn NodeFactory>>>,
    filters: Arc<HashMap<String, Arc<dyn Filter>>>,
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.tags.keys().collect();
        tags.sort();
        let mut filters: Vec<_> = self.filters.keys().collect();
        filters.sort();
        f.debug_struct("Library")
            .field("tags", &tags)
            .field("filters", &filters)
            .finish()
    }
}

impl Library {
    pub fn builder() -> LibraryBuilder {
        LibraryBuilder::default()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn tag(&self, name: &str) -> Option<Arc<dyn NodeFactory>> {
        self.tags.get(name).cloned()
    }

    pub fn filter(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.filters.get(name).cloned()
    }

    pub fn tags(&self) -> impl Iterator<Item = (&String, &Arc<dyn NodeFactory>)> {
        self.tags.iter()
    }

    pub fn filters(&self) -> impl Iterator<Item = (&String, &Arc<dyn Filter>)> {
        self.filters.iter()
    }

    pub fn to_builder(&self) -> LibraryBuilder {
        LibraryBuilder {
            tags: (*self.tags).clone(),
            filters: (*self.filters).clone(),
        }
    }
}

#[derive(Default)]
pub struct LibraryBuilder {
    tags: HashMap<String, Arc<dyn NodeFactory>>,
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl LibraryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, name: impl Into<String>, factory: impl NodeFactory + 'static) -> Self {
        self.tags.insert(name.into(), Arc::new(factory));
        self
    }

    /// Registers a closure as a tag factory.
    pub fn tag_fn<F>(self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str, &mut Parser<'_>) -> Result<Node, Error> + Send + Sync + 'static,
    {
        self.tag(name, factory)
    }

    pub fn filter(mut self, name: impl Into<String>, filter: impl Filter + 'static) -> Self {
        self.filters.insert(name.into(), Arc::new(filter));
        self
    }

    /// Registers a closure as a filter.
    pub fn filter_fn<F>(self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&Value, &Value, bool, &OutputStream<'_>) -> Result<Value, Error>
            + Send
            + Sync
            + 'static,
    {
        self.filter(name, filter)
    }

    /// Registers a closure as a filter whose output stays safe for safe input.
    pub fn safe_filter_fn<F>(self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&Value, &Value, bool, &OutputStream<'_>) -> Result<Value, Error>
            + Send
            + Sync
            + 'static,
    {
        self.filter(name, SafeFilter(filter))
    }

    /// Adds every tag and filter of `other`, replacing entries with the same name.
    pub fn extend(mut self, other: &Library) -> Self {
        for (name, tag) in other.tags() {
            self.tags.insert(name.clone(), Arc::clone(tag));
        }
        for (name, filter) in other.filters() {
            self.filters.insert(name.clone(), Arc::clone(filter));
        }
        self
    }

    pub fn build(self) -> Library {
        Library {
            tags: Arc::new(self.tags),
            filters: Arc::new(self.filters),
        }
    }
}

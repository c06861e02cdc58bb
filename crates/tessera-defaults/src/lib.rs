#![forbid(unsafe_code)]
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The default tag and filter libraries for `tessera-engine`.
//!
//! [`install`] registers `defaulttags` and `defaultfilters` as default
//! libraries of an [`EngineBuilder`] and makes `mutabletags` available to
//! `{% load %}`:
//!
//! ```
//! use tessera_engine::{Context, Engine};
//!
//! let engine = tessera_defaults::install(Engine::builder()).build();
//! let template = engine
//!     .new_template("{% for x in items %}{{ x|upper }}{% if not forloop.last %}, {% endif %}{% endfor %}", "list")
//!     .unwrap();
//! let mut ctx = Context::from_json(serde_json::json!({"items": ["a", "b"]}));
//! assert_eq!(template.render(&mut ctx).unwrap(), "A, B");
//! ```

pub mod defaultfilters;
pub mod defaulttags;
pub mod mutabletags;

use tessera_engine::{Engine, EngineBuilder, Library};

pub const DEFAULT_TAGS: &str = "defaulttags";
pub const DEFAULT_FILTERS: &str = "defaultfilters";
pub const MUTABLE_TAGS: &str = "mutabletags";

/// Registers every library of this crate. The tag and filter catalogs become
/// default libraries; `mutabletags` must be loaded explicitly.
pub fn install(builder: EngineBuilder) -> EngineBuilder {
    builder
        .library(DEFAULT_TAGS, defaulttags::library())
        .library(DEFAULT_FILTERS, defaultfilters::library())
        .library(MUTABLE_TAGS, mutabletags::library())
        .default_library(DEFAULT_TAGS)
        .default_library(DEFAULT_FILTERS)
}

/// An engine with the default catalogs and no template loaders.
pub fn engine() -> Engine {
    install(Engine::builder()).build()
}

/// Every tag and filter of this crate merged into one library.
pub fn all_libraries() -> Library {
    Library::builder()
        .extend(&defaulttags::library())
        .extend(&defaultfilters::library())
        .extend(&mutabletags::library())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_registers_defaults() {
        let engine = engine();
        let defaults = engine.default_libraries();
        assert!(defaults.iter().any(|name| name == DEFAULT_TAGS));
        assert!(defaults.iter().any(|name| name == DEFAULT_FILTERS));
        assert!(!defaults.iter().any(|name| name == MUTABLE_TAGS));
        assert!(engine.load_library(MUTABLE_TAGS).is_ok());
    }

    #[test]
    fn merged_library_has_everything() {
        let all = all_libraries();
        for tag in ["if", "for", "with", "raw", "repeater"] {
            assert!(all.tag(tag).is_some(), "{tag}");
        }
        for filter in ["safe", "upper", "join", "yesno"] {
            assert!(all.filter(filter).is_some(), "{filter}");
        }
    }
}

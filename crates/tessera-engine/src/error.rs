// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use thiserror::Error;

/// Classification shared by every compile and render failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// `{{ }}` without content, or a filter argument separator with nothing after it.
    EmptyVariable,
    /// `{% %}` without a command word.
    EmptyBlockTag,
    /// A tag name that no loaded library registers.
    InvalidBlockTag,
    /// The token stream ended while closing tags were still expected.
    UnclosedBlockTag,
    /// A filter name that no loaded library registers.
    UnknownFilter,
    /// Catch-all for tag grammar violations.
    TagSyntax,
    /// A lookup that required a value which the context did not provide.
    VariableNotInContext,
    /// A host object returned a value of an unsupported type.
    ObjectReturnTypeInvalid,
    /// A host callable failed while being invoked.
    CompileFunction,
}

impl ErrorKind {
    /// Stable identifier for logs and test fixtures.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::EmptyVariable => "EmptyVariableError",
            ErrorKind::EmptyBlockTag => "EmptyBlockTagError",
            ErrorKind::InvalidBlockTag => "InvalidBlockTagError",
            ErrorKind::UnclosedBlockTag => "UnclosedBlockTagError",
            ErrorKind::UnknownFilter => "UnknownFilterError",
            ErrorKind::TagSyntax => "TagSyntaxError",
            ErrorKind::VariableNotInContext => "VariableNotInContext",
            ErrorKind::ObjectReturnTypeInvalid => "ObjectReturnTypeInvalid",
            ErrorKind::CompileFunction => "CompileFunctionError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the template engine.
///
/// Parse errors are annotated with the line and template name of the token
/// being parsed when they first cross the parser; render errors carry the name
/// of the template whose nodes were rendering. Use [`Error::kind`] to branch on
/// the failure class instead of matching message text.
#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error: {message}")]
    Parse {
        kind: ErrorKind,
        message: String,
        line: Option<usize>,
        template: Option<String>,
    },
    #[error("render error: {message}{}", template_suffix(.template))]
    Render {
        kind: ErrorKind,
        message: String,
        template: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
    #[error("failed to read template `{name}`")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

fn template_suffix(template: &Option<String>) -> String {
    match template {
        Some(name) => format!(" (in template `{name}`)"),
        None => String::new(),
    }
}

impl Error {
    pub fn parse(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::Parse {
            kind,
            message: message.into(),
            line: None,
            template: None,
        }
    }

    pub fn render(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::Render {
            kind,
            message: message.into(),
            template: None,
            source: None,
        }
    }

    pub fn render_with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Render {
            kind,
            message: message.into(),
            template: None,
            source: Some(Box::new(source)),
        }
    }

    pub fn tag_syntax(message: impl Into<String>) -> Self {
        Self::parse(ErrorKind::TagSyntax, message)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse { kind, .. } | Error::Render { kind, .. } => *kind,
            Error::Io { .. } => ErrorKind::TagSyntax,
        }
    }

    /// Message without the `parse error:` / `render error:` prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Parse { message, .. } | Error::Render { message, .. } => message.clone(),
            Error::Io { name, source } => format!("failed to read template `{name}`: {source}"),
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Parse { line, .. } => *line,
            _ => None,
        }
    }

    pub fn template(&self) -> Option<&str> {
        match self {
            Error::Parse { template, .. } | Error::Render { template, .. } => template.as_deref(),
            Error::Io { name, .. } => Some(name),
        }
    }

    /// Appends `, line N, <template>` to a parse error that has no location yet.
    pub(crate) fn at_line(self, line_no: usize, template_name: &str) -> Self {
        match self {
            Error::Parse {
                kind,
                message,
                line: None,
                ..
            } => Error::Parse {
                kind,
                message: format!("{message}, line {line_no}, {template_name}"),
                line: Some(line_no),
                template: Some(template_name.to_string()),
            },
            other => other,
        }
    }

    /// Turns a parse error that has no location into a render error, for
    /// failures that surface while a template is rendering.
    pub(crate) fn at_render(self) -> Self {
        match self {
            Error::Parse {
                kind,
                message,
                line: None,
                template: None,
            } => Error::render(kind, message),
            other => other,
        }
    }

    /// Attributes a render error to `template_name` unless a nested template already claimed it.
    pub(crate) fn in_template(self, template_name: &str) -> Self {
        match self {
            Error::Render {
                kind,
                message,
                template: None,
                source,
            } => Error::Render {
                kind,
                message,
                template: Some(template_name.to_string()),
                source,
            },
            other => other,
        }
    }
}

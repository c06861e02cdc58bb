// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::SmallVec;

use crate::context::Context;
use crate::error::{Error, ErrorKind};
use crate::node::stream_value;
use crate::parser::Parser;
use crate::safestring::SafeString;
use crate::stream::OutputStream;
use crate::telemetry;
use crate::value::Value;
use crate::variable::Variable;

/// A named transformation applied with `value|name:arg`.
///
/// The output stream is passed to every call so one filter instance can be
/// shared by any number of concurrent renders.
pub trait Filter: Send + Sync {
    fn do_filter(
        &self,
        input: &Value,
        arg: &Value,
        autoescape: bool,
        stream: &OutputStream<'_>,
    ) -> Result<Value, Error>;

    /// Whether a safe input stays safe after this filter.
    fn is_safe(&self) -> bool {
        false
    }

    fn escape(&self, stream: &OutputStream<'_>, input: &str) -> SafeString {
        SafeString::safe(stream.escape(input))
    }

    fn conditional_escape(&self, stream: &OutputStream<'_>, input: &SafeString) -> SafeString {
        SafeString::safe(stream.conditional_escape(input))
    }
}

impl<F> Filter for F
where
    F: Fn(&Value, &Value, bool, &OutputStream<'_>) -> Result<Value, Error> + Send + Sync,
{
    fn do_filter(
        &self,
        input: &Value,
        arg: &Value,
        autoescape: bool,
        stream: &OutputStream<'_>,
    ) -> Result<Value, Error> {
        self(input, arg, autoescape, stream)
    }
}

/// Wraps a closure as a filter that reports itself safe.
pub struct SafeFilter<F>(pub F);

impl<F> Filter for SafeFilter<F>
where
    F: Fn(&Value, &Value, bool, &OutputStream<'_>) -> Result<Value, Error> + Send + Sync,
{
    fn do_filter(
        &self,
        input: &Value,
        arg: &Value,
        autoescape: bool,
        stream: &OutputStream<'_>,
    ) -> Result<Value, Error> {
        (self.0)(input, arg, autoescape, stream)
    }

    fn is_safe(&self) -> bool {
        true
    }
}

const FILTER_SEPARATOR: char = '|';
const ARGUMENT_SEPARATOR: char = ':';

static FILTER_RE: Lazy<Regex> = Lazy::new(|| {
    let variable = r"[A-Za-z0-9_.]+";
    let number = r"[-+.]?\d[\d.e]*";
    let double_quoted = r#""[^"\\]*(?:\\.[^"\\]*)*""#;
    let single_quoted = r"'[^'\\]*(?:\\.[^'\\]*)*'";
    let localized = format!(
        r"(?:_\({double_quoted}\)|_\({single_quoted}\)|_\({number}\)|_\({variable}\))"
    );
    let constant = format!("(?:{double_quoted}|{single_quoted})");
    let pattern = format!(
        r"^{constant}|^{localized}|^{variable}|{number}|\|\w+|:(?:{constant}|{localized}|{variable}|{number}|\|\w+)"
    );
    Regex::new(&pattern).expect("filter expression grammar is a valid regex")
});

#[derive(Clone)]
struct FilterCall {
    name: String,
    filter: Arc<dyn Filter>,
    arg: Variable,
}

/// `variable|filter:arg|filter2`, parsed once and resolved once per render.
#[derive(Clone)]
pub struct FilterExpression {
    raw: String,
    variable: Variable,
    filters: SmallVec<[FilterCall; 2]>,
}

impl fmt::Debug for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterExpression")
            .field("variable", &self.variable)
            .field("filters", &self.filters())
            .finish()
    }
}

impl FilterExpression {
    pub fn new(raw: &str, parser: &Parser<'_>) -> Result<Self, Error> {
        let mut variable = Variable::default();
        let mut filters: SmallVec<[FilterCall; 2]> = SmallVec::new();
        let mut last = 0;

        for found in FILTER_RE.find_iter(raw) {
            if found.start() != last {
                return Err(Error::tag_syntax(format!(
                    "Could not parse some characters: \"{}\"",
                    &raw[last..found.start()]
                )));
            }
            let segment = found.as_str();
            if let Some(name) = segment.strip_prefix(FILTER_SEPARATOR) {
                filters.push(FilterCall {
                    name: name.to_string(),
                    filter: parser.filter(name)?,
                    arg: Variable::default(),
                });
            } else if let Some(arg) = segment.strip_prefix(ARGUMENT_SEPARATOR) {
                let Some(call) = filters.last_mut().filter(|call| !call.arg.is_valid()) else {
                    return Err(Error::tag_syntax(format!(
                        "Could not parse the remainder, {} from {raw}",
                        &raw[last..]
                    )));
                };
                if arg.starts_with(FILTER_SEPARATOR) {
                    return Err(Error::parse(
                        ErrorKind::EmptyVariable,
                        format!("Missing argument to filter: {}", call.name),
                    ));
                }
                call.arg = Variable::new(arg)?;
            } else {
                variable = Variable::new(segment)?;
            }
            last = found.end();
        }

        if last != raw.len() {
            return Err(Error::tag_syntax(format!(
                "Could not parse the remainder, {} from {raw}",
                &raw[last..]
            )));
        }

        Ok(Self {
            raw: raw.to_string(),
            variable,
            filters,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_valid(&self) -> bool {
        self.variable.is_valid()
    }

    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    pub fn filters(&self) -> Vec<&str> {
        self.filters.iter().map(|call| call.name.as_str()).collect()
    }

    /// Resolves the variable and threads it through the filter chain.
    pub fn resolve(&self, stream: &OutputStream<'_>, ctx: &mut Context) -> Result<Value, Error> {
        let mut value = self.variable.resolve(ctx)?;
        for call in &self.filters {
            let mut arg = call.arg.resolve(ctx)?;
            if call.arg.is_constant() {
                if let Value::String(s) = arg {
                    arg = Value::String(s.mark_safe());
                }
            }
            let before = value.to_safe_string();
            let result = call
                .filter
                .do_filter(&value, &arg, ctx.autoescape(), stream);
            telemetry::record_filter_invocation(&call.name, result.is_ok());
            value = match result? {
                Value::String(out) => Value::String(if call.filter.is_safe() && before.is_safe() {
                    out.mark_safe()
                } else if before.needs_escape() {
                    out.mark_for_escaping()
                } else {
                    out
                }),
                other => other,
            };
        }
        Ok(value)
    }

    /// Resolves without producing output.
    pub fn resolve_value(&self, ctx: &mut Context) -> Result<Value, Error> {
        self.resolve(&OutputStream::null(), ctx)
    }

    /// Resolves and writes the result, escaping it when autoescape is on and it is not safe.
    pub fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<Value, Error> {
        let value = self.resolve(stream, ctx)?;
        stream_value(stream, &value, ctx)?;
        Ok(value)
    }

    pub fn is_true(&self, ctx: &mut Context) -> Result<bool, Error> {
        Ok(self.resolve_value(ctx)?.is_true())
    }

    pub fn to_list(&self, ctx: &mut Context) -> Result<Vec<Value>, Error> {
        Ok(self.resolve_value(ctx)?.to_list())
    }
}

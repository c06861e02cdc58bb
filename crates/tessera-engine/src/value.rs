// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::context::Context;
use crate::error::Error;
use crate::safestring::SafeString;
use crate::Template;

/// Host object exposed to templates with dynamic attribute lookup.
pub trait Object: fmt::Debug + Send + Sync {
    /// Resolves `object.name`. Unknown attributes should yield [`Value::Invalid`].
    fn attribute(&self, name: &str, ctx: &mut Context) -> Result<Value, Error>;

    fn is_true(&self) -> bool {
        true
    }

    fn display(&self) -> SafeString {
        SafeString::default()
    }
}

/// Dynamic value threaded through lookups, filters and output.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Invalid,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(SafeString),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Template(Arc<Template>),
    Object(Arc<dyn Object>),
}

impl Value {
    pub fn safe(text: impl Into<String>) -> Self {
        Value::String(SafeString::safe(text))
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Value::Invalid)
    }

    /// Template truthiness: numbers are true only when positive.
    pub fn is_true(&self) -> bool {
        match self {
            Value::Invalid => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i > 0,
            Value::Float(f) => *f > 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Template(_) => true,
            Value::Object(obj) => obj.is_true(),
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Value::String(s) if s.is_safe())
    }

    pub fn as_safe_string(&self) -> Option<&SafeString> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::String(s) => s.as_str().trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.as_str().trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Items a `for` loop or a sequence filter iterates over.
    pub fn to_list(&self) -> Vec<Value> {
        match self {
            Value::List(items) => items.clone(),
            Value::Map(map) => map.keys().map(|k| Value::from(k.as_str())).collect(),
            Value::String(s) => s
                .as_str()
                .chars()
                .map(|c| Value::String(SafeString::with_safety(c.to_string(), s.safety())))
                .collect(),
            Value::Invalid => Vec::new(),
            other => vec![other.clone()],
        }
    }

    /// Display form used when a value is written to output or fed to a string filter.
    pub fn to_safe_string(&self) -> SafeString {
        match self {
            Value::Invalid | Value::Template(_) => SafeString::default(),
            Value::Bool(b) => SafeString::new(b.to_string()),
            Value::Int(i) => SafeString::new(i.to_string()),
            Value::Float(f) => SafeString::new(f.to_string()),
            Value::String(s) => s.clone(),
            Value::List(items) => SafeString::new(list_repr(items)),
            Value::Map(map) => {
                let body: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("u'{k}': {}", item_repr(v)))
                    .collect();
                SafeString::new(format!("{{{}}}", body.join(", ")))
            }
            Value::Object(obj) => obj.display(),
        }
    }

    /// Resolves one dotted path segment against this value.
    pub fn attribute(&self, name: &str, ctx: &mut Context) -> Result<Value, Error> {
        Ok(match self {
            Value::Map(map) => {
                if let Some(value) = map.get(name) {
                    return Ok(value.clone());
                }
                match name {
                    "size" | "count" => Value::Int(map.len() as i64),
                    "items" => Value::List(
                        map.iter()
                            .map(|(k, v)| Value::List(vec![Value::from(k.as_str()), v.clone()]))
                            .collect(),
                    ),
                    "keys" => Value::List(map.keys().map(|k| Value::from(k.as_str())).collect()),
                    "values" => Value::List(map.values().cloned().collect()),
                    _ => Value::Invalid,
                }
            }
            Value::List(items) => match name {
                "size" | "count" => Value::Int(items.len() as i64),
                _ => name
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| items.get(idx).cloned())
                    .unwrap_or_default(),
            },
            Value::String(s) => string_attribute(s.as_str(), name),
            Value::Object(obj) => obj.attribute(name, ctx)?,
            _ => Value::Invalid,
        })
    }
}

fn item_repr(item: &Value) -> String {
    match item {
        Value::String(s) => format!("u'{}'", s.as_str()),
        Value::Int(_) | Value::Float(_) => item.to_safe_string().into_string(),
        Value::List(items) => list_repr(items),
        _ => String::new(),
    }
}

fn list_repr(items: &[Value]) -> String {
    let body: Vec<String> = items.iter().map(item_repr).collect();
    format!("[{}]", body.join(", "))
}

fn truth(flag: bool) -> Value {
    Value::from(if flag { "True" } else { "False" })
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn string_attribute(s: &str, name: &str) -> Value {
    match name {
        "capitalize" => {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => Value::from(first.to_uppercase().chain(chars).collect::<String>()),
                None => Value::from(""),
            }
        }
        "isalnum" => truth(s.chars().all(char::is_alphanumeric)),
        "isalpha" => truth(s.chars().all(char::is_alphabetic)),
        "isdigit" => truth(s.chars().all(char::is_numeric)),
        "islower" => truth(s.to_lowercase() == s),
        "isspace" => truth(s.trim().is_empty()),
        "istitle" => {
            let mut prev_word = false;
            let lower_word_start = s.chars().any(|c| {
                let starts = !prev_word && c.is_lowercase();
                prev_word = is_word(c);
                starts
            });
            truth(!lower_word_start)
        }
        "isupper" => truth(s.to_uppercase() == s),
        "lower" => Value::from(s.to_lowercase()),
        "splitlines" => Value::List(s.split('\n').map(Value::from).collect()),
        "strip" => Value::from(s.trim()),
        "swapcase" => Value::from(
            s.chars()
                .flat_map(|c| {
                    if c.is_uppercase() {
                        c.to_lowercase().collect::<Vec<_>>()
                    } else if c.is_lowercase() {
                        c.to_uppercase().collect::<Vec<_>>()
                    } else {
                        vec![c]
                    }
                })
                .collect::<String>(),
        ),
        "title" => Value::from(title_case(s)),
        "upper" => Value::from(s.to_uppercase()),
        _ => Value::Invalid,
    }
}

/// Uppercases the first character of every word, leaving the rest untouched.
pub(crate) fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_word = false;
    for c in s.chars() {
        if !prev_word && is_word(c) {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_word = is_word(c);
    }
    out
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Invalid, Value::Invalid) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a.as_str() == b.as_str(),
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Template(a), Value::Template(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(SafeString::new(text))
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::String(SafeString::new(text))
    }
}

impl From<SafeString> for Value {
    fn from(text: SafeString) -> Self {
        Value::String(text)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Arc<Template>> for Value {
    fn from(template: Arc<Template>) -> Self {
        Value::Template(template)
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Invalid,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => Value::from(s),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

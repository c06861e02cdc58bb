// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::cmp::Ordering;

use tessera_engine::{Context, OutputStream, SafeString, Value};

use super::FilterResult;

/// The items of a list, or the characters of a string.
fn sequence(input: &Value) -> Option<Vec<Value>> {
    match input {
        Value::List(items) => Some(items.clone()),
        Value::String(_) => Some(input.to_list()),
        _ => None,
    }
}

fn size(input: &Value) -> Option<usize> {
    match input {
        Value::List(items) => Some(items.len()),
        Value::Map(map) => Some(map.len()),
        Value::String(s) => Some(s.as_str().chars().count()),
        _ => None,
    }
}

pub(crate) fn join(
    input: &Value,
    arg: &Value,
    autoescape: bool,
    stream: &OutputStream<'_>,
) -> FilterResult {
    if !input.is_valid() {
        return Ok(Value::Invalid);
    }
    let render = |value: &SafeString| {
        if autoescape {
            stream.conditional_escape(value)
        } else {
            value.as_str().to_string()
        }
    };
    let separator = stream.conditional_escape(&arg.to_safe_string());
    let items: Vec<String> = input
        .to_list()
        .iter()
        .map(|item| render(&item.to_safe_string()))
        .collect();
    Ok(Value::safe(items.join(separator.as_str())))
}

pub(crate) fn length(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    Ok(size(input).map_or(Value::Invalid, |len| Value::Int(len as i64)))
}

pub(crate) fn length_is(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    if matches!(input, Value::Invalid | Value::Int(_)) {
        return Ok(Value::Invalid);
    }
    let Some(expected) = arg.as_int() else {
        return Ok(Value::Invalid);
    };
    let len = size(input).unwrap_or(0) as i64;
    Ok(Value::Bool(len == expected))
}

pub(crate) fn first(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    Ok(match sequence(input) {
        Some(items) => items.into_iter().next().unwrap_or_else(|| Value::from("")),
        None => Value::Invalid,
    })
}

pub(crate) fn last(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    Ok(match sequence(input) {
        Some(items) => items.into_iter().last().unwrap_or_else(|| Value::from("")),
        None => Value::Invalid,
    })
}

pub(crate) fn make_list(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    Ok(match input {
        Value::List(_) => input.clone(),
        Value::Int(i) => Value::List(Value::from(i.to_string()).to_list()),
        Value::String(_) => Value::List(input.to_list()),
        _ => Value::Invalid,
    })
}

/// Resolves a Python-style index against `len`, counting negative values from the end.
fn index(spec: &str, len: usize) -> Option<usize> {
    let n: i64 = spec.trim().parse().ok()?;
    let len = len as i64;
    let idx = if n < 0 { len + n } else { n };
    Some(idx.clamp(0, len) as usize)
}

/// `slice:"start:end"` on lists and strings; `slice:n` picks one item.
pub(crate) fn slice(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let Some(items) = sequence(input) else {
        return Ok(Value::Invalid);
    };
    let spec = arg.to_safe_string();
    let selected = match spec.as_str().split_once(':') {
        Some((start, end)) => {
            let start = if start.trim().is_empty() {
                0
            } else {
                index(start, items.len()).unwrap_or(0)
            };
            let end = if end.trim().is_empty() {
                items.len()
            } else {
                index(end, items.len()).unwrap_or(items.len())
            };
            items.get(start..end.max(start)).unwrap_or_default().to_vec()
        }
        None => {
            let picked = index(spec.as_str(), items.len())
                .and_then(|idx| items.get(idx).cloned())
                .unwrap_or_default();
            return Ok(picked);
        }
    };
    Ok(match input {
        Value::String(s) => {
            let text: String = selected
                .iter()
                .map(|c| c.to_safe_string().into_string())
                .collect();
            Value::String(SafeString::with_safety(text, s.safety()))
        }
        _ => Value::List(selected),
    })
}

fn nested_items(
    items: &[Value],
    tabs: usize,
    autoescape: bool,
    stream: &OutputStream<'_>,
) -> String {
    let indent = "\t".repeat(tabs);
    let mut output = Vec::new();
    let mut idx = 0;
    while idx < items.len() {
        let (title, children) = match &items[idx] {
            Value::List(children) => (SafeString::default(), Some(children)),
            item => {
                let children = match items.get(idx + 1) {
                    Some(Value::List(children)) => {
                        idx += 1;
                        Some(children)
                    }
                    _ => None,
                };
                (item.to_safe_string(), children)
            }
        };
        let sublist = children.map_or_else(String::new, |children| {
            let inner = nested_items(children, tabs + 1, autoescape, stream);
            format!("\n{indent}<ul>\n{inner}\n{indent}</ul>\n{indent}")
        });
        let title = if autoescape {
            stream.conditional_escape(&title)
        } else {
            title.into_string()
        };
        output.push(format!("{indent}<li>{title}{sublist}</li>"));
        idx += 1;
    }
    output.join("\n")
}

/// Renders nested lists as `<li>` items; a list following an item becomes its sub-list.
pub(crate) fn unordered_list(
    input: &Value,
    _: &Value,
    autoescape: bool,
    stream: &OutputStream<'_>,
) -> FilterResult {
    let Some(items) = input.as_list() else {
        return Ok(Value::Invalid);
    };
    Ok(Value::safe(nested_items(items, 1, autoescape, stream)))
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Invalid, Value::Invalid) => Ordering::Equal,
        (Value::Invalid, _) => Ordering::Less,
        (_, Value::Invalid) => Ordering::Greater,
        (Value::String(a), Value::String(b)) => a.as_str().cmp(b.as_str()),
        _ => match (a.as_float(), b.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

/// Stable sort of a list by the dotted attribute path in `arg`.
pub(crate) fn dictsort(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let Some(items) = input.as_list() else {
        return Ok(Value::Invalid);
    };
    let path = arg.to_safe_string();
    let mut lookup_ctx = Context::new();
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let mut key = item.clone();
        for segment in path.as_str().split('.').filter(|s| !s.is_empty()) {
            key = key.attribute(segment, &mut lookup_ctx)?;
        }
        keyed.push((key, item.clone()));
    }
    keyed.sort_by(|(a, _), (b, _)| compare(a, b));
    Ok(Value::List(keyed.into_iter().map(|(_, item)| item).collect()))
}

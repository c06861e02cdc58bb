// SPDX-License-Identifier: Apache-2.0 OR MIT
use crate::context::Context;
use crate::error::Error;
use crate::safestring::SafeString;
use crate::value::Value;

/// A dotted lookup path (`a.b.0`) or a literal number or quoted string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variable {
    raw: String,
    literal: Option<Value>,
    lookups: Vec<String>,
    localize: bool,
}

/// Strips the surrounding quotes from a string literal and resolves `\'`, `\"` and `\\`.
pub fn unescape_string_literal(input: &str) -> String {
    let inner = if input.len() >= 2 {
        &input[1..input.len() - 1]
    } else {
        ""
    };
    inner
        .replace("\\'", "'")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
}

fn parse_number(text: &str) -> Option<Value> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '+' | '-' | '.')) {
        return None;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::Int(int));
    }
    text.parse::<f64>().ok().map(Value::Float)
}

impl Variable {
    pub fn new(raw: &str) -> Result<Self, Error> {
        let mut variable = Variable {
            raw: raw.to_string(),
            ..Variable::default()
        };
        let mut text = raw;
        if let Some(inner) = raw.strip_prefix("_(").and_then(|s| s.strip_suffix(')')) {
            variable.localize = true;
            text = inner;
        }
        if text.ends_with('.') {
            return Err(Error::tag_syntax(format!(
                "Variable may not end with a dot: {text}"
            )));
        }
        if let Some(number) = parse_number(text) {
            variable.literal = Some(number);
        } else if text.starts_with('"') || text.starts_with('\'') {
            variable.literal = Some(Value::String(SafeString::safe(unescape_string_literal(
                text,
            ))));
        } else {
            if text.starts_with('_') || text.contains("._") {
                return Err(Error::tag_syntax(format!(
                    "Variables and attributes may not begin with underscores: {text}"
                )));
            }
            variable.lookups = text.split('.').map(str::to_string).collect();
        }
        Ok(variable)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_valid(&self) -> bool {
        !self.raw.is_empty()
    }

    pub fn is_constant(&self) -> bool {
        self.literal.is_some()
    }

    pub fn is_localized(&self) -> bool {
        self.localize
    }

    pub fn literal(&self) -> Option<&Value> {
        self.literal.as_ref()
    }

    pub fn lookups(&self) -> &[String] {
        &self.lookups
    }

    /// Resolves the variable. Missing names and attributes give [`Value::Invalid`].
    pub fn resolve(&self, ctx: &mut Context) -> Result<Value, Error> {
        if let Some(literal) = &self.literal {
            return Ok(literal.clone());
        }
        let Some((first, rest)) = self.lookups.split_first() else {
            return Ok(Value::Invalid);
        };
        let mut value = ctx.lookup(first);
        for part in rest {
            if !value.is_valid() {
                break;
            }
            value = value.attribute(part, ctx)?;
        }
        Ok(value)
    }

    pub fn is_true(&self, ctx: &mut Context) -> Result<bool, Error> {
        Ok(self.resolve(ctx)?.is_true())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    #[test]
    fn literals() {
        assert_eq!(Variable::new("42").unwrap().literal(), Some(&Value::Int(42)));
        assert_eq!(Variable::new("-1.5").unwrap().literal(), Some(&Value::Float(-1.5)));
        let quoted = Variable::new(r#""say \"hi\"""#).unwrap();
        let value = quoted.literal().unwrap();
        assert_eq!(value.to_safe_string().as_str(), r#"say "hi""#);
        assert!(value.is_safe());
        assert!(!Variable::new("nan").unwrap().is_constant());
    }

    #[test]
    fn localized_literal_resolves_unchanged() {
        let var = Variable::new("_('Hello')").unwrap();
        assert!(var.is_localized());
        let mut ctx = Context::new();
        assert_eq!(var.resolve(&mut ctx).unwrap(), Value::from("Hello"));
    }

    #[test]
    fn rejects_trailing_dot_and_underscores() {
        let err = Variable::new("a.b.").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TagSyntax);
        assert!(err.to_string().contains("may not end with a dot"));
        assert!(Variable::new("_private").is_err());
        assert!(Variable::new("a._b").is_err());
    }

    #[test]
    fn resolves_paths() {
        let mut ctx = Context::from_json(json!({"user": {"names": ["Ann", "Bo"]}}));
        let var = Variable::new("user.names.1").unwrap();
        assert_eq!(var.resolve(&mut ctx).unwrap(), Value::from("Bo"));
        let missing = Variable::new("user.nothing.here").unwrap();
        assert_eq!(missing.resolve(&mut ctx).unwrap(), Value::Invalid);
    }
}

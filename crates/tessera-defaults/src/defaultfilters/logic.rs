// SPDX-License-Identifier: Apache-2.0 OR MIT
use tessera_engine::{OutputStream, Value};

use super::FilterResult;

/// Sums numbers and concatenates strings or lists. Mismatched operands
/// return the input unchanged.
pub(crate) fn add(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    Ok(match (input, arg) {
        (Value::String(a), Value::String(b)) => Value::String(a.clone() + b.clone()),
        (Value::List(a), Value::List(b)) => Value::List(a.iter().chain(b).cloned().collect()),
        (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(*b)),
        (Value::Float(_) | Value::Int(_), Value::Float(_) | Value::Int(_)) => {
            Value::Float(input.as_float().unwrap_or(0.0) + arg.as_float().unwrap_or(0.0))
        }
        _ => input.clone(),
    })
}

/// `arg` when the input is missing or displays as an empty string.
pub(crate) fn default(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    if !input.is_valid() || input.to_safe_string().is_empty() {
        return Ok(arg.clone());
    }
    Ok(input.clone())
}

pub(crate) fn default_if_none(
    input: &Value,
    arg: &Value,
    _: bool,
    _: &OutputStream<'_>,
) -> FilterResult {
    Ok(if input.is_valid() {
        input.clone()
    } else {
        arg.clone()
    })
}

pub(crate) fn divisibleby(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let divisible = match (input.as_int(), arg.as_int()) {
        (Some(value), Some(divisor)) if divisor != 0 => value.wrapping_rem(divisor) == 0,
        _ => false,
    };
    Ok(Value::Bool(divisible))
}

/// The `arg`-th digit counted from the right; non-numbers give an empty string.
pub(crate) fn get_digit(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let digits = input.to_safe_string();
    if digits.as_str().trim().parse::<i64>().is_err() {
        return Ok(Value::from(""));
    }
    let chars: Vec<char> = digits.as_str().chars().collect();
    match arg.as_int().and_then(|n| usize::try_from(n).ok()) {
        Some(n) if n >= 1 && n <= chars.len() => Ok(Value::from(chars[chars.len() - n].to_string())),
        _ => Ok(input.clone()),
    }
}

/// Maps true, false and missing to `arg`'s comma separated words (`yes,no,maybe` by default).
pub(crate) fn yesno(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let words = arg.to_safe_string();
    let words = if words.is_empty() {
        "yes,no,maybe"
    } else {
        words.as_str()
    };
    let choices: Vec<&str> = words.split(',').collect();
    let (yes, no, maybe) = match choices.as_slice() {
        [yes, no] => (*yes, *no, *no),
        [yes, no, maybe] => (*yes, *no, *maybe),
        _ => return Ok(input.clone()),
    };
    Ok(Value::from(if !input.is_valid() {
        maybe
    } else if input.is_true() {
        yes
    } else {
        no
    }))
}

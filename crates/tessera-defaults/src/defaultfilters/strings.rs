// SPDX-License-Identifier: Apache-2.0 OR MIT
use once_cell::sync::Lazy;
use regex::Regex;
use tessera_engine::{Error, ErrorKind, OutputStream, SafeString, Value};

use super::FilterResult;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{2,}").expect("paragraph break regex"));
static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("non-slug regex"));
static SLUG_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-\s]+").expect("slug separator regex"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*?>").expect("tag regex"));

const ELLIPSIS: &str = "...";
/// Upper bound for the padding filters' column count.
const MAX_WIDTH: usize = 4096;
/// Upper bound for `floatformat` decimals.
const MAX_DECIMALS: usize = 64;

fn width_arg(arg: &Value) -> usize {
    arg.as_int()
        .and_then(|width| usize::try_from(width).ok())
        .map_or(0, |width| width.min(MAX_WIDTH))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub(crate) fn addslashes(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    Ok(Value::from(
        s.as_str()
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\'', "\\'"),
    ))
}

pub(crate) fn capfirst(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    let mut chars = s.as_str().chars();
    Ok(Value::from(match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    }))
}

pub(crate) fn ljust(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    Ok(Value::from(format!("{:<width$}", s.as_str(), width = width_arg(arg))))
}

pub(crate) fn rjust(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    Ok(Value::from(format!("{:>width$}", s.as_str(), width = width_arg(arg))))
}

/// Centers within `arg` columns; an odd remainder goes to the left.
pub(crate) fn center(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    let len = char_len(s.as_str());
    let width = width_arg(arg);
    if width <= len {
        return Ok(Value::from(s.into_string()));
    }
    let right = (width - len) / 2;
    let left = width - len - right;
    Ok(Value::from(format!(
        "{}{}{}",
        " ".repeat(left),
        s.as_str(),
        " ".repeat(right)
    )))
}

pub(crate) fn escape(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    Ok(Value::String(input.to_safe_string().mark_for_escaping()))
}

pub(crate) fn force_escape(
    input: &Value,
    _: &Value,
    _: bool,
    stream: &OutputStream<'_>,
) -> FilterResult {
    let s = input.to_safe_string();
    Ok(Value::String(SafeString::safe(stream.escape(s.as_str()))))
}

pub(crate) fn escapejs(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    let mut out = String::with_capacity(s.as_str().len());
    for c in s.as_str().chars() {
        match c {
            '\\' | '\'' | '"' | '>' | '<' | '&' | '=' | '-' | ';' | '\u{2028}' | '\u{2029}' => {
                out.push_str(&format!("\\u{:04X}", u32::from(c)));
            }
            c if u32::from(c) < 32 => out.push_str(&format!("\\u{:04X}", u32::from(c))),
            c => out.push(c),
        }
    }
    Ok(Value::from(out))
}

/// Whether the text following an `&` completes an entity such as `amp;` or `#38;`.
fn continues_entity(rest: &str) -> bool {
    let (body, numeric) = match rest.strip_prefix('#') {
        Some(body) => (body, true),
        None => (rest, false),
    };
    let len = body
        .find(|c: char| {
            if numeric {
                !c.is_ascii_digit()
            } else {
                !(c.is_alphanumeric() || c == '_')
            }
        })
        .unwrap_or(body.len());
    len > 0 && body[len..].starts_with(';')
}

pub(crate) fn fix_ampersands(
    input: &Value,
    _: &Value,
    _: bool,
    _: &OutputStream<'_>,
) -> FilterResult {
    let s = input.to_safe_string();
    let text = s.as_str();
    let mut out = String::with_capacity(text.len());
    for (idx, c) in text.char_indices() {
        if c == '&' && !continues_entity(&text[idx + 1..]) {
            out.push_str("&amp;");
        } else {
            out.push(c);
        }
    }
    Ok(Value::from(out))
}

/// Fixed-point formatting with `arg` decimals (one by default). A negative
/// precision drops the decimals of whole numbers.
pub(crate) fn floatformat(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let value = input.as_float().unwrap_or(0.0);
    let precision = if arg.is_valid() {
        arg.as_int().unwrap_or(0)
    } else {
        1
    };
    let digits = usize::try_from(precision.unsigned_abs())
        .map_or(MAX_DECIMALS, |digits| digits.min(MAX_DECIMALS));
    Ok(Value::from(if precision < 0 && value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.digits$}")
    }))
}

pub(crate) fn cut(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    let needle = arg.to_safe_string();
    let out = s.as_str().replace(needle.as_str(), "");
    Ok(Value::String(if s.is_safe() && needle.as_str() != ";" {
        SafeString::safe(out)
    } else {
        SafeString::new(out)
    }))
}

pub(crate) fn linebreaks(
    input: &Value,
    _: &Value,
    autoescape: bool,
    stream: &OutputStream<'_>,
) -> FilterResult {
    let s = input.to_safe_string();
    let paragraphs: Vec<String> = PARAGRAPH_BREAK
        .split(s.as_str())
        .map(|bit| {
            let bit = SafeString::with_safety(bit, s.safety());
            let bit = if autoescape {
                stream.conditional_escape(&bit)
            } else {
                bit.into_string()
            };
            format!("<p>{}</p>", bit.replace('\n', "<br />"))
        })
        .collect();
    Ok(Value::safe(paragraphs.join("\n\n")))
}

pub(crate) fn linebreaksbr(
    input: &Value,
    _: &Value,
    autoescape: bool,
    stream: &OutputStream<'_>,
) -> FilterResult {
    let s = input.to_safe_string();
    let text = if autoescape && input.is_string() {
        stream.conditional_escape(&s)
    } else {
        s.into_string()
    };
    Ok(Value::safe(text.replace('\n', "<br />")))
}

pub(crate) fn linenumbers(
    input: &Value,
    _: &Value,
    autoescape: bool,
    stream: &OutputStream<'_>,
) -> FilterResult {
    let s = input.to_safe_string();
    let lines: Vec<&str> = s.as_str().split('\n').collect();
    let width = lines.len().to_string().len();
    let escape_lines = autoescape && !s.is_safe();
    let numbered: Vec<String> = lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let line = if escape_lines {
                stream.escape(line)
            } else {
                (*line).to_string()
            };
            format!("{:>width$}. {line}", idx + 1)
        })
        .collect();
    Ok(Value::safe(numbered.join("\n")))
}

pub(crate) fn lower(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    Ok(Value::String(input.to_safe_string().to_lower()))
}

pub(crate) fn upper(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    Ok(Value::String(input.to_safe_string().to_upper()))
}

/// Removes the space separated list of tags named by `arg`, keeping their content.
pub(crate) fn removetags(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    let names = arg.to_safe_string();
    let tags: Vec<String> = names.as_str().split_whitespace().map(regex::escape).collect();
    if tags.is_empty() {
        return Ok(Value::String(s));
    }
    let alternatives = tags.join("|");
    let compile = |pattern: String| {
        Regex::new(&pattern)
            .map_err(|err| Error::render(ErrorKind::TagSyntax, format!("removetags: {err}")))
    };
    let start_tag = compile(format!(r"<({alternatives})(/?>|(\s+[^>]*>))"))?;
    let end_tag = compile(format!(r"</({alternatives})>"))?;
    let out = start_tag.replace_all(s.as_str(), "");
    let out = end_tag.replace_all(&out, "").into_owned();
    Ok(Value::String(SafeString::with_safety(out, s.safety())))
}

pub(crate) fn safe(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    Ok(Value::String(input.to_safe_string().mark_safe()))
}

pub(crate) fn safeseq(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let items = input.as_list().unwrap_or_default();
    Ok(Value::List(
        items
            .iter()
            .map(|item| Value::String(item.to_safe_string().mark_safe()))
            .collect(),
    ))
}

/// Lowercase ASCII words joined by hyphens.
pub(crate) fn slugify(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    let ascii: String = s.as_str().chars().filter(char::is_ascii).collect();
    let cleaned = NON_SLUG.replace_all(&ascii, "");
    let lowered = cleaned.trim().to_lowercase();
    Ok(Value::safe(SLUG_SEPARATOR.replace_all(&lowered, "-").into_owned()))
}

pub(crate) fn striptags(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    Ok(Value::from(ANY_TAG.replace_all(s.as_str(), "").into_owned()))
}

/// Uppercases the first letter after whitespace and lowercases the rest.
pub(crate) fn title(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    let mut out = String::with_capacity(s.as_str().len());
    let mut upper_next = true;
    for c in s.as_str().chars() {
        if upper_next {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper_next = c.is_whitespace();
    }
    Ok(Value::from(out))
}

pub(crate) fn truncatechars(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    let count = width_arg(arg);
    if char_len(s.as_str()) <= count {
        return Ok(Value::String(s));
    }
    let mut out: String = s.as_str().chars().take(count).collect();
    out.push_str(ELLIPSIS);
    Ok(Value::from(out))
}

pub(crate) fn truncatewords(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let Some(count) = arg.as_int().and_then(|n| usize::try_from(n).ok()) else {
        return Ok(input.clone());
    };
    let s = input.to_safe_string();
    let mut words: Vec<&str> = s.as_str().split(' ').filter(|w| !w.is_empty()).collect();
    if words.len() > count {
        words.truncate(count);
        if !words.last().is_some_and(|w| w.ends_with(ELLIPSIS)) {
            words.push(ELLIPSIS);
        }
    }
    Ok(Value::from(words.join(" ")))
}

pub(crate) fn wordcount(input: &Value, _: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    Ok(Value::from(s.as_str().split_whitespace().count() as i64))
}

/// Wraps at spaces so no line exceeds `arg` columns, keeping existing newlines.
pub(crate) fn wordwrap(input: &Value, arg: &Value, _: bool, _: &OutputStream<'_>) -> FilterResult {
    let s = input.to_safe_string();
    let width = width_arg(arg);
    let last_line_len = |word: &str| word.rsplit('\n').next().map_or(0, char_len);
    let mut words = s.as_str().split(' ').filter(|w| !w.is_empty());
    let Some(first) = words.next() else {
        return Ok(Value::from(""));
    };
    let mut out = first.to_string();
    let mut pos = last_line_len(first);
    for word in words {
        let first_line_len = word.split('\n').next().map_or(0, char_len);
        pos += first_line_len + 1;
        if pos > width {
            out.push('\n');
            pos = last_line_len(word);
        } else {
            out.push(' ');
            if word.contains('\n') {
                pos = last_line_len(word);
            }
        }
        out.push_str(word);
    }
    Ok(Value::from(out))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::defaultfilters::test_support::{render, render_empty};

    #[test]
    fn case_filters() {
        let data = json!({"s": "hello wORLD & co"});
        assert_eq!(render("{{ s|upper }}", data.clone()), "HELLO WORLD &amp; CO");
        assert_eq!(render("{{ s|lower }}", data.clone()), "hello world &amp; co");
        assert_eq!(render("{{ s|capfirst }}", data.clone()), "Hello wORLD &amp; co");
        assert_eq!(render("{{ s|title }}", data), "Hello World &amp; Co");
        assert_eq!(render_empty("{{ \"they're\"|title }}"), "They're");
    }

    #[test]
    fn upper_unmarks_safe_input() {
        let data = json!({"s": "a&b"});
        assert_eq!(render("{{ s|safe|upper }}", data.clone()), "A&amp;B");
        assert_eq!(render("{{ s|safe|lower }}", data), "a&b");
    }

    #[test]
    fn escaping_filters() {
        let data = json!({"s": "<b>"});
        assert_eq!(render("{{ s|safe }}", data.clone()), "<b>");
        assert_eq!(render("{{ s|escape }}", data.clone()), "&lt;b&gt;");
        assert_eq!(
            render("{% autoescape off %}{{ s|escape }}|{{ s }}{% endautoescape %}", data.clone()),
            "&lt;b&gt;|<b>"
        );
        assert_eq!(render("{{ s|force_escape|safe }}", data.clone()), "&lt;b&gt;");
        assert_eq!(render("{{ s|escape|force_escape }}", data), "&lt;b&gt;");
    }

    #[test]
    fn safeseq_marks_items() {
        let data = json!({"items": ["<a>", "<b>"]});
        assert_eq!(render("{{ items|safeseq|join:\",\" }}", data.clone()), "<a>,<b>");
        assert_eq!(render("{{ items|join:\",\" }}", data), "&lt;a&gt;,&lt;b&gt;");
    }

    #[test]
    fn cut_keeps_safety_unless_cutting_semicolons() {
        let data = json!({"s": "a&amp;b c", "t": "x;y"});
        assert_eq!(render("{{ s|safe|cut:\" \" }}", data.clone()), "a&amp;bc");
        assert_eq!(render("{{ s|cut:\" \" }}", data.clone()), "a&amp;amp;bc");
        assert_eq!(render("{{ t|safe|cut:\";\" }}", data), "xy");
    }

    #[test]
    fn padding_filters() {
        let data = json!({"s": "ab"});
        assert_eq!(render("[{{ s|ljust:5 }}]", data.clone()), "[ab   ]");
        assert_eq!(render("[{{ s|rjust:5 }}]", data.clone()), "[   ab]");
        assert_eq!(render("[{{ s|center:5 }}]", data.clone()), "[  ab ]");
        assert_eq!(render("[{{ s|center:1 }}]", data.clone()), "[ab]");
    }

    #[test]
    fn padding_width_is_bounded() {
        let data = json!({"s": "ab"});
        for filter in ["ljust", "rjust", "center"] {
            let source = format!("{{{{ s|{filter}:9223372036854775807|length }}}}");
            assert_eq!(render(&source, data.clone()), "4096", "{filter}");
        }
    }

    #[test]
    fn slashes_and_js() {
        let data = json!({"s": "a'b\"c\\"});
        assert_eq!(
            render("{% autoescape off %}{{ s|addslashes }}{% endautoescape %}", data),
            "a\\'b\\\"c\\\\"
        );
        let data = json!({"s": "<a href='x'>\n"});
        assert_eq!(
            render("{{ s|escapejs }}", data),
            "\\u003Ca href\\u003D\\u0027x\\u0027\\u003E\\u000A"
        );
    }

    #[test]
    fn fix_ampersands_leaves_entities() {
        let data = json!({"s": "a & b &amp; c &#38; d &x"});
        assert_eq!(
            render("{{ s|safe|fix_ampersands }}", data),
            "a &amp; b &amp; c &#38; d &amp;x"
        );
    }

    #[test]
    fn floatformat_precision() {
        let data = json!({"x": 34.23234, "y": 34.0, "s": "2.5"});
        assert_eq!(render("{{ x|floatformat }}", data.clone()), "34.2");
        assert_eq!(render("{{ x|floatformat:3 }}", data.clone()), "34.232");
        assert_eq!(render("{{ y|floatformat:-3 }}", data.clone()), "34");
        assert_eq!(render("{{ x|floatformat:-3 }}", data.clone()), "34.232");
        assert_eq!(render("{{ s|floatformat:2 }}", data), "2.50");
    }

    #[test]
    fn floatformat_decimals_are_bounded() {
        let data = json!({"x": 0.5});
        let out = render("{{ x|floatformat:-9223372036854775808 }}", data.clone());
        assert_eq!(out.len(), "0.".len() + 64, "{out}");
        assert!(out.starts_with("0.5000"), "{out}");
        let out = render("{{ x|floatformat:1000 }}", data);
        assert_eq!(out.len(), "0.".len() + 64, "{out}");
    }

    #[test]
    fn line_filters() {
        let data = json!({"s": "a<\nb\n\nc"});
        assert_eq!(render("{{ s|linebreaksbr }}", data.clone()), "a&lt;<br />b<br /><br />c");
        assert_eq!(
            render("{{ s|linebreaks }}", data.clone()),
            "<p>a&lt;<br />b</p>\n\n<p>c</p>"
        );
        assert_eq!(
            render("{% autoescape off %}{{ s|linebreaksbr }}{% endautoescape %}", data.clone()),
            "a<<br />b<br /><br />c"
        );
        assert_eq!(render("{{ s|linenumbers }}", data), "1. a&lt;\n2. b\n3. \n4. c");
    }

    #[test]
    fn linenumbers_pads_to_widest_number() {
        let text = (1..=10).map(|n| n.to_string()).collect::<Vec<_>>().join("\n");
        let out = render("{{ s|linenumbers }}", json!({ "s": text }));
        assert!(out.starts_with(" 1. 1\n 2. 2"), "{out}");
        assert!(out.ends_with("10. 10"), "{out}");
    }

    #[test]
    fn tag_stripping() {
        let data = json!({"s": "<b>bold</b> <i>it</i><br/>"});
        assert_eq!(render("{{ s|striptags }}", data.clone()), "bold it");
        assert_eq!(
            render("{{ s|removetags:\"b br\"|safe }}", data.clone()),
            "bold <i>it</i>"
        );
        assert_eq!(
            render("{{ s|safe|removetags:\"i\" }}", data),
            "<b>bold</b> it<br/>"
        );
    }

    #[test]
    fn slugify_words() {
        let data = json!({"s": " Jack & Jill like numbers 1,2,3 and 4 and silly characters ?%.$!/"});
        assert_eq!(
            render("{{ s|slugify }}", data),
            "jack-jill-like-numbers-123-and-4-and-silly-characters"
        );
        assert_eq!(render_empty("{{ \"Über  cool\"|slugify }}"), "ber-cool");
    }

    #[test]
    fn truncation() {
        let data = json!({"s": "A sentence with a few words in it"});
        assert_eq!(render("{{ s|truncatewords:1 }}", data.clone()), "A ...");
        assert_eq!(
            render("{{ s|truncatewords:5 }}", data.clone()),
            "A sentence with a few ..."
        );
        assert_eq!(
            render("{{ s|truncatewords:100 }}", data.clone()),
            "A sentence with a few words in it"
        );
        assert_eq!(
            render("{{ s|truncatewords:\"x\" }}", data.clone()),
            "A sentence with a few words in it"
        );
        assert_eq!(render("{{ s|truncatechars:10 }}", data.clone()), "A sentence...");
        assert_eq!(render("{{ s|wordcount }}", data), "8");
    }

    #[test]
    fn wordwrap_breaks_lines() {
        assert_eq!(
            render("{{ s|wordwrap:5 }}", json!({"s": "Joel is a slug"})),
            "Joel\nis a\nslug"
        );
        assert_eq!(
            render(
                "{{ s|wordwrap:14 }}",
                json!({"s": "this is a long\nparagraph of text"})
            ),
            "this is a long\nparagraph of\ntext"
        );
    }
}

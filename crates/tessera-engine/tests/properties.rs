// SPDX-License-Identifier: Apache-2.0 OR MIT
use serde_json::json;
use tessera_engine::{
    tokenize, Context, Engine, Error, ErrorKind, Library, Node, OutputStream, SafeString,
    TokenKind, Value,
};

fn engine(smart_trim: bool) -> Engine {
    let lib = Library::builder()
        .tag_fn("nothing", |_, _| Ok(Node::text("")))
        .tag_fn("if", |_, parser| {
            let body = parser.parse(&["endif"])?;
            parser.remove_next_token();
            drop(body);
            Ok(Node::text(""))
        })
        .safe_filter_fn("keep", |input, _, _, _| Ok(Value::String(input.to_safe_string())))
        .filter_fn("shout", |input, _, _, _| {
            Ok(Value::String(input.to_safe_string().to_upper()))
        })
        .build();
    Engine::builder()
        .library("props", lib)
        .default_library("props")
        .smart_trim(smart_trim)
        .build()
}

fn render(engine: &Engine, source: &str, data: serde_json::Value) -> Result<String, Error> {
    engine
        .new_template(source, "props")?
        .render(&mut Context::from_json(data))
}

#[test]
fn literal_text_round_trips() {
    for source in ["", "plain", "a } b % c # d", "{ not syntax }", "line\n  two\n"] {
        let tokens = tokenize(source, false);
        let texts: Vec<_> = tokens
            .iter()
            .filter(|t| !(t.kind == TokenKind::Text && t.content.is_empty()))
            .collect();
        assert!(texts.len() <= 1, "{source:?} lexed into {texts:?}");
        assert!(texts.iter().all(|t| t.kind == TokenKind::Text));

        let template = engine(false).new_template(source, "literal").unwrap();
        assert!(!template.nodes().contains_non_text());
        assert_eq!(template.render(&mut Context::new()).unwrap(), source);
    }
}

#[test]
fn safe_filters_do_not_double_escape() {
    let engine = engine(false);
    let template = engine.new_template("{{ input|keep }}", "safe").unwrap();
    let mut ctx = Context::new();
    ctx.insert("input", Value::String(SafeString::safe("<b>&amp;</b>")));
    assert_eq!(template.render(&mut ctx).unwrap(), "<b>&amp;</b>");

    let mut ctx = Context::new();
    ctx.insert("input", "<b>");
    assert_eq!(template.render(&mut ctx).unwrap(), "&lt;b&gt;");
}

#[test]
fn unsafe_filter_output_is_escaped() {
    let engine = engine(false);
    let mut ctx = Context::new();
    ctx.insert("input", Value::String(SafeString::safe("<b>")));
    let template = engine.new_template("{{ input|shout }}", "unsafe").unwrap();
    assert_eq!(template.render(&mut ctx).unwrap(), "&lt;B&gt;");
}

#[test]
fn escaping_is_idempotent_across_renders() {
    let engine = engine(false);
    let template = engine.new_template("{{ input }}", "escape").unwrap();
    for data in [json!({"input": "<i>"}), json!({"input": "<i>"}), json!({"input": "&"})] {
        let expected = if data["input"] == "&" { "&amp;" } else { "&lt;i&gt;" };
        assert_eq!(template.render(&mut Context::from_json(data)).unwrap(), expected);
    }
}

#[test]
fn context_scoping() {
    let mut ctx = Context::new();
    ctx.push();
    ctx.insert("x", "A");
    ctx.push();
    ctx.insert("x", "B");
    assert_eq!(ctx.lookup("x"), Value::from("B"));
    ctx.pop();
    assert_eq!(ctx.lookup("x"), Value::from("A"));
    ctx.pop();
    assert!(!ctx.lookup("x").is_valid());
}

#[test]
fn unclosed_tags_never_truncate() {
    let err = render(&engine(false), "{% if cond %}body", json!({})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnclosedBlockTag);
}

#[test]
fn unknown_tags_are_named() {
    let err = render(&engine(false), "{% nosuchtag %}", json!({})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidBlockTag);
    assert!(err.to_string().contains("nosuchtag"));
}

#[test]
fn hello_world() {
    let engine = engine(false);
    assert_eq!(
        render(&engine, "Hello, {{ name }}!", json!({"name": "World"})).unwrap(),
        "Hello, World!"
    );
    assert_eq!(
        render(&engine, "Hello, {{ name }}!", json!({"name": "<b>World</b>"})).unwrap(),
        "Hello, &lt;b&gt;World&lt;/b&gt;!"
    );
}

#[test]
fn filter_grammar_rejects_gaps() {
    for source in ["{{ a||b }}", "{{ a: }}"] {
        let err = render(&engine(false), source, json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TagSyntax, "{source}");
    }
}

#[test]
fn smart_trim_elides_tag_only_lines() {
    let source = "first\n    {% nothing %}\nsecond {% nothing %} line\n\t{# note #}  \nthird";
    assert_eq!(
        render(&engine(true), source, json!({})).unwrap(),
        "first\nsecond  line  \nthird"
    );
    assert_eq!(
        render(&engine(false), source, json!({})).unwrap(),
        "first\n    \nsecond  line\n\t  \nthird"
    );
}

#[test]
fn streaming_render_keeps_partial_output() {
    let engine = Engine::builder()
        .library(
            "failing",
            Library::builder()
                .filter_fn("boom", |_, _, _, _| {
                    Err(Error::render(ErrorKind::TagSyntax, "boom"))
                })
                .build(),
        )
        .default_library("failing")
        .build();
    let template = engine.new_template("before {{ x|boom }} after", "partial").unwrap();
    let mut out = String::new();
    let err = {
        let mut stream = OutputStream::new(&mut out);
        template.render_to(&mut stream, &mut Context::new()).unwrap_err()
    };
    assert_eq!(out, "before ");
    assert_eq!(err.template(), Some("partial"));
}

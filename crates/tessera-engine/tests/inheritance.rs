// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::sync::Arc;

use serde_json::json;
use tessera_engine::{Context, Engine, Error, ErrorKind, InMemoryTemplateLoader, Value};

fn engine_with(templates: &[(&str, &str)]) -> (Engine, Arc<InMemoryTemplateLoader>) {
    let loader = Arc::new(InMemoryTemplateLoader::new());
    for (name, source) in templates {
        loader.set_template(*name, *source);
    }
    let engine = Engine::builder().shared_loader(loader.clone()).build();
    (engine, loader)
}

fn render(engine: &Engine, name: &str, ctx: &mut Context) -> String {
    engine
        .load_by_name(name)
        .unwrap_or_else(|err| panic!("load {name} failed: {err}"))
        .render(ctx)
        .unwrap_or_else(|err| panic!("render {name} failed: {err}"))
}

const PARENT: &str = "A{% block b %}P{% endblock %}B";

#[test]
fn child_block_replaces_parent_block() {
    let (engine, _) = engine_with(&[
        ("parent", PARENT),
        ("child", r#"{% extends "parent" %}{% block b %}C{% endblock %}"#),
    ]);
    assert_eq!(render(&engine, "child", &mut Context::new()), "ACB");
}

#[test]
fn block_super_prepends_parent_content() {
    let (engine, _) = engine_with(&[
        ("parent", PARENT),
        ("child", r#"{% extends "parent" %}{% block b %}{{ block.super }}C{% endblock %}"#),
    ]);
    assert_eq!(render(&engine, "child", &mut Context::new()), "APCB");
}

#[test]
fn super_content_is_not_escaped() {
    let (engine, _) = engine_with(&[
        ("parent", "{% block b %}<p>{{ x }}</p>{% endblock %}"),
        ("child", r#"{% extends "parent" %}{% block b %}{{ block.super }}!{% endblock %}"#),
    ]);
    let mut ctx = Context::from_json(json!({"x": "<i>"}));
    assert_eq!(render(&engine, "child", &mut ctx), "<p>&lt;i&gt;</p>!");
}

#[test]
fn root_template_renders_its_own_blocks() {
    let (engine, _) = engine_with(&[("parent", PARENT)]);
    assert_eq!(render(&engine, "parent", &mut Context::new()), "APB");
}

#[test]
fn unknown_blocks_in_the_child_are_ignored() {
    let (engine, _) = engine_with(&[
        ("parent", PARENT),
        ("child", r#"{% extends "parent" %}ignored{% block other %}X{% endblock %}"#),
    ]);
    assert_eq!(render(&engine, "child", &mut Context::new()), "APB");
}

#[test]
fn three_level_chain_sees_grandchild_override() {
    let (engine, _) = engine_with(&[
        ("base", "<{% block head %}h{% endblock %}|{% block body %}b{% endblock %}>"),
        ("middle", r#"{% extends "base" %}{% block head %}H{% endblock %}"#),
        ("leaf", r#"{% extends "middle" %}{% block body %}B{% endblock %}"#),
    ]);
    assert_eq!(render(&engine, "leaf", &mut Context::new()), "<H|B>");
    assert_eq!(render(&engine, "middle", &mut Context::new()), "<H|b>");
}

#[test]
fn super_chains_walk_every_ancestor() {
    let (engine, _) = engine_with(&[
        ("base", "{% block b %}1{% endblock %}"),
        ("middle", r#"{% extends "base" %}{% block b %}{{ block.super }}2{% endblock %}"#),
        ("leaf", r#"{% extends "middle" %}{% block b %}{{ block.super }}3{% endblock %}"#),
    ]);
    assert_eq!(render(&engine, "leaf", &mut Context::new()), "123");
}

#[test]
fn nested_blocks_can_be_overridden_separately() {
    let (engine, _) = engine_with(&[
        ("base", "{% block outer %}[{% block inner %}i{% endblock %}]{% endblock %}"),
        ("child", r#"{% extends "base" %}{% block inner %}I{% endblock %}"#),
    ]);
    assert_eq!(render(&engine, "child", &mut Context::new()), "[I]");
}

#[test]
fn parent_may_come_from_a_variable() {
    let (engine, _) = engine_with(&[
        ("parent", PARENT),
        ("child", "{% extends parent_name %}{% block b %}V{% endblock %}"),
    ]);
    let mut ctx = Context::from_json(json!({"parent_name": "parent"}));
    assert_eq!(render(&engine, "child", &mut ctx), "AVB");
}

#[test]
fn parent_may_be_a_compiled_template() {
    let (engine, _) = engine_with(&[]);
    let parent = engine.new_template(PARENT, "in-memory-parent").unwrap();
    let child = engine
        .new_template("{% extends base %}{% block b %}T{% endblock %}", "child")
        .unwrap();
    let mut ctx = Context::new();
    ctx.insert("base", Value::Template(parent));
    assert_eq!(child.render(&mut ctx).unwrap(), "ATB");
}

#[test]
fn rendering_twice_gives_independent_block_state() {
    let (engine, _) = engine_with(&[
        ("parent", PARENT),
        ("child", r#"{% extends "parent" %}{% block b %}{{ n }}{% endblock %}"#),
    ]);
    let child = engine.load_by_name("child").unwrap();
    let mut first = Context::from_json(json!({"n": 1}));
    let mut second = Context::from_json(json!({"n": 2}));
    assert_eq!(child.render(&mut first).unwrap(), "A1B");
    assert_eq!(child.render(&mut second).unwrap(), "A2B");
    assert_eq!(child.render(&mut first).unwrap(), "A1B");
}

#[test]
fn missing_parent_is_a_render_error() {
    let (engine, _) = engine_with(&[("child", r#"{% extends "nowhere" %}x"#)]);
    let child = engine.load_by_name("child").unwrap();
    let err = child.render(&mut Context::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TagSyntax);
    assert!(err.to_string().contains("Template not found, nowhere"));
    assert!(matches!(err, Error::Render { .. }));
    assert_eq!(err.template(), Some("child"));
}

#[test]
fn missing_include_names_the_including_template() {
    let (engine, _) = engine_with(&[
        ("page", r#"a{% include "absent" %}b"#),
        ("dynamic", "{% include name %}"),
    ]);
    let page = engine.load_by_name("page").unwrap();
    let err = page.render(&mut Context::new()).unwrap_err();
    assert!(matches!(err, Error::Render { .. }));
    assert_eq!(err.template(), Some("page"));

    let dynamic = engine.load_by_name("dynamic").unwrap();
    let mut ctx = Context::new();
    ctx.insert("name", "gone");
    let err = dynamic.render(&mut ctx).unwrap_err();
    assert!(err.to_string().contains("Template not found, gone"));
    assert_eq!(err.template(), Some("dynamic"));
}

#[test]
fn duplicate_block_names_fail_to_compile() {
    let engine = Engine::default();
    let err = engine
        .new_template("{% block a %}{% endblock %}{% block a %}{% endblock %}", "dup")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TagSyntax);
    assert!(err.to_string().contains("'block' tag with name 'a' appears more than once"));
}

#[test]
fn extends_must_come_first_and_only_once() {
    let engine = Engine::default();
    let err = engine
        .new_template(r#"{% block a %}{% endblock %}{% extends "p" %}"#, "late")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TagSyntax);
    assert!(err.to_string().contains("Node appeared twice in template"));

    let err = engine
        .new_template(r#"{% extends "p" %}{% extends "q" %}"#, "twice")
        .unwrap_err();
    assert!(err.to_string().contains("Extends tag may only appear once"));

    assert!(engine.new_template(r#"text {% extends "p" %}"#, "text-first").is_ok());
}

#[test]
fn block_tag_arguments_are_checked() {
    let engine = Engine::default();
    let err = engine.new_template("{% block %}{% endblock %}", "t").unwrap_err();
    assert!(err.to_string().contains("block tag takes one argument"));

    let err = engine
        .new_template("{% block a %}{% endblock b %}", "t")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidBlockTag);

    assert!(engine
        .new_template("{% block a %}x{% endblock a %}", "t")
        .is_ok());

    let err = engine.new_template("{% block a %}never closed", "t").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnclosedBlockTag);
}

#[test]
fn mutual_extends_hits_the_depth_guard() {
    let loader = Arc::new(InMemoryTemplateLoader::new());
    loader.set_template("a", r#"{% extends "b" %}"#);
    loader.set_template("b", r#"{% extends "a" %}"#);
    let engine = Engine::builder()
        .shared_loader(loader)
        .max_depth(8)
        .build();
    let err = engine
        .load_by_name("a")
        .unwrap()
        .render(&mut Context::new())
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("Maximum template nesting depth of 8 exceeded"));
}

#[test]
fn include_renders_with_the_callers_context() {
    let (engine, _) = engine_with(&[
        ("item", "<{{ name }}>"),
        ("page", r#"a{% include "item" %}b{% include other %}"#),
    ]);
    let mut ctx = Context::from_json(json!({"name": "n", "other": "item"}));
    assert_eq!(render(&engine, "page", &mut ctx), "a<n>b<n>");
}

#[test]
fn included_blocks_are_not_overridden() {
    let (engine, _) = engine_with(&[
        ("parent", r#"{% block b %}P{% endblock %}|{% include "widget" %}"#),
        ("widget", "{% block b %}W{% endblock %}"),
        ("child", r#"{% extends "parent" %}{% block b %}C{% endblock %}"#),
    ]);
    assert_eq!(render(&engine, "child", &mut Context::new()), "C|W");
}

#[test]
fn include_errors() {
    let (engine, _) = engine_with(&[("page", r#"{% include "missing" %}"#)]);
    let err = engine
        .load_by_name("page")
        .unwrap()
        .render(&mut Context::new())
        .unwrap_err();
    assert!(err.to_string().contains("Template not found, missing"));

    let err = engine.new_template("{% include %}", "bad").unwrap_err();
    assert!(err.to_string().contains("Include tag takes only one argument"));
}

#[test]
fn template_lists_its_blocks() {
    let engine = Engine::default();
    let template = engine
        .new_template(
            "{% block a %}{% block b %}{% endblock %}{% endblock %}{% block c %}{% endblock %}",
            "blocks",
        )
        .unwrap();
    let mut names: Vec<&str> = template.blocks().iter().map(|b| b.name()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn errors_in_a_parent_name_the_parent() {
    let (engine, _) = engine_with(&[
        ("parent", "{% block b %}{% endblock %}{{ x.y }}"),
        ("child", r#"{% extends "parent" %}"#),
    ]);
    let mut ctx = Context::new();
    assert_eq!(render(&engine, "child", &mut ctx), "");

    let (engine, _) = engine_with(&[
        ("parent", "{% nosuchtag %}"),
        ("child", r#"{% extends "parent" %}"#),
    ]);
    let err = engine
        .load_by_name("child")
        .unwrap()
        .render(&mut Context::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidBlockTag);
    assert_eq!(err.template(), Some("parent"));
}

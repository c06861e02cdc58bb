// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::sync::Arc;
use std::thread;

use serde_json::json;
use tessera_engine::{Context, Engine, InMemoryTemplateLoader, Template};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn templates_and_engines_are_shareable() {
    assert_send_sync::<Template>();
    assert_send_sync::<Engine>();
}

#[test]
fn one_template_renders_on_many_threads() {
    let loader = Arc::new(InMemoryTemplateLoader::new());
    loader.set_template("base", "<{% block body %}{% endblock %}>");
    loader.set_template(
        "page",
        r#"{% extends "base" %}{% block body %}{{ who }}#{{ n }}{% endblock %}"#,
    );
    let engine = Engine::builder().shared_loader(loader).build();
    let template = engine.load_by_name("page").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let template = Arc::clone(&template);
            thread::spawn(move || {
                (0..50)
                    .map(|round| {
                        let mut ctx = Context::from_json(json!({"who": "t", "n": n * 100 + round}));
                        template.render(&mut ctx).unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        let outputs = handle.join().expect("render thread panicked");
        for (round, out) in outputs.into_iter().enumerate() {
            assert_eq!(out, format!("<t#{}>", n * 100 + round));
        }
    }
}

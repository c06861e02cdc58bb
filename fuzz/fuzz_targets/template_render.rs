#![no_main]

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;
use serde_json::json;
use tessera_engine::{Context, Engine, InMemoryTemplateLoader};

static ENGINE: Lazy<Engine> = Lazy::new(|| {
    let loader = InMemoryTemplateLoader::new();
    loader.set_template("base", "<{% block content %}base{% endblock %}>");
    loader.set_template("item", "({{ item }})");
    tessera_defaults::install(Engine::builder())
        .loader(loader)
        .default_library(tessera_defaults::MUTABLE_TAGS)
        .build()
});

fuzz_target!(|data: &[u8]| {
    let source = match std::str::from_utf8(data) {
        Ok(src) => src,
        Err(_) => return,
    };

    let data = json!({
        "item": "<b>",
        "items": [1, "two", [3], {"k": "v"}],
        "map": {"a": 1, "b": null},
        "flag": true,
    });

    if let Ok(template) = ENGINE.new_template(source, "fuzz-template-render") {
        let _ = template.render(&mut Context::from_json(data.clone()));
    }
    if let Ok(mut template) = ENGINE.new_mutable_template(source, "fuzz-mutable-render") {
        let mut ctx = Context::from_json(data);
        let _ = template.render(&mut ctx);
        let _ = template.render(&mut ctx);
    }
});

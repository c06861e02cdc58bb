#![no_main]

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;
use tessera_engine::Engine;

static ENGINE: Lazy<Engine> = Lazy::new(|| {
    tessera_defaults::install(Engine::builder())
        .smart_trim(true)
        .build()
});

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        let _ = tessera_engine::tokenize(source, true);
        let _ = ENGINE.new_template(source, "fuzz-template");
    }
});

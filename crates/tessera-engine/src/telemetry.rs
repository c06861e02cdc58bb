// SPDX-License-Identifier: Apache-2.0 OR MIT
#![cfg_attr(not(feature = "telemetry"), allow(dead_code))]

#[cfg(feature = "telemetry")]
mod otel {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::OnceLock;
    use std::time::Duration;

    use opentelemetry::global;
    use opentelemetry::metrics::{Counter, Histogram};
    use opentelemetry::trace::SpanKind;
    use opentelemetry::{trace::Span, trace::Tracer, KeyValue};

    const METER_NAME: &str = "tessera_engine";
    const TRACER_NAME: &str = "tessera_engine";

    static ENABLED: AtomicBool = AtomicBool::new(false);
    static HANDLES: OnceLock<Handles> = OnceLock::new();

    struct Handles {
        tracer: opentelemetry::global::BoxedTracer,
        compile_hist: Histogram<f64>,
        render_hist: Histogram<f64>,
        compile_counter: Counter<u64>,
        render_counter: Counter<u64>,
        filter_counter: Counter<u64>,
    }

    impl Handles {
        fn new() -> Self {
            let meter = global::meter(METER_NAME);
            let compile_hist = meter
                .f64_histogram("tessera.compile.duration_ms")
                .with_description("Template compile duration in milliseconds")
                .init();
            let render_hist = meter
                .f64_histogram("tessera.render.duration_ms")
                .with_description("Render duration in milliseconds")
                .init();
            let compile_counter = meter
                .u64_counter("tessera.compile.count")
                .with_description("Number of template compilations")
                .init();
            let render_counter = meter
                .u64_counter("tessera.render.count")
                .with_description("Number of template renders")
                .init();
            let filter_counter = meter
                .u64_counter("tessera.filter.count")
                .with_description("Number of filter invocations")
                .init();
            let tracer = global::tracer(TRACER_NAME);
            Self {
                tracer,
                compile_hist,
                render_hist,
                compile_counter,
                render_counter,
                filter_counter,
            }
        }
    }

    fn handles() -> &'static Handles {
        HANDLES.get_or_init(Handles::new)
    }

    pub fn enable() {
        ENABLED.store(true, Ordering::Relaxed);
    }

    pub fn disable() {
        ENABLED.store(false, Ordering::Relaxed);
    }

    fn enabled() -> bool {
        ENABLED.load(Ordering::Relaxed)
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        span_name: &'static str,
        prefix: &'static str,
        counter: &Counter<u64>,
        hist: &Histogram<f64>,
        template: &str,
        template_len: usize,
        duration: Duration,
        success: bool,
    ) {
        let hs = handles();
        let duration_ms = duration.as_secs_f64() * 1_000.0;
        let success_key = format!("{prefix}.success");
        let attrs = [
            KeyValue::new("template.name", template.to_string()),
            KeyValue::new("template.length", template_len as i64),
            KeyValue::new(success_key.clone(), success),
        ];
        counter.add(1, &attrs);
        hist.record(duration_ms, &attrs);
        let mut span = hs
            .tracer
            .span_builder(span_name)
            .with_kind(SpanKind::Internal)
            .start(&hs.tracer);
        span.set_attribute(KeyValue::new("template.name", template.to_string()));
        span.set_attribute(KeyValue::new("template.length", template_len as i64));
        span.set_attribute(KeyValue::new(format!("{prefix}.duration_ms"), duration_ms));
        span.set_attribute(KeyValue::new(success_key, success));
        span.end();
    }

    pub fn record_compile(template: &str, template_len: usize, duration: Duration, success: bool) {
        if !enabled() {
            return;
        }
        let hs = handles();
        record(
            "Engine::new_template",
            "compile",
            &hs.compile_counter,
            &hs.compile_hist,
            template,
            template_len,
            duration,
            success,
        );
    }

    pub fn record_render(template: &str, template_len: usize, duration: Duration, success: bool) {
        if !enabled() {
            return;
        }
        let hs = handles();
        record(
            "Template::render",
            "render",
            &hs.render_counter,
            &hs.render_hist,
            template,
            template_len,
            duration,
            success,
        );
    }

    pub fn record_filter_invocation(name: &str, success: bool) {
        if !enabled() {
            return;
        }
        let hs = handles();
        let attrs = [
            KeyValue::new("filter.name", name.to_string()),
            KeyValue::new("filter.success", success),
        ];
        hs.filter_counter.add(1, &attrs);
    }
}

#[cfg(not(feature = "telemetry"))]
mod otel {
    use std::time::Duration;

    pub fn enable() {}
    pub fn disable() {}
    pub fn record_compile(
        _template: &str,
        _template_len: usize,
        _duration: Duration,
        _success: bool,
    ) {
    }
    pub fn record_render(
        _template: &str,
        _template_len: usize,
        _duration: Duration,
        _success: bool,
    ) {
    }

    pub fn record_filter_invocation(_name: &str, _success: bool) {}
}

pub use otel::{disable, enable, record_compile, record_filter_invocation, record_render};

//! Benchmarks for thread execution and dispatch.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use eventflow::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn noop_specs(count: usize) -> Vec<Spec> {
    (0..count)
        .map(|i| FunctionSpec::new(format!("step{i}"), &["draft"], |_| Ok(())).into())
        .collect()
}

fn thread_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    c.bench_function("thread_100_functions", |b| {
        let ctx = Arc::new(Context::new(Arc::new(NullBus)));
        b.iter(|| {
            rt.block_on(async {
                let thread = ctx.thread(noop_specs(100));
                let event = Arc::new(ctx.event("save").with_value("draft", json!("x")));
                let handle = thread.run(event, |_| {}, |_, _, _| {}).expect("run");
                handle.await.expect("join");
                black_box(thread.executed().len())
            })
        });
    });

    c.bench_function("dispatch_to_10_controllers", |b| {
        let bus = Arc::new(LocalBus::new());
        let ctx = Arc::new(Context::new(bus.clone()));
        for i in 0..10 {
            let controller = Arc::new(ctx.controller(format!("c{i}")));
            bus.listen(&controller, "save", noop_specs(5));
        }
        b.iter(|| {
            rt.block_on(async {
                let event = ctx
                    .dispatch(ctx.event("save").with_value("draft", json!("x")))
                    .expect("dispatch");
                black_box(event.settled().await.is_ok())
            })
        });
    });
}

criterion_group!(benches, thread_benchmark);
criterion_main!(benches);

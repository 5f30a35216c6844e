use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::future::join_all;
use modexec_tonic_server::{
    ExecService,
    modexec_tonic_core::{
        ExecutableModule, ExecutionOutcome,
        proto::{ExecuteArgs, module_service_server::ModuleService},
    },
};
use tokio::runtime::Builder;
use tonic::Request;

/// Returns its input, so the bench measures only the adapter's own overhead.
struct Passthrough;

#[tonic::async_trait]
impl ExecutableModule for Passthrough {
    type Context = ();

    async fn execute(&self, _: &(), params_json: String) -> ExecutionOutcome {
        Ok(params_json)
    }
}

fn adapter_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let svc = ExecService::new(Passthrough, ());
    let payload = r#"{"x":1,"tags":["a","b","c"]}"#.to_string();

    let mut group = c.benchmark_group("adapter/execute");
    for concurrency in [1_usize, 16, 256] {
        group.throughput(Throughput::Elements(concurrency as u64));
        group.bench_function(format!("conc/{concurrency}"), |b| {
            b.to_async(&rt).iter(|| {
                let calls = (0..concurrency).map(|_| {
                    svc.execute(Request::new(ExecuteArgs {
                        params_json: payload.clone(),
                    }))
                });
                async move {
                    for res in join_all(calls).await {
                        black_box(res.unwrap());
                    }
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, adapter_bench);
criterion_main!(benches);

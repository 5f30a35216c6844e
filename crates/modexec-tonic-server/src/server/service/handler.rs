//! gRPC adapter between the `ModuleService` RPCs and an
//! [`ExecutableModule`].
//!
//! [`ExecService`] implements the generated [`ModuleService`] trait directly.
//! It holds the module and its context behind [`Arc`]s and nothing else: no
//! per-call state, no locks, no queues. Every `Execute` call is an independent
//! future that tonic drives concurrently with all others, so a slow module
//! invocation never holds up a fast one.
//!
//! ## Outcome mapping
//!
//! - `Ok(payload)` becomes `ExecuteResponse { response_json: payload }`.
//! - `Err(e)` becomes a [`Status`] with `e`'s code and exactly `e`'s message.
//! - A module that panics instead of returning is reported as
//!   `Status::internal`, and the service keeps serving.
//!
//! There is no timeout, retry or cancellation policy here. If the client goes
//! away tonic drops the handler future, which drops the module's future with
//! it.

use crate::server::telemetry::{
    InflightGuard, increment_execution_errors, increment_executions, record_execution_duration,
};
use core::panic::AssertUnwindSafe;
use futures::FutureExt;
use modexec_tonic_core::{
    Error, ExecutableModule, ExecutionOutcome,
    proto::{ExecuteArgs, ExecuteResponse, module_service_server::ModuleService},
};
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// Message reported when a module panics instead of returning an outcome.
pub const MODULE_PANICKED: &str = "execution unit panicked";

/// Serves a single [`ExecutableModule`] over the `ModuleService` RPCs.
///
/// Cloning is cheap and every clone shares the same module and context.
pub struct ExecService<M: ExecutableModule> {
    module: Arc<M>,
    context: Arc<M::Context>,
}

impl<M: ExecutableModule> Clone for ExecService<M> {
    fn clone(&self) -> Self {
        Self {
            module: Arc::clone(&self.module),
            context: Arc::clone(&self.context),
        }
    }
}

impl<M: ExecutableModule> ExecService<M> {
    pub fn new(module: M, context: M::Context) -> Self {
        Self::from_shared(Arc::new(module), Arc::new(context))
    }

    /// Builds the service around a module and context that are also held
    /// elsewhere.
    pub fn from_shared(module: Arc<M>, context: Arc<M::Context>) -> Self {
        Self { module, context }
    }

    pub fn context(&self) -> &M::Context {
        &self.context
    }

    /// Runs the module once, turning a panic into an
    /// [`Error::Internal`].
    async fn run_module(&self, params_json: String) -> ExecutionOutcome {
        AssertUnwindSafe(self.module.execute(&self.context, params_json))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(Error::internal(MODULE_PANICKED)))
    }
}

#[tonic::async_trait]
impl<M: ExecutableModule> ModuleService for ExecService<M> {
    /// Liveness probe. Never consults the module.
    async fn is_available(&self, _req: Request<()>) -> Result<Response<()>, Status> {
        Ok(Response::new(()))
    }

    /// Forwards `params_json` to the module and reports its outcome.
    ///
    /// If `metrics` is enabled, emits telemetry for:
    /// - call rate
    /// - calls in flight
    /// - call duration
    /// - errors, by status code
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(params_len = req.get_ref().params_json.len()))
    )]
    async fn execute(
        &self,
        req: Request<ExecuteArgs>,
    ) -> Result<Response<ExecuteResponse>, Status> {
        let start = std::time::Instant::now();
        increment_executions();

        let ExecuteArgs { params_json } = req.into_inner();
        let outcome = {
            let _inflight = InflightGuard::enter();
            self.run_module(params_json).await
        };
        record_execution_duration(start.elapsed().as_secs_f64() * 1000.0);

        match outcome {
            Ok(response_json) => Ok(Response::new(ExecuteResponse { response_json })),
            Err(err) => {
                increment_execution_errors(err.code());
                #[cfg(feature = "tracing")]
                tracing::warn!(code = ?err.code(), "Module returned an error: {err}");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tonic::Code;

    /// Answers from a fixed table, rejecting unknown params.
    struct TableModule(HashMap<String, String>);

    #[tonic::async_trait]
    impl ExecutableModule for TableModule {
        type Context = ();

        async fn execute(&self, _: &(), params_json: String) -> ExecutionOutcome {
            self.0
                .get(&params_json)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("no entry for {params_json}")))
        }
    }

    struct RejectAll;

    #[tonic::async_trait]
    impl ExecutableModule for RejectAll {
        type Context = ();

        async fn execute(&self, _: &(), _: String) -> ExecutionOutcome {
            Err(Error::invalid_argument("invalid argument"))
        }
    }

    /// Holds "slow" calls until released; everything else returns at once.
    struct Gated {
        release: Notify,
    }

    #[tonic::async_trait]
    impl ExecutableModule for Gated {
        type Context = ();

        async fn execute(&self, _: &(), params_json: String) -> ExecutionOutcome {
            if params_json == "slow" {
                self.release.notified().await;
            }
            Ok(format!("done:{params_json}"))
        }
    }

    /// Stateful: every call sees a different count.
    struct Counter(AtomicUsize);

    #[tonic::async_trait]
    impl ExecutableModule for Counter {
        type Context = ();

        async fn execute(&self, _: &(), _: String) -> ExecutionOutcome {
            Ok(self.0.fetch_add(1, Ordering::SeqCst).to_string())
        }
    }

    struct Panicky;

    #[tonic::async_trait]
    impl ExecutableModule for Panicky {
        type Context = ();

        async fn execute(&self, _: &(), params_json: String) -> ExecutionOutcome {
            if params_json == "boom" {
                panic!("module blew up");
            }
            Ok(params_json)
        }
    }

    struct Network {
        name: &'static str,
    }

    /// Reports the context it was handed.
    struct ContextEcho;

    #[tonic::async_trait]
    impl ExecutableModule for ContextEcho {
        type Context = Network;

        async fn execute(&self, ctx: &Network, params_json: String) -> ExecutionOutcome {
            Ok(format!("{}:{params_json}", ctx.name))
        }
    }

    async fn call<M: ExecutableModule>(
        svc: &ExecService<M>,
        params: &str,
    ) -> Result<String, Status> {
        svc.execute(Request::new(ExecuteArgs {
            params_json: params.to_string(),
        }))
        .await
        .map(|resp| resp.into_inner().response_json)
    }

    #[tokio::test]
    async fn success_payload_is_returned_unmodified() {
        let table = HashMap::from([(r#"{"x":1}"#.to_string(), r#"{"result":42}"#.to_string())]);
        let svc = ExecService::new(TableModule(table), ());

        assert_eq!(call(&svc, r#"{"x":1}"#).await.unwrap(), r#"{"result":42}"#);
    }

    #[tokio::test]
    async fn failure_is_reported_verbatim() {
        let svc = ExecService::new(RejectAll, ());

        let status = call(&svc, "{}").await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "invalid argument");
    }

    #[tokio::test]
    async fn error_code_survives_mapping() {
        let table = HashMap::new();
        let svc = ExecService::new(TableModule(table), ());

        let status = call(&svc, "missing").await.unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "no entry for missing");
    }

    #[tokio::test]
    async fn availability_ignores_module_health() {
        let svc = ExecService::new(RejectAll, ());

        for _ in 0..3 {
            assert!(call(&svc, "{}").await.is_err());
            assert!(svc.is_available(Request::new(())).await.is_ok());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fast_call_does_not_wait_for_slow_call() {
        let svc = ExecService::new(
            Gated {
                release: Notify::new(),
            },
            (),
        );

        let slow = {
            let svc = svc.clone();
            tokio::spawn(async move { call(&svc, "slow").await })
        };

        assert_eq!(call(&svc, "fast").await.unwrap(), "done:fast");
        assert!(!slow.is_finished());

        svc.module.release.notify_one();
        assert_eq!(slow.await.unwrap().unwrap(), "done:slow");
    }

    #[tokio::test]
    async fn repeated_calls_are_not_deduplicated() {
        let svc = ExecService::new(Counter(AtomicUsize::new(0)), ());

        let first = call(&svc, "same").await.unwrap();
        let second = call(&svc, "same").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn panicking_module_fails_the_call_only() {
        let svc = ExecService::new(Panicky, ());

        let status = call(&svc, "boom").await.unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), MODULE_PANICKED);

        assert_eq!(call(&svc, "fine").await.unwrap(), "fine");
        assert!(svc.is_available(Request::new(())).await.is_ok());
    }

    #[tokio::test]
    async fn context_is_shared_across_clones() {
        let svc = ExecService::new(ContextEcho, Network { name: "net-a" });
        let other = svc.clone();

        assert!(core::ptr::eq(svc.context(), other.context()));
        assert_eq!(call(&other, "p").await.unwrap(), "net-a:p");
    }
}

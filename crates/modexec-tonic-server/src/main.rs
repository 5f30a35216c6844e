//! `modexec-server`: serves a JSON echo module.
//!
//! The module is built from `SERIALIZED_CUSTOM_PARAMS`, e.g.
//! `{"greeting": "hello"}`. Each `Execute` call must carry a JSON document in
//! `params_json` and is answered with `{"greeting": ..., "params": ...}`.
//! Anything that is not valid JSON is rejected with `INVALID_ARGUMENT`.
//!
//! Real deployments link `modexec-tonic-server` as a library and supply their
//! own [`ModuleConfigurator`]; this binary doubles as a smoke-test target.

use clap::Parser;
use modexec_tonic_server::{
    CliArgs, ModuleConfigurator, ModuleExecutor, ServerConfig,
    modexec_tonic_core::{Error, ExecutableModule, ExecutionOutcome},
    server::telemetry::init_telemetry,
    shutdown_signal,
};
use serde::{Deserialize, Serialize};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Deserialize)]
struct EchoParams {
    greeting: String,
}

#[derive(Serialize)]
struct EchoResponse<'a> {
    greeting: &'a str,
    params: serde_json::Value,
}

struct EchoModule {
    greeting: String,
}

#[tonic::async_trait]
impl ExecutableModule for EchoModule {
    type Context = ();

    async fn execute(&self, _: &(), params_json: String) -> ExecutionOutcome {
        let params: serde_json::Value = serde_json::from_str(&params_json)
            .map_err(|e| Error::invalid_argument(format!("params are not valid JSON: {e}")))?;

        serde_json::to_string(&EchoResponse {
            greeting: &self.greeting,
            params,
        })
        .map_err(|e| Error::internal(format!("failed to serialize response: {e}")))
    }
}

struct EchoConfigurator;

impl ModuleConfigurator for EchoConfigurator {
    type Module = EchoModule;

    fn parse_params_and_create_module(
        &self,
        serialized_params: &str,
    ) -> anyhow::Result<EchoModule> {
        let EchoParams { greeting } = serde_json::from_str(serialized_params)?;
        Ok(EchoModule { greeting })
    }

    fn create_context(&self, _config: &ServerConfig) -> anyhow::Result<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let res = ModuleExecutor::new(EchoConfigurator)
        .run(config, shutdown_signal())
        .await;

    #[cfg(feature = "tracing")]
    if let Err(e) = &res {
        tracing::error!("Server exited with an error: {e:#}");
    }

    providers.shutdown();
    res
}

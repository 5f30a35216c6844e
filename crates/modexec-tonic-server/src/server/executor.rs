//! Process bootstrap: from configuration to a serving gRPC endpoint.
//!
//! [`ModuleExecutor`] asks its [`ModuleConfigurator`] for the module and
//! context, binds a TCP or Unix socket listener and serves the
//! `ModuleService` alongside the standard gRPC health and reflection
//! services. gRPC-Web clients are accepted through `tonic-web` with
//! permissive CORS.
//!
//! ## Shutdown
//!
//! Once the caller's shutdown future resolves, the health status flips to
//! `NOT_SERVING`, the listener stops accepting connections and in-flight calls
//! are given the configured grace period to finish. Calls still running after
//! that are cut off with `UNAVAILABLE` (see [`HardStopLayer`]) and the server
//! returns, so the process can exit.

use crate::server::{
    config::ServerConfig,
    configurator::ModuleConfigurator,
    hard_stop::HardStopLayer,
    service::handler::ExecService,
};
use anyhow::Context;
use core::{future::Future, time::Duration};
use futures::Stream;
use modexec_tonic_core::{
    ExecutableModule,
    proto::{FILE_DESCRIPTOR_SET, module_service_server::ModuleServiceServer},
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::time::timeout;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::server::Connected;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// How long cancelled calls get to deliver their `UNAVAILABLE` status.
const HARD_STOP_FLUSH: Duration = Duration::from_millis(500);

/// Runs a configured module behind the `ModuleService` gRPC endpoint.
pub struct ModuleExecutor<C> {
    configurator: C,
}

impl<C: ModuleConfigurator> ModuleExecutor<C> {
    pub const fn new(configurator: C) -> Self {
        Self { configurator }
    }

    /// Builds the service described by `config` without binding anything.
    ///
    /// # Errors
    ///
    /// Returns the configurator's error, with context, if the module or its
    /// context cannot be created.
    pub fn build_service(
        &self,
        config: &ServerConfig,
    ) -> anyhow::Result<ExecService<C::Module>> {
        let module = self
            .configurator
            .parse_params_and_create_module(&config.serialized_params)
            .context(
                "An error occurred parsing the serialized custom params and creating the module",
            )?;

        let context = self
            .configurator
            .create_context(config)
            .context("An error occurred creating the module's context")?;

        Ok(ExecService::new(module, context))
    }

    /// Builds the service, binds the configured address and serves until
    /// `shutdown` resolves.
    pub async fn run<F>(&self, config: ServerConfig, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let service = self.build_service(&config)?;
        let grace = config.shutdown_grace_period;

        if config.uds {
            #[cfg(unix)]
            {
                use tokio::net::UnixListener;
                use tokio_stream::wrappers::UnixListenerStream;
                let uds_path = config.server_addr.clone();
                let uds = UnixListener::bind(&uds_path)
                    .with_context(|| format!("failed to bind Unix socket '{uds_path}'"))?;
                let incoming = UnixListenerStream::new(uds);
                log_startup_info(&uds_path, &config);
                let res = serve_with_incoming(service, incoming, shutdown, grace).await;
                // A panic can still leave the socket file behind.
                let _ = std::fs::remove_file(&uds_path);
                res
            }
            #[cfg(not(unix))]
            {
                anyhow::bail!("Unix domain sockets are not supported on this platform");
            }
        } else {
            let tcp_path = config.server_addr.clone();
            let tcp = TcpListener::bind(&tcp_path)
                .await
                .with_context(|| format!("failed to bind TCP address '{tcp_path}'"))?;
            let incoming = TcpListenerStream::new(tcp);
            log_startup_info(&tcp_path, &config);
            serve_with_incoming(service, incoming, shutdown, grace).await
        }
    }
}

/// Serves `service` on an already-bound stream of connections.
///
/// Returns once the server has stopped: either on its own (a transport error
/// is returned), or after `shutdown` resolved and in-flight calls drained. Calls
/// still running when the `grace` period elapses fail with `UNAVAILABLE`.
pub async fn serve_with_incoming<M, I, IO, IE, F>(
    service: ExecService<M>,
    incoming: I,
    shutdown: F,
    grace: Duration,
) -> anyhow::Result<()>
where
    M: ExecutableModule,
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<ModuleServiceServer<ExecService<M>>>()
        .await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let stop = CancellationToken::new();
    let hard_stop = CancellationToken::new();

    let server = Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new())
                .layer(HardStopLayer::new(hard_stop.clone())),
        )
        .add_service(health_service)
        .add_service(reflection)
        .add_service(build_module_service(service))
        .serve_with_incoming_shutdown(incoming, stop.clone().cancelled_owned());
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => {
            res?;
            #[cfg(feature = "tracing")]
            tracing::info!("Server stopped without a shutdown signal");
            return Ok(());
        }
        () = shutdown => {}
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Shutdown signal received, draining in-flight calls for up to {grace:?}");

    health_reporter
        .set_not_serving::<ModuleServiceServer<ExecService<M>>>()
        .await;
    stop.cancel();

    if let Ok(res) = timeout(grace, server.as_mut()).await {
        res?;
        #[cfg(feature = "tracing")]
        tracing::info!("Service shut down successfully");
        return Ok(());
    }

    #[cfg(feature = "tracing")]
    tracing::warn!("Grace period elapsed with calls still in flight, cancelling them");
    hard_stop.cancel();

    // Streaming calls (health watches) are not cut, so this wait is bounded too.
    match timeout(HARD_STOP_FLUSH, server).await {
        Ok(res) => res?,
        Err(_) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Connections still open after cancelling calls, not waiting any longer");
        }
    }

    Ok(())
}

fn build_module_service<M: ExecutableModule>(
    service: ExecService<M>,
) -> ModuleServiceServer<ExecService<M>> {
    ModuleServiceServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

fn log_startup_info(_addr: &str, _config: &ServerConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting module service on {} with full config: {:#?}",
            _addr,
            _config
        );
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting module service on {} (grace period {:?})",
            _addr,
            _config.shutdown_grace_period
        );
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to install SIGTERM handler: {_e}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    let ctrl_c = async {
        if let Err(_e) = signal::ctrl_c().await {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to install Ctrl+C handler: {_e}");
            core::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }
}

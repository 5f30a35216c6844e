use anyhow::bail;
use clap::Parser;
use core::time::Duration;

/// Runtime configuration for the `modexec-server` binary.
///
/// All values are parsed from CLI arguments or environment variables. A `.env`
/// file in the working directory is loaded first, so the usual container
/// deployment only sets environment variables.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "modexec-server",
    version,
    about = "A gRPC service that runs a pluggable module on request"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/modexec.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a
    /// file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Serialized custom params used to construct the module.
    ///
    /// The format is owned by the module's configurator; the server only
    /// checks that it is present and non-empty.
    ///
    /// Environment variable: `SERIALIZED_CUSTOM_PARAMS`
    #[arg(long, env = "SERIALIZED_CUSTOM_PARAMS")]
    pub serialized_params: String,

    /// Endpoint the configurator may use to build the module's context, for
    /// example the address of a backend the module talks to.
    ///
    /// Environment variable: `CONTEXT_ENDPOINT`
    #[arg(long, env = "CONTEXT_ENDPOINT")]
    pub context_endpoint: Option<String>,

    /// Seconds that in-flight calls may keep running after a stop signal
    /// before the server is torn down.
    ///
    /// Environment variable: `SHUTDOWN_GRACE_PERIOD`
    #[arg(long, env = "SHUTDOWN_GRACE_PERIOD", default_value_t = 5)]
    pub shutdown_grace_period: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub serialized_params: String,
    pub context_endpoint: Option<String>,
    pub shutdown_grace_period: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.serialized_params.is_empty() {
            bail!("SERIALIZED_CUSTOM_PARAMS was set, but is an empty string");
        }

        if args.shutdown_grace_period == 0 {
            bail!("SHUTDOWN_GRACE_PERIOD must be greater than 0");
        }

        let context_endpoint = args.context_endpoint.filter(|e| !e.is_empty());

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            serialized_params: args.serialized_params,
            context_endpoint,
            shutdown_grace_period: Duration::from_secs(args.shutdown_grace_period),
        })
    }
}

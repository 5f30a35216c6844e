#![doc = include_str!("../README.md")]

pub mod server;

pub use server::config::{CliArgs, ServerConfig};
pub use server::configurator::ModuleConfigurator;
pub use server::executor::{ModuleExecutor, serve_with_incoming, shutdown_signal};
pub use server::service::handler::ExecService;
// Public re-export so module implementors can reach the core types through
// `modexec_tonic_server::modexec_tonic_core`.
pub use modexec_tonic_core;

//! Server-side components of the `modexec` service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI / environment configuration.
//! - [`configurator`] - The hook a deployment implements to build its module.
//! - [`executor`] - Listener setup, auxiliary gRPC services and graceful
//!   shutdown.
//! - [`hard_stop`] - Cuts off calls still running after the grace period.
//! - [`service`] - The `ModuleService` adapter around an executable module.
//! - [`telemetry`] - Logging, tracing and metrics initialization.

pub mod config;
pub mod configurator;
pub mod executor;
pub mod hard_stop;
pub mod service;
pub mod telemetry;

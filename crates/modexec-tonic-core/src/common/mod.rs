//! Shared protocol types, errors and the module contract.
//!
//! ## Submodules
//!
//! - [`error`] - The service error type and its mapping onto
//!   [`tonic::Status`].
//! - [`module`] - The [`ExecutableModule`](module::ExecutableModule) trait
//!   implemented by the compute unit behind `Execute`.
//! - [`proto`] - Generated protobuf messages, client and server bindings.

pub mod error;
pub mod module;

pub use error::{Error, Result};
pub use module::{ExecutableModule, ExecutionOutcome};

/// gRPC service and message definitions generated from
/// `proto/modexec.proto`.
///
/// ## Service
///
/// - `IsAvailable` - Liveness probe, `()` in and out.
/// - `Execute` - Forwards [`ExecuteArgs::params_json`](proto::ExecuteArgs) to
///   the module and returns
///   [`ExecuteResponse::response_json`](proto::ExecuteResponse).
pub mod proto {
    tonic::include_proto!("modexec");
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("modexec_descriptor");
}

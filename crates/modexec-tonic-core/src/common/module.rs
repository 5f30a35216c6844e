//! The contract between the RPC adapter and the compute unit it serves.
//!
//! An [`ExecutableModule`] receives the opaque `params_json` of an `Execute`
//! call together with a shared, read-only context, and resolves to an
//! [`ExecutionOutcome`]. How the payload is interpreted and what the module
//! computes are entirely up to the implementor.
//!
//! Modules are invoked concurrently from many calls at once. Any mutable state
//! a module keeps must be synchronized by the module itself.
//!
//! ```ignore
//! struct Doubler;
//!
//! #[tonic::async_trait]
//! impl ExecutableModule for Doubler {
//!     type Context = ();
//!
//!     async fn execute(&self, _: &(), params_json: String) -> ExecutionOutcome {
//!         let n: i64 = params_json
//!             .trim()
//!             .parse()
//!             .map_err(|_| Error::invalid_argument("expected an integer"))?;
//!         Ok((n * 2).to_string())
//!     }
//! }
//! ```

use crate::Error;

/// Result of a single module invocation: the serialized response on success,
/// or the error to report to the caller.
pub type ExecutionOutcome = core::result::Result<String, Error>;

/// A pluggable compute unit served by the `Execute` RPC.
#[tonic::async_trait]
pub trait ExecutableModule: Send + Sync + 'static {
    /// State shared by every call, built once at startup.
    type Context: Send + Sync + 'static;

    /// Runs the module on one serialized argument payload.
    async fn execute(&self, context: &Self::Context, params_json: String) -> ExecutionOutcome;
}

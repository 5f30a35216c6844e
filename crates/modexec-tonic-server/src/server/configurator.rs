use crate::server::config::ServerConfig;
use modexec_tonic_core::ExecutableModule;

/// Builds the module and its context when the server starts.
///
/// Deployments hand the module its settings as a single serialized string
/// (`SERIALIZED_CUSTOM_PARAMS`). The configurator owns that format: it parses
/// the string and constructs the module, then builds whatever context the
/// module needs from the rest of the server configuration.
///
/// Both steps run once, before the listener is bound. An error from either
/// aborts startup.
pub trait ModuleConfigurator: Send + Sync + 'static {
    type Module: ExecutableModule;

    fn parse_params_and_create_module(
        &self,
        serialized_params: &str,
    ) -> anyhow::Result<Self::Module>;

    fn create_context(
        &self,
        config: &ServerConfig,
    ) -> anyhow::Result<<Self::Module as ExecutableModule>::Context>;
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] gs_stack::ConfigError),

    #[error(transparent)]
    Stack(#[from] gs_stack::Error),

    #[error("provisioner not available: {0}")]
    ProvisionerUnavailable(gs_stack::ProvisionerName),
}

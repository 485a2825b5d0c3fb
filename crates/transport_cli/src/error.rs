//! CLI error taxonomy.

use thiserror::Error;

/// Anything that can abort a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("could not read properties file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed properties file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Properties(#[from] transport_manager::PropertiesError),

    #[error(transparent)]
    Estimator(#[from] transport_event::EstimatorConfigError),

    #[error(transparent)]
    Discretization(#[from] transport_event::DiscretizationError),

    #[error(transparent)]
    Criterion(#[from] transport_event::CriterionError),

    #[error(transparent)]
    Manager(#[from] transport_manager::ManagerError),
}

pub type Result<T> = std::result::Result<T, CliError>;

//! Error taxonomy shared by the ingestion and analytics components.

use std::process::ExitCode;

#[derive(Debug, thiserror::Error)]
pub enum FundsError {
    #[error("no snapshot available: {0}")]
    SnapshotNotFound(String),

    #[error("fund {0} not found")]
    FundNotFound(String),

    #[error("operation supports a single fund, but {0} funds are loaded")]
    MultipleFunds(usize),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid date range: {0}")]
    Validation(String),

    #[error("fund registry has not been loaded")]
    RegistryNotLoaded,

    #[error("fund registry is already loaded")]
    RegistryAlreadyLoaded,

    #[error("failed to parse {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("failed to fetch {file}: {reason}")]
    Fetch { file: String, reason: String },
}

pub type Result<T, E = FundsError> = std::result::Result<T, E>;

impl From<&FundsError> for ExitCode {
    fn from(err: &FundsError) -> Self {
        let code: u8 = match err {
            FundsError::Validation(_) => 2,
            FundsError::FundNotFound(_) => 3,
            FundsError::SnapshotNotFound(_) | FundsError::Fetch { .. } => 4,
            FundsError::MultipleFunds(_) | FundsError::InsufficientData(_) => 5,
            FundsError::Parse { .. } => 6,
            FundsError::RegistryNotLoaded | FundsError::RegistryAlreadyLoaded => 70,
        };
        ExitCode::from(code)
    }
}

use stockdigest_core::{CoreError, WarehouseError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] stockdigest_core::ValidationError),

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Usage(_) => 2,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
            Self::Storage(_) => 11,
            Self::Core(error) => match error {
                CoreError::Validation(_) | CoreError::Config(_) => 2,
                CoreError::Serialization(_) => 4,
                CoreError::Io(_) | CoreError::Csv(_) | CoreError::Unavailable(_) => 10,
                CoreError::Warehouse(_) => 11,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_documented_exit_codes() {
        assert_eq!(CliError::Usage(String::from("no tickers")).exit_code(), 2);
        assert_eq!(
            CliError::Core(CoreError::Config(String::from("bad flag"))).exit_code(),
            2
        );
        assert_eq!(
            CliError::Io(std::io::Error::other("disk")).exit_code(),
            10
        );
        assert_eq!(
            CliError::Storage(WarehouseError::InvalidRow(String::from("row"))).exit_code(),
            11
        );
    }
}

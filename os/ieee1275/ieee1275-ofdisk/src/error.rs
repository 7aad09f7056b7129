use crate::registry::RegistryError;
use alloc::string::String;
use ieee1275_client::FirmwareError;

/// Failure of a disk subsystem operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiskError {
    /// The path could not be resolved or opened. Retried on network paths.
    #[error("{0}")]
    UnknownDevice(String),
    #[error("{0}")]
    ReadError(String),
    #[error("{0}")]
    WriteError(String),
    #[error("{0}")]
    BadArgument(String),
    #[error("out of memory")]
    OutOfMemory,
    /// A vendor method is unsupported or the firmware call itself failed.
    #[error(transparent)]
    BadDevice(#[from] FirmwareError),
    /// A vendor result table failed validation.
    #[error("malformed `{method}` result: {reason}")]
    MalformedTable {
        method: &'static str,
        reason: &'static str,
    },
}

impl From<RegistryError> for DiskError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::OutOfMemory => Self::OutOfMemory,
        }
    }
}

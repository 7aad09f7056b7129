use alloc::string::String;

/// Failure of a firmware client interface call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FirmwareError {
    #[error("no such device: {0}")]
    NoSuchDevice(String),
    #[error("failed to open {0}")]
    OpenFailed(String),
    #[error("invalid instance handle {0:#x}")]
    InvalidHandle(u32),
    #[error("property `{0}` not found")]
    NoSuchProperty(String),
    #[error("method `{0}` is not supported")]
    MethodNotFound(String),
    #[error("method `{method}` threw {code}")]
    MethodThrew { method: String, code: i64 },
    #[error("the firmware call failed")]
    CallFailed,
    #[error("firmware memory {addr:#x}+{len:#x} is not mapped")]
    BadAddress { addr: u64, len: usize },
    #[error("seek to {0:#x} failed")]
    SeekFailed(u64),
    #[error("cannot canonicalise {0}")]
    Canonicalise(String),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("sensor timeout")]
    Timeout,
    #[error("sensor checksum mismatch")]
    Checksum,
    #[error("malformed sysfs value {0:?}")]
    Parse(String),
    #[error("network not associated")]
    NotAssociated,
    #[error("transport: {0}")]
    Transport(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;

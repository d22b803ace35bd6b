use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    FileRead { path: PathBuf, source: io::Error },

    #[error("failed to open {path}: {source}")]
    DeviceOpen { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    FileWrite { path: PathBuf, source: io::Error },

    #[error("EC port I/O failed: {0}")]
    PortIo(#[source] io::Error),

    #[error("EC did not become ready ({0})")]
    EcTimeout(&'static str),

    #[error("hardware access unavailable")]
    HardwareUnavailable,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("control loop is not running")]
    LoopStopped,

    #[error("control loop failed unexpectedly: {0}")]
    ControlLoopPanicked(String),
}

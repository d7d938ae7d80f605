use std::io;
use thiserror::Error;

/// Crate-wide error type for setup and configuration failures.
///
/// Per-instruction conditions encountered while the emulator is running
/// (illegal opcodes, unsupported bank-control writes, audio ring overruns)
/// are not modeled here: they are logged and the frame proceeds, as
/// documented on the component that detects them.
#[derive(Debug, Error)]
pub enum GbError {
    #[error("failed to read ROM file: {0}")]
    RomRead(#[from] io::Error),

    #[error("ROM image too small to contain a header ({len} bytes)")]
    RomTooSmall { len: usize },

    #[error("unsupported RAM size code {0:#04x}")]
    UnsupportedRamSize(u8),

    #[error("unsupported ROM size code {0:#04x}")]
    UnsupportedRomSize(u8),
}

pub type GbResult<T> = Result<T, GbError>;

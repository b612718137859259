use std::fmt;

use thiserror::Error;

/// Problems detected while parsing a cartridge image or installing an overlay.
/// These are reported to the caller; the core keeps running on the previous state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("ROM image is empty")]
    Empty,
    #[error("ROM image too small to contain a header ({0} bytes)")]
    TooSmall(usize),
    #[error("invalid ROM format (size: {0} bytes)")]
    UnknownLayout(usize),
    #[error("unsupported cartridge coprocessor: {0}")]
    UnsupportedChip(&'static str),
    #[error("overlay for {region} must be {expected} bytes, got {actual}")]
    OverlaySize {
        region: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid memory map block {0:?}")]
    BadBlock(String),
    #[error("unknown region {0:?}")]
    UnknownRegion(String),
}

/// Conditions outside the supported hardware scope. Recording one stops the
/// run loop at the next bus-operation boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("access to unimplemented coprocessor at ${0:06X}")]
    Coprocessor(u32),
    #[error("{kind} channel {channel}: transfer pattern {pattern} is not implemented")]
    DmaPattern {
        kind: &'static str,
        channel: usize,
        pattern: u8,
    },
    #[error("CPU bus released while not blocked ({0})")]
    BlockUnderflow(&'static str),
}

/// Snapshot handed back when execution stops on a [`Fault`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    pub fault: Fault,
    pub pc: u32,
    pub history: Vec<u32>,
}

impl fmt::Display for CrashReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "crash: {} in ${:02X}:{:04X}", self.fault, self.pc >> 16, self.pc & 0xFFFF)?;
        write!(f, "history:")?;
        for (i, addr) in self.history.iter().enumerate() {
            write!(f, "\n  {}: ${:02X}:{:04X}", i, addr >> 16, addr & 0xFFFF)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("{0}")]
    Fatal(CrashReport),
    #[error("no cartridge loaded")]
    NoCartridge,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture error: {0}")]
    Capture(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

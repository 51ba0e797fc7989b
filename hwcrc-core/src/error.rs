//! Error types for hwcrc.
//!
//! Two kinds of problems exist. A [`HardwareFault`] is something that went
//! wrong during an accelerator run; the engine never returns it as an `Err`,
//! it recovers by recomputing in software and reports the fault alongside
//! the (still correct) checksum. A [`ConfigError`] rejects an
//! [`EngineConfig`](crate::config::EngineConfig) that cannot work.

use thiserror::Error;

/// A fault observed while the accelerator was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HardwareFault {
    /// The accelerator flagged a bus error while reading the source.
    #[error("accelerator reported a bus error")]
    BusError,

    /// The accelerator did not report completion in time.
    #[error("accelerator did not complete within {polls} polls")]
    Timeout {
        /// Number of status polls that were made.
        polls: u32,
    },
}

/// Invalid engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The RAM window used for the errata check contains no addresses.
    #[error("empty RAM window: {start:#x}..{end:#x}")]
    EmptyRamWindow {
        /// First address of the window.
        start: usize,
        /// One past the last address of the window.
        end: usize,
    },

    /// A poll limit of zero would never let the accelerator finish.
    #[error("poll limit must be at least 1")]
    ZeroPollLimit,
}

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

impl HardwareFault {
    /// Create a timeout fault.
    pub fn timeout(polls: u32) -> Self {
        Self::Timeout { polls }
    }
}

impl ConfigError {
    /// Create an empty RAM window error.
    pub fn empty_ram_window(start: usize, end: usize) -> Self {
        Self::EmptyRamWindow { start, end }
    }
}

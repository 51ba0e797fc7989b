//! Engine configuration.

use std::ops::Range;

use crate::error::{ConfigError, Result};

/// First address of the Cortex-M SRAM region.
pub const SRAM_BASE: usize = 0x2000_0000;

/// One past the last address of the Cortex-M SRAM region.
pub const SRAM_END: usize = 0x4000_0000;

/// Default number of status polls before a hardware run is abandoned.
pub const DEFAULT_POLL_LIMIT: u32 = 1 << 20;

/// What to do with buffers whose address or length is not a multiple of 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnalignedPolicy {
    /// Feed the unaligned head and tail through the lookup table and only
    /// the aligned middle through the accelerator, chained via the seed.
    #[default]
    Split,
    /// Hand them to the accelerator anyway.
    ///
    /// The accelerator works on whole words, so trailing bytes are ignored
    /// and a misaligned start address is rounded down. The result is then
    /// the CRC of a different byte range; keeping buffers word aligned is
    /// the caller's job.
    Hardware,
    /// Compute them in software without touching the accelerator.
    Software,
}

/// CRC engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Address window whose contents are affected by the DMA CRC errata.
    pub ram: Range<usize>,
    /// Maximum number of completion polls, or `None` to wait forever.
    pub poll_limit: Option<u32>,
    /// Handling of buffers that are not word aligned.
    pub unaligned: UnalignedPolicy,
}

impl EngineConfig {
    /// SAMD21-style device: SRAM at `0x2000_0000`, bounded completion wait.
    pub const SAMD21: Self = Self {
        ram: SRAM_BASE..SRAM_END,
        poll_limit: Some(DEFAULT_POLL_LIMIT),
        unaligned: UnalignedPolicy::Split,
    };

    /// Same as [`SAMD21`](Self::SAMD21) but blocks until the accelerator
    /// reports completion, however long that takes.
    pub const UNBOUNDED: Self = Self {
        ram: SRAM_BASE..SRAM_END,
        poll_limit: None,
        unaligned: UnalignedPolicy::Split,
    };

    /// Replace the RAM window.
    pub fn with_ram(mut self, ram: Range<usize>) -> Self {
        self.ram = ram;
        self
    }

    /// Replace the poll limit.
    pub fn with_poll_limit(mut self, poll_limit: Option<u32>) -> Self {
        self.poll_limit = poll_limit;
        self
    }

    /// Replace the unaligned buffer policy.
    pub fn with_unaligned(mut self, unaligned: UnalignedPolicy) -> Self {
        self.unaligned = unaligned;
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.ram.is_empty() {
            return Err(ConfigError::empty_ram_window(self.ram.start, self.ram.end));
        }
        if self.poll_limit == Some(0) {
            return Err(ConfigError::ZeroPollLimit);
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::SAMD21
    }
}

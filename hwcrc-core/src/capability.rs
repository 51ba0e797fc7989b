//! Accelerator capability detection.
//!
//! Detection runs once, when the engine is built. It answers two questions:
//! is there an accelerator at all, and is this particular device revision
//! affected by the DMA CRC errata that corrupts results computed over RAM.

use crate::accelerator::CrcAccelerator;

/// Decoded device identification word.
///
/// Bit layout of the raw word:
///
/// ```text
/// 31..28 processor | 27..23 family | 21..16 series | 15..12 die | 11..8 revision | 7..0 devsel
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceId {
    /// Processor identifier.
    pub processor: u8,
    /// Product family.
    pub family: u8,
    /// Product series within the family.
    pub series: u8,
    /// Die number.
    pub die: u8,
    /// Silicon revision.
    pub revision: u8,
    /// Device variant selection.
    pub devsel: u8,
}

impl DeviceId {
    /// Decode a raw identification word.
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            processor: ((raw >> 28) & 0xF) as u8,
            family: ((raw >> 23) & 0x1F) as u8,
            series: ((raw >> 16) & 0x3F) as u8,
            die: ((raw >> 12) & 0xF) as u8,
            revision: ((raw >> 8) & 0xF) as u8,
            devsel: (raw & 0xFF) as u8,
        }
    }

    /// Encode back into a raw identification word.
    pub const fn to_raw(self) -> u32 {
        ((self.processor as u32 & 0xF) << 28)
            | ((self.family as u32 & 0x1F) << 23)
            | ((self.series as u32 & 0x3F) << 16)
            | ((self.die as u32 & 0xF) << 12)
            | ((self.revision as u32 & 0xF) << 8)
            | self.devsel as u32
    }

    /// Whether this device has the DMA CRC errata.
    ///
    /// Affected: revisions 0 to 3 of processor 1, family 0.
    pub const fn has_dma_crc_errata(&self) -> bool {
        self.revision <= 3 && self.processor == 1 && self.family == 0
    }
}

/// What the current device can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capability {
    /// An accelerator is present.
    pub available: bool,
    /// The accelerator needs the cache workaround for sources in RAM.
    pub hardware_errata: bool,
    /// NVM cache errata of the newer device series. Not detected yet, so
    /// always `false`.
    pub nvm_cache_errata: bool,
}

impl Capability {
    /// No accelerator.
    pub const NONE: Self = Self {
        available: false,
        hardware_errata: false,
        nvm_cache_errata: false,
    };

    /// Capability of a device with an accelerator and the given identity.
    pub const fn from_device_id(id: DeviceId) -> Self {
        Self {
            available: true,
            hardware_errata: id.has_dma_crc_errata(),
            nvm_cache_errata: false,
        }
    }

    /// Detect the capability of the given accelerator, if any.
    ///
    /// Never fails: the absence of an accelerator is a valid outcome.
    pub fn detect<A: CrcAccelerator>(accelerator: Option<&A>) -> Self {
        let Some(accelerator) = accelerator else {
            log::debug!("no CRC accelerator, software path only");
            return Self::NONE;
        };

        let id = accelerator.device_id();
        let capability = Self::from_device_id(id);
        log::debug!(
            "CRC accelerator found: processor {} family {} series {} revision {}, errata: {}",
            id.processor,
            id.family,
            id.series,
            id.revision,
            capability.hardware_errata
        );
        capability
    }
}

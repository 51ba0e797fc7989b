//! # hwcrc Core
//!
//! CRC-32 (ISO-HDLC: poly 0x04C11DB7, init and xorout 0xFFFFFFFF, reflected)
//! over one complete buffer, offloaded to a memory-mapped CRC accelerator
//! when the device has a healthy one, and computed from a lookup table
//! otherwise.
//!
//! - [`capability`]: accelerator presence and errata detection
//! - [`accelerator`]: the interface an accelerator implementation provides
//! - [`engine`]: path selection, errata workaround and fallback
//! - [`software`]: the table-driven implementation
//! - [`config`]: engine configuration
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ CrcEngine::compute / checksum                           │
//! │     override flag, capability, unaligned policy         │
//! ├────────────────────────────┬────────────────────────────┤
//! │ Hardware path              │ Software path              │
//! │   errata workaround        │   256-entry const table    │
//! │   program / start / poll   │   never fails              │
//! │   bus error, timeout ──────┼──▶ fallback                │
//! ├────────────────────────────┴────────────────────────────┤
//! │ CrcAccelerator (device-specific implementation)         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Both paths produce bit-identical results; a hardware fault changes the
//! path and the return code, never the checksum.
//!
//! The engine keeps no locks. The accelerator is a singleton peripheral and
//! `compute` takes `&mut self`; callers sharing an engine across execution
//! contexts must serialize access themselves.
//!
//! ## Example
//!
//! ```rust
//! use hwcrc_core::{CrcEngine, software};
//!
//! let mut engine = CrcEngine::software_only();
//! let sum = engine.checksum(b"Hello, World!");
//! assert_eq!(sum.crc, 0xEC4AC3D0);
//! assert_eq!(sum.crc, software::checksum(b"Hello, World!"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod accelerator;
pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod software;

// Re-exports for convenience
pub use accelerator::{CrcAccelerator, NoAccelerator, SourceRegion};
pub use capability::{Capability, DeviceId};
pub use config::{EngineConfig, UnalignedPolicy};
pub use engine::{Checksum, CrcEngine, Path};
pub use error::{ConfigError, HardwareFault, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::accelerator::{CrcAccelerator, NoAccelerator, SourceRegion};
    pub use crate::capability::{Capability, DeviceId};
    pub use crate::config::{EngineConfig, UnalignedPolicy};
    pub use crate::engine::{Checksum, CrcEngine, Path};
    pub use crate::error::{ConfigError, HardwareFault};
}

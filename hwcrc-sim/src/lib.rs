//! # hwcrc Sim
//!
//! A behavioural model of a memory-mapped CRC-32 accelerator, for exercising
//! [`hwcrc_core::CrcEngine`] off-target.
//!
//! The model computes the CRC bit by bit, independently of the lookup table
//! in [`hwcrc_core::software`], so comparing the two paths is a real cross
//! check. It also models the things the engine has to get right:
//!
//! - clock gating and write protection: a run started while either is still
//!   in place ends with a bus error;
//! - completion latency, counted in status polls;
//! - injected faults: bus errors and runs that never complete;
//! - the DMA CRC errata: on an affected device, a run over RAM while the RAM
//!   caching bits are set produces a corrupted result.
//!
//! ## Example
//!
//! ```rust
//! use hwcrc_core::CrcEngine;
//! use hwcrc_sim::SimAccelerator;
//!
//! #[repr(align(4))]
//! struct Aligned([u8; 12]);
//!
//! let data = Aligned(*b"123456789\0\0\0");
//! let mut engine = CrcEngine::new(SimAccelerator::samd21_rev_e());
//! let sum = engine.checksum(&data.0[..9]);
//! assert_eq!(sum.crc, 0xCBF43926);
//! assert!(engine.is_using_hardware());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::ops::Range;

use hwcrc_core::capability::DeviceId;
use hwcrc_core::config::{SRAM_BASE, SRAM_END};
use hwcrc_core::engine::{ERRATA_CACHE_MASK, ERRATA_CONTROL_ADDRESS};
use hwcrc_core::software::POLY_REFLECTED;
use hwcrc_core::{CrcAccelerator, SourceRegion};

/// Identification word of a SAMD21 revision D (affected by the errata).
pub const SAMD21_REV_D: u32 = 0x1001_0305;

/// Identification word of a SAMD21 revision E.
pub const SAMD21_REV_E: u32 = 0x1001_0405;

/// Identification word of a SAMD51J19A.
pub const SAMD51: u32 = 0x6006_0003;

/// Value XORed into the result of a run hit by the errata.
pub const ERRATA_CORRUPTION: u32 = 0x0BAD_CAFE;

/// Fault injected into every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    /// Runs complete normally.
    #[default]
    None,
    /// Runs complete with the bus error flag set.
    BusError,
    /// Runs never complete.
    Hang,
}

/// Counters for assertions in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimStats {
    /// Number of runs started.
    pub runs: u32,
    /// Number of status polls.
    pub polls: u32,
    /// Number of runs that were hit by the errata.
    pub corrupted: u32,
    /// Trailing bytes programmed but not covered by whole words.
    pub truncated: u32,
}

/// Simulated CRC-32 accelerator.
#[derive(Debug, Clone)]
pub struct SimAccelerator {
    id: DeviceId,
    fault: Fault,
    latency: u32,
    ram: Range<usize>,
    clocks_enabled: bool,
    write_protected: bool,
    seed: u32,
    address: usize,
    source: Vec<u8>,
    remaining: Option<u32>,
    done: bool,
    bus_error: bool,
    data: u32,
    control: u32,
    control_writes: Vec<(usize, u32)>,
    stats: SimStats,
}

impl SimAccelerator {
    /// A healthy accelerator on a device with identification word `did`.
    ///
    /// Clocks start gated, registers start write protected and RAM caching
    /// starts enabled, as after reset.
    pub fn new(did: u32) -> Self {
        Self::with_device_id(DeviceId::from_raw(did))
    }

    /// A healthy accelerator on a device with an already decoded `id`.
    pub fn with_device_id(id: DeviceId) -> Self {
        Self {
            id,
            fault: Fault::None,
            latency: 0,
            ram: SRAM_BASE..SRAM_END,
            clocks_enabled: false,
            write_protected: true,
            seed: 0,
            address: 0,
            source: Vec::new(),
            remaining: None,
            done: false,
            bus_error: false,
            data: 0,
            control: ERRATA_CACHE_MASK,
            control_writes: Vec::new(),
            stats: SimStats::default(),
        }
    }

    /// SAMD21 revision D: affected by the errata.
    pub fn samd21_rev_d() -> Self {
        Self::new(SAMD21_REV_D)
    }

    /// SAMD21 revision E: errata fixed.
    pub fn samd21_rev_e() -> Self {
        Self::new(SAMD21_REV_E)
    }

    /// Inject a fault into every run.
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    /// Number of polls a run takes before it reports done.
    pub fn with_latency(mut self, polls: u32) -> Self {
        self.latency = polls;
        self
    }

    /// Address window the errata model treats as RAM.
    pub fn with_ram(mut self, ram: Range<usize>) -> Self {
        self.ram = ram;
        self
    }

    /// Change the injected fault.
    pub fn set_fault(&mut self, fault: Fault) {
        self.fault = fault;
    }

    /// Raw identification word reported by the device.
    pub fn did(&self) -> u32 {
        self.id.to_raw()
    }

    /// Counters.
    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Every control register write, in order.
    pub fn control_writes(&self) -> &[(usize, u32)] {
        &self.control_writes
    }

    /// Current value of the errata control register.
    pub fn control(&self) -> u32 {
        self.control
    }

    /// Whether the errata would corrupt a run at `address` right now.
    fn errata_hits(&self, address: usize) -> bool {
        self.id.has_dma_crc_errata()
            && self.control & ERRATA_CACHE_MASK != 0
            && self.ram.contains(&address)
    }
}

/// Raw reflected CRC-32 register after feeding `data`, bit at a time.
pub fn bitwise_register(seed: u32, data: &[u8]) -> u32 {
    let mut crc = seed;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLY_REFLECTED
            } else {
                crc >> 1
            };
        }
    }
    crc
}

impl CrcAccelerator for SimAccelerator {
    fn device_id(&self) -> DeviceId {
        self.id
    }

    fn enable_clocks(&mut self) {
        self.clocks_enabled = true;
    }

    fn clear_write_protection(&mut self) {
        self.write_protected = false;
    }

    fn program(&mut self, seed: u32, source: SourceRegion<'_>) {
        if self.write_protected {
            return;
        }
        self.seed = seed;
        self.address = source.address();
        self.source = source.covered().to_vec();
        self.stats.truncated += (source.data().len() - self.source.len()) as u32;
    }

    fn clear_status(&mut self) {
        self.done = false;
        self.bus_error = false;
    }

    fn start(&mut self) {
        self.stats.runs += 1;

        if !self.clocks_enabled || self.write_protected {
            log::debug!("simulated accelerator started while locked");
            self.done = true;
            self.bus_error = true;
            self.remaining = None;
            return;
        }

        self.data = bitwise_register(self.seed, &self.source);
        if self.errata_hits(self.address) {
            self.stats.corrupted += 1;
            self.data ^= ERRATA_CORRUPTION;
        }

        self.remaining = match self.fault {
            Fault::Hang => None,
            Fault::None | Fault::BusError => Some(self.latency),
        };
    }

    fn poll_done(&mut self) -> bool {
        self.stats.polls += 1;
        match self.remaining {
            Some(0) => {
                self.remaining = None;
                self.done = true;
                self.bus_error = self.fault == Fault::BusError;
            }
            Some(n) => self.remaining = Some(n - 1),
            None => {}
        }
        self.done
    }

    fn bus_error(&self) -> bool {
        self.bus_error
    }

    fn result(&self) -> u32 {
        self.data
    }

    fn read_control(&self, address: usize) -> u32 {
        if address == ERRATA_CONTROL_ADDRESS {
            self.control
        } else {
            0
        }
    }

    fn write_control(&mut self, address: usize, value: u32) {
        self.control_writes.push((address, value));
        if address == ERRATA_CONTROL_ADDRESS {
            self.control = value;
        }
    }
}

//! CRC-32 engine with hardware offload and software fallback.
//!
//! The engine owns the accelerator handle (if any), the capability record
//! detected at construction, and a little bit of state:
//!
//! - a caller-controlled override that forces the software path;
//! - a record of which path produced the most recent result.
//!
//! Every call produces the correct CRC-32. A hardware fault only changes
//! which path produced the value and what [`CrcEngine::compute`] returns.
//!
//! ## Hardware path
//!
//! 1. If the device has the DMA CRC errata and the source lies in RAM, the
//!    RAM caching bits at [`ERRATA_CONTROL_ADDRESS`] are cleared for the
//!    duration of the run.
//! 2. Clocks are enabled and write protection cleared.
//! 3. Seed, word address and word count are programmed, stale status
//!    cleared, and the run started. The seed is `0xFFFFFFFF` unless a few
//!    leading bytes were already consumed in software (see
//!    [`UnalignedPolicy::Split`]).
//! 4. The done flag is polled, up to the configured limit.
//! 5. A bus error or timeout sends the buffer to the software path.

use std::ops::{Deref, DerefMut};

use crate::accelerator::{CrcAccelerator, NoAccelerator, SourceRegion};
use crate::capability::Capability;
use crate::config::{EngineConfig, UnalignedPolicy};
use crate::error::{HardwareFault, Result};
use crate::software::{self, ACCUMULATOR_SEED, CRC32_XOR_OUT};

/// Control register holding the caching bits involved in the errata.
pub const ERRATA_CONTROL_ADDRESS: usize = 0x4100_7058;

/// Bits cleared to disable caching while an affected run is active.
pub const ERRATA_CACHE_MASK: u32 = 0x0003_0000;

/// Bits set to re-enable caching afterwards.
pub const ERRATA_CACHE_RESTORE: u32 = 0x0002_0000;

/// Which implementation produced a checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Path {
    /// The accelerator.
    Hardware,
    /// The lookup table.
    Software,
}

/// Result of one engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum {
    /// CRC-32 of the buffer.
    pub crc: u32,
    /// Path that produced `crc`.
    pub path: Path,
    /// Set when the hardware path was selected but faulted.
    pub fallback: Option<HardwareFault>,
}

impl Checksum {
    fn software(crc: u32) -> Self {
        Self {
            crc,
            path: Path::Software,
            fallback: None,
        }
    }

    /// Whether the accelerator produced this value.
    pub fn used_hardware(&self) -> bool {
        self.path == Path::Hardware
    }

    /// Whether the selected path was abandoned for the software path.
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// CRC-32 engine.
///
/// Build it with [`CrcEngine::new`] when the device has an accelerator, or
/// [`CrcEngine::software_only`] when it does not.
///
/// # Example
///
/// ```
/// use hwcrc_core::CrcEngine;
///
/// let mut engine = CrcEngine::software_only();
/// let mut crc = 0;
/// assert!(engine.compute(b"123456789", &mut crc));
/// assert_eq!(crc, 0xCBF43926);
/// assert!(!engine.is_using_hardware());
/// ```
#[derive(Debug)]
pub struct CrcEngine<A = NoAccelerator> {
    accelerator: Option<A>,
    capability: Capability,
    config: EngineConfig,
    force_software: bool,
    last_used_hardware: bool,
}

impl CrcEngine<NoAccelerator> {
    /// Engine for a device without an accelerator.
    pub fn software_only() -> Self {
        Self::detect(None, EngineConfig::default())
    }
}

impl<A: CrcAccelerator> CrcEngine<A> {
    /// Engine using `accelerator`, with the default configuration.
    pub fn new(accelerator: A) -> Self {
        Self::detect(Some(accelerator), EngineConfig::default())
    }

    /// Engine with an explicit configuration.
    pub fn with_config(accelerator: Option<A>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::detect(accelerator, config))
    }

    fn detect(accelerator: Option<A>, config: EngineConfig) -> Self {
        let capability = Capability::detect(accelerator.as_ref());
        Self {
            accelerator,
            capability,
            config,
            force_software: false,
            last_used_hardware: capability.available,
        }
    }

    /// Capability detected at construction.
    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether an accelerator is present, regardless of errata or override.
    #[inline]
    pub fn can_use_hardware(&self) -> bool {
        self.capability.available
    }

    /// Whether the most recent call was served by the accelerator.
    ///
    /// Before the first call this reports whether the hardware path is the
    /// one that will be selected by default.
    #[inline]
    pub fn is_using_hardware(&self) -> bool {
        self.last_used_hardware
    }

    /// Force (or stop forcing) the software path from the next call on.
    pub fn force_software(&mut self, force: bool) {
        self.force_software = force;
    }

    /// Whether the software path is currently forced.
    pub fn is_software_forced(&self) -> bool {
        self.force_software
    }

    /// The accelerator handle.
    pub fn accelerator(&self) -> Option<&A> {
        self.accelerator.as_ref()
    }

    /// Mutable access to the accelerator handle.
    pub fn accelerator_mut(&mut self) -> Option<&mut A> {
        self.accelerator.as_mut()
    }

    /// Give the accelerator handle back.
    pub fn into_accelerator(self) -> Option<A> {
        self.accelerator
    }

    /// Compute the CRC-32 of `data` into `crc`.
    ///
    /// `crc` always receives the correct value. Returns `false` when the
    /// hardware path was selected but faulted and the value was recomputed
    /// in software.
    pub fn compute(&mut self, data: &[u8], crc: &mut u32) -> bool {
        let checksum = self.checksum(data);
        *crc = checksum.crc;
        !checksum.is_fallback()
    }

    /// Compute the CRC-32 of `data`, reporting the path taken.
    ///
    /// With [`UnalignedPolicy::Split`] the path is [`Path::Hardware`] as soon
    /// as the accelerator processed the aligned middle of the buffer, even if
    /// a few bytes at either end went through the lookup table.
    pub fn checksum(&mut self, data: &[u8]) -> Checksum {
        let force_software = self.force_software;
        let Some(accelerator) = self.accelerator.as_mut().filter(|_| !force_software) else {
            log::trace!("software path: {} bytes", data.len());
            return self.software_checksum(data);
        };

        let source = SourceRegion::new(data);
        let policy = self.config.unaligned;
        let (head, body, tail) = match policy {
            UnalignedPolicy::Software if !source.is_word_aligned() => {
                log::trace!(
                    "software path: unaligned buffer at {:#x}, {} bytes",
                    source.address(),
                    data.len()
                );
                return self.software_checksum(data);
            }
            UnalignedPolicy::Split => split_words(data),
            UnalignedPolicy::Hardware | UnalignedPolicy::Software => (&data[..0], data, &data[..0]),
        };
        if body.is_empty() && !data.is_empty() {
            log::trace!("software path: no whole words in {} bytes", data.len());
            return self.software_checksum(data);
        }

        let body = SourceRegion::new(body);
        let seed = !software::update(ACCUMULATOR_SEED, head);
        let errata = self.capability.hardware_errata && self.config.ram.contains(&body.address());
        let poll_limit = self.config.poll_limit;
        match run_hardware(accelerator, body, seed, errata, poll_limit) {
            Ok(register) => {
                self.last_used_hardware = true;
                Checksum {
                    crc: software::update(register ^ CRC32_XOR_OUT, tail),
                    path: Path::Hardware,
                    fallback: None,
                }
            }
            Err(fault) => {
                log::warn!("CRC accelerator fault ({fault}), falling back to software");
                Checksum {
                    fallback: Some(fault),
                    ..self.software_checksum(data)
                }
            }
        }
    }

    /// Compute the CRC-32 of `data` with the software path.
    ///
    /// This also clears the hardware usage flag.
    pub fn software_checksum(&mut self, data: &[u8]) -> Checksum {
        self.last_used_hardware = false;
        Checksum::software(software::checksum(data))
    }
}

impl Default for CrcEngine<NoAccelerator> {
    fn default() -> Self {
        Self::software_only()
    }
}

/// Split a buffer into an unaligned head, whole aligned words and a tail.
fn split_words(data: &[u8]) -> (&[u8], &[u8], &[u8]) {
    let head_len = data.as_ptr().align_offset(4).min(data.len());
    let (head, rest) = data.split_at(head_len);
    let (body, tail) = rest.split_at(rest.len() & !3);
    (head, body, tail)
}

/// One accelerator run. Returns the raw CRC register.
fn run_hardware<A: CrcAccelerator>(
    accelerator: &mut A,
    source: SourceRegion<'_>,
    seed: u32,
    errata: bool,
    poll_limit: Option<u32>,
) -> std::result::Result<u32, HardwareFault> {
    let mut accelerator = CacheWorkaround::engage(accelerator, errata);

    accelerator.enable_clocks();
    accelerator.clear_write_protection();
    accelerator.program(seed, source);
    accelerator.clear_status();
    accelerator.start();

    wait_done(&mut *accelerator, poll_limit)?;

    if accelerator.bus_error() {
        return Err(HardwareFault::BusError);
    }
    Ok(accelerator.result())
}

fn wait_done<A: CrcAccelerator>(
    accelerator: &mut A,
    poll_limit: Option<u32>,
) -> std::result::Result<(), HardwareFault> {
    match poll_limit {
        None => {
            while !accelerator.poll_done() {
                std::hint::spin_loop();
            }
            Ok(())
        }
        Some(limit) => {
            for _ in 0..limit {
                if accelerator.poll_done() {
                    return Ok(());
                }
                std::hint::spin_loop();
            }
            Err(HardwareFault::timeout(limit))
        }
    }
}

/// Disables RAM caching for as long as it lives, if the errata applies.
struct CacheWorkaround<'a, A: CrcAccelerator> {
    accelerator: &'a mut A,
    engaged: bool,
}

impl<'a, A: CrcAccelerator> CacheWorkaround<'a, A> {
    fn engage(accelerator: &'a mut A, engaged: bool) -> Self {
        if engaged {
            let control = accelerator.read_control(ERRATA_CONTROL_ADDRESS);
            accelerator.write_control(ERRATA_CONTROL_ADDRESS, control & !ERRATA_CACHE_MASK);
            log::debug!("errata workaround: RAM caching disabled");
        }
        Self {
            accelerator,
            engaged,
        }
    }
}

impl<A: CrcAccelerator> Deref for CacheWorkaround<'_, A> {
    type Target = A;

    fn deref(&self) -> &A {
        self.accelerator
    }
}

impl<A: CrcAccelerator> DerefMut for CacheWorkaround<'_, A> {
    fn deref_mut(&mut self) -> &mut A {
        self.accelerator
    }
}

impl<A: CrcAccelerator> Drop for CacheWorkaround<'_, A> {
    fn drop(&mut self) {
        if self.engaged {
            let control = self.accelerator.read_control(ERRATA_CONTROL_ADDRESS);
            self.accelerator
                .write_control(ERRATA_CONTROL_ADDRESS, control | ERRATA_CACHE_RESTORE);
            log::debug!("errata workaround: RAM caching restored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::DeviceId;
    use crate::software::{CRC32_CHECK, CRC32_SEED};

    /// Scripted accelerator: computes with the software table and records
    /// what the engine did to it.
    #[derive(Debug, Default)]
    struct Scripted {
        id: DeviceId,
        bus_error: bool,
        polls_needed: u32,
        polls: u32,
        seed: u32,
        words: Vec<u8>,
        result: u32,
        clocks: bool,
        unlocked: bool,
        starts: u32,
        control: u32,
        control_writes: Vec<u32>,
        control_at_start: Option<u32>,
    }

    impl Scripted {
        fn healthy() -> Self {
            Self {
                id: DeviceId::from_raw(0x1001_0405),
                control: ERRATA_CACHE_MASK,
                ..Self::default()
            }
        }

        fn affected() -> Self {
            Self {
                id: DeviceId::from_raw(0x1001_0305),
                ..Self::healthy()
            }
        }
    }

    impl CrcAccelerator for Scripted {
        fn device_id(&self) -> DeviceId {
            self.id
        }

        fn enable_clocks(&mut self) {
            self.clocks = true;
        }

        fn clear_write_protection(&mut self) {
            self.unlocked = true;
        }

        fn program(&mut self, seed: u32, source: SourceRegion<'_>) {
            self.seed = seed;
            self.words = source.covered().to_vec();
        }

        fn clear_status(&mut self) {
            self.polls = 0;
        }

        fn start(&mut self) {
            self.starts += 1;
            self.control_at_start = Some(self.control);
            // Raw register: complemented form of the table accumulator.
            self.result = software::update(self.seed ^ CRC32_XOR_OUT, &self.words) ^ CRC32_XOR_OUT;
        }

        fn poll_done(&mut self) -> bool {
            self.polls += 1;
            self.polls > self.polls_needed
        }

        fn bus_error(&self) -> bool {
            self.bus_error
        }

        fn result(&self) -> u32 {
            self.result
        }

        fn read_control(&self, address: usize) -> u32 {
            assert_eq!(address, ERRATA_CONTROL_ADDRESS);
            self.control
        }

        fn write_control(&mut self, address: usize, value: u32) {
            assert_eq!(address, ERRATA_CONTROL_ADDRESS);
            self.control = value;
            self.control_writes.push(value);
        }
    }

    #[repr(align(4))]
    struct Aligned<const N: usize>([u8; N]);

    fn everywhere() -> EngineConfig {
        EngineConfig::default().with_ram(0..usize::MAX)
    }

    #[test]
    fn test_software_only_engine() {
        let mut engine = CrcEngine::software_only();
        assert!(!engine.can_use_hardware());
        assert!(!engine.is_using_hardware());
        assert_eq!(engine.capability(), Capability::NONE);

        let mut crc = 0;
        assert!(engine.compute(b"123456789", &mut crc));
        assert_eq!(crc, CRC32_CHECK);
        assert!(!engine.is_using_hardware());
    }

    #[test]
    fn test_hardware_path_matches_software() {
        let data = Aligned(*b"123456789\0\0\0");
        let mut engine = CrcEngine::new(Scripted::healthy());
        assert!(engine.can_use_hardware());

        let sum = engine.checksum(&data.0[..8]);
        assert_eq!(sum.path, Path::Hardware);
        assert_eq!(sum.crc, software::checksum(b"12345678"));
        assert!(engine.is_using_hardware());

        let accelerator = engine.accelerator().unwrap();
        assert!(accelerator.clocks);
        assert!(accelerator.unlocked);
        assert_eq!(accelerator.seed, CRC32_SEED);
        assert_eq!(accelerator.starts, 1);
    }

    #[test]
    fn test_hardware_empty_buffer() {
        let mut engine = CrcEngine::new(Scripted::healthy());
        let mut crc = 0xDEAD_BEEF;
        assert!(engine.compute(&[], &mut crc));
        assert_eq!(crc, 0);
        assert!(engine.is_using_hardware());
    }

    #[test]
    fn test_force_software() {
        let data = Aligned([0x5A; 16]);
        let mut engine = CrcEngine::new(Scripted::healthy());
        engine.force_software(true);
        assert!(engine.is_software_forced());
        assert!(engine.can_use_hardware());

        let sum = engine.checksum(&data.0);
        assert_eq!(sum.path, Path::Software);
        assert!(!sum.is_fallback());
        assert!(!engine.is_using_hardware());
        assert_eq!(engine.accelerator().unwrap().starts, 0);

        engine.force_software(false);
        let hw = engine.checksum(&data.0);
        assert!(hw.used_hardware());
        assert_eq!(hw.crc, sum.crc);
    }

    #[test]
    fn test_bus_error_falls_back() {
        let data = Aligned([0x11; 32]);
        let accelerator = Scripted {
            bus_error: true,
            ..Scripted::healthy()
        };
        let mut engine = CrcEngine::new(accelerator);

        let mut crc = 0;
        assert!(!engine.compute(&data.0, &mut crc));
        assert_eq!(crc, software::checksum(&data.0));
        assert!(!engine.is_using_hardware());

        let sum = engine.checksum(&data.0);
        assert_eq!(sum.fallback, Some(HardwareFault::BusError));
        assert_eq!(sum.path, Path::Software);
    }

    #[test]
    fn test_timeout_falls_back() {
        let data = Aligned([0x22; 8]);
        let accelerator = Scripted {
            polls_needed: 100,
            ..Scripted::healthy()
        };
        let config = EngineConfig::default().with_poll_limit(Some(10));
        let mut engine = CrcEngine::with_config(Some(accelerator), config).unwrap();

        let sum = engine.checksum(&data.0);
        assert_eq!(sum.fallback, Some(HardwareFault::timeout(10)));
        assert_eq!(sum.crc, software::checksum(&data.0));
        assert!(!engine.is_using_hardware());
        assert_eq!(engine.accelerator().unwrap().polls, 10);
    }

    #[test]
    fn test_slow_accelerator_within_limit() {
        let data = Aligned([0x33; 8]);
        let accelerator = Scripted {
            polls_needed: 50,
            ..Scripted::healthy()
        };
        let config = EngineConfig::UNBOUNDED;
        let mut engine = CrcEngine::with_config(Some(accelerator), config).unwrap();

        let sum = engine.checksum(&data.0);
        assert!(sum.used_hardware());
        assert_eq!(engine.accelerator().unwrap().polls, 51);
    }

    #[test]
    fn test_errata_workaround_applied_in_ram() {
        let data = Aligned([0x44; 16]);
        let mut engine = CrcEngine::with_config(Some(Scripted::affected()), everywhere()).unwrap();
        assert!(engine.capability().hardware_errata);

        let sum = engine.checksum(&data.0);
        assert!(sum.used_hardware());

        let accelerator = engine.accelerator().unwrap();
        assert_eq!(accelerator.control_at_start, Some(0));
        assert_eq!(
            accelerator.control_writes,
            vec![0, ERRATA_CACHE_RESTORE]
        );
    }

    #[test]
    fn test_errata_workaround_skipped_outside_ram() {
        let data = Aligned([0x44; 16]);
        let config = EngineConfig::default().with_ram(0x10..0x20);
        let mut engine = CrcEngine::with_config(Some(Scripted::affected()), config).unwrap();

        engine.checksum(&data.0);
        let accelerator = engine.accelerator().unwrap();
        assert_eq!(accelerator.control_at_start, Some(ERRATA_CACHE_MASK));
        assert!(accelerator.control_writes.is_empty());
    }

    #[test]
    fn test_errata_workaround_skipped_on_fixed_device() {
        let data = Aligned([0x44; 16]);
        let mut engine = CrcEngine::with_config(Some(Scripted::healthy()), everywhere()).unwrap();

        engine.checksum(&data.0);
        assert!(engine.accelerator().unwrap().control_writes.is_empty());
    }

    #[test]
    fn test_errata_workaround_undone_after_bus_error() {
        let data = Aligned([0x55; 16]);
        let accelerator = Scripted {
            bus_error: true,
            ..Scripted::affected()
        };
        let mut engine = CrcEngine::with_config(Some(accelerator), everywhere()).unwrap();

        let sum = engine.checksum(&data.0);
        assert!(sum.is_fallback());
        assert_eq!(
            engine.accelerator().unwrap().control_writes,
            vec![0, ERRATA_CACHE_RESTORE]
        );
    }

    #[test]
    fn test_unaligned_policy_software() {
        let data = Aligned([0x66; 16]);
        let config = EngineConfig::default().with_unaligned(UnalignedPolicy::Software);
        let mut engine = CrcEngine::with_config(Some(Scripted::healthy()), config).unwrap();

        let sum = engine.checksum(&data.0[..7]);
        assert_eq!(sum.path, Path::Software);
        assert_eq!(sum.crc, software::checksum(&data.0[..7]));
        assert_eq!(engine.accelerator().unwrap().starts, 0);

        let sum = engine.checksum(&data.0[..8]);
        assert_eq!(sum.path, Path::Hardware);
    }

    #[test]
    fn test_unaligned_policy_hardware_truncates() {
        let data = Aligned([0x77; 16]);
        let config = EngineConfig::default().with_unaligned(UnalignedPolicy::Hardware);
        let mut engine = CrcEngine::with_config(Some(Scripted::healthy()), config).unwrap();

        let sum = engine.checksum(&data.0[..7]);
        assert_eq!(sum.path, Path::Hardware);
        assert_eq!(sum.crc, software::checksum(&data.0[..4]));
    }

    #[test]
    fn test_split_check_value_on_hardware() {
        let data = Aligned(*b"123456789\0\0\0");
        let mut engine = CrcEngine::new(Scripted::healthy());

        let sum = engine.checksum(&data.0[..9]);
        assert_eq!(sum.path, Path::Hardware);
        assert_eq!(sum.crc, CRC32_CHECK);

        let accelerator = engine.accelerator().unwrap();
        assert_eq!(accelerator.seed, CRC32_SEED);
        assert_eq!(accelerator.words, b"12345678");
    }

    #[test]
    fn test_split_unaligned_head_and_tail() {
        let data = Aligned(*b"The quick brown fox jumps");
        let slice = &data.0[1..11];
        let mut engine = CrcEngine::new(Scripted::healthy());

        let sum = engine.checksum(slice);
        assert_eq!(sum.path, Path::Hardware);
        assert_eq!(sum.crc, software::checksum(slice));

        let accelerator = engine.accelerator().unwrap();
        assert_eq!(accelerator.words, b"quic");
        assert_ne!(accelerator.seed, CRC32_SEED);
    }

    #[test]
    fn test_split_short_buffer_uses_software() {
        let data = Aligned([0xAB; 8]);
        let mut engine = CrcEngine::new(Scripted::healthy());

        let sum = engine.checksum(&data.0[1..4]);
        assert_eq!(sum.path, Path::Software);
        assert_eq!(sum.crc, software::checksum(&data.0[1..4]));
        assert!(!engine.is_using_hardware());
        assert_eq!(engine.accelerator().unwrap().starts, 0);
    }

    #[test]
    fn test_software_checksum_clears_flag() {
        let data = Aligned([0x88; 8]);
        let mut engine = CrcEngine::new(Scripted::healthy());
        assert!(engine.is_using_hardware());

        engine.checksum(&data.0);
        assert!(engine.is_using_hardware());

        let sum = engine.software_checksum(&data.0);
        assert_eq!(sum.path, Path::Software);
        assert!(!engine.is_using_hardware());
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let config = EngineConfig::default().with_poll_limit(Some(0));
        assert!(CrcEngine::<Scripted>::with_config(None, config).is_err());
    }

    #[test]
    fn test_missing_accelerator_uses_software() {
        let data = Aligned([0x3C; 16]);
        let mut engine = CrcEngine::<Scripted>::with_config(None, everywhere()).unwrap();
        assert!(!engine.can_use_hardware());
        assert!(!engine.is_using_hardware());

        let sum = engine.checksum(&data.0);
        assert_eq!(sum.path, Path::Software);
        assert_eq!(sum.fallback, None);
        assert_eq!(sum.crc, software::checksum(&data.0));
        assert!(engine.into_accelerator().is_none());
    }

    #[test]
    fn test_borrowed_accelerator() {
        let data = Aligned([0x99; 8]);
        let mut accelerator = Scripted::healthy();
        {
            let mut engine = CrcEngine::new(&mut accelerator);
            assert!(engine.checksum(&data.0).used_hardware());
        }
        assert_eq!(accelerator.starts, 1);
    }
}

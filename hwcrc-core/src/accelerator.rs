//! Interface to a memory-mapped CRC-32 accelerator.
//!
//! The engine only relies on the semantic operations below. How they map to
//! registers and bits is up to the implementation for a given device family.

use crate::capability::DeviceId;

/// The memory region an accelerator run reads from.
///
/// Accelerators address memory in 32-bit words: the start address is given
/// as a word address and the length as a word count. Bytes past the last
/// whole word are not read.
#[derive(Debug, Clone, Copy)]
pub struct SourceRegion<'a> {
    data: &'a [u8],
}

impl<'a> SourceRegion<'a> {
    /// Wrap a buffer.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// The whole buffer.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Byte address of the first byte.
    pub fn address(&self) -> usize {
        self.data.as_ptr() as usize
    }

    /// Start address in words, as programmed into the accelerator.
    pub fn word_address(&self) -> usize {
        self.address() >> 2
    }

    /// Length in whole words.
    pub fn word_count(&self) -> usize {
        self.data.len() >> 2
    }

    /// Whether both address and length are multiples of 4.
    pub fn is_word_aligned(&self) -> bool {
        self.address() % 4 == 0 && self.data.len() % 4 == 0
    }

    /// The prefix of the buffer that a run over [`word_count`](Self::word_count)
    /// words covers.
    pub fn covered(&self) -> &'a [u8] {
        &self.data[..self.word_count() * 4]
    }
}

/// A hardware CRC-32 unit.
///
/// The unit computes the reflected CRC-32 (polynomial 0x04C11DB7) over a
/// word-aligned memory region, starting from a programmed seed, and leaves
/// the raw register value (without output XOR) in its result register.
///
/// The unit is a singleton: only one run may be in flight at a time.
pub trait CrcAccelerator {
    /// Read the device identification word.
    fn device_id(&self) -> DeviceId;

    /// Enable the clock domains the unit needs.
    fn enable_clocks(&mut self);

    /// Remove write protection from the unit's control registers.
    fn clear_write_protection(&mut self);

    /// Program the seed, source address and word count.
    fn program(&mut self, seed: u32, source: SourceRegion<'_>);

    /// Clear stale done and bus error flags.
    fn clear_status(&mut self);

    /// Trigger a run with the programmed parameters.
    fn start(&mut self);

    /// Poll the done flag once.
    fn poll_done(&mut self) -> bool;

    /// Whether the last run raised a bus error.
    fn bus_error(&self) -> bool;

    /// The accumulated register value of the last run.
    fn result(&self) -> u32;

    /// Read a word from a device control register.
    fn read_control(&self, address: usize) -> u32;

    /// Write a word to a device control register.
    fn write_control(&mut self, address: usize, value: u32);
}

impl<A: CrcAccelerator + ?Sized> CrcAccelerator for &mut A {
    fn device_id(&self) -> DeviceId {
        (**self).device_id()
    }

    fn enable_clocks(&mut self) {
        (**self).enable_clocks()
    }

    fn clear_write_protection(&mut self) {
        (**self).clear_write_protection()
    }

    fn program(&mut self, seed: u32, source: SourceRegion<'_>) {
        (**self).program(seed, source)
    }

    fn clear_status(&mut self) {
        (**self).clear_status()
    }

    fn start(&mut self) {
        (**self).start()
    }

    fn poll_done(&mut self) -> bool {
        (**self).poll_done()
    }

    fn bus_error(&self) -> bool {
        (**self).bus_error()
    }

    fn result(&self) -> u32 {
        (**self).result()
    }

    fn read_control(&self, address: usize) -> u32 {
        (**self).read_control(address)
    }

    fn write_control(&mut self, address: usize, value: u32) {
        (**self).write_control(address, value)
    }
}

/// Stand-in accelerator type for targets without a CRC unit.
///
/// It has no values, so an engine built with it can never take the
/// hardware path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoAccelerator {}

impl CrcAccelerator for NoAccelerator {
    fn device_id(&self) -> DeviceId {
        match *self {}
    }

    fn enable_clocks(&mut self) {
        match *self {}
    }

    fn clear_write_protection(&mut self) {
        match *self {}
    }

    fn program(&mut self, _seed: u32, _source: SourceRegion<'_>) {
        match *self {}
    }

    fn clear_status(&mut self) {
        match *self {}
    }

    fn start(&mut self) {
        match *self {}
    }

    fn poll_done(&mut self) -> bool {
        match *self {}
    }

    fn bus_error(&self) -> bool {
        match *self {}
    }

    fn result(&self) -> u32 {
        match *self {}
    }

    fn read_control(&self, _address: usize) -> u32 {
        match *self {}
    }

    fn write_control(&mut self, _address: usize, _value: u32) {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(align(4))]
    struct Aligned([u8; 12]);

    #[test]
    fn test_region_aligned() {
        let buf = Aligned([0xA5; 12]);
        let region = SourceRegion::new(&buf.0);
        assert!(region.is_word_aligned());
        assert_eq!(region.word_count(), 3);
        assert_eq!(region.word_address(), region.address() >> 2);
        assert_eq!(region.covered().len(), 12);
    }

    #[test]
    fn test_region_unaligned_length() {
        let buf = Aligned([0; 12]);
        let region = SourceRegion::new(&buf.0[..7]);
        assert!(!region.is_word_aligned());
        assert_eq!(region.word_count(), 1);
        assert_eq!(region.covered(), &buf.0[..4]);
    }

    #[test]
    fn test_region_unaligned_address() {
        let buf = Aligned([0; 12]);
        let region = SourceRegion::new(&buf.0[1..9]);
        assert_eq!(region.data().len(), 8);
        assert!(!region.is_word_aligned());
    }

    #[test]
    fn test_region_empty() {
        let region = SourceRegion::new(&[]);
        assert_eq!(region.word_count(), 0);
        assert!(region.covered().is_empty());
    }
}

//! Table-driven software CRC-32.
//!
//! This is the path that is always available. It is used on its own when no
//! accelerator is present or software mode is forced, and as the fallback
//! when a hardware run faults.
//!
//! ## Register convention
//!
//! The accumulator holds the *complemented* CRC register. A zero accumulator
//! therefore corresponds to the standard `0xFFFFFFFF` seed, and the value left
//! in the accumulator after the last byte is already the final CRC (the
//! output XOR is folded into the table). This is why every table entry is
//! built with an inverted branch and a top byte XORed with `0xFF`:
//!
//! ```text
//! table'[i] = table[i ^ 0xFF] ^ 0xFF000000
//! ```
//!
//! where `table` is the usual reflected CRC-32 table.

/// Reflected form of the CRC-32 polynomial 0x04C11DB7.
pub const POLY_REFLECTED: u32 = 0xEDB8_8320;

/// Initial register value of the standard CRC-32.
pub const CRC32_SEED: u32 = 0xFFFF_FFFF;

/// Value XORed into the register to produce the final CRC.
pub const CRC32_XOR_OUT: u32 = 0xFFFF_FFFF;

/// CRC-32 of the ASCII bytes `"123456789"`.
pub const CRC32_CHECK: u32 = 0xCBF4_3926;

/// Accumulator value that starts a new computation.
pub const ACCUMULATOR_SEED: u32 = CRC32_SEED ^ CRC32_XOR_OUT;

/// Lookup table for the complemented-register form.
static TABLE: [u32; 256] = build_table();

/// Partial CRC contribution of one byte value.
const fn table_entry(byte: u32) -> u32 {
    let mut r = byte;
    let mut j = 0;
    while j < 8 {
        r = if r & 1 != 0 {
            r >> 1
        } else {
            (r >> 1) ^ POLY_REFLECTED
        };
        j += 1;
    }
    r ^ 0xFF00_0000
}

/// Build the 256-entry lookup table.
///
/// The static table used by [`update`] is produced by this function at
/// compile time. Calling it again at run time yields an identical table.
pub const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        table[i] = table_entry(i as u32);
        i += 1;
    }
    table
}

/// The process-wide lookup table.
pub fn table() -> &'static [u32; 256] {
    &TABLE
}

/// Feed `data` into a complemented-register accumulator.
///
/// Start from [`ACCUMULATOR_SEED`]; the returned value is the CRC of every
/// byte fed so far.
#[inline]
pub fn update(accumulator: u32, data: &[u8]) -> u32 {
    update_with(table(), accumulator, data)
}

#[inline]
fn update_with(table: &[u32; 256], mut accumulator: u32, data: &[u8]) -> u32 {
    for &byte in data {
        let index = ((accumulator ^ byte as u32) & 0xFF) as usize;
        accumulator = table[index] ^ (accumulator >> 8);
    }
    accumulator
}

/// Compute the CRC-32 of a complete buffer.
///
/// # Example
///
/// ```
/// use hwcrc_core::software;
///
/// assert_eq!(software::checksum(b"123456789"), 0xCBF43926);
/// ```
#[inline]
pub fn checksum(data: &[u8]) -> u32 {
    update(ACCUMULATOR_SEED, data)
}

//! Compact target arithmetic
//!
//! A 32-bit `bits` word packs a 256-bit target threshold: the top byte is the
//! size in bytes, the low 23 bits are the mantissa (bit 23 is a sign flag,
//! always clear here). All expansion, encoding and comparison run on
//! `BigUint`, never on floats or fixed-width integers.

use num_bigint::BigUint;

/// Highest encodable bits value; its expansion bounds every retarget.
pub const MAX_BITS: u32 = 0x207f_ffff;

/// Expand a compact bits word into its 256-bit target.
///
/// `target = mantissa << 8·(size−3)` for size > 3, otherwise
/// `mantissa >> 8·(3−size)`.
pub fn bits_to_target(bits: u32) -> BigUint {
    let size = bits >> 24;
    let mantissa = BigUint::from(bits & 0x007f_ffff);

    if size <= 3 {
        mantissa >> (8 * (3 - size) as usize)
    } else {
        mantissa << (8 * (size - 3) as usize)
    }
}

/// Compress a target back into a compact bits word.
///
/// Picks the smallest size whose top three bytes fit in 24 bits with bit 23
/// clear; when bit 23 would be set the mantissa shifts right one byte and the
/// size grows by one. Encoding drops everything below the top three bytes, so
/// `bits_to_target(target_to_bits(t)) <= t` with at most one low byte of loss.
pub fn target_to_bits(target: &BigUint) -> u32 {
    let bytes = target.to_bytes_be();
    let mut size = bytes.len() as u32;

    let mut compact: u32 = if size <= 3 {
        let mut word = 0u32;
        for b in &bytes {
            word = (word << 8) | u32::from(*b);
        }
        word << (8 * (3 - size))
    } else {
        let shifted = target >> (8 * (size - 3) as usize);
        shifted.iter_u32_digits().next().unwrap_or(0)
    };

    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }

    (size << 24) | (compact & 0x007f_ffff)
}

/// Check whether a hex-encoded block hash, read as a 256-bit big-endian
/// integer, is at or below the target encoded in `bits`. An unparsable hash
/// never meets any target.
pub fn hash_meets_bits(hash_hex: &str, bits: u32) -> bool {
    match BigUint::parse_bytes(hash_hex.as_bytes(), 16) {
        Some(hash) => hash <= bits_to_target(bits),
        None => false,
    }
}

/// The largest target the compact encoding can represent
pub fn max_target() -> BigUint {
    bits_to_target(MAX_BITS)
}

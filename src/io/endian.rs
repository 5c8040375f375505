//! Byte order handling for the binary encoding.
//!
//! Binary SDDS pages are written in the byte order declared in the header.
//! Codecs decide once per page whether the declared order differs from the
//! host; when it does every scalar goes through [`Swap::swap`], otherwise
//! bytes are used as they are.
//!
//! Long doubles are stored as 16 bytes: the 80-bit x87 extended value
//! (64-bit significand with explicit integer bit, 15-bit exponent, sign)
//! followed by six padding bytes, all in the declared byte order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte order declared for a binary dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    #[serde(rename = "big")]
    BigEndian,
    #[serde(rename = "little")]
    LittleEndian,
}

impl ByteOrder {
    /// Byte order of the running machine.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }

    /// The order that is not native.
    #[must_use]
    pub const fn foreign() -> Self {
        match Self::native() {
            ByteOrder::BigEndian => ByteOrder::LittleEndian,
            ByteOrder::LittleEndian => ByteOrder::BigEndian,
        }
    }

    /// True when values in this order must be swapped on this host.
    #[must_use]
    pub fn needs_swap(self) -> bool {
        self != Self::native()
    }

    /// Word used in the `!# <order>` header comment.
    #[must_use]
    pub fn header_word(self) -> &'static str {
        match self {
            ByteOrder::BigEndian => "big-endian",
            ByteOrder::LittleEndian => "little-endian",
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_word())
    }
}

/// Byte reversal for fixed-size scalars.
pub trait Swap: Sized {
    #[must_use]
    fn swap(self) -> Self;
}

macro_rules! swap_int {
    ($($t:ty),*) => {
        $(impl Swap for $t {
            fn swap(self) -> Self {
                self.swap_bytes()
            }
        })*
    };
}

swap_int!(i16, u16, i32, u32, i64, u64);

impl Swap for u8 {
    fn swap(self) -> Self {
        self
    }
}

impl Swap for f32 {
    fn swap(self) -> Self {
        f32::from_bits(self.to_bits().swap_bytes())
    }
}

impl Swap for f64 {
    fn swap(self) -> Self {
        f64::from_bits(self.to_bits().swap_bytes())
    }
}

impl Swap for [u8; 16] {
    fn swap(mut self) -> Self {
        self.reverse();
        self
    }
}

/// Scalars with a native-order byte representation of fixed width.
pub trait Scalar: Swap + Copy {
    const SIZE: usize;
    fn from_native(bytes: &[u8]) -> Self;
    fn write_native(self, out: &mut Vec<u8>);
}

macro_rules! scalar {
    ($($t:ty),*) => {
        $(impl Scalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn from_native(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(&bytes[..Self::SIZE]);
                <$t>::from_ne_bytes(raw)
            }

            fn write_native(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_ne_bytes());
            }
        })*
    };
}

scalar!(u8, i16, u16, i32, u32, i64, u64, f32, f64);

/// Decode one scalar from the front of `bytes`, swapping when asked.
#[inline]
pub fn decode<T: Scalar>(bytes: &[u8], swap: bool) -> T {
    let v = T::from_native(bytes);
    if swap { v.swap() } else { v }
}

/// Append one scalar in native order, or swapped.
#[inline]
pub fn encode<T: Scalar>(value: T, swap: bool, out: &mut Vec<u8>) {
    let v = if swap { value.swap() } else { value };
    v.write_native(out);
}

const X87_BIAS: i32 = 16383;

/// Convert an `f64` to x87 extended precision, little-endian, padded to 16 bytes.
#[must_use]
pub fn f64_to_x87_le(value: f64) -> [u8; 16] {
    let bits = value.to_bits();
    let sign = ((bits >> 63) as u16) << 15;
    let exp = ((bits >> 52) & 0x7ff) as i32;
    let frac = bits & ((1u64 << 52) - 1);

    let (exp80, mantissa): (u16, u64) = if exp == 0 && frac == 0 {
        (0, 0)
    } else if exp == 0x7ff {
        (0x7fff, (1u64 << 63) | (frac << 11))
    } else if exp == 0 {
        let shift = frac.leading_zeros();
        let mantissa = frac << shift;
        let unbiased = 63 - 1074 - shift as i32;
        ((unbiased + X87_BIAS) as u16, mantissa)
    } else {
        ((exp - 1023 + X87_BIAS) as u16, (1u64 << 63) | (frac << 11))
    };

    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&mantissa.to_le_bytes());
    out[8..10].copy_from_slice(&(sign | exp80).to_le_bytes());
    out
}

/// Convert 16 little-endian bytes holding an x87 extended value to `f64`.
#[must_use]
pub fn x87_le_to_f64(bytes: &[u8; 16]) -> f64 {
    let mut m = [0u8; 8];
    m.copy_from_slice(&bytes[..8]);
    let mantissa = u64::from_le_bytes(m);
    let se = u16::from_le_bytes([bytes[8], bytes[9]]);
    let negative = se & 0x8000 != 0;
    let exp80 = i32::from(se & 0x7fff);

    let magnitude = if exp80 == 0x7fff {
        if mantissa << 1 == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else if mantissa == 0 {
        0.0
    } else {
        let unbiased = if exp80 == 0 { 1 - X87_BIAS } else { exp80 - X87_BIAS };
        let lz = mantissa.leading_zeros() as i32;
        let normalized = mantissa << lz;
        let top = (normalized >> 11) as f64;
        scale_by_power_of_two(top, unbiased - lz - 52)
    };
    if negative { -magnitude } else { magnitude }
}

fn scale_by_power_of_two(mut x: f64, mut e: i32) -> f64 {
    while e > 1000 {
        x *= 2f64.powi(1000);
        e -= 1000;
        if x.is_infinite() {
            return x;
        }
    }
    while e < -1000 {
        x *= 2f64.powi(-1000);
        e += 1000;
        if x == 0.0 {
            return x;
        }
    }
    x * 2f64.powi(e)
}

/// Long double bytes in the requested order.
#[must_use]
pub fn encode_long_double(value: f64, order: ByteOrder) -> [u8; 16] {
    let le = f64_to_x87_le(value);
    match order {
        ByteOrder::LittleEndian => le,
        ByteOrder::BigEndian => le.swap(),
    }
}

/// Long double from bytes in the given order.
#[must_use]
pub fn decode_long_double(bytes: &[u8], order: ByteOrder) -> f64 {
    let mut raw = [0u8; 16];
    raw.copy_from_slice(&bytes[..16]);
    if order == ByteOrder::BigEndian {
        raw = raw.swap();
    }
    x87_le_to_f64(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x87_round_trips_f64() {
        for v in [
            0.0,
            -0.0,
            1.0,
            -2.5,
            std::f64::consts::PI,
            1e300,
            -1e-300,
            f64::MIN_POSITIVE,
            5e-324,
            f64::MAX,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ] {
            let back = x87_le_to_f64(&f64_to_x87_le(v));
            assert_eq!(back.to_bits(), v.to_bits(), "{v}");
        }
        assert!(x87_le_to_f64(&f64_to_x87_le(f64::NAN)).is_nan());
    }

    #[test]
    fn x87_layout_of_one() {
        let bytes = f64_to_x87_le(1.0);
        assert_eq!(&bytes[..8], &0x8000_0000_0000_0000u64.to_le_bytes());
        assert_eq!(&bytes[8..10], &[0xff, 0x3f]);
        assert_eq!(&bytes[10..], &[0u8; 6]);
        assert_eq!(decode_long_double(&encode_long_double(1.0, ByteOrder::BigEndian), ByteOrder::BigEndian), 1.0);
    }

    #[test]
    fn swap_is_an_involution() {
        let mut out = Vec::new();
        encode(0x0102_0304i32, true, &mut out);
        assert_eq!(decode::<i32>(&out, true), 0x0102_0304);
        assert_eq!(decode::<i32>(&out, false), 0x0403_0201);
        assert_eq!(1.5f64.swap().swap(), 1.5);
    }
}

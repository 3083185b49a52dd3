//! # Value codec
//!
//! VISCA spreads multi-byte parameters (positions, some speeds) over several
//! bytes, one nibble per byte, most significant nibble first. The high nibble
//! of every byte is zero on the wire and ignored when reading.
//!
//! A 16-bit pan position of `0x0123` is sent as `00 01 02 03`; a signed
//! position of `-432` (`0xfe50`) is sent as `0f 0e 05 00`.
use crate::{Error, Result};

/// Maximum number of nibbles which fit in an `i32`/`u32`.
const MAX_WIDTH: usize = 8;

/// Packs `value` into `width` nibbles, each in the low 4 bits of its own byte.
///
/// When `signed` is set, the value is encoded in two's complement over
/// `4 * width` bits.
///
/// ## Errors
///
/// * [`Error::InvalidLength`] when `width` is 0 or greater than 8
/// * [`Error::ParameterOutOfRange`] when `value` does not fit in `width`
///   nibbles
pub fn pack(value: i32, width: usize, signed: bool) -> Result<Vec<u8>> {
    if width == 0 || width > MAX_WIDTH {
        return Err(Error::InvalidLength);
    }

    let bits = 4 * width as u32;
    let (min, max) = if signed {
        (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
    } else {
        (0, (1i64 << bits) - 1)
    };
    check_range(i64::from(value), min, max)?;

    // Reinterpreting as u32 gives the two's complement bit pattern; the shift
    // below only ever looks at the low `bits` bits.
    let raw = value as u32;
    Ok((0..width)
        .rev()
        .map(|i| ((raw >> (4 * i)) & 0xf) as u8)
        .collect())
}

/// Reassembles nibble-packed `bytes` into an integer, ignoring the high nibble
/// of every byte.
///
/// When `signed` is set, the value is sign-extended from `4 * bytes.len()`
/// bits.
///
/// ## Errors
///
/// * [`Error::InvalidLength`] when `bytes` is empty or longer than 8 bytes
pub fn unpack(bytes: &[u8], signed: bool) -> Result<i32> {
    if bytes.is_empty() || bytes.len() > MAX_WIDTH {
        return Err(Error::InvalidLength);
    }

    let raw = bytes
        .iter()
        .fold(0u32, |acc, b| (acc << 4) | u32::from(b & 0xf));

    let bits = 4 * bytes.len() as u32;
    if signed && bits < 32 && raw & (1 << (bits - 1)) != 0 {
        Ok((raw | (u32::MAX << bits)) as i32)
    } else {
        Ok(raw as i32)
    }
}

/// Checks that `value` is within `min..=max`.
///
/// Out-of-range values are rejected with [`Error::ParameterOutOfRange`], not
/// saturated.
pub fn check_range<T: PartialOrd>(value: T, min: T, max: T) -> Result<T> {
    if value < min || value > max {
        return Err(Error::ParameterOutOfRange);
    }
    Ok(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pack_unsigned() -> Result<()> {
        assert_eq!(hex::decode("00010203")?, pack(0x0123, 4, false)?);
        assert_eq!(hex::decode("01020304")?, pack(0x1234, 4, false)?);
        assert_eq!(hex::decode("0f0f")?, pack(0xff, 2, false)?);
        assert!(matches!(
            pack(0x10000, 4, false),
            Err(Error::ParameterOutOfRange)
        ));
        assert!(matches!(pack(-1, 4, false), Err(Error::ParameterOutOfRange)));
        Ok(())
    }

    #[test]
    fn pack_signed() -> Result<()> {
        assert_eq!(hex::decode("0f0e0500")?, pack(-432, 4, true)?);
        assert_eq!(hex::decode("00000604")?, pack(100, 4, true)?);
        assert_eq!(hex::decode("0f0f0c0e")?, pack(-50, 4, true)?);
        assert_eq!(hex::decode("08000000")?, pack(i16::MIN.into(), 4, true)?);
        assert!(matches!(
            pack(0x8000, 4, true),
            Err(Error::ParameterOutOfRange)
        ));
        Ok(())
    }

    #[test]
    fn pack_width() {
        assert!(matches!(pack(0, 0, false), Err(Error::InvalidLength)));
        assert!(matches!(pack(0, 9, false), Err(Error::InvalidLength)));
        assert!(pack(i32::MIN, 8, true).is_ok());
        assert!(pack(i32::MAX, 8, false).is_ok());
    }

    #[test]
    fn unpack_ignores_high_nibble() -> Result<()> {
        assert_eq!(0x1234, unpack(&hex::decode("f1e2d3c4")?, false)?);
        assert_eq!(0x0123, unpack(&hex::decode("00010203")?, true)?);
        assert_eq!(-432, unpack(&hex::decode("0f0e0500")?, true)?);
        assert_eq!(0xfe50, unpack(&hex::decode("0f0e0500")?, false)?);
        assert_eq!(-1, unpack(&[0xf; 8], true)?);
        assert!(matches!(unpack(&[], false), Err(Error::InvalidLength)));
        assert!(matches!(unpack(&[0; 9], false), Err(Error::InvalidLength)));
        Ok(())
    }

    #[test]
    fn speed_round_trip() -> Result<()> {
        for speed in -24..=24 {
            assert_eq!(speed, unpack(&pack(speed, 2, true)?, true)?);
            assert_eq!(speed, unpack(&pack(speed, 4, true)?, true)?);
        }
        Ok(())
    }

    #[test]
    fn range() {
        assert!(matches!(check_range(24, -24, 24), Ok(24)));
        assert!(matches!(check_range(-24, -24, 24), Ok(-24)));
        assert!(matches!(
            check_range(25, -24, 24),
            Err(Error::ParameterOutOfRange)
        ));
        assert!(matches!(
            check_range(-8i8, -7, 7),
            Err(Error::ParameterOutOfRange)
        ));
    }
}

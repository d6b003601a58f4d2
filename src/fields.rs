//! Bounds-checked decoding of fixed-offset ASCII fields.

use crate::error::ShakeError;

fn field(buf: &[u8], offset: usize, width: usize) -> Result<&str, ShakeError> {
    let bytes = buf.get(offset..offset + width).ok_or_else(|| ShakeError::InvalidField {
        offset,
        message: format!("need {} bytes, packet is {} long", width, buf.len()),
    })?;
    std::str::from_utf8(bytes).map_err(|_| ShakeError::InvalidField {
        offset,
        message: format!("non-ASCII bytes {}", hex::encode(bytes)),
    })
}

/// Decimal field, optionally signed (`+0123`, `-0456`, `0789`).
pub fn decimal(buf: &[u8], offset: usize, width: usize) -> Result<i32, ShakeError> {
    let text = field(buf, offset, width)?;
    text.trim_start().parse::<i32>().map_err(|e| ShakeError::InvalidField {
        offset,
        message: format!("{text:?} is not decimal: {e}"),
    })
}

/// Unsigned decimal field that must fit a `u16`.
pub fn decimal_u16(buf: &[u8], offset: usize, width: usize) -> Result<u16, ShakeError> {
    let value = decimal(buf, offset, width)?;
    u16::try_from(value).map_err(|_| ShakeError::InvalidField {
        offset,
        message: format!("{value} out of range"),
    })
}

/// Signed decimal field that must fit an `i16`.
pub fn decimal_i16(buf: &[u8], offset: usize, width: usize) -> Result<i16, ShakeError> {
    let value = decimal(buf, offset, width)?;
    i16::try_from(value).map_err(|_| ShakeError::InvalidField {
        offset,
        message: format!("{value} out of range"),
    })
}

/// Decimal field wider than 32 bits, such as the playback timestamp.
pub fn decimal_u64(buf: &[u8], offset: usize, width: usize) -> Result<u64, ShakeError> {
    let text = field(buf, offset, width)?;
    text.trim_start().parse::<u64>().map_err(|e| ShakeError::InvalidField {
        offset,
        message: format!("{text:?} is not decimal: {e}"),
    })
}

/// Hexadecimal field, as used by acknowledgment packets.
pub fn hex_u32(buf: &[u8], offset: usize, width: usize) -> Result<u32, ShakeError> {
    let text = field(buf, offset, width)?;
    u32::from_str_radix(text, 16).map_err(|e| ShakeError::InvalidField {
        offset,
        message: format!("{text:?} is not hexadecimal: {e}"),
    })
}

/// Raw text of a field, for identifiers such as RFID tags.
pub fn text(buf: &[u8], offset: usize, width: usize) -> Result<String, ShakeError> {
    field(buf, offset, width).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_decimal() {
        let buf = b"$ACC,+0123,-0456,";
        assert_eq!(decimal_i16(buf, 5, 5).unwrap(), 123);
        assert_eq!(decimal_i16(buf, 11, 5).unwrap(), -456);
    }

    #[test]
    fn test_out_of_bounds_is_an_error() {
        let buf = b"$HED,12";
        match decimal(buf, 5, 4) {
            Err(ShakeError::InvalidField { offset, .. }) => assert_eq!(offset, 5),
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_digits_rejected() {
        assert!(decimal(b"12x4", 0, 4).is_err());
        assert!(decimal_u16(b"-001", 0, 4).is_err());
        assert!(hex_u32(b"12G4", 0, 4).is_err());
    }

    #[test]
    fn test_hex_and_timestamp() {
        assert_eq!(hex_u32(b"1234,56", 0, 4).unwrap(), 0x1234);
        assert_eq!(hex_u32(b"1234,56", 5, 2).unwrap(), 0x56);
        assert_eq!(decimal_u64(b"0000012345", 0, 10).unwrap(), 12345);
    }
}

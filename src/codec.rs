//! Wire format for a single time update: the adjusted Unix time as a 4-byte
//! unsigned big-endian integer. No framing and no checksum.

use serde::Deserialize;
use thiserror::Error;

pub const PAYLOAD_LEN: usize = 4;

pub type Payload = [u8; PAYLOAD_LEN];

/// What to do with a value that does not fit the 32-bit unsigned field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Refuse to encode. The sender stops.
    #[default]
    Reject,
    /// Clamp into `0..=u32::MAX` and keep going.
    Saturate,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("timestamp {0} does not fit in an unsigned 32-bit field")]
    OutOfRange(i64),
    #[error("payload must be {n} hex digits, got {0:?}", n = PAYLOAD_LEN * 2)]
    InvalidPayload(String),
}

pub fn offset_seconds(offset_hours: i32) -> i64 {
    i64::from(offset_hours) * 3600
}

/// Shift a Unix timestamp by a whole number of hours.
pub fn apply_offset(timestamp: i64, offset_hours: i32) -> i64 {
    timestamp.saturating_add(offset_seconds(offset_hours))
}

pub fn encode_timestamp(value: i64, policy: OverflowPolicy) -> Result<Payload, CodecError> {
    let wire = match u32::try_from(value) {
        Ok(v) => v,
        Err(_) => match policy {
            OverflowPolicy::Reject => return Err(CodecError::OutOfRange(value)),
            OverflowPolicy::Saturate => {
                let clamped = value.clamp(0, i64::from(u32::MAX)) as u32;
                tracing::warn!("Timestamp {} out of 32-bit range, saturated to {}", value, clamped);
                clamped
            }
        },
    };
    Ok(wire.to_be_bytes())
}

/// Inverse of [`encode_timestamp`], as the receiving device reads it.
pub fn decode_timestamp(payload: &Payload) -> u32 {
    u32::from_be_bytes(*payload)
}

/// Parse a payload written as hex digits, e.g. `"65F0A1B2"`.
pub fn parse_hex_payload(text: &str) -> Result<Payload, CodecError> {
    let digits = text.trim().trim_start_matches("0x").trim_start_matches("0X");
    if digits.len() != PAYLOAD_LEN * 2 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CodecError::InvalidPayload(text.to_string()));
    }
    u32::from_str_radix(digits, 16)
        .map(u32::to_be_bytes)
        .map_err(|_| CodecError::InvalidPayload(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_big_endian() {
        let payload = encode_timestamp(0x65F0_A1B2, OverflowPolicy::Reject).unwrap();
        assert_eq!(payload, [0x65, 0xF0, 0xA1, 0xB2]);
    }

    #[test]
    fn test_offset_applied_before_encoding() {
        let ts = 1_700_000_000;
        let adjusted = apply_offset(ts, 2);
        assert_eq!(adjusted, ts + 7200);
        let payload = encode_timestamp(adjusted, OverflowPolicy::Reject).unwrap();
        assert_eq!(i64::from(decode_timestamp(&payload)), ts + 7200);

        let adjusted = apply_offset(ts, -5);
        let payload = encode_timestamp(adjusted, OverflowPolicy::Reject).unwrap();
        assert_eq!(i64::from(decode_timestamp(&payload)), ts - 5 * 3600);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = encode_timestamp(1_234_567_890, OverflowPolicy::Reject).unwrap();
        let b = encode_timestamp(1_234_567_890, OverflowPolicy::Reject).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_u32_bounds() {
        let max = encode_timestamp(i64::from(u32::MAX), OverflowPolicy::Reject).unwrap();
        assert_eq!(max, [0xFF; 4]);
        let zero = encode_timestamp(0, OverflowPolicy::Reject).unwrap();
        assert_eq!(zero, [0; 4]);
    }

    #[test]
    fn test_overflow_is_rejected_not_wrapped() {
        let too_big = i64::from(u32::MAX) + 1;
        assert_eq!(
            encode_timestamp(too_big, OverflowPolicy::Reject),
            Err(CodecError::OutOfRange(too_big))
        );
        assert_eq!(
            encode_timestamp(-1, OverflowPolicy::Reject),
            Err(CodecError::OutOfRange(-1))
        );
    }

    #[test]
    fn test_overflow_saturates_when_asked() {
        let too_big = i64::from(u32::MAX) + 3600;
        assert_eq!(encode_timestamp(too_big, OverflowPolicy::Saturate).unwrap(), [0xFF; 4]);
        assert_eq!(encode_timestamp(-7200, OverflowPolicy::Saturate).unwrap(), [0; 4]);
    }

    #[test]
    fn test_parse_hex_payload() {
        assert_eq!(parse_hex_payload("65F0A1B2").unwrap(), [0x65, 0xF0, 0xA1, 0xB2]);
        assert_eq!(parse_hex_payload("0x0000ffff").unwrap(), [0, 0, 0xFF, 0xFF]);
        assert!(matches!(parse_hex_payload("123"), Err(CodecError::InvalidPayload(_))));
        assert!(matches!(parse_hex_payload("zz00aa11"), Err(CodecError::InvalidPayload(_))));
        assert!(matches!(parse_hex_payload("+1234567"), Err(CodecError::InvalidPayload(_))));
    }

    #[test]
    fn test_invalid_payload_message() {
        let err = parse_hex_payload("abc").unwrap_err();
        assert_eq!(err.to_string(), "payload must be 8 hex digits, got \"abc\"");
    }
}

//! The store's response framing (spec.md §4.2.6).
//!
//! Every response is a fixed-width, zero-padded, ten-digit ASCII decimal
//! content-length header immediately followed by that many payload bytes.
//! The header and the first payload chunk are meant to go out as a single
//! scattered write, so a short write anywhere in the header is fatal (a
//! short write partway through the payload is just resumed).

use std::fmt::Write as _;

/// Width, in bytes, of the response's content-length header.
pub const RESPONSE_HEADER_LEN: usize = 10;

/// Errors building or parsing a response header.
#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum FramingError {
    /// The payload length does not fit in a 10-digit decimal header.
    #[error("payload length {0} exceeds a {RESPONSE_HEADER_LEN}-digit header")]
    PayloadTooLarge(u64),
    /// The header bytes were not exactly 10 ASCII digits.
    #[error("response header is not {RESPONSE_HEADER_LEN} ASCII digits")]
    MalformedHeader,
}

/// Renders the fixed-width content-length header for `payload_len` bytes.
///
/// # Errors
///
/// Returns [`FramingError::PayloadTooLarge`] if `payload_len` would not fit
/// in [`RESPONSE_HEADER_LEN`] decimal digits.
pub fn encode_header(payload_len: u64) -> Result<[u8; RESPONSE_HEADER_LEN], FramingError> {
    const MAX: u64 = 10u64.pow(RESPONSE_HEADER_LEN as u32) - 1;
    if payload_len > MAX {
        return Err(FramingError::PayloadTooLarge(payload_len));
    }
    let mut text = String::with_capacity(RESPONSE_HEADER_LEN);
    write!(text, "{payload_len:0width$}", width = RESPONSE_HEADER_LEN)
        .expect("formatting into a String cannot fail");
    let mut header = [0u8; RESPONSE_HEADER_LEN];
    header.copy_from_slice(text.as_bytes());
    Ok(header)
}

/// Builds the complete header+payload response for a send, as a single
/// buffer suitable for one scattered write.
///
/// # Errors
///
/// Returns [`FramingError::PayloadTooLarge`] if `payload.len()` does not
/// fit the header.
pub fn encode_response(payload: &[u8]) -> Result<Vec<u8>, FramingError> {
    let header = encode_header(payload.len() as u64)?;
    let mut out = Vec::with_capacity(RESPONSE_HEADER_LEN + payload.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Parses a 10-byte response header into the payload length it declares.
///
/// # Errors
///
/// Returns [`FramingError::MalformedHeader`] if `header` is not exactly
/// [`RESPONSE_HEADER_LEN`] ASCII digit bytes.
pub fn decode_header(header: &[u8]) -> Result<u64, FramingError> {
    if header.len() != RESPONSE_HEADER_LEN || !header.iter().all(u8::is_ascii_digit) {
        return Err(FramingError::MalformedHeader);
    }
    let text = std::str::from_utf8(header).map_err(|_| FramingError::MalformedHeader)?;
    text.parse().map_err(|_| FramingError::MalformedHeader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_a_framing() {
        let response = encode_response(b"ccc").expect("encode");
        assert_eq!(response, b"0000000003ccc");
    }

    #[test]
    fn scenario_b_framing() {
        let response = encode_response(b"bb").expect("encode");
        assert_eq!(response, b"0000000002bb");
    }

    #[test]
    fn scenario_c_framing() {
        let response = encode_response(b"EFGH").expect("encode");
        assert_eq!(response, b"0000000004EFGH");
    }

    #[test]
    fn header_round_trips() {
        let header = encode_header(42).expect("encode_header");
        assert_eq!(decode_header(&header).expect("decode_header"), 42);
    }

    #[test]
    fn rejects_oversized_payload() {
        let err = encode_header(10u64.pow(10)).unwrap_err();
        assert_eq!(err, FramingError::PayloadTooLarge(10u64.pow(10)));
    }

    #[test]
    fn rejects_non_digit_header() {
        let err = decode_header(b"000000003x").unwrap_err();
        assert_eq!(err, FramingError::MalformedHeader);
    }

    #[test]
    fn rejects_wrong_length_header() {
        let err = decode_header(b"123").unwrap_err();
        assert_eq!(err, FramingError::MalformedHeader);
    }
}

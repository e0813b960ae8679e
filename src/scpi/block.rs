//! IEEE 488.2 definite-length block decoding.
//!
//! Data-bearing queries (trace data, screen dumps) answer with a
//! self-describing binary frame on the same channel as text responses:
//! a `#` marker, one ASCII digit giving the number of length digits, that
//! many decimal digits giving the payload byte count, then the payload.
//! The transport may fragment the payload arbitrarily, so the decoder
//! accumulates bounded chunks until the declared count is reached and
//! never treats a short read as completion.

use super::Transport;
use crate::error::ScpiError;
use byteorder::{ByteOrder, LittleEndian};
use log::debug;

pub const BLOCK_MARKER: u8 = b'#';

/// Upper bound on a declared payload length. Screen dumps are hundreds of
/// kilobytes and traces a few kilobytes; anything near this limit means a
/// corrupted header.
pub const MAX_BLOCK_SIZE: usize = 100 * 1024 * 1024;

/// Read exactly `buf.len()` bytes from the transport.
fn read_exact(
    transport: &mut dyn Transport,
    buf: &mut [u8],
    context: &str,
) -> Result<(), ScpiError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = transport
            .read(&mut buf[filled..])
            .map_err(|e| ScpiError::io(context.to_string(), e))?;
        if n == 0 {
            return Err(ScpiError::io(
                context.to_string(),
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("connection closed after {filled} of {} bytes", buf.len()),
                ),
            ));
        }
        filled += n;
    }
    Ok(())
}

/// Decode one definite-length block from the transport.
///
/// Reads the two header bytes, the length digits, then the payload in
/// chunks of at most `max_chunk` bytes until exactly the declared count has
/// been accumulated. Fails with [`ScpiError::MalformedBlock`] when the
/// header does not start with `#` or the length field is not decimal.
pub fn read_block(transport: &mut dyn Transport, max_chunk: usize) -> Result<Vec<u8>, ScpiError> {
    let mut header = [0u8; 2];
    read_exact(transport, &mut header, "reading block header")?;

    if header[0] != BLOCK_MARKER {
        return Err(ScpiError::MalformedBlock(format!(
            "expected '#' marker, got byte 0x{:02x}",
            header[0]
        )));
    }

    // '0' would announce an indefinite-length block, which the instrument
    // never sends on these queries.
    let digit_count = match (header[1] as char).to_digit(10) {
        Some(n) if n > 0 => n as usize,
        _ => {
            return Err(ScpiError::MalformedBlock(format!(
                "invalid length-digit count byte 0x{:02x}",
                header[1]
            )));
        }
    };

    let mut digits = vec![0u8; digit_count];
    read_exact(transport, &mut digits, "reading block length field")?;
    let total: usize = std::str::from_utf8(&digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            ScpiError::MalformedBlock(format!("non-decimal length field {digits:02x?}"))
        })?;

    if total > MAX_BLOCK_SIZE {
        return Err(ScpiError::MalformedBlock(format!(
            "declared length {total} exceeds maximum {MAX_BLOCK_SIZE}"
        )));
    }

    debug!("block: expecting {total} payload bytes");

    let mut payload = Vec::with_capacity(total);
    let mut chunk = vec![0u8; max_chunk.min(total).max(1)];
    while payload.len() < total {
        let want = (total - payload.len()).min(chunk.len());
        let n = transport
            .read(&mut chunk[..want])
            .map_err(|e| ScpiError::io("reading block payload", e))?;
        if n == 0 {
            return Err(ScpiError::io(
                "reading block payload",
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("connection closed after {} of {total} bytes", payload.len()),
                ),
            ));
        }
        payload.extend_from_slice(&chunk[..n]);
    }

    Ok(payload)
}

/// Reinterpret a block payload as little-endian 32-bit floats
/// (`FORM REAL,32` with `FORM:BORD SWAP`). A trailing partial sample is
/// dropped.
pub fn samples_f32_le(payload: &[u8]) -> Vec<f32> {
    payload
        .chunks_exact(4)
        .map(LittleEndian::read_f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transport over a fixed byte sequence that serves reads in a scripted
    /// fragmentation pattern, cycling through the pattern entries.
    struct FragmentedSource {
        data: Vec<u8>,
        pos: usize,
        pattern: Vec<usize>,
        turn: usize,
    }

    impl FragmentedSource {
        fn new(data: Vec<u8>, pattern: Vec<usize>) -> Self {
            Self {
                data,
                pos: 0,
                pattern,
                turn: 0,
            }
        }
    }

    impl Transport for FragmentedSource {
        fn write_all(&mut self, _buf: &[u8]) -> std::io::Result<()> {
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.data.len() {
                return Ok(0);
            }
            let fragment = self.pattern[self.turn % self.pattern.len()];
            self.turn += 1;
            let n = fragment.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }

        fn set_io_timeout(&mut self, _timeout: std::time::Duration) -> std::io::Result<()> {
            Ok(())
        }

        fn shutdown(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn encode(payload: &[u8]) -> Vec<u8> {
        let len = payload.len().to_string();
        let mut out = format!("#{}{}", len.len(), len).into_bytes();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn decodes_exact_payload_under_any_fragmentation() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        for pattern in [vec![1], vec![3, 7], vec![1, 1, 4096], vec![5000], vec![13, 1, 250]] {
            let mut source = FragmentedSource::new(encode(&payload), pattern.clone());
            let decoded = read_block(&mut source, 1024).expect("decode failed");
            assert_eq!(decoded, payload, "pattern {pattern:?}");
        }
    }

    #[test]
    fn chunk_bound_smaller_than_payload_still_completes() {
        let payload = vec![0xABu8; 999];
        let mut source = FragmentedSource::new(encode(&payload), vec![4096]);
        let decoded = read_block(&mut source, 16).unwrap();
        assert_eq!(decoded.len(), 999);
    }

    #[test]
    fn rejects_missing_marker_for_any_second_byte() {
        for second in [b'0', b'5', b'9', b'#', 0x00, 0xFF] {
            let mut source = FragmentedSource::new(vec![b'@', second, b'4'], vec![64]);
            let err = read_block(&mut source, 64).unwrap_err();
            assert!(
                matches!(err, ScpiError::MalformedBlock(_)),
                "second byte 0x{second:02x} gave {err:?}"
            );
        }
    }

    #[test]
    fn rejects_zero_digit_count() {
        let mut source = FragmentedSource::new(vec![b'#', b'0'], vec![64]);
        assert!(matches!(
            read_block(&mut source, 64),
            Err(ScpiError::MalformedBlock(_))
        ));
    }

    #[test]
    fn rejects_non_decimal_length_field() {
        let mut source = FragmentedSource::new(b"#2XYjunk".to_vec(), vec![64]);
        assert!(matches!(
            read_block(&mut source, 64),
            Err(ScpiError::MalformedBlock(_))
        ));
    }

    #[test]
    fn zero_length_payload_decodes_empty() {
        let mut source = FragmentedSource::new(encode(&[]), vec![64]);
        assert_eq!(read_block(&mut source, 64).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn truncated_payload_is_an_io_error_not_success() {
        let mut frame = encode(&[1, 2, 3, 4, 5]);
        frame.truncate(frame.len() - 2);
        let mut source = FragmentedSource::new(frame, vec![64]);
        assert!(matches!(
            read_block(&mut source, 64),
            Err(ScpiError::Io { .. })
        ));
    }

    #[test]
    fn samples_drop_trailing_partial() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-80.25f32).to_le_bytes());
        bytes.extend_from_slice(&[0x01, 0x02]);
        assert_eq!(samples_f32_le(&bytes), vec![1.5, -80.25]);
    }
}

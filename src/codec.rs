//! Payload conventions shared by every backend: the size bound on reads,
//! line-ending normalization for text transfers, and base64 for binary ones.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, TransferError};

/// Read `reader` to EOF, failing with `TooLarge` once the read reaches `limit`
/// bytes. Never buffers more than `limit` bytes.
pub async fn read_bounded<R>(reader: R, limit: u64) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = reader.take(limit);
    limited
        .read_to_end(&mut buf)
        .await
        .map_err(TransferError::io("reading transfer data"))?;
    if buf.len() as u64 >= limit {
        return Err(TransferError::TooLarge { limit });
    }
    Ok(buf)
}

/// CRLF to LF, then trim surrounding whitespace.
pub fn text_from_wire(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .replace("\r\n", "\n")
        .trim()
        .to_string()
}

/// Rewrite bare LF line endings as CRLF. Existing CRLF pairs are left alone.
pub fn text_to_wire(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + text.len() / 16);
    let mut prev = 0u8;
    for &b in text.as_bytes() {
        if b == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(b);
        prev = b;
    }
    out
}

pub fn encode_binary(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}

pub fn decode_binary(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| TransferError::InputInvalid(format!("payload is not valid base64: {e}")))
}

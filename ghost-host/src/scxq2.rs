// ghost-host: SCXQ2 codec
//
// Deterministic lz4 block compression over UTF-8 bytes, transported as
// standard base64. decode(encode(x)) == x for every input string.

use crate::error::{HostError, HostResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::engine::Engine;
use lz4_flex::block::{compress_prepend_size, decompress_size_prepended};
use serde::Serialize;

/// Ceiling on decoded payloads, against decompression bombs.
pub const MAX_DECODED_SIZE: usize = 64 * 1024 * 1024;

/// Codec statistics for one input.
#[derive(Debug, Clone, Serialize)]
pub struct CodecStats {
    pub original_size: usize,
    pub encoded_size: usize,
    pub ratio: f64,
}

/// Compress and armour a payload string.
pub fn encode(data: &str) -> String {
    BASE64.encode(compress_prepend_size(data.as_bytes()))
}

/// Invert `encode`. Corrupt armour or compressed data is a bad request.
pub fn decode(encoded: &str) -> HostResult<String> {
    let compressed = BASE64
        .decode(encoded.trim())
        .map_err(|e| HostError::BadRequest(format!("scxq2: invalid base64: {}", e)))?;
    let bytes = decompress_size_prepended(&compressed)
        .map_err(|e| HostError::BadRequest(format!("scxq2: corrupt payload: {}", e)))?;
    if bytes.len() > MAX_DECODED_SIZE {
        return Err(HostError::BadRequest(format!(
            "scxq2: decoded size {} exceeds limit {}",
            bytes.len(),
            MAX_DECODED_SIZE
        )));
    }
    String::from_utf8(bytes)
        .map_err(|e| HostError::BadRequest(format!("scxq2: payload is not UTF-8: {}", e)))
}

/// Sizes and ratio for a payload without returning the encoded form.
pub fn stats(data: &str) -> CodecStats {
    let encoded = encode(data);
    let original_size = data.len();
    let encoded_size = encoded.len();
    let ratio = if original_size == 0 {
        1.0
    } else {
        encoded_size as f64 / original_size as f64
    };
    CodecStats {
        original_size,
        encoded_size,
        ratio,
    }
}

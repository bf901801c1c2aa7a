//! Transparent response body decoding (`Content-Encoding`).

use crate::base::error::{NetError, TransportCause};
use std::io::Read;

/// Decode `body` according to the `Content-Encoding` token. Unknown or
/// identity encodings pass through untouched. The ceiling applies to the
/// decoded size, so a compression bomb cannot bypass the response limit.
pub fn decode_body(encoding: &str, body: &[u8], max_bytes: usize) -> Result<Vec<u8>, NetError> {
    match encoding.trim().to_ascii_lowercase().as_str() {
        "gzip" | "x-gzip" => {
            read_capped(flate2::read::GzDecoder::new(body), max_bytes, "gzip")
        }
        "deflate" => {
            // Servers disagree on whether deflate means zlib-wrapped or raw;
            // try the RFC form first.
            match read_capped(flate2::read::ZlibDecoder::new(body), max_bytes, "deflate") {
                Ok(out) => Ok(out),
                Err(NetError::ResponseTooLarge { .. }) => {
                    Err(NetError::ResponseTooLarge { limit: max_bytes })
                }
                Err(_) => read_capped(flate2::read::DeflateDecoder::new(body), max_bytes, "deflate"),
            }
        }
        "br" => read_capped(brotli::Decompressor::new(body, 4096), max_bytes, "brotli"),
        _ => Ok(body.to_vec()),
    }
}

fn read_capped<R: Read>(reader: R, max_bytes: usize, label: &str) -> Result<Vec<u8>, NetError> {
    let mut out = Vec::new();
    let mut limited = reader.take(max_bytes as u64 + 1);
    limited
        .read_to_end(&mut out)
        .map_err(|e| NetError::TransportFailure(TransportCause::BadFraming(format!("{label}: {e}"))))?;
    if out.len() > max_bytes {
        return Err(NetError::ResponseTooLarge { limit: max_bytes });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn gzip_round_trip() {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(b"hello gzip").unwrap();
        let compressed = enc.finish().unwrap();

        let out = decode_body("gzip", &compressed, 1024).unwrap();
        assert_eq!(out, b"hello gzip");
    }

    #[test]
    fn deflate_round_trip() {
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(b"hello deflate").unwrap();
        let compressed = enc.finish().unwrap();

        let out = decode_body("deflate", &compressed, 1024).unwrap();
        assert_eq!(out, b"hello deflate");
    }

    #[test]
    fn identity_passthrough() {
        let out = decode_body("identity", b"as-is", 1024).unwrap();
        assert_eq!(out, b"as-is");
        let out = decode_body("", b"as-is", 1024).unwrap();
        assert_eq!(out, b"as-is");
    }

    #[test]
    fn decoded_size_respects_ceiling() {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(&vec![0u8; 4096]).unwrap();
        let compressed = enc.finish().unwrap();

        let err = decode_body("gzip", &compressed, 100).unwrap_err();
        assert!(matches!(err, NetError::ResponseTooLarge { limit: 100 }));
    }
}

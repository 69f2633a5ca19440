//! Common utilities shared between the runner and the bindings generator

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Decode a `0x`-prefixed (or bare) hex string
pub fn decode_hex(what: &str, s: &str) -> Result<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| Error::invalid_hex(what, e))
}

/// Encode bytes as a `0x`-prefixed hex string
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hex_with_and_without_prefix() {
        assert_eq!(decode_hex("bytes", "0xdeadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode_hex("bytes", "00ff").unwrap(), vec![0x00, 0xff]);
        assert!(decode_hex("bytes", "0x123").is_err());
    }

    #[test]
    fn test_encode_hex() {
        assert_eq!(encode_hex(&[1, 0xab]), "0x01ab");
        assert_eq!(encode_hex(&[]), "0x");
    }
}

//! Minimal SCALE codec
//!
//! Covers only the shapes the harness reads from or writes to node
//! storage: fixed-width little-endian integers, 32-byte ids, compact
//! lengths, byte vectors, `Option` and the message queue node.

use crate::common::{Error, Result};

/// Types that can be written in SCALE form
pub trait Encode {
    fn encode_to(&self, out: &mut Vec<u8>);

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_to(&mut out);
        out
    }
}

/// Types that can be read from SCALE form
pub trait Decode: Sized {
    fn decode_from(input: &mut Input<'_>) -> Result<Self>;

    /// Decode a complete value, rejecting trailing bytes
    fn decode(what: &str, bytes: &[u8]) -> Result<Self> {
        let mut input = Input::new(what, bytes);
        let value = Self::decode_from(&mut input)?;
        if !input.is_empty() {
            return Err(Error::decode(
                what,
                format!("{} trailing bytes", input.remaining()),
            ));
        }
        Ok(value)
    }
}

/// Cursor over an encoded value
pub struct Input<'a> {
    what: &'a str,
    data: &'a [u8],
}

impl<'a> Input<'a> {
    pub fn new(what: &'a str, data: &'a [u8]) -> Self {
        Self { what, data }
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() < n {
            return Err(Error::decode(
                self.what,
                format!("needed {} bytes, {} left", n, self.data.len()),
            ));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::decode(self.what, message)
    }
}

macro_rules! impl_fixed_int {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn encode_to(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }

            impl Decode for $ty {
                fn decode_from(input: &mut Input<'_>) -> Result<Self> {
                    Ok(<$ty>::from_le_bytes(input.take_array()?))
                }
            }
        )*
    };
}

impl_fixed_int!(u8, u32, u64, u128);

impl Encode for [u8; 32] {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl Decode for [u8; 32] {
    fn decode_from(input: &mut Input<'_>) -> Result<Self> {
        input.take_array()
    }
}

/// Write a compact-encoded unsigned integer
pub fn encode_compact(value: u64, out: &mut Vec<u8>) {
    match value {
        0..=0x3f => out.push((value as u8) << 2),
        0x40..=0x3fff => out.extend_from_slice(&(((value as u16) << 2) | 0b01).to_le_bytes()),
        0x4000..=0x3fff_ffff => out.extend_from_slice(&(((value as u32) << 2) | 0b10).to_le_bytes()),
        _ => {
            let bytes = value.to_le_bytes();
            let len = 8 - (value.leading_zeros() / 8) as usize;
            out.push((((len - 4) as u8) << 2) | 0b11);
            out.extend_from_slice(&bytes[..len]);
        }
    }
}

/// Read a compact-encoded unsigned integer
pub fn decode_compact(input: &mut Input<'_>) -> Result<u64> {
    let first = input.byte()?;
    match first & 0b11 {
        0b00 => Ok(u64::from(first >> 2)),
        0b01 => {
            let second = input.byte()?;
            Ok(u64::from(u16::from_le_bytes([first, second]) >> 2))
        }
        0b10 => {
            let rest = input.take(3)?;
            Ok(u64::from(
                u32::from_le_bytes([first, rest[0], rest[1], rest[2]]) >> 2,
            ))
        }
        _ => {
            let len = usize::from(first >> 2) + 4;
            if len > 8 {
                return Err(input.error(format!("compact integer of {} bytes", len)));
            }
            let mut buf = [0u8; 8];
            buf[..len].copy_from_slice(input.take(len)?);
            Ok(u64::from_le_bytes(buf))
        }
    }
}

impl Encode for Vec<u8> {
    fn encode_to(&self, out: &mut Vec<u8>) {
        encode_compact(self.len() as u64, out);
        out.extend_from_slice(self);
    }
}

impl Decode for Vec<u8> {
    fn decode_from(input: &mut Input<'_>) -> Result<Self> {
        let len = decode_compact(input)?;
        let len = usize::try_from(len).map_err(|_| input.error("length overflows usize"))?;
        Ok(input.take(len)?.to_vec())
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode_to(&self, out: &mut Vec<u8>) {
        match self {
            None => out.push(0),
            Some(value) => {
                out.push(1);
                value.encode_to(out);
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode_from(input: &mut Input<'_>) -> Result<Self> {
        match input.byte()? {
            0 => Ok(None),
            1 => Ok(Some(T::decode_from(input)?)),
            other => Err(input.error(format!("invalid Option tag {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact(value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        encode_compact(value, &mut out);
        out
    }

    #[test]
    fn test_compact_known_vectors() {
        assert_eq!(compact(0), vec![0x00]);
        assert_eq!(compact(1), vec![0x04]);
        assert_eq!(compact(63), vec![0xfc]);
        assert_eq!(compact(64), vec![0x01, 0x01]);
        assert_eq!(compact(16383), vec![0xfd, 0xff]);
        assert_eq!(compact(16384), vec![0x02, 0x00, 0x01, 0x00]);
        assert_eq!(compact(1 << 30), vec![0x03, 0x00, 0x00, 0x00, 0x40]);
    }

    #[test]
    fn test_compact_boundaries_decode() {
        for value in [0, 63, 64, 16383, 16384, (1 << 30) - 1, 1 << 30, u64::MAX] {
            let bytes = compact(value);
            let mut input = Input::new("compact", &bytes);
            assert_eq!(decode_compact(&mut input).unwrap(), value);
            assert!(input.is_empty());
        }
    }

    #[test]
    fn test_vec_is_length_prefixed() {
        assert_eq!(vec![1u8, 2, 3].encode(), vec![0x0c, 1, 2, 3]);
    }

    #[test]
    fn test_option_tags() {
        assert_eq!(None::<u32>.encode(), vec![0]);
        assert_eq!(Some(7u32).encode(), vec![1, 7, 0, 0, 0]);
        assert!(Option::<u32>::decode("opt", &[2]).is_err());
    }

    #[test]
    fn test_truncated_input_is_decode_error() {
        let err = u32::decode("limit", &[1, 2]).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        assert!(u32::decode("limit", &[1, 0, 0, 0, 9]).is_err());
        assert_eq!(u32::decode("limit", &[1, 0, 0, 0]).unwrap(), 1);
    }
}

//! Varint and length-prefixed encodings used inside manifest records.

use cloudseed_types::error::{Result, SeedError};

const MAX_VARINT64_LEN: usize = 10;

pub(crate) fn put_varint64(dst: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        dst.push((v as u8) | 0x80);
        v >>= 7;
    }
    dst.push(v as u8);
}

pub(crate) fn put_varint32(dst: &mut Vec<u8>, v: u32) {
    put_varint64(dst, u64::from(v));
}

pub(crate) fn put_length_prefixed(dst: &mut Vec<u8>, data: &[u8]) {
    // Epoch cookies are short ids; a u32 length is the on-disk width.
    put_varint32(dst, data.len() as u32);
    dst.extend_from_slice(data);
}

/// Cursor over an encoded record.
pub(crate) struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn varint64(&mut self) -> Result<u64> {
        let mut result = 0u64;
        for (i, &byte) in self.buf.iter().take(MAX_VARINT64_LEN).enumerate() {
            let bits = u64::from(byte & 0x7f);
            if i == MAX_VARINT64_LEN - 1 && bits > 1 {
                return Err(SeedError::InvalidFormat("varint overflows u64".into()));
            }
            result |= bits << (7 * i);
            if byte & 0x80 == 0 {
                self.buf = &self.buf[i + 1..];
                return Ok(result);
            }
        }
        Err(SeedError::InvalidFormat("truncated varint".into()))
    }

    pub(crate) fn varint32(&mut self) -> Result<u32> {
        let v = self.varint64()?;
        u32::try_from(v).map_err(|_| SeedError::InvalidFormat(format!("varint {v} overflows u32")))
    }

    pub(crate) fn length_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.varint32()? as usize;
        if len > self.buf.len() {
            return Err(SeedError::InvalidFormat(format!(
                "length prefix {len} exceeds remaining {} bytes",
                self.buf.len()
            )));
        }
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(head)
    }
}

//! Record log framing for manifest files.
//!
//! The file is a sequence of 32 KiB blocks. Each physical record is
//! `[masked crc32c: u32 LE][length: u16 LE][type: u8][payload]`, where the
//! checksum covers the type byte and the payload. A logical record that does
//! not fit in the current block is split into FIRST / MIDDLE* / LAST
//! fragments. Block tails too short for a header are zero-filled.

use std::ops::Range;

use cloudseed_types::error::{Result, SeedError};

pub const BLOCK_SIZE: usize = 32 * 1024;
pub const HEADER_SIZE: usize = 7;

const FULL: u8 = 1;
const FIRST: u8 = 2;
const MIDDLE: u8 = 3;
const LAST: u8 = 4;

const MASK_DELTA: u32 = 0xa282_ead8;

fn mask_crc(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

fn unmask_crc(masked: u32) -> u32 {
    masked.wrapping_sub(MASK_DELTA).rotate_left(15)
}

fn record_crc(record_type: u8, payload: &[u8]) -> u32 {
    crc32c::crc32c_append(crc32c::crc32c(&[record_type]), payload)
}

/// Accumulates framed records in memory.
#[derive(Debug, Default)]
pub struct LogWriter {
    buf: Vec<u8>,
}

impl LogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&mut self, payload: &[u8]) {
        let mut left = payload;
        let mut begin = true;
        loop {
            let leftover = BLOCK_SIZE - self.buf.len() % BLOCK_SIZE;
            if leftover < HEADER_SIZE {
                self.buf.resize(self.buf.len() + leftover, 0);
            }
            let avail = BLOCK_SIZE - self.buf.len() % BLOCK_SIZE - HEADER_SIZE;
            let frag_len = left.len().min(avail);
            let end = frag_len == left.len();
            let record_type = match (begin, end) {
                (true, true) => FULL,
                (true, false) => FIRST,
                (false, true) => LAST,
                (false, false) => MIDDLE,
            };
            self.emit(record_type, &left[..frag_len]);
            left = &left[frag_len..];
            begin = false;
            if end {
                return;
            }
        }
    }

    fn emit(&mut self, record_type: u8, fragment: &[u8]) {
        let crc = mask_crc(record_crc(record_type, fragment));
        self.buf.extend_from_slice(&crc.to_le_bytes());
        // Fragments never exceed BLOCK_SIZE - HEADER_SIZE.
        self.buf
            .extend_from_slice(&(fragment.len() as u16).to_le_bytes());
        self.buf.push(record_type);
        self.buf.extend_from_slice(fragment);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads logical records back out of a framed log.
pub struct LogReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> LogReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Next physical record as `(type, payload range)`, or `None` at a clean end.
    fn read_physical(&mut self) -> Result<Option<(u8, Range<usize>)>> {
        loop {
            if self.pos >= self.data.len() {
                return Ok(None);
            }
            let block_left = BLOCK_SIZE - self.pos % BLOCK_SIZE;
            if block_left < HEADER_SIZE {
                let end = (self.pos + block_left).min(self.data.len());
                if self.data[self.pos..end].iter().any(|&b| b != 0) {
                    return Err(SeedError::InvalidFormat(format!(
                        "non-zero block trailer at offset {}",
                        self.pos
                    )));
                }
                self.pos = end;
                continue;
            }
            if self.data.len() - self.pos < HEADER_SIZE {
                return Err(SeedError::InvalidFormat(format!(
                    "truncated record header at offset {}",
                    self.pos
                )));
            }

            let h = &self.data[self.pos..self.pos + HEADER_SIZE];
            let masked = u32::from_le_bytes([h[0], h[1], h[2], h[3]]);
            let length = u16::from_le_bytes([h[4], h[5]]) as usize;
            let record_type = h[6];

            if HEADER_SIZE + length > block_left {
                return Err(SeedError::InvalidFormat(format!(
                    "record at offset {} crosses a block boundary",
                    self.pos
                )));
            }
            let start = self.pos + HEADER_SIZE;
            let end = start + length;
            if end > self.data.len() {
                return Err(SeedError::InvalidFormat(format!(
                    "truncated record at offset {}: want {length} bytes, have {}",
                    self.pos,
                    self.data.len() - start
                )));
            }
            if unmask_crc(masked) != record_crc(record_type, &self.data[start..end]) {
                return Err(SeedError::InvalidFormat(format!(
                    "checksum mismatch at offset {}",
                    self.pos
                )));
            }
            self.pos = end;
            return Ok(Some((record_type, start..end)));
        }
    }

    /// Next logical record, or `None` once the log is exhausted.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut scratch: Option<Vec<u8>> = None;
        loop {
            let Some((record_type, range)) = self.read_physical()? else {
                if scratch.is_some() {
                    return Err(SeedError::InvalidFormat(
                        "log ends inside a fragmented record".into(),
                    ));
                }
                return Ok(None);
            };
            let data = self.data;
            let payload = &data[range];
            match (record_type, scratch.as_mut()) {
                (FULL, None) => return Ok(Some(payload.to_vec())),
                (FIRST, None) => scratch = Some(payload.to_vec()),
                (MIDDLE, Some(buf)) => buf.extend_from_slice(payload),
                (LAST, Some(buf)) => {
                    buf.extend_from_slice(payload);
                    return Ok(scratch);
                }
                (FULL | FIRST | MIDDLE | LAST, _) => {
                    return Err(SeedError::InvalidFormat(format!(
                        "out-of-sequence fragment type {record_type}"
                    )));
                }
                (other, _) => {
                    return Err(SeedError::InvalidFormat(format!(
                        "unknown record type {other}"
                    )));
                }
            }
        }
    }
}

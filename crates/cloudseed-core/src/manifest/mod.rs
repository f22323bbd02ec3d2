//! The cloud manifest: which epoch owns which generation of database files.

mod coding;
pub mod log;

use std::io::{Read, Write};

use coding::{Decoder, put_length_prefixed, put_varint32, put_varint64};
use cloudseed_types::error::{Result, SeedError};

use self::log::{LogReader, LogWriter};

pub const FORMAT_VERSION: u32 = 1;

/// An epoch that has been superseded. Files numbered below
/// `next_file_number` (and above the previous entry's) belong to `epoch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastEpoch {
    pub next_file_number: u64,
    pub epoch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloudManifest {
    current_epoch: String,
    past_epochs: Vec<PastEpoch>,
}

impl CloudManifest {
    /// Manifest for a database with no epoch history.
    pub fn create_for_empty_database(current_epoch: &str) -> Self {
        Self {
            current_epoch: current_epoch.to_string(),
            past_epochs: Vec::new(),
        }
    }

    /// Manifest for a freshly bootstrapped database: no history, empty cookie.
    pub fn build_empty() -> Self {
        Self::create_for_empty_database("")
    }

    pub fn current_epoch(&self) -> &str {
        &self.current_epoch
    }

    pub fn past_epochs(&self) -> &[PastEpoch] {
        &self.past_epochs
    }

    pub fn is_empty_database(&self) -> bool {
        self.past_epochs.is_empty() && self.current_epoch.is_empty()
    }

    /// Retire the current epoch at `next_file_number` and make `epoch` current.
    pub fn add_epoch(&mut self, next_file_number: u64, epoch: &str) {
        let retired = std::mem::replace(&mut self.current_epoch, epoch.to_string());
        self.past_epochs.push(PastEpoch {
            next_file_number,
            epoch: retired,
        });
    }

    /// The epoch a file number was written under.
    pub fn epoch_for(&self, file_number: u64) -> &str {
        self.past_epochs
            .iter()
            .find(|p| file_number < p.next_file_number)
            .map(|p| p.epoch.as_str())
            .unwrap_or(&self.current_epoch)
    }

    /// Serialize to the framed record log.
    ///
    /// Record 0: `[varint32 version][varint32 past count][lp current epoch]`
    /// Record 1..=n: `[varint64 next_file_number][lp epoch]`
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = LogWriter::new();

        let mut header = Vec::new();
        put_varint32(&mut header, FORMAT_VERSION);
        // Epoch history grows by one per database reopen; u32 is the format's width.
        put_varint32(&mut header, self.past_epochs.len() as u32);
        put_length_prefixed(&mut header, self.current_epoch.as_bytes());
        writer.add_record(&header);

        for past in &self.past_epochs {
            let mut rec = Vec::new();
            put_varint64(&mut rec, past.next_file_number);
            put_length_prefixed(&mut rec, past.epoch.as_bytes());
            writer.add_record(&rec);
        }
        writer.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = LogReader::new(bytes);
        let header = reader
            .read_record()?
            .ok_or_else(|| SeedError::InvalidFormat("empty cloud manifest".into()))?;

        let mut d = Decoder::new(&header);
        let version = d.varint32()?;
        if version != FORMAT_VERSION {
            return Err(SeedError::InvalidFormat(format!(
                "unsupported cloud manifest version {version}"
            )));
        }
        let count = d.varint32()?;
        let current_epoch = epoch_string(d.length_prefixed()?)?;
        if !d.is_empty() {
            return Err(SeedError::InvalidFormat(
                "trailing bytes in cloud manifest header".into(),
            ));
        }

        let mut past_epochs = Vec::new();
        for i in 0..count {
            let rec = reader.read_record()?.ok_or_else(|| {
                SeedError::InvalidFormat(format!(
                    "cloud manifest declares {count} past epochs, found {i}"
                ))
            })?;
            let mut d = Decoder::new(&rec);
            let next_file_number = d.varint64()?;
            let epoch = epoch_string(d.length_prefixed()?)?;
            if !d.is_empty() {
                return Err(SeedError::InvalidFormat(format!(
                    "trailing bytes in past epoch record {i}"
                )));
            }
            past_epochs.push(PastEpoch {
                next_file_number,
                epoch,
            });
        }
        if reader.read_record()?.is_some() {
            return Err(SeedError::InvalidFormat(format!(
                "cloud manifest has records beyond the declared {count} past epochs"
            )));
        }

        Ok(Self {
            current_epoch,
            past_epochs,
        })
    }

    pub fn write_to(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        dest.write_all(&self.encode())?;
        dest.flush()
    }

    pub fn read_from(src: &mut dyn Read) -> Result<Self> {
        let mut buf = Vec::new();
        src.read_to_end(&mut buf)?;
        Self::decode(&buf)
    }
}

fn epoch_string(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| SeedError::InvalidFormat("epoch is not valid UTF-8".into()))
}

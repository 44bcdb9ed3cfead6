use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;
use tracing::debug;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Upper bound on the uncompressed size of a single entry (zip-bomb guard).
pub const MAX_ENTRY_SIZE: u64 = 256 * 1024 * 1024;

/// In-memory ZIP entry extractor
pub struct ZipExtractor<'a, R: ReadAt + ?Sized> {
    parser: ZipParser<'a, R>,
    entries: Vec<ZipFileEntry>,
}

impl<'a, R: ReadAt + ?Sized> ZipExtractor<'a, R> {
    /// Open an archive, reading its central directory up front.
    pub fn open(reader: &'a R) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let entries = parser.list_files()?;
        debug!(entries = entries.len(), "read central directory");
        Ok(Self { parser, entries })
    }

    /// All entries in central directory order
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Look up an entry by its exact archive path
    pub fn entry(&self, name: &str) -> Option<&ZipFileEntry> {
        self.entries.iter().find(|e| e.file_name == name)
    }

    /// Check that every entry's local header is where the directory says.
    pub fn verify_local_headers(&self) -> Result<()> {
        for entry in &self.entries {
            self.parser.get_data_offset(entry)?;
        }
        Ok(())
    }

    /// Extract a named entry, failing if it is absent
    pub fn read_named(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .entry(name)
            .with_context(|| format!("required part {} is missing", name))?;
        self.extract_to_memory(entry)
    }

    /// Extract file data to memory, inflating and checking CRC-32
    pub fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        if entry.uncompressed_size > MAX_ENTRY_SIZE {
            bail!(
                "entry {} declares {} bytes, above the {} byte limit",
                entry.file_name,
                entry.uncompressed_size,
                MAX_ENTRY_SIZE
            );
        }

        let data_offset = self.parser.get_data_offset(entry)?;

        let available = self.parser.reader().size().saturating_sub(data_offset);
        if entry.compressed_size > available {
            bail!(
                "data of {} is truncated: {} bytes recorded, {} available",
                entry.file_name,
                entry.compressed_size,
                available
            );
        }

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser
            .reader()
            .read_at(data_offset, &mut raw)
            .with_context(|| format!("data of {} is truncated", entry.file_name))?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                DeflateDecoder::new(raw.as_slice())
                    .take(MAX_ENTRY_SIZE + 1)
                    .read_to_end(&mut out)
                    .with_context(|| format!("failed to inflate {}", entry.file_name))?;
                out
            }
            CompressionMethod::Unknown(method) => {
                bail!(
                    "entry {} uses unsupported compression method {}",
                    entry.file_name,
                    method
                );
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            bail!(
                "entry {} inflated to {} bytes, expected {}",
                entry.file_name,
                data.len(),
                entry.uncompressed_size
            );
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            bail!(
                "CRC mismatch in {}: computed {:08x}, recorded {:08x}",
                entry.file_name,
                crc.sum(),
                entry.crc32
            );
        }

        Ok(data)
    }
}

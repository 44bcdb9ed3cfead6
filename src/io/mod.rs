mod local;

pub use local::{
    input_paths, load_input, output_paths, persist_archive, persist_recovered, recovered_path,
};

use anyhow::{Result, bail};

/// Trait for random access reading from a data source
pub trait ReadAt {
    /// Read data at the specified offset into the buffer
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

/// Salvaged archives live entirely in memory, so the byte slice itself is the
/// data source. Reads that run past the end are structural errors, not short
/// reads: a central directory pointing outside the buffer means the archive is
/// damaged.
impl ReadAt for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.len() as u64;
        let end = offset.checked_add(buf.len() as u64);

        match end {
            Some(end) if end <= len => {
                let start = offset as usize;
                buf.copy_from_slice(&self[start..start + buf.len()]);
                Ok(buf.len())
            }
            _ => bail!(
                "read of {} bytes at offset {} runs past end of archive ({} bytes)",
                buf.len(),
                offset,
                len
            ),
        }
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

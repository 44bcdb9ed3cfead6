//! Slicing the candidate archive out of a raw stream.

use serde::Serialize;
use std::ops::Range;

use super::scanner::{ScanResult, SignatureMatch};
use crate::zip::EndOfCentralDirectory;

/// How the end of a candidate region was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegionEnd {
    /// Ends after an end-of-central-directory record
    Terminator,
    /// No usable terminator; runs to the end of the stream
    StreamEnd,
}

/// Contiguous slice of a raw stream believed to hold the archive.
///
/// `start` always sits on a local file header signature.
#[derive(Debug, Clone, Copy)]
pub struct CandidateRegion<'a> {
    stream: &'a [u8],
    start: usize,
    end: usize,
    ended_by: RegionEnd,
}

impl<'a> CandidateRegion<'a> {
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn ended_by(&self) -> RegionEnd {
        self.ended_by
    }

    pub fn is_terminated(&self) -> bool {
        self.ended_by == RegionEnd::Terminator
    }

    /// The region's bytes, borrowed from the stream.
    pub fn bytes(&self) -> &'a [u8] {
        &self.stream[self.start..self.end]
    }
}

/// Choose the region to hand to the cleaner.
///
/// Returns `None` when the stream holds no local file header, which ends
/// the pipeline for that input.
pub fn extract_region<'a>(stream: &'a [u8], scan: &ScanResult) -> Option<CandidateRegion<'a>> {
    let start = scan.first_local_header()?.offset;

    // A terminator ahead of the first header cannot close this archive.
    let terminator = scan
        .last_end_of_directory()
        .filter(|eocd| eocd.offset > start);

    let (end, ended_by) = match terminator {
        Some(eocd) => (terminator_end(stream, eocd), RegionEnd::Terminator),
        None => (stream.len(), RegionEnd::StreamEnd),
    };

    Some(CandidateRegion {
        stream,
        start,
        end,
        ended_by,
    })
}

/// One past the end of the EOCD record at `eocd`, comment included.
///
/// The fixed record is 22 bytes; when it is complete its comment length is
/// honoured. Everything is clamped to the stream so slicing stays in bounds.
fn terminator_end(stream: &[u8], eocd: SignatureMatch) -> usize {
    let fixed_end = eocd.offset + EndOfCentralDirectory::SIZE;

    let record_end = stream
        .get(eocd.offset..fixed_end)
        .and_then(|record| EndOfCentralDirectory::from_bytes(record).ok())
        .map(|record| eocd.offset + record.record_len())
        .unwrap_or(fixed_end);

    record_end.min(stream.len())
}

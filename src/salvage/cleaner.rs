//! Removal of wrapper artifacts from the head of a candidate region.
//!
//! Archive bytes legitimately contain every artifact value, so stripping is
//! confined to a short prefix window and skipped entirely when the region
//! already reads as an intact archive.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::region::CandidateRegion;
use crate::zip::ZipExtractor;

/// Bytes a text wrapper typically introduces: JSON punctuation and whitespace.
pub const ARTIFACT_BYTES: &[u8] = b"[]{}\",\n\r ";

/// Number of leading bytes eligible for artifact stripping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixWindow(pub usize);

impl PrefixWindow {
    pub const DEFAULT: PrefixWindow = PrefixWindow(100);

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for PrefixWindow {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where the prefix window is measured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowAnchor {
    /// From the first byte of the candidate region
    #[default]
    Region,
    /// From the first byte of the original stream
    Stream,
}

/// Owned archive bytes after cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedArchive {
    bytes: Vec<u8>,
    region_start: usize,
    region_len: usize,
    removed: usize,
}

impl SanitizedArchive {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset of the source region within its stream.
    pub fn region_start(&self) -> usize {
        self.region_start
    }

    pub fn region_len(&self) -> usize {
        self.region_len
    }

    /// How many artifact bytes were stripped.
    pub fn removed(&self) -> usize {
        self.removed
    }
}

pub fn is_artifact(byte: u8) -> bool {
    ARTIFACT_BYTES.contains(&byte)
}

/// Strip artifact bytes from the region's prefix window.
///
/// Never fails. Output is the surviving window bytes followed by the
/// untouched remainder, so it is never longer than the region and byte
/// order is preserved.
pub fn clean(
    region: &CandidateRegion<'_>,
    window: PrefixWindow,
    anchor: WindowAnchor,
) -> SanitizedArchive {
    let bytes = region.bytes();

    if is_intact(bytes) {
        debug!(
            region_start = region.start(),
            "region is already an intact archive; nothing stripped"
        );
        return SanitizedArchive {
            bytes: bytes.to_vec(),
            region_start: region.start(),
            region_len: bytes.len(),
            removed: 0,
        };
    }

    let eligible = match anchor {
        WindowAnchor::Region => window.get(),
        WindowAnchor::Stream => window.get().saturating_sub(region.start()),
    }
    .min(bytes.len());

    let (head, tail) = bytes.split_at(eligible);

    let mut out = Vec::with_capacity(bytes.len());
    out.extend(head.iter().copied().filter(|b| !is_artifact(*b)));
    let removed = head.len() - out.len();
    out.extend_from_slice(tail);

    debug!(
        region_start = region.start(),
        eligible, removed, "stripped wrapper artifacts"
    );

    SanitizedArchive {
        bytes: out,
        region_start: region.start(),
        region_len: bytes.len(),
        removed,
    }
}

/// Whether `bytes` already parse as an archive whose local headers all sit
/// where the central directory says they do.
fn is_intact(bytes: &[u8]) -> bool {
    ZipExtractor::open(bytes)
        .and_then(|archive| {
            if archive.entries().is_empty() {
                anyhow::bail!("archive has no entries");
            }
            archive.verify_local_headers()
        })
        .is_ok()
}

//! Signature scanning over raw, undecoded input bytes.

use aho_corasick::AhoCorasick;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

use crate::zip::{CDFH_SIGNATURE, EndOfCentralDirectory, LocalFileHeader};

/// Which PK-family record a signature match belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SignatureKind {
    /// `PK\x03\x04`, the start of every stored entry
    LocalFileHeader,
    /// `PK\x05\x06`, the trailing directory index
    EndOfCentralDirectory,
    /// Any other recognised PK record (central directory headers)
    GenericMarker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignatureMatch {
    pub offset: usize,
    pub kind: SignatureKind,
}

impl SignatureMatch {
    /// Length of the matched marker in bytes
    pub const LEN: usize = 4;
}

/// Every signature found in one stream, in offset order.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    matches: Vec<SignatureMatch>,
}

impl ScanResult {
    pub fn matches(&self) -> &[SignatureMatch] {
        &self.matches
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Presumed archive start: the first local file header.
    pub fn first_local_header(&self) -> Option<SignatureMatch> {
        self.of_kind(SignatureKind::LocalFileHeader).next()
    }

    /// Presumed archive end: the last end-of-central-directory record.
    pub fn last_end_of_directory(&self) -> Option<SignatureMatch> {
        self.of_kind(SignatureKind::EndOfCentralDirectory).last()
    }

    pub fn count(&self, kind: SignatureKind) -> usize {
        self.of_kind(kind).count()
    }

    fn of_kind(&self, kind: SignatureKind) -> impl Iterator<Item = SignatureMatch> + '_ {
        self.matches.iter().copied().filter(move |m| m.kind == kind)
    }
}

/// Pattern order here defines the pattern IDs used in `scan`.
const PATTERNS: [(&[u8], SignatureKind); 3] = [
    (LocalFileHeader::SIGNATURE, SignatureKind::LocalFileHeader),
    (
        EndOfCentralDirectory::SIGNATURE,
        SignatureKind::EndOfCentralDirectory,
    ),
    (CDFH_SIGNATURE, SignatureKind::GenericMarker),
];

fn automaton() -> &'static AhoCorasick {
    static AUTOMATON: OnceLock<AhoCorasick> = OnceLock::new();
    AUTOMATON.get_or_init(|| {
        AhoCorasick::new(PATTERNS.iter().map(|(pattern, _)| *pattern))
            .expect("fixed signature patterns always compile")
    })
}

/// Find all ZIP record signatures in `data`.
///
/// Absence of any match is a valid result, not an error. The markers are
/// four bytes sharing a `PK` prefix and can never overlap one another, so a
/// single non-overlapping pass sees every occurrence.
pub fn scan(data: &[u8]) -> ScanResult {
    let matches = automaton()
        .find_iter(data)
        .map(|m| SignatureMatch {
            offset: m.start(),
            kind: PATTERNS[m.pattern().as_usize()].1,
        })
        .collect();

    let result = ScanResult { matches };
    debug!(
        bytes = data.len(),
        local_headers = result.count(SignatureKind::LocalFileHeader),
        end_records = result.count(SignatureKind::EndOfCentralDirectory),
        "scanned for signatures"
    );
    result
}

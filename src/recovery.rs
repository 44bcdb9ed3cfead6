//! Batch recovery: run the salvage pipeline over many named inputs and
//! collect exactly one outcome per input.

use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::SalvageError;
use crate::salvage::{
    RegionEnd, SalvageConfig, SanitizedArchive, SignatureKind, clean, extract_region, scan,
};
use crate::sheet::{TableRecord, validate};

/// The fixed set of clinical exports this tool is pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtifactKind {
    Doc,
    Drug,
    Lab,
    Nurse,
    Xray,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Doc,
        ArtifactKind::Drug,
        ArtifactKind::Lab,
        ArtifactKind::Nurse,
        ArtifactKind::Xray,
    ];

    /// File stem used in a sample directory (`<stem>.json`).
    pub fn stem(&self) -> &'static str {
        match self {
            ArtifactKind::Doc => "doc",
            ArtifactKind::Drug => "drug",
            ArtifactKind::Lab => "lab",
            ArtifactKind::Nurse => "nurse",
            ArtifactKind::Xray => "xray",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Doc => "Doctor Notes",
            ArtifactKind::Drug => "Medications",
            ArtifactKind::Lab => "Lab Results",
            ArtifactKind::Nurse => "Nurse Vitals",
            ArtifactKind::Xray => "X-Ray/Imaging",
        }
    }

    pub fn from_stem(stem: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.stem() == stem)
    }

    pub fn input_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", self.stem()))
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One input to a batch: its name and its bytes, or why they could not be read.
#[derive(Debug)]
pub struct NamedStream {
    pub name: String,
    pub kind: Option<ArtifactKind>,
    data: Result<Vec<u8>, SalvageError>,
}

impl NamedStream {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        Self {
            kind: ArtifactKind::from_stem(stem_of(&name)),
            name,
            data: Ok(bytes),
        }
    }

    /// An input whose read already failed; it still gets a report line.
    pub fn unreadable(name: impl Into<String>, error: SalvageError) -> Self {
        let name = name.into();
        Self {
            kind: ArtifactKind::from_stem(stem_of(&name)),
            name,
            data: Err(error),
        }
    }
}

fn stem_of(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// A successfully recovered workbook.
#[derive(Debug, Clone)]
pub struct Recovery {
    pub table: TableRecord,
    pub archive: SanitizedArchive,
    pub sheet_name: String,
    pub ended_by: RegionEnd,
}

#[derive(Debug, Clone)]
pub enum RecoveryOutcome {
    Recovered(Box<Recovery>),
    NoSignatureFound,
    NoTerminatorFound,
    ArchiveInvalid { diagnostic: String },
    IoFailure { diagnostic: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeKind {
    Recovered,
    NoSignatureFound,
    NoTerminatorFound,
    ArchiveInvalid,
    IoFailure,
}

impl RecoveryOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            RecoveryOutcome::Recovered(_) => OutcomeKind::Recovered,
            RecoveryOutcome::NoSignatureFound => OutcomeKind::NoSignatureFound,
            RecoveryOutcome::NoTerminatorFound => OutcomeKind::NoTerminatorFound,
            RecoveryOutcome::ArchiveInvalid { .. } => OutcomeKind::ArchiveInvalid,
            RecoveryOutcome::IoFailure { .. } => OutcomeKind::IoFailure,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, RecoveryOutcome::Recovered(_))
    }

    pub fn recovery(&self) -> Option<&Recovery> {
        match self {
            RecoveryOutcome::Recovered(r) => Some(r),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&TableRecord> {
        self.recovery().map(|r| &r.table)
    }

    /// Human-readable reason for a failed outcome.
    pub fn reason(&self) -> Option<String> {
        match self {
            RecoveryOutcome::Recovered(_) => None,
            RecoveryOutcome::NoSignatureFound => {
                Some("no local file header signature found".to_string())
            }
            RecoveryOutcome::NoTerminatorFound => {
                Some("no end of central directory signature found".to_string())
            }
            RecoveryOutcome::ArchiveInvalid { diagnostic }
            | RecoveryOutcome::IoFailure { diagnostic } => Some(diagnostic.clone()),
        }
    }
}

impl From<SalvageError> for RecoveryOutcome {
    fn from(err: SalvageError) -> Self {
        if err.is_io() {
            RecoveryOutcome::IoFailure {
                diagnostic: err.to_string(),
            }
        } else {
            RecoveryOutcome::ArchiveInvalid {
                diagnostic: err.to_string(),
            }
        }
    }
}

/// Run scanner, extractor, cleaner and validator over one stream.
pub fn recover_stream(stream: &[u8], config: &SalvageConfig) -> RecoveryOutcome {
    let signatures = scan(stream);

    let Some(region) = extract_region(stream, &signatures) else {
        return RecoveryOutcome::NoSignatureFound;
    };

    if !region.is_terminated() {
        if config.strict_terminator {
            return RecoveryOutcome::NoTerminatorFound;
        }
        warn!(
            start = region.start(),
            directory_headers = signatures.count(SignatureKind::GenericMarker),
            "no end of central directory record; trying the rest of the stream"
        );
    }

    let archive = clean(&region, config.window, config.anchor);

    match validate(archive.bytes()) {
        Ok(validated) => RecoveryOutcome::Recovered(Box::new(Recovery {
            table: validated.table,
            archive,
            sheet_name: validated.sheet_name,
            ended_by: region.ended_by(),
        })),
        Err(err) => {
            let diagnostic = if region.is_terminated() {
                err.to_string()
            } else {
                format!("{} (archive has no end of central directory record)", err)
            };
            RecoveryOutcome::ArchiveInvalid { diagnostic }
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputOutcome {
    pub name: String,
    pub kind: Option<ArtifactKind>,
    pub outcome: RecoveryOutcome,
}

impl InputOutcome {
    /// Replace the outcome after a failed write of the recovered archive.
    pub fn fail_persist(&mut self, err: &SalvageError) {
        warn!(input = %self.name, error = %err, "could not persist recovered archive");
        self.outcome = RecoveryOutcome::IoFailure {
            diagnostic: err.to_string(),
        };
    }
}

/// Outcomes for a whole batch, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub entries: Vec<InputOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn successes(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome.is_recovered())
            .count()
    }

    pub fn get(&self, name: &str) -> Option<&RecoveryOutcome> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.outcome)
    }

    pub fn summaries(&self) -> Vec<InputSummary<'_>> {
        self.entries.iter().map(InputSummary::from).collect()
    }
}

/// Report line for one input, also the JSON report shape.
#[derive(Debug, Serialize)]
pub struct InputSummary<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ArtifactKind>,
    pub outcome: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl<'a> From<&'a InputOutcome> for InputSummary<'a> {
    fn from(entry: &'a InputOutcome) -> Self {
        let recovery = entry.outcome.recovery();
        InputSummary {
            name: &entry.name,
            kind: entry.kind,
            outcome: entry.outcome.kind(),
            rows: recovery.map(|r| r.table.row_count()),
            columns: recovery.map(|r| r.table.columns()),
            removed_bytes: recovery.map(|r| r.archive.removed()),
            diagnostic: entry.outcome.reason(),
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let label = match entry.kind {
                Some(kind) => format!("{} ({})", kind, entry.name),
                None => entry.name.clone(),
            };

            match &entry.outcome {
                RecoveryOutcome::Recovered(r) => {
                    writeln!(f, "✓ {}", label)?;
                    writeln!(
                        f,
                        "  Rows: {}, Columns: {} [{}]",
                        r.table.row_count(),
                        r.table.column_count(),
                        r.table.columns().join(", ")
                    )?;
                }
                other => {
                    writeln!(
                        f,
                        "✗ {}: {}",
                        label,
                        other.reason().unwrap_or_default()
                    )?;
                }
            }
        }

        writeln!(f, "{}", "=".repeat(80))?;
        write!(
            f,
            "Successfully reconstructed {}/{} files",
            self.successes(),
            self.total()
        )
    }
}

/// Recover every input independently. One failure never stops the rest,
/// and the report keeps input order.
pub fn recover_batch(inputs: Vec<NamedStream>, config: &SalvageConfig) -> BatchReport {
    let entries = inputs
        .into_par_iter()
        .map(|input| {
            let outcome = match input.data {
                Ok(bytes) => recover_stream(&bytes, config),
                Err(err) => {
                    warn!(input = %input.name, error = %err, "input could not be read");
                    RecoveryOutcome::from(err)
                }
            };

            match &outcome {
                RecoveryOutcome::Recovered(r) => info!(
                    input = %input.name,
                    rows = r.table.row_count(),
                    columns = r.table.column_count(),
                    removed = r.archive.removed(),
                    "recovered workbook"
                ),
                other => warn!(
                    input = %input.name,
                    outcome = ?other.kind(),
                    reason = %other.reason().unwrap_or_default(),
                    "recovery failed"
                ),
            }

            InputOutcome {
                name: input.name,
                kind: input.kind,
                outcome,
            }
        })
        .collect();

    BatchReport { entries }
}

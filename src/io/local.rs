use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{Result, SalvageError};
use crate::recovery::{ArtifactKind, BatchReport, RecoveryOutcome};

/// Extension given to recovered archives.
const RECOVERED_EXTENSION: &str = "xlsx";

/// Inserted before the extension when the plain name would be the input.
const RECOVERED_SUFFIX: &str = "recovered";

/// Read a whole input artifact as opaque bytes.
///
/// Inputs conventionally carry a `.json` extension, but the content is never
/// decoded as text.
pub async fn load_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .await
        .map_err(|e| SalvageError::io(path, e))
}

/// Write recovered archive bytes to `path`, creating parent directories.
pub async fn persist_archive(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SalvageError::io(parent, e))?;
        }
    }

    let mut file = fs::File::create(path)
        .await
        .map_err(|e| SalvageError::io(path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| SalvageError::io(path, e))?;
    file.flush().await.map_err(|e| SalvageError::io(path, e))?;

    Ok(())
}

/// Derive where the recovered archive for `input` is written.
///
/// The file stem is kept and the extension replaced with `.xlsx`. An input
/// that is already an `.xlsx` becomes `<stem>.recovered.xlsx` instead, so
/// the result never names the input. Without an output directory the
/// archive lands next to its input.
pub fn recovered_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let already_xlsx = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(RECOVERED_EXTENSION));
    let renamed = if already_xlsx {
        input.with_extension(format!("{RECOVERED_SUFFIX}.{RECOVERED_EXTENSION}"))
    } else {
        input.with_extension(RECOVERED_EXTENSION)
    };

    match out_dir {
        Some(dir) => {
            let file_name = renamed
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| {
                    PathBuf::from(format!("{RECOVERED_SUFFIX}.{RECOVERED_EXTENSION}"))
                });
            dir.join(file_name)
        }
        None => renamed,
    }
}

/// One output path per input, in input order.
///
/// No output equals any input or any other output: clashes get a `-N`
/// suffix on the stem, numbered from 1.
pub fn output_paths(inputs: &[PathBuf], out_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut taken: HashSet<PathBuf> = inputs.iter().cloned().collect();

    inputs
        .iter()
        .map(|input| {
            let target = first_free(recovered_path(input, out_dir), &taken);
            taken.insert(target.clone());
            target
        })
        .collect()
}

fn first_free(base: PathBuf, taken: &HashSet<PathBuf>) -> PathBuf {
    if !taken.contains(&base) {
        return base;
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut n = 1usize;
    loop {
        let candidate = base.with_file_name(format!("{stem}-{n}.{RECOVERED_EXTENSION}"));
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Sample-directory exports first, then explicit files, without repeats.
pub fn input_paths(sample_dir: Option<&Path>, files: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();

    if let Some(dir) = sample_dir {
        paths.extend(ArtifactKind::ALL.iter().map(|kind| kind.input_path(dir)));
    }

    for file in files {
        if !paths.contains(file) {
            paths.push(file.clone());
        }
    }

    paths
}

/// Write each recovered archive in `report` to the target at the same
/// position. A failed write turns that input's outcome into an I/O failure.
///
/// Returns the paths actually written, in report order.
pub async fn persist_recovered(report: &mut BatchReport, targets: &[PathBuf]) -> Vec<PathBuf> {
    debug_assert_eq!(report.entries.len(), targets.len());

    let mut saved = Vec::new();
    for (entry, target) in report.entries.iter_mut().zip(targets) {
        let RecoveryOutcome::Recovered(recovery) = &entry.outcome else {
            continue;
        };

        match persist_archive(target, recovery.archive.bytes()).await {
            Ok(()) => {
                info!(input = %entry.name, output = %target.display(), "wrote recovered workbook");
                saved.push(target.clone());
            }
            Err(err) => entry.fail_persist(&err),
        }
    }
    saved
}

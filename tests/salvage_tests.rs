mod common;

use std::sync::LazyLock;

use common::{Cell, Omit, json_wrapped, lab_sheet, stored_archive, workbook, workbook_with};
use proptest::prelude::*;
use xlsalvage::salvage::{PrefixWindow, WindowAnchor, clean, extract_region, scan};
use xlsalvage::sheet::validate;
use xlsalvage::zip::ZipExtractor;
use xlsalvage::{CellValue, OutcomeKind, RecoveryOutcome, SalvageConfig, recover_stream};

const FIXTURE_ROWS: usize = 6;

static LAB_WORKBOOK: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let (columns, rows) = lab_sheet(FIXTURE_ROWS);
    workbook(&columns, &rows)
});

fn recovered(outcome: &RecoveryOutcome) -> &xlsalvage::recovery::Recovery {
    match outcome {
        RecoveryOutcome::Recovered(r) => r,
        other => panic!("expected a recovered workbook, got {:?}", other),
    }
}

#[test]
fn clean_archive_is_recovered_unchanged() {
    let direct = validate(&LAB_WORKBOOK).unwrap();
    let outcome = recover_stream(&LAB_WORKBOOK, &SalvageConfig::default());
    let recovery = recovered(&outcome);

    assert_eq!(recovery.table, direct.table);
    assert_eq!(recovery.archive.bytes(), LAB_WORKBOOK.as_slice());
    assert_eq!(recovery.archive.removed(), 0);
    assert_eq!(recovery.sheet_name, "Sheet1");
}

#[test]
fn recovered_table_matches_sheet_contents() {
    let (columns, rows) = lab_sheet(FIXTURE_ROWS);
    let outcome = recover_stream(&json_wrapped(&LAB_WORKBOOK), &SalvageConfig::default());
    let table = outcome.table().unwrap();

    assert_eq!(table.columns(), columns.as_slice());
    assert_eq!(table.row_count(), FIXTURE_ROWS);

    for (i, row) in rows.iter().enumerate() {
        let expected: Vec<CellValue> = row.iter().map(Cell::expected).collect();
        assert_eq!(table.row(i).unwrap(), expected.as_slice(), "row {}", i);
    }

    assert_eq!(
        table.get(0, "patientId"),
        Some(&CellValue::Text("an1".to_string()))
    );
    assert_eq!(table.get(1, "value"), Some(&CellValue::Number(5.5)));
    assert_eq!(
        table.get(0, "timestamp").map(|v| v.to_string()),
        Some("2024-01-01".to_string())
    );
}

#[test]
fn json_wrapper_is_stripped() {
    let wrapped = json_wrapped(&LAB_WORKBOOK);
    let outcome = recover_stream(&wrapped, &SalvageConfig::default());
    let recovery = recovered(&outcome);

    assert_eq!(recovery.archive.bytes(), LAB_WORKBOOK.as_slice());
    assert!(recovery.archive.region_start() > 0);
}

#[test]
fn long_prepended_noise_is_outside_the_region() {
    let mut stream = b"{\"export\": ".repeat(40);
    stream.extend_from_slice(&json_wrapped(&LAB_WORKBOOK));

    let outcome = recover_stream(&stream, &SalvageConfig::default());
    assert_eq!(recovered(&outcome).table.row_count(), FIXTURE_ROWS);
}

#[test]
fn all_zero_stream_has_no_signature() {
    let outcome = recover_stream(&vec![0u8; 64 * 1024], &SalvageConfig::default());
    assert_eq!(outcome.kind(), OutcomeKind::NoSignatureFound);
}

#[test]
fn truncated_archive_never_passes_as_empty() {
    let archive = LAB_WORKBOOK.as_slice();

    for cut in [archive.len() - 22, archive.len() / 2, 64] {
        let stream = json_wrapped(&archive[..cut]);
        let outcome = recover_stream(&stream, &SalvageConfig::default());
        assert_eq!(outcome.kind(), OutcomeKind::ArchiveInvalid, "cut at {}", cut);
        assert!(
            outcome
                .reason()
                .unwrap()
                .contains("no end of central directory record")
        );

        let strict = SalvageConfig::new().with_strict_terminator(true);
        assert_eq!(
            recover_stream(&stream, &strict).kind(),
            OutcomeKind::NoTerminatorFound
        );
    }
}

#[test]
fn missing_worksheet_is_invalid() {
    let (columns, rows) = lab_sheet(2);
    let broken = workbook_with(
        &columns,
        &rows,
        Omit {
            worksheet: true,
            ..Omit::default()
        },
    );

    let outcome = recover_stream(&json_wrapped(&broken), &SalvageConfig::default());
    assert_eq!(outcome.kind(), OutcomeKind::ArchiveInvalid);
    assert!(outcome.reason().unwrap().contains("xl/worksheets/sheet1.xml"));
}

#[test]
fn missing_workbook_part_is_invalid() {
    let (columns, rows) = lab_sheet(2);
    let broken = workbook_with(
        &columns,
        &rows,
        Omit {
            workbook: true,
            ..Omit::default()
        },
    );

    let outcome = recover_stream(&broken, &SalvageConfig::default());
    assert_eq!(outcome.kind(), OutcomeKind::ArchiveInvalid);
}

#[test]
fn header_only_sheet_has_zero_rows() {
    let bytes = workbook(&["patientId", "note"], &[]);
    let outcome = recover_stream(&json_wrapped(&bytes), &SalvageConfig::default());
    let table = outcome.table().unwrap();
    assert_eq!(table.columns(), ["patientId", "note"]);
    assert_eq!(table.row_count(), 0);
}

#[test]
fn noise_inside_window_is_repaired() {
    let original = stored_archive("a.txt", b"abc");
    let mut noisy = original.clone();
    noisy.splice(4..4, std::iter::repeat_n(b'"', 10));

    let mut stream = b"[\"".to_vec();
    stream.extend_from_slice(&noisy);
    stream.extend_from_slice(b"\"]");

    let signatures = scan(&stream);
    let region = extract_region(&stream, &signatures).unwrap();
    assert!(region.is_terminated());

    let cleaned = clean(&region, PrefixWindow::DEFAULT, WindowAnchor::Region);
    assert_eq!(cleaned.removed(), 10);
    assert_eq!(cleaned.bytes(), original.as_slice());

    let zip = ZipExtractor::open(cleaned.bytes()).unwrap();
    assert_eq!(zip.read_named("a.txt").unwrap(), b"abc");
}

#[test]
fn noise_beyond_window_is_left_alone() {
    let mut noisy = stored_archive("a.txt", b"abc");
    noisy.splice(4..4, std::iter::repeat_n(b'"', 120));

    let signatures = scan(&noisy);
    let region = extract_region(&noisy, &signatures).unwrap();
    let cleaned = clean(&region, PrefixWindow::DEFAULT, WindowAnchor::Region);

    assert_eq!(cleaned.removed(), 96);
    let reopened = ZipExtractor::open(cleaned.bytes()).and_then(|z| z.read_named("a.txt"));
    assert!(reopened.is_err());
}

#[test]
fn stream_anchor_shrinks_window_by_region_offset() {
    let mut noisy = stored_archive("a.txt", b"abc");
    noisy.splice(4..4, std::iter::repeat_n(b'"', 10));

    let mut stream = b"x".repeat(150);
    stream.extend_from_slice(&noisy);

    let signatures = scan(&stream);
    let region = extract_region(&stream, &signatures).unwrap();

    let by_stream = clean(&region, PrefixWindow::DEFAULT, WindowAnchor::Stream);
    assert_eq!(by_stream.removed(), 0);

    let by_region = clean(&region, PrefixWindow::DEFAULT, WindowAnchor::Region);
    assert_eq!(by_region.removed(), 10);
}

#[test]
fn injected_noise_past_window_fails_pipeline() {
    let mut noisy = LAB_WORKBOOK.clone();
    noisy.splice(4..4, std::iter::repeat_n(b'"', 150));

    let outcome = recover_stream(&json_wrapped(&noisy), &SalvageConfig::default());
    assert_eq!(outcome.kind(), OutcomeKind::ArchiveInvalid);
}

#[test]
fn cleaning_recovered_archive_again_is_identity() {
    let outcome = recover_stream(&json_wrapped(&LAB_WORKBOOK), &SalvageConfig::default());
    let first = recovered(&outcome).archive.clone();

    let again = recover_stream(first.bytes(), &SalvageConfig::default());
    let second = &recovered(&again).archive;
    assert_eq!(second.bytes(), first.bytes());
    assert_eq!(second.removed(), 0);
}

fn artifact_noise(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop::sample::select(xlsalvage::salvage::ARTIFACT_BYTES.to_vec()),
        0..=max,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn leading_artifact_noise_is_tolerated(
        prefix in artifact_noise(PrefixWindow::DEFAULT.get()),
        suffix in artifact_noise(40),
    ) {
        let mut stream = prefix;
        stream.extend_from_slice(&LAB_WORKBOOK);
        stream.extend_from_slice(&suffix);

        let direct = validate(&LAB_WORKBOOK).unwrap();
        let outcome = recover_stream(&stream, &SalvageConfig::default());

        prop_assert!(outcome.is_recovered());
        let recovery = outcome.recovery().unwrap();
        prop_assert_eq!(&recovery.table, &direct.table);
        prop_assert_eq!(recovery.archive.bytes(), LAB_WORKBOOK.as_slice());
    }

    #[test]
    fn any_window_keeps_intact_archive(window in 0usize..400) {
        let config = SalvageConfig::new().with_window(window);
        let outcome = recover_stream(&json_wrapped(&LAB_WORKBOOK), &config);
        prop_assert!(outcome.is_recovered());
        prop_assert_eq!(outcome.table().unwrap().row_count(), FIXTURE_ROWS);
    }
}

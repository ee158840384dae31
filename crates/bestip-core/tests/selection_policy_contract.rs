//! Contract Test: Selection Policy
//!
//! This test verifies how a measurement report is turned into one address.
//!
//! Constraints verified:
//! - The first row with positive throughput wins, whatever follows it
//! - An all-zero report falls back to the first row, flagged AllZeroThroughput
//! - A header-only report is EmptyReport
//! - Rows with an empty address are never selected
//! - Malformed (short) rows are skipped, not treated as data
//! - The all-zero fallback is the first well-formed row
//! - Undecodable bytes in ignored columns do not fail the report
//!
//! If this test fails, the wrong edge address will be published.

mod common;

use bestip_core::error::RunError;
use bestip_core::measurement::{MeasurementReport, SelectionWarning, select_best};
use common::*;

fn select(csv: &str) -> Result<bestip_core::measurement::Selection, RunError> {
    let report = MeasurementReport::parse(csv.as_bytes()).expect("valid csv");
    select_best(&report)
}

#[test]
fn first_positive_throughput_row_wins_regardless_of_later_rows() {
    let later_rows: [&[(&str, f64, f64)]; 3] = [
        &[],
        &[("9.9.9.9", 30.0, 999.0)],
        &[("8.8.8.8", 30.0, 0.0), ("7.7.7.7", 31.0, 0.01)],
    ];

    for tail in later_rows {
        let mut rows = vec![
            ("1.1.1.1", 10.0, 0.0),
            ("2.2.2.2", 11.0, 0.0),
            ("3.3.3.3", 12.0, 4.2),
        ];
        rows.extend_from_slice(tail);

        let selection = select(&report(&rows)).unwrap();
        assert_eq!(selection.address, "3.3.3.3", "tail {:?} changed the winner", tail);
        assert_eq!(selection.skipped, 2);
        assert_eq!(selection.warning, None);
    }
}

#[test]
fn all_zero_throughput_falls_back_to_first_row_with_warning() {
    let csv = report(&[
        ("1.1.1.1", 10.0, 0.0),
        ("2.2.2.2", 11.0, 0.0),
        ("3.3.3.3", 12.0, 0.0),
    ]);

    let selection = select(&csv).unwrap();
    assert_eq!(selection.address, "1.1.1.1");
    assert_eq!(selection.warning, Some(SelectionWarning::AllZeroThroughput));
}

#[test]
fn header_only_report_is_empty() {
    let err = select(&format!("{}\n", HEADER)).unwrap_err();
    assert!(matches!(err, RunError::EmptyReport(_)));
}

#[test]
fn completely_empty_report_is_empty() {
    let err = select("").unwrap_err();
    assert!(matches!(err, RunError::EmptyReport(_)));
}

#[test]
fn empty_address_row_never_selected() {
    // Empty address with positive throughput, ahead of a valid row
    let csv = format!("{}\n,,,,,9.5\n2.2.2.2,,,,,5.2\n", HEADER);
    assert_eq!(select(&csv).unwrap().address, "2.2.2.2");

    // Same rows, empty address last: placement does not matter
    let csv = format!("{}\n2.2.2.2,,,,,5.2\n,,,,,9.5\n", HEADER);
    assert_eq!(select(&csv).unwrap().address, "2.2.2.2");
}

#[test]
fn empty_address_in_fallback_row_is_empty_report() {
    let csv = format!("{}\n,4,4,0.00,10.00,0.00\n2.2.2.2,4,4,0.00,11.00,0.00\n", HEADER);
    let err = select(&csv).unwrap_err();
    assert!(matches!(err, RunError::EmptyReport(_)));
}

#[test]
fn malformed_rows_are_skipped() {
    let csv = format!(
        "{}\n1.1.1.1,4,4\n2.2.2.2,4,4,0.00,11.00,0.00\n3.3.3.3,4,4,0.00,12.00,1.50\n",
        HEADER
    );
    let selection = select(&csv).unwrap();
    assert_eq!(selection.address, "3.3.3.3");
    assert_eq!(selection.row.latency_ms, Some(12.0));
}

#[test]
fn extra_columns_are_ignored() {
    let csv = format!(
        "{},地区码\n1.1.1.1,4,4,0.00,10.00,0.00,LAX\n2.2.2.2,4,4,0.00,11.00,7.77,NRT\n",
        HEADER
    );
    let selection = select(&csv).unwrap();
    assert_eq!(selection.address, "2.2.2.2");
    assert_eq!(selection.row.download_speed_mbps, 7.77);
}

#[test]
fn all_zero_fallback_skips_malformed_first_row() {
    let csv = format!("{}\n1.1.1.1,4\n2.2.2.2,4,4,0.00,11.00,0.00\n", HEADER);

    let selection = select(&csv).unwrap();
    assert_eq!(selection.address, "2.2.2.2");
    assert_eq!(selection.warning, Some(SelectionWarning::AllZeroThroughput));
}

#[test]
fn non_utf8_extra_column_keeps_row_usable() {
    let mut bytes = format!("{},地区码\n", HEADER).into_bytes();
    // "北京" in GBK
    bytes.extend_from_slice(b"1.1.1.1,4,4,0.00,10.00,5.00,\xb1\xb1\xbe\xa9\n");

    let report = MeasurementReport::parse(bytes.as_slice()).expect("report parses");
    let selection = select_best(&report).unwrap();
    assert_eq!(selection.address, "1.1.1.1");
    assert_eq!(selection.row.download_speed_mbps, 5.0);
    assert_eq!(selection.warning, None);
}

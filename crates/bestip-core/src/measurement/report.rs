//! Measurement report parsing
//!
//! The tool writes a CSV report: one header row, then one row per tested
//! address ordered by latency. Columns are positional:
//!
//! | # | column | type |
//! |---|---|---|
//! | 0 | address | string |
//! | 1 | packets sent | integer |
//! | 2 | packets received | integer |
//! | 3 | loss rate | float |
//! | 4 | average latency (ms) | float |
//! | 5 | download speed (MB/s) | float |
//! | 6.. | extra columns (e.g. region code) | ignored |
//!
//! Rows with fewer than [`MIN_COLUMNS`] fields, or whose first
//! [`MIN_COLUMNS`] fields are not UTF-8, are malformed and skipped. Extra
//! columns are never decoded.

use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::RunError;

/// Minimum number of columns for a usable data row
pub const MIN_COLUMNS: usize = 6;

/// One data row of a measurement report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Tested address
    pub address: String,
    /// Packets sent
    pub sent: Option<u32>,
    /// Packets received
    pub received: Option<u32>,
    /// Loss rate (0.0 - 1.0)
    pub loss_rate: Option<f64>,
    /// Average latency in milliseconds
    pub latency_ms: Option<f64>,
    /// Download speed in MB/s; zero when untested or unparseable
    pub download_speed_mbps: f64,
}

impl ReportRow {
    /// Build a row from a CSV record, or `None` if the record is malformed
    pub fn from_record(record: &csv::ByteRecord) -> Option<Self> {
        if record.len() < MIN_COLUMNS {
            return None;
        }

        let mut fields = [""; MIN_COLUMNS];
        for (slot, raw) in fields.iter_mut().zip(record.iter()) {
            *slot = std::str::from_utf8(raw).ok()?;
        }

        Some(Self {
            address: fields[0].trim().to_string(),
            sent: parse_field(fields[1]),
            received: parse_field(fields[2]),
            loss_rate: parse_field(fields[3]),
            latency_ms: parse_field(fields[4]),
            download_speed_mbps: parse_field(fields[5]).unwrap_or(0.0),
        })
    }

    /// Whether the throughput sub-test measured any usable speed
    pub fn has_throughput(&self) -> bool {
        self.download_speed_mbps > 0.0
    }
}

fn parse_field<T: std::str::FromStr>(field: &str) -> Option<T> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    field.parse().ok()
}

/// A parsed measurement report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementReport {
    rows: Vec<ReportRow>,
    data_rows: usize,
}

impl MeasurementReport {
    /// Parse a report from any reader; the first line is the header
    pub fn parse<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        let mut data_rows = 0;

        for (index, result) in csv_reader.byte_records().enumerate() {
            let record = result?;
            data_rows += 1;

            match ReportRow::from_record(&record) {
                Some(row) => rows.push(row),
                None => debug!(
                    "Skipping malformed report row {} ({} columns)",
                    index + 1,
                    record.len()
                ),
            }
        }

        Ok(Self { rows, data_rows })
    }

    /// Read and parse the report file at `path`
    pub async fn from_path(path: &Path) -> Result<Self, RunError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RunError::parse(path, e))?;

        Self::parse(bytes.as_slice()).map_err(|e| RunError::parse(path, e))
    }

    /// Well-formed data rows, in report order
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Number of data rows below the header, malformed ones included
    pub fn data_rows(&self) -> usize {
        self.data_rows
    }

    /// Number of data rows skipped as malformed
    pub fn malformed_rows(&self) -> usize {
        self.data_rows - self.rows.len()
    }
}

impl FromIterator<ReportRow> for MeasurementReport {
    fn from_iter<I: IntoIterator<Item = ReportRow>>(iter: I) -> Self {
        let rows: Vec<ReportRow> = iter.into_iter().collect();
        let data_rows = rows.len();
        Self { rows, data_rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
IP 地址,已发送,已接收,丢包率,平均延迟,下载速度 (MB/s),地区码
104.16.1.1,4,4,0.00,45.21,0.00,LAX
104.16.2.2,4,3,0.25,48.90,12.34,SJC
";

    #[test]
    fn test_parse_typed_rows() {
        let report = MeasurementReport::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(report.data_rows(), 2);
        assert_eq!(report.malformed_rows(), 0);

        let row = &report.rows()[1];
        assert_eq!(row.address, "104.16.2.2");
        assert_eq!(row.sent, Some(4));
        assert_eq!(row.received, Some(3));
        assert_eq!(row.loss_rate, Some(0.25));
        assert_eq!(row.latency_ms, Some(48.90));
        assert_eq!(row.download_speed_mbps, 12.34);
        assert!(row.has_throughput());
        assert!(!report.rows()[0].has_throughput());
    }

    #[test]
    fn test_short_rows_are_malformed() {
        let csv = "IP,Sent,Recv,Loss,Latency,Speed\n1.1.1.1,4,4\n2.2.2.2,4,4,0,10,1.5\n";
        let report = MeasurementReport::parse(csv.as_bytes()).unwrap();
        assert_eq!(report.data_rows(), 2);
        assert_eq!(report.malformed_rows(), 1);
        assert_eq!(report.rows()[0].address, "2.2.2.2");
    }

    #[test]
    fn test_empty_numeric_fields_tolerated() {
        let csv = "IP,Sent,Recv,Loss,Latency,Speed\n,,,,,5.2\n3.3.3.3,,,,,fast\n";
        let report = MeasurementReport::parse(csv.as_bytes()).unwrap();
        assert_eq!(report.rows().len(), 2);
        assert_eq!(report.rows()[0].address, "");
        assert_eq!(report.rows()[0].sent, None);
        assert_eq!(report.rows()[0].download_speed_mbps, 5.2);
        // Unparseable speed counts as no throughput
        assert_eq!(report.rows()[1].download_speed_mbps, 0.0);
    }

    #[test]
    fn test_header_only() {
        let report = MeasurementReport::parse("IP,Sent,Recv,Loss,Latency,Speed\n".as_bytes()).unwrap();
        assert_eq!(report.data_rows(), 0);
        assert!(report.rows().is_empty());
    }

    #[test]
    fn test_non_utf8_extra_column_is_ignored() {
        // GBK-encoded region name in the trailing column
        let bytes: &[u8] =
            b"IP,Sent,Recv,Loss,Latency,Speed,Region\n1.1.1.1,4,4,0.00,10.00,5.00,\xb1\xb1\xbe\xa9\n";
        let report = MeasurementReport::parse(bytes).unwrap();
        assert_eq!(report.data_rows(), 1);
        assert_eq!(report.malformed_rows(), 0);
        assert_eq!(report.rows()[0].address, "1.1.1.1");
        assert_eq!(report.rows()[0].download_speed_mbps, 5.0);
    }

    #[test]
    fn test_non_utf8_policy_column_skips_row() {
        let bytes: &[u8] =
            b"IP,Sent,Recv,Loss,Latency,Speed\n\xff\xfe,4,4,0,1,1\n2.2.2.2,4,4,0,1,3.5\n";
        let report = MeasurementReport::parse(bytes).unwrap();
        assert_eq!(report.data_rows(), 2);
        assert_eq!(report.malformed_rows(), 1);
        assert_eq!(report.rows()[0].address, "2.2.2.2");
    }

    #[tokio::test]
    async fn test_missing_file_is_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = MeasurementReport::from_path(&dir.path().join("absent.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::ParseFailed { .. }));
    }
}

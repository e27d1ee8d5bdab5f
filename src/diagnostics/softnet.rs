//! Per-CPU network stack counters from `/proc/net/softnet_stat`.
//!
//! Each row is one processor with 11 space-separated hex columns:
//! processed, dropped, time squeeze, five always-zero columns left over
//! from fastroute, cpu collision, received RPS and flow limit count.
//! Behavior on non-Linux hosts is undefined.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::num::ParseIntError;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// Kernel report location.
pub const SOFTNET_STAT_PATH: &str = "/proc/net/softnet_stat";

const COLUMNS: usize = 11;
const RADIX: u32 = 16;

/// Errors while reading or decoding the report.
#[derive(Debug, Error)]
pub enum SoftnetError {
    #[error("failed to read softnet report: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: expected 11 fields, found {found}")]
    FieldCount { line: usize, found: usize },

    #[error("line {line}, column {column}: invalid hex field {value:?}: {source}")]
    InvalidField {
        line: usize,
        column: usize,
        value: String,
        source: ParseIntError,
    },
}

/// Counters for a single processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SoftnetProcessor {
    pub processed: i64,
    pub dropped: i64,
    pub time_squeeze: i64,
    pub cpu_collision: i64,
    pub received_rps: i64,
    pub flow_limit_count: i64,
}

/// One record per processor, in report order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SoftnetData {
    pub processors: Vec<SoftnetProcessor>,
}

/// Read and decode the kernel report.
pub fn read_stats() -> Result<SoftnetData, SoftnetError> {
    read_stats_from(Path::new(SOFTNET_STAT_PATH))
}

/// Read and decode a report at an arbitrary path.
pub fn read_stats_from(path: &Path) -> Result<SoftnetData, SoftnetError> {
    let file = File::open(path)?;
    parse_softnet(BufReader::new(file))
}

/// Decode a report. Blank lines are skipped; any bad row fails the whole read.
pub fn parse_softnet<R: BufRead>(reader: R) -> Result<SoftnetData, SoftnetError> {
    let mut processors = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        processors.push(parse_record(idx + 1, &line)?);
    }
    Ok(SoftnetData { processors })
}

fn parse_record(line_no: usize, line: &str) -> Result<SoftnetProcessor, SoftnetError> {
    let raw: Vec<&str> = line.split(' ').collect();
    if raw.len() != COLUMNS {
        return Err(SoftnetError::FieldCount {
            line: line_no,
            found: raw.len(),
        });
    }

    let mut fields = [0i64; COLUMNS];
    for (column, value) in raw.iter().enumerate() {
        fields[column] =
            i64::from_str_radix(value, RADIX).map_err(|source| SoftnetError::InvalidField {
                line: line_no,
                column,
                value: (*value).to_string(),
                source,
            })?;
    }

    Ok(SoftnetProcessor {
        processed: fields[0],
        dropped: fields[1],
        time_squeeze: fields[2],
        cpu_collision: fields[8],
        received_rps: fields[9],
        flow_limit_count: fields[10],
    })
}

/// Publishes softnet gauges on an interval until shutdown.
pub struct SoftnetReporter {
    interval: Duration,
}

impl SoftnetReporter {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(interval = ?self.interval, "Softnet reporter starting");
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match read_stats() {
                        Ok(data) => metrics::record_softnet(&data),
                        Err(e) => tracing::warn!(error = %e, "Failed to read softnet stats"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Softnet reporter stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<SoftnetData, SoftnetError> {
        parse_softnet(input.as_bytes())
    }

    #[test]
    fn picks_named_columns() {
        let data = parse("1 2 3 0 0 0 0 0 4 5 6\n").unwrap();
        assert_eq!(
            data.processors,
            vec![SoftnetProcessor {
                processed: 1,
                dropped: 2,
                time_squeeze: 3,
                cpu_collision: 4,
                received_rps: 5,
                flow_limit_count: 6,
            }]
        );
    }

    #[test]
    fn decodes_hex_and_keeps_row_order() {
        let input = "0000a1b2 00000000 00000010 00000000 00000000 00000000 00000000 00000000 00000000 00000003 00000000\n\
                     00000ff0 00000001 00000000 00000000 00000000 00000000 00000000 00000000 00000002 00000000 0000000a\n";
        let data = parse(input).unwrap();
        assert_eq!(data.processors.len(), 2);
        assert_eq!(data.processors[0].processed, 0xa1b2);
        assert_eq!(data.processors[0].time_squeeze, 0x10);
        assert_eq!(data.processors[0].received_rps, 3);
        assert_eq!(data.processors[1].processed, 0xff0);
        assert_eq!(data.processors[1].dropped, 1);
        assert_eq!(data.processors[1].cpu_collision, 2);
        assert_eq!(data.processors[1].flow_limit_count, 0xa);
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        let short = parse("1 2 3 0 0 0 0 0 4 5\n").unwrap_err();
        assert!(matches!(short, SoftnetError::FieldCount { line: 1, found: 10 }));

        let long = parse("1 2 3 0 0 0 0 0 4 5 6 7\n").unwrap_err();
        assert!(matches!(long, SoftnetError::FieldCount { line: 1, found: 12 }));
    }

    #[test]
    fn non_hex_field_is_rejected() {
        let err = parse("1 2 3 0 0 0 0 0 4 5 zz\n").unwrap_err();
        match err {
            SoftnetError::InvalidField { line, column, value, .. } => {
                assert_eq!(line, 1);
                assert_eq!(column, 10);
                assert_eq!(value, "zz");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_row_discards_earlier_rows() {
        let err = parse("1 2 3 0 0 0 0 0 4 5 6\n1 2 3\n").unwrap_err();
        assert!(matches!(err, SoftnetError::FieldCount { line: 2, found: 3 }));
    }

    #[test]
    fn empty_report_has_no_processors() {
        assert!(parse("").unwrap().processors.is_empty());
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("softnet_stat");
        std::fs::write(&path, "1 2 3 0 0 0 0 0 4 5 6\n7 8 9 0 0 0 0 0 a b c\n").unwrap();

        let data = read_stats_from(&path).unwrap();
        assert_eq!(data.processors.len(), 2);
        assert_eq!(data.processors[1].flow_limit_count, 0xc);
    }
}

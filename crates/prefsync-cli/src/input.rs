//! Reads batch jobs from a delimited input file.
//!
//! Columns: app id, source project name, source project id, target project
//! name, target project id. The first row is a header and is ignored. Fields
//! are decoded from the configured encoding (windows-1251 unless set).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use encoding_rs::Encoding;
use prefsync_core::BatchJob;

const APP_ID: usize = 0;
const SOURCE_PROJECT_NAME: usize = 1;
const SOURCE_PROJECT_ID: usize = 2;
const TARGET_PROJECT_NAME: usize = 3;
const TARGET_PROJECT_ID: usize = 4;

pub fn read_jobs_from_path(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Vec<BatchJob>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    Ok(read_jobs(file, delimiter, encoding))
}

/// Parses every data row. Rows the reader cannot decode are logged and skipped.
pub fn read_jobs<R: Read>(reader: R, delimiter: u8, encoding: &'static Encoding) -> Vec<BatchJob> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let mut jobs = Vec::new();
    let mut record = ByteRecord::new();
    loop {
        match rdr.read_byte_record(&mut record) {
            Ok(true) => jobs.push(job_from_record(&record, encoding)),
            Ok(false) => break,
            Err(e) => {
                let line = e.position().map(|p| p.line());
                tracing::error!(?line, "skipping unreadable input row: {e}");
                if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                    break;
                }
            }
        }
    }
    jobs
}

fn job_from_record(record: &ByteRecord, encoding: &'static Encoding) -> BatchJob {
    let get = |index| field(record, index, encoding);
    BatchJob {
        app_id: get(APP_ID),
        source_project_name: get(SOURCE_PROJECT_NAME),
        source_project_id: get(SOURCE_PROJECT_ID),
        target_project_name: get(TARGET_PROJECT_NAME),
        target_project_id: get(TARGET_PROJECT_ID),
    }
}

/// Trimmed field text; absent fields are empty. Malformed sequences are
/// replaced rather than failing the row.
fn field(record: &ByteRecord, index: usize, encoding: &'static Encoding) -> String {
    record
        .get(index)
        .map(|bytes| {
            let (text, malformed) = encoding.decode_without_bom_handling(bytes);
            if malformed {
                tracing::warn!(index, encoding = encoding.name(), "replaced malformed input bytes");
            }
            text.trim().to_string()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1251};

    #[test]
    fn test_skips_header_and_trims() {
        let data = "AppOID,SourceName,SourceOID,TargetName,TargetOID\n\
                    9552890650 , Team A ,4625248927, Team B , 4625249001\n";
        let jobs = read_jobs(data.as_bytes(), b',', UTF_8);
        assert_eq!(
            jobs,
            vec![BatchJob::new("9552890650", "4625248927", "4625249001").with_names("Team A", "Team B")]
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let data = "a;b;c;d;e\n1;Src;10;Dst;20\n2;Src;11;Dst;21\n";
        let jobs = read_jobs(data.as_bytes(), b';', UTF_8);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].app_id, "2");
        assert_eq!(jobs[1].target_project_id, "21");
    }

    #[test]
    fn test_short_rows_yield_empty_fields() {
        let data = "a,b,c,d,e\n1,Src,10\n";
        let jobs = read_jobs(data.as_bytes(), b',', UTF_8);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].source_project_id, "10");
        assert_eq!(jobs[0].target_project_name, "");
        assert_eq!(jobs[0].target_project_id, "");
    }

    #[test]
    fn test_quoted_fields() {
        let data = "a,b,c,d,e\n1,\"Team, Inc\",10,\"B\",20\n";
        let jobs = read_jobs(data.as_bytes(), b',', UTF_8);
        assert_eq!(jobs[0].source_project_name, "Team, Inc");
    }

    #[test]
    fn test_non_utf8_bytes_do_not_drop_row() {
        let mut data = b"a,b,c,d,e\n1,".to_vec();
        data.extend_from_slice(&[0xC0, 0xE1]);
        data.extend_from_slice(b",10,B,20\n");
        let jobs = read_jobs(data.as_slice(), b',', UTF_8);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].target_project_id, "20");
    }

    #[test]
    fn test_decodes_windows_1251_names() {
        let mut data = b"a,b,c,d,e\n1,".to_vec();
        data.extend_from_slice(&[0xCF, 0xF0, 0xEE]);
        data.extend_from_slice(b",10,");
        data.extend_from_slice(&[0xC1, 0xE5, 0xF2, 0xE0]);
        data.extend_from_slice(b",20\n");

        let jobs = read_jobs(data.as_slice(), b',', WINDOWS_1251);
        assert_eq!(jobs[0].source_project_name, "Про");
        assert_eq!(jobs[0].target_project_name, "Бета");
        assert_eq!(jobs[0].source_project_id, "10");
    }

    #[test]
    fn test_utf8_input_with_utf8_encoding() {
        let data = "a,b,c,d,e\n1,Про,10,Бета,20\n";
        let jobs = read_jobs(data.as_bytes(), b',', UTF_8);
        assert_eq!(jobs[0].source_project_name, "Про");
    }

    #[test]
    fn test_header_only() {
        assert!(read_jobs("a,b,c,d,e\n".as_bytes(), b',', UTF_8).is_empty());
    }

    #[test]
    fn test_missing_file() {
        assert!(read_jobs_from_path(Path::new("/no/such/input.csv"), b',', UTF_8).is_err());
    }
}

//! Output rendering: turn [`OutputRecord`]s into CSV, JSON Lines, or
//! bodyfile (mactime) text.
//!
//! Field tables and the `--dedup` behavior are grounded on the original
//! tool's `fmt.py`: a fixed CSV header (`write_csv_output_lines`), one JSON
//! object per record (`write_json_output_lines`), and a bodyfile line per
//! record (`write_bodyfile_output_lines`). Deduplication collects every
//! rendered line into a set before writing, exactly like `fmt.py`'s
//! `write_dedup_output_lines`.

use std::collections::HashSet;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use ntfscarve_core::flags::FileAttributeFlags;
use ntfscarve_core::{timestamps, OutputRecord, Source};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    JsonLines,
    Bodyfile,
}

const CSV_HEADER: &str = "Source,ParentPath,ParentFileNumber,ParentSequenceNumber,Filename,Flags,\
FileNumber,SequenceNumber,Size,AllocatedSize,CreationTime,ModificationTime,AccessTime,ChangedTime";

/// Render `records` in `format` and write them to `writer`, one line per
/// record (plus a CSV header line when `format` is [`OutputFormat::Csv`]).
/// When `dedup` is set, identical rendered lines are collapsed exactly
/// once, regardless of how many underlying records produced them.
pub fn write_records<W: Write>(
    records: &[OutputRecord],
    format: OutputFormat,
    dedup: bool,
    writer: &mut W,
) -> io::Result<()> {
    if format == OutputFormat::Csv {
        writeln!(writer, "{CSV_HEADER}")?;
    }

    let lines: Vec<String> = records.iter().map(|r| render_line(r, format)).collect();

    if dedup {
        let mut seen = HashSet::with_capacity(lines.len());
        for line in lines {
            if seen.insert(line.clone()) {
                writeln!(writer, "{line}")?;
            }
        }
    } else {
        for line in lines {
            writeln!(writer, "{line}")?;
        }
    }

    Ok(())
}

fn render_line(record: &OutputRecord, format: OutputFormat) -> String {
    match format {
        OutputFormat::Csv => render_csv(record),
        OutputFormat::JsonLines => render_json(record),
        OutputFormat::Bodyfile => render_bodyfile(record),
    }
}

fn render_csv(record: &OutputRecord) -> String {
    let fields = [
        record.source.label().to_string(),
        record.parent_path.clone(),
        record.parent_index.to_string(),
        record.parent_sequence.to_string(),
        record.filename.clone(),
        record.flags.to_pipe_list(),
        record.index.to_string(),
        record.sequence.to_string(),
        record.size.to_string(),
        record.alloc_size.to_string(),
        timestamps::to_iso(record.creation_time),
        timestamps::to_iso(record.modification_time),
        timestamps::to_iso(record.access_time),
        timestamps::to_iso(record.change_time),
    ];
    fields.iter().map(|f| csv_quote(f)).collect::<Vec<_>>().join(",")
}

fn csv_quote(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    source: &'static str,
    parent_path: &'a str,
    filename: &'a str,
    parent_file_number: u64,
    parent_sequence_number: u16,
    file_number: u64,
    sequence_number: u16,
    size: u64,
    allocated_size: u64,
    flags: String,
    creation_time: Option<DateTime<Utc>>,
    modification_time: Option<DateTime<Utc>>,
    access_time: Option<DateTime<Utc>>,
    changed_time: Option<DateTime<Utc>>,
}

fn render_json(record: &OutputRecord) -> String {
    let json = JsonRecord {
        source: record.source.label(),
        parent_path: &record.parent_path,
        filename: &record.filename,
        parent_file_number: record.parent_index,
        parent_sequence_number: record.parent_sequence,
        file_number: record.index,
        sequence_number: record.sequence,
        size: record.size,
        allocated_size: record.alloc_size,
        flags: record.flags.to_pipe_list(),
        creation_time: timestamps::filetime_to_datetime(record.creation_time),
        modification_time: timestamps::filetime_to_datetime(record.modification_time),
        access_time: timestamps::filetime_to_datetime(record.access_time),
        changed_time: timestamps::filetime_to_datetime(record.change_time),
    };
    serde_json::to_string(&json).expect("OutputRecord fields always serialize")
}

fn render_bodyfile(record: &OutputRecord) -> String {
    let suffix = match record.source {
        Source::IndexRecord => "($I30)",
        Source::IndexSlack => "($I30) (slack)",
    };
    let mode = bodyfile_mode(record.flags);
    format!(
        "0|{path} {suffix}|{inode}|{mode}|0|0|{size}|{atime}|{mtime}|{ctime}|{crtime}",
        path = record.full_path(),
        inode = record.index,
        size = record.size,
        atime = timestamps::to_epoch(record.access_time),
        mtime = timestamps::to_epoch(record.modification_time),
        ctime = timestamps::to_epoch(record.change_time),
        crtime = timestamps::to_epoch(record.creation_time),
    )
}

/// A `type/rwx` mode string, the way mactime renders NTFS attribute flags:
/// directories get the `d` type, everything else `r`; `READ_ONLY` drops
/// the write bits.
fn bodyfile_mode(flags: FileAttributeFlags) -> String {
    let type_char = if flags.contains(FileAttributeFlags::DIRECTORY) { 'd' } else { 'r' };
    let perms = if flags.contains(FileAttributeFlags::READ_ONLY) {
        "r-xr-xr-x"
    } else {
        "rwxrwxrwx"
    };
    format!("{type_char}/{perms}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> OutputRecord {
        OutputRecord {
            source: Source::IndexRecord,
            parent_path: "/mnt/docs".into(),
            filename: "a, b\".txt".into(),
            parent_index: 10,
            parent_sequence: 1,
            index: 11,
            sequence: 1,
            size: 42,
            alloc_size: 4096,
            creation_time: 0,
            modification_time: 0,
            access_time: 0,
            change_time: 0,
            flags: FileAttributeFlags(FileAttributeFlags::READ_ONLY),
        }
    }

    #[test]
    fn csv_quotes_fields_with_commas_and_quotes() {
        let line = render_csv(&sample_record());
        assert!(line.contains("\"a, b\"\".txt\""));
    }

    #[test]
    fn json_line_round_trips_through_serde() {
        let line = render_json(&sample_record());
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["filename"], "a, b\".txt");
        assert_eq!(value["file_number"], 11);
    }

    #[test]
    fn bodyfile_marks_read_only_without_write_bits() {
        let line = render_bodyfile(&sample_record());
        assert!(line.contains("r/r-xr-xr-x"));
        assert!(line.contains("($I30)"));
    }

    #[test]
    fn bodyfile_marks_slack_source() {
        let mut record = sample_record();
        record.source = Source::IndexSlack;
        let line = render_bodyfile(&record);
        assert!(line.contains("(slack)"));
    }

    #[test]
    fn dedup_collapses_identical_lines() {
        let records = vec![sample_record(), sample_record()];
        let mut buf = Vec::new();
        write_records(&records, OutputFormat::Bodyfile, true, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn no_dedup_keeps_duplicate_lines() {
        let records = vec![sample_record(), sample_record()];
        let mut buf = Vec::new();
        write_records(&records, OutputFormat::Bodyfile, false, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn csv_output_starts_with_header() {
        let mut buf = Vec::new();
        write_records(&[sample_record()], OutputFormat::Csv, false, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Source,ParentPath"));
    }
}

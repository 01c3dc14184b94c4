//! Slack-space carving: recovering `$FILE_NAME` attributes left behind in
//! the unused tail of an index record after an entry was removed from the
//! live B-tree node but its bytes were never overwritten.
//!
//! There is no attribute header to anchor on in slack — only the bare
//! `FILENAME_ATTRIBUTE` bytes, possibly truncated or partially clobbered by
//! a later live entry. The carver uses `regex` as a cheap prefilter over
//! the namespace byte (always one of 0..=3) to cut down the positions that
//! need full structural validation, then anchors each candidate on the
//! sentinel: all four FILETIME fields plausible for the given date window,
//! an allocated-size byte divisible by 8, and a name that parses to
//! something a live filename could actually be.

use std::sync::OnceLock;

use byteorder::{ByteOrder, LittleEndian};
use regex::bytes::Regex;

use ntfscarve_core::FileReference;

use crate::mft::{parse_file_name_attribute, FileNameAttribute};

const FILENAME_CONTENT_LEN: usize = 66;
const NAMESPACE_OFFSET: usize = 65;
/// Byte offsets (within the `$FILE_NAME` content) of the four FILETIME
/// fields the sentinel anchors on: creation, modification, MFT-change,
/// access.
const FILETIME_FIELD_OFFSETS: [usize; 4] = [8, 16, 24, 32];
const ALLOCATED_SIZE_OFFSET: usize = 40;
/// Size of the index entry header (file reference, entry length, content
/// length, flags, reserved) that normally precedes a `$FILE_NAME` in an
/// index entry. Slack sometimes still carries it intact.
const ENTRY_HEADER_LEN: usize = 16;

fn namespace_byte_regex() -> &'static Regex {
    static NAMESPACE_BYTE: OnceLock<Regex> = OnceLock::new();
    NAMESPACE_BYTE.get_or_init(|| Regex::new(r"[\x00-\x03]").expect("static regex is valid"))
}

fn implausible_name_char_regex() -> &'static regex::Regex {
    static IMPLAUSIBLE_CHAR: OnceLock<regex::Regex> = OnceLock::new();
    IMPLAUSIBLE_CHAR.get_or_init(|| {
        regex::Regex::new(r"[\p{Cc}\p{Co}\p{Cn}]").expect("static regex is valid")
    })
}

/// A `$FILE_NAME` attribute recovered from slack rather than read from a
/// live index entry.
#[derive(Debug, Clone)]
pub struct CarvedFileName {
    pub offset_in_slack: usize,
    pub file_name: FileNameAttribute,
    /// The carved entry's own MFT file reference, recovered from an intact
    /// preceding index-entry header when present. `None` when the header
    /// bytes were overwritten or never matched their declared lengths.
    pub file_reference: Option<FileReference>,
}

/// Try to recover the 16-byte index entry header immediately preceding a
/// carved `$FILE_NAME` at `slack[start..]`, validating that its declared
/// lengths are consistent with the content we actually carved.
fn recover_entry_header(slack: &[u8], start: usize, content_len: usize) -> Option<FileReference> {
    if start < ENTRY_HEADER_LEN {
        return None;
    }
    let header = &slack[start - ENTRY_HEADER_LEN..start];
    let file_reference = FileReference::from_bytes(&header[0..8])?;
    let entry_length = LittleEndian::read_u16(&header[8..]) as usize;
    let declared_content_length = LittleEndian::read_u16(&header[10..]) as usize;
    if declared_content_length == content_len && entry_length == ENTRY_HEADER_LEN + content_len {
        Some(file_reference)
    } else {
        None
    }
}

/// Scan `slack` for plausible `$FILE_NAME` attributes.
///
/// `date_window` bounds the high byte of all four carved FILETIME fields
/// (inclusive); this is the same plausibility check the original tool
/// uses to reject noise that happens to parse structurally but carries an
/// implausible timestamp (e.g. bytes that are actually compressed or
/// encrypted content, not a stale directory entry).
pub fn carve_slack(slack: &[u8], date_window: (u8, u8)) -> Vec<CarvedFileName> {
    let mut found = Vec::new();
    if slack.len() < FILENAME_CONTENT_LEN {
        return found;
    }

    for namespace_match in namespace_byte_regex().find_iter(slack) {
        let namespace_pos = namespace_match.start();
        if namespace_pos < NAMESPACE_OFFSET {
            continue;
        }
        let start = namespace_pos - NAMESPACE_OFFSET;
        if start + FILENAME_CONTENT_LEN > slack.len() {
            continue;
        }

        let candidate = &slack[start..];
        if !sentinel_matches(candidate, date_window) {
            continue;
        }

        let name_length_chars = candidate[64] as usize;
        if name_length_chars == 0 {
            continue;
        }
        let name_end = FILENAME_CONTENT_LEN + name_length_chars * 2;
        if start + name_end > slack.len() {
            continue;
        }

        match parse_file_name_attribute(&slack[start..start + name_end]) {
            Ok(file_name) if is_plausible_name(&file_name.name) => {
                let file_reference = recover_entry_header(slack, start, name_end);
                found.push(CarvedFileName { offset_in_slack: start, file_name, file_reference });
            }
            _ => {}
        }
    }

    found
}

/// A FILETIME field is plausible when its second-highest byte is `0x01`
/// (true for every date from 2000 through 2038) and its highest byte falls
/// inside `date_window`.
fn filetime_field_plausible(candidate: &[u8], field_offset: usize, date_window: (u8, u8)) -> bool {
    let second_high_byte = candidate[field_offset + 6];
    let high_byte = candidate[field_offset + 7];
    second_high_byte == 0x01 && high_byte >= date_window.0 && high_byte <= date_window.1
}

/// The full carve sentinel: all four FILETIME fields plausible, followed by
/// an allocated-size byte divisible by 8 (the low byte of a cluster- or
/// sector-aligned allocation is always a multiple of 8).
fn sentinel_matches(candidate: &[u8], date_window: (u8, u8)) -> bool {
    FILETIME_FIELD_OFFSETS
        .iter()
        .all(|&offset| filetime_field_plausible(candidate, offset, date_window))
        && candidate[ALLOCATED_SIZE_OFFSET] % 8 == 0
}

/// Reject carved names that are empty after trimming NULs, contain NTFS
/// path separators, or contain a code point in the Unicode categories
/// `Cc` (control), `Co` (private use) or `Cn` (unassigned) -- none of which
/// a live filename could ever carry.
fn is_plausible_name(name: &str) -> bool {
    let trimmed = name.trim_end_matches('\0');
    !trimmed.is_empty()
        && !trimmed.contains('/')
        && !trimmed.contains('\\')
        && !trimmed.contains(':')
        && !implausible_name_char_regex().is_match(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_filename_content(name: &str, high_byte: u8) -> Vec<u8> {
        let mut content = vec![0u8; FILENAME_CONTENT_LEN];
        content[0..8].copy_from_slice(&FileReference::new(12, 3).to_bytes());
        let timestamp = ((high_byte as u64) << 56) | (0x01u64 << 48);
        for &offset in &FILETIME_FIELD_OFFSETS {
            LittleEndian::write_u64(&mut content[offset..], timestamp);
        }
        content[ALLOCATED_SIZE_OFFSET] = 0; // divisible by 8
        content[64] = name.encode_utf16().count() as u8;
        content[65] = 1; // WIN32
        content.extend(name.encode_utf16().flat_map(|u| u.to_le_bytes()));
        content
    }

    #[test]
    fn carves_plausible_entry_from_slack() {
        let mut slack = vec![0xCCu8; 32];
        slack.extend(build_filename_content("recovered.txt", 0xC8));
        slack.extend(vec![0xCCu8; 16]);

        let carved = carve_slack(&slack, (0xBC, 0xDC));
        assert_eq!(carved.len(), 1);
        assert_eq!(carved[0].file_name.name, "recovered.txt");
    }

    #[test]
    fn rejects_timestamp_outside_window() {
        let slack = build_filename_content("outside.txt", 0x10);
        let carved = carve_slack(&slack, (0xBC, 0xDC));
        assert!(carved.is_empty());
    }

    #[test]
    fn empty_slack_yields_nothing() {
        assert!(carve_slack(&[], (0xBC, 0xDC)).is_empty());
    }

    #[test]
    fn rejects_name_with_control_characters() {
        let mut content = build_filename_content("x", 0xC8);
        // overwrite the single name character with a NUL -> empty after trim
        let name_start = FILENAME_CONTENT_LEN;
        content[name_start] = 0;
        content[name_start + 1] = 0;
        assert!(carve_slack(&content, (0xBC, 0xDC)).is_empty());
    }

    #[test]
    fn rejects_name_with_private_use_character() {
        let content = build_filename_content("\u{E000}", 0xC8);
        assert!(carve_slack(&content, (0xBC, 0xDC)).is_empty());
    }

    #[test]
    fn rejects_name_with_unassigned_character() {
        let content = build_filename_content("\u{0378}", 0xC8);
        assert!(carve_slack(&content, (0xBC, 0xDC)).is_empty());
    }

    #[test]
    fn rejects_filetime_with_wrong_second_high_byte() {
        let mut content = build_filename_content("stale.txt", 0xC8);
        content[FILETIME_FIELD_OFFSETS[0] + 6] = 0x00;
        assert!(carve_slack(&content, (0xBC, 0xDC)).is_empty());
    }

    #[test]
    fn rejects_allocated_size_not_divisible_by_eight() {
        let mut content = build_filename_content("stale.txt", 0xC8);
        content[ALLOCATED_SIZE_OFFSET] = 3;
        assert!(carve_slack(&content, (0xBC, 0xDC)).is_empty());
    }
}

//! `$I30` index record parsing: the live directory B-tree nodes stored in
//! `$INDEX_ALLOCATION`, one fixed-size ("INDX") record per node.
//!
//! Layout grounded on the original tool's `INDEX_RECORD_HEADER` construct
//! (`indx.py`): a generic "INDX"-signed fixup header, a VCN, then an inner
//! index header giving the used and allocated size of the entry area. The
//! bytes between the used size and the allocated size are slack — the part
//! the carver in `carve.rs` scans for stale entries.

use byteorder::{ByteOrder, LittleEndian};
use ntfscarve_core::flags::entry_flags;
use ntfscarve_core::{CarveError, FileReference};

use crate::fixup::{apply_fixup, check_signature};
use crate::mft::FileNameAttribute;

const INDEX_SIGNATURE: &[u8] = b"INDX";

/// One "INDX" record, fixed up and sliced into its entry area and slack
/// tail.
pub struct IndexRecord {
    bytes: Vec<u8>,
    entries_start: usize,
    entries_end: usize,
    allocated_end: usize,
}

impl IndexRecord {
    pub fn entries_bytes(&self) -> &[u8] {
        &self.bytes[self.entries_start..self.entries_end]
    }

    /// The unused tail of the entry area: allocated but not part of the
    /// current, live B-tree node content.
    pub fn slack_bytes(&self) -> &[u8] {
        &self.bytes[self.entries_end..self.allocated_end]
    }

    pub fn live_entries(&self) -> IndexEntryIter<'_> {
        IndexEntryIter { bytes: self.entries_bytes(), offset: 0 }
    }
}

/// Parse one "INDX"-signed record. `raw` must be exactly
/// `bytes_per_index_record` bytes, as read from the `$INDEX_ALLOCATION`
/// non-resident stream.
pub fn parse_index_record(raw: &[u8]) -> Result<IndexRecord, CarveError> {
    check_signature(raw, INDEX_SIGNATURE)?;
    if raw.len() < 40 {
        return Err(CarveError::CorruptRecord("index record shorter than header".into()));
    }

    let usa_offset = LittleEndian::read_u16(&raw[4..]) as usize;
    let usa_count = LittleEndian::read_u16(&raw[6..]) as usize;

    let mut bytes = raw.to_vec();
    apply_fixup(&mut bytes, usa_offset, usa_count)?;

    // Inner index header starts right after the 24-byte outer header
    // (signature/usa_offset/usa_count/lsn/vcn).
    const INNER_HEADER: usize = 24;
    let entries_offset = LittleEndian::read_u32(&bytes[INNER_HEADER..]) as usize;
    let index_length = LittleEndian::read_u32(&bytes[INNER_HEADER + 4..]) as usize;
    let allocated_size = LittleEndian::read_u32(&bytes[INNER_HEADER + 8..]) as usize;

    let entries_start = INNER_HEADER + entries_offset;
    let entries_end = INNER_HEADER + index_length;
    let allocated_end = INNER_HEADER + allocated_size;
    if entries_end > bytes.len() || allocated_end > bytes.len() || entries_start > entries_end {
        return Err(CarveError::CorruptRecord("index record sizes out of bounds".into()));
    }

    Ok(IndexRecord { bytes, entries_start, entries_end, allocated_end })
}

/// One live `$I30` index entry: a file reference, its `$FILE_NAME`
/// content, and whether it points at a child B-tree node.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub file_reference: FileReference,
    pub file_name: Option<FileNameAttribute>,
    pub points_to_subnode: bool,
}

pub struct IndexEntryIter<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for IndexEntryIter<'a> {
    type Item = Result<IndexEntry, CarveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + 16 > self.bytes.len() {
            return None;
        }
        let file_reference = match FileReference::from_bytes(&self.bytes[self.offset..self.offset + 8]) {
            Some(r) => r,
            None => return Some(Err(CarveError::CorruptRecord("truncated index entry reference".into()))),
        };
        let entry_length = LittleEndian::read_u16(&self.bytes[self.offset + 8..]) as usize;
        let content_length = LittleEndian::read_u16(&self.bytes[self.offset + 10..]) as usize;
        let flags = LittleEndian::read_u16(&self.bytes[self.offset + 12..]);

        if entry_length < 16 || self.offset + entry_length > self.bytes.len() {
            return Some(Err(CarveError::CorruptRecord("index entry length out of bounds".into())));
        }

        let is_last = flags & entry_flags::LAST_ENTRY != 0;
        let file_name = if !is_last && content_length >= 66 {
            let content_start = self.offset + 16;
            let content_end = content_start + content_length;
            if content_end > self.bytes.len() {
                return Some(Err(CarveError::CorruptRecord("index entry content out of bounds".into())));
            }
            match crate::mft::parse_file_name_attribute(&self.bytes[content_start..content_end]) {
                Ok(fna) => Some(fna),
                Err(e) => return Some(Err(e)),
            }
        } else {
            None
        };

        let entry = IndexEntry {
            file_reference,
            file_name,
            points_to_subnode: flags & entry_flags::POINTS_TO_SUBNODE != 0,
        };

        let next_offset = self.offset + entry_length;
        if is_last {
            self.offset = self.bytes.len();
        } else {
            self.offset = next_offset;
        }
        Some(Ok(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filename_content(name: &str, parent: FileReference) -> Vec<u8> {
        let mut content = vec![0u8; 66];
        content[0..8].copy_from_slice(&parent.to_bytes());
        content[64] = name.encode_utf16().count() as u8;
        content[65] = 1;
        content.extend(name.encode_utf16().flat_map(|u| u.to_le_bytes()));
        content
    }

    fn build_index_record(entries: &[(FileReference, Vec<u8>, u16)]) -> Vec<u8> {
        let mut rec = vec![0u8; 4096];
        rec[0..4].copy_from_slice(b"INDX");
        LittleEndian::write_u16(&mut rec[4..], 4088); // usa offset, unused in this test
        LittleEndian::write_u16(&mut rec[6..], 1); // usa_count = 1 -> only USN, no sector tails
        LittleEndian::write_u16(&mut rec[4088..], 0); // USN = 0

        let mut cursor = 24 + 16; // header + inner header
        let entries_start_rel = 16; // relative to inner header
        for (file_ref, content, flags) in entries {
            let entry_len = 16 + content.len();
            rec[cursor..cursor + 8].copy_from_slice(&file_ref.to_bytes());
            LittleEndian::write_u16(&mut rec[cursor + 8..], entry_len as u16);
            LittleEndian::write_u16(&mut rec[cursor + 10..], content.len() as u16);
            LittleEndian::write_u16(&mut rec[cursor + 12..], *flags);
            rec[cursor + 16..cursor + 16 + content.len()].copy_from_slice(content);
            cursor += entry_len;
        }
        // final pseudo entry marking end of list
        LittleEndian::write_u16(&mut rec[cursor + 12..], entry_flags::LAST_ENTRY);
        cursor += 16;

        let index_length = cursor - 24;
        LittleEndian::write_u32(&mut rec[24..], entries_start_rel as u32);
        LittleEndian::write_u32(&mut rec[28..], index_length as u32);
        LittleEndian::write_u32(&mut rec[32..], 4096 - 24);
        rec
    }

    #[test]
    fn walks_live_entries() {
        let content = filename_content("foo.txt", FileReference::new(5, 5));
        let raw = build_index_record(&[(FileReference::new(10, 1), content, 0)]);
        let record = parse_index_record(&raw).unwrap();
        let entries: Vec<_> = record.live_entries().collect::<Result<_, _>>().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name.as_ref().unwrap().name, "foo.txt");
        assert!(!entries[0].points_to_subnode);
    }

    #[test]
    fn slack_bytes_cover_unused_tail() {
        let content = filename_content("a", FileReference::new(6, 1));
        let raw = build_index_record(&[(FileReference::new(11, 1), content, 0)]);
        let record = parse_index_record(&raw).unwrap();
        assert!(record.slack_bytes().len() > 0);
        assert_eq!(record.slack_bytes().len() + record.entries_bytes().len(), 4096 - 40);
    }

    #[test]
    fn rejects_bad_signature() {
        let raw = vec![0u8; 4096];
        assert!(parse_index_record(&raw).is_err());
    }
}

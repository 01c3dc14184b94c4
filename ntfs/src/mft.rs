//! MFT record and attribute parsing.
//!
//! Structure offsets grounded on the original tool's `FILE_RECORD_HEADER`,
//! `ATTRIBUTE_HEADER` and `FILENAME_ATTRIBUTE` constructs (`ntfs.py`).

use byteorder::{ByteOrder, LittleEndian};
use ntfscarve_core::flags::record_flags;
use ntfscarve_core::{CarveError, FileReference};

use crate::fixup::apply_fixup;

const RECORD_SIGNATURE: &[u8] = b"FILE";

pub mod attribute_type {
    pub const STANDARD_INFORMATION: u32 = 0x10;
    pub const ATTRIBUTE_LIST: u32 = 0x20;
    pub const FILE_NAME: u32 = 0x30;
    pub const DATA: u32 = 0x80;
    pub const INDEX_ROOT: u32 = 0x90;
    pub const INDEX_ALLOCATION: u32 = 0xA0;
    pub const BITMAP: u32 = 0xB0;
    pub const END_MARKER: u32 = 0xFFFF_FFFF;
}

/// A single MFT record (one fixed-size slot of the `$MFT` file), after
/// update-sequence fixup has been applied.
#[derive(Debug, Clone)]
pub struct MftRecord {
    pub sequence_number: u16,
    pub flags: u16,
    pub base_record: FileReference,
    bytes: Vec<u8>,
    first_attribute_offset: u16,
}

impl MftRecord {
    pub fn is_in_use(&self) -> bool {
        self.flags & record_flags::IN_USE != 0
    }

    pub fn is_directory(&self) -> bool {
        self.flags & record_flags::DIRECTORY != 0
    }

    /// True for extension records that carry overflow attributes of
    /// another record (identified by a non-zero base record reference).
    pub fn is_extension_record(&self) -> bool {
        self.base_record.index != 0
    }

    pub fn attributes(&self) -> AttributeIter<'_> {
        AttributeIter { bytes: &self.bytes, offset: self.first_attribute_offset as usize }
    }
}

/// Apply the update sequence array fixup in place and parse the record
/// header. `raw` must be exactly one MFT-record-sized chunk.
pub fn parse_mft_record(raw: &[u8]) -> Result<MftRecord, CarveError> {
    if raw.len() < 48 || &raw[0..4] != RECORD_SIGNATURE {
        return Err(CarveError::CorruptRecord("missing FILE signature".into()));
    }

    let usa_offset = LittleEndian::read_u16(&raw[4..]) as usize;
    let usa_count = LittleEndian::read_u16(&raw[6..]) as usize;
    let sequence_number = LittleEndian::read_u16(&raw[16..]);
    let first_attribute_offset = LittleEndian::read_u16(&raw[20..]);
    let flags = LittleEndian::read_u16(&raw[22..]);
    let base_record = FileReference::from_bytes(&raw[32..40])
        .ok_or_else(|| CarveError::CorruptRecord("truncated base record reference".into()))?;

    let mut bytes = raw.to_vec();
    apply_fixup(&mut bytes, usa_offset, usa_count)?;

    Ok(MftRecord { sequence_number, flags, base_record, bytes, first_attribute_offset })
}

/// A parsed attribute header plus its raw content bytes (resident data, or
/// the data run list for non-resident attributes).
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    pub attribute_type: u32,
    pub non_resident: bool,
    pub name: Option<String>,
    /// Resident content, or the raw mapping pairs buffer if non-resident.
    pub content: &'a [u8],
    /// Only meaningful when `non_resident` is true.
    pub allocated_size: u64,
    pub real_size: u64,
    /// First and one-past-last virtual cluster number this attribute
    /// instance covers. Always `0..=0` for resident attributes; for a
    /// non-resident attribute split across extension records, each
    /// instance covers a disjoint `[starting_vcn, ending_vcn]` range of the
    /// same logical stream.
    pub starting_vcn: u64,
    pub ending_vcn: u64,
}

pub struct AttributeIter<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for AttributeIter<'a> {
    type Item = Result<Attribute<'a>, CarveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + 4 > self.bytes.len() {
            return None;
        }
        let attribute_type = LittleEndian::read_u32(&self.bytes[self.offset..]);
        if attribute_type == attribute_type::END_MARKER {
            return None;
        }
        if self.offset + 16 > self.bytes.len() {
            return Some(Err(CarveError::CorruptRecord("truncated attribute header".into())));
        }

        let length = LittleEndian::read_u32(&self.bytes[self.offset + 4..]) as usize;
        if length < 16 || self.offset + length > self.bytes.len() {
            return Some(Err(CarveError::CorruptRecord("attribute length out of bounds".into())));
        }
        let non_resident = self.bytes[self.offset + 8] != 0;
        let name_length = self.bytes[self.offset + 9] as usize;
        let name_offset = LittleEndian::read_u16(&self.bytes[self.offset + 10..]) as usize;

        let name = if name_length > 0 {
            let start = self.offset + name_offset;
            let end = start + name_length * 2;
            if end > self.bytes.len() {
                return Some(Err(CarveError::CorruptRecord("attribute name out of bounds".into())));
            }
            Some(decode_utf16le(&self.bytes[start..end]))
        } else {
            None
        };

        let attribute_end = self.offset + length;
        let result = if non_resident {
            if self.offset + 64 > attribute_end {
                return Some(Err(CarveError::CorruptRecord("truncated non-resident header".into())));
            }
            let starting_vcn = LittleEndian::read_u64(&self.bytes[self.offset + 16..]);
            let ending_vcn = LittleEndian::read_u64(&self.bytes[self.offset + 24..]);
            let allocated_size = LittleEndian::read_u64(&self.bytes[self.offset + 40..]);
            let real_size = LittleEndian::read_u64(&self.bytes[self.offset + 48..]);
            if allocated_size == 0 && real_size == 0 {
                return Some(Err(CarveError::EmptyNonResident));
            }
            let runs_offset = LittleEndian::read_u16(&self.bytes[self.offset + 32..]) as usize;
            let content = &self.bytes[self.offset + runs_offset..attribute_end];
            Attribute {
                attribute_type,
                non_resident,
                name,
                content,
                allocated_size,
                real_size,
                starting_vcn,
                ending_vcn,
            }
        } else {
            let content_length = LittleEndian::read_u32(&self.bytes[self.offset + 16..]) as usize;
            let content_offset = LittleEndian::read_u16(&self.bytes[self.offset + 20..]) as usize;
            let content_start = self.offset + content_offset;
            let content_end = content_start + content_length;
            if content_end > attribute_end {
                return Some(Err(CarveError::CorruptRecord("resident content out of bounds".into())));
            }
            let content = &self.bytes[content_start..content_end];
            Attribute {
                attribute_type,
                non_resident,
                name,
                content,
                allocated_size: content_length as u64,
                real_size: content_length as u64,
                starting_vcn: 0,
                ending_vcn: 0,
            }
        };

        self.offset = attribute_end;
        Some(Ok(result))
    }
}

pub fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes.chunks_exact(2).map(|c| LittleEndian::read_u16(c)).collect();
    String::from_utf16_lossy(&units)
}

/// Content of a `$FILE_NAME` attribute.
#[derive(Debug, Clone)]
pub struct FileNameAttribute {
    pub parent: FileReference,
    pub creation_time: u64,
    pub modification_time: u64,
    pub mft_change_time: u64,
    pub access_time: u64,
    pub allocated_size: u64,
    pub real_size: u64,
    pub flags: u32,
    pub namespace: u8,
    pub name: String,
}

pub fn parse_file_name_attribute(content: &[u8]) -> Result<FileNameAttribute, CarveError> {
    if content.len() < 66 {
        return Err(CarveError::CorruptRecord("FILE_NAME attribute too short".into()));
    }
    let parent = FileReference::from_bytes(&content[0..8])
        .ok_or_else(|| CarveError::CorruptRecord("truncated parent reference".into()))?;
    let name_length_chars = content[64] as usize;
    let namespace = content[65];
    let name_start = 66;
    let name_end = name_start + name_length_chars * 2;
    if name_end > content.len() {
        return Err(CarveError::CorruptRecord("FILE_NAME name out of bounds".into()));
    }

    Ok(FileNameAttribute {
        parent,
        creation_time: LittleEndian::read_u64(&content[8..]),
        modification_time: LittleEndian::read_u64(&content[16..]),
        mft_change_time: LittleEndian::read_u64(&content[24..]),
        access_time: LittleEndian::read_u64(&content[32..]),
        allocated_size: LittleEndian::read_u64(&content[40..]),
        real_size: LittleEndian::read_u64(&content[48..]),
        flags: LittleEndian::read_u32(&content[56..]),
        namespace,
        name: decode_utf16le(&content[name_start..name_end]),
    })
}

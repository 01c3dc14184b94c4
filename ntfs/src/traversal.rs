//! MFT traversal: walk every record of `$MFT` and assemble a map from MFT
//! file reference to the facts the path resolver and live-entry walk need.
//!
//! Grounded on the original tool's `get_mft_dict`/`get_mft_records` pair
//! (`INDXRipper.py`): a single linear pass over `$MFT`'s `$DATA` stream,
//! grouping extension records into their base record by the record's own
//! base-record reference rather than by parsing `$ATTRIBUTE_LIST`. `$MFT`'s
//! own `$DATA` attribute can itself be split across extension records (a
//! record whose base reference points back at record 0); those are folded
//! into the run list as they're discovered, extending how far the
//! traversal walks.

use std::collections::HashMap;
use std::io::{Read, Seek};

use ntfscarve_core::{CarveError, FileReference};

use crate::data_runs::decode_data_runs;
use crate::mft::{attribute_type, parse_file_name_attribute, parse_mft_record, FileNameAttribute};
use crate::stream::NonResidentStream;
use crate::volume::VolumeGeometry;

/// Everything known about one MFT record index, folding in attributes
/// contributed by any extension records that point back at it.
#[derive(Debug, Clone, Default)]
pub struct MftEntry {
    pub sequence_number: u16,
    pub in_use: bool,
    pub is_directory: bool,
    pub file_names: Vec<FileNameAttribute>,
    pub index_allocation: Option<NonResidentStream>,
}

impl MftEntry {
    pub fn reference(&self, index: u64) -> FileReference {
        FileReference::new(index, self.sequence_number)
    }
}

/// `(index, sequence)` -> assembled entry, keyed the way the on-disk
/// `$FILE_NAME.parent` and index-entry file references actually identify a
/// record: by slot *and* generation, since a slot can be reused.
pub struct MftMap {
    pub entries: HashMap<(u64, u16), MftEntry>,
}

impl MftMap {
    /// Exact lookup: both the index and the sequence number must match the
    /// record currently occupying that slot.
    pub fn get(&self, reference: FileReference) -> Option<&MftEntry> {
        self.entries.get(&(reference.index, reference.sequence))
    }

    /// Look up `reference`, correcting for the case where it names the
    /// slot's *previous* occupant: NTFS bumps a record's sequence number by
    /// one on deallocation, so a stale reference recorded while that
    /// occupant was still live is exactly one behind the slot's current
    /// sequence number.
    pub fn get_with_sequence_correction(&self, reference: FileReference) -> Option<&MftEntry> {
        if let Some(entry) = self.get(reference) {
            return Some(entry);
        }
        let bumped = FileReference::new(reference.index, reference.sequence.wrapping_add(1));
        self.get(bumped).filter(|_| bumped.previous_instance() == reference)
    }
}

/// Read `$MFT` itself (record 0) and every subsequent record reachable
/// through its `$DATA` stream, building the full `MftMap`. `$MFT`'s own
/// `$DATA` run list and real size can grow mid-walk as extension records
/// that extend it are discovered, so the stream is rebuilt whenever that
/// happens rather than snapshotted once up front.
pub fn build_mft_map<R: Read + Seek>(
    reader: &mut R,
    geometry: &VolumeGeometry,
) -> Result<MftMap, CarveError> {
    let mft_record_bytes = read_record_at(reader, geometry, geometry.mft_byte_offset())?;
    let mft_record = parse_mft_record(&mft_record_bytes)?;

    let mut mft_runs = None;
    let mut mft_real_size = 0u64;
    for attribute in mft_record.attributes() {
        let attribute = attribute?;
        if attribute.attribute_type == attribute_type::DATA && attribute.name.is_none() {
            mft_runs = Some(decode_data_runs(attribute.content)?);
            mft_real_size = attribute.real_size;
        }
    }
    let mut mft_runs =
        mft_runs.ok_or_else(|| CarveError::CorruptRecord("$MFT has no unnamed $DATA attribute".into()))?;

    let record_size = geometry.bytes_per_mft_record as u64;
    let mut mft_stream = NonResidentStream::new(mft_runs.clone(), geometry.bytes_per_cluster, mft_real_size, true);

    // An extension record declares its base by the base record's own
    // (index, sequence); a record that is *not* an extension carries the
    // all-zero sentinel instead, so checking the index alone would also
    // match every ordinary record in the volume.
    let mft_self_reference = FileReference::new(0, mft_record.sequence_number);

    let mut entries: HashMap<(u64, u16), MftEntry> = HashMap::new();
    let mut pending_extensions: Vec<(FileReference, MftEntry)> = Vec::new();

    let mut record_index = 0u64;
    while record_index * record_size < mft_real_size {
        let record_bytes =
            mft_stream.read_range(reader, geometry.partition_offset, record_index * record_size, record_size)?;
        if record_bytes.len() < record_size as usize {
            record_index += 1;
            continue;
        }
        let current_index = record_index;
        record_index += 1;

        let record = match parse_mft_record(&record_bytes) {
            Ok(r) => r,
            Err(_) => continue, // unallocated or corrupt slot, skip
        };

        // $MFT's own $DATA attribute split across an extension record:
        // fold the additional runs in, extend the walk, and otherwise
        // ignore the record -- it describes no directory of its own.
        if record.base_record == mft_self_reference {
            for attribute in record.attributes() {
                let Ok(attribute) = attribute else { continue };
                if attribute.attribute_type == attribute_type::DATA && attribute.name.is_none() {
                    if let Ok(mut extra_runs) = decode_data_runs(attribute.content) {
                        mft_runs.append(&mut extra_runs);
                        mft_real_size = mft_real_size.max(attribute.real_size);
                        mft_stream = NonResidentStream::new(
                            mft_runs.clone(),
                            geometry.bytes_per_cluster,
                            mft_real_size,
                            true,
                        );
                    }
                }
            }
            continue;
        }

        let mut entry = MftEntry {
            sequence_number: record.sequence_number,
            in_use: record.is_in_use(),
            is_directory: record.is_directory(),
            ..Default::default()
        };

        for attribute in record.attributes() {
            let attribute = match attribute {
                Ok(a) => a,
                Err(_) => continue,
            };
            match attribute.attribute_type {
                attribute_type::FILE_NAME => {
                    if let Ok(fna) = parse_file_name_attribute(attribute.content) {
                        entry.file_names.push(fna);
                    }
                }
                attribute_type::INDEX_ALLOCATION if attribute.name.as_deref() == Some("$I30") => {
                    if let Ok(runs) = decode_data_runs(attribute.content) {
                        entry.index_allocation = Some(NonResidentStream::new(
                            runs,
                            geometry.bytes_per_cluster,
                            attribute.real_size,
                            record.is_in_use(),
                        ));
                    }
                }
                _ => {}
            }
        }

        if record.is_extension_record() {
            pending_extensions.push((record.base_record, entry));
        } else {
            entries.insert((current_index, record.sequence_number), entry);
        }
    }

    for (base_reference, extension) in pending_extensions {
        if let Some(base) = entries.get_mut(&(base_reference.index, base_reference.sequence)) {
            base.file_names.extend(extension.file_names);
            if base.index_allocation.is_none() {
                base.index_allocation = extension.index_allocation;
            }
        }
    }

    Ok(MftMap { entries })
}

fn read_record_at<R: Read + Seek>(
    reader: &mut R,
    geometry: &VolumeGeometry,
    byte_offset: u64,
) -> Result<Vec<u8>, CarveError> {
    use std::io::SeekFrom;
    reader
        .seek(SeekFrom::Start(byte_offset))
        .map_err(CarveError::Io)?;
    let mut buf = vec![0u8; geometry.bytes_per_mft_record as usize];
    reader.read_exact(&mut buf).map_err(CarveError::Io)?;
    Ok(buf)
}

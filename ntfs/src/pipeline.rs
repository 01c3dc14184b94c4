//! Carving driver: walks every directory in the assembled MFT map,
//! resolves paths, and emits one [`OutputRecord`] per live and (optionally)
//! carved directory entry.
//!
//! Grounded on the original tool's `get_output_lines`/`main`
//! (`INDXRipper.py`): a single pass over directories, live entries first,
//! then slack, deduplicated by the caller (see the `formats` crate).

use std::collections::HashMap;
use std::io::{Read, Seek};

use log::{debug, warn};
use ntfscarve_core::{CarveConfig, CarveError, FileReference, OutputRecord, Source};

use crate::carve::carve_slack;
use crate::index::{parse_index_record, IndexEntry};
use crate::path::{resolve_path, PathCache};
use crate::traversal::{build_mft_map, MftMap};
use crate::volume::VolumeGeometry;

const UNKNOWN_PARENT_PATH: &str = "<Unknown>";

/// Run the full carving pipeline over an already-open volume image and
/// return every recovered directory entry.
pub fn run_carve<R: Read + Seek>(
    reader: &mut R,
    geometry: &VolumeGeometry,
    config: &CarveConfig,
) -> Result<Vec<OutputRecord>, CarveError> {
    let map = build_mft_map(reader, geometry)?;
    let mut cache = PathCache::new();
    let mut out = Vec::new();

    let mut indices: Vec<(u64, u16)> = map.entries.keys().copied().collect();
    indices.sort_unstable();

    for key in indices {
        let entry = map.entries.get(&key).expect("key came from the map itself");
        if !entry.is_directory {
            continue;
        }
        if !entry.in_use && !config.include_deleted_dirs {
            continue;
        }

        let (index, sequence) = key;
        let directory_reference = FileReference::new(index, sequence);
        let parent_path = resolve_path(&map, directory_reference, &config.mount_point, &mut cache);

        if let Some(stream) = &entry.index_allocation {
            match stream.read_chunks(reader, geometry.partition_offset, geometry.bytes_per_index_record) {
                Ok(chunks) => {
                    for raw in chunks {
                        let record = match parse_index_record(&raw) {
                            Ok(r) => r,
                            Err(e) => {
                                debug!("skipping unparsable index record under MFT index {index}: {e}");
                                continue;
                            }
                        };

                        // Collected regardless of --slack-only: it's the
                        // dedup reference the slack-only carve below needs,
                        // not just a gate on whether live entries are shown.
                        let mut live_by_name: HashMap<String, FileReference> = HashMap::new();
                        for live in record.live_entries() {
                            match live {
                                Ok(live_entry) => {
                                    if let Some(file_name) = &live_entry.file_name {
                                        live_by_name.insert(file_name.name.clone(), live_entry.file_reference);
                                    }
                                    if !config.slack_only {
                                        emit_live_entry(&live_entry, &parent_path, &map, config, &mut out);
                                    }
                                }
                                Err(e) => debug!("skipping corrupt live entry under MFT index {index}: {e}"),
                            }
                        }

                        // Slack entries are by definition stale; --deleted-only
                        // never excludes them, it only filters live entries.
                        for carved in carve_slack(record.slack_bytes(), config.carve_date_window) {
                            if config.slack_only && is_duplicate_of_live(&carved, &live_by_name) {
                                continue;
                            }

                            // The carved entry's own embedded parent reference
                            // is more authoritative than the enclosing index
                            // record's directory, so it gets its own path
                            // resolution rather than reusing `parent_path` --
                            // but only when the owning directory record is
                            // still allocated; once its clusters are free to
                            // be reused, anything read back through it (this
                            // index record included) is unverifiable.
                            let slack_parent_path = if stream.is_allocated() {
                                resolve_path(&map, carved.file_name.parent, &config.mount_point, &mut cache)
                            } else {
                                UNKNOWN_PARENT_PATH.to_string()
                            };

                            out.push(OutputRecord {
                                source: Source::IndexSlack,
                                parent_path: slack_parent_path,
                                filename: carved.file_name.name.clone(),
                                parent_index: carved.file_name.parent.index,
                                parent_sequence: carved.file_name.parent.sequence,
                                index: carved.file_reference.map(|r| r.index).unwrap_or(0),
                                sequence: carved.file_reference.map(|r| r.sequence).unwrap_or(0),
                                size: carved.file_name.real_size,
                                alloc_size: carved.file_name.allocated_size,
                                creation_time: carved.file_name.creation_time,
                                modification_time: carved.file_name.modification_time,
                                access_time: carved.file_name.access_time,
                                change_time: carved.file_name.mft_change_time,
                                flags: ntfscarve_core::FileAttributeFlags(carved.file_name.flags),
                            });
                        }
                    }
                }
                Err(e) => warn!("failed to read $INDEX_ALLOCATION under MFT index {index}: {e}"),
            }
        }
    }

    Ok(out)
}

/// A carved slack entry is a no-op recovery when a live entry already
/// carries the same filename and the same file reference -- the same name
/// reused by a different file (or the same file reused under a stale
/// reference) is still worth surfacing.
fn is_duplicate_of_live(carved: &crate::carve::CarvedFileName, live_by_name: &HashMap<String, FileReference>) -> bool {
    match (carved.file_reference, live_by_name.get(&carved.file_name.name)) {
        (Some(carved_ref), Some(live_ref)) => carved_ref == *live_ref,
        _ => false,
    }
}

fn emit_live_entry(
    entry: &IndexEntry,
    parent_path: &str,
    map: &MftMap,
    config: &CarveConfig,
    out: &mut Vec<OutputRecord>,
) {
    let Some(file_name) = &entry.file_name else { return };

    if config.deleted_only && is_live_and_current(entry.file_reference, map) {
        return;
    }

    out.push(OutputRecord {
        source: Source::IndexRecord,
        parent_path: parent_path.to_string(),
        filename: file_name.name.clone(),
        parent_index: file_name.parent.index,
        parent_sequence: file_name.parent.sequence,
        index: entry.file_reference.index,
        sequence: entry.file_reference.sequence,
        size: file_name.real_size,
        alloc_size: file_name.allocated_size,
        creation_time: file_name.creation_time,
        modification_time: file_name.modification_time,
        access_time: file_name.access_time,
        change_time: file_name.mft_change_time,
        flags: ntfscarve_core::FileAttributeFlags(file_name.flags),
    });
}

/// An entry is "live and current" when the MFT record it points at is
/// in use and its sequence number matches exactly: the defining check
/// behind `--deleted-only`. No sequence correction here -- a reference one
/// generation stale is, by definition, not current.
fn is_live_and_current(reference: FileReference, map: &MftMap) -> bool {
    map.get(reference).map(|e| e.in_use).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntfscarve_core::FileReference;
    use std::collections::HashMap;

    use crate::mft::FileNameAttribute;
    use crate::traversal::MftEntry;

    fn fna(parent: FileReference, name: &str) -> FileNameAttribute {
        FileNameAttribute {
            parent,
            creation_time: 0,
            modification_time: 0,
            mft_change_time: 0,
            access_time: 0,
            allocated_size: 0,
            real_size: 0,
            flags: 0,
            namespace: 1,
            name: name.to_string(),
        }
    }

    #[test]
    fn deleted_only_skips_entries_that_resolve_live() {
        let mut entries = HashMap::new();
        entries.insert(
            (20, 2),
            MftEntry { sequence_number: 2, in_use: true, ..Default::default() },
        );
        let map = MftMap { entries };
        assert!(is_live_and_current(FileReference::new(20, 2), &map));
        assert!(!is_live_and_current(FileReference::new(20, 3), &map));
        assert!(!is_live_and_current(FileReference::new(99, 1), &map));
    }

    #[test]
    fn slack_dedup_skips_identical_name_and_reference() {
        let mut live = HashMap::new();
        live.insert("a.txt".to_string(), FileReference::new(30, 1));

        let duplicate = crate::carve::CarvedFileName {
            offset_in_slack: 0,
            file_name: fna(FileReference::ROOT, "a.txt"),
            file_reference: Some(FileReference::new(30, 1)),
        };
        assert!(is_duplicate_of_live(&duplicate, &live));

        let renamed_over = crate::carve::CarvedFileName {
            offset_in_slack: 0,
            file_name: fna(FileReference::ROOT, "a.txt"),
            file_reference: Some(FileReference::new(31, 1)),
        };
        assert!(!is_duplicate_of_live(&renamed_over, &live));

        let unresolvable_reference = crate::carve::CarvedFileName {
            offset_in_slack: 0,
            file_name: fna(FileReference::ROOT, "a.txt"),
            file_reference: None,
        };
        assert!(!is_duplicate_of_live(&unresolvable_reference, &live));
    }

    #[test]
    fn emit_live_entry_skips_missing_file_name() {
        let entry = IndexEntry { file_reference: FileReference::new(1, 1), file_name: None, points_to_subnode: false };
        let map = MftMap { entries: HashMap::new() };
        let config = CarveConfig::default();
        let mut out = Vec::new();
        emit_live_entry(&entry, "/mnt", &map, &config, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn emit_live_entry_pushes_record_with_resolved_fields() {
        let file_name = fna(FileReference::ROOT, "a.txt");
        let entry = IndexEntry { file_reference: FileReference::new(30, 1), file_name: Some(file_name), points_to_subnode: false };
        let map = MftMap { entries: HashMap::new() };
        let config = CarveConfig::default();
        let mut out = Vec::new();
        emit_live_entry(&entry, "/mnt", &map, &config, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].filename, "a.txt");
        assert_eq!(out[0].source, Source::IndexRecord);
    }
}

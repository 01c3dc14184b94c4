//! Full path resolution: walk `$FILE_NAME` parent references up to the
//! volume root, picking the highest-priority namespace name at each hop.
//!
//! Grounded on the original tool's `get_path` (`INDXRipper.py`): a
//! memoized walk with an explicit "currently resolving" guard against
//! parent cycles (which do occur on corrupted or carved-from-slack data),
//! falling back to an `/$Orphan` path when the parent chain dead-ends.

use std::collections::{HashMap, HashSet};

use ntfscarve_core::{FileReference, Namespace};

use crate::mft::FileNameAttribute;
use crate::traversal::MftMap;

const ORPHAN_SUFFIX: &str = "$Orphan";

/// Per-run path cache, keyed by MFT record index. Shared across every
/// entry resolved during a single carving pass.
#[derive(Default)]
pub struct PathCache {
    resolved: HashMap<u64, String>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Pick the `$FILE_NAME` to display for a record: highest resolution
/// priority first (WIN32, then POSIX, then WIN32_DOS, then DOS), per
/// [`Namespace::priority`].
pub fn best_file_name(file_names: &[FileNameAttribute]) -> Option<&FileNameAttribute> {
    file_names
        .iter()
        .max_by_key(|fna| Namespace::from_raw(fna.namespace).map(Namespace::priority).unwrap_or(0))
}

/// Resolve the full path of `reference`, relative to `mount_point`.
pub fn resolve_path(map: &MftMap, reference: FileReference, mount_point: &str, cache: &mut PathCache) -> String {
    let mut visiting = HashSet::new();
    resolve_index(map, reference, mount_point, cache, &mut visiting)
}

fn resolve_index(
    map: &MftMap,
    reference: FileReference,
    mount_point: &str,
    cache: &mut PathCache,
    visiting: &mut HashSet<u64>,
) -> String {
    let index = reference.index;
    if index == FileReference::ROOT.index {
        return mount_point.trim_end_matches('/').to_string();
    }
    if let Some(cached) = cache.resolved.get(&index) {
        return cached.clone();
    }
    if !visiting.insert(index) {
        return format!("{}/{}", mount_point.trim_end_matches('/'), ORPHAN_SUFFIX);
    }

    // A deleted-record sequence correction: a reference may point at the
    // slot's previous, already-deallocated occupant.
    let result = match map
        .get_with_sequence_correction(reference)
        .and_then(|entry| best_file_name(&entry.file_names))
    {
        Some(fna) => {
            let parent_path = resolve_index(map, fna.parent, mount_point, cache, visiting);
            format!("{}/{}", parent_path, fna.name)
        }
        None => format!("{}/{}", mount_point.trim_end_matches('/'), ORPHAN_SUFFIX),
    };

    visiting.remove(&index);
    cache.resolved.insert(index, result.clone());
    result
}

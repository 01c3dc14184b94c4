//! Random-access reads over a non-resident attribute's data run list.
//!
//! Grounded on the original tool's `dataruns.py` `NonResidentStream` class:
//! logical offsets are mapped through the run list to physical cluster
//! offsets in the image, with sparse runs read back as zero bytes and reads
//! clamped to the attribute's real size.

use std::io::{self, Read, Seek, SeekFrom};

use crate::data_runs::DataRun;

/// A non-resident attribute's backing store: its run list plus the handful
/// of geometry facts needed to turn a logical byte range into physical
/// reads.
#[derive(Debug, Clone)]
pub struct NonResidentStream {
    runs: Vec<DataRun>,
    bytes_per_cluster: u32,
    /// Logical size of the stream; reads past this are truncated rather
    /// than serving allocated-but-unused trailing bytes.
    real_size: u64,
    /// Whether the backing attribute was found on a record whose `IN_USE`
    /// flag was set, as opposed to a deleted record walked only because
    /// `include_deleted_dirs` asked for it. The classifier uses this to
    /// tell a live `$INDEX_ALLOCATION` stream from one recovered off a
    /// deleted directory record.
    is_allocated: bool,
}

impl NonResidentStream {
    pub fn new(runs: Vec<DataRun>, bytes_per_cluster: u32, real_size: u64, is_allocated: bool) -> Self {
        Self { runs, bytes_per_cluster, real_size, is_allocated }
    }

    pub fn real_size(&self) -> u64 {
        self.real_size
    }

    pub fn is_allocated(&self) -> bool {
        self.is_allocated
    }

    /// Read the logical range `[start, start + len)`, clamped to
    /// `real_size`. Sparse regions are filled with zero bytes.
    pub fn read_range<R: Read + Seek>(
        &self,
        reader: &mut R,
        partition_offset: u64,
        start: u64,
        len: u64,
    ) -> io::Result<Vec<u8>> {
        let end = start.saturating_add(len).min(self.real_size);
        if start >= end {
            return Ok(Vec::new());
        }
        let mut out = vec![0u8; (end - start) as usize];

        let cluster_size = self.bytes_per_cluster as u64;
        let mut cluster_cursor = 0u64; // logical cluster index at start of current run

        for run in &self.runs {
            let run_start = cluster_cursor * cluster_size;
            let run_len_bytes = run.length_clusters * cluster_size;
            let run_end = run_start + run_len_bytes;
            cluster_cursor += run.length_clusters;

            if run_end <= start || run_start >= end {
                continue;
            }

            let overlap_start = run_start.max(start);
            let overlap_end = run_end.min(end);
            let out_slice = &mut out[(overlap_start - start) as usize..(overlap_end - start) as usize];

            if let Some(lcn) = run.lcn {
                let physical = partition_offset + lcn * cluster_size + (overlap_start - run_start);
                reader.seek(SeekFrom::Start(physical))?;
                reader.read_exact(out_slice)?;
            }
            // sparse run: leave zero-initialized
        }

        Ok(out)
    }

    /// Iterate the stream in fixed-size logical chunks, each clamped to
    /// `real_size` (the final chunk may be shorter).
    pub fn read_chunks<R: Read + Seek>(
        &self,
        reader: &mut R,
        partition_offset: u64,
        chunk_size: u32,
    ) -> io::Result<Vec<Vec<u8>>> {
        let mut chunks = Vec::new();
        let mut offset = 0u64;
        while offset < self.real_size {
            chunks.push(self.read_range(reader, partition_offset, offset, chunk_size as u64)?);
            offset += chunk_size as u64;
        }
        Ok(chunks)
    }
}

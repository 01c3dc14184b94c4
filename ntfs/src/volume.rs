//! Volume boot record (VBR) parsing and derived volume geometry.
//!
//! Layout grounded on the original tool's `BOOT_SECTOR` construct
//! (`ntfs.py`): the fields this carver needs sit at fixed offsets in the
//! first sector of the NTFS partition, independent of everything else in
//! the boot sector (boot code, OEM string, checksum).

use byteorder::{ByteOrder, LittleEndian};
use ntfscarve_core::CarveError;

const NTFS_MAGIC_OFFSET: usize = 3;
const NTFS_MAGIC: &[u8] = b"NTFS";

const BYTES_PER_SECTOR_OFFSET: usize = 0x0B;
const SECTORS_PER_CLUSTER_OFFSET: usize = 0x0D;
const MFT_CLUSTER_OFFSET: usize = 0x30;
const BYTES_OR_CLUSTERS_PER_RECORD_OFFSET: usize = 0x40;
const BYTES_OR_CLUSTERS_PER_INDEX_OFFSET: usize = 0x44;

/// Geometry derived from the VBR: the handful of numbers every later stage
/// of the pipeline needs to turn cluster/record numbers into byte offsets.
#[derive(Debug, Clone, Copy)]
pub struct VolumeGeometry {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub bytes_per_cluster: u32,
    pub bytes_per_mft_record: u32,
    pub bytes_per_index_record: u32,
    pub mft_start_cluster: u64,
    /// Byte offset of the NTFS partition within the image.
    pub partition_offset: u64,
}

impl VolumeGeometry {
    pub fn mft_byte_offset(&self) -> u64 {
        self.mft_start_cluster * self.bytes_per_cluster as u64 + self.partition_offset
    }
}

/// Decode the special `SecPerClusRaw` encoding: values 244..=255 mean
/// `2^(256-v)` sectors per cluster (used on volumes with tiny clusters).
fn decode_sectors_per_cluster(raw: u8) -> u32 {
    if raw >= 244 {
        1u32 << (256u32 - raw as u32)
    } else {
        raw as u32
    }
}

/// Decode the signed "bytes-or-clusters" encoding shared by
/// `BytsOrClusPerRec` and `BytsOrClusPerIndx`: positive means "this many
/// clusters", negative means "2^|v| bytes".
fn decode_signed_size(raw: i8, bytes_per_cluster: u32) -> u32 {
    if raw > 0 {
        raw as u32 * bytes_per_cluster
    } else {
        1u32 << raw.unsigned_abs()
    }
}

/// Parse the VBR at `partition_offset` within `boot_sector` (the first
/// `sector_size_bytes`-sized sector of the partition, exactly as read from
/// the image) and compute the derived geometry.
pub fn parse_boot_sector(
    boot_sector: &[u8],
    partition_offset: u64,
) -> Result<VolumeGeometry, CarveError> {
    if boot_sector.len() < 512 {
        return Err(CarveError::BadVolume("boot sector shorter than 512 bytes".into()));
    }
    if &boot_sector[NTFS_MAGIC_OFFSET..NTFS_MAGIC_OFFSET + NTFS_MAGIC.len()] != NTFS_MAGIC {
        return Err(CarveError::BadVolume("missing NTFS magic at offset 3".into()));
    }

    let bytes_per_sector = LittleEndian::read_u16(&boot_sector[BYTES_PER_SECTOR_OFFSET..]) as u32;
    let sectors_per_cluster = decode_sectors_per_cluster(boot_sector[SECTORS_PER_CLUSTER_OFFSET]);
    let bytes_per_cluster = bytes_per_sector * sectors_per_cluster;

    let mft_start_cluster = LittleEndian::read_u64(&boot_sector[MFT_CLUSTER_OFFSET..]);

    let bytes_or_clusters_per_record = boot_sector[BYTES_OR_CLUSTERS_PER_RECORD_OFFSET] as i8;
    let bytes_per_mft_record = decode_signed_size(bytes_or_clusters_per_record, bytes_per_cluster);

    let bytes_or_clusters_per_index = boot_sector[BYTES_OR_CLUSTERS_PER_INDEX_OFFSET] as i8;
    let bytes_per_index_record = decode_signed_size(bytes_or_clusters_per_index, bytes_per_cluster);

    Ok(VolumeGeometry {
        bytes_per_sector,
        sectors_per_cluster,
        bytes_per_cluster,
        bytes_per_mft_record,
        bytes_per_index_record,
        mft_start_cluster,
        partition_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_boot_sector(
        bytes_per_sector: u16,
        sec_per_clus_raw: u8,
        mft_cluster: u64,
        byts_or_clus_per_rec: i8,
        byts_or_clus_per_indx: i8,
    ) -> Vec<u8> {
        let mut bs = vec![0u8; 512];
        bs[3..7].copy_from_slice(b"NTFS");
        LittleEndian::write_u16(&mut bs[BYTES_PER_SECTOR_OFFSET..], bytes_per_sector);
        bs[SECTORS_PER_CLUSTER_OFFSET] = sec_per_clus_raw;
        LittleEndian::write_u64(&mut bs[MFT_CLUSTER_OFFSET..], mft_cluster);
        bs[BYTES_OR_CLUSTERS_PER_RECORD_OFFSET] = byts_or_clus_per_rec as u8;
        bs[BYTES_OR_CLUSTERS_PER_INDEX_OFFSET] = byts_or_clus_per_indx as u8;
        bs
    }

    #[test]
    fn rejects_missing_magic() {
        let bs = vec![0u8; 512];
        assert!(parse_boot_sector(&bs, 0).is_err());
    }

    #[test]
    fn special_sectors_per_cluster_encoding() {
        // SecPerClusRaw = 0xF0 (244) -> 2^(256-244) = 4096
        let bs = make_boot_sector(512, 0xF0, 4, -10, -12);
        let geometry = parse_boot_sector(&bs, 0).unwrap();
        assert_eq!(geometry.sectors_per_cluster, 4096);
    }

    #[test]
    fn negative_bytes_per_record_is_power_of_two() {
        let bs = make_boot_sector(512, 8, 4, -10, -12);
        let geometry = parse_boot_sector(&bs, 0).unwrap();
        assert_eq!(geometry.bytes_per_mft_record, 1024);
    }

    #[test]
    fn positive_bytes_per_record_is_clusters_times_cluster_size() {
        let bs = make_boot_sector(512, 8, 4, 2, -12);
        let geometry = parse_boot_sector(&bs, 0).unwrap();
        // 2 clusters * (512 * 8) bytes per cluster
        assert_eq!(geometry.bytes_per_mft_record, 2 * 512 * 8);
    }

    #[test]
    fn mft_byte_offset_includes_partition_offset() {
        let bs = make_boot_sector(512, 8, 4, -10, -12);
        let geometry = parse_boot_sector(&bs, 1_048_576).unwrap();
        assert_eq!(geometry.mft_byte_offset(), 4 * (512 * 8) as u64 + 1_048_576);
    }
}

/// Runtime configuration for a carving run, assembled by the CLI from parsed
/// flags and passed by value into the pipeline. Intentionally holds no
/// handles or caches — those are owned by the run itself (see DESIGN.md).
#[derive(Debug, Clone)]
pub struct CarveConfig {
    /// Prefix prepended to every resolved path.
    pub mount_point: String,
    /// Offset of the NTFS partition within the image, in sectors.
    pub partition_offset_sectors: u64,
    /// Sector size of the underlying device, in bytes.
    pub sector_size_bytes: u32,
    /// Whether directory records with IN_USE=0 still contribute their
    /// `$INDEX_ALLOCATION` attributes to the traversal.
    pub include_deleted_dirs: bool,
    /// Emit only slack entries that are absent from (or disagree with) the
    /// live directory listing.
    pub slack_only: bool,
    /// Emit only entries whose file reference does not resolve to a live
    /// MFT record (mirrors the original tool's `--deleted-only`).
    pub deleted_only: bool,
    /// Inclusive `(low, high)` bound on the high byte of a carved FILETIME
    /// field, used by the slack carver's plausibility window. Exposed as a
    /// parameter rather than a compile-time constant per the design notes.
    pub carve_date_window: (u8, u8),
}

impl Default for CarveConfig {
    fn default() -> Self {
        Self {
            mount_point: String::new(),
            partition_offset_sectors: 0,
            sector_size_bytes: 512,
            include_deleted_dirs: false,
            slack_only: false,
            deleted_only: false,
            carve_date_window: (0xBC, 0xDC),
        }
    }
}

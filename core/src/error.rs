use thiserror::Error;

/// Top-level error taxonomy for the carving pipeline.
///
/// `BadVolume` and `BadFirstRecord` are fatal and propagate to the driver.
/// Everything else is contained to the smallest unit (attribute, record,
/// entry) that can sensibly handle it and is never expected to reach a CLI
/// caller directly.
#[derive(Debug, Error)]
pub enum CarveError {
    #[error("boot sector is not a valid NTFS VBR: {0}")]
    BadVolume(String),

    #[error("first MFT record is invalid or failed fixup")]
    BadFirstRecord,

    #[error("MFT or index record is corrupt: {0}")]
    CorruptRecord(String),

    #[error("non-resident attribute has zero allocated or real size")]
    EmptyNonResident,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type CarveResult<T> = std::result::Result<T, CarveError>;

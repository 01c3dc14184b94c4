/// Namespace tag on a `$FILE_NAME` attribute.
///
/// Priority for path resolution (highest wins) is WIN32 > POSIX > WIN32_DOS > DOS,
/// per the distilled spec; note this is *not* the same ordering as the raw
/// numeric values below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Posix,
    Win32,
    Dos,
    Win32AndDos,
}

impl Namespace {
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Namespace::Posix),
            1 => Some(Namespace::Win32),
            2 => Some(Namespace::Dos),
            3 => Some(Namespace::Win32AndDos),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            Namespace::Posix => 0,
            Namespace::Win32 => 1,
            Namespace::Dos => 2,
            Namespace::Win32AndDos => 3,
        }
    }

    /// Higher value wins when a record carries more than one filename attribute.
    pub fn priority(self) -> u8 {
        match self {
            Namespace::Win32 => 3,
            Namespace::Posix => 2,
            Namespace::Win32AndDos => 1,
            Namespace::Dos => 0,
        }
    }
}

/// `$FILE_NAME` attribute flags (also reused as the entry-decorated output flags).
///
/// A thin wrapper over the raw `u32` rather than a `bitflags!` type, matching
/// the plain bitmask-constant style the rest of this corpus uses for on-disk
/// attribute bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileAttributeFlags(pub u32);

impl FileAttributeFlags {
    pub const READ_ONLY: u32 = 0x0000_0001;
    pub const HIDDEN: u32 = 0x0000_0002;
    pub const SYSTEM: u32 = 0x0000_0004;
    pub const ARCHIVE: u32 = 0x0000_0020;
    pub const DEVICE: u32 = 0x0000_0040;
    pub const NORMAL: u32 = 0x0000_0080;
    pub const TEMPORARY: u32 = 0x0000_0100;
    pub const SPARSE: u32 = 0x0000_0200;
    pub const REPARSE_POINT: u32 = 0x0000_0400;
    pub const COMPRESSED: u32 = 0x0000_0800;
    pub const OFFLINE: u32 = 0x0000_1000;
    pub const NOT_CONTENT_INDEXED: u32 = 0x0000_2000;
    pub const ENCRYPTED: u32 = 0x0000_4000;
    pub const VIRTUAL: u32 = 0x0001_0000;
    pub const DIRECTORY: u32 = 0x1000_0000;
    pub const INDEX_VIEW: u32 = 0x2000_0000;

    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    /// Human-readable `FLAG|FLAG` list, in declaration order, for output formatting.
    pub fn to_pipe_list(self) -> String {
        const NAMES: &[(u32, &str)] = &[
            (FileAttributeFlags::READ_ONLY, "READ_ONLY"),
            (FileAttributeFlags::HIDDEN, "HIDDEN"),
            (FileAttributeFlags::SYSTEM, "SYSTEM"),
            (FileAttributeFlags::ARCHIVE, "ARCHIVE"),
            (FileAttributeFlags::DEVICE, "DEVICE"),
            (FileAttributeFlags::NORMAL, "NORMAL"),
            (FileAttributeFlags::TEMPORARY, "TEMPORARY"),
            (FileAttributeFlags::SPARSE, "SPARSE"),
            (FileAttributeFlags::REPARSE_POINT, "REPARSE_POINT"),
            (FileAttributeFlags::COMPRESSED, "COMPRESSED"),
            (FileAttributeFlags::OFFLINE, "OFFLINE"),
            (FileAttributeFlags::NOT_CONTENT_INDEXED, "NOT_CONTENT_INDEXED"),
            (FileAttributeFlags::ENCRYPTED, "ENCRYPTED"),
            (FileAttributeFlags::VIRTUAL, "VIRTUAL"),
            (FileAttributeFlags::DIRECTORY, "DIRECTORY"),
            (FileAttributeFlags::INDEX_VIEW, "INDEX_VIEW"),
        ];
        NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// MFT record header flags (distinct bit space from `FileAttributeFlags`).
pub mod record_flags {
    pub const IN_USE: u16 = 0x01;
    pub const DIRECTORY: u16 = 0x02;
}

/// `$INDEX_ALLOCATION` entry flags.
pub mod entry_flags {
    pub const POINTS_TO_SUBNODE: u16 = 0x01;
    pub const LAST_ENTRY: u16 = 0x02;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_priority_prefers_win32_dos_over_dos() {
        // when both DOS (namespace=2) and WIN32_DOS (namespace=3) exist,
        // the resolver should pick namespace=3 (Win32AndDos)
        let dos = Namespace::from_raw(2).unwrap();
        let win32_dos = Namespace::from_raw(3).unwrap();
        assert!(win32_dos.priority() > dos.priority());
    }

    #[test]
    fn pipe_list_formats_multiple_flags() {
        let flags = FileAttributeFlags(FileAttributeFlags::HIDDEN | FileAttributeFlags::SYSTEM);
        assert_eq!(flags.to_pipe_list(), "HIDDEN|SYSTEM");
    }
}

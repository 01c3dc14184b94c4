//! Shared update-sequence-array fixup, used by both MFT records and index
//! records: both are protected by the same multi-sector-transfer scheme,
//! just with a different magic and a header of different length in front
//! of the update sequence array.

use byteorder::{ByteOrder, LittleEndian};
use ntfscarve_core::CarveError;

pub fn check_signature(bytes: &[u8], signature: &[u8]) -> Result<(), CarveError> {
    if bytes.len() < signature.len() || &bytes[..signature.len()] != signature {
        return Err(CarveError::CorruptRecord(format!(
            "missing {} signature",
            String::from_utf8_lossy(signature)
        )));
    }
    Ok(())
}

/// Restore the original per-sector tail bytes and verify the update
/// sequence number, mutating `bytes` in place.
pub fn apply_fixup(bytes: &mut [u8], usa_offset: usize, usa_count: usize) -> Result<(), CarveError> {
    if usa_count == 0 {
        return Ok(());
    }
    if usa_offset + usa_count * 2 > bytes.len() {
        return Err(CarveError::CorruptRecord("update sequence array out of bounds".into()));
    }

    let usn = LittleEndian::read_u16(&bytes[usa_offset..]);
    let originals: Vec<u16> = (1..usa_count)
        .map(|i| LittleEndian::read_u16(&bytes[usa_offset + i * 2..]))
        .collect();

    // Verify every sector tail before writing any of them back: a mismatch
    // on a later sector must leave earlier sectors untouched.
    let mut sector_ends = Vec::with_capacity(originals.len());
    for sector_index in 0..originals.len() {
        let sector_end = (sector_index + 1) * 512;
        if sector_end > bytes.len() {
            break;
        }
        if LittleEndian::read_u16(&bytes[sector_end - 2..sector_end]) != usn {
            return Err(CarveError::CorruptRecord("update sequence number mismatch".into()));
        }
        sector_ends.push(sector_end);
    }

    for (&sector_end, &original) in sector_ends.iter().zip(originals.iter()) {
        LittleEndian::write_u16(&mut bytes[sector_end - 2..sector_end], original);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_sector_tails() {
        let mut bytes = vec![0u8; 1024];
        LittleEndian::write_u16(&mut bytes[8..], 0x0005);
        LittleEndian::write_u16(&mut bytes[10..], 0xCAFE);
        LittleEndian::write_u16(&mut bytes[510..], 0x0005);
        LittleEndian::write_u16(&mut bytes[1022..], 0x0005);
        apply_fixup(&mut bytes, 8, 2).unwrap();
        assert_eq!(LittleEndian::read_u16(&bytes[510..]), 0xCAFE);
    }

    #[test]
    fn detects_mismatch() {
        let mut bytes = vec![0u8; 1024];
        LittleEndian::write_u16(&mut bytes[8..], 0x0005);
        LittleEndian::write_u16(&mut bytes[10..], 0xCAFE);
        LittleEndian::write_u16(&mut bytes[510..], 0x9999);
        assert!(apply_fixup(&mut bytes, 8, 2).is_err());
    }

    #[test]
    fn mismatch_on_later_sector_leaves_earlier_sector_untouched() {
        let mut bytes = vec![0u8; 1536];
        LittleEndian::write_u16(&mut bytes[8..], 0x0005); // USN
        LittleEndian::write_u16(&mut bytes[10..], 0xAAAA); // original tail, sector 1
        LittleEndian::write_u16(&mut bytes[12..], 0xBBBB); // original tail, sector 2
        LittleEndian::write_u16(&mut bytes[510..], 0x0005); // sector 1 tail matches USN
        LittleEndian::write_u16(&mut bytes[1022..], 0x9999); // sector 2 tail does not

        assert!(apply_fixup(&mut bytes, 8, 3).is_err());
        // sector 1's tail must still read the USN, not the restored original,
        // since the record as a whole failed fixup.
        assert_eq!(LittleEndian::read_u16(&bytes[510..]), 0x0005);
    }
}

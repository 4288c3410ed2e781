use quarry_error::{QuarryResult, quarry_bail};

use crate::{FOOTER_SIZE, MAGIC_BYTES, MAX_METADATA_SIZE, VERSION};

/// The fixed-size record at the very end of a file, locating the trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub metadata_offset: u64,
    pub metadata_length: u32,
    pub version: u16,
    /// Reserved, always zero.
    pub flags: u16,
}

impl Footer {
    pub fn new(metadata_offset: u64, metadata_length: u32) -> Self {
        Self {
            metadata_offset,
            metadata_length,
            version: VERSION,
            flags: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; FOOTER_SIZE] {
        let mut footer = [0u8; FOOTER_SIZE];
        footer[0..8].copy_from_slice(&self.metadata_offset.to_le_bytes());
        footer[8..12].copy_from_slice(&self.metadata_length.to_le_bytes());
        footer[12..14].copy_from_slice(&self.version.to_le_bytes());
        footer[14..16].copy_from_slice(&self.flags.to_le_bytes());
        footer[16..20].copy_from_slice(&MAGIC_BYTES);
        footer
    }

    /// Parse the last [`FOOTER_SIZE`] bytes of a file of `file_size` bytes.
    pub fn parse(bytes: &[u8], file_size: u64) -> QuarryResult<Self> {
        if bytes.len() != FOOTER_SIZE {
            quarry_bail!(
                FormatError: "expected a {} byte footer, found {} bytes",
                FOOTER_SIZE,
                bytes.len()
            );
        }
        if bytes[16..20] != MAGIC_BYTES {
            quarry_bail!(FormatError: "bad magic {:?}, not a Quarry file", &bytes[16..20]);
        }

        let mut offset = [0u8; 8];
        offset.copy_from_slice(&bytes[0..8]);
        let mut length = [0u8; 4];
        length.copy_from_slice(&bytes[8..12]);
        let footer = Self {
            metadata_offset: u64::from_le_bytes(offset),
            metadata_length: u32::from_le_bytes(length),
            version: u16::from_le_bytes([bytes[12], bytes[13]]),
            flags: u16::from_le_bytes([bytes[14], bytes[15]]),
        };

        if footer.version != VERSION {
            quarry_bail!(FormatError: "unsupported file version {}", footer.version);
        }
        if footer.metadata_length > MAX_METADATA_SIZE {
            quarry_bail!(
                FormatError: "trailer of {} bytes exceeds the maximum of {}",
                footer.metadata_length,
                MAX_METADATA_SIZE
            );
        }
        let trailer_end = footer
            .metadata_offset
            .checked_add(u64::from(footer.metadata_length));
        if footer.metadata_offset < MAGIC_BYTES.len() as u64
            || trailer_end != Some(file_size.saturating_sub(FOOTER_SIZE as u64))
        {
            quarry_bail!(
                FormatError: "trailer at {}+{} is outside the {} byte file",
                footer.metadata_offset,
                footer.metadata_length,
                file_size
            );
        }
        Ok(footer)
    }
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;

    use super::*;

    #[test]
    fn layout() {
        let bytes = Footer::new(100, 42).to_bytes();
        assert_eq!(&bytes[16..], b"QRYF");
        assert_eq!(Footer::parse(&bytes, 162).unwrap(), Footer::new(100, 42));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Footer::new(100, 42).to_bytes();
        bytes[19] = b'X';
        assert_eq!(Footer::parse(&bytes, 162).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn rejects_out_of_range_trailer() {
        let bytes = Footer::new(100, 42).to_bytes();
        assert_eq!(Footer::parse(&bytes, 120).unwrap_err().kind(), ErrorKind::Format);
        let bytes = Footer::new(u64::MAX, 42).to_bytes();
        assert_eq!(Footer::parse(&bytes, 162).unwrap_err().kind(), ErrorKind::Format);
    }
}

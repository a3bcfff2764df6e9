//! `BCFS` sector filesystem.
//!
//! The uncompressed buffer is cut into `0x1000`-byte sectors. A sector
//! whose first little-endian `u32` equals `2` is a directory entry:
//!
//! | offset | field                                      |
//! |-------:|--------------------------------------------|
//! |      4 | NUL-terminated file name                   |
//! |   0x8C | `u32` file length                          |
//! |   0x94 | `u32` sector indices, terminated by zero   |
//!
//! A file's content is the referenced sectors concatenated in order and
//! truncated to the stored length.

use std::collections::HashMap;

use super::GpxError;

const BCFS_MAGIC: [u8; 4] = *b"BCFS";
const SECTOR_SIZE: usize = 0x1000;

/// The named blobs extracted from a `BCFS` buffer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Filesystem {
    files: HashMap<String, Vec<u8>>,
}

impl Filesystem {
    /// Parses the sector directory of an uncompressed `BCFS` buffer.
    pub fn parse(data: &[u8]) -> Result<Self, GpxError> {
        if data.len() < 4 {
            return Err(GpxError::TruncatedHeader(data.len()));
        }
        let magic: [u8; 4] = data[0..4].try_into().expect("sliced four bytes");
        if magic != BCFS_MAGIC {
            return Err(GpxError::BadMagic {
                expected: BCFS_MAGIC,
                found: magic,
            });
        }
        let data = &data[4..];

        let getint = |pos: usize| -> Option<u32> {
            data.get(pos..pos + 4)
                .map(|b| u32::from_le_bytes(b.try_into().expect("sliced four bytes")))
        };

        let mut files = HashMap::new();

        let mut offset = 0;
        while offset + SECTOR_SIZE + 3 < data.len() {
            if getint(offset) == Some(2) {
                let name: String = data[offset + 4..]
                    .iter()
                    .take_while(|&&b| b != 0)
                    .map(|&b| b as char)
                    .collect();
                let size = getint(offset + 0x8C).unwrap_or(0) as usize;

                let blocks_offset = offset + 0x94;
                let mut content = Vec::with_capacity(size);
                let mut block_count = 0;
                loop {
                    let block_id = getint(blocks_offset + 4 * block_count).unwrap_or(0) as usize;
                    if block_id == 0 {
                        break;
                    }
                    let start = block_id * SECTOR_SIZE;
                    let end = (start + SECTOR_SIZE).min(data.len());
                    if start >= data.len() {
                        return Err(GpxError::LengthNotReachable {
                            declared: size,
                            produced: content.len(),
                        });
                    }
                    content.extend_from_slice(&data[start..end]);
                    block_count += 1;
                }
                content.truncate(size);
                files.insert(name, content);
            }
            offset += SECTOR_SIZE;
        }

        Ok(Self { files })
    }

    /// Looks up a blob by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// The stored file names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory_sector(name: &str, size: u32, blocks: &[u32]) -> Vec<u8> {
        let mut sector = vec![0u8; SECTOR_SIZE];
        sector[0..4].copy_from_slice(&2u32.to_le_bytes());
        sector[4..4 + name.len()].copy_from_slice(name.as_bytes());
        sector[0x8C..0x90].copy_from_slice(&size.to_le_bytes());
        for (i, block) in blocks.iter().enumerate() {
            let at = 0x94 + 4 * i;
            sector[at..at + 4].copy_from_slice(&block.to_le_bytes());
        }
        sector
    }

    #[test]
    fn single_file_across_two_sectors() {
        let mut data = b"BCFS".to_vec();
        data.extend_from_slice(&directory_sector("score.gpif", 0x1004, &[1, 2]));
        data.extend_from_slice(&vec![0xAA; SECTOR_SIZE]);
        data.extend_from_slice(&vec![0xBB; SECTOR_SIZE]);
        // Trailing slack so the final sector is visible to the scan.
        data.extend_from_slice(&[0u8; 8]);

        let fs = Filesystem::parse(&data).unwrap();
        let content = fs.get("score.gpif").unwrap();
        assert_eq!(content.len(), 0x1004);
        assert!(content[..SECTOR_SIZE].iter().all(|&b| b == 0xAA));
        assert!(content[SECTOR_SIZE..].iter().all(|&b| b == 0xBB));
    }

    #[test]
    fn truncates_to_stored_length() {
        let mut data = b"BCFS".to_vec();
        data.extend_from_slice(&directory_sector("small.bin", 5, &[1]));
        let mut payload = vec![0u8; SECTOR_SIZE];
        payload[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data.extend_from_slice(&payload);
        data.extend_from_slice(&[0u8; 8]);

        let fs = Filesystem::parse(&data).unwrap();
        assert_eq!(fs.get("small.bin").unwrap(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn wrong_magic_is_fatal() {
        assert!(matches!(
            Filesystem::parse(b"BCFZxxxx").unwrap_err(),
            GpxError::BadMagic { .. }
        ));
    }

    #[test]
    fn missing_sector_chain_is_fatal() {
        let mut data = b"BCFS".to_vec();
        data.extend_from_slice(&directory_sector("gone.bin", 10, &[7]));
        data.extend_from_slice(&[0u8; 8]);
        assert!(matches!(
            Filesystem::parse(&data).unwrap_err(),
            GpxError::LengthNotReachable { .. }
        ));
    }
}

//! PSARC bundle reading and writing.
//!
//! The 32-byte big-endian header is followed by the encrypted table of
//! contents: 30-byte entry records (path digest, z-index, packed 40-bit
//! length and offset) and the shared array of 16-bit compressed block
//! lengths. Entry payloads are chains of `0x10000`-byte blocks, each kept
//! raw or zlib-compressed, whichever is smaller. The first entry is the
//! nameless manifest listing every other entry's path in reverse-sorted
//! order.

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian as BE, ReadBytesExt, WriteBytesExt};
use log::info;
use md5::{Digest, Md5};

use super::PsarcError;
use super::crypto::{self, MAC_KEY, PC_KEY};

/// `PSAR`.
pub const MAGIC: [u8; 4] = *b"PSAR";
/// Format version of the target game revision.
pub const VERSION: u32 = 0x0001_0004;
/// Compression tag.
pub const COMPRESSION: [u8; 4] = *b"zlib";
/// Bytes per TOC entry record.
pub const ENTRY_SIZE: u32 = 30;
/// Bytes per payload block.
pub const BLOCK_SIZE: usize = 65536;
/// Archive flag word.
pub const ARCHIVE_FLAGS: u32 = 4;

/// One table-of-contents entry, with its slice of the block-length array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Path inside the archive; empty for the manifest entry.
    pub filepath: String,
    /// MD5 of the path (zero for the manifest).
    pub md5: [u8; 16],
    /// Index of the entry's first block length.
    pub zindex: u32,
    /// Total uncompressed length.
    pub length: u64,
    /// Absolute file offset of the first block.
    pub offset: u64,
    /// Block lengths from `zindex` to the end of the shared array.
    pub zlengths: Vec<u16>,
}

/// Reads the table of contents and resolves entry paths.
///
/// Returns the payload entries; the manifest entry is consumed to name
/// them.
pub fn read_toc<R: Read + Seek>(reader: &mut R) -> Result<Vec<Entry>, PsarcError> {
    reader.seek(SeekFrom::Start(0))?;

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(PsarcError::BadMagic(magic));
    }
    let _version = reader.read_u32::<BE>()?;
    let mut compression = [0u8; 4];
    reader.read_exact(&mut compression)?;
    let toc_size = reader.read_u32::<BE>()? as usize;
    let entry_size = reader.read_u32::<BE>()?;
    let n_entries = reader.read_u32::<BE>()? as usize;
    let _block_size = reader.read_u32::<BE>()?;
    let _archive_flags = reader.read_u32::<BE>()?;

    if entry_size != ENTRY_SIZE {
        return Err(PsarcError::Malformed(format!(
            "entry size {entry_size}, expected {ENTRY_SIZE}"
        )));
    }
    if toc_size < 32 + ENTRY_SIZE as usize * n_entries {
        return Err(PsarcError::Malformed("toc smaller than its entries".into()));
    }

    let mut encrypted = vec![0u8; toc_size - 32];
    reader.read_exact(&mut encrypted)?;
    let toc = crypto::toc_decrypt(&encrypted);

    let mut cursor = std::io::Cursor::new(&toc);
    let mut entries = Vec::with_capacity(n_entries);
    for _ in 0..n_entries {
        let mut md5 = [0u8; 16];
        cursor.read_exact(&mut md5)?;
        let zindex = cursor.read_u32::<BE>()?;
        let length = cursor.read_uint::<BE>(5)?;
        let offset = cursor.read_uint::<BE>(5)?;
        entries.push(Entry {
            filepath: String::new(),
            md5,
            zindex,
            length,
            offset,
            zlengths: Vec::new(),
        });
    }

    let n_zlengths = (toc_size - 32 - ENTRY_SIZE as usize * n_entries) / 2;
    let mut zlengths = Vec::with_capacity(n_zlengths);
    for _ in 0..n_zlengths {
        zlengths.push(cursor.read_u16::<BE>()?);
    }
    for entry in &mut entries {
        let start = entry.zindex as usize;
        if start > zlengths.len() {
            return Err(PsarcError::Malformed(format!(
                "z-index {start} past {} block lengths",
                zlengths.len()
            )));
        }
        entry.zlengths = zlengths[start..].to_vec();
    }

    if entries.is_empty() {
        return Ok(entries);
    }

    // The first entry holds the reverse-sorted path list for the rest.
    let manifest = read_entry(reader, &entries[0])?;
    let filepaths = String::from_utf8_lossy(&manifest).into_owned();
    let mut rest = entries.split_off(1);
    for (entry, filepath) in rest.iter_mut().zip(filepaths.split_whitespace()) {
        entry.filepath = filepath.to_string();
    }
    Ok(rest)
}

/// Reads and reassembles one entry's payload, decrypting platform SNG
/// entries along the way.
pub fn read_entry<R: Read + Seek>(reader: &mut R, entry: &Entry) -> Result<Vec<u8>, PsarcError> {
    let mut data: Vec<u8> = Vec::with_capacity(entry.length as usize);
    reader.seek(SeekFrom::Start(entry.offset))?;

    let mut i = 0;
    while (data.len() as u64) < entry.length {
        let zlength = entry.zlengths.get(i).copied().ok_or_else(|| {
            PsarcError::Malformed(format!("block chain of {} ran dry", entry.filepath))
        })?;
        if zlength == 0 {
            let mut block = vec![0u8; BLOCK_SIZE];
            let got = read_up_to(reader, &mut block)?;
            block.truncate(got);
            data.extend_from_slice(&block);
        } else {
            let mut chunk = vec![0u8; zlength as usize];
            reader.read_exact(&mut chunk)?;
            // A block that does not inflate was stored raw.
            match crypto::inflate(&chunk) {
                Ok(block) => data.extend_from_slice(&block),
                Err(_) => data.extend_from_slice(&chunk),
            }
        }
        i += 1;
    }
    data.truncate(entry.length as usize);

    if entry.filepath.contains("songs/bin/macos/") {
        data = crypto::decrypt_sng(&data, &MAC_KEY);
    } else if entry.filepath.contains("songs/bin/generic/") {
        data = crypto::decrypt_sng(&data, &PC_KEY);
    }

    Ok(data)
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let got = reader.read(&mut buf[filled..])?;
        if got == 0 {
            break;
        }
        filled += got;
    }
    Ok(filled)
}

struct BuiltEntry {
    filepath: String,
    md5: [u8; 16],
    zlengths: Vec<u16>,
    length: u64,
    blocks: Vec<u8>,
}

/// Chunks one file into its block chain, encrypting platform SNG entries
/// first.
fn build_entry(name: &str, data: &[u8]) -> BuiltEntry {
    let data = if name.contains("songs/bin/macos/") {
        crypto::encrypt_sng(data, &MAC_KEY)
    } else if name.contains("songs/bin/generic/") {
        crypto::encrypt_sng(data, &PC_KEY)
    } else {
        data.to_vec()
    };

    let mut zlengths = Vec::new();
    let mut blocks = Vec::new();
    for raw in data.chunks(BLOCK_SIZE) {
        let compressed = crypto::deflate(raw);
        if compressed.len() < raw.len() {
            zlengths.push(compressed.len() as u16);
            blocks.extend_from_slice(&compressed);
        } else {
            zlengths.push((raw.len() % BLOCK_SIZE) as u16);
            blocks.extend_from_slice(raw);
        }
    }

    BuiltEntry {
        filepath: name.to_string(),
        md5: if name.is_empty() {
            [0u8; 16]
        } else {
            Md5::digest(name.as_bytes()).into()
        },
        zlengths,
        length: data.len() as u64,
        blocks,
    }
}

/// An in-memory archive about to be written, or freshly unpacked.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Archive {
    /// Path → content.
    pub files: HashMap<String, Vec<u8>>,
}

impl Archive {
    /// Reads a whole archive into memory.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, PsarcError> {
        let mut files = HashMap::new();
        for entry in read_toc(reader)? {
            let data = read_entry(reader, &entry)?;
            files.insert(entry.filepath, data);
        }
        Ok(Self { files })
    }

    /// Writes the archive: encrypted TOC first, then every block chain.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), PsarcError> {
        let mut names: Vec<&str> = self.files.keys().map(String::as_str).collect();
        names.sort_unstable();
        names.reverse();

        let manifest = names.join("\n");
        let mut entries = vec![build_entry("", manifest.as_bytes())];
        for &name in &names {
            entries.push(build_entry(name, &self.files[name]));
        }

        let mut zlengths: Vec<u16> = Vec::new();
        let mut offsets = Vec::with_capacity(entries.len());
        let mut zindices = Vec::with_capacity(entries.len());
        let mut offset = 0u64;
        for entry in &entries {
            offsets.push(offset);
            offset += entry.blocks.len() as u64;
            zindices.push(zlengths.len() as u32);
            zlengths.extend_from_slice(&entry.zlengths);
        }

        let toc_size = 32 + ENTRY_SIZE as usize * entries.len() + 2 * zlengths.len();

        let mut header = Vec::with_capacity(32);
        header.extend_from_slice(&MAGIC);
        header.write_u32::<BE>(VERSION)?;
        header.extend_from_slice(&COMPRESSION);
        header.write_u32::<BE>(toc_size as u32)?;
        header.write_u32::<BE>(ENTRY_SIZE)?;
        header.write_u32::<BE>(entries.len() as u32)?;
        header.write_u32::<BE>(BLOCK_SIZE as u32)?;
        header.write_u32::<BE>(ARCHIVE_FLAGS)?;

        let mut toc = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            toc.extend_from_slice(&entry.md5);
            toc.write_u32::<BE>(zindices[i])?;
            toc.extend_from_slice(&entry.length.to_be_bytes()[3..]);
            toc.extend_from_slice(&(offsets[i] + toc_size as u64).to_be_bytes()[3..]);
        }
        for &zlength in &zlengths {
            toc.write_u16::<BE>(zlength)?;
        }

        // Official archives store the TOC unpadded; the encrypted stream
        // is cut back to the stored size.
        let encrypted = crypto::toc_encrypt(&toc);
        writer.write_all(&header)?;
        writer.write_all(&encrypted[..toc_size - 32])?;

        for entry in &entries {
            writer.write_all(&entry.blocks)?;
        }
        Ok(())
    }
}

/// Extracts an archive file into a directory named after it.
pub fn unpack(path: &Path) -> Result<PathBuf, PsarcError> {
    let mut file = fs::File::open(path)?;
    let stem = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let basepath = path.with_file_name(stem.trim_end_matches(".psarc"));

    let mut reader = std::io::BufReader::new(&mut file);
    let entries = read_toc(&mut reader)?;
    info!("extracting {} entries from {}", entries.len(), path.display());

    for entry in &entries {
        let data = read_entry(&mut reader, entry)?;
        let target = basepath.join(&entry.filepath);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, data)?;
    }
    Ok(basepath)
}

/// Packs a directory into `<dir>.psarc`.
pub fn pack(dir: &Path) -> Result<PathBuf, PsarcError> {
    let mut archive = Archive::default();
    collect_files(dir, dir, &mut archive.files)?;
    info!("packing {} files from {}", archive.files.len(), dir.display());

    let out_path = dir.with_extension("psarc");
    let mut out = std::io::BufWriter::new(fs::File::create(&out_path)?);
    archive.write(&mut out)?;
    Ok(out_path)
}

fn collect_files(
    root: &Path,
    dir: &Path,
    files: &mut HashMap<String, Vec<u8>>,
) -> Result<(), PsarcError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else {
            let name = path
                .strip_prefix(root)
                .map_err(|_| PsarcError::Malformed("file outside pack root".into()))?
                .to_string_lossy()
                .replace('\\', "/");
            files.insert(name, fs::read(&path)?);
        }
    }
    Ok(())
}

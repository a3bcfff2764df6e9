//! PC ↔ Mac package conversion.
//!
//! The two platforms differ only in path conventions and the SNG payload
//! key: `audio/mac` ↔ `audio/windows`, `bin/macos` ↔ `bin/generic`, and
//! inside the aggregate graph the `macos` ↔ `dx9` tags. The file-name
//! suffix `_m`/`_p` selects the direction.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use super::archive::Archive;
use super::PsarcError;

/// Swaps the platform path conventions in one archive path or payload.
#[must_use]
pub fn change_path(data: &str, osx_to_pc: bool) -> String {
    if osx_to_pc {
        data.replace("audio/mac", "audio/windows")
            .replace("bin/macos", "bin/generic")
    } else {
        data.replace("audio/windows", "audio/mac")
            .replace("bin/generic", "bin/macos")
    }
}

/// Converts a package between the PC and Mac platforms, writing the
/// sibling file with the flipped `_m`/`_p` suffix.
pub fn convert_platform(path: &Path) -> Result<PathBuf, PsarcError> {
    let name = path.to_string_lossy();
    let (out_name, osx_to_pc) = if name.ends_with("_m.psarc") {
        (name.replace("_m.psarc", "_p.psarc"), true)
    } else {
        (name.replace("_p.psarc", "_m.psarc"), false)
    };
    info!("converting {name} -> {out_name}");

    let mut file = std::io::BufReader::new(fs::File::open(path)?);
    let archive = Archive::read(&mut file)?;

    let mut converted = Archive::default();
    for (filepath, mut data) in archive.files {
        if filepath.ends_with("aggregategraph.nt") {
            let text = String::from_utf8_lossy(&data).into_owned();
            let text = change_path(&text, osx_to_pc);
            data = if osx_to_pc {
                text.replace("macos", "dx9")
            } else {
                text.replace("dx9", "macos")
            }
            .into_bytes();
        }
        converted.files.insert(change_path(&filepath, osx_to_pc), data);
    }

    let out_path = PathBuf::from(out_name);
    let mut out = std::io::BufWriter::new(fs::File::create(&out_path)?);
    converted.write(&mut out)?;
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn path_flip_is_an_involution() {
        let mac = "songs/bin/macos/x.sng audio/mac/y.wem";
        let pc = change_path(mac, true);
        assert_eq!(pc, "songs/bin/generic/x.sng audio/windows/y.wem");
        assert_eq!(change_path(&pc, false), mac);
    }
}

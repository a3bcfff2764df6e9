//! Aggregate-graph N-triples output.
//!
//! Every asset in a package directory gets a UUIDv3 (URL namespace) node
//! with canonical-path, name, relpath and per-extension tag triples;
//! sng/xml/dds/bnk assets additionally carry llid and logical-path
//! triples with the platform directory stripped.

use std::io;
use std::path::Path;

use uuid::Uuid;

/// Tags emitted per file extension.
const TAGS: [(&str, &[&str]); 7] = [
    (".json", &["database", "json-db"]),
    (".hsan", &["database", "hsan-db"]),
    (".xblock", &["emergent-world", "x-world"]),
    (".sng", &["application", "macos", "musicgame-song"]),
    (".xml", &["application", "xml"]),
    (".dds", &["dds", "image"]),
    (".bnk", &["audio", "macos", "wwise-sound-bank"]),
];

/// Extensions that also carry llid/logpath triples.
const LLID_EXTENSIONS: [&str; 4] = [".sng", ".xml", ".dds", ".bnk"];

fn triples_for(locpath: &str, file_name: &str) -> Option<String> {
    let dot = file_name.rfind('.')?;
    let (fname, ext) = file_name.split_at(dot);
    let tags = TAGS.iter().find(|(e, _)| *e == ext).map(|(_, t)| *t)?;

    let fullpath = format!("{locpath}/{file_name}");
    let uid = Uuid::new_v3(&Uuid::NAMESPACE_URL, fullpath.as_bytes());

    let mut out = format!(
        "<urn:uuid:{uid}> <http://emergent.net/aweb/1.0/canonical> \"{locpath}\".\n\
         <urn:uuid:{uid}> <http://emergent.net/aweb/1.0/name> \"{fname}\".\n\
         <urn:uuid:{uid}> <http://emergent.net/aweb/1.0/relpath> \"{fullpath}\".\n"
    );
    for tag in tags {
        out.push_str(&format!(
            "<urn:uuid:{uid}> <http://emergent.net/aweb/1.0/tag> \"{tag}\".\n"
        ));
    }
    if LLID_EXTENSIONS.contains(&ext) {
        let llid = format!("{}-0000-0000-0000-000000000000", &uid.to_string()[..8]);
        let logpath = fullpath.replace("macos/", "").replace("mac/", "");
        out.push_str(&format!(
            "<urn:uuid:{uid}> <http://emergent.net/aweb/1.0/llid> \"{llid}\".\n\
             <urn:uuid:{uid}> <http://emergent.net/aweb/1.0/logpath> \"{logpath}\".\n"
        ));
    }
    Some(out)
}

fn walk(root: &Path, dir: &Path, output: &mut String) -> io::Result<()> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|e| e.path())
        .collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            walk(root, &path, output)?;
        } else if let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) {
            let locpath = parent
                .strip_prefix(root)
                .map(|p| {
                    let p = p.to_string_lossy().replace('\\', "/");
                    if p.is_empty() { p } else { format!("/{p}") }
                })
                .unwrap_or_default();
            if let Some(triples) = triples_for(&locpath, &file_name.to_string_lossy()) {
                output.push_str(&triples);
            }
        }
    }
    Ok(())
}

/// Generates the aggregate graph for a package directory.
pub fn aggregate_graph(dir: &Path) -> io::Result<String> {
    let mut output = String::new();
    walk(dir, dir, &mut output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn sng_assets_get_llid_and_stripped_logpath() {
        let triples = triples_for("/songs/bin/macos", "bandsong_lead.sng").unwrap();
        assert!(triples.contains("/tag> \"musicgame-song\""));
        assert!(triples.contains("/tag> \"macos\""));
        assert!(triples.contains("-0000-0000-0000-000000000000\""));
        assert!(triples.contains("/logpath> \"/songs/bin/bandsong_lead.sng\""));
    }

    #[test]
    fn unknown_extensions_are_skipped() {
        assert_eq!(triples_for("/misc", "notes.txt"), None);
        assert_eq!(triples_for("/misc", "appid.appid"), None);
    }

    #[test]
    fn uuid_is_stable_for_a_path() {
        let a = triples_for("/gfxassets/album_art", "album_x_64.dds").unwrap();
        let b = triples_for("/gfxassets/album_art", "album_x_64.dds").unwrap();
        assert_eq!(a, b);
    }
}

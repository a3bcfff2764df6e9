//! Playalong and GPX loaders.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use super::{BarToTime, SYNC_OFFSET, Score, ScoreError};
use crate::xmltree::{Node, from_xml, list_coerce};
use crate::{DlcError, gpx};

/// A playalong file resolved into its score and sync function.
#[derive(Debug, Clone)]
pub struct LoadedPlayalong {
    /// The flattened GPX score.
    pub score: Score,
    /// The bar-to-seconds function built from the sync list.
    pub sync: BarToTime,
    /// The audio file referenced next to the score, when present.
    pub audio_url: Option<String>,
}

/// Parses the `#`-prefixed sync list into `(bar_position, seconds)` samples.
///
/// Each `;`-separated quadruple is `t_ms;bar;delta_bar;_`; the sample key
/// is `bar + delta_bar` and the value `t_ms / 1000`.
pub fn parse_sync(sync: &str) -> Result<Vec<(f64, f64)>, ScoreError> {
    let mut samples = Vec::new();
    for quad in sync.split('#').skip(1) {
        let fields: Vec<&str> = quad.split(';').collect();
        let [t_ms, bar, delta_bar, _] = fields.as_slice() else {
            return Err(ScoreError::MalformedSync(quad.to_string()));
        };
        let parse = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| ScoreError::MalformedSync(quad.to_string()))
        };
        samples.push((parse(bar)? + parse(delta_bar)?, parse(t_ms)? / 1000.0));
    }
    Ok(samples)
}

/// Loads a GPX file and flattens its embedded `score.gpif`.
pub fn load_gpx(path: &Path) -> Result<Score, DlcError> {
    let data = fs::read(path).map_err(|e| DlcError::new(path, e))?;
    let xml = gpx::read_score(&data).map_err(|e| DlcError::new(path, e))?;
    let root = from_xml(&String::from_utf8_lossy(&xml), list_coerce)
        .map_err(|e| DlcError::new(path, e))?;
    let score = Score::from_root(root).map_err(|e| DlcError::new(path, e))?;
    debug!(
        "loaded {}: {} tracks, {} master bars",
        path.display(),
        score.tracks.len(),
        score.master_bars.len()
    );
    Ok(score)
}

/// Loads a Go PlayAlong file plus the GPX score it references.
pub fn load_playalong(path: &Path) -> Result<LoadedPlayalong, DlcError> {
    let text = fs::read_to_string(path).map_err(|e| DlcError::new(path, e))?;
    let gpa = from_xml(&text, crate::xmltree::default_coerce).map_err(|e| DlcError::new(path, e))?;

    let sync_text = gpa
        .get("sync")
        .and_then(Node::as_str)
        .ok_or_else(|| DlcError::new(path, ScoreError::MissingField("sync")))?;
    let samples = parse_sync(sync_text).map_err(|e| DlcError::new(path, e))?;
    let sync = BarToTime::new(samples, SYNC_OFFSET).map_err(|e| DlcError::new(path, e))?;

    let score_url = gpa
        .get("scoreUrl")
        .and_then(Node::as_str)
        .ok_or_else(|| DlcError::new(path, ScoreError::MissingField("scoreUrl")))?;
    let score_path: PathBuf = match path.parent() {
        Some(dir) => dir.join(score_url),
        None => PathBuf::from(score_url),
    };
    let score = load_gpx(&score_path)?;

    let audio_url = gpa
        .get("mp3Url")
        .and_then(Node::as_str)
        .map(str::to_string);

    Ok(LoadedPlayalong {
        score,
        sync,
        audio_url,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn sync_quadruples_parse_into_samples() {
        let samples = parse_sync("#0;0;0.0;1#8000;4;0.0;1#12000;5;0.5;1").unwrap();
        assert_eq!(samples, vec![(0.0, 0.0), (4.0, 8.0), (5.5, 12.0)]);
    }

    #[test]
    fn short_quadruple_is_rejected() {
        assert_eq!(
            parse_sync("#0;0;0.0").unwrap_err(),
            ScoreError::MalformedSync("0;0;0.0".into())
        );
    }

    #[test]
    fn sync_feeds_the_interpolator() {
        let samples = parse_sync("#0;0;0.0;1#8000;4;0.0;1").unwrap();
        let sync = BarToTime::new(samples, SYNC_OFFSET).unwrap();
        assert_eq!(sync.at(2.0), 14.0);
    }
}

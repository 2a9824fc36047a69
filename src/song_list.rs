//! Loading song lists from files, JSON documents and pasted input
//!
//! Three shapes are accepted:
//! - a flat file with one `[id~]name~artist` row per line
//! - a JSON document grouping titles by artist: `{ "Queen": ["Bohemian Rhapsody", "id~Innuendo"] }`
//! - rows pasted on standard input until EOF
//!
//! Blank lines are skipped. The first malformed row aborts the load.

use crate::error::{ParseError, Result};
use crate::song::{FIELD_DELIMITER, Song};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

/// Parse already-split rows into songs
pub fn parse_lines<I, S>(lines: I) -> std::result::Result<Vec<Song>, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter(|line| !line.as_ref().trim().is_empty())
        .map(|line| Song::from_string(line.as_ref()))
        .collect()
}

/// Parse a grouped-by-artist JSON document
///
/// Artists come out in sorted order; titles keep their document order.
/// A title may carry an id prefix (`id~Title`).
pub fn parse_grouped_json(document: &str) -> std::result::Result<Vec<Song>, ParseError> {
    let grouped: BTreeMap<String, Vec<String>> = serde_json::from_str(document)
        .map_err(|e| ParseError::InvalidDocument(e.to_string()))?;

    let rows = grouped.iter().flat_map(|(artist, titles)| {
        titles
            .iter()
            .map(move |title| format!("{title}{FIELD_DELIMITER}{artist}"))
    });
    parse_lines(rows)
}

/// Load a song list from disk, choosing the shape by extension (`.json` or rows)
pub async fn load_file(path: &Path) -> Result<Vec<Song>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let songs = if is_json {
        parse_grouped_json(&raw)?
    } else {
        parse_lines(raw.lines())?
    };

    info!(path = %path.display(), count = songs.len(), "loaded song list");
    Ok(songs)
}

/// Read pasted rows until EOF
pub async fn read_lines<R>(reader: R) -> Result<Vec<Song>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut rows = Vec::new();
    while let Some(line) = lines.next_line().await? {
        rows.push(line);
    }
    debug!(rows = rows.len(), "read pasted song rows");
    Ok(parse_lines(rows)?)
}

//! Song: the unit of work that is searched, downloaded and tagged
//!
//! Everything except [`Song::size_mb`] is a pure function of the three stored
//! fields. A song serializes to one `~`-separated line:
//!
//! ```text
//! dQw4w9WgXcQ~Never Gonna Give You Up~Rick Astley   (id, name, artist)
//! Song Two~Artist B                                 (name, artist)
//! ```

use crate::error::ParseError;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Field separator in persisted song lists
pub const FIELD_DELIMITER: char = '~';

/// Placeholder artist for songs with no known artist; left out of searches
pub const SENTINEL_ARTIST: &str = "Other";

/// Extension of every downloaded file
pub const AUDIO_EXTENSION: &str = "mp3";

/// Returned by [`Song::size_mb`] when the file is absent
pub const MISSING_SIZE_MB: f64 = -1.0;

/// Separates title and artist in [`Song::full_name`]
const NAME_SEPARATOR: &str = " - ";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// Title-casing upper-cases the letter after an apostrophe ("Don'T"); these
// contraction and possessive endings go back to lower case.
#[allow(clippy::expect_used)]
static APOSTROPHE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(S|T|D|M|Ll|Re|Ve)\b").expect("pattern compiles"));

/// One song to fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Song {
    /// Source-specific id; searched instead of name and artist when present
    pub yid: Option<String>,
    /// Display title
    pub name: String,
    /// Artist, or [`SENTINEL_ARTIST`]
    pub artist: String,
}

impl Song {
    /// Create a song without a source id
    pub fn new(name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            yid: None,
            name: name.into(),
            artist: artist.into(),
        }
    }

    /// Create a song pinned to a source id
    pub fn with_yid(
        yid: impl Into<String>,
        name: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            yid: Some(yid.into()),
            name: name.into(),
            artist: artist.into(),
        }
    }

    /// Parse a `[id~]name~artist` line
    ///
    /// Double quotes and control characters are dropped and every field is
    /// trimmed. An empty id in the three-field form is treated as absent.
    pub fn from_string(line: &str) -> Result<Self, ParseError> {
        let cleaned = clean_line(line);
        let fields: Vec<&str> = cleaned.split(FIELD_DELIMITER).map(str::trim).collect();

        let (yid, name, artist) = match fields.as_slice() {
            [yid, name, artist] => (Some(*yid).filter(|id| !id.is_empty()), *name, *artist),
            [name, artist] => (None, *name, *artist),
            _ => {
                return Err(ParseError::InvalidFormat {
                    fields: fields.len(),
                    line: cleaned,
                });
            }
        };

        if name.is_empty() {
            return Err(ParseError::EmptyField {
                line: cleaned,
                field: "name",
            });
        }
        if artist.is_empty() {
            return Err(ParseError::EmptyField {
                line: cleaned,
                field: "artist",
            });
        }

        Ok(Self {
            yid: yid.map(str::to_string),
            name: name.to_string(),
            artist: artist.to_string(),
        })
    }

    /// Serialize back to the line form accepted by [`Song::from_string`]
    pub fn to_canonical_string(&self) -> String {
        let name = clean_field(&self.name);
        let artist = clean_field(&self.artist);
        match &self.yid {
            Some(yid) => format!("{}~{name}~{artist}", clean_field(yid)),
            None => format!("{name}~{artist}"),
        }
    }

    /// Rebuild a song from a downloaded file name such as `Song One - Artist A.mp3`
    ///
    /// The split happens at the last `" - "`, so titles may contain the
    /// separator. A name without a separator yields an empty artist.
    pub fn from_file_name(file_name: &str) -> Result<Self, ParseError> {
        let stem = file_name
            .strip_suffix(&format!(".{AUDIO_EXTENSION}"))
            .unwrap_or(file_name)
            .trim();
        if stem.is_empty() {
            return Err(ParseError::InvalidFileName(file_name.to_string()));
        }

        Ok(match stem.rsplit_once(NAME_SEPARATOR) {
            Some((name, artist)) => Self::new(name.trim(), artist.trim()),
            None => Self::new(stem, ""),
        })
    }

    /// Whether the artist is the placeholder
    pub fn has_sentinel_artist(&self) -> bool {
        self.artist.trim().eq_ignore_ascii_case(SENTINEL_ARTIST)
    }

    /// Query handed to the downloader's search step
    ///
    /// The id wins when present; otherwise name and artist, with the
    /// placeholder artist omitted.
    pub fn search_term(&self) -> String {
        if let Some(yid) = &self.yid {
            return yid.clone();
        }
        if self.has_sentinel_artist() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.artist)
        }
    }

    /// Canonical `Title - Artist` form used for display and file names
    ///
    /// Path separators become `-`, so the name is always a single path
    /// component.
    pub fn full_name(&self) -> String {
        format_name(&format!(
            "{}{NAME_SEPARATOR}{}",
            path_safe(&clean_field(&self.name)),
            path_safe(&clean_field(&self.artist))
        ))
    }

    /// File name of the downloaded audio
    pub fn file_name(&self) -> String {
        format!("{}.{AUDIO_EXTENSION}", self.full_name())
    }

    /// Location of the downloaded audio inside `download_dir`
    pub fn file_path(&self, download_dir: &Path) -> PathBuf {
        download_dir.join(self.file_name())
    }

    /// Size of the downloaded file in megabytes, or [`MISSING_SIZE_MB`]
    pub fn size_mb(&self, download_dir: &Path) -> f64 {
        std::fs::metadata(self.file_path(download_dir))
            .map(|meta| meta.len() as f64 / BYTES_PER_MB)
            .unwrap_or(MISSING_SIZE_MB)
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}: {}>", self.artist, self.name)
    }
}

/// Title-case every word and repair apostrophe endings
///
/// Idempotent: `format_name(&format_name(s)) == format_name(s)`.
pub fn format_name(raw: &str) -> String {
    let titled = title_case(raw);
    APOSTROPHE_SUFFIX
        .replace_all(&titled, |caps: &Captures<'_>| {
            format!("'{}", caps[1].to_lowercase())
        })
        .into_owned()
}

// A letter following another letter is lower-cased, any other letter is
// upper-cased. Letters whose upper case is several characters are kept.
fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut previous_is_letter = false;
    for c in raw.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                let mut upper = c.to_uppercase();
                match (upper.next(), upper.next()) {
                    (Some(single), None) => out.push(single),
                    _ => out.push(c),
                }
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}

fn clean_line(line: &str) -> String {
    line.chars()
        .filter(|c| *c != '"' && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn clean_field(field: &str) -> String {
    field
        .chars()
        .filter(|c| *c != FIELD_DELIMITER && *c != '"' && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn path_safe(field: &str) -> String {
    field
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || std::path::is_separator(c) {
                '-'
            } else {
                c
            }
        })
        .collect()
}

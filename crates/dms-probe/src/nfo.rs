//! `.nfo` sidecar parsing. A sibling `<basename>.nfo` file no larger than
//! 64KiB is read as key/value XML and its fields override what the
//! container probe found.

use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use dms_core::Detail;

const MAX_NFO_SIZE: u64 = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum NfoError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed xml in {path}: {source}")]
    Xml {
        path: String,
        #[source]
        source: quick_xml::Error,
    },
}

#[derive(Default)]
pub struct NfoOverrides {
    pub title: Option<String>,
    pub plot: Option<String>,
    pub capturedate: Option<String>,
    pub genre: Option<String>,
    pub mime: Option<String>,
}

impl NfoOverrides {
    pub fn apply(self, detail: &mut Detail) {
        if let Some(title) = self.title {
            detail.title = title;
        }
        if let Some(plot) = self.plot {
            detail.comment = Some(plot);
        }
        if let Some(date) = self.capturedate {
            detail.date = Some(date);
        }
        if let Some(genre) = self.genre {
            detail.genre = Some(genre);
        }
        if let Some(mime) = self.mime {
            detail.mime = Some(mime);
        }
    }
}

/// Find `<basename>.nfo` next to `path`, if it exists and is within the
/// size cap.
pub fn find_sidecar(path: &Path) -> Option<PathBuf> {
    let candidate = path.with_extension("nfo");
    let meta = fs::metadata(&candidate).ok()?;
    if meta.is_file() && meta.len() <= MAX_NFO_SIZE {
        Some(candidate)
    } else {
        None
    }
}

pub fn parse(path: &Path) -> Result<NfoOverrides, NfoError> {
    let contents = fs::read_to_string(path).map_err(|source| NfoError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let mut reader = Reader::from_str(&contents);
    reader.config_mut().trim_text(true);

    let mut overrides = NfoOverrides::default();
    let mut current_tag = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current_tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|source| NfoError::Xml {
                    path: path.display().to_string(),
                    source,
                })?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                match current_tag.as_str() {
                    "title" => overrides.title = Some(text.to_string()),
                    "plot" => overrides.plot = Some(text.to_string()),
                    "capturedate" => overrides.capturedate = Some(text.to_string()),
                    "genre" => overrides.genre = Some(text.to_string()),
                    "mime" => overrides.mime = Some(text.to_string()),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(source) => {
                return Err(NfoError::Xml {
                    path: path.display().to_string(),
                    source,
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_known_fields_and_ignores_unknown() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            "<movie><title>Arrival</title><plot>A linguist.</plot><runtime>116</runtime></movie>"
        )
        .unwrap();
        let overrides = parse(f.path()).unwrap();
        assert_eq!(overrides.title.as_deref(), Some("Arrival"));
        assert_eq!(overrides.plot.as_deref(), Some("A linguist."));
    }

    #[test]
    fn find_sidecar_respects_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("movie.mkv");
        fs::write(&video, b"").unwrap();
        let nfo = dir.path().join("movie.nfo");
        fs::write(&nfo, b"<movie/>").unwrap();
        assert_eq!(find_sidecar(&video), Some(nfo));
    }
}

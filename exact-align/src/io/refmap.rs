//! Reference map: translates index-space `(contig id, offset)` pairs into
//! user-facing reference coordinates.
//!
//! File format:
//! - `>OFFSET<TAB>NAME` binds a display name to `OFFSET` (kept only when
//!   name parsing is enabled).
//! - any other non-empty line holds two integers `TRUE_ID DELTA`; the Nth such
//!   line is the entry for index contig id N.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum RefMapError {
    #[error("could not open reference map file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error reading reference map file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed line {line} in reference map file {}: {reason}", .path.display())]
    Malformed { path: PathBuf, line: usize, reason: String },
    #[error("could not find a reference-map entry for reference {id} in map file \"{}\"", .path.display())]
    Unmapped { id: u32, path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MapEntry {
    true_id: u32,
    delta: u32,
}

#[derive(Debug, Clone)]
pub struct ReferenceMap {
    path: PathBuf,
    entries: Vec<MapEntry>,
    names: Vec<Option<String>>,
}

impl ReferenceMap {
    pub fn from_file(path: impl AsRef<Path>, parse_names: bool) -> Result<Self, RefMapError> {
        let path = path.as_ref();
        let fh = std::fs::File::open(path).map_err(|source| RefMapError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(std::io::BufReader::new(fh), path, parse_names)
    }

    /// Parses map records from `reader`; `path` is only used for diagnostics.
    pub fn parse<R: BufRead>(reader: R, path: impl AsRef<Path>, parse_names: bool) -> Result<Self, RefMapError> {
        let path = path.as_ref().to_path_buf();
        let mut entries = Vec::new();
        let mut names: Vec<Option<String>> = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| RefMapError::Read { path: path.clone(), source })?;
            let line_no = idx + 1;
            let malformed = |reason: &str| RefMapError::Malformed {
                path: path.clone(),
                line: line_no,
                reason: reason.to_string(),
            };

            if let Some(rest) = line.strip_prefix('>') {
                let (off, name) = rest.split_once('\t').unwrap_or((rest, ""));
                let off: usize = off.trim().parse().map_err(|_| malformed("name record without offset"))?;
                if parse_names {
                    if names.len() <= off {
                        names.resize(off + 1, None);
                    }
                    names[off] = Some(name.trim_end_matches(['\r', '\n']).to_string());
                }
                continue;
            }

            let mut fields = line.split_whitespace();
            let Some(first) = fields.next() else { continue };
            let second = fields.next().ok_or_else(|| malformed("expected two integers"))?;
            if fields.next().is_some() {
                return Err(malformed("expected two integers"));
            }
            let true_id = first.parse().map_err(|_| malformed("contig id is not an integer"))?;
            let delta = second.parse().map_err(|_| malformed("offset is not an integer"))?;
            entries.push(MapEntry { true_id, delta });
        }

        if entries.is_empty() {
            warn!(path = %path.display(), "no entries in reference map file");
        }
        Ok(Self { path, entries, names })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maps an index-space coordinate. Ids without an entry are a fatal data
    /// error for the caller; an empty table therefore rejects every id.
    /// Offsets wrap modulo 2^32.
    pub fn map(&self, id: u32, offset: u32) -> Result<(u32, u32), RefMapError> {
        let entry = self.entries.get(id as usize).ok_or_else(|| RefMapError::Unmapped {
            id,
            path: self.path.clone(),
        })?;
        Ok((entry.true_id, offset.wrapping_add(entry.delta)))
    }

    pub fn name(&self, offset: u32) -> Option<&str> {
        self.names.get(offset as usize)?.as_deref()
    }
}

//! JSONL result cache: one line per (PDF set, observable) convolution.
//!
//! Sweeping a set through a grid is the expensive step, so finished member
//! tables are kept on disk and reused by later runs. Entries are keyed by the
//! set name and the observable's name and order.
//!
//! Saving writes a sibling `.partial` file, syncs it, renames it over the
//! cache and then syncs the directory, so readers see either the old cache
//! or the new one.

use crate::observable::ObservableKey;
use crate::result::MemberTable;
use serde::{Deserialize, Serialize};
use smpdf_bridge::ErrorType;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// One cached member table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub pdf: String,
    pub observable: ObservableKey,
    pub error_type: ErrorType,
    pub table: MemberTable,
}

/// Why a cache file was refused before any record was parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    NulByte { offset: usize },
    InvalidUtf8 { valid_up_to: usize },
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NulByte { offset } => write!(f, "NUL byte at offset {offset}"),
            Self::InvalidUtf8 { valid_up_to } => {
                write!(f, "invalid UTF-8 after byte {valid_up_to}")
            }
        }
    }
}

/// Errors from cache persistence.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to read cache {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write cache {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: malformed cache record: {source}", path.display())]
    Record {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode cached {observable} for {pdf}: {source}")]
    Encode {
        pdf: String,
        observable: ObservableKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} is not a result cache: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: Corruption },
}

type CacheKey = (String, ObservableKey);

/// In-memory view of the cache, loaded from and saved to JSONL.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    records: BTreeMap<CacheKey, CacheRecord>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from records; later duplicates win.
    pub fn from_records(records: impl IntoIterator<Item = CacheRecord>) -> Self {
        let mut cache = Self::new();
        for record in records {
            cache.insert(record);
        }
        cache
    }

    /// Load the cache at `path`. A missing file is an empty cache.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(CacheError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let text = decode_text(path, bytes)?;
        Ok(Self::from_records(parse_records(path, &text)?))
    }

    /// Persist the cache to `path`, replacing the file atomically.
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let text = encode_records(self.records.values())?;
        replace_file(path.as_ref(), text.as_bytes())
    }

    pub fn get(&self, pdf: &str, observable: &ObservableKey) -> Option<&CacheRecord> {
        self.records.get(&(pdf.to_string(), observable.clone()))
    }

    pub fn insert(&mut self, record: CacheRecord) {
        let key = (record.pdf.clone(), record.observable.clone());
        self.records.insert(key, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &CacheRecord> {
        self.records.values()
    }
}

/// Refuse binary content before any line is parsed.
fn decode_text(path: &Path, bytes: Vec<u8>) -> Result<String, CacheError> {
    if let Some(offset) = bytes.iter().position(|&b| b == 0) {
        return Err(CacheError::Corrupt {
            path: path.to_path_buf(),
            reason: Corruption::NulByte { offset },
        });
    }
    String::from_utf8(bytes).map_err(|e| CacheError::Corrupt {
        path: path.to_path_buf(),
        reason: Corruption::InvalidUtf8 {
            valid_up_to: e.utf8_error().valid_up_to(),
        },
    })
}

/// Parse the records of a cache file. Blank lines and `#` comments are skipped.
fn parse_records(path: &Path, text: &str) -> Result<Vec<CacheRecord>, CacheError> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, content)| {
            serde_json::from_str(content).map_err(|source| CacheError::Record {
                path: path.to_path_buf(),
                line,
                source,
            })
        })
        .collect()
}

fn encode_records<'a>(
    records: impl IntoIterator<Item = &'a CacheRecord>,
) -> Result<String, CacheError> {
    let mut text = String::new();
    for record in records {
        let line = serde_json::to_string(record).map_err(|source| CacheError::Encode {
            pdf: record.pdf.clone(),
            observable: record.observable.clone(),
            source,
        })?;
        text.push_str(&line);
        text.push('\n');
    }
    Ok(text)
}

fn replace_file(path: &Path, contents: &[u8]) -> Result<(), CacheError> {
    let write_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| CacheError::Write { path, source }
    };

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).map_err(write_error(parent))?;
    }

    let partial = partial_path(path);
    let staged = File::create(&partial).and_then(|mut file| {
        file.write_all(contents)?;
        file.flush()?;
        file.sync_all()
    });
    if let Err(source) = staged {
        let _ = fs::remove_file(&partial);
        return Err(CacheError::Write {
            path: partial,
            source,
        });
    }

    if let Err(source) = fs::rename(&partial, path) {
        let _ = fs::remove_file(&partial);
        return Err(CacheError::Write {
            path: path.to_path_buf(),
            source,
        });
    }

    // Persist the rename itself.
    if let Some(parent) = parent {
        File::open(parent)
            .and_then(|dir| dir.sync_all())
            .map_err(write_error(parent))?;
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    let name = path
        .file_name()
        .map_or_else(|| "cache".into(), |name| name.to_string_lossy());
    path.with_file_name(format!(".{name}.{}-{nanos}.partial", std::process::id()))
}

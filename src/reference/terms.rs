//! Per-line technical-term allowlists.
//!
//! Station names, branch names and jargon that the spell checker must never
//! flag. Each line has a `config_<line>.json` document with a
//! `palabras_tecnicas` array.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use super::line_key;
use crate::error::ReferenceError;

#[derive(Debug, Deserialize)]
struct LineConfigFile {
    #[serde(alias = "technical_terms", default)]
    palabras_tecnicas: Vec<String>,
}

/// Words never reported as misspellings. Compared uppercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermAllowlist {
    words: HashSet<String>,
}

impl TermAllowlist {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_uppercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ReferenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: LineConfigFile =
            serde_json::from_str(&raw).map_err(|source| ReferenceError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(file.palabras_tecnicas))
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.trim().to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// All allowlists found in the line-config directory, keyed by line.
#[derive(Debug, Clone, Default)]
pub struct TermCatalog {
    by_line: HashMap<String, Arc<TermAllowlist>>,
    default_line: String,
    empty: Arc<TermAllowlist>,
}

impl TermCatalog {
    /// Scan `dir` for `config_<line>.json`. Unreadable files are logged and
    /// skipped; a missing directory yields an empty catalog.
    pub fn load_dir(dir: &Path, default_line: &str) -> Self {
        let mut by_line = HashMap::new();

        let read_dir = match std::fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "No line config directory");
                return Self::from_map(by_line, default_line);
            }
        };

        for entry in read_dir.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(line) = name
                .strip_prefix("config_")
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };
            match TermAllowlist::load(&path) {
                Ok(list) => {
                    debug!(line = %line, terms = list.len(), "Loaded technical terms");
                    by_line.insert(line_key(line), Arc::new(list));
                }
                Err(e) => warn!(error = %e, "Skipping line config"),
            }
        }

        Self::from_map(by_line, default_line)
    }

    pub fn from_map(by_line: HashMap<String, Arc<TermAllowlist>>, default_line: &str) -> Self {
        Self {
            by_line,
            default_line: line_key(default_line),
            empty: Arc::new(TermAllowlist::default()),
        }
    }

    /// Allowlist for a line, falling back to the default line's, then empty.
    pub fn for_line(&self, line: &str) -> Arc<TermAllowlist> {
        self.by_line
            .get(&line_key(line))
            .or_else(|| self.by_line.get(&self.default_line))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.empty))
    }

    pub fn lines(&self) -> usize {
        self.by_line.len()
    }
}

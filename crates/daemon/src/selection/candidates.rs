//! The configured list of files offered for selection.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Ordered, immutable list of file names offered to interactive sessions.
///
/// Cloning is cheap; every session gets its own handle onto the same list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFileList {
    names: Arc<[String]>,
}

impl Default for CandidateFileList {
    fn default() -> Self {
        Self::from_names(Vec::<String>::new())
    }
}

impl CandidateFileList {
    /// Parse a comma separated list.
    ///
    /// Whitespace around names is trimmed, empty segments are dropped and a
    /// repeated name keeps its first position.
    pub fn parse(raw: &str) -> Self {
        Self::from_names(raw.split(',').map(str::trim))
    }

    /// Build a list from names, applying the same cleanup as [`parse`](Self::parse).
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let names: Vec<String> = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .filter(|n| seen.insert(n.clone()))
            .collect();

        Self {
            names: names.into(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Candidates that are present in `dir`, sorted by name.
    pub fn choices_in(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut choices = Vec::new();
        for entry in fs::read_dir(dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if self.contains(&name) {
                choices.push(name);
            }
        }
        choices.sort();
        Ok(choices)
    }
}

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub use crate::cores::bytescan::Endian;

use super::resolver::TrialRecord;

/// Directory-table layouts seen in VxWorks images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableFormat {
    /// `name \0.. offset name \0.. offset ...`
    FormatA,
    /// Name table followed by 20-byte records and a chunk index (MINIFS).
    FormatB,
}

/// Decoded table: file name to filesystem-relative offset.
///
/// Names are unique; a repeated name keeps the smallest offset seen.
/// Iteration follows the order names first appeared in the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntryMap {
    entries: BTreeMap<String, u64>,
    #[serde(skip)]
    order: Vec<String>,
}

impl EntryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge_min(&mut self, name: impl Into<String>, relative_offset: u64) {
        let name = name.into();
        match self.entries.get_mut(&name) {
            Some(cur) => *cur = (*cur).min(relative_offset),
            None => {
                self.order.push(name.clone());
                self.entries.insert(name, relative_offset);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k.as_str(), *v)))
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for EntryMap {
    fn from_iter<T: IntoIterator<Item = (S, u64)>>(iter: T) -> Self {
        let mut map = EntryMap::new();
        for (name, off) in iter {
            map.merge_min(name, off);
        }
        map
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub path: PathBuf,
    pub match_count: usize,
    pub compactness: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CandidateSource {
    FirmwareItself,
    ExactMatch,
    FuzzyScore,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableCandidate {
    pub path: PathBuf,
    pub source: CandidateSource,
}

/// External command line, built by a backend and run by the extraction driver.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub note: String,
}

/// Blob naming used by the extraction collaborator: uppercase hex, no leading zeros.
pub fn blob_name(offset: u64) -> String {
    format!("{:X}", offset)
}

/// Directory of carved blobs, addressed by absolute offset.
#[derive(Debug, Clone)]
pub struct BlobDir {
    root: PathBuf,
}

impl BlobDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, offset: u64) -> PathBuf {
        self.root.join(blob_name(offset))
    }
}

/// Existence check used by the offset resolver.
pub trait BlobLookup {
    fn contains(&self, offset: u64) -> bool;
}

impl BlobLookup for BlobDir {
    fn contains(&self, offset: u64) -> bool {
        self.path_for(offset).is_file()
    }
}

impl BlobLookup for std::collections::HashSet<u64> {
    fn contains(&self, offset: u64) -> bool {
        std::collections::HashSet::contains(self, &offset)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CopiedFile {
    pub name: String,
    pub absolute_offset: u64,
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissingFile {
    pub name: String,
    pub absolute_offset: u64,
    pub expected: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedCopy {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconstructionSummary {
    pub result_root: PathBuf,
    pub copied: Vec<CopiedFile>,
    pub missing: Vec<MissingFile>,
    pub failed: Vec<FailedCopy>,
    pub out_of_range: usize,
}

/// Per-run summary, written as JSON with `--report`.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    pub firmware: PathBuf,
    pub sha256: String,
    pub endian: Endian,
    pub extraction_dir: PathBuf,
    pub main_program: Option<PathBuf>,
    pub symbol_table: Option<PathBuf>,
    pub candidate: TableCandidate,
    pub anchor: usize,
    pub format: TableFormat,
    pub entries: usize,
    pub base_offset: u64,
    pub trials: Vec<TrialRecord>,
    pub hints: Vec<String>,
    pub reconstruction: ReconstructionSummary,
}

use regex::Regex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cores::bytescan::{find_bytes, looks_binary, strings::resource_hits};
use crate::errors::VxfsError;

use super::model::{CandidateScore, CandidateSource, TableCandidate};
use super::rules::RecoverRules;
use super::screening::firmware_has_table;

/// Coarse content classification, close to what `file --mime-type` would say.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Xml,
    Json,
    Css,
    Text,
    Binary,
}

impl ContentKind {
    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Html => "html",
            ContentKind::Xml => "xml",
            ContentKind::Json => "json",
            ContentKind::Css => "css",
            ContentKind::Text => "text",
            ContentKind::Binary => "binary",
        }
    }
}

pub fn sniff_kind(data: &[u8]) -> ContentKind {
    if looks_binary(data) {
        return ContentKind::Binary;
    }
    let head = &data[..data.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with("<?xml") {
        return if lower.contains("<html") {
            ContentKind::Html
        } else {
            ContentKind::Xml
        };
    }
    if lower.starts_with("<!doctype html") || lower.starts_with("<html") || lower.contains("<head")
    {
        return ContentKind::Html;
    }
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_slice::<serde_json::Value>(data).is_ok()
    {
        return ContentKind::Json;
    }
    if looks_like_css(trimmed) {
        return ContentKind::Css;
    }
    ContentKind::Text
}

fn looks_like_css(text: &str) -> bool {
    let Some(open) = text.find('{') else {
        return false;
    };
    let selector = text[..open].trim();
    if selector.is_empty() || selector.contains(['(', ';', '=', '"']) {
        return false;
    }
    let body_end = text[open..].find('}').map(|i| open + i).unwrap_or(text.len());
    let body = &text[open + 1..body_end];
    body.contains(':') && body.contains(';')
}

/// Sum of adjacent offset gaps, each divided by `(i+1)/2`.
///
/// Table entries sit close together, so small values mean a dense run of names.
pub fn compactness(offsets: &[usize]) -> f64 {
    offsets
        .windows(2)
        .enumerate()
        .map(|(i, w)| w[1].abs_diff(w[0]) as f64 / ((i + 1) as f64 / 2.0))
        .sum()
}

pub fn score_bytes(path: &Path, data: &[u8], rules: &RecoverRules) -> CandidateScore {
    let offsets: Vec<usize> = resource_hits(
        data,
        rules.thresholds.min_string_len,
        &rules.fuzzy_extensions,
    )
    .into_iter()
    .map(|h| h.offset)
    .collect();
    let match_count = offsets.len();
    let compactness = compactness(&offsets);
    let ratio = if compactness > 0.0 {
        match_count as f64 * 4096.0 / compactness
    } else {
        match_count as f64 * 4096.0
    };
    CandidateScore {
        path: path.to_path_buf(),
        match_count,
        compactness,
        ratio,
    }
}

/// Higher ratio first, shorter path on ties.
pub fn rank_scores(scores: &mut [CandidateScore]) {
    scores.sort_by(|a, b| {
        b.ratio
            .partial_cmp(&a.ratio)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.path.as_os_str().len().cmp(&b.path.as_os_str().len()))
            .then_with(|| a.path.cmp(&b.path))
    });
}

/// Scores regular files directly inside `dir`; markup and data files are skipped.
pub fn fuzzy_scores(dir: &Path, rules: &RecoverRules) -> Result<Vec<CandidateScore>, VxfsError> {
    let mut scores = Vec::new();
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in entries {
        if !path.is_file() {
            continue;
        }
        let data = match std::fs::read(&path) {
            Ok(d) => d,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        let kind = sniff_kind(&data);
        if rules
            .excluded_kinds
            .iter()
            .any(|k| k.eq_ignore_ascii_case(kind.label()))
        {
            debug!(path = %path.display(), kind = kind.label(), "excluded from scoring");
            continue;
        }
        let score = score_bytes(&path, &data, rules);
        if score.match_count >= rules.thresholds.min_candidate_matches {
            scores.push(score);
        }
    }

    rank_scores(&mut scores);
    for s in &scores {
        debug!(
            path = %s.path.display(),
            matches = s.match_count,
            compactness = s.compactness,
            ratio = s.ratio,
            "fuzzy score"
        );
    }
    Ok(scores)
}

fn web_asset_re(rules: &RecoverRules) -> Result<Regex, VxfsError> {
    let alts: Vec<String> = rules
        .web_asset_extensions
        .iter()
        .map(|e| regex::escape(e.trim_start_matches('.')))
        .collect();
    Regex::new(&format!(r"\b([A-Za-z0-9_/]+\.(?:{}))\b", alts.join("|")))
        .map_err(|e| VxfsError::ParseError(format!("web asset pattern: {}", e)))
}

/// Asset basenames referenced from `src=` attributes in text files under `dir`.
pub fn web_asset_names(dir: &Path, rules: &RecoverRules) -> Result<BTreeSet<String>, VxfsError> {
    let re = web_asset_re(rules)?;
    let mut names = BTreeSet::new();
    for entry in WalkDir::new(dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(data) = std::fs::read(entry.path()) else {
            continue;
        };
        if looks_binary(&data) {
            continue;
        }
        let text = String::from_utf8_lossy(&data);
        for line in text.lines().filter(|l| l.contains("src=")) {
            for cap in re.captures_iter(line) {
                let full = &cap[1];
                let base = full.rsplit('/').next().unwrap_or(full);
                if !base.is_empty() {
                    names.insert(base.to_string());
                }
            }
        }
    }
    Ok(names)
}

/// Binary files under `dir` containing every referenced name that occurs anywhere.
///
/// Names found in no binary file are ignored. `None` when no name matched at all.
pub fn binary_intersection(
    dir: &Path,
    names: &BTreeSet<String>,
) -> Result<Option<BTreeSet<PathBuf>>, VxfsError> {
    let mut hits: BTreeMap<&str, BTreeSet<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(data) = std::fs::read(entry.path()) else {
            continue;
        };
        if !looks_binary(&data) {
            continue;
        }
        for name in names {
            if find_bytes(&data, name.as_bytes()).is_some() {
                hits.entry(name.as_str())
                    .or_default()
                    .insert(entry.path().to_path_buf());
            }
        }
    }

    let mut survivors: Option<BTreeSet<PathBuf>> = None;
    for (name, files) in hits {
        debug!(name, files = files.len(), "binary files referencing asset");
        survivors = Some(match survivors {
            None => files,
            Some(cur) => cur.intersection(&files).cloned().collect(),
        });
    }
    Ok(survivors)
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// Deterministic pick among several surviving blobs.
///
/// Every survivor stands for a pair: the plain blob and its double-compressed
/// sibling. The pair holding the smallest existing file wins (path order on ties).
/// Inside that pair the sibling is taken when it is larger than the plain blob,
/// since a tiny sibling is usually an empty stub.
pub fn pick_sibling(survivors: &BTreeSet<PathBuf>, suffix: &str) -> Option<PathBuf> {
    let mut best: Option<(u64, PathBuf, PathBuf)> = None;
    for s in survivors {
        let text = s.to_string_lossy();
        let plain = PathBuf::from(text.strip_suffix(suffix).unwrap_or(&text[..]));
        let sibling = PathBuf::from(format!("{}{}", plain.display(), suffix));
        let smallest = [file_size(&plain), file_size(&sibling)]
            .into_iter()
            .flatten()
            .min();
        let Some(smallest) = smallest else {
            continue;
        };
        let better = match &best {
            None => true,
            Some((size, p, _)) => smallest < *size || (smallest == *size && plain < *p),
        };
        if better {
            best = Some((smallest, plain, sibling));
        }
    }

    let (_, plain, sibling) = best?;
    match (file_size(&plain), file_size(&sibling)) {
        (Some(p), Some(z)) if z > p => Some(sibling),
        (Some(_), _) => Some(plain),
        (None, Some(_)) => Some(sibling),
        (None, None) => None,
    }
}

pub fn exact_candidate(dir: &Path, rules: &RecoverRules) -> Result<Option<PathBuf>, VxfsError> {
    let names = web_asset_names(dir, rules)?;
    if names.is_empty() {
        debug!("no web asset references found");
        return Ok(None);
    }
    info!(names = names.len(), "cross-referencing web asset names");
    let Some(survivors) = binary_intersection(dir, &names)? else {
        return Ok(None);
    };
    match survivors.len() {
        0 => Ok(None),
        1 => Ok(survivors.into_iter().next()),
        _ => Ok(pick_sibling(
            &survivors,
            &rules.extraction.double_compression_suffix,
        )),
    }
}

/// Picks the file most likely to hold the directory table.
pub fn select_candidate(
    firmware_path: &Path,
    firmware: &[u8],
    extraction_dir: &Path,
    rules: &RecoverRules,
    fuzzy_mode: bool,
) -> Result<TableCandidate, VxfsError> {
    if firmware_has_table(firmware, rules) {
        info!("raw firmware already carries the directory table");
        return Ok(TableCandidate {
            path: firmware_path.to_path_buf(),
            source: CandidateSource::FirmwareItself,
        });
    }

    if !fuzzy_mode {
        if let Some(path) = exact_candidate(extraction_dir, rules)? {
            info!(path = %path.display(), "table candidate from web asset cross-reference");
            return Ok(TableCandidate {
                path,
                source: CandidateSource::ExactMatch,
            });
        }
        info!("exact strategy found nothing, falling back to fuzzy scoring");
    }

    let scores = fuzzy_scores(extraction_dir, rules)?;
    match scores.into_iter().next() {
        Some(top) => {
            info!(
                path = %top.path.display(),
                matches = top.match_count,
                ratio = top.ratio,
                "table candidate from fuzzy scoring"
            );
            Ok(TableCandidate {
                path: top.path,
                source: CandidateSource::FuzzyScore,
            })
        }
        None => Err(VxfsError::NoCandidateFound {
            extraction_dir: extraction_dir.to_path_buf(),
        }),
    }
}

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use super::model::{Endian, blob_name};

/// One `<decimal> 0x<hex> <description>` row of the collaborator's segment report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLine {
    pub offset: u64,
    pub description: String,
}

fn segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+)\s+0x([0-9A-Fa-f]+)\s+(.*)$").expect("segment line pattern compiles")
    })
}

fn uncompressed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"uncompressed size:\s+(-?\d+) bytes").expect("uncompressed size pattern compiles")
    })
}

/// Parsed view of the segment report text.
#[derive(Debug, Clone)]
pub struct SegmentReport {
    raw_lines: Vec<String>,
}

impl SegmentReport {
    pub fn parse(text: &str) -> Self {
        Self {
            raw_lines: text.lines().map(|l| l.to_string()).collect(),
        }
    }

    pub fn parse_line(line: &str) -> Option<SegmentLine> {
        let caps = segment_re().captures(line.trim_end())?;
        let offset = caps.get(1)?.as_str().parse().ok()?;
        Some(SegmentLine {
            offset,
            description: caps.get(3)?.as_str().to_string(),
        })
    }

    /// Candidate filesystem bases, in report order.
    ///
    /// Rows are taken from the first `LZMA compressed data` line, or from the
    /// third line when there is none (the first two are the table header).
    pub fn base_candidates(&self) -> Vec<u64> {
        let start = self
            .raw_lines
            .iter()
            .position(|l| l.contains("LZMA compressed data"))
            .unwrap_or(2);
        self.raw_lines
            .iter()
            .skip(start)
            .filter_map(|l| Self::parse_line(l))
            .map(|seg| seg.offset)
            .collect()
    }

    /// Leading decimal of the last non-empty line; absolute offsets above it are never carved.
    pub fn max_offset(&self) -> Option<u64> {
        let last = self.raw_lines.iter().rev().map(|l| l.trim()).find(|l| !l.is_empty())?;
        let digits: String = last.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    pub fn endianness(&self) -> Option<Endian> {
        let lower = self.raw_lines.join("\n").to_ascii_lowercase();
        if lower.contains("big endian") {
            Some(Endian::Big)
        } else if lower.contains("little endian") {
            Some(Endian::Little)
        } else {
            None
        }
    }

    pub fn endianness_or_default(&self) -> Endian {
        self.endianness().unwrap_or_else(|| {
            warn!("byte order not reported by the collaborator, assuming big endian");
            Endian::Big
        })
    }

    /// Blob name of the segment with the largest uncompressed size (the VxWorks kernel).
    pub fn main_program(&self) -> Option<String> {
        let mut best: Option<(i64, u64)> = None;
        for line in &self.raw_lines {
            let Some(seg) = Self::parse_line(line) else {
                continue;
            };
            let Some(size) = uncompressed_re()
                .captures(&seg.description)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<i64>().ok())
            else {
                continue;
            };
            if best.is_none_or(|(cur, _)| size > cur) {
                best = Some((size, seg.offset));
            }
        }
        best.map(|(_, offset)| blob_name(offset))
    }

    /// Informational warnings about the image's shape.
    pub fn sanity_hints(&self) -> Vec<String> {
        let text = self.raw_lines.join("\n");
        let mut hints = Vec::new();
        if !text.contains("uImage") && !text.contains("U-Boot") {
            hints.push(
                "no uImage/U-Boot header reported; the image may be encrypted or use another container"
                    .to_string(),
            );
        }
        if !text.contains("VxWorks") && !text.contains("Wind River") {
            hints.push(
                "no VxWorks/Wind River signature reported; this may not be a standard VxWorks image"
                    .to_string(),
            );
        }
        hints
    }
}

//! Directory-table decoders and the layout probe that picks between them.

pub mod format_a;
pub mod format_b;

use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::cores::bytescan::{Endian, contains_zero_run};
use crate::errors::VxfsError;

use super::model::{EntryMap, TableFormat};
use super::rules::RecoverRules;

fn filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_/\-]*\.[A-Za-z0-9_/\-]*$").expect("filename pattern compiles")
    })
}

/// Table names are plain ASCII paths with exactly one dot.
pub fn is_table_filename(name: &str) -> bool {
    filename_re().is_match(name)
}

/// Format A pads names with zero words, so a four-zero run right at the anchor gives it away.
pub fn detect_format(firmware: &[u8], anchor: usize, rules: &RecoverRules) -> TableFormat {
    let end = anchor
        .saturating_add(rules.thresholds.format_probe_len)
        .min(firmware.len());
    let probe = firmware.get(anchor..end).unwrap_or_default();
    if contains_zero_run(probe, rules.thresholds.format_probe_zero_run) {
        TableFormat::FormatA
    } else {
        TableFormat::FormatB
    }
}

/// Decodes the table in the layout chosen by [`detect_format`].
///
/// Format A is read from the raw firmware, Format B from the candidate blob.
pub fn decode_table(
    format: TableFormat,
    firmware: &[u8],
    candidate: &[u8],
    anchor: usize,
    endian: Endian,
    rules: &RecoverRules,
) -> Result<EntryMap, VxfsError> {
    let entries = match format {
        TableFormat::FormatA => format_a::decode(firmware, anchor, endian, &rules.thresholds),
        TableFormat::FormatB => format_b::decode(
            candidate,
            anchor,
            endian,
            &rules.thresholds,
            rules.minifs_marker.as_bytes(),
        )?,
    };
    if entries.is_empty() {
        warn!(?format, "table decoded to zero entries");
    } else {
        info!(?format, entries = entries.len(), "directory table decoded");
    }
    Ok(entries)
}

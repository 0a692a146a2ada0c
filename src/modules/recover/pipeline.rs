use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::VxfsError;

use super::backends::BinwalkBackend;
use super::decoder::{decode_table, detect_format};
use super::extraction::{ExtractionOutcome, run_extraction};
use super::locator::locate_in_candidate;
use super::model::{BlobDir, CandidateSource, EntryMap, RecoveryReport};
use super::reconstruct::Reconstructor;
use super::report::SegmentReport;
use super::resolver::OffsetResolver;
use super::rules::RecoverRules;
use super::scorer::select_candidate;
use super::screening::screen_encrypted_table;
use super::symbols::recover_symbol_table;

#[derive(Debug, Clone)]
pub struct RecoverOptions {
    pub firmware: PathBuf,
    pub workdir: PathBuf,
    pub fuzzy_mode: bool,
    pub timeout_secs: Option<u64>,
    pub report_path: Option<PathBuf>,
}

/// Full run: extraction collaborator first, then table recovery.
pub fn run(opts: &RecoverOptions, rules: &RecoverRules) -> Result<RecoveryReport, VxfsError> {
    if !opts.firmware.is_file() {
        return Err(VxfsError::InvalidArguments(format!(
            "firmware '{}' is not a readable file",
            opts.firmware.display()
        )));
    }

    let mut settings = rules.extraction.clone();
    if let Some(secs) = opts.timeout_secs {
        settings.timeout_secs = secs;
    }
    let backend = BinwalkBackend::detect(&settings.tool);
    let outcome = run_extraction(&backend, &opts.firmware, &opts.workdir, &settings)?;

    let report = run_on_extraction(&opts.firmware, &outcome, rules, opts.fuzzy_mode)?;
    if let Some(path) = &opts.report_path {
        save_report(path, &report)?;
        info!(path = %path.display(), "recovery report written");
    }
    Ok(report)
}

/// Table recovery over an existing extraction.
pub fn run_on_extraction(
    firmware_path: &Path,
    outcome: &ExtractionOutcome,
    rules: &RecoverRules,
    fuzzy_mode: bool,
) -> Result<RecoveryReport, VxfsError> {
    let firmware = std::fs::read(firmware_path)?;
    let segments = SegmentReport::parse(&outcome.report_text);
    let endian = segments.endianness_or_default();
    let hints = segments.sanity_hints();
    for hint in &hints {
        warn!("{}", hint);
    }
    info!(?endian, extraction_dir = %outcome.extraction_dir.display(), "starting table recovery");

    // symbol table and result tree both sit next to the blob directory
    let output_base = outcome
        .extraction_dir
        .parent()
        .unwrap_or(outcome.extraction_dir.as_path());

    let symbol_table = match recover_symbol_table(&firmware, output_base, rules) {
        Ok(Some(path)) => {
            info!(path = %path.display(), "symbol table saved");
            Some(path)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "symbol table recovery failed, continuing without it");
            None
        }
    };

    let main_program = segments
        .main_program()
        .map(|name| outcome.extraction_dir.join(name));
    if let Some(path) = &main_program {
        info!(path = %path.display(), "main program");
    }

    screen_encrypted_table(&outcome.extraction_dir, rules)?;

    let candidate = select_candidate(
        firmware_path,
        &firmware,
        &outcome.extraction_dir,
        rules,
        fuzzy_mode,
    )?;
    let candidate_bytes = match candidate.source {
        CandidateSource::FirmwareItself => firmware.clone(),
        _ => std::fs::read(&candidate.path)?,
    };
    let anchor = locate_in_candidate(
        &candidate.path,
        &candidate_bytes,
        &outcome.extraction_dir,
        rules,
    )?;

    let format = detect_format(&firmware, anchor, rules);
    info!(?format, "table layout");
    let entries = match decode_table(format, &firmware, &candidate_bytes, anchor, endian, rules) {
        Ok(entries) => entries,
        Err(e) if !e.is_fatal() => {
            warn!(error = %e, "continuing with an empty table");
            EntryMap::new()
        }
        Err(e) => return Err(e),
    };

    let max_offset = segments.max_offset().unwrap_or_else(|| {
        warn!("segment report has no trailing offset, not bounding absolute offsets");
        u64::MAX
    });
    let blobs = BlobDir::new(&outcome.extraction_dir);
    let resolution = OffsetResolver::new(&entries, &blobs, max_offset, &rules.thresholds)
        .resolve(&segments.base_candidates())?;

    let reconstruction =
        Reconstructor::new(&blobs, output_base).run(&entries, resolution.base_offset, max_offset)?;

    Ok(RecoveryReport {
        firmware: firmware_path.to_path_buf(),
        sha256: sha256_hex(&firmware),
        endian,
        extraction_dir: outcome.extraction_dir.clone(),
        main_program,
        symbol_table,
        candidate,
        anchor,
        format,
        entries: entries.len(),
        base_offset: resolution.base_offset,
        trials: resolution.trials,
        hints,
        reconstruction,
    })
}

pub fn save_report(path: &Path, report: &RecoveryReport) -> Result<(), VxfsError> {
    let s = serde_json::to_string_pretty(report)
        .map_err(|e| VxfsError::ParseError(e.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, s)?;
    Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

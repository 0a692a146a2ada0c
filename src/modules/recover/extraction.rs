use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::errors::VxfsError;

use super::backends::ExtractionBackend;
use super::rules::ExtractionSettings;

/// Where the collaborator left its output, plus the segment report it printed.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub root: PathBuf,
    pub extraction_dir: PathBuf,
    pub report_text: String,
    pub reused: bool,
}

/// Basename up to the first `.`: `mw313rv4.bin.gz` gives `mw313rv4`.
pub fn firmware_stem(firmware: &Path) -> String {
    let base = firmware
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match base.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => base,
    }
}

pub fn extraction_root(firmware: &Path, workdir: &Path, settings: &ExtractionSettings) -> PathBuf {
    workdir.join(format!("{}{}", settings.root_prefix, firmware_stem(firmware)))
}

/// binwalk nests carved blobs under `_<basename>.extracted` when recursion kicks in.
pub fn resolve_extraction_dir(root: &Path, firmware: &Path) -> PathBuf {
    let base = firmware
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let nested = root.join(format!("_{}.extracted", base));
    if nested.is_dir() { nested } else { root.to_path_buf() }
}

pub fn run_extraction(
    backend: &dyn ExtractionBackend,
    firmware: &Path,
    workdir: &Path,
    settings: &ExtractionSettings,
) -> Result<ExtractionOutcome, VxfsError> {
    if !backend.available() {
        return Err(VxfsError::ToolMissing {
            tool: backend.binary().name.clone(),
        });
    }

    std::fs::create_dir_all(workdir)?;
    let root = extraction_root(firmware, workdir, settings);
    let log_dir = workdir.join(".vxfs-logs").join(firmware_stem(firmware));
    std::fs::create_dir_all(&log_dir)?;

    let reused = root.exists();
    if reused {
        info!(root = %root.display(), "extraction root already exists, skipping carve");
    } else {
        let plan = backend.build_extract_plan(firmware, &root)?;
        info!(program = %plan.program, args = ?plan.args, "{}", plan.note);
        let status = run_checked(
            backend,
            &plan.program,
            &plan.args,
            &log_dir.join("extract.stdout.log"),
            &log_dir.join("extract.stderr.log"),
            settings.timeout_secs,
        )?;
        debug!(?status, "extraction finished");
    }

    let extraction_dir = resolve_extraction_dir(&root, firmware);
    if !extraction_dir.is_dir() {
        return Err(VxfsError::ExtractionFailed {
            tool: backend.name().to_string(),
            status: "no output".to_string(),
            detail: format!("'{}' was not created", extraction_dir.display()),
        });
    }

    let plan = backend.build_report_plan(firmware)?;
    info!(program = %plan.program, args = ?plan.args, "{}", plan.note);
    let report_log = log_dir.join("report.stdout.log");
    run_checked(
        backend,
        &plan.program,
        &plan.args,
        &report_log,
        &log_dir.join("report.stderr.log"),
        settings.timeout_secs,
    )?;
    let report_text = std::fs::read_to_string(&report_log)?;
    if report_text.trim().is_empty() {
        warn!("segment report is empty");
    }

    Ok(ExtractionOutcome {
        root,
        extraction_dir,
        report_text,
        reused,
    })
}

fn run_checked(
    backend: &dyn ExtractionBackend,
    program: &str,
    args: &[String],
    stdout_log: &Path,
    stderr_log: &Path,
    timeout_secs: u64,
) -> Result<Option<i32>, VxfsError> {
    let status = run_with_logs_and_timeout(program, args, stdout_log, stderr_log, timeout_secs)
        .map_err(|e| VxfsError::ExtractionFailed {
            tool: backend.name().to_string(),
            status: "not run to completion".to_string(),
            detail: e.to_string(),
        })?;
    if status != Some(0) {
        return Err(VxfsError::ExtractionFailed {
            tool: backend.name().to_string(),
            status: status
                .map(|v| format!("exit status {}", v))
                .unwrap_or_else(|| "killed by signal".to_string()),
            detail: format!("see '{}'", stderr_log.display()),
        });
    }
    Ok(status)
}

/// Spawns `program`, streams both pipes into log files and kills it after `timeout_secs`.
pub fn run_with_logs_and_timeout(
    program: &str,
    args: &[String],
    stdout_log: &Path,
    stderr_log: &Path,
    timeout_secs: u64,
) -> Result<Option<i32>, VxfsError> {
    let stdout = std::fs::File::create(stdout_log)?;
    let stderr = std::fs::File::create(stderr_log)?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(|e| VxfsError::Generic(format!("failed to launch {}: {}", program, e)))?;

    let started = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(timeout_secs.max(1));
    loop {
        match child
            .try_wait()
            .map_err(|e| VxfsError::Generic(format!("try_wait failed: {}", e)))?
        {
            Some(status) => return Ok(status.code()),
            None => {
                if started.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(VxfsError::Generic(format!(
                        "{} timed out after {}s",
                        program, timeout_secs
                    )));
                }
                std::thread::sleep(std::time::Duration::from_millis(200));
            }
        }
    }
}

use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::errors::VxfsError;
use crate::modules::recover::model::ToolInvocation;

pub mod binwalk;

pub use binwalk::BinwalkBackend;

#[derive(Debug, Clone, Serialize)]
pub struct BackendBinary {
    pub name: String,
    pub available: bool,
    pub path: Option<PathBuf>,
}

impl BackendBinary {
    /// Resolved program path, falling back to the bare name for `PATH` lookup at spawn time.
    pub fn program(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Carving tool that turns a firmware image into offset-named blobs plus a segment report.
pub trait ExtractionBackend {
    fn name(&self) -> &'static str;
    fn binary(&self) -> &BackendBinary;

    fn available(&self) -> bool {
        self.binary().available
    }

    /// Recursive extraction of `firmware` into `root`.
    fn build_extract_plan(&self, firmware: &Path, root: &Path)
    -> Result<ToolInvocation, VxfsError>;

    /// Signature scan whose stdout is the segment report.
    fn build_report_plan(&self, firmware: &Path) -> Result<ToolInvocation, VxfsError>;
}

pub fn probe_binary(label: &str, candidates: &[&str]) -> BackendBinary {
    for c in candidates {
        if let Some(path) = find_in_path(c) {
            return BackendBinary {
                name: label.to_string(),
                available: true,
                path: Some(path),
            };
        }
    }
    BackendBinary {
        name: label.to_string(),
        available: false,
        path: None,
    }
}

fn find_in_path(bin: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let candidate = dir.join(bin);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let exe = dir.join(format!("{}.exe", bin));
            if is_executable(&exe) {
                return Some(exe);
            }
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(md) = std::fs::metadata(path) {
            return md.permissions().mode() & 0o111 != 0;
        }
    }
    #[cfg(not(unix))]
    {
        return true;
    }
    false
}

use std::path::Path;

use crate::errors::VxfsError;
use crate::modules::recover::model::ToolInvocation;

use super::{BackendBinary, ExtractionBackend, probe_binary};

pub struct BinwalkBackend {
    binary: BackendBinary,
}

impl BinwalkBackend {
    pub fn new(binary: BackendBinary) -> Self {
        Self { binary }
    }

    pub fn detect(tool: &str) -> Self {
        Self::new(probe_binary(tool, &[tool]))
    }
}

impl ExtractionBackend for BinwalkBackend {
    fn name(&self) -> &'static str {
        "binwalk"
    }

    fn binary(&self) -> &BackendBinary {
        &self.binary
    }

    fn build_extract_plan(
        &self,
        firmware: &Path,
        root: &Path,
    ) -> Result<ToolInvocation, VxfsError> {
        Ok(ToolInvocation {
            program: self.binary.program(),
            args: vec![
                "-Me".to_string(),
                "-C".to_string(),
                root.display().to_string(),
                firmware.display().to_string(),
            ],
            note: "recursive carve and decompress".to_string(),
        })
    }

    fn build_report_plan(&self, firmware: &Path) -> Result<ToolInvocation, VxfsError> {
        Ok(ToolInvocation {
            program: self.binary.program(),
            args: vec![firmware.display().to_string()],
            note: "signature scan (segment report)".to_string(),
        })
    }
}

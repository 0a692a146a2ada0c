// src/errors.rs
use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide error type for the recovery pipeline.
#[derive(Error, Debug)]
pub enum VxfsError {
    // === I/O and parsing ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    // === arguments ===
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    // === extraction collaborator ===
    #[error("'{tool}' was not found on PATH; install it (e.g. `pip install binwalk` or your distro package) and retry")]
    ToolMissing { tool: String },

    #[error("'{tool}' failed ({status}): {detail}")]
    ExtractionFailed {
        tool: String,
        status: String,
        detail: String,
    },

    // === table discovery ===
    #[error(
        "no plaintext file offset table found under '{}': the table is probably encrypted or further compressed",
        extraction_dir.display()
    )]
    NoCandidateFound { extraction_dir: PathBuf },

    #[error(
        "this firmware hides its file offset table ('{marker}' found in '{}'); encrypted tables are not supported",
        path.display()
    )]
    EncryptedTable { path: PathBuf, marker: String },

    #[error("{format} table could not be decoded: {reason}")]
    DecodeFailure { format: String, reason: String },

    // === offset resolution ===
    #[error("base offset 0x{base_offset:X} rejected after {successes} hits and {failures} consecutive misses")]
    OffsetMismatch {
        base_offset: u64,
        successes: usize,
        failures: usize,
    },

    #[error("none of the {tried} candidate base offsets matched the extracted blobs ({entries} table entries)")]
    UnresolvedOffset { tried: usize, entries: usize },

    // === reconstruction ===
    #[error("failed to copy '{}' to '{}': {source}", from.display(), to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation failed: {0}")]
    Generic(String),
}

impl VxfsError {
    /// Soft errors are logged and the run continues.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            VxfsError::DecodeFailure { .. }
                | VxfsError::OffsetMismatch { .. }
                | VxfsError::CopyFailed { .. }
        )
    }

    /// Manual follow-up printed under fatal errors.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            VxfsError::NoCandidateFound { .. } => Some(
                "decrypt or decompress the table manually, drop the plaintext blob into the extraction directory and rerun; --fuzzy-mode can also help when the firmware has no web pages",
            ),
            VxfsError::EncryptedTable { .. } => Some(
                "recover the hidden table by hand (e.g. reverse the decryption routine) and place its plaintext next to the extracted blobs",
            ),
            VxfsError::UnresolvedOffset { .. } => Some(
                "inspect the segment report for the filesystem start and check that the carved blobs are named by their absolute offsets",
            ),
            VxfsError::ExtractionFailed { .. } => Some(
                "check the collaborator logs next to the extraction root; a partial binwalk install (missing 7z/sasquatch/lzma helpers) is the usual cause",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::VxfsError;
    use std::path::PathBuf;

    #[test]
    fn soft_errors_are_not_fatal() {
        let soft = VxfsError::OffsetMismatch {
            base_offset: 0x1000,
            successes: 0,
            failures: 10,
        };
        assert!(!soft.is_fatal());
        let fatal = VxfsError::NoCandidateFound {
            extraction_dir: PathBuf::from("vxfile_fw"),
        };
        assert!(fatal.is_fatal());
        assert!(fatal.hint().is_some());
    }

    #[test]
    fn mismatch_message_uses_hex_offset() {
        let e = VxfsError::OffsetMismatch {
            base_offset: 0x2000,
            successes: 1,
            failures: 10,
        };
        assert!(e.to_string().contains("0x2000"));
    }
}

use std::path::Path;
use tracing::{debug, info};

use crate::cores::bytescan::strings::resource_hits;
use crate::errors::VxfsError;

use super::rules::RecoverRules;

/// Offset of the first resource-name string in `data`.
///
/// This lands somewhere in the first few table entries; the decoders
/// widen their window around it.
pub fn locate_anchor(data: &[u8], rules: &RecoverRules) -> Option<usize> {
    let hits = resource_hits(
        data,
        rules.thresholds.min_string_len,
        &rules.locator_extensions,
    );
    if let Some(first) = hits.first() {
        debug!(text = %first.text, total = hits.len(), "first resource string");
    }
    hits.first().map(|h| h.offset)
}

pub fn locate_in_candidate(
    candidate: &Path,
    data: &[u8],
    extraction_dir: &Path,
    rules: &RecoverRules,
) -> Result<usize, VxfsError> {
    let anchor = locate_anchor(data, rules).ok_or_else(|| VxfsError::NoCandidateFound {
        extraction_dir: extraction_dir.to_path_buf(),
    })?;
    info!(
        candidate = %candidate.display(),
        anchor = format_args!("0x{:X}", anchor),
        "directory table anchor"
    );
    Ok(anchor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_is_first_matching_string() {
        let mut data = vec![0u8; 0x40];
        data.extend_from_slice(b"banner text\0");
        let expected = data.len();
        data.extend_from_slice(b"style/main.css\0\0\0\0index.htm\0");
        assert_eq!(locate_anchor(&data, &RecoverRules::default()), Some(expected));
    }

    #[test]
    fn no_anchor_means_no_candidate() {
        let err = locate_in_candidate(
            Path::new("blob"),
            b"\0\0nothing\0",
            Path::new("x"),
            &RecoverRules::default(),
        )
        .unwrap_err();
        assert!(matches!(err, VxfsError::NoCandidateFound { .. }));
    }
}

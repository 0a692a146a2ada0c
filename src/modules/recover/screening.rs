use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cores::bytescan::{find_bytes, strings::resource_hits};
use crate::errors::VxfsError;

use super::rules::RecoverRules;

/// Fails with `EncryptedTable` when any extracted file carries a known
/// marker of a hidden file offset table.
pub fn screen_encrypted_table(extraction_dir: &Path, rules: &RecoverRules) -> Result<(), VxfsError> {
    if let Some((path, marker)) = find_marker(extraction_dir, &rules.encrypted_table_markers) {
        return Err(VxfsError::EncryptedTable { path, marker });
    }
    Ok(())
}

fn find_marker(dir: &Path, markers: &[String]) -> Option<(PathBuf, String)> {
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let data = match std::fs::read(entry.path()) {
            Ok(d) => d,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        for marker in markers {
            if find_bytes(&data, marker.as_bytes()).is_some() {
                return Some((entry.path().to_path_buf(), marker.clone()));
            }
        }
    }
    None
}

/// Some images keep the table in the raw firmware; true above the configured hit count.
pub fn firmware_has_table(firmware: &[u8], rules: &RecoverRules) -> bool {
    let hits = resource_hits(
        firmware,
        rules.thresholds.min_string_len,
        &rules.locator_extensions,
    )
    .len();
    debug!(hits, "resource strings in raw firmware");
    hits > rules.thresholds.firmware_self_matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypted_marker_in_nested_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("1F00"), b"\x00\x01des_min_do\x00").unwrap();
        std::fs::write(dir.path().join("200"), b"clean").unwrap();

        let err = screen_encrypted_table(dir.path(), &RecoverRules::default()).unwrap_err();
        match err {
            VxfsError::EncryptedTable { path, marker } => {
                assert!(path.ends_with("1F00"));
                assert_eq!(marker, "des_min_do");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn clean_tree_passes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("200"), b"Decryption for firmware").unwrap();
        assert!(screen_encrypted_table(dir.path(), &RecoverRules::default()).is_ok());
    }

    #[test]
    fn firmware_self_threshold_is_strict() {
        let rules = RecoverRules::default();
        let mut fw = Vec::new();
        for i in 0..10 {
            fw.extend_from_slice(format!("web/img{i}.jpg").as_bytes());
            fw.push(0);
        }
        assert!(!firmware_has_table(&fw, &rules));
        fw.extend_from_slice(b"web/extra.css\0");
        assert!(firmware_has_table(&fw, &rules));
    }
}

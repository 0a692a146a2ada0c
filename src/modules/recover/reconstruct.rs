use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::VxfsError;

use super::model::{
    BlobDir, CopiedFile, EntryMap, FailedCopy, MissingFile, ReconstructionSummary,
};

pub const RESULT_DIR_NAME: &str = "result_vxworks_file";

/// Relative destination for a table name; `None` when it would escape the result tree.
pub fn safe_relative(name: &str) -> Option<PathBuf> {
    let trimmed = name.trim_start_matches('/');
    let mut out = PathBuf::new();
    for comp in Path::new(trimmed).components() {
        match comp {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Copies blobs into named files under `<output_base>/result_vxworks_file`.
pub struct Reconstructor<'a> {
    blobs: &'a BlobDir,
    result_root: PathBuf,
}

impl<'a> Reconstructor<'a> {
    pub fn new(blobs: &'a BlobDir, output_base: &Path) -> Self {
        Self {
            blobs,
            result_root: output_base.join(RESULT_DIR_NAME),
        }
    }

    pub fn run(
        &self,
        entries: &EntryMap,
        base_offset: u64,
        max_offset: u64,
    ) -> Result<ReconstructionSummary, VxfsError> {
        std::fs::create_dir_all(&self.result_root)?;
        let mut summary = ReconstructionSummary {
            result_root: self.result_root.clone(),
            ..Default::default()
        };

        for (name, rel) in entries.iter() {
            let Some(absolute) = rel.checked_add(base_offset).filter(|abs| *abs <= max_offset)
            else {
                summary.out_of_range += 1;
                continue;
            };
            let Some(relative) = safe_relative(name) else {
                warn!(name, "refusing table name outside the result tree");
                summary.failed.push(FailedCopy {
                    name: name.to_string(),
                    error: "unsafe path".to_string(),
                });
                continue;
            };

            let from = self.blobs.path_for(absolute);
            if !from.is_file() {
                debug!(name, expected = %from.display(), "blob missing");
                summary.missing.push(MissingFile {
                    name: name.to_string(),
                    absolute_offset: absolute,
                    expected: from,
                });
                continue;
            }

            let to = self.result_root.join(relative);
            match copy_blob(&from, &to) {
                Ok(()) => {
                    debug!(from = %from.display(), to = %to.display(), "copied");
                    summary.copied.push(CopiedFile {
                        name: name.to_string(),
                        absolute_offset: absolute,
                        from,
                        to,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "copy failed, continuing");
                    summary.failed.push(FailedCopy {
                        name: name.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            copied = summary.copied.len(),
            missing = summary.missing.len(),
            failed = summary.failed.len(),
            root = %self.result_root.display(),
            "reconstruction finished"
        );
        Ok(summary)
    }
}

fn copy_blob(from: &Path, to: &Path) -> Result<(), VxfsError> {
    let wrap = |source| VxfsError::CopyFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }
    std::fs::copy(from, to).map_err(wrap)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsafe_names_are_refused() {
        assert_eq!(safe_relative("/web/index.htm"), Some(PathBuf::from("web/index.htm")));
        assert_eq!(safe_relative("./a.js"), Some(PathBuf::from("a.js")));
        assert_eq!(safe_relative("../etc/passwd"), None);
        assert_eq!(safe_relative("web/../../x.js"), None);
        assert_eq!(safe_relative("/"), None);
    }

    #[test]
    fn copies_present_blobs_and_lists_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let extracted = dir.path().join("_fw.bin.extracted");
        std::fs::create_dir_all(&extracted).unwrap();
        std::fs::write(extracted.join("2100"), b"index").unwrap();
        std::fs::write(extracted.join("2300"), b"logo").unwrap();

        let entries: EntryMap = [
            ("/index.htm", 0x100u64),
            ("images/logo.gif", 0x300),
            ("app.js", 0x200),
            ("far.bin", 0x9000),
        ]
        .into_iter()
        .collect();

        let blobs = BlobDir::new(&extracted);
        let rec = Reconstructor::new(&blobs, dir.path());
        let summary = rec.run(&entries, 0x2000, 0x4000).unwrap();

        assert_eq!(summary.copied.len(), 2);
        assert_eq!(summary.missing.len(), 1);
        assert_eq!(summary.missing[0].name, "app.js");
        assert_eq!(summary.out_of_range, 1);
        let root = dir.path().join(RESULT_DIR_NAME);
        assert_eq!(std::fs::read(root.join("index.htm")).unwrap(), b"index");
        assert_eq!(std::fs::read(root.join("images/logo.gif")).unwrap(), b"logo");
    }
}

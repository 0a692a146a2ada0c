// End-to-end runs over synthetic extractions (no collaborator involved)
#[cfg(test)]
mod tests {
    use crate::errors::VxfsError;
    use crate::modules::recover::extraction::ExtractionOutcome;
    use crate::modules::recover::model::{CandidateSource, Endian, TableFormat, blob_name};
    use crate::modules::recover::pipeline::{run_on_extraction, save_report};
    use crate::modules::recover::reconstruct::RESULT_DIR_NAME;
    use crate::modules::recover::resolver::TrialOutcome;
    use crate::modules::recover::rules::RecoverRules;
    use crate::modules::recover::symbols::{SYMBOL_TABLE_NAME, tests::lzma_alone};
    use std::path::{Path, PathBuf};

    const NAMES: [&str; 6] = [
        "web/logo.jpg",
        "index.htm",
        "web/app.js",
        "img/bg.png",
        "certs/ca.pem",
        "update.bin",
    ];
    const BASE: u64 = 0x2000;

    /// No zero or printable bytes, so the offsets never merge with neighbouring names.
    fn relative(i: usize) -> u32 {
        0x0102_0304 + 0x0101_0101 * i as u32
    }

    /// Format A table at 0x200, zero filled around it.
    fn firmware(endian: Endian) -> Vec<u8> {
        let mut fw = vec![0u8; 0x200];
        for (i, name) in NAMES.iter().enumerate() {
            fw.extend_from_slice(name.as_bytes());
            fw.push(0);
            while fw.len() % 4 != 0 {
                fw.push(0);
            }
            fw.extend_from_slice(&endian.write_u32(relative(i)));
        }
        fw.resize(0x400, 0);
        fw
    }

    fn segment_report(endian_note: &str) -> String {
        format!(
            "\nDECIMAL       HEXADECIMAL     DESCRIPTION\n\
             --------------------------------------------------------------------------------\n\
             8192          0x2000          LZMA compressed data, properties: 0x5D, dictionary size: 8388608 bytes, uncompressed size: 4096 bytes{endian_note}\n\
             200000000     0xBEBC200       JPEG image data, JFIF standard 1.01\n"
        )
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        firmware: PathBuf,
        outcome: ExtractionOutcome,
    }

    /// `vxfile_fw/_fw.bin.extracted` holding a copy of the firmware as blob `0`
    /// and blobs for the entries listed in `present`.
    fn fixture(endian: Endian, endian_note: &str, present: &[usize]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let fw_bytes = firmware(endian);
        let firmware = dir.path().join("fw.bin");
        std::fs::write(&firmware, &fw_bytes).unwrap();

        let root = dir.path().join("vxfile_fw");
        let extraction_dir = root.join("_fw.bin.extracted");
        std::fs::create_dir_all(&extraction_dir).unwrap();
        std::fs::write(extraction_dir.join("0"), &fw_bytes).unwrap();
        for &i in present {
            let abs = u64::from(relative(i)) + BASE;
            std::fs::write(
                extraction_dir.join(blob_name(abs)),
                format!("payload of {}", NAMES[i]),
            )
            .unwrap();
        }

        Fixture {
            _dir: dir,
            firmware,
            outcome: ExtractionOutcome {
                root,
                extraction_dir,
                report_text: segment_report(endian_note),
                reused: true,
            },
        }
    }

    /// Appends a compressed segment holding a symbol table to the raw firmware file.
    fn add_symbol_segment(fx: &Fixture) {
        let mut fw = std::fs::read(&fx.firmware).unwrap();
        fw.extend(lzma_alone(b"memcpy\0bzero\0printf\0"));
        fw.extend_from_slice(&[0x5a, 0x00, 0x00, 0x80, 0xff]);
        std::fs::write(&fx.firmware, fw).unwrap();
    }

    fn result_root(outcome: &ExtractionOutcome) -> PathBuf {
        outcome.root.join(RESULT_DIR_NAME)
    }

    #[test]
    fn half_present_blobs_are_reconstructed_without_abort() {
        let fx = fixture(Endian::Big, "", &[0, 2, 4]);
        let report =
            run_on_extraction(&fx.firmware, &fx.outcome, &RecoverRules::default(), false).unwrap();

        assert_eq!(report.candidate.source, CandidateSource::FuzzyScore);
        assert!(report.candidate.path.ends_with("0"));
        assert_eq!(report.anchor, 0x200);
        assert_eq!(report.format, TableFormat::FormatA);
        assert_eq!(report.entries, 6);
        assert_eq!(report.base_offset, BASE);
        // three hits never reach the threshold, so the base comes from the partial fallback
        assert_eq!(report.trials.len(), 2);
        assert_eq!(report.trials[0].outcome, TrialOutcome::Partial);
        assert_eq!(report.reconstruction.copied.len(), 3);
        assert_eq!(report.reconstruction.missing.len(), 3);
        assert!(report.reconstruction.failed.is_empty());
        assert_eq!(
            report.main_program.as_deref(),
            Some(fx.outcome.extraction_dir.join("2000").as_path())
        );
        assert!(report.symbol_table.is_none());
        assert_eq!(report.hints.len(), 2);

        let root = result_root(&fx.outcome);
        for i in [0, 2, 4] {
            let body = std::fs::read_to_string(root.join(NAMES[i])).unwrap();
            assert_eq!(body, format!("payload of {}", NAMES[i]));
        }
        assert!(!root.join("index.htm").exists());
    }

    #[test]
    fn symbol_table_lands_next_to_the_result_tree() {
        let fx = fixture(Endian::Big, "", &[0, 2, 4]);
        add_symbol_segment(&fx);
        let report =
            run_on_extraction(&fx.firmware, &fx.outcome, &RecoverRules::default(), false).unwrap();
        let expected = fx.outcome.root.join(SYMBOL_TABLE_NAME);
        assert_eq!(report.symbol_table.as_deref(), Some(expected.as_path()));
        assert_eq!(std::fs::read(expected).unwrap(), b"memcpy\0bzero\0printf\0");
    }

    #[test]
    fn symbol_table_write_failure_does_not_stop_recovery() {
        let fx = fixture(Endian::Big, "", &[0, 2, 4]);
        add_symbol_segment(&fx);
        // a directory in the way makes the write fail
        std::fs::create_dir_all(fx.outcome.root.join(SYMBOL_TABLE_NAME)).unwrap();
        let report =
            run_on_extraction(&fx.firmware, &fx.outcome, &RecoverRules::default(), false).unwrap();
        assert!(report.symbol_table.is_none());
        assert_eq!(report.base_offset, BASE);
        assert_eq!(report.reconstruction.copied.len(), 3);
    }

    #[test]
    fn little_endian_images_resolve_too() {
        let fx = fixture(Endian::Little, ", little endian", &[0, 1, 2, 3, 4, 5]);
        let report =
            run_on_extraction(&fx.firmware, &fx.outcome, &RecoverRules::default(), true).unwrap();
        assert_eq!(report.endian, Endian::Little);
        assert_eq!(report.reconstruction.copied.len(), 6);
        assert_eq!(report.trials.len(), 1);
    }

    #[test]
    fn missing_blobs_leave_the_offset_unresolved() {
        let fx = fixture(Endian::Big, "", &[]);
        let err = run_on_extraction(&fx.firmware, &fx.outcome, &RecoverRules::default(), false)
            .unwrap_err();
        assert!(matches!(err, VxfsError::UnresolvedOffset { tried: 2, entries: 6 }));
        assert!(err.is_fatal());
    }

    #[test]
    fn encrypted_marker_stops_before_scoring() {
        let fx = fixture(Endian::Big, "", &[0]);
        std::fs::write(
            fx.outcome.extraction_dir.join("7F00"),
            b"\0Decryption for config.bin\0",
        )
        .unwrap();
        let err = run_on_extraction(&fx.firmware, &fx.outcome, &RecoverRules::default(), false)
            .unwrap_err();
        assert!(matches!(err, VxfsError::EncryptedTable { .. }));
    }

    #[test]
    fn no_plaintext_table_is_reported() {
        let fx = fixture(Endian::Big, "", &[]);
        std::fs::remove_file(fx.outcome.extraction_dir.join("0")).unwrap();
        let blank = fx.firmware.with_file_name("blank.bin");
        std::fs::write(&blank, vec![0u8; 0x100]).unwrap();
        let err = run_on_extraction(&blank, &fx.outcome, &RecoverRules::default(), false)
            .unwrap_err();
        assert!(matches!(err, VxfsError::NoCandidateFound { .. }));
    }

    #[test]
    fn report_json_is_written() {
        let fx = fixture(Endian::Big, "", &[0, 2, 4]);
        let report =
            run_on_extraction(&fx.firmware, &fx.outcome, &RecoverRules::default(), false).unwrap();
        let out = fx.outcome.root.join("reports/run.json");
        save_report(&out, &report).unwrap();

        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(v["base_offset"], 8192);
        assert_eq!(v["format"], "FormatA");
        assert_eq!(v["reconstruction"]["copied"].as_array().unwrap().len(), 3);
        assert_eq!(v["sha256"].as_str().unwrap().len(), 64);
        assert!(Path::new(v["extraction_dir"].as_str().unwrap()).ends_with("_fw.bin.extracted"));
    }
}

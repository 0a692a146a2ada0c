use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::VxfsError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// Minimum printable run length for the string scan.
    pub min_string_len: usize,
    pub min_candidate_matches: usize,
    /// The firmware itself is the candidate when it has more hits than this.
    pub firmware_self_matches: usize,
    pub resolver_accept_successes: usize,
    pub resolver_max_consecutive_failures: usize,
    pub format_probe_len: usize,
    pub format_probe_zero_run: usize,
    pub decode_margin: usize,
    pub decode_window: usize,
    pub minifs_search_back: usize,
    pub minifs_skip: usize,
    pub min_name_len: usize,
    pub max_name_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSettings {
    pub tool: String,
    pub timeout_secs: u64,
    pub root_prefix: String,
    pub double_compression_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverRules {
    pub fuzzy_extensions: Vec<String>,
    pub locator_extensions: Vec<String>,
    pub web_asset_extensions: Vec<String>,
    pub excluded_kinds: Vec<String>,
    pub encrypted_table_markers: Vec<String>,
    pub minifs_marker: String,
    /// Hex-encoded start of an LZMA-compressed segment.
    pub compressed_segment_marker: String,
    pub symbol_marker: String,
    pub thresholds: RuleThresholds,
    pub extraction: ExtractionSettings,
}

impl Default for RecoverRules {
    fn default() -> Self {
        Self {
            fuzzy_extensions: vec![
                ".jpg".to_string(),
                ".png".to_string(),
                ".js".to_string(),
                ".cer".to_string(),
                ".pem".to_string(),
                ".bin".to_string(),
            ],
            locator_extensions: vec![
                ".jpg".to_string(),
                ".png".to_string(),
                ".js".to_string(),
                ".css".to_string(),
                ".htm".to_string(),
                ".cer".to_string(),
                ".pem".to_string(),
                ".bin".to_string(),
            ],
            web_asset_extensions: vec![
                "gif".to_string(),
                "jpg".to_string(),
                "js".to_string(),
                "css".to_string(),
            ],
            excluded_kinds: vec![
                "html".to_string(),
                "xml".to_string(),
                "json".to_string(),
                "css".to_string(),
            ],
            encrypted_table_markers: vec![
                "Decryption for config.bin".to_string(),
                "des_min_do".to_string(),
            ],
            minifs_marker: "MINIFS".to_string(),
            compressed_segment_marker: "5a000080".to_string(),
            symbol_marker: "bzero".to_string(),
            thresholds: RuleThresholds {
                min_string_len: 5,
                min_candidate_matches: 5,
                firmware_self_matches: 10,
                resolver_accept_successes: 5,
                resolver_max_consecutive_failures: 10,
                format_probe_len: 0x50,
                format_probe_zero_run: 4,
                decode_margin: 0x50,
                decode_window: 0x10000,
                minifs_search_back: 0x100,
                minifs_skip: 0x20,
                min_name_len: 5,
                max_name_len: 0x100,
            },
            extraction: ExtractionSettings {
                tool: "binwalk".to_string(),
                timeout_secs: 600,
                root_prefix: "vxfile_".to_string(),
                double_compression_suffix: ".7z".to_string(),
            },
        }
    }
}

impl RecoverRules {
    pub fn load(path: &Path) -> Result<Self, VxfsError> {
        let raw = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&raw)
                .map_err(|e| VxfsError::ParseError(format!("invalid YAML rules file: {}", e))),
            "json" => serde_json::from_str(&raw)
                .map_err(|e| VxfsError::ParseError(format!("invalid JSON rules file: {}", e))),
            _ => {
                if raw.trim_start().starts_with('{') {
                    serde_json::from_str(&raw).map_err(|e| {
                        VxfsError::ParseError(format!(
                            "unable to parse rules as JSON (extension not set): {}",
                            e
                        ))
                    })
                } else {
                    serde_yaml::from_str(&raw).map_err(|e| {
                        VxfsError::ParseError(format!(
                            "unable to parse rules as YAML (extension not set): {}",
                            e
                        ))
                    })
                }
            }
        }
    }

    pub fn write_template(path: &Path) -> Result<(), VxfsError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("yaml")
            .to_ascii_lowercase();
        let rules = Self::default();
        let content = if ext == "json" {
            serde_json::to_string_pretty(&rules).map_err(|e| {
                VxfsError::ParseError(format!("serialize rules to JSON failed: {}", e))
            })?
        } else {
            serde_yaml::to_string(&rules).map_err(|e| {
                VxfsError::ParseError(format!("serialize rules to YAML failed: {}", e))
            })?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn segment_marker_bytes(&self) -> Result<Vec<u8>, VxfsError> {
        hex::decode(self.compressed_segment_marker.trim()).map_err(|e| {
            VxfsError::ParseError(format!(
                "invalid compressed_segment_marker '{}': {}",
                self.compressed_segment_marker, e
            ))
        })
    }
}

use std::path::{Path, PathBuf};
use tracing::{debug, info};
use xz2::stream::{Action, Status, Stream};

use crate::cores::bytescan::{find_all, find_bytes};
use crate::errors::VxfsError;

use super::rules::RecoverRules;

pub const SYMBOL_TABLE_NAME: &str = "SYMBOL_Table";

/// Decodes one LZMA/XZ stream from the start of `segment`; trailing bytes are ignored.
pub fn decompress_segment(segment: &[u8]) -> Option<Vec<u8>> {
    let mut stream = Stream::new_auto_decoder(u64::MAX, 0).ok()?;
    let mut out = Vec::with_capacity(segment.len().saturating_mul(4).max(4096));
    let mut input = segment;
    loop {
        let before = stream.total_in();
        let status = stream.process_vec(input, &mut out, Action::Run).ok()?;
        let consumed = usize::try_from(stream.total_in() - before).ok()?;
        input = &input[consumed..];
        if matches!(status, Status::StreamEnd) {
            return Some(out);
        }
        if out.len() == out.capacity() {
            out.reserve(out.capacity());
            continue;
        }
        if input.is_empty() || consumed == 0 {
            return None;
        }
    }
}

/// First compressed segment whose payload mentions the symbol marker.
pub fn find_symbol_table(firmware: &[u8], rules: &RecoverRules) -> Result<Option<Vec<u8>>, VxfsError> {
    let marker = rules.segment_marker_bytes()?;
    let starts = find_all(firmware, &marker);
    if starts.len() < 2 {
        debug!(segments = starts.len(), "not enough compressed segment markers");
        return Ok(None);
    }
    for pair in starts.windows(2) {
        let Some(payload) = decompress_segment(&firmware[pair[0]..pair[1]]) else {
            continue;
        };
        if find_bytes(&payload, rules.symbol_marker.as_bytes()).is_some() {
            info!(
                segment = format_args!("0x{:X}", pair[0]),
                size = payload.len(),
                "symbol table segment found"
            );
            return Ok(Some(payload));
        }
    }
    Ok(None)
}

/// Extracts the symbol table into `out_dir/SYMBOL_Table` when one exists.
pub fn recover_symbol_table(
    firmware: &[u8],
    out_dir: &Path,
    rules: &RecoverRules,
) -> Result<Option<PathBuf>, VxfsError> {
    let Some(payload) = find_symbol_table(firmware, rules)? else {
        info!("no symbol table segment");
        return Ok(None);
    };
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(SYMBOL_TABLE_NAME);
    std::fs::write(&path, payload)?;
    Ok(Some(path))
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use std::io::Write;
    use xz2::stream::LzmaOptions;

    /// `.lzma` stream whose header starts with 5A 00 00 80 (lc=0 lp=0 pb=2, 8 MiB dictionary).
    pub(crate) fn lzma_alone(payload: &[u8]) -> Vec<u8> {
        let mut opts = LzmaOptions::new_preset(6).unwrap();
        opts.literal_context_bits(0)
            .literal_position_bits(0)
            .position_bits(2)
            .dict_size(0x0080_0000);
        let stream = Stream::new_lzma_encoder(&opts).unwrap();
        let mut enc = xz2::write::XzEncoder::new_stream(Vec::new(), stream);
        enc.write_all(payload).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn encoded_segments_carry_the_marker() {
        let seg = lzma_alone(b"hello");
        assert_eq!(&seg[..4], &[0x5a, 0x00, 0x00, 0x80]);
        assert_eq!(decompress_segment(&seg).as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn picks_first_segment_with_symbols() {
        let rules = RecoverRules::default();
        let mut fw = b"\x27\x05\x19\x56junk".to_vec();
        fw.extend(lzma_alone(b"plain kernel data, nothing special"));
        fw.extend(lzma_alone(b"memcpy\0bzero\0printf\0"));
        fw.extend_from_slice(&[0x5a, 0x00, 0x00, 0x80, 0xff]);

        let dir = tempfile::tempdir().unwrap();
        let path = recover_symbol_table(&fw, dir.path(), &rules).unwrap().unwrap();
        assert!(path.ends_with(SYMBOL_TABLE_NAME));
        assert_eq!(std::fs::read(path).unwrap(), b"memcpy\0bzero\0printf\0");
    }

    #[test]
    fn garbage_segments_are_skipped() {
        let rules = RecoverRules::default();
        let fw = [
            0x5a, 0x00, 0x00, 0x80, 0x01, 0x02, 0x5a, 0x00, 0x00, 0x80, 0x03,
        ];
        let dir = tempfile::tempdir().unwrap();
        assert!(recover_symbol_table(&fw, dir.path(), &rules).unwrap().is_none());
        assert!(!dir.path().join(SYMBOL_TABLE_NAME).exists());
    }
}

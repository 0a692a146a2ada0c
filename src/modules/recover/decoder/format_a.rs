use tracing::{debug, trace};

use crate::cores::bytescan::{Endian, align_up, skip_zeros};
use crate::modules::recover::model::EntryMap;
use crate::modules::recover::rules::RuleThresholds;

use super::is_table_filename;

/// Cursor over an interleaved `name \0.. offset` table.
pub struct InterleavedScanner<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
    endian: Endian,
    min_name_len: usize,
    max_name_len: usize,
}

impl<'a> InterleavedScanner<'a> {
    pub fn new(data: &'a [u8], anchor: usize, endian: Endian, t: &RuleThresholds) -> Self {
        let start = anchor.saturating_sub(t.decode_margin);
        let end = start.saturating_add(t.decode_window).min(data.len());
        Self {
            data,
            pos: start,
            end,
            endian,
            min_name_len: t.min_name_len,
            max_name_len: t.max_name_len,
        }
    }

    /// Non-zero run starting at `from`, bounded by the window.
    fn token_end(&self, from: usize) -> usize {
        let mut cur = from;
        while cur < self.end && self.data[cur] != 0 {
            cur += 1;
        }
        cur
    }
}

impl Iterator for InterleavedScanner<'_> {
    type Item = (String, u64);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.end {
            let start = align_up(skip_zeros(self.data, self.pos, self.end), 4);
            let stop = self.token_end(start);
            let token = self.data.get(start..stop).unwrap_or_default();

            if token.len() >= self.max_name_len {
                trace!(at = start, "oversized token, leaving table area");
                self.pos = stop + 1;
                continue;
            }

            let name = match std::str::from_utf8(token) {
                Ok(s) if s.len() >= self.min_name_len && is_table_filename(s) => s,
                _ => {
                    self.pos = stop + 1;
                    continue;
                }
            };

            let value_at = align_up(skip_zeros(self.data, stop, self.end), 4);
            self.pos = value_at + 4;
            match self.endian.read_u32(self.data, value_at) {
                Some(rel) => return Some((name.to_string(), u64::from(rel))),
                None => debug!(name, "offset word past end of buffer"),
            }
        }
        None
    }
}

/// Decodes a Format A table around `anchor`. Never fails; an empty map means nothing matched.
pub fn decode(data: &[u8], anchor: usize, endian: Endian, t: &RuleThresholds) -> EntryMap {
    let mut entries = EntryMap::new();
    for (name, rel) in InterleavedScanner::new(data, anchor, endian, t) {
        debug!(name = %name, relative = format_args!("0x{:X}", rel), "format A entry");
        entries.merge_min(name, rel);
    }
    entries
}

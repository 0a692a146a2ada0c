//! Byte-level helpers shared by the table locator and decoders.

pub mod strings;

pub use strings::{StringHit, extract_strings, trailing_token_matches};

use memchr::memmem;
use serde::Serialize;

/// Processor byte order used to read table integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    /// Reads a u32 at `pos`, `None` when it would run past the buffer.
    pub fn read_u32(self, data: &[u8], pos: usize) -> Option<u32> {
        let end = pos.checked_add(4)?;
        let raw: [u8; 4] = data.get(pos..end)?.try_into().ok()?;
        Some(match self {
            Endian::Big => u32::from_be_bytes(raw),
            Endian::Little => u32::from_le_bytes(raw),
        })
    }

    pub fn write_u32(self, value: u32) -> [u8; 4] {
        match self {
            Endian::Big => value.to_be_bytes(),
            Endian::Little => value.to_le_bytes(),
        }
    }
}

/// Rounds `pos` up to the next multiple of `align`.
pub fn align_up(pos: usize, align: usize) -> usize {
    match pos % align {
        0 => pos,
        rem => pos + (align - rem),
    }
}

/// First position `>= pos` and `< end` holding a non-zero byte, or `end`.
pub fn skip_zeros(data: &[u8], pos: usize, end: usize) -> usize {
    let end = end.min(data.len());
    let mut cur = pos;
    while cur < end && data[cur] == 0 {
        cur += 1;
    }
    cur.max(pos)
}

pub fn contains_zero_run(window: &[u8], run: usize) -> bool {
    run > 0 && window.windows(run).any(|w| w.iter().all(|&b| b == 0))
}

pub fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    memmem::find(haystack, needle)
}

/// Non-overlapping occurrences of `needle`, in order.
pub fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    memmem::find_iter(haystack, needle).collect()
}

/// NUL-terminated string at `pos`; `None` when `pos` is out of range or no terminator follows.
pub fn c_string_at(data: &[u8], pos: usize) -> Option<String> {
    let tail = data.get(pos..)?;
    let len = memchr::memchr(0, tail)?;
    Some(String::from_utf8_lossy(&tail[..len]).into_owned())
}

/// grep-style binary sniff: any NUL byte in the first 8 KiB.
pub fn looks_binary(data: &[u8]) -> bool {
    let head = &data[..data.len().min(8192)];
    memchr::memchr(0, head).is_some()
}

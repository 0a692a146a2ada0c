use tracing::{debug, info};

use crate::cores::bytescan::{Endian, align_up, c_string_at, find_bytes};
use crate::errors::VxfsError;
use crate::modules::recover::model::EntryMap;
use crate::modules::recover::rules::RuleThresholds;

const RECORD_LEN: usize = 20;
const CHUNK_INDEX_STRIDE: u64 = 12;

/// Positions of the name table and record table inside the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitLayout {
    pub names_start: usize,
    pub names_end: usize,
    pub records_start: usize,
    pub files_count: u32,
}

/// One fixed-size record of the file table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRecord {
    pub path_off: u32,
    pub name_off: u32,
    pub chunk_number: u32,
    pub offset_within_chunk: u32,
    pub file_size: u32,
}

impl FileRecord {
    pub fn read(data: &[u8], pos: usize, endian: Endian) -> Option<Self> {
        Some(Self {
            path_off: endian.read_u32(data, pos)?,
            name_off: endian.read_u32(data, pos + 4)?,
            chunk_number: endian.read_u32(data, pos + 8)?,
            offset_within_chunk: endian.read_u32(data, pos + 12)?,
            file_size: endian.read_u32(data, pos + 16)?,
        })
    }
}

fn failure(reason: impl Into<String>) -> VxfsError {
    VxfsError::DecodeFailure {
        format: "format B".to_string(),
        reason: reason.into(),
    }
}

pub fn locate_layout(
    data: &[u8],
    anchor: usize,
    endian: Endian,
    t: &RuleThresholds,
    marker: &[u8],
) -> Result<SplitLayout, VxfsError> {
    if anchor > data.len() {
        return Err(failure(format!("anchor 0x{:X} is past the end of the buffer", anchor)));
    }

    let back = anchor.saturating_sub(t.minifs_search_back);
    let start = match find_bytes(&data[back..anchor], marker) {
        Some(rel) => {
            let at = back + rel;
            debug!(marker = at, "filesystem marker found before anchor");
            at + t.minifs_skip
        }
        None => anchor,
    };

    let mut names_start = start.saturating_sub(2).min(data.len());
    while names_start > 0 && data[names_start - 1] != 0 {
        names_start -= 1;
    }
    let names_start = align_up(names_start, 4);

    if names_start < 12 {
        return Err(failure("no room for the file count before the name table"));
    }
    let files_count = endian
        .read_u32(data, names_start - 12)
        .ok_or_else(|| failure("file count is out of range"))?;

    let window_end = start.saturating_add(t.decode_window).min(data.len());
    let names_end = (names_start..window_end)
        .find(|&p| {
            data[p] != 0 && data.get(p + 1) == Some(&0) && data.get(p + 2) == Some(&0)
        })
        .ok_or_else(|| failure("name table terminator not found in scan window"))?;

    Ok(SplitLayout {
        names_start,
        names_end,
        records_start: align_up(names_end + 1, 4),
        files_count,
    })
}

/// Decodes a Format B table. Missing header pieces fail the table; bad records are skipped.
pub fn decode(
    data: &[u8],
    anchor: usize,
    endian: Endian,
    t: &RuleThresholds,
    marker: &[u8],
) -> Result<EntryMap, VxfsError> {
    let layout = locate_layout(data, anchor, endian, t, marker)?;
    info!(
        names_start = format_args!("0x{:X}", layout.names_start),
        names_end = format_args!("0x{:X}", layout.names_end),
        records_start = format_args!("0x{:X}", layout.records_start),
        files_count = layout.files_count,
        "format B layout"
    );

    let chunk_index =
        layout.records_start as u64 + u64::from(layout.files_count) * RECORD_LEN as u64;
    let mut entries = EntryMap::new();
    let mut pos = layout.records_start;

    for _ in 0..layout.files_count {
        let Some(record) = FileRecord::read(data, pos, endian) else {
            debug!(at = pos, "record table runs past the buffer");
            break;
        };
        pos += RECORD_LEN;

        let path = c_string_at(data, layout.names_start + record.path_off as usize)
            .unwrap_or_default();
        let file = c_string_at(data, layout.names_start + record.name_off as usize)
            .unwrap_or_default();
        let name = if path.is_empty() {
            file
        } else {
            format!("{}/{}", path, file)
        };
        if name.is_empty() {
            debug!(?record, "record without a name");
            continue;
        }

        let slot = chunk_index
            + u64::from(record.chunk_number) * CHUNK_INDEX_STRIDE
            + u64::from(record.offset_within_chunk);
        let Some(rel) = usize::try_from(slot)
            .ok()
            .and_then(|slot| endian.read_u32(data, slot))
        else {
            debug!(name = %name, slot, "chunk slot out of range");
            continue;
        };
        debug!(name = %name, relative = format_args!("0x{:X}", rel), size = record.file_size, "format B entry");
        entries.merge_min(name, u64::from(rel));
    }

    Ok(entries)
}

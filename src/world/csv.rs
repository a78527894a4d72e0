//! Minimal CSV helpers shared by the conversion steps
//!
//! Files are plain comma-separated text without quoting. Block states such as
//! `minecraft:oak_stairs[facing=east,half=top]` contain commas, so the last
//! column of a row absorbs everything after the preceding separators.

use crate::error::{HubError, Result};
use std::{collections::BTreeMap, path::Path};
use tracing::debug;

/// Column layout assumed when a file has no recognizable header
pub const DEFAULT_COLUMNS: [&str; 4] = ["x", "y", "z", "block"];

/// Case-insensitive column lookup
pub fn find_column(header: &[&str], name: &str) -> Option<usize> {
    header
        .iter()
        .position(|column| column.trim().eq_ignore_ascii_case(name))
}

/// Split a row into at most `columns` fields
pub fn split_row(line: &str, columns: usize) -> Vec<&str> {
    line.splitn(columns.max(1), ',').collect()
}

/// Load a `key,value` file with a header line. Blank keys are dropped and
/// later rows win.
pub fn read_pairs(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| HubError::file_system("read", path.to_path_buf(), e))?;

    let mut pairs = BTreeMap::new();
    for line in content.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 2 {
            continue;
        }
        let key = fields[0].trim();
        if !key.is_empty() {
            pairs.insert(key.to_string(), fields[1].trim().to_string());
        }
    }

    debug!("Loaded {} pairs from {}", pairs.len(), path.display());
    Ok(pairs)
}

/// Drop a trailing `[state]` from a block id
pub fn strip_block_state(block: &str) -> &str {
    let trimmed = block.trim();
    trimmed.split_once('[').map_or(trimmed, |(base, _)| base)
}

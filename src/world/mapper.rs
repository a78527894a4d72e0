//! Minecraft → Hytale block mapping
//!
//! Collects every distinct block id seen in the extracted region CSVs and
//! pairs it with a Hytale block id, either from the overrides file or by
//! token-set similarity against the known Hytale ids.

use crate::{
    config::ConverterConfig,
    error::{HubError, Result},
    utils::fs::FileSystemUtils,
    world::{
        csv::{self, DEFAULT_COLUMNS},
        tokens::Tokenizer,
    },
};
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};
use tracing::{debug, info, instrument, warn};

const DEFAULT_BLOCK_IDS: &str = include_str!("../../resources/default-block-ids.txt");
const DEFAULT_BLOCK_OVERRIDES: &str = include_str!("../../resources/default-block-overrides.csv");

/// Targets never produced by the heuristic or accepted as overrides
const BANNED_TARGETS: &[&str] = &["Wood_Sticks"];

/// How a mapping row was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Manual,
    Heuristic,
    Unmapped,
}

impl fmt::Display for MatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchSource::Manual => "manual",
            MatchSource::Heuristic => "heuristic",
            MatchSource::Unmapped => "unmapped",
        };
        f.write_str(name)
    }
}

/// One line of the mapping file
#[derive(Debug, Clone, PartialEq)]
pub struct MappingRow {
    pub minecraft_block: String,
    pub hytale_block: String,
    pub score: f32,
    pub source: MatchSource,
}

impl MappingRow {
    fn to_csv(&self) -> String {
        format!(
            "{},{},{},{}",
            self.minecraft_block,
            self.hytale_block,
            format_score(self.score),
            self.source
        )
    }
}

/// Counts reported by a mapping run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapResult {
    pub unique_blocks: usize,
    pub mapping_rows: usize,
    pub unmatched: usize,
    pub target_blocks: usize,
}

impl fmt::Display for MapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unique={} rows={} unmatched={} hytale_blocks={}",
            self.unique_blocks, self.mapping_rows, self.unmatched, self.target_blocks
        )
    }
}

/// Hytale id with its normalized tokens
#[derive(Debug)]
struct Target {
    id: String,
    tokens: HashSet<String>,
}

/// Builds the block mapping file
#[derive(Debug)]
pub struct BlockMapper {
    config: ConverterConfig,
    tokenizer: Tokenizer,
    fs_utils: FileSystemUtils,
}

impl BlockMapper {
    pub fn new(config: ConverterConfig) -> Result<Self> {
        Ok(Self {
            config,
            tokenizer: Tokenizer::new()?,
            fs_utils: FileSystemUtils::new(),
        })
    }

    /// Read region CSVs, match every block and write both output files
    #[instrument(skip(self))]
    pub fn map_blocks(&self) -> Result<MapResult> {
        let counts = self.count_blocks(&self.config.mc_regions_dir())?;
        if counts.is_empty() {
            info!("No extracted blocks found, nothing to map");
            return Ok(MapResult::default());
        }

        let overrides = self.load_overrides(&self.config.block_overrides_path())?;
        let targets = self.load_targets(&self.config.block_ids_path())?;
        let known: HashSet<&str> = targets.iter().map(|t| t.id.as_str()).collect();

        let mut blocks: Vec<&String> = counts.keys().collect();
        blocks.sort_by_key(|block| block.to_lowercase());

        let mut rows = Vec::with_capacity(blocks.len());
        let mut unmatched = Vec::new();
        for block in blocks {
            if let Some(target) = overrides.get(block.as_str()) {
                if target.is_empty() || !known.contains(target.as_str()) {
                    warn!("Override for {} points at unknown block '{}'", block, target);
                    unmatched.push(block.clone());
                }
                rows.push(MappingRow {
                    minecraft_block: block.clone(),
                    hytale_block: target.clone(),
                    score: 1.0,
                    source: MatchSource::Manual,
                });
                continue;
            }

            let row = self.match_block(block, &targets);
            if row.source == MatchSource::Unmapped {
                unmatched.push(block.clone());
            }
            rows.push(row);
        }

        self.write_mapping(&self.config.block_mapping_path(), &rows)?;
        self.write_unmatched(&self.config.unmapped_blocks_path(), &unmatched)?;

        Ok(MapResult {
            unique_blocks: counts.len(),
            mapping_rows: rows.len(),
            unmatched: unmatched.len(),
            target_blocks: targets.len(),
        })
    }

    /// Occurrences of each base block id across every CSV in `dir`
    pub fn count_blocks(&self, dir: &Path) -> Result<BTreeMap<String, u64>> {
        let files = self
            .fs_utils
            .list_files_with_extension(dir, "csv")
            .map_err(|e| HubError::file_system("list", dir.to_path_buf(), e))?;

        let mut counts = BTreeMap::new();
        for file in &files {
            match self.fs_utils.read_file_to_string(file) {
                Ok(content) => count_csv_blocks(&content, &mut counts),
                Err(e) => warn!("Failed to read {}: {}", file.display(), e),
            }
        }
        debug!("Counted {} distinct blocks in {} files", counts.len(), files.len());
        Ok(counts)
    }

    /// Manual `minecraft_block → hytale_block` pairs, bootstrapping the file
    pub fn load_overrides(&self, path: &Path) -> Result<BTreeMap<String, String>> {
        self.bootstrap(path, DEFAULT_BLOCK_OVERRIDES)?;
        csv::read_pairs(path)
    }

    /// Known Hytale ids in sorted order, minus banned targets
    pub fn load_block_ids(&self, path: &Path) -> Result<Vec<String>> {
        self.bootstrap(path, DEFAULT_BLOCK_IDS)?;
        let content = self
            .fs_utils
            .read_file_to_string(path)
            .map_err(|e| HubError::file_system("read", path.to_path_buf(), e))?;

        let ids: BTreeSet<&str> = content
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty() && !BANNED_TARGETS.contains(id))
            .collect();
        Ok(ids.into_iter().map(str::to_string).collect())
    }

    fn load_targets(&self, path: &Path) -> Result<Vec<Target>> {
        let targets = self
            .load_block_ids(path)?
            .into_iter()
            .map(|id| Target {
                tokens: self.tokenizer.normalized(&id).into_iter().collect(),
                id,
            })
            .collect();
        Ok(targets)
    }

    /// Best heuristic match for one Minecraft block
    fn match_block(&self, block: &str, targets: &[Target]) -> MappingRow {
        let tokens = self.minecraft_tokens(block);

        let mut best_score = 0.0f32;
        let mut best: Option<&Target> = None;
        for target in targets {
            let score = dice_score(&tokens, &target.tokens);
            if score > best_score {
                best_score = score;
                best = Some(target);
            }
        }

        let score = round_score(best_score);
        match best {
            Some(target) if best_score >= self.config.map_min_score => MappingRow {
                minecraft_block: block.to_string(),
                hytale_block: target.id.clone(),
                score,
                source: MatchSource::Heuristic,
            },
            _ => MappingRow {
                minecraft_block: block.to_string(),
                hytale_block: String::new(),
                score,
                source: MatchSource::Unmapped,
            },
        }
    }

    fn minecraft_tokens(&self, block: &str) -> HashSet<String> {
        if block.starts_with("legacy:") {
            return HashSet::from(["legacy".to_string()]);
        }
        let name = block.split_once(':').map_or(block, |(_, name)| name);
        let mut tokens: HashSet<String> = self.tokenizer.normalized(name).into_iter().collect();
        if name.ends_with("_wood") {
            tokens.insert("trunk".to_string());
        }
        tokens
    }

    fn bootstrap(&self, path: &Path, contents: &str) -> Result<()> {
        let written = self
            .fs_utils
            .write_if_missing(path, contents)
            .map_err(|e| HubError::file_system("write", path.to_path_buf(), e))?;
        if written {
            info!("Wrote default {}", path.display());
        }
        Ok(())
    }

    fn write_mapping(&self, path: &Path, rows: &[MappingRow]) -> Result<()> {
        let mut lines = vec!["minecraft_block,hytale_block,score,source".to_string()];
        lines.extend(rows.iter().map(MappingRow::to_csv));
        self.write_lines(path, &lines)
    }

    fn write_unmatched(&self, path: &Path, blocks: &[String]) -> Result<()> {
        let mut lines = vec!["minecraft_block".to_string()];
        lines.extend(blocks.iter().cloned());
        self.write_lines(path, &lines)
    }

    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<()> {
        let io_err = |e| HubError::file_system("write", path.to_path_buf(), e);
        if let Some(parent) = path.parent() {
            self.fs_utils.create_dir_all(parent).map_err(io_err)?;
        }

        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        for line in lines {
            writeln!(writer, "{line}").map_err(io_err)?;
        }
        writer.flush().map_err(io_err)?;
        debug!("Wrote {} lines to {}", lines.len(), path.display());
        Ok(())
    }
}

/// Add the blocks of one region CSV to `counts`
fn count_csv_blocks(content: &str, counts: &mut BTreeMap<String, u64>) {
    let mut lines = content.lines();
    let Some(header_line) = lines.next() else {
        return;
    };
    let header: Vec<&str> = header_line.split(',').collect();

    let (block_idx, columns) = match csv::find_column(&header, "block") {
        Some(idx) => (idx, header.len()),
        None => {
            // Headerless: the first line is already a data row
            let row = csv::split_row(header_line, DEFAULT_COLUMNS.len());
            record_block(row.get(3).copied(), counts);
            (3, DEFAULT_COLUMNS.len())
        }
    };

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let row = csv::split_row(line, columns);
        record_block(row.get(block_idx).copied(), counts);
    }
}

fn record_block(raw: Option<&str>, counts: &mut BTreeMap<String, u64>) {
    let block = raw.map(base_id).unwrap_or_default();
    if !block.is_empty() {
        *counts.entry(block).or_insert(0) += 1;
    }
}

/// Block id without state, namespaced; legacy ids pass through untouched
pub fn base_id(block: &str) -> String {
    let trimmed = block.trim();
    if trimmed.is_empty() || trimmed.starts_with("legacy:") {
        return trimmed.to_string();
    }
    let base = csv::strip_block_state(trimmed);
    if base.contains(':') {
        base.to_string()
    } else {
        format!("minecraft:{base}")
    }
}

/// Sørensen–Dice coefficient of two token sets
pub fn dice_score(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let overlap = a.intersection(b).count();
    if overlap == 0 {
        return 0.0;
    }
    (2.0 * overlap as f32) / (a.len() + b.len()) as f32
}

fn round_score(score: f32) -> f32 {
    (score * 1000.0).round() / 1000.0
}

/// Scores always carry a decimal point: `1.0`, `0.667`
fn format_score(score: f32) -> String {
    if score.fract() == 0.0 {
        format!("{score:.1}")
    } else {
        score.to_string()
    }
}

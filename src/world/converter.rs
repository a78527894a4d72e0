//! Rewrites extracted region CSVs with Hytale block ids

use crate::{
    config::ConverterConfig,
    error::{HubError, Result},
    utils::fs::FileSystemUtils,
    world::csv::{self, DEFAULT_COLUMNS},
};
use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};
use tracing::{debug, info, instrument, warn};

/// Written when neither the mapping nor the configured default has a block
pub const UNMAPPED_VALUE: &str = "UNMAPPED";
const OUTPUT_BLOCK_COLUMN: &str = "hytale_block";
const OUTPUT_PREFIX: &str = "hytale-region-";

/// Totals over a conversion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    pub files: u64,
    pub rows: u64,
    pub unmapped: u64,
    pub errors: u64,
}

impl ConvertSummary {
    fn failed() -> Self {
        Self {
            errors: 1,
            ..Self::default()
        }
    }
}

impl fmt::Display for ConvertSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files={} rows={} unmapped={} errors={}",
            self.files, self.rows, self.unmapped, self.errors
        )
    }
}

#[derive(Debug, Default)]
struct FileResult {
    rows: u64,
    unmapped: u64,
}

/// Applies a block mapping to region CSVs
#[derive(Debug)]
pub struct RegionConverter {
    y_offset: i32,
    default_block: Option<String>,
    fs_utils: FileSystemUtils,
}

impl RegionConverter {
    pub fn new(y_offset: i32, default_block: &str) -> Self {
        let default_block = default_block.trim();
        Self {
            y_offset,
            default_block: (!default_block.is_empty()).then(|| default_block.to_string()),
            fs_utils: FileSystemUtils::new(),
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.convert_y_offset, &config.default_unmapped_block)
    }

    /// Convert every CSV in `input_dir` into `output_dir`
    #[instrument(skip(self))]
    pub fn convert_all(
        &self,
        input_dir: &Path,
        mapping_file: &Path,
        output_dir: &Path,
    ) -> ConvertSummary {
        if !input_dir.is_dir() {
            warn!("Input directory not found: {}", input_dir.display());
            return ConvertSummary::failed();
        }
        if !mapping_file.is_file() {
            warn!("Mapping file not found: {}", mapping_file.display());
            return ConvertSummary::failed();
        }

        let mapping = match csv::read_pairs(mapping_file) {
            Ok(mapping) if !mapping.is_empty() => mapping,
            Ok(_) => {
                warn!("Mapping file {} is empty", mapping_file.display());
                return ConvertSummary::failed();
            }
            Err(e) => {
                warn!("{}", e);
                return ConvertSummary::failed();
            }
        };

        let files = match self.fs_utils.list_files_with_extension(input_dir, "csv") {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list CSVs in {}: {}", input_dir.display(), e);
                return ConvertSummary::failed();
            }
        };
        if let Err(e) = self.fs_utils.create_dir_all(output_dir) {
            warn!("Failed to create {}: {}", output_dir.display(), e);
            return ConvertSummary::failed();
        }

        let mut summary = ConvertSummary::default();
        for file in &files {
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let output = output_dir.join(format!("{OUTPUT_PREFIX}{name}"));

            summary.files += 1;
            match self.convert_file(file, &output, &mapping) {
                Ok(result) => {
                    debug!("Converted {}: {} rows", name, result.rows);
                    summary.rows += result.rows;
                    summary.unmapped += result.unmapped;
                }
                Err(e) => {
                    warn!("Failed to convert {}: {}", name, e);
                    summary.errors += 1;
                }
            }
        }

        info!("Conversion finished: {}", summary);
        summary
    }

    fn convert_file(
        &self,
        input: &Path,
        output: &Path,
        mapping: &BTreeMap<String, String>,
    ) -> Result<FileResult> {
        let content = self
            .fs_utils
            .read_file_to_string(input)
            .map_err(|e| HubError::file_system("read", input.to_path_buf(), e))?;

        let mut lines = content.lines();
        let header_line = lines
            .next()
            .ok_or_else(|| HubError::validation(format!("{} is empty", input.display())))?;
        let header: Vec<&str> = header_line.split(',').collect();

        let (out_header, block_idx, y_idx, columns, first_row) =
            match csv::find_column(&header, "block") {
                Some(block_idx) => {
                    let mut out_header: Vec<String> =
                        header.iter().map(|s| s.to_string()).collect();
                    out_header[block_idx] = OUTPUT_BLOCK_COLUMN.to_string();
                    let y_idx = csv::find_column(&header, "y").unwrap_or(1);
                    (out_header, block_idx, y_idx, header.len(), None)
                }
                None => {
                    let mut out_header: Vec<String> =
                        DEFAULT_COLUMNS.iter().map(|s| s.to_string()).collect();
                    out_header[3] = OUTPUT_BLOCK_COLUMN.to_string();
                    (out_header, 3, 1, DEFAULT_COLUMNS.len(), Some(header_line))
                }
            };

        let file =
            File::create(output).map_err(|e| HubError::file_system("create", output.to_path_buf(), e))?;
        let mut writer = BufWriter::new(file);
        let write_err = |e: io::Error| HubError::file_system("write", output.to_path_buf(), e);

        writeln!(writer, "{}", out_header.join(",")).map_err(write_err)?;

        let mut result = FileResult::default();
        for line in first_row.into_iter().chain(lines) {
            if line.trim().is_empty() {
                continue;
            }
            let mut row: Vec<String> = csv::split_row(line, columns)
                .into_iter()
                .map(str::to_string)
                .collect();
            if row.len() <= block_idx {
                continue;
            }

            let block = csv::strip_block_state(&row[block_idx]);
            let (target, mapped) = self.resolve(mapping, block);
            if !mapped {
                result.unmapped += 1;
            }
            row[block_idx] = target.to_string();
            self.shift_y(&mut row, y_idx);

            writeln!(writer, "{}", row.join(",")).map_err(write_err)?;
            result.rows += 1;
        }

        writer.flush().map_err(write_err)?;
        Ok(result)
    }

    /// Mapped target, else the default block, else `UNMAPPED`
    fn resolve<'a>(&'a self, mapping: &'a BTreeMap<String, String>, block: &str) -> (&'a str, bool) {
        match mapping.get(block).map(|t| t.trim()).filter(|t| !t.is_empty()) {
            Some(target) => (target, true),
            None => (self.default_block.as_deref().unwrap_or(UNMAPPED_VALUE), false),
        }
    }

    fn shift_y(&self, row: &mut [String], y_idx: usize) {
        if let Some(value) = row.get_mut(y_idx) {
            if let Ok(y) = value.trim().parse::<i32>() {
                // 32-bit wrap, same as the game's int coordinates
                *value = y.wrapping_add(self.y_offset).to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MAPPING: &str = "minecraft_block,hytale_block,score,source\n\
        minecraft:stone,Rock_Stone,0.667,heuristic\n\
        minecraft:oak_stairs,Wood_Oak_Stairs,0.8,heuristic\n\
        minecraft:purpur_block,,0.0,unmapped\n";

    fn setup(csv_name: &str, content: &str) -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("mc");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join(csv_name), content).unwrap();
        let mapping = temp_dir.path().join("block-mapping.csv");
        fs::write(&mapping, MAPPING).unwrap();
        (temp_dir, input, mapping)
    }

    #[test]
    fn test_convert_maps_blocks_and_shifts_y() {
        let (temp_dir, input, mapping) = setup(
            "r.0.0.csv",
            "x,y,z,block\n\
             1,2,3,minecraft:stone\n\
             4,-5,6,minecraft:oak_stairs[facing=east,half=top]\n\
             7,8,9,minecraft:purpur_block\n",
        );
        let output = temp_dir.path().join("out");

        let converter = RegionConverter::new(100, "Soil_Clay_Smooth_Grey");
        let summary = converter.convert_all(&input, &mapping, &output);

        assert_eq!(
            summary,
            ConvertSummary {
                files: 1,
                rows: 3,
                unmapped: 1,
                errors: 0,
            }
        );

        let converted = fs::read_to_string(output.join("hytale-region-r.0.0.csv")).unwrap();
        assert_eq!(
            converted,
            "x,y,z,hytale_block\n\
             1,102,3,Rock_Stone\n\
             4,95,6,Wood_Oak_Stairs\n\
             7,108,9,Soil_Clay_Smooth_Grey\n"
        );
    }

    #[test]
    fn test_y_offset_wraps_at_int_bounds() {
        let (temp_dir, input, mapping) = setup(
            "r.0.0.csv",
            "x,y,z,block\n0,2147483647,0,minecraft:stone\n1,5,1,minecraft:stone\n",
        );
        let output = temp_dir.path().join("out");

        let summary = RegionConverter::new(100, "").convert_all(&input, &mapping, &output);
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.errors, 0);

        let converted = fs::read_to_string(output.join("hytale-region-r.0.0.csv")).unwrap();
        assert_eq!(
            converted,
            "x,y,z,hytale_block\n0,-2147483549,0,Rock_Stone\n1,105,1,Rock_Stone\n"
        );
    }

    #[test]
    fn test_headerless_file_keeps_every_row() {
        let (temp_dir, input, mapping) = setup(
            "r.1.0.csv",
            "1,2,3,minecraft:stone\n1,3,3,minecraft:gold_block\n",
        );
        let output = temp_dir.path().join("out");

        let summary = RegionConverter::new(0, "").convert_all(&input, &mapping, &output);
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.unmapped, 1);

        let converted = fs::read_to_string(output.join("hytale-region-r.1.0.csv")).unwrap();
        assert_eq!(
            converted,
            "x,y,z,hytale_block\n1,2,3,Rock_Stone\n1,3,3,UNMAPPED\n"
        );
    }

    #[test]
    fn test_missing_inputs_report_one_error() {
        let temp_dir = TempDir::new().unwrap();
        let converter = RegionConverter::new(0, "");

        let summary = converter.convert_all(
            &temp_dir.path().join("nope"),
            &temp_dir.path().join("mapping.csv"),
            temp_dir.path(),
        );
        assert_eq!(summary, ConvertSummary::failed());

        let empty_mapping = temp_dir.path().join("mapping.csv");
        fs::write(&empty_mapping, "minecraft_block,hytale_block,score,source\n").unwrap();
        let summary = converter.convert_all(temp_dir.path(), &empty_mapping, temp_dir.path());
        assert_eq!(summary, ConvertSummary::failed());
    }

    #[test]
    fn test_empty_csv_counts_as_error() {
        let (temp_dir, input, mapping) = setup("r.0.0.csv", "");
        let summary = RegionConverter::new(0, "").convert_all(
            &input,
            &mapping,
            &temp_dir.path().join("out"),
        );
        assert_eq!(summary.files, 1);
        assert_eq!(summary.errors, 1);
    }
}

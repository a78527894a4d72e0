//! Anvil region extraction
//!
//! Reads `.mca` region files chunk by chunk and writes one `x,y,z,block` CSV
//! per region. Chunk-level failures are counted and logged; they never abort
//! the region or the run.

use crate::{
    config::ConverterConfig,
    error::{HubError, Result},
    utils::fs::FileSystemUtils,
    world::nbt::{self, Compound, Tag},
};
use flate2::read::{GzDecoder, ZlibDecoder};
use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

const SECTOR_BYTES: usize = 4096;
const CHUNKS_PER_AXIS: usize = 32;
const BLOCKS_PER_SECTION: usize = 4096;
/// First data version that stopped packing block states across longs (20w17a)
const VERSION_20W17A: i32 = 2529;
const AIR: &str = "minecraft:air";

/// Extraction filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Drop `minecraft:air` and legacy `0:0`
    pub skip_air: bool,
    /// Inclusive lower Y bound
    pub y_min: i32,
    /// Inclusive upper Y bound
    pub y_max: i32,
}

impl From<&ConverterConfig> for ExtractOptions {
    fn from(config: &ConverterConfig) -> Self {
        Self {
            skip_air: config.skip_air,
            y_min: config.extract_y_min,
            y_max: config.extract_y_max,
        }
    }
}

/// Totals over one or more regions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: u64,
    pub chunks: u64,
    pub blocks: u64,
    pub errors: u64,
}

impl ExtractSummary {
    fn absorb(&mut self, other: ExtractSummary) {
        self.chunks += other.chunks;
        self.blocks += other.blocks;
        self.errors += other.errors;
    }
}

impl fmt::Display for ExtractSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files={} chunks={} blocks={} errors={}",
            self.files, self.chunks, self.blocks, self.errors
        )
    }
}

/// What a single chunk contributed to the CSV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkRows {
    Written(u64),
    NoSections,
    OutOfRange,
}

/// Extracts block CSVs from region files
#[derive(Debug)]
pub struct RegionExtractor {
    options: ExtractOptions,
    fs_utils: FileSystemUtils,
}

impl RegionExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self {
            options,
            fs_utils: FileSystemUtils::new(),
        }
    }

    /// Extract every `*.mca` in `input_dir` into `output_dir`
    #[instrument(skip(self))]
    pub fn extract_all(&self, input_dir: &Path, output_dir: &Path) -> Result<ExtractSummary> {
        let regions = self
            .fs_utils
            .list_files_with_extension(input_dir, "mca")
            .map_err(|e| HubError::file_system("list", input_dir.to_path_buf(), e))?;

        let mut summary = ExtractSummary::default();
        if regions.is_empty() {
            return Ok(summary);
        }

        self.fs_utils
            .create_dir_all(output_dir)
            .map_err(|e| HubError::file_system("create", output_dir.to_path_buf(), e))?;

        summary.files = regions.len() as u64;
        for region in &regions {
            let output = output_dir.join(csv_name(region));
            summary.absorb(self.extract_region(region, &output));
        }

        Ok(summary)
    }

    /// Extract a single region; failures are reported in the summary
    pub fn extract_region(&self, region: &Path, output: &Path) -> ExtractSummary {
        match self.try_extract_region(region, output) {
            Ok(summary) => {
                info!(
                    "Extracted {}: chunks={} blocks={}",
                    output.display(),
                    summary.chunks,
                    summary.blocks
                );
                summary
            }
            Err(e) => {
                warn!("Failed to read {}: {}", region.display(), e);
                ExtractSummary {
                    errors: 1,
                    ..ExtractSummary::default()
                }
            }
        }
    }

    fn try_extract_region(&self, region: &Path, output: &Path) -> Result<ExtractSummary> {
        let data =
            std::fs::read(region).map_err(|e| HubError::file_system("read", region.to_path_buf(), e))?;
        if data.len() < SECTOR_BYTES * 2 {
            return Err(HubError::region("region file too small", region));
        }

        let file =
            File::create(output).map_err(|e| HubError::file_system("create", output.to_path_buf(), e))?;
        let mut writer = BufWriter::new(file);
        let write_err = |e: io::Error| HubError::file_system("write", output.to_path_buf(), e);

        writeln!(writer, "x,y,z,block").map_err(write_err)?;

        let locations = &data[..SECTOR_BYTES];
        let mut summary = ExtractSummary {
            files: 1,
            ..ExtractSummary::default()
        };

        for local_z in 0..CHUNKS_PER_AXIS {
            for local_x in 0..CHUNKS_PER_AXIS {
                let offset = 4 * (local_x + local_z * CHUNKS_PER_AXIS);
                let sector_offset = (usize::from(locations[offset]) << 16)
                    | (usize::from(locations[offset + 1]) << 8)
                    | usize::from(locations[offset + 2]);
                let sector_count = usize::from(locations[offset + 3]);
                if sector_offset == 0 || sector_count == 0 {
                    continue;
                }

                let root = match read_chunk(&data, sector_offset, sector_count) {
                    Ok(root) => root,
                    Err(e) => {
                        summary.errors += 1;
                        warn!(
                            "Failed to read chunk ({},{}) in {}: {}",
                            local_x,
                            local_z,
                            region.display(),
                            e
                        );
                        continue;
                    }
                };

                let Some(root) = root.as_compound() else {
                    summary.errors += 1;
                    continue;
                };

                // chunks without xPos/zPos sit at their location-table slot
                let slot = (local_x as i32, local_z as i32);
                match self.write_chunk(&mut writer, root, slot).map_err(write_err)? {
                    ChunkRows::Written(blocks) => {
                        summary.chunks += 1;
                        summary.blocks += blocks;
                    }
                    ChunkRows::NoSections => {}
                    ChunkRows::OutOfRange => {
                        summary.errors += 1;
                        warn!(
                            "Chunk ({},{}) in {} has coordinates out of range",
                            local_x,
                            local_z,
                            region.display()
                        );
                    }
                }
            }
        }

        writer.flush().map_err(write_err)?;
        Ok(summary)
    }

    /// Write every section of a chunk
    ///
    /// Block origins are checked before anything is written, so a chunk whose
    /// coordinates overflow leaves no rows behind.
    fn write_chunk<W: Write>(
        &self,
        writer: &mut W,
        root: &Compound,
        (slot_x, slot_z): (i32, i32),
    ) -> io::Result<ChunkRows> {
        let data_version = root.get_i32("DataVersion").unwrap_or(0);
        let stretches = data_version < VERSION_20W17A;

        let level = root.get_compound("Level").unwrap_or(root);
        let Some(sections) = level.get_list_any(&["Sections", "sections"]) else {
            return Ok(ChunkRows::NoSections);
        };

        let chunk_x = level.get_i32("xPos").unwrap_or(slot_x);
        let chunk_z = level.get_i32("zPos").unwrap_or(slot_z);
        let (Some(base_x), Some(base_z)) = (block_origin(chunk_x), block_origin(chunk_z)) else {
            return Ok(ChunkRows::OutOfRange);
        };

        let mut placed = Vec::new();
        for section in sections.iter().filter_map(Tag::as_compound) {
            let Some(section_y) = section.get_i32_any(&["Y", "y"]) else {
                continue;
            };
            let Some(base_y) = block_origin(section_y) else {
                return Ok(ChunkRows::OutOfRange);
            };
            placed.push((section, base_y));
        }

        let mut written = 0;
        for (section, base_y) in placed {
            written += self.write_section(writer, section, (base_x, base_y, base_z), stretches)?;
        }
        Ok(ChunkRows::Written(written))
    }

    fn write_section<W: Write>(
        &self,
        writer: &mut W,
        section: &Compound,
        (base_x, base_y, base_z): (i32, i32, i32),
        stretches: bool,
    ) -> io::Result<u64> {
        // origins are multiples of 16, so adding 0..=15 cannot overflow
        if base_y > self.options.y_max || base_y + 15 < self.options.y_min {
            return Ok(0);
        }

        let blocks_of = |index: usize| {
            let y = base_y + (index >> 8) as i32;
            let z = base_z + ((index >> 4) & 15) as i32;
            let x = base_x + (index & 15) as i32;
            (x, y, z)
        };

        if let Some(blocks) = section.get("Blocks").and_then(Tag::as_byte_array) {
            let Some(data) = section.get("Data").and_then(Tag::as_byte_array) else {
                return Ok(0);
            };
            let add = section.get("Add").and_then(Tag::as_byte_array);
            return self.write_legacy(writer, blocks, data, add, blocks_of);
        }

        let (palette, states) = palette_and_states(section);
        let Some(palette) = palette.filter(|p| !p.is_empty()) else {
            return Ok(0);
        };
        let names = format_palette(palette);
        let bits = states.map_or(0, |_| bits_for_palette(names.len()));

        let mut written = 0;
        for index in 0..BLOCKS_PER_SECTION {
            let palette_id = match states {
                None => 0,
                Some(states) => decode_palette_id(states, index, bits, stretches),
            };
            let Some(name) = names.get(palette_id) else {
                continue;
            };
            if self.options.skip_air && name == AIR {
                continue;
            }

            let (x, y, z) = blocks_of(index);
            if y < self.options.y_min || y > self.options.y_max {
                continue;
            }
            writeln!(writer, "{x},{y},{z},{name}")?;
            written += 1;
        }
        Ok(written)
    }

    fn write_legacy<W: Write>(
        &self,
        writer: &mut W,
        blocks: &[u8],
        data: &[u8],
        add: Option<&[u8]>,
        blocks_of: impl Fn(usize) -> (i32, i32, i32),
    ) -> io::Result<u64> {
        let mut written = 0;
        for index in 0..BLOCKS_PER_SECTION {
            let mut block_id = blocks.get(index).map_or(0, |b| u32::from(*b));
            if let Some(add) = add.filter(|add| index / 2 < add.len()) {
                block_id += u32::from(nibble(add, index)) << 8;
            }
            let block_data = if index / 2 < data.len() {
                nibble(data, index)
            } else {
                0
            };
            if self.options.skip_air && block_id == 0 && block_data == 0 {
                continue;
            }

            let (x, y, z) = blocks_of(index);
            if y < self.options.y_min || y > self.options.y_max {
                continue;
            }
            writeln!(writer, "{x},{y},{z},legacy:{block_id}:{block_data}")?;
            written += 1;
        }
        Ok(written)
    }
}

/// Decode a chunk payload at the given sector
fn read_chunk(data: &[u8], sector_offset: usize, sector_count: usize) -> Result<Tag> {
    let start = sector_offset * SECTOR_BYTES;
    if start + 5 > data.len() {
        return Err(HubError::nbt(format!("chunk offset {start} is past the end of the file")));
    }

    let length = i32::from_be_bytes([data[start], data[start + 1], data[start + 2], data[start + 3]]);
    if length <= 1 || length as usize > sector_count * SECTOR_BYTES {
        return Err(HubError::nbt(format!("invalid chunk length {length}")));
    }

    let payload_end = start + 4 + length as usize;
    let payload = data
        .get(start + 5..payload_end)
        .ok_or_else(|| HubError::nbt("chunk payload truncated"))?;

    let decompressed = decompress(data[start + 4], payload)?;
    let (_, root) = nbt::read_named(&decompressed)?;
    Ok(root)
}

fn decompress(compression: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let result = match compression {
        1 => GzDecoder::new(payload).read_to_end(&mut out),
        2 => ZlibDecoder::new(payload).read_to_end(&mut out),
        3 => {
            out.extend_from_slice(payload);
            Ok(out.len())
        }
        other => return Err(HubError::nbt(format!("unsupported compression type {other}"))),
    };
    result.map_err(|e| HubError::nbt(format!("decompression failed: {e}")))?;
    Ok(out)
}

/// Palette list and packed indices, modern layout first
fn palette_and_states(section: &Compound) -> (Option<&[Tag]>, Option<&[i64]>) {
    if let Some(block_states) = section.get_compound("block_states") {
        return (
            block_states.get_list("palette"),
            block_states.get("data").and_then(Tag::as_long_array),
        );
    }

    let palette = section.get_list_any(&["Palette", "palette"]);
    let states = ["BlockStates", "data"]
        .iter()
        .find_map(|key| section.get(key).and_then(Tag::as_long_array));
    (palette, states)
}

/// `Name` or `Name[k=v,...]` with properties sorted by key
fn format_palette(palette: &[Tag]) -> Vec<String> {
    palette
        .iter()
        .map(|entry| {
            let Some(entry) = entry.as_compound() else {
                return AIR.to_string();
            };
            let name = match entry.get_str("Name") {
                Some(name) if !name.trim().is_empty() => name,
                _ => return AIR.to_string(),
            };

            let properties: BTreeMap<&str, &str> = entry
                .get_compound("Properties")
                .map(|props| {
                    props
                        .iter()
                        .filter_map(|(k, v)| v.as_str().map(|v| (k, v)))
                        .collect()
                })
                .unwrap_or_default();
            if properties.is_empty() {
                return name.to_string();
            }

            let joined: Vec<String> = properties.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("{name}[{}]", joined.join(","))
        })
        .collect()
}

/// Bits per packed index: enough for the palette, never below 4
fn bits_for_palette(len: usize) -> u32 {
    let needed = usize::BITS - len.saturating_sub(1).leading_zeros();
    needed.max(4)
}

/// Unpack the palette index of block `index`
fn decode_palette_id(states: &[i64], index: usize, bits: u32, stretches: bool) -> usize {
    if states.is_empty() || bits == 0 {
        return 0;
    }
    let bits_usize = bits as usize;

    let (state, shift) = if stretches {
        (index * bits_usize / 64, (index * bits_usize % 64) as u32)
    } else {
        let per_long = 64 / bits_usize;
        (index / per_long, ((index % per_long) * bits_usize) as u32)
    };
    if state >= states.len() {
        return 0;
    }

    let mask = (1u64 << bits) - 1;
    let mut value = (states[state] as u64) >> shift;
    if stretches && 64 - shift < bits && state + 1 < states.len() {
        let leftover = bits - (64 - shift);
        let next = states[state + 1] as u64;
        value |= (next & ((1u64 << leftover) - 1)) << (bits - leftover);
    }
    (value & mask) as usize
}

fn nibble(data: &[u8], index: usize) -> u8 {
    let value = data[index / 2];
    if index % 2 == 0 {
        value & 0x0F
    } else {
        (value >> 4) & 0x0F
    }
}

/// First block coordinate of a chunk or section index
fn block_origin(index: i32) -> Option<i32> {
    index.checked_mul(16)
}

fn csv_name(region: &Path) -> PathBuf {
    let stem = region
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("region");
    PathBuf::from(format!("{stem}.csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::nbt::encode::{compound, named};
    use flate2::{Compression, write::ZlibEncoder};
    use std::fs;
    use tempfile::TempDir;

    fn options() -> ExtractOptions {
        ExtractOptions {
            skip_air: true,
            y_min: -64,
            y_max: 319,
        }
    }

    fn string(s: &str) -> Tag {
        Tag::String(s.to_string())
    }

    fn palette_entry(name: &str, props: &[(&str, &str)]) -> Tag {
        let mut entries = vec![("Name", string(name))];
        if !props.is_empty() {
            entries.push((
                "Properties",
                compound(props.iter().map(|(k, v)| (*k, string(v))).collect()),
            ));
        }
        compound(entries)
    }

    /// Modern chunk: one section at y=0 with a 2-entry palette. Only block 0
    /// of the section is stone; everything else is air.
    fn modern_chunk(x: i32, z: i32) -> Tag {
        // 4 bits per entry, 16 entries per long; index 0 -> palette id 1
        let mut data = vec![0i64; 256];
        data[0] = 1;
        compound(vec![
            ("DataVersion", Tag::Int(3465)),
            ("xPos", Tag::Int(x)),
            ("zPos", Tag::Int(z)),
            (
                "sections",
                Tag::List(vec![compound(vec![
                    ("Y", Tag::Byte(0)),
                    (
                        "block_states",
                        compound(vec![
                            (
                                "palette",
                                Tag::List(vec![
                                    palette_entry("minecraft:air", &[]),
                                    palette_entry(
                                        "minecraft:oak_stairs",
                                        &[("half", "top"), ("facing", "east")],
                                    ),
                                ]),
                            ),
                            ("data", Tag::LongArray(data)),
                        ]),
                    ),
                ])]),
            ),
        ])
    }

    fn write_region(path: &Path, chunks: &[(usize, usize, Vec<u8>, u8)]) {
        let mut file = vec![0u8; SECTOR_BYTES * 2];
        for (x, z, payload, compression) in chunks {
            let sector = file.len() / SECTOR_BYTES;
            let mut body = Vec::new();
            body.extend_from_slice(&((payload.len() + 1) as i32).to_be_bytes());
            body.push(*compression);
            body.extend_from_slice(payload);
            let sectors = body.len().div_ceil(SECTOR_BYTES);
            body.resize(sectors * SECTOR_BYTES, 0);

            let offset = 4 * (x + z * CHUNKS_PER_AXIS);
            file[offset] = (sector >> 16) as u8;
            file[offset + 1] = (sector >> 8) as u8;
            file[offset + 2] = sector as u8;
            file[offset + 3] = sectors as u8;
            file.extend_from_slice(&body);
        }
        fs::write(path, file).unwrap();
    }

    fn zlib(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_extract_modern_chunk() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("mc-regions");
        fs::create_dir_all(&input).unwrap();
        write_region(
            &input.join("r.0.0.mca"),
            &[(0, 0, zlib(&named("", &modern_chunk(2, 3))), 2)],
        );

        let extractor = RegionExtractor::new(options());
        let summary = extractor.extract_all(&input, &input).unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(summary.chunks, 1);
        assert_eq!(summary.blocks, 1);
        assert_eq!(summary.errors, 0);

        let csv = fs::read_to_string(input.join("r.0.0.csv")).unwrap();
        assert_eq!(
            csv,
            "x,y,z,block\n32,0,48,minecraft:oak_stairs[facing=east,half=top]\n"
        );
    }

    #[test]
    fn test_air_kept_when_not_skipping() {
        let temp_dir = TempDir::new().unwrap();
        let region = temp_dir.path().join("r.0.0.mca");
        write_region(&region, &[(0, 0, named("", &modern_chunk(0, 0)), 3)]);

        let extractor = RegionExtractor::new(ExtractOptions {
            skip_air: false,
            y_min: 0,
            y_max: 7,
        });
        let output = temp_dir.path().join("out.csv");
        let summary = extractor.extract_region(&region, &output);

        // y 0..=7 of one section: 8 layers of 256 blocks
        assert_eq!(summary.blocks, 8 * 256);
    }

    #[test]
    fn test_legacy_section_and_fallback_coordinates() {
        let temp_dir = TempDir::new().unwrap();
        let mut blocks = vec![0u8; 4096];
        blocks[1] = 1;
        let mut data = vec![0u8; 2048];
        data[0] = 0x20; // index 1 -> data 2
        let chunk = compound(vec![(
            "Level",
            compound(vec![(
                "Sections",
                Tag::List(vec![compound(vec![
                    ("Y", Tag::Byte(1)),
                    ("Blocks", Tag::ByteArray(blocks)),
                    ("Data", Tag::ByteArray(data)),
                ])]),
            )]),
        )]);

        let region = temp_dir.path().join("r.-1.2.mca");
        write_region(&region, &[(1, 2, zlib(&named("", &chunk)), 2)]);

        let output = temp_dir.path().join("r.-1.2.csv");
        let summary = RegionExtractor::new(options()).extract_region(&region, &output);
        assert_eq!(summary.blocks, 1);

        // no xPos/zPos: the location-table slot (1, 2) is the chunk position
        let csv = fs::read_to_string(output).unwrap();
        assert_eq!(csv, "x,y,z,block\n17,16,32,legacy:1:2\n");
    }

    #[test]
    fn test_bad_chunks_counted_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let region = temp_dir.path().join("r.0.0.mca");
        write_region(
            &region,
            &[
                (0, 0, vec![1, 2, 3], 9),
                (1, 0, vec![0xFF; 10], 2),
                (2, 0, named("", &modern_chunk(2, 0)), 3),
            ],
        );

        let summary =
            RegionExtractor::new(options()).extract_region(&region, &temp_dir.path().join("o.csv"));
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.chunks, 1);
    }

    #[test]
    fn test_too_small_region_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let region = temp_dir.path().join("r.0.0.mca");
        fs::write(&region, vec![0u8; 100]).unwrap();

        let summary =
            RegionExtractor::new(options()).extract_region(&region, &temp_dir.path().join("o.csv"));
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.chunks, 0);
    }

    #[test]
    fn test_decode_palette_id_layouts() {
        // packed: 5 bits, 12 per long, value 3 at index 13
        let packed = [0i64, 3 << 5];
        assert_eq!(decode_palette_id(&packed, 13, 5, false), 3);

        // stretched: 5 bits, index 12 spans bits 60..65
        let value = 0b10111u64;
        let low = (value & 0b1111) << 60;
        let high = value >> 4;
        let stretched = [low as i64, high as i64];
        assert_eq!(decode_palette_id(&stretched, 12, 5, true), 0b10111);
    }

    #[test]
    fn test_bits_for_palette() {
        assert_eq!(bits_for_palette(1), 4);
        assert_eq!(bits_for_palette(16), 4);
        assert_eq!(bits_for_palette(17), 5);
        assert_eq!(bits_for_palette(300), 9);
    }

    #[test]
    fn test_block_origin() {
        assert_eq!(block_origin(-3), Some(-48));
        assert_eq!(block_origin(i32::MAX / 8), None);
    }

    #[test]
    fn test_overflowing_chunk_counted_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let region = temp_dir.path().join("r.100000000.0.mca");
        let huge_section = compound(vec![(
            "sections",
            Tag::List(vec![compound(vec![("Y", Tag::Int(i32::MAX))])]),
        )]);
        write_region(
            &region,
            &[
                (0, 0, named("", &modern_chunk(i32::MAX / 8, 0)), 3),
                (1, 0, named("", &huge_section), 3),
                (2, 0, named("", &modern_chunk(2, 0)), 3),
            ],
        );

        let output = temp_dir.path().join("o.csv");
        let summary = RegionExtractor::new(options()).extract_region(&region, &output);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.chunks, 1);
        assert_eq!(summary.blocks, 1);

        let csv = fs::read_to_string(output).unwrap();
        assert_eq!(
            csv,
            "x,y,z,block\n32,0,0,minecraft:oak_stairs[facing=east,half=top]\n"
        );
    }
}

//! Block placement from converted region CSVs
//!
//! Rows are placed through a [`BlockSink`] on a bounded worker pool. A file is
//! split into batches of `max(1000, rows / threads)` rows; each batch is one
//! pool task.

use crate::{
    error::{HubError, Result},
    utils::fs::FileSystemUtils,
    world::{converter::UNMAPPED_VALUE, csv},
};
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, warn};

const MIN_BATCH_ROWS: usize = 1000;
const TOP_FAILURES: usize = 10;

/// Destination for placed blocks
pub trait BlockSink: Send + Sync {
    /// Place `block` at the given world position
    fn place(&self, x: i32, y: i32, z: i32, block: &str) -> Result<()>;
}

/// Records how often each block id was placed
#[derive(Debug, Default)]
pub struct TallySink {
    placements: Mutex<BTreeMap<String, u64>>,
}

impl TallySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of placements per block id
    pub fn counts(&self) -> BTreeMap<String, u64> {
        self.placements.lock().clone()
    }

    pub fn total(&self) -> u64 {
        self.placements.lock().values().sum()
    }
}

impl BlockSink for TallySink {
    fn place(&self, _x: i32, _y: i32, _z: i32, block: &str) -> Result<()> {
        *self.placements.lock().entry(block.to_string()).or_insert(0) += 1;
        Ok(())
    }
}

/// Totals over a spawn run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpawnSummary {
    pub files: u64,
    pub placed: u64,
    pub skipped: u64,
    pub errors: u64,
    pub elapsed: Duration,
}

impl fmt::Display for SpawnSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files={} placed={} skipped={} errors={} elapsed={:.1}s",
            self.files,
            self.placed,
            self.skipped,
            self.errors,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Column positions in a converted CSV
#[derive(Debug, Clone, Copy)]
struct Columns {
    x: usize,
    y: usize,
    z: usize,
    block: usize,
    count: usize,
}

impl Columns {
    fn from_header(header: &[&str]) -> Option<Self> {
        Some(Self {
            x: csv::find_column(header, "x")?,
            y: csv::find_column(header, "y")?,
            z: csv::find_column(header, "z")?,
            block: csv::find_column(header, "hytale_block")
                .or_else(|| csv::find_column(header, "block"))?,
            count: header.len(),
        })
    }
}

/// Per-file counters shared by the pool tasks
#[derive(Debug, Default)]
struct FileCounters {
    placed: AtomicU64,
    skipped_empty: AtomicU64,
    skipped_unmapped: AtomicU64,
    skipped_malformed: AtomicU64,
    parse_errors: AtomicU64,
    sink_errors: AtomicU64,
    processed: AtomicU64,
    next_percent: AtomicU64,
    failures: Mutex<HashMap<String, u64>>,
}

impl FileCounters {
    fn new() -> Self {
        Self {
            next_percent: AtomicU64::new(10),
            ..Self::default()
        }
    }

    fn skipped(&self) -> u64 {
        self.skipped_empty.load(Ordering::Relaxed)
            + self.skipped_unmapped.load(Ordering::Relaxed)
            + self.skipped_malformed.load(Ordering::Relaxed)
    }

    fn errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed) + self.sink_errors.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct FileResult {
    placed: u64,
    skipped: u64,
    errors: u64,
}

/// Places converted regions through a sink
#[derive(Debug)]
pub struct RegionSpawner {
    threads: usize,
    fs_utils: FileSystemUtils,
}

impl RegionSpawner {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
            fs_utils: FileSystemUtils::new(),
        }
    }

    /// Place every row of every CSV in `region_dir`
    #[instrument(skip(self, sink))]
    pub fn spawn_all(&self, region_dir: &Path, sink: &dyn BlockSink) -> Result<SpawnSummary> {
        let started = Instant::now();
        if !region_dir.is_dir() {
            warn!("Region directory not found: {}", region_dir.display());
            return Ok(SpawnSummary {
                errors: 1,
                ..SpawnSummary::default()
            });
        }

        let files = self
            .fs_utils
            .list_files_with_extension(region_dir, "csv")
            .map_err(|e| HubError::file_system("list", region_dir.to_path_buf(), e))?;
        if files.is_empty() {
            return Ok(SpawnSummary::default());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("spawn-{i}"))
            .build()
            .map_err(|e| HubError::config_with_source("Failed to build spawn thread pool", e))?;

        let mut summary = SpawnSummary {
            files: files.len() as u64,
            ..SpawnSummary::default()
        };
        for (index, file) in files.iter().enumerate() {
            let result = self.spawn_file(&pool, file, sink);
            info!(
                "Spawned {} ({}/{}): placed={} skipped={} errors={}",
                file.display(),
                index + 1,
                files.len(),
                result.placed,
                result.skipped,
                result.errors
            );
            summary.placed += result.placed;
            summary.skipped += result.skipped;
            summary.errors += result.errors;
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    fn spawn_file(&self, pool: &ThreadPool, path: &Path, sink: &dyn BlockSink) -> FileResult {
        let failed = FileResult {
            errors: 1,
            ..FileResult::default()
        };

        let content = match self.fs_utils.read_file_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return failed;
            }
        };

        let mut lines = content.lines();
        let Some(header_line) = lines.next() else {
            return failed;
        };
        let header: Vec<&str> = header_line.split(',').collect();
        let Some(columns) = Columns::from_header(&header) else {
            warn!("CSV missing columns: {}", path.display());
            return failed;
        };

        let rows: Vec<&str> = lines.filter(|line| !line.trim().is_empty()).collect();
        if rows.is_empty() {
            return FileResult::default();
        }

        let batch_size = MIN_BATCH_ROWS.max(rows.len() / self.threads);
        debug!(
            "{}: {} rows in {} batches",
            path.display(),
            rows.len(),
            rows.len().div_ceil(batch_size)
        );

        let counters = FileCounters::new();
        let total = rows.len() as u64;
        pool.install(|| {
            rows.par_chunks(batch_size).for_each(|batch| {
                for line in batch {
                    place_row(line, columns, sink, &counters);
                    report_progress(path, &counters, total);
                }
            });
        });

        let mut failures: Vec<(String, u64)> = counters.failures.lock().drain().collect();
        failures.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (block, count) in failures.iter().take(TOP_FAILURES) {
            warn!("Placement failures for '{}': {}", block, count);
        }

        FileResult {
            placed: counters.placed.load(Ordering::Relaxed),
            skipped: counters.skipped(),
            errors: counters.errors(),
        }
    }
}

fn place_row(line: &str, columns: Columns, sink: &dyn BlockSink, counters: &FileCounters) {
    let row = csv::split_row(line, columns.count);
    if row.len() <= columns.block {
        counters.skipped_malformed.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let block = row[columns.block].trim();
    if block.is_empty() {
        counters.skipped_empty.fetch_add(1, Ordering::Relaxed);
        return;
    }
    if block.eq_ignore_ascii_case(UNMAPPED_VALUE) {
        counters.skipped_unmapped.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let coordinate = |idx: usize| row.get(idx).and_then(|v| v.trim().parse::<i32>().ok());
    let (Some(x), Some(y), Some(z)) = (
        coordinate(columns.x),
        coordinate(columns.y),
        coordinate(columns.z),
    ) else {
        counters.parse_errors.fetch_add(1, Ordering::Relaxed);
        return;
    };

    match sink.place(x, y, z, block) {
        Ok(()) => {
            counters.placed.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            debug!("Failed to place {} at {},{},{}: {}", block, x, y, z, e);
            counters.sink_errors.fetch_add(1, Ordering::Relaxed);
            *counters.failures.lock().entry(block.to_string()).or_insert(0) += 1;
        }
    }
}

/// Log once per 10% of processed rows
fn report_progress(path: &Path, counters: &FileCounters, total: u64) {
    let processed = counters.processed.fetch_add(1, Ordering::Relaxed) + 1;
    let percent = processed * 100 / total;
    let next = counters.next_percent.load(Ordering::Relaxed);
    if percent >= next
        && counters
            .next_percent
            .compare_exchange(next, next + 10, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    {
        info!(
            "{} progress: {}% ({}/{}) placed={}",
            path.display(),
            next,
            processed,
            total,
            counters.placed.load(Ordering::Relaxed)
        );
    }
}

//! Command implementations for the CLI

use crate::{
    cli::Command,
    config::Config,
    core::{Packager, ResourceProcessor, packager::PackageReport},
    utils::env::VersionGenerator,
    world::{
        BlockMapper, ConvertSummary, ExtractOptions, ExtractSummary, MapResult, RegionConverter,
        RegionExtractor, RegionSpawner, SpawnSummary, TallySink,
    },
};
use anyhow::Context;
use tracing::{info, instrument, warn};

/// Execute the appropriate command based on CLI arguments
#[instrument(skip(config))]
pub fn execute_command(config: &Config, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Package { .. } => execute_package_command(config).map(|_| ()),
        Command::Template => execute_template_command(config),
        Command::Resolve => execute_resolve_command(config),
        Command::Version { .. } => execute_version_command(config),
        Command::Extract => execute_extract_command(config).map(|_| ()),
        Command::Map => execute_map_command(config).map(|_| ()),
        Command::Convert => execute_convert_command(config).map(|_| ()),
        Command::Spawn { .. } => execute_spawn_command(config).map(|_| ()),
        Command::Run => execute_run_command(config),
    }
}

/// Execute the package command
#[instrument(skip(config))]
fn execute_package_command(config: &Config) -> anyhow::Result<PackageReport> {
    info!("Packaging {}...", config.project.name);

    let report = Packager::new(config.clone())
        .package()
        .context("Failed to package project")?;

    info!("Standard archive: {}", report.standard);
    info!("Sources archive: {}", report.sources);
    info!(
        "Bundled archive: {} with {} dependencies",
        report.bundle,
        report.bundled_dependencies.len()
    );
    Ok(report)
}

/// Execute the template command
#[instrument(skip(config))]
fn execute_template_command(config: &Config) -> anyhow::Result<()> {
    info!(
        "Processing resources from: {}",
        config.project.resources_dir.display()
    );

    let processed = ResourceProcessor::new(config.clone())?
        .process()
        .context("Failed to process resources")?;

    info!(
        "Resources processed into {}: {} copied, {} templated",
        processed.output_dir.display(),
        processed.copied,
        processed.templated.len()
    );
    Ok(())
}

/// Execute the resolve command
#[instrument(skip(config))]
fn execute_resolve_command(config: &Config) -> anyhow::Result<()> {
    let resolved = Packager::new(config.clone())
        .resolve()
        .context("Failed to resolve dependencies")?;

    for dependency in &resolved.dependencies {
        println!(
            "{} [{:?}] {} ({})",
            dependency.coordinates,
            dependency.scope,
            dependency.path.display(),
            dependency.repository
        );
    }

    info!("Resolved {} dependencies", resolved.dependencies.len());
    Ok(())
}

/// Execute the version command
#[instrument(skip(config))]
fn execute_version_command(config: &Config) -> anyhow::Result<()> {
    let generator = VersionGenerator::new();
    let version_info = generator
        .generate(config, &config.artifacts.version_file)
        .context("Failed to generate version file")?;

    info!(
        "Version information generated: {} {}",
        version_info.name, version_info.implementation_version
    );
    Ok(())
}

/// Execute the extract command
#[instrument(skip(config))]
fn execute_extract_command(config: &Config) -> anyhow::Result<ExtractSummary> {
    let converter = &config.converter;
    let input = converter.mc_regions_dir();
    info!("Extracting regions from: {}", input.display());

    let extractor = RegionExtractor::new(ExtractOptions::from(converter));
    let summary = extractor
        .extract_all(&input, &input)
        .context("Failed to extract regions")?;

    if summary.files == 0 {
        warn!("No .mca files found in {}", input.display());
    }
    info!("Extraction finished: {}", summary);
    Ok(summary)
}

/// Execute the map command
#[instrument(skip(config))]
fn execute_map_command(config: &Config) -> anyhow::Result<MapResult> {
    let mapper = BlockMapper::new(config.converter.clone())?;
    let result = mapper.map_blocks().context("Failed to map blocks")?;

    info!("Mapping finished: {}", result);
    info!(
        "Mapping written to {}",
        config.converter.block_mapping_path().display()
    );
    Ok(result)
}

/// Execute the convert command
#[instrument(skip(config))]
fn execute_convert_command(config: &Config) -> anyhow::Result<ConvertSummary> {
    let converter = &config.converter;
    let summary = RegionConverter::from_config(converter).convert_all(
        &converter.mc_regions_dir(),
        &converter.block_mapping_path(),
        &converter.hytale_regions_dir(),
    );
    Ok(summary)
}

/// Execute the spawn command
#[instrument(skip(config))]
fn execute_spawn_command(config: &Config) -> anyhow::Result<SpawnSummary> {
    let converter = &config.converter;
    let region_dir = converter.hytale_regions_dir();
    info!(
        "Spawning regions from {} with {} threads",
        region_dir.display(),
        converter.spawn_threads
    );

    let sink = TallySink::new();
    let summary = RegionSpawner::new(converter.spawn_threads)
        .spawn_all(&region_dir, &sink)
        .context("Failed to spawn regions")?;

    for (block, count) in sink.counts() {
        println!("{block}\t{count}");
    }
    info!("Spawn finished: {}", summary);
    Ok(summary)
}

/// Execute the whole conversion pipeline
#[instrument(skip(config))]
fn execute_run_command(config: &Config) -> anyhow::Result<()> {
    let extracted = execute_extract_command(config)?;
    let mapped = execute_map_command(config)?;
    let converted = execute_convert_command(config)?;
    let spawned = execute_spawn_command(config)?;

    info!(
        "Pipeline finished: extract[{}] map[{}] convert[{}] spawn[{}]",
        extracted, mapped, converted, spawned
    );
    Ok(())
}

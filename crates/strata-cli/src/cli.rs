use clap::{Parser, Subcommand};
use std::fmt::Write;
use std::io;
use std::path::PathBuf;
use strata_anvil::region::parse_region_file_name;
use strata_anvil::{BlockState, LoadOptions, LoadReport, Region};
use strata_codec::DataReader;
use strata_common::error::StrataError;
use strata_common::types::{BlockPos, Result};
use strata_common::StrataConfig;
use strata_logger::LogSeverity::{Debug, Info, Warning};
use strata_logger::{log, set_threshold, LogSeverity};

/// Inspect and edit block states in Anvil region files.
///
/// Changes made by `set` stay in memory; region files are never written back.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "strata", version, about = "Inspect and edit Anvil region files", long_about = None)]
pub struct Cli {
    /// JSON config file (log level, load options).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    #[command(about = "List chunks and load failures")]
    Info {
        #[arg(value_name = "REGION")]
        region: PathBuf,
    },
    #[command(about = "Print the block state at world coordinates")]
    Get {
        #[arg(value_name = "REGION")]
        region: PathBuf,
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
        #[arg(allow_negative_numbers = true)]
        z: i32,
    },
    #[command(about = "Set a block state in memory and report palette changes")]
    Set {
        #[arg(value_name = "REGION")]
        region: PathBuf,
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
        #[arg(allow_negative_numbers = true)]
        z: i32,
        /// Block name, or JSON such as {"name":"minecraft:oak_log","properties":{"axis":"y"}}
        #[arg(value_parser = parse_block_state)]
        state: BlockState,
    },
}

impl Command {
    pub fn region(&self) -> &PathBuf {
        match self {
            Command::Info { region } | Command::Get { region, .. } | Command::Set { region, .. } => {
                region
            }
        }
    }
}

/// Accepts a bare block name or a JSON object.
pub fn parse_block_state(value: &str) -> std::result::Result<BlockState, String> {
    if value.trim_start().starts_with('{') {
        serde_json::from_str(value).map_err(|e| format!("invalid block state JSON: {}", e))
    } else if value.is_empty() {
        Err("block name is empty".to_owned())
    } else {
        Ok(BlockState::new(value))
    }
}

/// Reads the region file and decodes it off the async runtime. The region is only handed
/// back once the whole pass is done.
pub async fn load_region(path: PathBuf, options: LoadOptions) -> Result<(Region, LoadReport)> {
    let bytes = tokio::fs::read(&path).await?;
    log(
        format!("Read {} bytes from {}", bytes.len(), path.display()),
        Debug,
    );

    let (x, z) = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(parse_region_file_name)
        .unwrap_or((0, 0));

    tokio::task::spawn_blocking(move || -> Result<(Region, LoadReport)> {
        let mut region = Region::new(x, z);
        let mut reader = DataReader::from_bytes(bytes);
        let report = region.deserialize(&mut reader, &options)?;
        Ok((region, report))
    })
    .await
    .map_err(|e| StrataError::IoError(io::Error::other(e)))?
}

/// Runs one command and returns what should be printed.
pub async fn run(cli: Cli) -> Result<String> {
    let config = match &cli.config {
        Some(path) => {
            let config = StrataConfig::load(path)?;
            let severity = config
                .log_level
                .parse::<LogSeverity>()
                .map_err(StrataError::Config)?;
            set_threshold(severity);
            config
        }
        None => StrataConfig::default(),
    };

    let (mut region, report) =
        load_region(cli.command.region().clone(), LoadOptions::from(&config)).await?;

    match cli.command {
        Command::Info { .. } => Ok(describe(&region, &report)),
        Command::Get { x, y, z, .. } => {
            let pos = BlockPos::new(x, y, z);
            warn_if_outside(&region, pos);
            Ok(match region.get_voxel_state_at(x, y, z)? {
                Some(state) => format!("({}, {}, {}): {}\n", x, y, z, to_json(state)?),
                None => format!("({}, {}, {}): not present\n", x, y, z),
            })
        }
        Command::Set { x, y, z, state, .. } => {
            let pos = BlockPos::new(x, y, z);
            warn_if_outside(&region, pos);
            set_voxel(&mut region, pos, state)
        }
    }
}

/// Coordinates are wrapped into the region, so a voxel from another region still resolves.
fn warn_if_outside(region: &Region, pos: BlockPos) {
    if !region.contains(pos.chunk()) {
        let (x, z) = pos.chunk().region();
        log(
            format!(
                "({}, {}, {}) belongs to region ({}, {}), not ({}, {})",
                pos.x,
                pos.y,
                pos.z,
                x,
                z,
                region.x(),
                region.z()
            ),
            Warning,
        );
    }
}

fn to_json(state: &BlockState) -> Result<String> {
    serde_json::to_string(state).map_err(|e| StrataError::Malformed(e.to_string()))
}

fn describe(region: &Region, report: &LoadReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "region ({}, {}): {} chunks, {} failed",
        region.x(),
        region.z(),
        region.chunk_count(),
        report.failures.len()
    );
    for (slot, chunk) in region.chunks() {
        let _ = writeln!(
            out,
            "  slot {:4} chunk ({:2}, {:2}) updated {} with {} sections",
            slot,
            slot % 32,
            slot / 32,
            chunk.last_update(),
            chunk.section_count()
        );
    }
    for failure in &report.failures {
        let _ = writeln!(out, "  slot {:4} failed: {}", failure.slot, failure.error);
    }
    out
}

/// (palette entries, bits per block) of the section holding a voxel, if it exists.
fn section_shape(region: &Region, pos: BlockPos) -> Option<(usize, u8)> {
    let chunk = region.chunk_at(pos.chunk())?;
    let section = chunk.section(usize::try_from(pos.y >> 4).ok()?)?;
    Some((section.palette().len(), section.bits_per_block()))
}

fn set_voxel(region: &mut Region, pos: BlockPos, state: BlockState) -> Result<String> {
    let json = to_json(&state)?;
    let before = section_shape(region, pos);
    region.set_voxel_state_at(pos.x, pos.y, pos.z, state)?;
    let rebuilt = region.rebuild_chunks()?;
    let after = section_shape(region, pos);

    let mut out = format!("({}, {}, {}) set to {}\n", pos.x, pos.y, pos.z, json);
    match (before, after) {
        (Some((old_len, old_bits)), Some((new_len, new_bits))) => {
            let _ = writeln!(
                out,
                "  palette {} -> {} entries, {} -> {} bits per block",
                old_len, new_len, old_bits, new_bits
            );
        }
        (None, Some((new_len, new_bits))) => {
            let _ = writeln!(
                out,
                "  new section: {} palette entries, {} bits per block",
                new_len, new_bits
            );
        }
        _ => {}
    }
    let _ = writeln!(out, "  {} sections rebuilt, changes not written back", rebuilt);

    log(format!("Set ({}, {}, {}) to {}", pos.x, pos.y, pos.z, json), Info);
    Ok(out)
}

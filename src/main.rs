//! frhp - fractal heap inspector CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use fractal_heap::util::config::{load_config, ReaderConfig};
use fractal_heap::util::logger;
use fractal_heap::{FractalHeap, MappedFile, NAME, VERSION};

/// Inspect fractal heaps and resolve heap identifiers
#[derive(Parser, Debug)]
#[command(name = "frhp")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ~/.config/frhp/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the superblock's size of offsets
    #[arg(long, global = true)]
    size_of_offsets: Option<u8>,

    /// Override the superblock's size of lengths
    #[arg(long, global = true)]
    size_of_lengths: Option<u8>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a heap's header and its direct blocks
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// File address of the heap header (decimal or 0x-prefixed hex)
        #[arg(short, long, value_parser = parse_address)]
        address: u64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Resolve a heap identifier and hex-dump the object
    Get {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// File address of the heap header (decimal or 0x-prefixed hex)
        #[arg(short, long, value_parser = parse_address)]
        address: u64,

        /// Heap identifier as hex bytes, e.g. 0015000500
        #[arg(long)]
        id: String,
    },

    /// Print version information
    Version,
}

fn parse_address(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    hex::decode(digits).map_err(|e| format!("invalid hex '{}': {}", s, e))
}

fn hex_dump(data: &[u8]) {
    for (line, chunk) in data.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        println!("{:08x}  {:<47}  |{}|", line * 16, hex.join(" "), ascii);
    }
}

fn open_heap(
    config: &ReaderConfig,
    file: &Path,
    address: u64,
) -> Result<(MappedFile, FractalHeap)> {
    let superblock = config.superblock()?;
    let channel =
        MappedFile::open(file).with_context(|| format!("Failed to open: {}", file.display()))?;
    let heap = FractalHeap::open_with(&channel, &superblock, address, config.heap_options())
        .with_context(|| format!("Failed to read heap at {} in {}", address, file.display()))?;
    Ok((channel, heap))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load config")?;
    if let Some(width) = args.size_of_offsets {
        config.format.size_of_offsets = width;
    }
    if let Some(width) = args.size_of_lengths {
        config.format.size_of_lengths = width;
    }
    if args.verbose {
        logger::init_debug();
    } else {
        logger::init_with_level(config.log.level);
    }

    match args.command {
        Commands::Inspect {
            file,
            address,
            json,
        } => {
            let (channel, heap) = open_heap(&config, &file, address)?;
            if json {
                let blocks: Vec<_> = heap
                    .direct_blocks()
                    .map(|b| {
                        serde_json::json!({
                            "address": b.address(),
                            "block_offset": b.block_offset(),
                            "size": b.size(),
                        })
                    })
                    .collect();
                let out = serde_json::json!({
                    "file": channel.path().display().to_string(),
                    "header": heap.header(),
                    "direct_blocks": blocks,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}: {}", channel.path().display(), heap);
                for block in heap.direct_blocks() {
                    println!(
                        "  block @{:#x}: offset={} size={}",
                        block.address(),
                        block.block_offset(),
                        block.size()
                    );
                }
            }
        }
        Commands::Get { file, address, id } => {
            let id = parse_hex(&id).map_err(anyhow::Error::msg)?;
            let (_, heap) = open_heap(&config, &file, address)?;
            if id.len() != heap.id_length() {
                bail!(
                    "heap identifiers are {} bytes, got {}",
                    heap.id_length(),
                    id.len()
                );
            }
            let data = heap.resolve(&id).context("Failed to resolve identifier")?;
            hex_dump(&data);
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}

//! wdf - WDF container tool
//!
//! Packs raw disc images into sparse WDF containers and back.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use wdfkit::probe::probe_file;
use wdfkit::writer::is_zero;
use wdfkit::{Config, Result, WdfError, WdfReader, WdfWriter};

/// Copy granularity for pack/unpack
const IO_BLOCK: usize = 1024 * 1024;

/// WDF container tool
#[derive(Parser, Debug)]
#[command(name = "wdf")]
#[command(about = "Sparse WDF containers for disc images")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack a raw image into a WDF container
    Pack {
        /// Raw input image
        input: PathBuf,

        /// Output container
        output: PathBuf,

        /// Physical chunk alignment (power of two, 0 = none)
        #[arg(short, long, default_value = "0")]
        align: u32,

        /// Container generation to write (1, 2 or 3)
        #[arg(short = 'V', long, default_value = "3")]
        format_version: u32,
    },

    /// Reconstruct the raw image from a WDF container
    Unpack {
        /// Input container
        input: PathBuf,

        /// Raw output image (holes are left sparse)
        output: PathBuf,
    },

    /// Print header fields
    Info {
        /// Container to inspect
        input: PathBuf,
    },

    /// List real-data blocks
    Blocks {
        /// Container to inspect
        input: PathBuf,

        /// Merge blocks separated by holes shorter than this
        #[arg(long, default_value = "0")]
        hint: u64,
    },

    /// Compare a container against a raw image
    Verify {
        /// Container
        input: PathBuf,

        /// Raw image it should reproduce
        raw: PathBuf,
    },

    /// Identify the container kind of a file
    Probe {
        /// File to identify
        input: PathBuf,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wdfkit=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Pack {
            input,
            output,
            align,
            format_version,
        } => pack(input, output, align, format_version),
        Commands::Unpack { input, output } => unpack(input, output),
        Commands::Info { input } => info(input),
        Commands::Blocks { input, hint } => blocks(input, hint),
        Commands::Verify { input, raw } => verify(input, raw),
        Commands::Probe { input } => {
            println!("{}: {}", input.display(), probe_file(&input)?);
            Ok(())
        }
    }
}

fn pack(input: PathBuf, output: PathBuf, align: u32, format_version: u32) -> Result<()> {
    let config = Config::builder()
        .format_version(format_version)
        .align_factor(align)
        .build();

    tracing::info!("Packing {} -> {}", input.display(), output.display());

    let mut source = BufReader::new(File::open(&input)?);
    let mut writer = WdfWriter::create(&output, &config)?;
    let mut buf = vec![0u8; IO_BLOCK];
    let mut offset = 0u64;

    loop {
        let n = read_full(&mut source, &mut buf)?;
        if n == 0 {
            break;
        }

        if is_zero(&buf[..n]) {
            writer.write_zero(offset, n as u64)?;
        } else {
            writer.write_sparse(offset, &buf[..n])?;
        }
        offset += n as u64;
    }

    let summary = writer.close()?;
    tracing::info!(
        "Packed {} virtual bytes into {} chunks ({} bytes stored, file {} bytes)",
        summary.virtual_size,
        summary.chunk_count,
        summary.physical_data_size,
        summary.file_size
    );
    Ok(())
}

fn unpack(input: PathBuf, output: PathBuf) -> Result<()> {
    let mut reader = WdfReader::open(&input)?;
    let mut out = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&output)?;

    // Holes stay unwritten; set_len makes them read back as zeros
    out.set_len(reader.virtual_size())?;

    let blocks: Vec<_> = reader.blocks(0).collect();
    let mut buf = vec![0u8; IO_BLOCK];

    for block in blocks {
        out.seek(SeekFrom::Start(block.offset))?;
        let mut pos = block.offset;
        while pos < block.end() {
            let n = (block.end() - pos).min(IO_BLOCK as u64) as usize;
            reader.read_at(pos, &mut buf[..n])?;
            out.write_all(&buf[..n])?;
            pos += n as u64;
        }
    }

    out.sync_all()?;
    tracing::info!(
        "Unpacked {} bytes to {}",
        reader.virtual_size(),
        output.display()
    );
    Ok(())
}

fn info(input: PathBuf) -> Result<()> {
    let reader = WdfReader::open(&input)?;
    let h = reader.header();

    println!("file:               {}", input.display());
    println!("format version:     {}", h.format_version);
    println!("compatible version: {}", h.compatible_version);
    println!("header size:        {}", h.header_size);
    println!("align factor:       {}", h.align_factor);
    println!("virtual size:       {}", h.virtual_size);
    println!("physical data size: {}", h.physical_data_size);
    println!("chunks:             {}", h.chunk_count);
    println!("table offset:       {}", h.table_offset);
    if h.virtual_size > 0 {
        println!(
            "stored:             {:.2}%",
            h.physical_data_size as f64 * 100.0 / h.virtual_size as f64
        );
    }
    Ok(())
}

fn blocks(input: PathBuf, hint: u64) -> Result<()> {
    let reader = WdfReader::open(&input)?;
    for block in reader.blocks(hint) {
        println!(
            "{:#014x} .. {:#014x}  {:>12} bytes",
            block.offset,
            block.end(),
            block.length
        );
    }
    Ok(())
}

fn verify(input: PathBuf, raw: PathBuf) -> Result<()> {
    let mut reader = WdfReader::open(&input)?;
    let mut source = BufReader::new(File::open(&raw)?);

    let raw_len = source.get_ref().metadata()?.len();
    if raw_len != reader.virtual_size() {
        return Err(WdfError::Mismatch(format!(
            "size differs: container {} bytes, raw {} bytes",
            reader.virtual_size(),
            raw_len
        )));
    }

    reader.verify_against(&mut source)?;

    tracing::info!("{} matches {}", input.display(), raw.display());
    Ok(())
}

/// Read until `buf` is full or EOF
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

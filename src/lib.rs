pub mod cli;
pub mod model;
pub mod processor;
pub mod writer;

use anyhow::Context;
use clap::Parser;
use log::{LevelFilter, info};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .env()
        .init()
        .context("Installing logger")?;

    // 1. ── Read ───────────────────────────────────────────────────────
    let input = read_input(&args.input).with_context(|| format!("Reading {}", args.input.display()))?;

    // 2. ── Compile ────────────────────────────────────────────────────
    let module = if args.inspect {
        writer::bin::decode(&input).with_context(|| format!("Decoding module {}", args.input.display()))?
    } else {
        let source = String::from_utf8(input).with_context(|| format!("{} is not UTF-8", args.input.display()))?;
        processor::run(&source).with_context(|| format!("Compiling {}", args.input.display()))?
    };

    // 3. ── Write output ───────────────────────────────────────────────
    let mut out = open_output(&args.output).with_context(|| format!("Creating {}", args.output.display()))?;
    match (args.inspect, args.emit) {
        (false, cli::Emit::Bin) => writer::bin::emit(&module, &mut out).with_context(|| "Writing binary module")?,
        _ => writer::json::emit(&module, &mut out).with_context(|| "Writing JSON dump")?,
    }
    info!("wrote {}", args.output.display());

    Ok(())
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_input(path: &Path) -> io::Result<Vec<u8>> {
    if is_stdio(path) {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read(path)
    }
}

fn open_output(path: &Path) -> io::Result<Box<dyn Write>> {
    if is_stdio(path) {
        Ok(Box::new(io::stdout().lock()))
    } else {
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}

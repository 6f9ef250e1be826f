use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Input source file, `-` for stdin
    pub input: PathBuf,
    /// Output file, `-` for stdout
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = Emit::Bin)]
    pub emit: Emit,
    /// Treat the input as a compiled module and dump it as JSON
    #[arg(long)]
    pub inspect: bool,
    /// More logging, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Emit {
    /// Binary module for the VM
    Bin,
    /// Pretty-printed JSON
    Json,
}

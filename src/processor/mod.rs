//! The compiler core.
//!
//! Source text goes through the lexer and the single-pass analyser into a
//! [`Program`], which the assembler turns into a [`Module`] for the writers.
pub mod analyser;
pub mod blob;
pub mod error;
pub mod function;
pub mod instruction;
pub mod intrinsic;
pub mod lexer;
pub mod symbols;

use crate::model::{Module, Program};
use anyhow::Result;
use error::CompileError;
use log::info;

/// Parse, check and generate code for a whole source file.
pub fn analyse(source: &str) -> Result<Program, CompileError> {
    analyser::Analyser::new(source).analyse()
}

/// Runs every compilation pass and returns a read-only module for writers.
pub fn run(source: &str) -> Result<Module> {
    let program = analyse(source)?;
    let module = blob::assemble(&program)?;

    info!(
        "compiled {} globals and {} functions",
        module.globals.len(),
        module.functions.len()
    );
    Ok(module)
}

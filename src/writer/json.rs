//! Human-readable dump of a module.

use crate::model::Module;
use std::io::{self, Write};

pub fn emit(module: &Module, out: &mut impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, module)?;
    writeln!(out)?;
    out.flush()
}

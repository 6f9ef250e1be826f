//! Module assembler.
//! Flattens the analyser's tables into the global/function definitions the
//! writers encode, checking that every instruction is complete.

use anyhow::{Result, anyhow};

use crate::model::{FunctionDef, GlobalDef, GlobalValue, Module, Program};

/// Payload stored for `int`/`double` globals; the value itself lives on the VM.
const NUMERIC_PAYLOAD: [u8; 8] = [0; 8];

pub fn assemble(program: &Program) -> Result<Module> {
    let globals = program
        .globals
        .iter()
        .enumerate()
        .map(|(order, value)| GlobalDef {
            order: order as u32,
            value: match value {
                GlobalValue::Numeric => NUMERIC_PAYLOAD.to_vec(),
                GlobalValue::Bytes(bytes) => bytes.clone(),
            },
        })
        .collect();

    let mut functions = Vec::with_capacity(program.functions.len());
    for func in &program.functions {
        // A branch without an offset means the analyser lost track of a jump.
        if let Some((index, instr)) = func
            .body
            .as_slice()
            .iter()
            .enumerate()
            .find(|(_, instr)| !instr.is_complete())
        {
            return Err(anyhow!(
                "function '{}' instruction {} ({:?}) is missing its operand",
                func.name,
                index,
                instr.op
            ));
        }

        functions.push(FunctionDef {
            name: func.name_slot,
            return_slots: func.return_slots(),
            param_slots: func.params.len() as u32,
            local_slots: func.locals.len() as u32,
            body: func.body.as_slice().to_vec(),
        });
    }

    Ok(Module::new(globals, functions))
}

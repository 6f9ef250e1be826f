use crate::processor::function::FunctionTable;
use crate::processor::instruction::Instruction;
use serde::Serialize;

/// Module file signature.
pub const MAGIC: u32 = 0x72303b3e;
pub const VERSION: u32 = 1;

/// What a global table slot holds at compile time.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalValue {
    /// `int`/`double` variable, its value only exists on the VM at run time.
    Numeric,
    /// Function name or string literal.
    Bytes(Vec<u8>),
}

/// Output of the analyser.
///
/// `globals[0]` and `functions[0]` always belong to the entry wrapper.
#[derive(Debug, Clone)]
pub struct Program {
    pub globals: Vec<GlobalValue>,
    pub functions: Vec<FunctionTable>,
}

/// Fully assembled module handed to the writers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    pub magic: u32,
    pub version: u32,
    pub globals: Vec<GlobalDef>,
    pub functions: Vec<FunctionDef>,
}

impl Module {
    pub fn new(globals: Vec<GlobalDef>, functions: Vec<FunctionDef>) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            globals,
            functions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalDef {
    /// Declaration index; its low byte is the tag written before the payload.
    pub order: u32,
    /// Raw payload; numeric globals carry 8 zero bytes.
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDef {
    /// Global table index of the function's name.
    pub name: u32,
    pub return_slots: u32,
    pub param_slots: u32,
    pub local_slots: u32,
    pub body: Vec<Instruction>,
}

use super::instruction::{Instruction, InstructionStream, Operand, Operation};
use super::symbols::{SymbolEntry, ValueType};

/// Everything the analyser collects about one function.
#[derive(Debug, Clone)]
pub struct FunctionTable {
    pub name: String,
    /// Global table slot holding the function's name.
    pub name_slot: u32,
    pub return_type: ValueType,
    pub params: Vec<SymbolEntry>,
    /// Locals of every nested block, flattened in declaration order.
    pub locals: Vec<SymbolEntry>,
    pub body: InstructionStream,
}

impl FunctionTable {
    pub fn new(name: &str, name_slot: u32, return_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            name_slot,
            return_type,
            params: Vec::new(),
            locals: Vec::new(),
            body: InstructionStream::new(),
        }
    }

    pub fn return_slots(&self) -> u32 {
        self.return_type.slots()
    }

    /// Argument slot of a parameter; the return value sits below the parameters.
    pub fn param_address(&self, slot: u32) -> u32 {
        slot + self.return_slots()
    }

    pub fn param_types(&self) -> Vec<ValueType> {
        self.params.iter().map(|p| p.ty).collect()
    }

    pub fn ends_with_return(&self) -> bool {
        matches!(self.body.last(), Some(Instruction { op: Operation::Ret, .. }))
    }

    /// Control can run past the last instruction, either because it is not
    /// a `ret` or because a branch lands right after it.
    pub fn falls_off_end(&self) -> bool {
        let end = self.body.len() as i64;
        let branch_to_end = self.body.as_slice().iter().enumerate().any(|(index, instr)| match instr.operand {
            Some(Operand::I32(offset)) if instr.op.is_branch() => index as i64 + 1 + offset as i64 == end,
            _ => false,
        });
        !self.ends_with_return() || branch_to_end
    }
}

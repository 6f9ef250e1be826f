//! Stack-machine instruction set and per-function instruction streams.
//!
//! The opcode numbering and operand widths are the virtual machine's
//! contract and must not change.

use serde::Serialize;

/// Size of the immediate that follows an opcode in the binary module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandWidth {
    None,
    Four,
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Nop,
    Push,
    Pop,
    PopN,
    Dup,
    LocA,
    ArgA,
    GlobA,
    Load8,
    Load16,
    Load32,
    Load64,
    Store8,
    Store16,
    Store32,
    Store64,
    Alloc,
    Free,
    StackAlloc,
    AddI,
    SubI,
    MulI,
    DivI,
    AddF,
    SubF,
    MulF,
    DivF,
    DivU,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    Not,
    CmpI,
    CmpU,
    CmpF,
    NegI,
    NegF,
    IToF,
    FToI,
    ShrL,
    SetLt,
    SetGt,
    Br,
    BrFalse,
    BrTrue,
    Call,
    Ret,
    CallName,
    ScanI,
    ScanC,
    ScanF,
    PrintI,
    PrintC,
    PrintF,
    PrintS,
    PrintLn,
    Panic,
}

impl Operation {
    pub const ALL: [Operation; 59] = {
        use Operation as O;
        [
            O::Nop, O::Push, O::Pop, O::PopN, O::Dup, O::LocA, O::ArgA, O::GlobA,
            O::Load8, O::Load16, O::Load32, O::Load64, O::Store8, O::Store16, O::Store32, O::Store64,
            O::Alloc, O::Free, O::StackAlloc, O::AddI, O::SubI, O::MulI, O::DivI, O::AddF,
            O::SubF, O::MulF, O::DivF, O::DivU, O::Shl, O::Shr, O::And, O::Or,
            O::Xor, O::Not, O::CmpI, O::CmpU, O::CmpF, O::NegI, O::NegF, O::IToF,
            O::FToI, O::ShrL, O::SetLt, O::SetGt, O::Br, O::BrFalse, O::BrTrue, O::Call,
            O::Ret, O::CallName, O::ScanI, O::ScanC, O::ScanF, O::PrintI, O::PrintC, O::PrintF,
            O::PrintS, O::PrintLn, O::Panic,
        ]
    };

    #[rustfmt::skip]
    pub fn opcode(self) -> u8 {
        use Operation as O;
        match self {
            O::Nop        => 0x00,
            O::Push       => 0x01,
            O::Pop        => 0x02,
            O::PopN       => 0x03,
            O::Dup        => 0x04,
            O::LocA       => 0x0a,
            O::ArgA       => 0x0b,
            O::GlobA      => 0x0c,
            O::Load8      => 0x10,
            O::Load16     => 0x11,
            O::Load32     => 0x12,
            O::Load64     => 0x13,
            O::Store8     => 0x14,
            O::Store16    => 0x15,
            O::Store32    => 0x16,
            O::Store64    => 0x17,
            O::Alloc      => 0x18,
            O::Free       => 0x19,
            O::StackAlloc => 0x1a,
            O::AddI       => 0x20,
            O::SubI       => 0x21,
            O::MulI       => 0x22,
            O::DivI       => 0x23,
            O::AddF       => 0x24,
            O::SubF       => 0x25,
            O::MulF       => 0x26,
            O::DivF       => 0x27,
            O::DivU       => 0x28,
            O::Shl        => 0x29,
            O::Shr        => 0x2a,
            O::And        => 0x2b,
            O::Or         => 0x2c,
            O::Xor        => 0x2d,
            O::Not        => 0x2e,
            O::CmpI       => 0x30,
            O::CmpU       => 0x31,
            O::CmpF       => 0x32,
            O::NegI       => 0x34,
            O::NegF       => 0x35,
            O::IToF       => 0x36,
            O::FToI       => 0x37,
            O::ShrL       => 0x38,
            O::SetLt      => 0x39,
            O::SetGt      => 0x3a,
            O::Br         => 0x41,
            O::BrFalse    => 0x42,
            O::BrTrue     => 0x43,
            O::Call       => 0x48,
            O::Ret        => 0x49,
            O::CallName   => 0x4a,
            O::ScanI      => 0x50,
            O::ScanC      => 0x51,
            O::ScanF      => 0x52,
            O::PrintI     => 0x54,
            O::PrintC     => 0x55,
            O::PrintF     => 0x56,
            O::PrintS     => 0x57,
            O::PrintLn    => 0x58,
            O::Panic      => 0xfe,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Operation> {
        Self::ALL.iter().copied().find(|op| op.opcode() == opcode)
    }

    pub fn operand_width(self) -> OperandWidth {
        use Operation as O;
        match self {
            O::Push => OperandWidth::Eight,
            O::PopN
            | O::LocA
            | O::ArgA
            | O::GlobA
            | O::StackAlloc
            | O::Br
            | O::BrFalse
            | O::BrTrue
            | O::Call
            | O::CallName => OperandWidth::Four,
            _ => OperandWidth::None,
        }
    }

    pub fn is_branch(self) -> bool {
        matches!(self, Operation::Br | Operation::BrFalse | Operation::BrTrue)
    }
}

/// Immediate operand of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operand {
    U32(u32),
    I32(i32),
    I64(i64),
    F64(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Instruction {
    pub op: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operand: Option<Operand>,
}

impl Instruction {
    pub fn new(op: Operation) -> Self {
        Self { op, operand: None }
    }

    pub fn with_operand(op: Operation, operand: Operand) -> Self {
        Self {
            op,
            operand: Some(operand),
        }
    }

    /// Branch whose offset is filled in later by [`InstructionStream::patch`].
    pub fn placeholder(op: Operation) -> Self {
        debug_assert!(op.is_branch());
        Self { op, operand: None }
    }

    /// True once the instruction carries the operand its opcode requires.
    pub fn is_complete(&self) -> bool {
        match (self.op.operand_width(), self.operand) {
            (OperandWidth::None, None) => true,
            (OperandWidth::Four, Some(Operand::U32(_) | Operand::I32(_))) => true,
            (OperandWidth::Eight, Some(Operand::I64(_) | Operand::F64(_))) => true,
            _ => false,
        }
    }
}

/// Append-only instruction list of one function.
///
/// The only mutations besides appending are retracting the last instruction
/// and overwriting the offset of a branch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstructionStream {
    code: Vec<Instruction>,
}

impl InstructionStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction and return its index.
    pub fn push(&mut self, instruction: Instruction) -> usize {
        self.code.push(instruction);
        self.code.len() - 1
    }

    pub fn pop(&mut self) -> Option<Instruction> {
        self.code.pop()
    }

    pub fn last(&self) -> Option<&Instruction> {
        self.code.last()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn as_slice(&self) -> &[Instruction] {
        &self.code
    }

    /// Point the branch at `index` to the instruction at `target`.
    ///
    /// Offsets count from the instruction following the branch, so
    /// `target == index + 1` yields zero.
    pub fn patch(&mut self, index: usize, target: usize) {
        let offset = target as i64 - (index as i64 + 1);
        let branch = &mut self.code[index];
        assert!(branch.op.is_branch(), "only branches can be patched, found {:?}", branch.op);
        branch.operand = Some(Operand::I32(offset as i32));
    }
}

//! Binary module format.
//!
//! All integers are big-endian with no padding:
//!
//! ```text
//! magic u32, version u32,
//! globals_count u32, { order u8, length u32, bytes }*
//! functions_count u32, { name u32, ret u32, params u32, locals u32,
//!                        instr_count u32, { opcode u8, operand 0|4|8 }* }*
//! ```

use anyhow::{Context, Result, anyhow, bail};
use std::io::{self, Write};

use crate::model::{FunctionDef, GlobalDef, MAGIC, Module, VERSION};
use crate::processor::instruction::{Instruction, Operand, OperandWidth, Operation};

pub fn emit(module: &Module, out: &mut impl Write) -> io::Result<()> {
    out.write_all(&encode(module))?;
    out.flush()
}

pub fn encode(module: &Module) -> Vec<u8> {
    let mut buf = Vec::new();
    put_u32(&mut buf, module.magic);
    put_u32(&mut buf, module.version);

    put_u32(&mut buf, module.globals.len() as u32);
    for global in &module.globals {
        // Only the low byte of the declaration index is kept.
        buf.push(global.order as u8);
        put_u32(&mut buf, global.value.len() as u32);
        buf.extend_from_slice(&global.value);
    }

    put_u32(&mut buf, module.functions.len() as u32);
    for func in &module.functions {
        put_u32(&mut buf, func.name);
        put_u32(&mut buf, func.return_slots);
        put_u32(&mut buf, func.param_slots);
        put_u32(&mut buf, func.local_slots);
        put_u32(&mut buf, func.body.len() as u32);
        for instr in &func.body {
            buf.push(instr.op.opcode());
            match instr.operand {
                None => {}
                Some(Operand::U32(v)) => put_u32(&mut buf, v),
                Some(Operand::I32(v)) => buf.extend_from_slice(&v.to_be_bytes()),
                Some(Operand::I64(v)) => buf.extend_from_slice(&v.to_be_bytes()),
                Some(Operand::F64(v)) => buf.extend_from_slice(&v.to_bits().to_be_bytes()),
            }
        }
    }
    buf
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Parse a module back from its binary form.
///
/// 4-byte operands come back as `I32` for branches and `U32` otherwise,
/// 8-byte operands always as `I64` since the format does not record
/// whether a `push` carried a float.
pub fn decode(bytes: &[u8]) -> Result<Module> {
    let mut r = Reader { bytes, pos: 0 };

    let magic = r.u32().context("reading magic")?;
    if magic != MAGIC {
        bail!("bad magic 0x{magic:08x}, expected 0x{MAGIC:08x}");
    }
    let version = r.u32().context("reading version")?;
    if version != VERSION {
        bail!("unsupported module version {version}");
    }

    let count = r.u32().context("reading global count")?;
    let mut globals = Vec::new();
    for order in 0..count {
        let tag = r.u8().with_context(|| format!("reading global {order}"))?;
        if tag != order as u8 {
            bail!("global {order} is tagged {tag}");
        }
        let len = r.u32().with_context(|| format!("reading global {order}"))?;
        let value = r.take(len as usize).with_context(|| format!("reading global {order}"))?;
        globals.push(GlobalDef {
            order,
            value: value.to_vec(),
        });
    }

    let count = r.u32().context("reading function count")?;
    let mut functions = Vec::new();
    for index in 0..count {
        let func = r.function().with_context(|| format!("reading function {index}"))?;
        functions.push(func);
    }

    if r.pos != bytes.len() {
        bail!("{} trailing bytes after the function table", bytes.len() - r.pos);
    }

    Ok(Module {
        magic,
        version,
        globals,
        functions,
    })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.bytes.len());
        let Some(end) = end else {
            return Err(anyhow!("unexpected end of module at byte {}", self.pos));
        };
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn function(&mut self) -> Result<FunctionDef> {
        let name = self.u32()?;
        let return_slots = self.u32()?;
        let param_slots = self.u32()?;
        let local_slots = self.u32()?;
        let count = self.u32()?;

        let mut body = Vec::new();
        for _ in 0..count {
            body.push(self.instruction()?);
        }
        Ok(FunctionDef {
            name,
            return_slots,
            param_slots,
            local_slots,
            body,
        })
    }

    fn instruction(&mut self) -> Result<Instruction> {
        let at = self.pos;
        let opcode = self.u8()?;
        let Some(op) = Operation::from_opcode(opcode) else {
            bail!("unknown opcode 0x{opcode:02x} at byte {at}");
        };

        let operand = match op.operand_width() {
            OperandWidth::None => None,
            OperandWidth::Four if op.is_branch() => Some(Operand::I32(i32::from_be_bytes(self.array()?))),
            OperandWidth::Four => Some(Operand::U32(u32::from_be_bytes(self.array()?))),
            OperandWidth::Eight => Some(Operand::I64(i64::from_be_bytes(self.array()?))),
        };
        Ok(Instruction { op, operand })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Module {
        Module::new(
            vec![
                GlobalDef {
                    order: 0,
                    value: b"_start".to_vec(),
                },
                GlobalDef {
                    order: 1,
                    value: vec![0; 8],
                },
            ],
            vec![FunctionDef {
                name: 0,
                return_slots: 0,
                param_slots: 0,
                local_slots: 0,
                body: vec![
                    Instruction::with_operand(Operation::Push, Operand::I64(-2)),
                    Instruction::with_operand(Operation::BrTrue, Operand::I32(-1)),
                    Instruction::with_operand(Operation::GlobA, Operand::U32(1)),
                    Instruction::new(Operation::Ret),
                ],
            }],
        )
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(&sample());

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x72, 0x30, 0x3b, 0x3e,     // magic
            0, 0, 0, 1,                 // version
            0, 0, 0, 2,                 // globals
            0, 0, 0, 0, 6, b'_', b's', b't', b'a', b'r', b't',
            1, 0, 0, 0, 8, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 1,                 // functions
            0, 0, 0, 0,                 // name
            0, 0, 0, 0,                 // ret
            0, 0, 0, 0,                 // params
            0, 0, 0, 0,                 // locals
            0, 0, 0, 4,                 // instructions
            0x01, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
            0x43, 0xff, 0xff, 0xff, 0xff,
            0x0c, 0, 0, 0, 1,
            0x49,
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_global_tag_is_declaration_order() {
        let globals: Vec<GlobalDef> = (0..300)
            .map(|order| GlobalDef {
                order,
                value: Vec::new(),
            })
            .collect();
        let bytes = encode(&Module::new(globals, Vec::new()));

        // magic, version and count, then 5 bytes per empty global
        let tags: Vec<u8> = bytes[12..].chunks(5).take(300).map(|g| g[0]).collect();
        assert_eq!(&tags[..4], &[0, 1, 2, 3]);
        assert_eq!(tags[255], 255);
        assert_eq!(tags[256], 0);
        assert_eq!(decode(&bytes).unwrap().globals.len(), 300);
    }

    #[test]
    fn test_decode_rejects_out_of_order_tag() {
        let mut bytes = encode(&sample());
        // tag of the second global
        bytes[12 + 5 + 6] = 7;
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.to_string(), "global 1 is tagged 7");
    }

    #[test]
    fn test_decode_roundtrip() {
        let module = sample();
        assert_eq!(decode(&encode(&module)).unwrap(), module);
    }

    #[test]
    fn test_float_push_keeps_bits() {
        let mut module = sample();
        module.functions[0].body = vec![Instruction::with_operand(Operation::Push, Operand::F64(1.5))];
        let decoded = decode(&encode(&module)).unwrap();
        assert_eq!(
            decoded.functions[0].body[0].operand,
            Some(Operand::I64(1.5f64.to_bits() as i64))
        );
    }

    #[test]
    fn test_decode_errors() {
        let bytes = encode(&sample());
        let test_cases: Vec<(Vec<u8>, &str)> = vec![
            (vec![0, 0, 0, 0, 0, 0, 0, 1], "bad magic"),
            (bytes[..bytes.len() - 1].to_vec(), "reading function 0"),
            ([bytes.as_slice(), &[0]].concat(), "1 trailing bytes"),
            (bytes[..6].to_vec(), "reading version"),
        ];

        for (input, expected) in test_cases {
            let err = decode(&input).unwrap_err();
            assert!(err.to_string().starts_with(expected), "got error message: {err}");
        }
    }

    #[test]
    fn test_decode_unknown_opcode() {
        let mut bytes = encode(&sample());
        let last = bytes.len() - 1;
        bytes[last] = 0x33;
        let err = decode(&bytes).unwrap_err();
        assert!(format!("{err:#}").contains("unknown opcode 0x33"), "got error message: {err:#}");
    }
}

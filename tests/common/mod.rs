//! Tiny stack interpreter for compiled modules, just enough of the VM to
//! observe what compiled programs do.

#![allow(dead_code)]

use c0_rust::model::Module;
use c0_rust::processor::instruction::{Instruction, Operand, Operation};
use c0_rust::writer::bin;

const GLOBAL_TAG: u64 = 1 << 63;
const STEP_LIMIT: usize = 100_000;

/// Compile `source` all the way to module bytes.
pub fn compile(source: &str) -> Vec<u8> {
    let module = c0_rust::processor::run(source).expect("program compiles");
    bin::encode(&module)
}

/// Compile, decode and execute `source`, returning everything it printed.
pub fn execute(source: &str, input: &str) -> String {
    let module = bin::decode(&compile(source)).expect("module decodes");
    Vm::new(&module, input).run()
}

struct Frame {
    func: usize,
    ip: usize,
    args: usize,
    locals: usize,
}

pub struct Vm<'m> {
    module: &'m Module,
    stack: Vec<u64>,
    globals: Vec<u64>,
    frames: Vec<Frame>,
    input: std::vec::IntoIter<String>,
    output: String,
}

fn u32_operand(instr: &Instruction) -> u32 {
    match instr.operand {
        Some(Operand::U32(v)) => v,
        other => panic!("{:?} expects a u32 operand, got {other:?}", instr.op),
    }
}

fn i32_operand(instr: &Instruction) -> i32 {
    match instr.operand {
        Some(Operand::I32(v)) => v,
        other => panic!("{:?} expects an i32 operand, got {other:?}", instr.op),
    }
}

fn f(v: u64) -> f64 {
    f64::from_bits(v)
}

fn i(v: u64) -> i64 {
    v as i64
}

impl<'m> Vm<'m> {
    pub fn new(module: &'m Module, input: &str) -> Self {
        Self {
            module,
            stack: Vec::new(),
            globals: vec![0; module.globals.len()],
            frames: Vec::new(),
            input: input.split_whitespace().map(str::to_string).collect::<Vec<_>>().into_iter(),
            output: String::new(),
        }
    }

    fn pop(&mut self) -> u64 {
        self.stack.pop().expect("operand stack underflow")
    }

    fn push(&mut self, v: u64) {
        self.stack.push(v);
    }

    fn enter(&mut self, func: usize) {
        let def = &self.module.functions[func];
        let args = self.stack.len() - (def.param_slots + def.return_slots) as usize;
        let locals = self.stack.len();
        self.stack.resize(locals + def.local_slots as usize, 0);
        self.frames.push(Frame { func, ip: 0, args, locals });
    }

    fn load(&self, addr: u64) -> u64 {
        if addr & GLOBAL_TAG != 0 {
            self.globals[(addr & !GLOBAL_TAG) as usize]
        } else {
            self.stack[addr as usize]
        }
    }

    fn store(&mut self, addr: u64, v: u64) {
        if addr & GLOBAL_TAG != 0 {
            self.globals[(addr & !GLOBAL_TAG) as usize] = v;
        } else {
            self.stack[addr as usize] = v;
        }
    }

    fn binary(&mut self, apply: impl Fn(u64, u64) -> u64) {
        let rhs = self.pop();
        let lhs = self.pop();
        self.push(apply(lhs, rhs));
    }

    /// Run `_start` until it falls off its end.
    pub fn run(mut self) -> String {
        use Operation as O;
        self.enter(0);

        for _ in 0..STEP_LIMIT {
            let Some(frame) = self.frames.last_mut() else {
                panic!("returned out of the entry function");
            };
            let body = &self.module.functions[frame.func].body;
            let Some(&instr) = body.get(frame.ip) else {
                assert_eq!(self.frames.len(), 1, "fell off the end of a function");
                return self.output;
            };
            frame.ip += 1;
            let (args, locals) = (frame.args, frame.locals);

            match instr.op {
                O::Nop => {}
                O::Push => match instr.operand {
                    Some(Operand::I64(v)) => self.push(v as u64),
                    Some(Operand::F64(v)) => self.push(v.to_bits()),
                    other => panic!("bad push operand {other:?}"),
                },
                O::Pop => {
                    self.pop();
                }
                O::PopN => {
                    for _ in 0..u32_operand(&instr) {
                        self.pop();
                    }
                }
                O::Dup => {
                    let v = self.pop();
                    self.push(v);
                    self.push(v);
                }
                O::LocA => self.push((locals + u32_operand(&instr) as usize) as u64),
                O::ArgA => self.push((args + u32_operand(&instr) as usize) as u64),
                O::GlobA => self.push(GLOBAL_TAG | u32_operand(&instr) as u64),
                O::Load64 => {
                    let addr = self.pop();
                    let v = self.load(addr);
                    self.push(v);
                }
                O::Store64 => {
                    let v = self.pop();
                    let addr = self.pop();
                    self.store(addr, v);
                }
                O::StackAlloc => {
                    for _ in 0..u32_operand(&instr) {
                        self.push(0);
                    }
                }
                O::AddI => self.binary(|a, b| i(a).wrapping_add(i(b)) as u64),
                O::SubI => self.binary(|a, b| i(a).wrapping_sub(i(b)) as u64),
                O::MulI => self.binary(|a, b| i(a).wrapping_mul(i(b)) as u64),
                O::DivI => self.binary(|a, b| (i(a) / i(b)) as u64),
                O::AddF => self.binary(|a, b| (f(a) + f(b)).to_bits()),
                O::SubF => self.binary(|a, b| (f(a) - f(b)).to_bits()),
                O::MulF => self.binary(|a, b| (f(a) * f(b)).to_bits()),
                O::DivF => self.binary(|a, b| (f(a) / f(b)).to_bits()),
                O::Not => {
                    let v = self.pop();
                    self.push((v == 0) as u64);
                }
                O::CmpI => self.binary(|a, b| i(a).cmp(&i(b)) as i64 as u64),
                O::CmpF => self.binary(|a, b| match f(a).partial_cmp(&f(b)) {
                    Some(ord) => ord as i64 as u64,
                    None => 0,
                }),
                O::NegI => {
                    let v = self.pop();
                    self.push(i(v).wrapping_neg() as u64);
                }
                O::NegF => {
                    let v = self.pop();
                    self.push((-f(v)).to_bits());
                }
                O::IToF => {
                    let v = self.pop();
                    self.push((i(v) as f64).to_bits());
                }
                O::FToI => {
                    let v = self.pop();
                    self.push(f(v) as i64 as u64);
                }
                O::SetLt => {
                    let v = self.pop();
                    self.push((i(v) < 0) as u64);
                }
                O::SetGt => {
                    let v = self.pop();
                    self.push((i(v) > 0) as u64);
                }
                O::Br | O::BrFalse | O::BrTrue => {
                    let taken = match instr.op {
                        O::Br => true,
                        O::BrFalse => self.pop() == 0,
                        _ => self.pop() != 0,
                    };
                    if taken {
                        let frame = self.frames.last_mut().expect("active frame");
                        frame.ip = (frame.ip as i64 + i32_operand(&instr) as i64) as usize;
                    }
                }
                O::Call => self.enter(u32_operand(&instr) as usize),
                O::CallName => {
                    let name = u32_operand(&instr);
                    let func = self
                        .module
                        .functions
                        .iter()
                        .position(|def| def.name == name)
                        .expect("callname resolves");
                    self.enter(func);
                }
                O::Ret => {
                    let frame = self.frames.pop().expect("active frame");
                    let def = &self.module.functions[frame.func];
                    self.stack.truncate(frame.args + def.return_slots as usize);
                }
                O::ScanI | O::ScanC | O::ScanF => {
                    let word = self.input.next().expect("program reads more input than given");
                    let v = match instr.op {
                        O::ScanI => word.parse::<i64>().expect("integer input") as u64,
                        O::ScanF => word.parse::<f64>().expect("float input").to_bits(),
                        _ => word.chars().next().map_or(0, |c| c as u64),
                    };
                    self.push(v);
                }
                O::PrintI => {
                    let v = self.pop();
                    self.output.push_str(&i(v).to_string());
                }
                O::PrintC => {
                    let v = self.pop();
                    self.output.push(char::from_u32(v as u32).unwrap_or('?'));
                }
                O::PrintF => {
                    let v = self.pop();
                    self.output.push_str(&f(v).to_string());
                }
                O::PrintS => {
                    let slot = self.pop() as usize;
                    let bytes = &self.module.globals[slot].value;
                    self.output.push_str(&String::from_utf8_lossy(bytes));
                }
                O::PrintLn => self.output.push('\n'),
                other => panic!("{other:?} is never emitted by the compiler"),
            }
        }
        panic!("program did not finish within {STEP_LIMIT} steps");
    }
}

//! Single-pass analyser.
//!
//! Parses the token stream with one token of lookahead, resolves names
//! through the scope stack, type checks, and emits stack-machine code into
//! the function being analysed, all at the same time.
//
//  Grammar excerpts (informal):
//
//      program   ::= (function | let_decl | const_decl)* EOF
//      function  ::= 'fn' IDENT '(' params? ')' '->' ty block
//      params    ::= param (',' param)*
//      param     ::= 'const'? IDENT ':' ty

mod expr;
mod stmt;

use super::error::{AnalysisError, AnalysisErrorKind, CompileError, ParseError, ParseErrorKind};
use super::function::FunctionTable;
use super::intrinsic::Intrinsic;
use super::instruction::{Instruction, Operand, Operation};
use super::lexer::{Lexer, Pos, Token, TokenKind};
use super::symbols::{StorageClass, SymbolEntry, SymbolTable, ValueType};
use crate::model::{GlobalValue, Program};
use log::{debug, trace};
use std::collections::HashMap;

/// Name of the synthetic function that initializes globals and calls `main`.
pub const ENTRY_NAME: &str = "_start";

/// Index of the entry wrapper in the function list.
const ENTRY: usize = 0;

#[derive(Debug)]
struct LoopFrame {
    /// Offset of the first instruction of the loop condition.
    head: usize,
    /// `break` branches waiting for the end of the loop.
    breaks: Vec<usize>,
}

pub struct Analyser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Token>,
    symbols: SymbolTable,
    globals: Vec<GlobalValue>,
    functions: Vec<FunctionTable>,
    function_names: HashMap<String, usize>,
    /// Function receiving emitted code.
    current: usize,
    loops: Vec<LoopFrame>,
}

pub(crate) fn analysis_error(kind: AnalysisErrorKind, pos: Pos) -> CompileError {
    CompileError::Analysis(AnalysisError::new(kind, pos))
}

pub(crate) fn parse_error(kind: ParseErrorKind, pos: Pos) -> CompileError {
    CompileError::Parse(ParseError::new(kind, pos))
}

impl<'a> Analyser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut analyser = Self {
            lexer: Lexer::new(source),
            peeked: None,
            symbols: SymbolTable::new(),
            globals: Vec::new(),
            functions: Vec::new(),
            function_names: HashMap::new(),
            current: ENTRY,
            loops: Vec::new(),
        };

        let slot = analyser.add_global(GlobalValue::Bytes(ENTRY_NAME.as_bytes().to_vec()));
        analyser.functions.push(FunctionTable::new(ENTRY_NAME, slot, ValueType::Void));
        analyser
    }

    /// Analyse the whole input and hand back the finished tables.
    pub fn analyse(mut self) -> Result<Program, CompileError> {
        // Reserve the entry name so no user function can claim it.
        let entry = SymbolEntry::function(ValueType::Void, self.functions[ENTRY].name_slot);
        self.symbols.declare(ENTRY_NAME, entry, Pos::default())?;

        self.program()?;
        self.call_main()?;

        debug!(
            "analysis finished: {} globals, {} functions",
            self.globals.len(),
            self.functions.len()
        );
        Ok(Program {
            globals: self.globals,
            functions: self.functions,
        })
    }

    // ── Token stream ───────────────────────────────────────────────

    fn peek(&mut self) -> Result<&Token, CompileError> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.lexer.next_token()?,
        };
        Ok(self.peeked.insert(token))
    }

    fn peek_kind(&mut self) -> Result<TokenKind, CompileError> {
        Ok(self.peek()?.kind)
    }

    fn next(&mut self) -> Result<Token, CompileError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => Ok(self.lexer.next_token()?),
        }
    }

    fn check(&mut self, kind: TokenKind) -> Result<bool, CompileError> {
        Ok(self.peek_kind()? == kind)
    }

    fn next_if(&mut self, kind: TokenKind) -> Result<Option<Token>, CompileError> {
        if self.check(kind)? {
            self.next().map(Some)
        } else {
            Ok(None)
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, CompileError> {
        let token = self.next()?;
        if token.kind == kind {
            Ok(token)
        } else {
            Err(parse_error(
                ParseErrorKind::ExpectedTokenKind {
                    expected: kind,
                    found: token.kind,
                },
                token.start,
            ))
        }
    }

    // ── Code emission ──────────────────────────────────────────────

    fn function(&self) -> &FunctionTable {
        &self.functions[self.current]
    }

    fn function_mut(&mut self) -> &mut FunctionTable {
        &mut self.functions[self.current]
    }

    fn emit(&mut self, op: Operation) -> usize {
        self.function_mut().body.push(Instruction::new(op))
    }

    fn emit_with(&mut self, op: Operation, operand: Operand) -> usize {
        self.function_mut().body.push(Instruction::with_operand(op, operand))
    }

    fn emit_placeholder(&mut self, op: Operation) -> usize {
        self.function_mut().body.push(Instruction::placeholder(op))
    }

    /// Offset the next emitted instruction will get.
    fn offset(&self) -> usize {
        self.function().body.len()
    }

    fn patch(&mut self, index: usize, target: usize) {
        trace!("patch branch {index} -> {target} in '{}'", self.function().name);
        self.function_mut().body.patch(index, target);
    }

    /// Push the address of a variable.
    fn emit_address(&mut self, storage: StorageClass, slot: u32) {
        let (op, address) = match storage {
            StorageClass::Global => (Operation::GlobA, slot),
            StorageClass::Parameter => (Operation::ArgA, self.function().param_address(slot)),
            StorageClass::Local => (Operation::LocA, slot),
        };
        self.emit_with(op, Operand::U32(address));
    }

    fn add_global(&mut self, value: GlobalValue) -> u32 {
        let slot = self.globals.len() as u32;
        self.globals.push(value);
        slot
    }

    // ── Items ──────────────────────────────────────────────────────

    fn program(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek_kind()? {
                TokenKind::Fn => self.function_decl()?,
                TokenKind::Let => self.let_decl()?,
                TokenKind::Const => self.const_decl()?,
                TokenKind::Eof => return Ok(()),
                other => {
                    let pos = self.peek()?.start;
                    return Err(parse_error(ParseErrorKind::UnexpectedToken(other), pos));
                }
            }
        }
    }

    fn function_decl(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Fn)?;
        let name_token = self.expect(TokenKind::Ident)?;
        let name = name_token.text().to_string();
        if Intrinsic::from_name(&name).is_some() {
            return Err(analysis_error(AnalysisErrorKind::DuplicateDeclaration(name), name_token.start));
        }

        let slot = self.globals.len() as u32;
        let symbol = self
            .symbols
            .declare(&name, SymbolEntry::function(ValueType::Void, slot), name_token.start)?;
        self.add_global(GlobalValue::Bytes(name.as_bytes().to_vec()));

        // Registered before the body so the function can call itself.
        let index = self.functions.len();
        self.functions.push(FunctionTable::new(&name, slot, ValueType::Void));
        self.function_names.insert(name.clone(), index);
        self.current = index;
        debug!("function '{name}' takes global slot {slot}");

        // Parameters get their own scope so the body block may shadow them.
        self.symbols.enter_scope();

        self.expect(TokenKind::LParen)?;
        if matches!(self.peek_kind()?, TokenKind::Const | TokenKind::Ident) {
            self.param()?;
            while self.next_if(TokenKind::Comma)?.is_some() {
                self.param()?;
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Arrow)?;

        let (return_type, _) = self.type_name()?;
        self.function_mut().return_type = return_type;
        self.symbols.get_mut(symbol).ty = return_type;

        self.block()?;
        self.symbols.exit_scope();

        if self.function().falls_off_end() {
            self.emit(Operation::Ret);
        }
        debug!(
            "function '{name}' done: {} params, {} locals, {} instructions",
            self.function().params.len(),
            self.function().locals.len(),
            self.function().body.len()
        );

        self.current = ENTRY;
        Ok(())
    }

    fn param(&mut self) -> Result<(), CompileError> {
        let is_constant = self.next_if(TokenKind::Const)?.is_some();
        let name_token = self.expect(TokenKind::Ident)?;
        self.expect(TokenKind::Colon)?;
        let (ty, _) = self.type_name()?;
        if ty == ValueType::Void {
            return Err(analysis_error(
                AnalysisErrorKind::IllegalVoidDeclaration(name_token.text().to_string()),
                name_token.start,
            ));
        }

        let slot = self.function().params.len() as u32;
        let entry = SymbolEntry::variable(ty, StorageClass::Parameter, slot, is_constant, true);
        self.symbols.declare(name_token.text(), entry.clone(), name_token.start)?;
        self.function_mut().params.push(entry);
        Ok(())
    }

    fn type_name(&mut self) -> Result<(ValueType, Pos), CompileError> {
        let token = self.expect(TokenKind::Ident)?;
        match ValueType::from_name(token.text()) {
            Some(ty) => Ok((ty, token.start)),
            None => Err(analysis_error(
                AnalysisErrorKind::UnknownType(token.text().to_string()),
                token.start,
            )),
        }
    }

    /// Finish the entry wrapper with the call to `main`.
    fn call_main(&mut self) -> Result<(), CompileError> {
        let pos = self.peek()?.start;
        let Some(&index) = self.function_names.get("main") else {
            return Err(analysis_error(AnalysisErrorKind::UndefinedFunction("main".into()), pos));
        };

        let main = &self.functions[index];
        let (return_slots, name_slot, param_count) = (main.return_slots(), main.name_slot, main.params.len());
        if param_count != 0 {
            return Err(analysis_error(
                AnalysisErrorKind::ArgumentMismatch {
                    function: "main".into(),
                    expected: 0,
                    found: param_count,
                },
                pos,
            ));
        }

        self.current = ENTRY;
        if return_slots > 0 {
            self.emit_with(Operation::StackAlloc, Operand::U32(return_slots));
        }
        self.emit_with(Operation::CallName, Operand::U32(name_slot));
        if return_slots > 0 {
            self.emit_with(Operation::PopN, Operand::U32(return_slots));
        }
        Ok(())
    }
}

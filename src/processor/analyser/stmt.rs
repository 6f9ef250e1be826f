//! Blocks, declarations and control flow.

use super::{Analyser, LoopFrame, analysis_error};
use crate::model::GlobalValue;
use crate::processor::error::{AnalysisErrorKind, CompileError};
use crate::processor::instruction::{Operand, Operation};
use crate::processor::lexer::TokenKind;
use crate::processor::symbols::{StorageClass, SymbolEntry, ValueType};
use log::trace;

impl Analyser<'_> {
    pub(super) fn block(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::LBrace)?;
        self.symbols.enter_scope();

        while !self.check(TokenKind::RBrace)? {
            self.statement()?;
        }

        self.expect(TokenKind::RBrace)?;
        self.symbols.exit_scope();
        Ok(())
    }

    fn statement(&mut self) -> Result<(), CompileError> {
        match self.peek_kind()? {
            TokenKind::Let => self.let_decl(),
            TokenKind::Const => self.const_decl(),
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::Break | TokenKind::Continue => self.jump_stmt(),
            TokenKind::LBrace => self.block(),
            TokenKind::Semicolon => self.next().map(drop),
            _ => self.expr_stmt(),
        }
    }

    pub(super) fn let_decl(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Let)?;
        self.declaration(false)
    }

    pub(super) fn const_decl(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Const)?;
        self.declaration(true)
    }

    /// `IDENT ':' ty ('=' expr)? ';'`, the initializer being mandatory for constants.
    fn declaration(&mut self, is_constant: bool) -> Result<(), CompileError> {
        let name_token = self.expect(TokenKind::Ident)?;
        let name = name_token.text().to_string();
        self.expect(TokenKind::Colon)?;
        let (ty, _) = self.type_name()?;
        if ty == ValueType::Void {
            return Err(analysis_error(AnalysisErrorKind::IllegalVoidDeclaration(name), name_token.start));
        }

        let (storage, slot) = if self.symbols.is_global_scope() {
            (StorageClass::Global, self.globals.len() as u32)
        } else {
            (StorageClass::Local, self.function().locals.len() as u32)
        };
        let entry = SymbolEntry::variable(ty, storage, slot, is_constant, false);
        let symbol = self.symbols.declare(&name, entry.clone(), name_token.start)?;
        match storage {
            StorageClass::Global => {
                self.add_global(GlobalValue::Numeric);
            }
            _ => self.function_mut().locals.push(entry),
        }
        trace!("declared {storage:?} '{name}: {ty}' in slot {slot}");

        let has_initializer = if is_constant {
            self.expect(TokenKind::Assign)?;
            true
        } else {
            self.next_if(TokenKind::Assign)?.is_some()
        };

        if has_initializer {
            self.emit_address(storage, slot);
            let value = self.value_expr()?;
            self.require_type(&value, ty)?;
            self.emit(Operation::Store64);
            self.symbols.mark_initialized(symbol);
        }

        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    fn if_stmt(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::If)?;
        self.condition()?;
        let skip_then = self.emit_placeholder(Operation::BrFalse);

        self.block()?;
        let skip_else = self.emit_placeholder(Operation::Br);
        let else_start = self.offset();
        self.patch(skip_then, else_start);

        if self.next_if(TokenKind::Else)?.is_some() {
            if self.check(TokenKind::If)? {
                self.if_stmt()?;
            } else {
                self.block()?;
            }
        }

        let end = self.offset();
        self.patch(skip_else, end);
        Ok(())
    }

    fn while_stmt(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::While)?;
        let head = self.offset();
        self.condition()?;
        let exit = self.emit_placeholder(Operation::BrFalse);

        self.loops.push(LoopFrame {
            head,
            breaks: Vec::new(),
        });
        self.block()?;
        let frame = self.loops.pop();

        let back = self.emit_placeholder(Operation::Br);
        self.patch(back, head);

        let end = self.offset();
        self.patch(exit, end);
        for index in frame.map(|f| f.breaks).unwrap_or_default() {
            self.patch(index, end);
        }
        Ok(())
    }

    fn jump_stmt(&mut self) -> Result<(), CompileError> {
        let token = self.next()?;
        let Some(head) = self.loops.last().map(|frame| frame.head) else {
            return Err(analysis_error(AnalysisErrorKind::BreakOrContinueOutsideLoop, token.start));
        };
        self.expect(TokenKind::Semicolon)?;

        let branch = self.emit_placeholder(Operation::Br);
        if token.kind == TokenKind::Continue {
            self.patch(branch, head);
        } else if let Some(frame) = self.loops.last_mut() {
            frame.breaks.push(branch);
        }
        Ok(())
    }

    fn return_stmt(&mut self) -> Result<(), CompileError> {
        let token = self.expect(TokenKind::Return)?;
        let expected = self.function().return_type;

        if expected == ValueType::Void {
            if !self.check(TokenKind::Semicolon)? {
                let value = self.value_expr()?;
                return Err(analysis_error(
                    AnalysisErrorKind::ReturnTypeMismatch {
                        expected,
                        found: value.ty,
                    },
                    value.pos,
                ));
            }
        } else {
            if self.check(TokenKind::Semicolon)? {
                return Err(analysis_error(AnalysisErrorKind::ReturnValueMissing, token.start));
            }

            // The return slot sits right below the arguments.
            self.emit_with(Operation::ArgA, Operand::U32(0));
            let value = self.value_expr()?;
            self.require_initialized(&value)?;
            if value.ty != expected {
                return Err(analysis_error(
                    AnalysisErrorKind::ReturnTypeMismatch {
                        expected,
                        found: value.ty,
                    },
                    value.pos,
                ));
            }
            self.emit(Operation::Store64);
        }

        self.expect(TokenKind::Semicolon)?;
        self.emit(Operation::Ret);
        Ok(())
    }

    fn expr_stmt(&mut self) -> Result<(), CompileError> {
        let value = self.expr()?;
        self.expect(TokenKind::Semicolon)?;
        if value.ty != ValueType::Void {
            self.emit_with(Operation::PopN, Operand::U32(1));
        }
        Ok(())
    }
}

//! Expressions, from assignment down to primaries.
//
//      expr      ::= value ('=' value)?
//      value     ::= additive (cmp_op additive)*
//      additive  ::= term (('+' | '-') term)*
//      term      ::= cast (('*' | '/') cast)*
//      cast      ::= unary ('as' ty)*
//      unary     ::= '-'* primary
//      primary   ::= '(' value ')' | literal | IDENT | IDENT '(' args? ')'

use super::{Analyser, analysis_error, parse_error};
use crate::model::GlobalValue;
use crate::processor::error::{AnalysisErrorKind, CompileError, ParseErrorKind};
use crate::processor::instruction::{Operand, Operation};
use crate::processor::intrinsic::Intrinsic;
use crate::processor::lexer::{Pos, Token, TokenKind, TokenValue};
use crate::processor::symbols::{StorageClass, SymbolClass, SymbolRef, ValueType};

/// Variable an expression value was loaded from.
#[derive(Debug, Clone)]
pub(super) struct Place {
    name: String,
    symbol: SymbolRef,
}

/// What an analysed expression left on the operand stack.
#[derive(Debug, Clone)]
pub(super) struct ExprValue {
    pub ty: ValueType,
    /// Start of the expression.
    pub pos: Pos,
    /// Set while the value is a plain variable load, i.e. still assignable.
    place: Option<Place>,
}

impl ExprValue {
    fn temporary(ty: ValueType, pos: Pos) -> Self {
        Self { ty, pos, place: None }
    }
}

/// Instructions following `cmp` for each comparison operator.
fn comparison(kind: TokenKind) -> Option<&'static [Operation]> {
    use Operation as O;
    Some(match kind {
        TokenKind::Lt => &[O::SetLt],
        TokenKind::Gt => &[O::SetGt],
        TokenKind::Le => &[O::SetGt, O::Not],
        TokenKind::Ge => &[O::SetLt, O::Not],
        TokenKind::Eq => &[O::Not],
        TokenKind::Neq => &[],
        _ => return None,
    })
}

fn arithmetic(kind: TokenKind, ty: ValueType) -> Operation {
    use Operation as O;
    let (int, float) = match kind {
        TokenKind::Plus => (O::AddI, O::AddF),
        TokenKind::Minus => (O::SubI, O::SubF),
        TokenKind::Mul => (O::MulI, O::MulF),
        _ => (O::DivI, O::DivF),
    };
    if ty == ValueType::Double { float } else { int }
}

impl Analyser<'_> {
    /// Top-level expression of a statement; the only place assignment is allowed.
    pub(super) fn expr(&mut self) -> Result<ExprValue, CompileError> {
        let target = self.value_expr()?;
        let Some(assign) = self.next_if(TokenKind::Assign)? else {
            return Ok(target);
        };

        let Some(place) = target.place else {
            return Err(analysis_error(AnalysisErrorKind::IllegalAssignmentTarget, assign.start));
        };
        let entry = self.symbols.get(place.symbol).clone();
        if entry.is_constant {
            return Err(analysis_error(AnalysisErrorKind::IllegalAssignmentTarget, target.pos));
        }

        // The target was loaded as if it were read, keep only its address.
        let load = self.function_mut().body.pop();
        debug_assert!(matches!(load, Some(i) if i.op == Operation::Load64));

        let value = self.value_expr()?;
        self.require_type(&value, entry.ty)?;
        self.emit(Operation::Store64);
        self.symbols.mark_initialized(place.symbol);

        Ok(ExprValue::temporary(ValueType::Void, target.pos))
    }

    /// Expression without assignment.
    ///
    /// A comparison yields `bool`, which no operator accepts, so chains
    /// like `a < b < c` fail on the second comparison.
    pub(super) fn value_expr(&mut self) -> Result<ExprValue, CompileError> {
        let mut left = self.additive()?;

        while let Some(tail) = comparison(self.peek_kind()?) {
            self.next()?;
            let right = self.additive()?;
            let ty = self.check_operands(&left, &right)?;

            let cmp = if ty == ValueType::Double { Operation::CmpF } else { Operation::CmpI };
            self.emit(cmp);
            for &op in tail {
                self.emit(op);
            }
            left = ExprValue::temporary(ValueType::Bool, left.pos);
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<ExprValue, CompileError> {
        let mut left = self.term()?;
        while matches!(self.peek_kind()?, TokenKind::Plus | TokenKind::Minus) {
            let op = self.next()?.kind;
            let right = self.term()?;
            let ty = self.check_operands(&left, &right)?;
            self.emit(arithmetic(op, ty));
            left = ExprValue::temporary(ty, left.pos);
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<ExprValue, CompileError> {
        let mut left = self.cast()?;
        while matches!(self.peek_kind()?, TokenKind::Mul | TokenKind::Div) {
            let op = self.next()?.kind;
            let right = self.cast()?;
            let ty = self.check_operands(&left, &right)?;
            self.emit(arithmetic(op, ty));
            left = ExprValue::temporary(ty, left.pos);
        }
        Ok(left)
    }

    fn cast(&mut self) -> Result<ExprValue, CompileError> {
        let mut value = self.unary()?;
        while self.next_if(TokenKind::As)?.is_some() {
            let (to, pos) = self.type_name()?;
            self.require_initialized(&value)?;
            match (value.ty, to) {
                (ValueType::Int, ValueType::Double) => {
                    self.emit(Operation::IToF);
                }
                (ValueType::Double, ValueType::Int) => {
                    self.emit(Operation::FToI);
                }
                (ValueType::Int, ValueType::Int) | (ValueType::Double, ValueType::Double) => {}
                (from, to) => return Err(analysis_error(AnalysisErrorKind::InvalidCastTarget { from, to }, pos)),
            }
            value = ExprValue::temporary(to, value.pos);
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<ExprValue, CompileError> {
        let mut negations = 0usize;
        let mut start = None;
        while let Some(minus) = self.next_if(TokenKind::Minus)? {
            negations += 1;
            start.get_or_insert(minus.start);
        }

        let value = self.primary()?;
        let Some(pos) = start else {
            return Ok(value);
        };

        self.require_initialized(&value)?;
        let neg = match value.ty {
            ValueType::Int => Operation::NegI,
            ValueType::Double => Operation::NegF,
            found => {
                return Err(analysis_error(
                    AnalysisErrorKind::TypeMismatch {
                        expected: ValueType::Int,
                        found,
                    },
                    value.pos,
                ));
            }
        };
        if negations % 2 == 1 {
            self.emit(neg);
        }
        Ok(ExprValue::temporary(value.ty, pos))
    }

    fn primary(&mut self) -> Result<ExprValue, CompileError> {
        match self.peek_kind()? {
            TokenKind::LParen => {
                self.next()?;
                let value = self.value_expr()?;
                self.expect(TokenKind::RParen)?;
                // A parenthesised variable is only ever read, never assigned.
                self.require_initialized(&value)?;
                Ok(ExprValue::temporary(value.ty, value.pos))
            }
            TokenKind::UIntLiteral | TokenKind::DoubleLiteral | TokenKind::CharLiteral | TokenKind::StringLiteral => {
                let token = self.next()?;
                Ok(self.literal(token))
            }
            TokenKind::Ident => {
                let token = self.next()?;
                if self.check(TokenKind::LParen)? {
                    self.call(token)
                } else {
                    self.identifier(token)
                }
            }
            other => {
                let pos = self.peek()?.start;
                Err(parse_error(ParseErrorKind::UnexpectedToken(other), pos))
            }
        }
    }

    fn literal(&mut self, token: Token) -> ExprValue {
        let ty = match token.value {
            TokenValue::UInt(n) => {
                self.emit_with(Operation::Push, Operand::I64(n as i64));
                ValueType::Int
            }
            TokenValue::Char(c) => {
                self.emit_with(Operation::Push, Operand::I64(c as i64));
                ValueType::Int
            }
            TokenValue::Double(x) => {
                self.emit_with(Operation::Push, Operand::F64(x));
                ValueType::Double
            }
            TokenValue::Str(s) => {
                // Every occurrence gets its own slot.
                let slot = self.add_global(GlobalValue::Bytes(s.into_bytes()));
                self.emit_with(Operation::Push, Operand::I64(slot as i64));
                ValueType::String
            }
            TokenValue::Ident(_) | TokenValue::None => ValueType::Void,
        };
        ExprValue::temporary(ty, token.start)
    }

    fn identifier(&mut self, token: Token) -> Result<ExprValue, CompileError> {
        let name = token.text().to_string();
        let Some(symbol) = self.symbols.resolve(&name) else {
            return Err(analysis_error(AnalysisErrorKind::UndefinedSymbol(name), token.start));
        };

        let entry = self.symbols.get(symbol).clone();
        if entry.class == SymbolClass::Function {
            let kind = if self.check(TokenKind::Assign)? {
                AnalysisErrorKind::IllegalAssignmentTarget
            } else {
                AnalysisErrorKind::NotAValue(name)
            };
            return Err(analysis_error(kind, token.start));
        }

        self.emit_address(entry.storage, entry.slot);
        self.emit(Operation::Load64);
        Ok(ExprValue {
            ty: entry.ty,
            pos: token.start,
            place: Some(Place { name, symbol }),
        })
    }

    fn call(&mut self, token: Token) -> Result<ExprValue, CompileError> {
        let name = token.text().to_string();

        if let Some(intrinsic) = Intrinsic::from_name(&name) {
            self.arguments(&name, intrinsic.params(), token.start)?;
            self.emit(intrinsic.operation());
            return Ok(ExprValue::temporary(intrinsic.return_type(), token.start));
        }

        let Some(&index) = self.function_names.get(&name) else {
            return Err(analysis_error(AnalysisErrorKind::UndefinedFunction(name), token.start));
        };
        let callee = &self.functions[index];
        let (return_type, return_slots, params) = (callee.return_type, callee.return_slots(), callee.param_types());

        if return_slots > 0 {
            self.emit_with(Operation::StackAlloc, Operand::U32(return_slots));
        }
        self.arguments(&name, &params, token.start)?;
        self.emit_with(Operation::Call, Operand::U32(index as u32));
        Ok(ExprValue::temporary(return_type, token.start))
    }

    /// `'(' (value (',' value)*)? ')'`, checked against the callee's parameter types.
    fn arguments(&mut self, function: &str, params: &[ValueType], pos: Pos) -> Result<(), CompileError> {
        self.expect(TokenKind::LParen)?;

        let mut found = 0;
        if !self.check(TokenKind::RParen)? {
            loop {
                let value = self.value_expr()?;
                match params.get(found) {
                    Some(&expected) => self.require_type(&value, expected)?,
                    None => self.require_initialized(&value)?,
                }
                found += 1;
                if self.next_if(TokenKind::Comma)?.is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        if found != params.len() {
            return Err(analysis_error(
                AnalysisErrorKind::ArgumentMismatch {
                    function: function.to_string(),
                    expected: params.len(),
                    found,
                },
                pos,
            ));
        }
        Ok(())
    }

    // ── Checks ─────────────────────────────────────────────────────

    /// Reject consuming a local or parameter that was never stored to.
    ///
    /// Globals are exempt, the VM zeroes them before `_start` runs.
    pub(super) fn require_initialized(&self, value: &ExprValue) -> Result<(), CompileError> {
        let Some(place) = &value.place else {
            return Ok(());
        };
        let entry = self.symbols.get(place.symbol);
        if entry.is_initialized || entry.storage == StorageClass::Global {
            Ok(())
        } else {
            Err(analysis_error(
                AnalysisErrorKind::UninitializedRead(place.name.clone()),
                value.pos,
            ))
        }
    }

    pub(super) fn require_type(&self, value: &ExprValue, expected: ValueType) -> Result<(), CompileError> {
        self.require_initialized(value)?;
        if value.ty == expected {
            Ok(())
        } else {
            Err(analysis_error(
                AnalysisErrorKind::TypeMismatch {
                    expected,
                    found: value.ty,
                },
                value.pos,
            ))
        }
    }

    /// Both sides of a binary operator must be the same numeric type.
    fn check_operands(&self, left: &ExprValue, right: &ExprValue) -> Result<ValueType, CompileError> {
        self.require_initialized(left)?;
        self.require_initialized(right)?;
        if !left.ty.is_numeric() {
            return Err(analysis_error(
                AnalysisErrorKind::TypeMismatch {
                    expected: ValueType::Int,
                    found: left.ty,
                },
                left.pos,
            ));
        }
        if right.ty != left.ty {
            return Err(analysis_error(
                AnalysisErrorKind::TypeMismatch {
                    expected: left.ty,
                    found: right.ty,
                },
                right.pos,
            ));
        }
        Ok(left.ty)
    }

    /// Condition of `if`/`while`: an `int` or a comparison result.
    pub(super) fn condition(&mut self) -> Result<(), CompileError> {
        let value = self.value_expr()?;
        self.require_initialized(&value)?;
        match value.ty {
            ValueType::Int | ValueType::Bool => Ok(()),
            found => Err(analysis_error(
                AnalysisErrorKind::TypeMismatch {
                    expected: ValueType::Int,
                    found,
                },
                value.pos,
            )),
        }
    }
}

//! Fatal compilation errors.
//!
//! Nothing is recovered: the first error aborts the whole compilation and
//! carries the source position of the token that caused it.

use super::lexer::{Pos, TokenKind};
use super::symbols::ValueType;
use std::{error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum LexErrorKind {
    InvalidCharacter(char),
    UnterminatedLiteral,
    InvalidEscape(char),
    MalformedNumber(String),
    EmptyCharLiteral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub pos: Pos,
}

impl LexError {
    pub fn new(kind: LexErrorKind, pos: Pos) -> Self {
        Self { kind, pos }
    }
}

impl error::Error for LexError {}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use LexErrorKind as K;
        write!(f, "{}: ", self.pos)?;
        match &self.kind {
            K::InvalidCharacter(c) => write!(f, "invalid character {c:?}"),
            K::UnterminatedLiteral => write!(f, "unterminated literal"),
            K::InvalidEscape(c) => write!(f, "invalid escape sequence '\\{c}'"),
            K::MalformedNumber(text) => write!(f, "malformed number literal '{text}'"),
            K::EmptyCharLiteral => write!(f, "empty character literal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    UnexpectedToken(TokenKind),
    ExpectedTokenKind {
        expected: TokenKind,
        found: TokenKind,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub pos: Pos,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, pos: Pos) -> Self {
        Self { kind, pos }
    }
}

impl error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: ", self.pos)?;
        match &self.kind {
            ParseErrorKind::UnexpectedToken(found) => write!(f, "unexpected token {found}"),
            ParseErrorKind::ExpectedTokenKind { expected, found } => {
                write!(f, "encountered unexpected token {found}, expected {expected}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisErrorKind {
    DuplicateDeclaration(String),
    UndefinedSymbol(String),
    UndefinedFunction(String),
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },
    IllegalAssignmentTarget,
    IllegalVoidDeclaration(String),
    ReturnTypeMismatch {
        expected: ValueType,
        found: ValueType,
    },
    ReturnValueMissing,
    InvalidCastTarget {
        from: ValueType,
        to: ValueType,
    },
    BreakOrContinueOutsideLoop,
    UnknownType(String),
    UninitializedRead(String),
    NotAValue(String),
    ArgumentMismatch {
        function: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisError {
    pub kind: AnalysisErrorKind,
    pub pos: Pos,
}

impl AnalysisError {
    pub fn new(kind: AnalysisErrorKind, pos: Pos) -> Self {
        Self { kind, pos }
    }
}

impl error::Error for AnalysisError {}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use AnalysisErrorKind as K;
        write!(f, "{}: ", self.pos)?;
        match &self.kind {
            K::DuplicateDeclaration(name) => write!(f, "'{name}' is already declared in this scope"),
            K::UndefinedSymbol(name) => write!(f, "undefined symbol '{name}'"),
            K::UndefinedFunction(name) => write!(f, "undefined function '{name}'"),
            K::TypeMismatch { expected, found } => {
                write!(f, "type mismatch, expected {expected} but found {found}")
            }
            K::IllegalAssignmentTarget => write!(f, "left-hand side cannot be assigned to"),
            K::IllegalVoidDeclaration(name) => write!(f, "variable '{name}' cannot have type void"),
            K::ReturnTypeMismatch { expected, found } => {
                write!(f, "function returns {expected} but the returned value is {found}")
            }
            K::ReturnValueMissing => write!(f, "missing return value"),
            K::InvalidCastTarget { from, to } => write!(f, "cannot cast {from} to {to}"),
            K::BreakOrContinueOutsideLoop => write!(f, "break or continue outside of a loop"),
            K::UnknownType(name) => write!(f, "unknown type '{name}'"),
            K::UninitializedRead(name) => write!(f, "variable '{name}' is read before it is initialized"),
            K::NotAValue(name) => write!(f, "function '{name}' cannot be used as a value"),
            K::ArgumentMismatch {
                function,
                expected,
                found,
            } => write!(f, "'{function}' takes {expected} argument(s) but {found} were supplied"),
        }
    }
}

/// Any error raised while turning source text into a program.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    Analysis(AnalysisError),
}

impl CompileError {
    pub fn pos(&self) -> Pos {
        match self {
            CompileError::Lex(err) => err.pos,
            CompileError::Parse(err) => err.pos,
            CompileError::Analysis(err) => err.pos,
        }
    }
}

// The inner error is printed by `Display`, so it is not reported as a source.
impl error::Error for CompileError {}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileError::Lex(err) => write!(f, "lexical error at {err}"),
            CompileError::Parse(err) => write!(f, "syntax error at {err}"),
            CompileError::Analysis(err) => write!(f, "semantic error at {err}"),
        }
    }
}

impl From<LexError> for CompileError {
    fn from(err: LexError) -> Self {
        CompileError::Lex(err)
    }
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::Parse(err)
    }
}

impl From<AnalysisError> for CompileError {
    fn from(err: AnalysisError) -> Self {
        CompileError::Analysis(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_prints_message_once() {
        let err = CompileError::from(AnalysisError::new(
            AnalysisErrorKind::UndefinedSymbol("x".into()),
            Pos::new(1, 28),
        ));
        assert!(error::Error::source(&err).is_none());

        let report = format!("{:?}", anyhow::Error::from(err));
        assert!(report.starts_with("semantic error at 1:28: undefined symbol 'x'"), "{report}");
        assert!(!report.contains("Caused by"), "{report}");
    }
}

//! Symbol descriptors and the stack of nested lexical scopes.

use super::error::{AnalysisError, AnalysisErrorKind};
use super::lexer::Pos;
use std::collections::HashMap;
use std::fmt;

/// Static type of a value.
///
/// `String` only exists for literals and `Bool` only for comparison results,
/// neither can be named in a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Void,
    Int,
    Double,
    String,
    Bool,
}

impl ValueType {
    /// Resolve a type name as written in the source.
    pub fn from_name(name: &str) -> Option<ValueType> {
        match name {
            "void" => Some(ValueType::Void),
            "int" => Some(ValueType::Int),
            "double" => Some(ValueType::Double),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Double)
    }

    /// Number of 8-byte stack slots a value of this type occupies.
    pub fn slots(self) -> u32 {
        match self {
            ValueType::Void => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ValueType::Void => "void",
            ValueType::Int => "int",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Bool => "bool",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolClass {
    Variable,
    Function,
}

/// Decides which addressing instruction reaches a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Global,
    Parameter,
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolEntry {
    pub is_constant: bool,
    pub is_initialized: bool,
    pub class: SymbolClass,
    pub ty: ValueType,
    pub storage: StorageClass,
    /// Index within the storage class; global slots index the module's global table.
    pub slot: u32,
}

impl SymbolEntry {
    pub fn variable(ty: ValueType, storage: StorageClass, slot: u32, is_constant: bool, is_initialized: bool) -> Self {
        Self {
            is_constant,
            is_initialized,
            class: SymbolClass::Variable,
            ty,
            storage,
            slot,
        }
    }

    /// Entry for a function name; `ty` is the declared return type.
    pub fn function(ty: ValueType, slot: u32) -> Self {
        Self {
            is_constant: true,
            is_initialized: true,
            class: SymbolClass::Function,
            ty,
            storage: StorageClass::Global,
            slot,
        }
    }
}

/// Handle to an entry of a live scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRef {
    scope: usize,
    index: usize,
}

/// Names declared directly in one block, in declaration order.
#[derive(Debug, Default)]
struct Scope {
    names: HashMap<String, usize>,
    entries: Vec<(String, SymbolEntry)>,
}

/// Stack of scopes, the bottom one being the global scope.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn exit_scope(&mut self) {
        assert!(self.scopes.len() > 1, "the global scope cannot be exited");
        self.scopes.pop();
    }

    pub fn is_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Add `name` to the innermost scope.
    ///
    /// Shadowing a name from an enclosing scope is fine, declaring it twice
    /// in the same scope is not.
    pub fn declare(&mut self, name: &str, entry: SymbolEntry, pos: Pos) -> Result<SymbolRef, AnalysisError> {
        let scope_index = self.scopes.len() - 1;
        let scope = &mut self.scopes[scope_index];
        if scope.names.contains_key(name) {
            return Err(AnalysisError::new(
                AnalysisErrorKind::DuplicateDeclaration(name.to_string()),
                pos,
            ));
        }

        let index = scope.entries.len();
        scope.names.insert(name.to_string(), index);
        scope.entries.push((name.to_string(), entry));
        Ok(SymbolRef {
            scope: scope_index,
            index,
        })
    }

    /// Look `name` up from the innermost scope outwards.
    pub fn resolve(&self, name: &str) -> Option<SymbolRef> {
        self.scopes.iter().enumerate().rev().find_map(|(scope, s)| {
            s.names.get(name).map(|&index| SymbolRef { scope, index })
        })
    }

    pub fn get(&self, symbol: SymbolRef) -> &SymbolEntry {
        &self.scopes[symbol.scope].entries[symbol.index].1
    }

    pub fn get_mut(&mut self, symbol: SymbolRef) -> &mut SymbolEntry {
        &mut self.scopes[symbol.scope].entries[symbol.index].1
    }

    pub fn mark_initialized(&mut self, symbol: SymbolRef) {
        self.scopes[symbol.scope].entries[symbol.index].1.is_initialized = true;
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

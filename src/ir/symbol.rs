//! Symbol identities for declarations
//!
//! A symbol is an opaque token handed out by the surrounding compiler for every
//! declaration (locals, parameters, receivers, fields, functions, classes).
//! The folder only compares and hashes them; names exist for diagnostics.

use std::fmt;

/// Identity of a declaration, stable for the duration of one fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub u32);

impl Symbol {
    /// Root of the throwable class hierarchy
    pub const THROWABLE: Symbol = Symbol(0);
    /// Class of the exception thrown by integer division by zero
    pub const ARITHMETIC_EXCEPTION: Symbol = Symbol(1);
    /// Field holding an exception's message
    pub const MESSAGE: Symbol = Symbol(2);
    /// Thrown by a failed `as` cast
    pub const CLASS_CAST_EXCEPTION: Symbol = Symbol(3);
    /// Thrown by an array read outside its bounds
    pub const INDEX_OUT_OF_BOUNDS_EXCEPTION: Symbol = Symbol(4);
    /// Supertype of every non-null value
    pub const ANY: Symbol = Symbol(5);
    pub const INT: Symbol = Symbol(6);
    pub const BOOLEAN: Symbol = Symbol(7);
    pub const STRING: Symbol = Symbol(8);
    pub const ARRAY: Symbol = Symbol(9);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

const WELL_KNOWN: &[&str] = &[
    "Throwable",
    "ArithmeticException",
    "message",
    "ClassCastException",
    "IndexOutOfBoundsException",
    "Any",
    "Int",
    "Boolean",
    "String",
    "Array",
];

/// Allocates symbols and remembers their display names.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    names: Vec<String>,
}

impl SymbolTable {
    /// Create a table with the well-known symbols pre-registered.
    pub fn new() -> Self {
        Self {
            names: WELL_KNOWN.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Allocate a fresh symbol. Names need not be unique.
    pub fn fresh(&mut self, name: impl Into<String>) -> Symbol {
        let id = self.names.len() as u32;
        self.names.push(name.into());
        Symbol(id)
    }

    pub fn name(&self, symbol: Symbol) -> &str {
        self.names
            .get(symbol.index())
            .map(String::as_str)
            .unwrap_or("<unnamed>")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

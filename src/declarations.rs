//! Declaration metadata
//!
//! Answers the two questions the folder asks about a callee: what are its
//! builtin semantics, and may it be evaluated at all. Also carries the class
//! hierarchy used to match `catch` clauses and type checks.

use rustc_hash::FxHashMap;

use crate::builtins::Intrinsic;
use crate::ir::{NodeId, Symbol};
use crate::state::{Primitive, State};

/// What a call to a symbol actually runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Callee {
    /// Builtin operation on primitives
    Intrinsic(Intrinsic),
    /// User function or constructor, as a `Function` node
    Function(NodeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub symbol: Symbol,
    pub callee: Callee,
    /// Annotated as safe to evaluate at compile time
    pub foldable: bool,
}

impl FunctionDecl {
    pub fn is_intrinsic(&self) -> bool {
        matches!(self.callee, Callee::Intrinsic(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub symbol: Symbol,
    pub superclass: Option<Symbol>,
}

#[derive(Debug, Clone)]
pub struct Declarations {
    functions: FxHashMap<Symbol, FunctionDecl>,
    classes: FxHashMap<Symbol, ClassDecl>,
}

impl Declarations {
    /// Create declarations with the builtin classes registered.
    pub fn new() -> Self {
        let mut declarations = Declarations {
            functions: FxHashMap::default(),
            classes: FxHashMap::default(),
        };
        declarations.declare_class(Symbol::ANY, None);
        declarations.declare_class(Symbol::THROWABLE, Some(Symbol::ANY));
        for exception in [
            Symbol::ARITHMETIC_EXCEPTION,
            Symbol::CLASS_CAST_EXCEPTION,
            Symbol::INDEX_OUT_OF_BOUNDS_EXCEPTION,
        ] {
            declarations.declare_class(exception, Some(Symbol::THROWABLE));
        }
        for builtin in [Symbol::INT, Symbol::BOOLEAN, Symbol::STRING, Symbol::ARRAY] {
            declarations.declare_class(builtin, Some(Symbol::ANY));
        }
        declarations
    }

    pub fn declare_intrinsic(&mut self, symbol: Symbol, intrinsic: Intrinsic) {
        self.functions.insert(
            symbol,
            FunctionDecl {
                symbol,
                callee: Callee::Intrinsic(intrinsic),
                foldable: true,
            },
        );
    }

    pub fn declare_function(&mut self, symbol: Symbol, function: NodeId, foldable: bool) {
        self.functions.insert(
            symbol,
            FunctionDecl {
                symbol,
                callee: Callee::Function(function),
                foldable,
            },
        );
    }

    pub fn declare_class(&mut self, symbol: Symbol, superclass: Option<Symbol>) {
        self.classes.insert(symbol, ClassDecl { symbol, superclass });
    }

    pub fn function(&self, symbol: Symbol) -> Option<&FunctionDecl> {
        self.functions.get(&symbol)
    }

    pub fn intrinsic(&self, symbol: Symbol) -> Option<Intrinsic> {
        match self.function(symbol)?.callee {
            Callee::Intrinsic(intrinsic) => Some(intrinsic),
            Callee::Function(_) => None,
        }
    }

    pub fn is_annotated_foldable(&self, symbol: Symbol) -> bool {
        self.function(symbol).is_some_and(|f| f.foldable)
    }

    /// Whether `class` is `ancestor` or inherits from it.
    pub fn is_subclass(&self, class: Symbol, ancestor: Symbol) -> bool {
        let mut current = Some(class);
        // Bounded walk so a malformed cyclic hierarchy cannot hang the folder
        for _ in 0..=self.classes.len() {
            match current {
                Some(c) if c == ancestor => return true,
                Some(c) => current = self.classes.get(&c).and_then(|decl| decl.superclass),
                None => return false,
            }
        }
        false
    }

    /// Whether a value passes an `is` check against `class`. Null passes none.
    pub fn is_instance(&self, value: &State, class: Symbol) -> bool {
        let actual = match value {
            State::Unknown | State::Primitive(Primitive::Null) => return false,
            State::Primitive(Primitive::Int(_)) => Symbol::INT,
            State::Primitive(Primitive::Bool(_)) => Symbol::BOOLEAN,
            State::Primitive(Primitive::Str(_)) => Symbol::STRING,
            State::Array(_) => Symbol::ARRAY,
            State::Object(object) => object.class(),
            State::Primitive(Primitive::Unit) | State::Closure(_) => Symbol::ANY,
        };
        class == Symbol::ANY || self.is_subclass(actual, class)
    }
}

impl Default for Declarations {
    fn default() -> Self {
        Self::new()
    }
}

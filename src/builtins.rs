//! Builtin operations on primitives
//!
//! The allow-list of operations the folder may run without any annotation.
//! Integer arithmetic is 64-bit two's complement with wrapping overflow; integer
//! division or remainder by zero throws an `ArithmeticException` object. Vararg
//! arrays support `length` and `get`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ir::Symbol;
use crate::state::{Primitive, State};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intrinsic {
    Plus,
    Minus,
    Times,
    Div,
    Rem,
    UnaryMinus,
    Inc,
    Dec,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    CompareTo,
    Eq,
    NotEq,
    Not,
    And,
    Or,
    Xor,
    StringPlus,
    ToString,
    Length,
    Get,
}

impl Intrinsic {
    pub fn arity(self) -> usize {
        match self {
            Intrinsic::UnaryMinus
            | Intrinsic::Inc
            | Intrinsic::Dec
            | Intrinsic::Not
            | Intrinsic::ToString
            | Intrinsic::Length => 1,
            _ => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Plus => "plus",
            Intrinsic::Minus => "minus",
            Intrinsic::Times => "times",
            Intrinsic::Div => "div",
            Intrinsic::Rem => "rem",
            Intrinsic::UnaryMinus => "unaryMinus",
            Intrinsic::Inc => "inc",
            Intrinsic::Dec => "dec",
            Intrinsic::Less => "less",
            Intrinsic::LessOrEqual => "lessOrEqual",
            Intrinsic::Greater => "greater",
            Intrinsic::GreaterOrEqual => "greaterOrEqual",
            Intrinsic::CompareTo => "compareTo",
            Intrinsic::Eq => "equals",
            Intrinsic::NotEq => "notEquals",
            Intrinsic::Not => "not",
            Intrinsic::And => "and",
            Intrinsic::Or => "or",
            Intrinsic::Xor => "xor",
            Intrinsic::StringPlus => "stringPlus",
            Intrinsic::ToString => "toString",
            Intrinsic::Length => "length",
            Intrinsic::Get => "get",
        }
    }
}

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a builtin did not produce a value
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinFailure {
    /// The operation threw a host value (e.g. division by zero)
    Thrown(State),
    /// Operand shapes the operation has no semantics for
    Unsupported(String),
}

/// Semantics of intrinsic operations.
///
/// Injected into the folder so a compiler can supply its own numeric model.
pub trait BuiltinEvaluator {
    fn evaluate(&self, intrinsic: Intrinsic, args: &[State]) -> Result<State, BuiltinFailure>;
}

/// Default semantics over [`Primitive`] values
#[derive(Debug, Clone, Copy, Default)]
pub struct Intrinsics;

fn unsupported(intrinsic: Intrinsic, args: &[State]) -> BuiltinFailure {
    BuiltinFailure::Unsupported(format!("{} is not defined for {:?}", intrinsic, args))
}

fn division_by_zero() -> BuiltinFailure {
    BuiltinFailure::Thrown(State::exception(Symbol::ARITHMETIC_EXCEPTION, "/ by zero"))
}

fn index_out_of_bounds(index: i64, length: usize) -> BuiltinFailure {
    BuiltinFailure::Thrown(State::exception(
        Symbol::INDEX_OUT_OF_BOUNDS_EXCEPTION,
        format!("Index {} out of bounds for length {}", index, length),
    ))
}

impl Intrinsics {
    fn array(intrinsic: Intrinsic, elements: &[State], args: &[State]) -> Result<State, BuiltinFailure> {
        match (intrinsic, args) {
            (Intrinsic::Length, [_]) => Ok(State::int(elements.len() as i64)),
            (Intrinsic::Get, [_, State::Primitive(Primitive::Int(index))]) => usize::try_from(*index)
                .ok()
                .and_then(|i| elements.get(i))
                .cloned()
                .ok_or_else(|| index_out_of_bounds(*index, elements.len())),
            _ => Err(unsupported(intrinsic, args)),
        }
    }

    fn unary(intrinsic: Intrinsic, value: &Primitive) -> Option<Primitive> {
        Some(match (intrinsic, value) {
            (Intrinsic::UnaryMinus, Primitive::Int(n)) => Primitive::Int(n.wrapping_neg()),
            (Intrinsic::Inc, Primitive::Int(n)) => Primitive::Int(n.wrapping_add(1)),
            (Intrinsic::Dec, Primitive::Int(n)) => Primitive::Int(n.wrapping_sub(1)),
            (Intrinsic::Not, Primitive::Bool(b)) => Primitive::Bool(!b),
            (Intrinsic::ToString, p) => Primitive::Str(p.to_display_string().into()),
            (Intrinsic::Length, Primitive::Str(s)) => Primitive::Int(s.chars().count() as i64),
            _ => return None,
        })
    }

    fn binary(
        intrinsic: Intrinsic,
        left: &Primitive,
        right: &Primitive,
    ) -> Result<Option<Primitive>, BuiltinFailure> {
        use Primitive::{Bool, Int, Str};

        let result = match (intrinsic, left, right) {
            (Intrinsic::Plus, Int(a), Int(b)) => Int(a.wrapping_add(*b)),
            (Intrinsic::Minus, Int(a), Int(b)) => Int(a.wrapping_sub(*b)),
            (Intrinsic::Times, Int(a), Int(b)) => Int(a.wrapping_mul(*b)),
            (Intrinsic::Div | Intrinsic::Rem, Int(_), Int(0)) => return Err(division_by_zero()),
            (Intrinsic::Div, Int(a), Int(b)) => Int(a.wrapping_div(*b)),
            (Intrinsic::Rem, Int(a), Int(b)) => Int(a.wrapping_rem(*b)),
            (Intrinsic::Plus | Intrinsic::StringPlus, Str(a), b) => {
                Str(format!("{}{}", a, b.to_display_string()).into())
            }
            (Intrinsic::Less, Int(a), Int(b)) => Bool(a < b),
            (Intrinsic::LessOrEqual, Int(a), Int(b)) => Bool(a <= b),
            (Intrinsic::Greater, Int(a), Int(b)) => Bool(a > b),
            (Intrinsic::GreaterOrEqual, Int(a), Int(b)) => Bool(a >= b),
            (Intrinsic::Less, Str(a), Str(b)) => Bool(a < b),
            (Intrinsic::LessOrEqual, Str(a), Str(b)) => Bool(a <= b),
            (Intrinsic::Greater, Str(a), Str(b)) => Bool(a > b),
            (Intrinsic::GreaterOrEqual, Str(a), Str(b)) => Bool(a >= b),
            (Intrinsic::CompareTo, Int(a), Int(b)) => Int(a.cmp(b) as i64),
            (Intrinsic::CompareTo, Str(a), Str(b)) => Int(a.cmp(b) as i64),
            (Intrinsic::And, Bool(a), Bool(b)) => Bool(*a && *b),
            (Intrinsic::Or, Bool(a), Bool(b)) => Bool(*a || *b),
            (Intrinsic::Xor, Bool(a), Bool(b)) => Bool(a ^ b),
            _ => return Ok(None),
        };
        Ok(Some(result))
    }
}

impl BuiltinEvaluator for Intrinsics {
    fn evaluate(&self, intrinsic: Intrinsic, args: &[State]) -> Result<State, BuiltinFailure> {
        if args.len() != intrinsic.arity() {
            return Err(BuiltinFailure::Unsupported(format!(
                "{} expects {} arguments, got {}",
                intrinsic,
                intrinsic.arity(),
                args.len()
            )));
        }

        // Equality is defined for every state: structural on primitives, identity otherwise
        match (intrinsic, args) {
            (Intrinsic::Eq, [a, b]) if !a.is_unknown() && !b.is_unknown() => {
                return Ok(State::bool(a == b));
            }
            (Intrinsic::NotEq, [a, b]) if !a.is_unknown() && !b.is_unknown() => {
                return Ok(State::bool(a != b));
            }
            _ => {}
        }

        if let Some(State::Array(elements)) = args.first() {
            return Self::array(intrinsic, elements, args);
        }

        let result = match args {
            [State::Primitive(value)] => Self::unary(intrinsic, value),
            [State::Primitive(left), State::Primitive(right)] => {
                Self::binary(intrinsic, left, right)?
            }
            _ => None,
        };
        result
            .map(State::Primitive)
            .ok_or_else(|| unsupported(intrinsic, args))
    }
}

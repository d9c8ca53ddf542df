//! Interpreted values
//!
//! A [`State`] is what evaluation produces: a primitive, an object with
//! mutable fields, a vararg array, a closure, or the `Unknown` sentinel for a
//! declared but unbound variable. Objects, arrays and closures are shared by
//! reference, so cloning a state is always cheap.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ir::{Constant, NodeId, Symbol};

/// Trait for types whose clone is O(1) (a reference count bump).
///
/// Calling `cheap_clone()` instead of `clone()` documents at the call site that
/// no deep copy happens.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

thread_local! {
    /// Creation counter for cells and objects
    static NEXT_EPOCH: Cell<u64> = const { Cell::new(0) };
}

/// Creation stamp of a variable cell or object.
///
/// Everything created after [`Epoch::now`] was called carries an epoch that is
/// greater than or equal to the returned value, which lets a history scope tell
/// pre-existing locations apart from ones it created itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Epoch(u64);

impl Epoch {
    pub fn now() -> Epoch {
        Epoch(NEXT_EPOCH.with(|c| c.get()))
    }

    fn fresh() -> Epoch {
        NEXT_EPOCH.with(|c| {
            let epoch = c.get();
            c.set(epoch.wrapping_add(1));
            Epoch(epoch)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Null,
    Unit,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
}

impl Primitive {
    /// String conversion used by concatenation and `toString`
    pub fn to_display_string(&self) -> String {
        match self {
            Primitive::Null => "null".to_string(),
            Primitive::Unit => "Unit".to_string(),
            Primitive::Bool(b) => b.to_string(),
            Primitive::Int(n) => n.to_string(),
            Primitive::Str(s) => s.to_string(),
        }
    }
}

/// Object with identity and mutable fields
pub struct ObjectState {
    class: Symbol,
    fields: RefCell<FxHashMap<Symbol, State>>,
    epoch: Epoch,
}

pub type ObjectRef = Rc<ObjectState>;

impl ObjectState {
    pub fn new(class: Symbol) -> ObjectRef {
        Rc::new(ObjectState {
            class,
            fields: RefCell::new(FxHashMap::default()),
            epoch: Epoch::fresh(),
        })
    }

    pub fn class(&self) -> Symbol {
        self.class
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn field(&self, field: Symbol) -> Option<State> {
        self.fields.borrow().get(&field).cloned()
    }

    /// Store a field value, returning the previous one.
    pub fn set_field(&self, field: Symbol, value: State) -> Option<State> {
        self.fields.borrow_mut().insert(field, value)
    }

    pub fn remove_field(&self, field: Symbol) -> Option<State> {
        self.fields.borrow_mut().remove(&field)
    }

    pub fn field_count(&self) -> usize {
        self.fields.borrow().len()
    }

    pub fn field_values(&self) -> Vec<State> {
        self.fields.borrow().values().cloned().collect()
    }
}

/// Identity of an object, usable as a map key while the object is alive.
pub fn object_identity(object: &ObjectRef) -> usize {
    Rc::as_ptr(object) as usize
}

/// A lambda together with the variables it captured
pub struct ClosureState {
    function: NodeId,
    up_values: RefCell<Vec<Variable>>,
}

pub type ClosureRef = Rc<ClosureState>;

/// Elements of a vararg array; arrays are never written after creation
pub type ArrayRef = Rc<[State]>;

impl ClosureState {
    pub fn new(function: NodeId) -> ClosureRef {
        Rc::new(ClosureState {
            function,
            up_values: RefCell::new(Vec::new()),
        })
    }

    pub fn function(&self) -> NodeId {
        self.function
    }

    pub fn up_values(&self) -> Vec<Variable> {
        self.up_values.borrow().clone()
    }

    /// Capture a variable, replacing an earlier capture of the same symbol.
    pub fn capture(&self, variable: Variable) {
        let mut up_values = self.up_values.borrow_mut();
        match up_values.iter_mut().find(|v| v.symbol == variable.symbol) {
            Some(existing) => *existing = variable,
            None => up_values.push(variable),
        }
    }
}

/// The interpreted value of an expression
#[derive(Clone, Default)]
pub enum State {
    /// Declared but unbound; never a foldable value
    #[default]
    Unknown,
    Primitive(Primitive),
    Object(ObjectRef),
    Array(ArrayRef),
    Closure(ClosureRef),
}

impl CheapClone for State {}

impl State {
    pub fn int(n: i64) -> State {
        State::Primitive(Primitive::Int(n))
    }

    pub fn bool(b: bool) -> State {
        State::Primitive(Primitive::Bool(b))
    }

    pub fn string(s: impl Into<Rc<str>>) -> State {
        State::Primitive(Primitive::Str(s.into()))
    }

    pub fn unit() -> State {
        State::Primitive(Primitive::Unit)
    }

    pub fn null() -> State {
        State::Primitive(Primitive::Null)
    }

    pub fn array(elements: Vec<State>) -> State {
        State::Array(elements.into())
    }

    /// Build a thrown exception object with a message field.
    pub fn exception(class: Symbol, message: impl Into<Rc<str>>) -> State {
        let object = ObjectState::new(class);
        object.set_field(Symbol::MESSAGE, State::string(message));
        State::Object(object)
    }

    pub fn from_constant(constant: &Constant) -> State {
        State::Primitive(match constant {
            Constant::Null => Primitive::Null,
            Constant::Unit => Primitive::Unit,
            Constant::Bool(b) => Primitive::Bool(*b),
            Constant::Int(n) => Primitive::Int(*n),
            Constant::Str(s) => Primitive::Str(s.cheap_clone()),
        })
    }

    /// Literal form of this state, if it has one
    pub fn to_constant(&self) -> Option<Constant> {
        match self {
            State::Primitive(p) => Some(match p {
                Primitive::Null => Constant::Null,
                Primitive::Unit => Constant::Unit,
                Primitive::Bool(b) => Constant::Bool(*b),
                Primitive::Int(n) => Constant::Int(*n),
                Primitive::Str(s) => Constant::Str(s.cheap_clone()),
            }),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, State::Unknown)
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, State::Primitive(Primitive::Unit))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            State::Primitive(Primitive::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            State::Primitive(Primitive::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            State::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[State]> {
        match self {
            State::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<&ClosureRef> {
        match self {
            State::Closure(closure) => Some(closure),
            _ => None,
        }
    }

    /// Class of an object state
    pub fn class(&self) -> Option<Symbol> {
        self.as_object().map(|o| o.class())
    }

    /// Whether an object is reachable through this state
    pub fn may_reference_objects(&self) -> bool {
        match self {
            State::Object(_) => true,
            State::Array(elements) => elements.iter().any(State::may_reference_objects),
            _ => false,
        }
    }
}

impl PartialEq for State {
    fn eq(&self, other: &State) -> bool {
        match (self, other) {
            (State::Unknown, State::Unknown) => true,
            (State::Primitive(a), State::Primitive(b)) => a == b,
            (State::Object(a), State::Object(b)) => Rc::ptr_eq(a, b),
            (State::Array(a), State::Array(b)) => Rc::ptr_eq(a, b),
            (State::Closure(a), State::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Unknown => write!(f, "<unknown>"),
            State::Primitive(Primitive::Str(s)) => write!(f, "\"{}\"", s),
            State::Primitive(p) => write!(f, "{}", p.to_display_string()),
            // Fields can point back at the object, so only the class is shown
            State::Object(o) => write!(f, "<object {} with {} fields>", o.class, o.field_count()),
            State::Array(elements) => write!(f, "<array of {}>", elements.len()),
            State::Closure(c) => write!(f, "<closure {}>", c.function),
        }
    }
}

#[derive(Debug)]
struct CellData {
    state: RefCell<State>,
    epoch: Epoch,
}

/// Shared storage of one variable; closures capture the cell, not the value.
#[derive(Debug, Clone)]
pub struct VariableCell(Rc<CellData>);

impl CheapClone for VariableCell {}

impl VariableCell {
    pub fn new(state: State) -> Self {
        VariableCell(Rc::new(CellData {
            state: RefCell::new(state),
            epoch: Epoch::fresh(),
        }))
    }

    pub fn get(&self) -> State {
        self.0.state.borrow().cheap_clone()
    }

    /// Overwrite the stored state, returning the previous one.
    pub fn set(&self, state: State) -> State {
        std::mem::replace(&mut *self.0.state.borrow_mut(), state)
    }

    pub fn epoch(&self) -> Epoch {
        self.0.epoch
    }

    /// Identity of the cell, usable as a map key while the cell is alive.
    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &VariableCell) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A (symbol, cell) pair living in a sub-frame's memory
#[derive(Debug, Clone)]
pub struct Variable {
    pub symbol: Symbol,
    cell: VariableCell,
}

impl Variable {
    pub fn new(symbol: Symbol, state: State) -> Self {
        Variable {
            symbol,
            cell: VariableCell::new(state),
        }
    }

    /// A variable backed by an existing cell (up-value capture).
    pub fn shared(symbol: Symbol, cell: VariableCell) -> Self {
        Variable { symbol, cell }
    }

    pub fn state(&self) -> State {
        self.cell.get()
    }

    pub fn set(&self, state: State) -> State {
        self.cell.set(state)
    }

    pub fn cell(&self) -> &VariableCell {
        &self.cell
    }
}

//! Expression-tree arena consumed by the folder
//!
//! Nodes are stored in a flat arena and addressed by [`NodeId`]. The tree is
//! assumed to be type-checked already; the folder never validates types, it
//! only walks nodes, reads symbols and rewrites children in place.

pub mod builder;
pub mod symbol;

pub use builder::IrBuilder;
pub use symbol::{Symbol, SymbolTable};

use std::fmt;
use std::rc::Rc;

/// Handle of a node in an [`Ir`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Literal values that can appear in the tree
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Unit,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
}

/// A call to a declared function or intrinsic.
///
/// Receivers and arguments are evaluated in the order
/// dispatch receiver, extension receiver, arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: Symbol,
    pub dispatch_receiver: Option<NodeId>,
    pub extension_receiver: Option<NodeId>,
    pub args: Vec<NodeId>,
}

impl Call {
    /// Receivers and arguments in evaluation order.
    pub fn operands(&self) -> Vec<NodeId> {
        self.dispatch_receiver
            .iter()
            .chain(self.extension_receiver.iter())
            .chain(self.args.iter())
            .copied()
            .collect()
    }

    pub fn expected_argument_count(&self) -> usize {
        usize::from(self.dispatch_receiver.is_some())
            + usize::from(self.extension_receiver.is_some())
            + self.args.len()
    }
}

/// One arm of a `when`. An `else` arm has a constant `true` condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Branch {
    pub condition: NodeId,
    pub result: NodeId,
}

/// A function, constructor or lambda body.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub symbol: Symbol,
    /// Dispatch receiver parameter (`this`)
    pub receiver: Option<Symbol>,
    pub params: Vec<Symbol>,
    /// Default values of parameters a call may omit. A default runs in the
    /// callee's frame and can read the parameters before it.
    pub defaults: Vec<(Symbol, NodeId)>,
    pub body: NodeId,
    /// Set when this function is a constructor of the given class
    pub constructed_class: Option<Symbol>,
}

impl Function {
    pub fn is_constructor(&self) -> bool {
        self.constructed_class.is_some()
    }

    pub fn default_of(&self, param: Symbol) -> Option<NodeId> {
        self.defaults
            .iter()
            .find(|(symbol, _)| *symbol == param)
            .map(|(_, value)| *value)
    }
}

/// Runtime type test or cast against a class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOperator {
    /// `x is T`
    Is,
    /// `x !is T`
    NotIs,
    /// `x as T`, throwing `ClassCastException` on a mismatch
    Cast,
    /// `x as? T`, null on a mismatch
    SafeCast,
}

impl TypeOperator {
    pub fn name(self) -> &'static str {
        match self {
            TypeOperator::Is => "is",
            TypeOperator::NotIs => "!is",
            TypeOperator::Cast => "as",
            TypeOperator::SafeCast => "as?",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Try {
    pub body: NodeId,
    /// `Catch` nodes, in declared order
    pub catches: Vec<NodeId>,
    pub finally: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catch {
    pub parameter: Symbol,
    /// Class caught by this clause; `None` catches everything
    pub catch_type: Option<Symbol>,
    pub result: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Const(Constant),
    GetValue(Symbol),
    SetValue { symbol: Symbol, value: NodeId },
    /// Local variable declaration. Evaluates to unit.
    Variable { symbol: Symbol, initializer: Option<NodeId> },
    GetField { receiver: Symbol, field: Symbol },
    SetField { receiver: Symbol, field: Symbol, value: NodeId },
    Call(Call),
    ConstructorCall(Call),
    /// Statements evaluated in order; the block's value is the last one.
    /// A block can be the target of a `Return`.
    Block(Vec<NodeId>),
    When(Vec<Branch>),
    While { condition: NodeId, body: NodeId },
    DoWhile { condition: NodeId, body: NodeId },
    Try(Try),
    Catch(Catch),
    Throw(NodeId),
    /// Non-local return; `target` is a `Function` or `Block` node.
    Return { target: NodeId, value: NodeId },
    Break { target: NodeId },
    Continue { target: NodeId },
    Function(Function),
    /// Closure creation over a `Function` node
    Lambda(NodeId),
    Invoke { callee: NodeId, args: Vec<NodeId> },
    StringConcat(Vec<NodeId>),
    TypeOperator {
        operator: TypeOperator,
        operand: NodeId,
        class: Symbol,
    },
    /// Array built from its elements, as passed to a vararg parameter
    Vararg(Vec<NodeId>),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Const(_) => "const",
            NodeKind::GetValue(_) => "get",
            NodeKind::SetValue { .. } => "set",
            NodeKind::Variable { .. } => "var",
            NodeKind::GetField { .. } => "get_field",
            NodeKind::SetField { .. } => "set_field",
            NodeKind::Call(_) => "call",
            NodeKind::ConstructorCall(_) => "new",
            NodeKind::Block(_) => "block",
            NodeKind::When(_) => "when",
            NodeKind::While { .. } => "while",
            NodeKind::DoWhile { .. } => "do_while",
            NodeKind::Try(_) => "try",
            NodeKind::Catch(_) => "catch",
            NodeKind::Throw(_) => "throw",
            NodeKind::Return { .. } => "return",
            NodeKind::Break { .. } => "break",
            NodeKind::Continue { .. } => "continue",
            NodeKind::Function(_) => "fun",
            NodeKind::Lambda(_) => "lambda",
            NodeKind::Invoke { .. } => "invoke",
            NodeKind::StringConcat(_) => "concat",
            NodeKind::TypeOperator { operator, .. } => operator.name(),
            NodeKind::Vararg(_) => "vararg",
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, NodeKind::While { .. } | NodeKind::DoWhile { .. })
    }

    /// Jumps never complete normally, so anything after them in a block is dead.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            NodeKind::Break { .. }
                | NodeKind::Continue { .. }
                | NodeKind::Return { .. }
                | NodeKind::Throw(_)
        )
    }

    /// Direct children in evaluation order. Lambdas report their function node.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Const(_)
            | NodeKind::GetValue(_)
            | NodeKind::GetField { .. }
            | NodeKind::Break { .. }
            | NodeKind::Continue { .. } => Vec::new(),
            NodeKind::SetValue { value, .. } | NodeKind::SetField { value, .. } => vec![*value],
            NodeKind::Variable { initializer, .. } => initializer.iter().copied().collect(),
            NodeKind::Call(call) | NodeKind::ConstructorCall(call) => call.operands(),
            NodeKind::Block(nodes) | NodeKind::StringConcat(nodes) | NodeKind::Vararg(nodes) => {
                nodes.clone()
            }
            NodeKind::When(branches) => branches
                .iter()
                .flat_map(|b| [b.condition, b.result])
                .collect(),
            NodeKind::While { condition, body } => vec![*condition, *body],
            NodeKind::DoWhile { condition, body } => vec![*body, *condition],
            NodeKind::Try(t) => std::iter::once(t.body)
                .chain(t.catches.iter().copied())
                .chain(t.finally)
                .collect(),
            NodeKind::Catch(c) => vec![c.result],
            NodeKind::Throw(value)
            | NodeKind::Return { value, .. }
            | NodeKind::TypeOperator { operand: value, .. } => vec![*value],
            NodeKind::Function(f) => f
                .defaults
                .iter()
                .map(|(_, value)| *value)
                .chain(std::iter::once(f.body))
                .collect(),
            NodeKind::Lambda(function) => vec![*function],
            NodeKind::Invoke { callee, args } => {
                std::iter::once(*callee).chain(args.iter().copied()).collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Source line, when the producer knows it
    pub line: Option<u32>,
}

/// Arena of expression nodes plus the symbol names they refer to.
#[derive(Debug, Clone, Default)]
pub struct Ir {
    nodes: Vec<Node>,
    symbols: SymbolTable,
}

impl Ir {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NodeKind) -> NodeId {
        self.push_at(kind, None)
    }

    pub fn push_at(&mut self, kind: NodeKind, line: Option<u32>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, line });
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    pub fn kind_mut(&mut self, id: NodeId) -> Option<&mut NodeKind> {
        self.nodes.get_mut(id.index()).map(|n| &mut n.kind)
    }

    /// Overwrite a node's kind, keeping its id (and therefore every reference to it).
    pub fn replace(&mut self, id: NodeId, kind: NodeKind) {
        if let Some(node) = self.nodes.get_mut(id.index()) {
            node.kind = kind;
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn function(&self, id: NodeId) -> Option<&Function> {
        match self.kind(id)? {
            NodeKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Function, callee or node-kind name of a node
    pub fn display_name(&self, id: NodeId) -> String {
        match self.kind(id) {
            Some(NodeKind::Function(f)) => self.symbols.name(f.symbol).to_string(),
            Some(NodeKind::Call(call) | NodeKind::ConstructorCall(call)) => {
                self.symbols.name(call.callee).to_string()
            }
            Some(kind) => kind.name().to_string(),
            None => format!("<dangling {}>", id),
        }
    }

    /// Short human-readable description used in stack traces.
    pub fn describe(&self, id: NodeId) -> String {
        let name = self.display_name(id);
        match self.node(id).and_then(|n| n.line) {
            Some(line) => format!("{}(line {})", name, line),
            None => format!("{}({})", name, id),
        }
    }
}

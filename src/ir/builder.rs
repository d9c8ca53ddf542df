//! Convenience builder for expression trees
//!
//! Loops, functions and lambdas are referenced by the jumps inside them, so
//! their builders receive the id of the node being built before its children
//! exist.

use rustc_hash::FxHashMap;

use super::{
    Branch, Call, Catch, Constant, Function, Ir, NodeId, NodeKind, Symbol, Try, TypeOperator,
};
use crate::builtins::Intrinsic;
use crate::declarations::Declarations;

pub struct IrBuilder {
    ir: Ir,
    declarations: Declarations,
    intrinsics: FxHashMap<Intrinsic, Symbol>,
    line: Option<u32>,
}

impl IrBuilder {
    pub fn new() -> Self {
        IrBuilder {
            ir: Ir::new(),
            declarations: Declarations::new(),
            intrinsics: FxHashMap::default(),
            line: None,
        }
    }

    pub fn ir(&self) -> &Ir {
        &self.ir
    }

    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    pub fn declarations_mut(&mut self) -> &mut Declarations {
        &mut self.declarations
    }

    pub fn finish(self) -> (Ir, Declarations) {
        (self.ir, self.declarations)
    }

    /// Attach a source line to every node created from now on.
    pub fn at_line(&mut self, line: u32) -> &mut Self {
        self.line = Some(line);
        self
    }

    pub fn symbol(&mut self, name: &str) -> Symbol {
        self.ir.symbols_mut().fresh(name)
    }

    /// Declare a class for `catch` matching.
    pub fn class(&mut self, name: &str, superclass: Option<Symbol>) -> Symbol {
        let symbol = self.symbol(name);
        self.declarations.declare_class(symbol, superclass);
        symbol
    }

    pub fn push(&mut self, kind: NodeKind) -> NodeId {
        self.ir.push_at(kind, self.line)
    }

    fn placeholder(&mut self) -> NodeId {
        self.push(NodeKind::Const(Constant::Unit))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Literals and variables
    // ═══════════════════════════════════════════════════════════════════════

    pub fn constant(&mut self, constant: Constant) -> NodeId {
        self.push(NodeKind::Const(constant))
    }

    pub fn int(&mut self, n: i64) -> NodeId {
        self.constant(Constant::Int(n))
    }

    pub fn bool(&mut self, b: bool) -> NodeId {
        self.constant(Constant::Bool(b))
    }

    pub fn string(&mut self, s: &str) -> NodeId {
        self.constant(Constant::Str(s.into()))
    }

    pub fn unit(&mut self) -> NodeId {
        self.constant(Constant::Unit)
    }

    pub fn null(&mut self) -> NodeId {
        self.constant(Constant::Null)
    }

    pub fn get(&mut self, symbol: Symbol) -> NodeId {
        self.push(NodeKind::GetValue(symbol))
    }

    pub fn set(&mut self, symbol: Symbol, value: NodeId) -> NodeId {
        self.push(NodeKind::SetValue { symbol, value })
    }

    pub fn var(&mut self, symbol: Symbol, initializer: NodeId) -> NodeId {
        self.push(NodeKind::Variable {
            symbol,
            initializer: Some(initializer),
        })
    }

    /// Declaration without an initializer
    pub fn declare(&mut self, symbol: Symbol) -> NodeId {
        self.push(NodeKind::Variable {
            symbol,
            initializer: None,
        })
    }

    pub fn get_field(&mut self, receiver: Symbol, field: Symbol) -> NodeId {
        self.push(NodeKind::GetField { receiver, field })
    }

    pub fn set_field(&mut self, receiver: Symbol, field: Symbol, value: NodeId) -> NodeId {
        self.push(NodeKind::SetField {
            receiver,
            field,
            value,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════

    /// Symbol bound to an intrinsic, declared on first use.
    pub fn intrinsic_symbol(&mut self, intrinsic: Intrinsic) -> Symbol {
        if let Some(symbol) = self.intrinsics.get(&intrinsic) {
            return *symbol;
        }
        let symbol = self.symbol(intrinsic.name());
        self.declarations.declare_intrinsic(symbol, intrinsic);
        self.intrinsics.insert(intrinsic, symbol);
        symbol
    }

    pub fn op(&mut self, intrinsic: Intrinsic, args: Vec<NodeId>) -> NodeId {
        let callee = self.intrinsic_symbol(intrinsic);
        self.call(callee, args)
    }

    pub fn call(&mut self, callee: Symbol, args: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Call(Call {
            callee,
            dispatch_receiver: None,
            extension_receiver: None,
            args,
        }))
    }

    pub fn call_method(&mut self, callee: Symbol, receiver: NodeId, args: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Call(Call {
            callee,
            dispatch_receiver: Some(receiver),
            extension_receiver: None,
            args,
        }))
    }

    pub fn new_object(&mut self, constructor: Symbol, args: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::ConstructorCall(Call {
            callee: constructor,
            dispatch_receiver: None,
            extension_receiver: None,
            args,
        }))
    }

    pub fn invoke(&mut self, callee: NodeId, args: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Invoke { callee, args })
    }

    pub fn concat(&mut self, parts: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::StringConcat(parts))
    }

    pub fn vararg(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Vararg(elements))
    }

    pub fn type_op(&mut self, operator: TypeOperator, operand: NodeId, class: Symbol) -> NodeId {
        self.push(NodeKind::TypeOperator {
            operator,
            operand,
            class,
        })
    }

    /// `operand is class`
    pub fn is_instance(&mut self, operand: NodeId, class: Symbol) -> NodeId {
        self.type_op(TypeOperator::Is, operand, class)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Control flow
    // ═══════════════════════════════════════════════════════════════════════

    pub fn block(&mut self, statements: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Block(statements))
    }

    /// Block that may be the target of a `Return`
    pub fn returnable_block(&mut self, build: impl FnOnce(&mut Self, NodeId) -> Vec<NodeId>) -> NodeId {
        let id = self.placeholder();
        let statements = build(self, id);
        self.ir.replace(id, NodeKind::Block(statements));
        id
    }

    pub fn when(&mut self, branches: Vec<(NodeId, NodeId)>) -> NodeId {
        let branches = branches
            .into_iter()
            .map(|(condition, result)| Branch { condition, result })
            .collect();
        self.push(NodeKind::When(branches))
    }

    pub fn if_else(&mut self, condition: NodeId, then: NodeId, otherwise: NodeId) -> NodeId {
        let always = self.bool(true);
        self.when(vec![(condition, then), (always, otherwise)])
    }

    /// `while (cond) body`; `build` returns `(condition, body)`.
    pub fn while_loop(&mut self, build: impl FnOnce(&mut Self, NodeId) -> (NodeId, NodeId)) -> NodeId {
        let id = self.placeholder();
        let (condition, body) = build(self, id);
        self.ir.replace(id, NodeKind::While { condition, body });
        id
    }

    /// `do body while (cond)`; `build` returns `(condition, body)`.
    pub fn do_while(&mut self, build: impl FnOnce(&mut Self, NodeId) -> (NodeId, NodeId)) -> NodeId {
        let id = self.placeholder();
        let (condition, body) = build(self, id);
        self.ir.replace(id, NodeKind::DoWhile { condition, body });
        id
    }

    pub fn try_catch(&mut self, body: NodeId, catches: Vec<NodeId>, finally: Option<NodeId>) -> NodeId {
        self.push(NodeKind::Try(Try {
            body,
            catches,
            finally,
        }))
    }

    pub fn catch(&mut self, parameter: Symbol, catch_type: Option<Symbol>, result: NodeId) -> NodeId {
        self.push(NodeKind::Catch(Catch {
            parameter,
            catch_type,
            result,
        }))
    }

    pub fn throw(&mut self, value: NodeId) -> NodeId {
        self.push(NodeKind::Throw(value))
    }

    pub fn ret(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.push(NodeKind::Return { target, value })
    }

    pub fn brk(&mut self, target: NodeId) -> NodeId {
        self.push(NodeKind::Break { target })
    }

    pub fn cont(&mut self, target: NodeId) -> NodeId {
        self.push(NodeKind::Continue { target })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Functions
    // ═══════════════════════════════════════════════════════════════════════

    fn function_node(
        &mut self,
        symbol: Symbol,
        receiver: Option<Symbol>,
        params: Vec<Symbol>,
        constructed_class: Option<Symbol>,
        build: impl FnOnce(&mut Self, NodeId) -> NodeId,
    ) -> NodeId {
        let id = self.placeholder();
        let body = build(self, id);
        self.ir.replace(
            id,
            NodeKind::Function(Function {
                symbol,
                receiver,
                params,
                defaults: Vec::new(),
                body,
                constructed_class,
            }),
        );
        id
    }

    /// Declare a top-level function; `build` gets the function node id for `Return`s.
    pub fn function(
        &mut self,
        symbol: Symbol,
        params: Vec<Symbol>,
        foldable: bool,
        build: impl FnOnce(&mut Self, NodeId) -> NodeId,
    ) -> NodeId {
        let id = self.function_node(symbol, None, params, None, build);
        self.declarations.declare_function(symbol, id, foldable);
        id
    }

    /// Declare a member function whose dispatch receiver is bound to `receiver`.
    pub fn method(
        &mut self,
        symbol: Symbol,
        receiver: Symbol,
        params: Vec<Symbol>,
        foldable: bool,
        build: impl FnOnce(&mut Self, NodeId) -> NodeId,
    ) -> NodeId {
        let id = self.function_node(symbol, Some(receiver), params, None, build);
        self.declarations.declare_function(symbol, id, foldable);
        id
    }

    /// Declare a constructor of `class`; the new object is bound to `receiver`.
    pub fn constructor(
        &mut self,
        symbol: Symbol,
        class: Symbol,
        receiver: Symbol,
        params: Vec<Symbol>,
        foldable: bool,
        build: impl FnOnce(&mut Self, NodeId) -> NodeId,
    ) -> NodeId {
        let id = self.function_node(symbol, Some(receiver), params, Some(class), build);
        self.declarations.declare_function(symbol, id, foldable);
        id
    }

    /// Give `param` of `function` a default value for calls that omit it.
    pub fn default_argument(&mut self, function: NodeId, param: Symbol, value: NodeId) {
        if let Some(NodeKind::Function(f)) = self.ir.kind_mut(function) {
            f.defaults.push((param, value));
        }
    }

    /// Closure creation over an anonymous function.
    pub fn lambda(&mut self, params: Vec<Symbol>, build: impl FnOnce(&mut Self, NodeId) -> NodeId) -> NodeId {
        let symbol = self.symbol("<anonymous>");
        let function = self.function_node(symbol, None, params, None, build);
        self.push(NodeKind::Lambda(function))
    }
}

impl Default for IrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Vararg arrays and default parameter values

use super::{constant, increment, is_const, less, program};
use irfold::{Constant, Intrinsic, IrBuilder, NodeId, NodeKind, State, Symbol};
use pretty_assertions::assert_eq;

/// `fun sum(xs) { var s = 0; var i = 0; while (i < xs.length) { s = s + xs[i]; i++ }; s }`
fn sum_function(b: &mut IrBuilder) -> Symbol {
    let sum = b.symbol("sum");
    let xs = b.symbol("xs");
    b.function(sum, vec![xs], true, |b, _| {
        let s = b.symbol("s");
        let i = b.symbol("i");
        let zero = b.int(0);
        let declare_s = b.var(s, zero);
        let zero = b.int(0);
        let declare_i = b.var(i, zero);
        let lp = b.while_loop(|b, _| {
            let get_i = b.get(i);
            let get_xs = b.get(xs);
            let length = b.op(Intrinsic::Length, vec![get_xs]);
            let condition = less(b, get_i, length);
            let get_s = b.get(s);
            let get_xs = b.get(xs);
            let get_i = b.get(i);
            let element = b.op(Intrinsic::Get, vec![get_xs, get_i]);
            let total = b.op(Intrinsic::Plus, vec![get_s, element]);
            let add = b.set(s, total);
            let step = increment(b, i, 1);
            (condition, b.block(vec![add, step]))
        });
        let result = b.get(s);
        b.block(vec![declare_s, declare_i, lp, result])
    });
    sum
}

#[test]
fn test_vararg_elements_reach_callee() {
    let mut p = program(|b| {
        let sum = sum_function(b);
        let one = b.int(1);
        let two = b.int(2);
        let three = b.int(3);
        let args = b.vararg(vec![one, two, three]);
        b.call(sum, vec![args])
    });
    assert_eq!(p.fold(), Some(State::int(6)));
}

#[test]
fn test_vararg_value_is_an_array() {
    let mut p = program(|b| {
        let one = b.int(1);
        let two = b.int(2);
        let sum = b.op(Intrinsic::Plus, vec![one, two]);
        let text = b.string("x");
        b.vararg(vec![sum, text])
    });
    let folded = p.fold();
    let elements = folded.as_ref().and_then(State::as_array).map(<[State]>::to_vec);
    assert_eq!(elements, Some(vec![State::int(3), State::string("x")]));
    assert!(matches!(p.root_kind(), Some(NodeKind::Vararg(_))));
}

#[test]
fn test_unknown_element_keeps_vararg() {
    let mut vararg = NodeId(u32::MAX);
    let mut p = program(|b| {
        let sum = sum_function(b);
        let hidden = b.symbol("hidden");
        let declare = b.declare(hidden);
        let one = b.int(1);
        let two = b.int(2);
        let known = b.op(Intrinsic::Plus, vec![one, two]);
        let unknown = b.get(hidden);
        vararg = b.vararg(vec![known, unknown]);
        let call = b.call(sum, vec![vararg]);
        b.block(vec![declare, call])
    });
    assert_eq!(p.fold(), None);
    let elements = match p.kind(vararg) {
        Some(NodeKind::Vararg(elements)) => elements.clone(),
        _ => Vec::new(),
    };
    assert_eq!(elements.len(), 2);
    assert_eq!(
        elements.first().and_then(|id| constant(p.kind(*id))),
        Some(Constant::Int(3))
    );
    assert!(!is_const(elements.get(1).and_then(|id| p.kind(*id))));
}

#[test]
fn test_index_out_of_bounds_is_catchable() {
    let mut p = program(|b| {
        let one = b.int(1);
        let array = b.vararg(vec![one]);
        let index = b.int(5);
        let read = b.op(Intrinsic::Get, vec![array, index]);
        let e = b.symbol("e");
        let fallback = b.int(-1);
        let clause = b.catch(e, Some(Symbol::INDEX_OUT_OF_BOUNDS_EXCEPTION), fallback);
        b.try_catch(read, vec![clause], None)
    });
    assert_eq!(p.fold(), Some(State::int(-1)));
}

/// `fun twice(a, b = a * 2) = b`
fn twice(b: &mut IrBuilder) -> Symbol {
    let name = b.symbol("twice");
    let a = b.symbol("a");
    let second = b.symbol("b");
    let function = b.function(name, vec![a, second], true, |b, _| b.get(second));
    let get_a = b.get(a);
    let two = b.int(2);
    let doubled = b.op(Intrinsic::Times, vec![get_a, two]);
    b.default_argument(function, second, doubled);
    name
}

#[test]
fn test_default_reads_earlier_parameter() {
    let mut p = program(|b| {
        let name = twice(b);
        let ten = b.int(10);
        b.call(name, vec![ten])
    });
    assert_eq!(p.fold(), Some(State::int(20)));
    assert_eq!(constant(p.root_kind()), Some(Constant::Int(20)));
}

#[test]
fn test_explicit_argument_overrides_default() {
    let mut p = program(|b| {
        let name = twice(b);
        let ten = b.int(10);
        let three = b.int(3);
        b.call(name, vec![ten, three])
    });
    assert_eq!(p.fold(), Some(State::int(3)));
}

#[test]
fn test_default_may_call_function_with_defaults() {
    let mut p = program(|b| {
        let inner = b.symbol("inner");
        let z = b.symbol("z");
        let w = b.symbol("w");
        let inner_node = b.function(inner, vec![z, w], true, |b, _| b.get(w));
        let get_z = b.get(z);
        let one = b.int(1);
        let next = b.op(Intrinsic::Plus, vec![get_z, one]);
        b.default_argument(inner_node, w, next);

        let outer = b.symbol("outer");
        let x = b.symbol("x");
        let y = b.symbol("y");
        let outer_node = b.function(outer, vec![x, y], true, |b, _| b.get(y));
        let get_x = b.get(x);
        let nested = b.call(inner, vec![get_x]);
        b.default_argument(outer_node, y, nested);

        let four = b.int(4);
        b.call(outer, vec![four])
    });
    assert_eq!(p.fold(), Some(State::int(5)));
}

#[test]
fn test_missing_argument_without_default_is_not_foldable() {
    let mut p = program(|b| {
        let name = b.symbol("pair");
        let a = b.symbol("a");
        let second = b.symbol("b");
        b.function(name, vec![a, second], true, |b, _| b.get(a));
        let one = b.int(1);
        b.call(name, vec![one])
    });
    assert_eq!(p.fold(), None);
    assert!(matches!(p.root_kind(), Some(NodeKind::Call(_))));
}

#[test]
fn test_defaults_are_rewritten_with_the_body() {
    let mut p = program(|b| {
        let name = b.symbol("f");
        let a = b.symbol("a");
        let function = b.function(name, vec![a], true, |b, _| b.get(a));
        let two = b.int(2);
        let three = b.int(3);
        let product = b.op(Intrinsic::Times, vec![two, three]);
        b.default_argument(function, a, product);
        function
    });
    p.rewrite();
    let default = p.ir.function(p.root).and_then(|f| f.defaults.first().map(|(_, value)| *value));
    assert_eq!(default.and_then(|id| constant(p.kind(id))), Some(Constant::Int(6)));
}

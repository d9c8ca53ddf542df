//! Function, method, constructor and closure calls

use super::{increment, is_const, program};
use irfold::{FoldConfig, Folder, Intrinsic, NodeId, NodeKind, State};
use pretty_assertions::assert_eq;

#[test]
fn test_recursive_function_folds() {
    let mut p = program(|b| {
        let fact = b.symbol("fact");
        let n = b.symbol("n");
        b.function(fact, vec![n], true, |b, _| {
            let get_n = b.get(n);
            let one = b.int(1);
            let small = b.op(Intrinsic::LessOrEqual, vec![get_n, one]);
            let base = b.int(1);
            let get_n = b.get(n);
            let one = b.int(1);
            let smaller = b.op(Intrinsic::Minus, vec![get_n, one]);
            let recurse = b.call(fact, vec![smaller]);
            let get_n = b.get(n);
            let product = b.op(Intrinsic::Times, vec![get_n, recurse]);
            b.if_else(small, base, product)
        });
        let five = b.int(5);
        b.call(fact, vec![five])
    });
    assert_eq!(p.fold(), Some(State::int(120)));
    assert!(is_const(p.root_kind()));
}

#[test]
fn test_method_reads_receiver_field() {
    let mut p = program(|b| {
        let point = b.class("Point", None);
        let x = b.symbol("x");
        let this = b.symbol("this");
        let initial = b.symbol("initial");
        b.constructor(point, point, this, vec![initial], true, |b, _| {
            let get = b.get(initial);
            b.set_field(this, x, get)
        });
        let get_x = b.symbol("getX");
        let me = b.symbol("me");
        b.method(get_x, me, vec![], true, |b, _| b.get_field(me, x));

        let p = b.symbol("p");
        let seven = b.int(7);
        let create = b.new_object(point, vec![seven]);
        let declare = b.var(p, create);
        let receiver = b.get(p);
        let call = b.call_method(get_x, receiver, vec![]);
        b.block(vec![declare, call])
    });
    assert_eq!(p.fold(), Some(State::int(7)));
}

#[test]
fn test_call_with_side_effects_keeps_its_syntax() {
    let mut call = NodeId(u32::MAX);
    let mut p = program(|b| {
        let counter = b.class("Counter", None);
        let count = b.symbol("count");
        let this = b.symbol("this");
        b.constructor(counter, counter, this, vec![], true, |b, _| {
            let zero = b.int(0);
            b.set_field(this, count, zero)
        });
        let bump = b.symbol("bump");
        let c = b.symbol("c");
        b.function(bump, vec![c], true, |b, _| {
            let current = b.get_field(c, count);
            let one = b.int(1);
            let next = b.op(Intrinsic::Plus, vec![current, one]);
            let store = b.set_field(c, count, next);
            let read = b.get_field(c, count);
            b.block(vec![store, read])
        });

        let local = b.symbol("local");
        let create = b.new_object(counter, vec![]);
        let declare = b.var(local, create);
        let arg = b.get(local);
        call = b.call(bump, vec![arg]);
        let again = b.get(local);
        let second = b.call(bump, vec![again]);
        b.block(vec![declare, call, second])
    });
    assert_eq!(p.fold(), Some(State::int(2)));
    assert!(matches!(p.kind(call), Some(NodeKind::Call(_))));
}

#[test]
fn test_opaque_call_forgets_objects() {
    let mut p = program(|b| {
        let counter = b.class("Counter", None);
        let count = b.symbol("count");
        let this = b.symbol("this");
        b.constructor(counter, counter, this, vec![], true, |b, _| {
            let zero = b.int(0);
            b.set_field(this, count, zero)
        });
        let touch = b.symbol("touch");
        let c = b.symbol("c");
        b.function(touch, vec![c], false, |b, _| {
            let one = b.int(1);
            b.set_field(c, count, one)
        });

        let local = b.symbol("local");
        let create = b.new_object(counter, vec![]);
        let declare = b.var(local, create);
        let arg = b.get(local);
        let call = b.call(touch, vec![arg]);
        let read = b.get_field(local, count);
        b.block(vec![declare, call, read])
    });
    assert_eq!(p.fold(), None);
}

#[test]
fn test_closure_reads_captured_variable() {
    let mut p = program(|b| {
        let base = b.symbol("base");
        let ten = b.int(10);
        let declare_base = b.var(base, ten);
        let x = b.symbol("x");
        let lambda = b.lambda(vec![x], |b, _| {
            let get_x = b.get(x);
            let get_base = b.get(base);
            b.op(Intrinsic::Plus, vec![get_x, get_base])
        });
        let add = b.symbol("add");
        let declare_add = b.var(add, lambda);
        let callee = b.get(add);
        let five = b.int(5);
        let invoke = b.invoke(callee, vec![five]);
        b.block(vec![declare_base, declare_add, invoke])
    });
    assert_eq!(p.fold(), Some(State::int(15)));
}

#[test]
fn test_variable_written_by_lambda_escapes() {
    let mut p = program(|b| {
        let n = b.symbol("n");
        let zero = b.int(0);
        let declare_n = b.var(n, zero);
        let lambda = b.lambda(vec![], |b, _| increment(b, n, 1));
        let inc = b.symbol("inc");
        let declare_inc = b.var(inc, lambda);
        let callee = b.get(inc);
        let invoke = b.invoke(callee, vec![]);
        let read = b.get(n);
        b.block(vec![declare_n, declare_inc, invoke, read])
    });
    assert_eq!(p.fold(), None);
}

#[test]
fn test_runaway_recursion_is_not_foldable() {
    let mut p = program(|b| {
        let forever = b.symbol("forever");
        b.function(forever, vec![], true, |b, _| b.call(forever, vec![]));
        b.call(forever, vec![])
    });
    let config = FoldConfig {
        max_frames: 32,
        ..FoldConfig::default()
    };
    let folded = Folder::with_config(&p.declarations, config).evaluate(&mut p.ir, p.root);
    assert_eq!(folded, None);
    assert!(matches!(p.root_kind(), Some(NodeKind::Call(_))));
}

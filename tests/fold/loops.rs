//! Loops: whole-loop folding, break/continue, conservative rewriting

use super::{constant, increment, less, program};
use irfold::{Constant, Intrinsic, NodeId, NodeKind, State, Symbol};
use pretty_assertions::assert_eq;

fn equals(b: &mut irfold::IrBuilder, symbol: Symbol, value: i64) -> NodeId {
    let get = b.get(symbol);
    let value = b.int(value);
    b.op(Intrinsic::Eq, vec![get, value])
}

#[test]
fn test_counting_loop_folds() {
    let mut p = program(|b| {
        let s = b.symbol("s");
        let i = b.symbol("i");
        let zero = b.int(0);
        let declare_s = b.var(s, zero);
        let one = b.int(1);
        let declare_i = b.var(i, one);
        let lp = b.while_loop(|b, _| {
            let get_i = b.get(i);
            let four = b.int(4);
            let condition = less(b, get_i, four);
            let get_s = b.get(s);
            let get_i = b.get(i);
            let sum = b.op(Intrinsic::Plus, vec![get_s, get_i]);
            let add = b.set(s, sum);
            let step = increment(b, i, 1);
            (condition, b.block(vec![add, step]))
        });
        let read = b.get(s);
        b.block(vec![declare_s, declare_i, lp, read])
    });
    assert_eq!(p.fold(), Some(State::int(6)));
}

#[test]
fn test_do_while_runs_body_first() {
    let mut p = program(|b| {
        let i = b.symbol("i");
        let ten = b.int(10);
        let declare = b.var(i, ten);
        let lp = b.do_while(|b, _| {
            let get_i = b.get(i);
            let five = b.int(5);
            let condition = less(b, get_i, five);
            (condition, increment(b, i, 1))
        });
        let read = b.get(i);
        b.block(vec![declare, lp, read])
    });
    assert_eq!(p.fold(), Some(State::int(11)));
}

#[test]
fn test_continue_in_do_while() {
    let mut p = program(|b| {
        let i = b.symbol("i");
        let n = b.symbol("n");
        let zero = b.int(0);
        let declare_i = b.var(i, zero);
        let zero = b.int(0);
        let declare_n = b.var(n, zero);
        let lp = b.do_while(|b, lp| {
            let get_i = b.get(i);
            let four = b.int(4);
            let condition = less(b, get_i, four);
            let step = increment(b, i, 1);
            let is_two = equals(b, i, 2);
            let skip = b.cont(lp);
            let guard = b.when(vec![(is_two, skip)]);
            let count = increment(b, n, 1);
            (condition, b.block(vec![step, guard, count]))
        });
        let read = b.get(n);
        b.block(vec![declare_i, declare_n, lp, read])
    });
    assert_eq!(p.fold(), Some(State::int(3)));
}

#[test]
fn test_break_from_nested_when() {
    let mut p = program(|b| {
        let i = b.symbol("i");
        let zero = b.int(0);
        let declare = b.var(i, zero);
        let lp = b.while_loop(|b, lp| {
            let always = b.bool(true);
            let step = increment(b, i, 1);
            let is_five = equals(b, i, 5);
            let exit = b.brk(lp);
            let guard = b.when(vec![(is_five, exit)]);
            (always, b.block(vec![step, guard]))
        });
        let read = b.get(i);
        b.block(vec![declare, lp, read])
    });
    assert_eq!(p.fold(), Some(State::int(5)));
}

#[test]
fn test_break_leaves_only_inner_loop() {
    let mut p = program(|b| {
        let i = b.symbol("i");
        let total = b.symbol("total");
        let zero = b.int(0);
        let declare_i = b.var(i, zero);
        let zero = b.int(0);
        let declare_total = b.var(total, zero);
        let outer = b.while_loop(|b, _| {
            let get_i = b.get(i);
            let three = b.int(3);
            let condition = less(b, get_i, three);
            let step = increment(b, i, 1);
            let inner = b.while_loop(|b, inner| {
                let always = b.bool(true);
                let count = increment(b, total, 1);
                let exit = b.brk(inner);
                (always, b.block(vec![count, exit]))
            });
            (condition, b.block(vec![step, inner]))
        });
        let read = b.get(total);
        b.block(vec![declare_i, declare_total, outer, read])
    });
    assert_eq!(p.fold(), Some(State::int(3)));
}

#[test]
fn test_unknown_bound_forgets_assigned_variables() {
    let mut k = Symbol(u32::MAX);
    let mut p = program(|b| {
        k = b.symbol("k");
        let s = b.symbol("s");
        let t = b.symbol("t");
        let i = b.symbol("i");
        let zero = b.int(0);
        let declare_s = b.var(s, zero);
        let seven = b.int(7);
        let declare_t = b.var(t, seven);
        let zero = b.int(0);
        let declare_i = b.var(i, zero);
        let lp = b.while_loop(|b, _| {
            let get_i = b.get(i);
            let get_k = b.get(k);
            let condition = less(b, get_i, get_k);
            let add = increment(b, s, 2);
            let step = increment(b, i, 1);
            (condition, b.block(vec![add, step]))
        });
        let get_t = b.get(t);
        let one = b.int(1);
        let t_plus_one = b.op(Intrinsic::Plus, vec![get_t, one]);
        let read_s = b.get(s);
        b.block(vec![declare_s, declare_t, declare_i, lp, t_plus_one, read_s])
    });
    assert_eq!(p.fold_with(&[(k, State::Unknown)]), None);

    let Some(NodeKind::Block(statements)) = p.root_kind().cloned() else {
        return;
    };
    assert_eq!(
        statements.get(4).and_then(|id| constant(p.kind(*id))),
        Some(Constant::Int(8))
    );
    assert!(matches!(
        statements.get(5).and_then(|id| p.kind(*id)),
        Some(NodeKind::GetValue(_))
    ));
}

#[test]
fn test_unknown_bound_still_folds_loop_locals() {
    let mut k = Symbol(u32::MAX);
    let mut assign = NodeId(u32::MAX);
    let mut p = program(|b| {
        k = b.symbol("k");
        let s = b.symbol("s");
        let zero = b.int(0);
        let declare_s = b.var(s, zero);
        let lp = b.while_loop(|b, _| {
            let get_s = b.get(s);
            let get_k = b.get(k);
            let condition = less(b, get_s, get_k);
            let t = b.symbol("t");
            let three = b.int(3);
            let declare_t = b.var(t, three);
            let get_t = b.get(t);
            let one = b.int(1);
            let sum = b.op(Intrinsic::Plus, vec![get_t, one]);
            assign = b.set(s, sum);
            (condition, b.block(vec![declare_t, assign]))
        });
        b.block(vec![declare_s, lp])
    });
    assert_eq!(p.fold_with(&[(k, State::Unknown)]), None);

    let value = match p.kind(assign) {
        Some(NodeKind::SetValue { value, .. }) => Some(*value),
        _ => None,
    };
    assert_eq!(value.and_then(|id| constant(p.kind(id))), Some(Constant::Int(4)));
}

//! Literals, variables, intrinsics and configuration

use super::{constant, increment, is_const, program};
use irfold::{Constant, EvaluationMode, FoldConfig, Folder, Intrinsic, NodeKind, State};
use pretty_assertions::assert_eq;

#[test]
fn test_arithmetic_folds_to_constant() {
    let mut p = program(|b| {
        let two = b.int(2);
        let three = b.int(3);
        let product = b.op(Intrinsic::Times, vec![two, three]);
        let four = b.int(4);
        b.op(Intrinsic::Plus, vec![product, four])
    });
    assert_eq!(p.fold(), Some(State::int(10)));
    assert_eq!(constant(p.root_kind()), Some(Constant::Int(10)));
}

#[test]
fn test_string_concat_folds() {
    let mut p = program(|b| {
        let label = b.string("x = ");
        let n = b.int(42);
        b.concat(vec![label, n])
    });
    assert_eq!(p.fold(), Some(State::string("x = 42")));
    assert!(is_const(p.root_kind()));
}

#[test]
fn test_bound_variable_folds() {
    let mut x = None;
    let mut p = program(|b| {
        let symbol = b.symbol("x");
        x = Some(symbol);
        let get = b.get(symbol);
        let one = b.int(1);
        b.op(Intrinsic::Plus, vec![get, one])
    });
    let Some(x) = x else {
        return;
    };
    assert_eq!(p.fold_with(&[(x, State::int(5))]), Some(State::int(6)));
}

#[test]
fn test_unknown_variable_is_not_foldable() {
    let mut x = None;
    let mut p = program(|b| {
        let symbol = b.symbol("x");
        x = Some(symbol);
        let get = b.get(symbol);
        let one = b.int(1);
        b.op(Intrinsic::Plus, vec![get, one])
    });
    let Some(x) = x else {
        return;
    };
    assert_eq!(p.fold_with(&[(x, State::Unknown)]), None);
    assert!(matches!(p.root_kind(), Some(NodeKind::Call(_))));
}

#[test]
fn test_undeclared_variable_is_not_foldable() {
    let mut p = program(|b| {
        let symbol = b.symbol("nowhere");
        b.get(symbol)
    });
    assert_eq!(p.fold(), None);
}

#[test]
fn test_division_by_zero_is_not_foldable() {
    let mut p = program(|b| {
        let one = b.int(1);
        let zero = b.int(0);
        b.op(Intrinsic::Div, vec![one, zero])
    });
    assert_eq!(p.fold(), None);
    assert!(matches!(p.root_kind(), Some(NodeKind::Call(_))));
}

#[test]
fn test_block_with_local_variable() {
    let mut p = program(|b| {
        let x = b.symbol("x");
        let one = b.int(1);
        let declare = b.var(x, one);
        let bump = increment(b, x, 2);
        let read = b.get(x);
        b.block(vec![declare, bump, read])
    });
    assert_eq!(p.fold(), Some(State::int(3)));
}

#[test]
fn test_empty_block_is_unit() {
    let mut p = program(|b| b.block(vec![]));
    assert_eq!(p.fold(), Some(State::unit()));
}

#[test]
fn test_block_after_failing_statement_has_no_value() {
    let mut p = program(|b| {
        let one = b.int(1);
        let zero = b.int(0);
        let boom = b.op(Intrinsic::Div, vec![one, zero]);
        let five = b.int(5);
        b.block(vec![boom, five])
    });
    assert_eq!(p.fold(), None);
}

#[test]
fn test_only_builtins_skips_annotated_functions() {
    let build = |b: &mut irfold::IrBuilder| {
        let double = b.symbol("double");
        let n = b.symbol("n");
        b.function(double, vec![n], true, |b, _| {
            let get = b.get(n);
            let two = b.int(2);
            b.op(Intrinsic::Times, vec![get, two])
        });
        let four = b.int(4);
        b.call(double, vec![four])
    };

    let mut annotated = program(build);
    assert_eq!(
        annotated.fold_in_mode(EvaluationMode::WithAnnotations),
        Some(State::int(8))
    );

    let mut builtins_only = program(build);
    assert_eq!(builtins_only.fold_in_mode(EvaluationMode::OnlyBuiltins), None);
}

#[test]
fn test_unannotated_function_is_not_called() {
    let mut p = program(|b| {
        let f = b.symbol("f");
        b.function(f, vec![], false, |b, _| b.int(1));
        b.call(f, vec![])
    });
    assert_eq!(p.fold(), None);
}

#[test]
fn test_command_limit_aborts_the_attempt() {
    let mut p = program(|b| {
        let i = b.symbol("i");
        let zero = b.int(0);
        let declare = b.var(i, zero);
        let lp = b.while_loop(|b, _| {
            let cond = b.bool(true);
            let body = increment(b, i, 1);
            (cond, body)
        });
        let read = b.get(i);
        b.block(vec![declare, lp, read])
    });
    let config = FoldConfig {
        max_commands: 500,
        ..FoldConfig::default()
    };
    let folded = Folder::with_config(&p.declarations, config).evaluate(&mut p.ir, p.root);
    assert_eq!(folded, None);
}

#[test]
fn test_config_from_json() {
    let config = FoldConfig::from_json(r#"{"mode": "only_builtins", "max_frames": 8}"#);
    assert!(matches!(
        config,
        Ok(FoldConfig {
            mode: EvaluationMode::OnlyBuiltins,
            max_commands: 1_000_000,
            max_frames: 8,
        })
    ));
}

#[test]
fn test_return_to_folded_block_gives_its_value() {
    let mut ret = irfold::NodeId(u32::MAX);
    let mut p = program(|b| {
        b.returnable_block(|b, block| {
            let one = b.int(1);
            let two = b.int(2);
            let sum = b.op(Intrinsic::Plus, vec![one, two]);
            ret = b.ret(block, sum);
            let unreachable = b.int(99);
            vec![ret, unreachable]
        })
    });
    assert_eq!(p.fold(), Some(State::int(3)));
    let returned = match p.kind(ret) {
        Some(NodeKind::Return { value, .. }) => Some(*value),
        _ => None,
    };
    assert_eq!(
        returned.and_then(|id| constant(p.kind(id))),
        Some(Constant::Int(3))
    );
    assert!(matches!(p.root_kind(), Some(NodeKind::Block(statements)) if statements.len() == 1));
}

#[test]
fn test_return_after_unknown_statement_is_not_folded() {
    let mut p = program(|b| {
        let flag = b.symbol("flag");
        b.returnable_block(|b, block| {
            let declare = b.declare(flag);
            let condition = b.get(flag);
            let bump = b.int(0);
            let when = b.when(vec![(condition, bump)]);
            let five = b.int(5);
            let ret = b.ret(block, five);
            vec![declare, when, ret]
        })
    });
    assert_eq!(p.fold(), None);
}

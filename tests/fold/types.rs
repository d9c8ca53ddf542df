//! Type checks and casts

use super::{constant, is_const, program, Program};
use irfold::{Constant, Intrinsic, IrBuilder, NodeId, NodeKind, State, Symbol, TypeOperator};
use pretty_assertions::assert_eq;

/// Class `name` whose constructor stores its single argument in `field`.
fn holder(b: &mut IrBuilder, name: &str, superclass: Option<Symbol>, field: Symbol) -> Symbol {
    let class = b.class(name, superclass);
    let this = b.symbol("this");
    let value = b.symbol("value");
    b.constructor(class, class, this, vec![value], true, |b, _| {
        let get = b.get(value);
        b.set_field(this, field, get)
    });
    class
}

/// Classes `A`, `B`, `C` holding fields `a`, `b`, `c`, plus an unrelated `D` holding `a`.
struct Shapes {
    classes: Vec<(Symbol, Symbol)>,
    unrelated: Symbol,
}

impl Shapes {
    fn class(&self, index: usize) -> Symbol {
        self.classes.get(index).map(|(class, _)| *class).unwrap_or(Symbol(u32::MAX))
    }

    fn field(&self, index: usize) -> Symbol {
        self.classes.get(index).map(|(_, field)| *field).unwrap_or(Symbol(u32::MAX))
    }
}

fn shapes(b: &mut IrBuilder) -> Shapes {
    let mut classes = Vec::new();
    for (name, field) in [("A", "a"), ("B", "b"), ("C", "c")] {
        let field = b.symbol(field);
        classes.push((holder(b, name, None, field), field));
    }
    let field_a = classes.first().map(|(_, f)| *f).unwrap_or(Symbol(u32::MAX));
    let unrelated = holder(b, "D", None, field_a);
    Shapes { classes, unrelated }
}

/// `fun classify(obj) = when { obj is A -> obj.a; obj is B -> obj.b; obj is C -> obj.c; else -> -1 }`
fn classify(b: &mut IrBuilder, s: &Shapes) -> Symbol {
    let name = b.symbol("classify");
    let obj = b.symbol("obj");
    b.function(name, vec![obj], true, |b, _| {
        let mut arms = Vec::new();
        for index in 0..s.classes.len() {
            let get = b.get(obj);
            let check = b.is_instance(get, s.class(index));
            let read = b.get_field(obj, s.field(index));
            arms.push((check, read));
        }
        let otherwise = b.bool(true);
        let minus_one = b.int(-1);
        arms.push((otherwise, minus_one));
        b.when(arms)
    });
    name
}

/// `classify(<class>(value))`
fn classify_new(pick: impl FnOnce(&Shapes) -> Symbol, value: i64) -> Program {
    program(|b| {
        let s = shapes(b);
        let function = classify(b, &s);
        let value = b.int(value);
        let create = b.new_object(pick(&s), vec![value]);
        b.call(function, vec![create])
    })
}

#[test]
fn test_when_dispatches_on_instance_checks() {
    assert_eq!(classify_new(|s| s.class(0), 1).fold(), Some(State::int(1)));
    assert_eq!(classify_new(|s| s.class(1), 2).fold(), Some(State::int(2)));
    assert_eq!(classify_new(|s| s.class(2), 3).fold(), Some(State::int(3)));
    assert_eq!(classify_new(|s| s.unrelated, 4).fold(), Some(State::int(-1)));
}

/// `fun asA(obj) { val t = obj as? A; when { t == null -> null; else -> t.a.toString() } }`
fn safe_cast_to_a(pick: impl FnOnce(&Shapes) -> Symbol) -> Program {
    program(|b| {
        let s = shapes(b);
        let name = b.symbol("asA");
        let obj = b.symbol("obj");
        let t = b.symbol("t");
        b.function(name, vec![obj], true, |b, _| {
            let get = b.get(obj);
            let cast = b.type_op(TypeOperator::SafeCast, get, s.class(0));
            let declare = b.var(t, cast);
            let get_t = b.get(t);
            let null = b.null();
            let missing = b.op(Intrinsic::Eq, vec![get_t, null]);
            let none = b.null();
            let read = b.get_field(t, s.field(0));
            let text = b.op(Intrinsic::ToString, vec![read]);
            let choice = b.if_else(missing, none, text);
            b.block(vec![declare, choice])
        });
        let one = b.int(1);
        let create = b.new_object(pick(&s), vec![one]);
        b.call(name, vec![create])
    })
}

#[test]
fn test_safe_cast_yields_object_or_null() {
    assert_eq!(safe_cast_to_a(|s| s.class(0)).fold(), Some(State::string("1")));
    assert_eq!(safe_cast_to_a(|s| s.class(1)).fold(), Some(State::null()));
}

#[test]
fn test_subclass_instance_passes_check() {
    let mut p = program(|b| {
        let field = b.symbol("a");
        let base = holder(b, "Base", None, field);
        let derived = holder(b, "Derived", Some(base), field);
        let one = b.int(1);
        let create = b.new_object(derived, vec![one]);
        b.type_op(TypeOperator::NotIs, create, base)
    });
    assert_eq!(p.fold(), Some(State::bool(false)));
}

#[test]
fn test_check_on_literal_is_replaced() {
    let mut p = program(|b| {
        let five = b.int(5);
        let is_int = b.is_instance(five, Symbol::INT);
        let text = b.string("five");
        let is_not_string = b.type_op(TypeOperator::NotIs, text, Symbol::STRING);
        b.op(Intrinsic::Or, vec![is_int, is_not_string])
    });
    assert_eq!(p.fold(), Some(State::bool(true)));
    assert_eq!(constant(p.root_kind()), Some(Constant::Bool(true)));
}

#[test]
fn test_safe_cast_of_literal_folds_to_null() {
    let mut p = program(|b| {
        let five = b.int(5);
        b.type_op(TypeOperator::SafeCast, five, Symbol::STRING)
    });
    assert_eq!(p.fold(), Some(State::null()));
    assert_eq!(constant(p.root_kind()), Some(Constant::Null));
}

#[test]
fn test_failed_cast_throws_class_cast_exception() {
    let mut p = program(|b| {
        let text = b.string("s");
        let cast = b.type_op(TypeOperator::Cast, text, Symbol::INT);
        let e = b.symbol("e");
        let message = b.get_field(e, Symbol::MESSAGE);
        let clause = b.catch(e, Some(Symbol::CLASS_CAST_EXCEPTION), message);
        b.try_catch(cast, vec![clause], None)
    });
    assert_eq!(p.fold(), Some(State::string("\"s\" cannot be cast to Int")));
}

#[test]
fn test_uncaught_cast_failure_is_not_foldable() {
    let mut p = program(|b| {
        let null = b.null();
        b.type_op(TypeOperator::Cast, null, Symbol::ANY)
    });
    assert_eq!(p.fold(), None);
    assert!(matches!(p.root_kind(), Some(NodeKind::TypeOperator { .. })));
}

#[test]
fn test_check_on_unknown_parameter_keeps_its_syntax() {
    let mut x = Symbol(u32::MAX);
    let mut check = NodeId(u32::MAX);
    let mut p = program(|b| {
        let f = b.symbol("f");
        x = b.symbol("x");
        b.function(f, vec![x], true, |b, _| {
            let get = b.get(x);
            check = b.is_instance(get, Symbol::INT);
            let two = b.int(2);
            let literal = b.is_instance(two, Symbol::BOOLEAN);
            b.op(Intrinsic::And, vec![check, literal])
        })
    });
    p.rewrite();
    assert!(matches!(
        p.kind(check),
        Some(NodeKind::TypeOperator { operand, .. })
            if matches!(p.kind(*operand), Some(NodeKind::GetValue(symbol)) if *symbol == x)
    ));
    let args = match p.ir.function(p.root).and_then(|f| p.kind(f.body)) {
        Some(NodeKind::Call(call)) => call.args.clone(),
        _ => Vec::new(),
    };
    assert!(is_const(args.get(1).and_then(|id| p.kind(*id))));
}

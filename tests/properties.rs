//! End-to-end behavior through the public API: read, evaluate, print.

#![expect(clippy::unwrap_used)] // test code OK

use malrs::ast::{Value, kw, nil, sym, val, vector};
use malrs::evaluator::{Environment, create_global_env, eval};
use malrs::printer::pr_str;
use malrs::reader::read_str;
use malrs::{Error, ReadErrorKind, rep, run_with_large_stack};

fn eval_str(input: &str, env: &Environment) -> Result<Value, Error> {
    let form = read_str(input)?.unwrap();
    eval(&form, env)
}

#[test]
fn literals_round_trip_through_the_printer() {
    let values = vec![
        val(true),
        val(false),
        nil(),
        Value::Undefined,
        val(0),
        val(-42),
        val(i64::MAX),
        val(2.5),
        val(-0.125),
        val(3.0),
        val(""),
        val("plain"),
        val("quote \" backslash \\ newline \n tab \t"),
        kw("key"),
        sym("a-symbol!"),
        val(Vec::<Value>::new()),
        val([val(1), val("two"), kw("three")]),
        vector([val(1), val([2, 3]), vector(Vec::<Value>::new())]),
        Value::map_from_pairs(&[kw("a"), val(1), val("b"), vector([val(nil())])]).unwrap(),
        val([sym("deref"), sym("x")]),
    ];

    for value in values {
        let text = pr_str(&value, true);
        let reread = read_str(&text)
            .unwrap_or_else(|e| panic!("'{text}' did not re-read: {e}"))
            .unwrap();
        assert_eq!(reread, value, "round trip through '{text}'");
        // the printed variant is kept too, not just structural equality
        assert_eq!(reread.value_type(), value.value_type(), "'{text}'");
    }
}

#[test]
fn tail_recursion_does_not_grow_the_stack() {
    let env = create_global_env();
    eval_str("(def! loop (fn* (n) (if (= n 0) 0 (loop (- n 1)))))", &env).unwrap();
    assert_eq!(eval_str("(loop 100000)", &env).unwrap(), val(0));
}

#[test]
fn inner_let_shadows_without_touching_outer_binding() {
    let env = create_global_env();
    assert_eq!(
        eval_str("(let* (x 1) (let* (x 2) x))", &env).unwrap(),
        val(2)
    );
    assert_eq!(
        eval_str("(let* (x 1) (do (let* (x 2) x) x))", &env).unwrap(),
        val(1)
    );
}

#[test]
fn rest_parameter_collects_remaining_arguments() {
    let env = create_global_env();
    eval_str("(def! tail (fn* (a & rest) rest))", &env).unwrap();
    eval_str("(def! head (fn* (a & rest) a))", &env).unwrap();

    assert_eq!(eval_str("(tail 1 2 3)", &env).unwrap(), val([2, 3]));
    assert_eq!(eval_str("(head 1 2 3)", &env).unwrap(), val(1));
    assert_eq!(
        eval_str("(tail 1)", &env).unwrap(),
        val(Vec::<Value>::new())
    );
    assert!(matches!(
        eval_str("(tail 1)", &env).unwrap(),
        Value::List(_)
    ));
}

#[test]
fn quasiquote_unquote_and_splice() {
    let env = create_global_env();
    assert_eq!(
        eval_str("(quasiquote (1 (unquote (+ 1 1)) 3))", &env).unwrap(),
        val([1, 2, 3])
    );
    assert_eq!(
        eval_str("(quasiquote (1 (splice-unquote (list 2 3)) 4))", &env).unwrap(),
        val([1, 2, 3, 4])
    );
}

#[test]
fn def_with_three_arguments_is_a_parameters_error() {
    let env = create_global_env();
    match eval_str("(def! x 1 2)", &env) {
        Err(Error::ParametersError { expected, got, .. }) => {
            assert_eq!((expected, got), (2, 3));
        }
        other => panic!("expected ParametersError, got {other:?}"),
    }
}

#[test]
fn odd_map_literal_fails_at_read_time() {
    assert_eq!(
        read_str("{:a 1 :b}").unwrap_err(),
        Error::UnexpectedLength { got: 3, base: 2 }
    );
}

#[test]
fn a_failing_form_leaves_the_session_usable() {
    let env = create_global_env();
    assert_eq!(rep("(def! x 10)", &env).unwrap().as_deref(), Some("10"));
    assert!(rep("(undefined-fn x)", &env).is_err());
    assert!(rep("(+ x", &env).is_err());
    assert_eq!(rep("(+ x 1)", &env).unwrap().as_deref(), Some("11"));
    assert_eq!(rep("; just a comment", &env).unwrap(), None);
}

#[test]
fn read_errors_are_classified() {
    let kind = |input: &str| match read_str(input) {
        Err(Error::ReadError(e)) => e.kind,
        other => panic!("expected read error for '{input}', got {other:?}"),
    };
    assert_eq!(kind("(1 2"), ReadErrorKind::Incomplete);
    assert_eq!(kind("\"abc"), ReadErrorKind::Incomplete);
    assert_eq!(kind("(1 2]"), ReadErrorKind::Mismatch);
    assert_eq!(kind(")"), ReadErrorKind::Mismatch);
    assert_eq!(kind("^meta"), ReadErrorKind::Unsupported);
    assert_eq!(kind("99999999999999999999"), ReadErrorKind::ImplementationLimit);
    assert_eq!(
        kind(&"(".repeat(10_000)),
        ReadErrorKind::TooDeeplyNested
    );
}

#[test]
fn runaway_recursion_is_an_error_not_a_crash() {
    run_with_large_stack(|| {
        let env = create_global_env();
        eval_str("(def! down (fn* (n) (+ 1 (down n))))", &env).unwrap();
        let err = eval_str("(down 0)", &env).unwrap_err();
        assert!(matches!(err, Error::EvalError(_)), "got {err:?}");
        assert_eq!(eval_str("(+ 1 1)", &env).unwrap(), val(2));
    })
    .unwrap();
}

#[test]
fn ordinary_programs_recurse_a_thousand_levels_deep() {
    let printed = run_with_large_stack(|| {
        let env = create_global_env();
        let run = |src: &str| rep(src, &env).unwrap().unwrap();
        run("(def! sum (fn* (n) (if (= n 0) 0 (+ n (sum (- n 1))))))");
        let template = format!("(count `({}))", "x ".repeat(1000));
        (run("(sum 1000)"), run(&template))
    })
    .unwrap();
    assert_eq!(printed, ("500500".to_string(), "1000".to_string()));
}

#[test]
fn self_referencing_atom_prints_without_crashing() {
    let env = create_global_env();
    rep("(def! a (atom nil))", &env).unwrap();
    assert_eq!(rep("(reset! a a)", &env).unwrap().as_deref(), Some("(atom ...)"));
    assert_eq!(rep("(deref a)", &env).unwrap().as_deref(), Some("(atom ...)"));
    assert_eq!(rep("(= a @a)", &env).unwrap().as_deref(), Some("true"));
    // break the cycle so the atom can be freed
    rep("(reset! a nil)", &env).unwrap();
}

#[test]
fn deeply_nested_values_are_counted_compared_and_dropped() {
    let env = create_global_env();
    let run = |src: &str| rep(src, &env).unwrap().unwrap();
    run("(def! build (fn* (n acc) (if (= n 0) acc (build (- n 1) (list acc)))))");

    // the nested list is dropped right after `count` returns
    assert_eq!(run("(count (build 200000 nil))"), "1");
    assert_eq!(run("(= (build 200000 nil) (build 200000 nil))"), "true");
    assert_eq!(run("(= (build 200000 nil) (build 199999 nil))"), "false");

    // printing it back walks every level
    let printed = run("(def! kept (build 200000 nil))");
    assert_eq!(printed.len(), 200_000 * 2 + 3);
    assert!(printed.starts_with("((((") && printed.ends_with("nil))))"));
    run("(def! kept nil)");
}

#[test]
fn integer_division_overflow_is_an_error() {
    let env = create_global_env();
    assert_eq!(
        rep("(/ -9223372036854775808 -1)", &env).unwrap_err(),
        Error::EvalError("Integer overflow in division".into())
    );
    assert_eq!(
        rep("(/ -9223372036854775808 2)", &env).unwrap().as_deref(),
        Some("-4611686018427387904")
    );
}

#[test]
fn closures_share_state_through_atoms() {
    let env = create_global_env();
    let run = |src: &str| rep(src, &env).unwrap().unwrap();

    run("(def! make-counter (fn* () (let* [c (atom 0)] (fn* () (swap! c + 1)))))");
    run("(def! a (make-counter))");
    run("(def! b (make-counter))");
    run("(a)");
    assert_eq!(run("(a)"), "2");
    assert_eq!(run("(b)"), "1");
}

#[test]
fn host_registered_natives_are_callable() {
    fn shout(text: &str) -> String {
        text.to_uppercase()
    }
    let env = create_global_env();
    env.register_builtin_operation::<_, (&str,)>("shout", shout);
    assert_eq!(
        rep("(shout \"hi\")", &env).unwrap().as_deref(),
        Some("\"HI\"")
    );
    assert_eq!(
        rep("(shout)", &env).unwrap_err(),
        Error::parameters("shout", 1, 0)
    );
}

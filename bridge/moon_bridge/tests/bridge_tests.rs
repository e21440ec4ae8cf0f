//! End-to-end tests: host functions called from scripts and back.

#![allow(clippy::unwrap_used, reason = "tests unwrap known-good values")]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use moon_bridge::{
    Engine, EngineConfig, Error, HostError, MultiValue, NamespaceError, ScriptErrorKind, StdLib,
    Value,
};
use pretty_assertions::assert_eq;

fn engine() -> Engine {
    Engine::new().unwrap()
}

fn values(out: MultiValue) -> Vec<Value> {
    out.into_vec()
}

// Registration

#[test]
fn math_add_returns_sum() {
    let mut engine = engine();
    engine.register("math.add", |a: i64, b: i64| a + b).unwrap();

    let out = engine.eval("return math.add(2, 3)", true).unwrap();
    assert_eq!(values(out), vec![Value::int(5)]);
    // the existing math library is extended, not replaced
    let out = engine.eval("return math.floor(2.5)", true).unwrap();
    assert_eq!(values(out), vec![Value::int(2)]);
}

#[test]
fn math_add_arity_error_names_problem() {
    let mut engine = engine();
    engine.register("math.add", |a: i64, b: i64| a + b).unwrap();

    let err = engine.eval("return math.add(2)", true).unwrap_err();
    assert_eq!(err.kind, ScriptErrorKind::Runtime);
    assert_eq!(
        err.message,
        "math.add: number of arguments not match (expected 2, got 1)"
    );
}

#[test]
fn registration_creates_intermediate_tables() {
    let mut engine = engine();
    engine.register("foo.bar.baz", || 1).unwrap();

    let out = engine
        .eval(
            "return type(foo), type(foo.bar), type(foo.bar.baz), foo.bar.baz()",
            true,
        )
        .unwrap();
    assert_eq!(
        values(out),
        vec![
            Value::string("table"),
            Value::string("table"),
            Value::string("function"),
            Value::int(1),
        ]
    );
}

#[test]
fn registration_over_plain_value_fails_cleanly() {
    let mut engine = engine();
    engine.set("lib", 7).unwrap();

    let err = engine.register("lib.f", || 1).unwrap_err();
    assert!(matches!(
        err,
        Error::Namespace(NamespaceError::NotANamespace { ref path, found: "number" }) if path == "lib"
    ));
    assert_eq!(engine.get("lib").unwrap(), Value::int(7));
    assert_eq!(engine.stack_depth(), 0);
}

#[test]
fn collision_deep_in_path_leaves_no_partial_structure() {
    let mut engine = engine();
    engine.eval("a = { b = 'leaf' }", true).unwrap();

    let err = engine.register("a.b.c.d", || 1).unwrap_err();
    assert!(matches!(
        err,
        Error::Namespace(NamespaceError::NotANamespace { ref path, found: "string" }) if path == "a.b"
    ));
    let out = engine.eval("local n = 0 for _ in pairs(a) do n = n + 1 end return n, a.b", true);
    assert_eq!(
        values(out.unwrap()),
        vec![Value::int(1), Value::string("leaf")]
    );
}

#[test]
fn invalid_paths_rejected() {
    let mut engine = engine();
    for bad in ["", "a..b", ".x", "x."] {
        let err = engine.register(bad, || 1).unwrap_err();
        assert!(
            matches!(err, Error::Namespace(NamespaceError::InvalidPath { .. })),
            "{bad:?}"
        );
    }
    assert_eq!(engine.function_count(), 0);
}

#[test]
fn reregistering_replaces_binding() {
    let mut engine = engine();
    engine.register("f", || "old").unwrap();
    engine.register("f", || "new").unwrap();
    let out = engine.eval("return f()", true).unwrap();
    assert_eq!(values(out), vec![Value::string("new")]);
}

// Argument and result marshaling

#[test]
fn arguments_and_results_keep_order() {
    let mut engine = engine();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    engine
        .register_raw("echo", move |_, args| {
            sink.borrow_mut().extend(args.iter().cloned());
            Ok(args.into_iter().rev().collect())
        })
        .unwrap();

    let out = engine.eval("return echo(1, 'two', true, nil, 2.5)", true).unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![
            Value::int(1),
            Value::string("two"),
            Value::Boolean(true),
            Value::Nil,
            Value::float(2.5),
        ]
    );
    assert_eq!(
        values(out),
        vec![
            Value::float(2.5),
            Value::Nil,
            Value::Boolean(true),
            Value::string("two"),
            Value::int(1),
        ]
    );
}

#[test]
fn multiple_results_visible_to_script() {
    let mut engine = engine();
    engine
        .register("swap", |i: i64, s: String, b: bool| (b, i, s))
        .unwrap();
    let out = engine
        .eval("local b, i, s = swap(42, 'foobar', true) return select('#', swap(1, '', false)), b, i, s", true)
        .unwrap();
    assert_eq!(
        values(out),
        vec![
            Value::int(3),
            Value::Boolean(true),
            Value::int(42),
            Value::string("foobar"),
        ]
    );
}

#[test]
fn bad_argument_type_raises() {
    let mut engine = engine();
    engine
        .register("swap", |i: i64, s: String, b: bool| (b, i, s))
        .unwrap();
    let err = engine.eval("return swap(true, 42, 'x')", true).unwrap_err();
    assert_eq!(
        err.message,
        "swap: bad argument #1: expected integer, got boolean"
    );
}

#[test]
fn tables_cross_the_boundary() {
    let mut engine = engine();
    engine
        .register("sum", |items: Vec<i64>| items.iter().sum::<i64>())
        .unwrap();
    engine
        .register("keys", |map: BTreeMap<String, Value>| {
            map.into_keys().collect::<Vec<_>>().join(",")
        })
        .unwrap();
    engine
        .register("range", |n: i64| (1..=n).collect::<Vec<_>>())
        .unwrap();

    let out = engine
        .eval(
            "local r = range(3) return sum({1, 2, 3}), keys({b = 1, a = 2}), #r, r[3]",
            true,
        )
        .unwrap();
    assert_eq!(
        values(out),
        vec![
            Value::int(6),
            Value::string("a,b"),
            Value::int(3),
            Value::int(3),
        ]
    );
}

#[test]
fn unicode_strings_survive() {
    let mut engine = engine();
    engine.register("upper", |s: String| s.to_uppercase()).unwrap();
    engine.set("greeting", "你好, 世界").unwrap();
    let out = engine.eval("return greeting, upper('ßé')", true).unwrap();
    assert_eq!(
        values(out),
        vec![Value::string("你好, 世界"), Value::string("SSÉ")]
    );
}

#[test]
fn light_userdata_round_trips() {
    let mut engine = engine();
    let mut slot = 0_u64;
    let ptr: *mut std::ffi::c_void = std::ptr::addr_of_mut!(slot).cast();
    engine.set("handle", ptr).unwrap();
    engine
        .register("same", move |p: *mut std::ffi::c_void| p == ptr)
        .unwrap();
    let out = engine.eval("return same(handle), type(handle)", true).unwrap();
    assert_eq!(
        values(out),
        vec![Value::Boolean(true), Value::string("userdata")]
    );
}

// Errors and tracebacks

#[test]
fn host_failure_carries_traceback() {
    let mut engine = engine();
    engine
        .register_raw("fail", |_, _| Err(HostError::new("disk on fire")))
        .unwrap();

    let err = engine
        .eval("local function outer() fail() end outer()", true)
        .unwrap_err();
    assert_eq!(err.message, "fail: disk on fire");
    assert!(err.traceback.starts_with("stack traceback:"), "{}", err.traceback);
    assert!(err.traceback.contains("outer"), "{}", err.traceback);
}

#[test]
fn unprotected_eval_has_no_traceback() {
    let mut engine = engine();
    engine
        .register_raw("fail", |_, _| Err(HostError::new("quiet")))
        .unwrap();
    let err = engine.eval("fail()", false).unwrap_err();
    assert_eq!(err.message, "fail: quiet");
    assert!(err.traceback.is_empty());
}

#[test]
fn unprotected_eval_keeps_marker_text_in_message() {
    let mut engine = engine();
    let err = engine
        .eval("error('a\\nstack traceback: not really', 0)", false)
        .unwrap_err();
    assert_eq!(err.message, "a\nstack traceback: not really");
    assert!(err.traceback.is_empty());
}

#[test]
fn script_errors_from_nested_frames() {
    let mut engine = engine();
    let err = engine
        .eval(
            "local function foo() error('foo error') end\nlocal function bar() foo() end\nbar()",
            true,
        )
        .unwrap_err();
    assert!(err.message.ends_with("foo error"), "{}", err.message);
    assert!(err.traceback.contains("foo"), "{}", err.traceback);
    assert!(err.traceback.contains("bar"), "{}", err.traceback);
}

#[test]
fn non_string_error_values_described() {
    let mut engine = engine();
    let err = engine.eval("error({})", true).unwrap_err();
    assert_eq!(err.message, "(error object is a table value)");
    let err = engine.eval("error(42)", true).unwrap_err();
    assert_eq!(err.message, "42");
}

#[test]
fn error_objects_use_tostring_metamethod() {
    let mut engine = engine();
    let source = "error(setmetatable({}, { __tostring = function() return 'custom failure' end }))";
    let err = engine.eval(source, true).unwrap_err();
    assert_eq!(err.message, "custom failure");
    assert!(err.traceback.starts_with("stack traceback:"), "{}", err.traceback);

    let err = engine.eval(source, false).unwrap_err();
    assert_eq!(err.message, "custom failure");

    let err = engine
        .eval("error(setmetatable({}, { __tostring = function() error('nope') end }))", true)
        .unwrap_err();
    assert_eq!(err.message, "(error object is a table value)");
}

#[test]
fn cleared_closure_identity_raises_instead_of_calling() {
    let config = EngineConfig::default().with_stdlib(StdLib::all());
    let mut engine = Engine::with_config(config).unwrap();
    engine.register("answer", || 42_i64).unwrap();
    let err = engine
        .eval("debug.setupvalue(answer, 1, nil) return answer()", true)
        .unwrap_err();
    assert!(
        err.message.contains("native closure has no host function"),
        "{}",
        err.message
    );
}

#[test]
fn syntax_errors_reported() {
    let mut engine = engine();
    let err = engine.eval("return (", true).unwrap_err();
    assert_eq!(err.kind, ScriptErrorKind::Syntax);
    assert!(err.traceback.is_empty());
}

#[test]
fn panics_become_script_errors() {
    let mut engine = engine();
    engine
        .register("explode", || -> i64 { panic!("kaboom") })
        .unwrap();
    let err = engine.eval("return explode()", true).unwrap_err();
    assert_eq!(err.message, "explode: host function panicked: kaboom");
    // the engine stays usable
    let out = engine.eval("return 1 + 1", true).unwrap();
    assert_eq!(values(out), vec![Value::int(2)]);
}

#[test]
fn pcall_inside_script_catches_host_failure() {
    let mut engine = engine();
    engine
        .register_raw("fail", |_, _| Err(HostError::new("caught")))
        .unwrap();
    let out = engine
        .eval("local ok, msg = pcall(fail) return ok, msg", true)
        .unwrap();
    assert_eq!(
        values(out),
        vec![Value::Boolean(false), Value::string("fail: caught")]
    );
}

#[test]
fn function_results_fail_conversion() {
    let mut engine = engine();
    let err = engine.eval("return 1, print", true).unwrap_err();
    assert_eq!(err.kind, ScriptErrorKind::Conversion);
    assert_eq!(err.message, "return value #2: unsupported type function");
    assert_eq!(engine.stack_depth(), 0);
}

// Calling script from the host

#[test]
fn call_script_functions_by_path() {
    let mut engine = engine();
    engine
        .eval(
            "baz = { bar = { foo = function() error('foo error') end, double = function(n) return n * 2 end } }",
            true,
        )
        .unwrap();

    let out = engine.call("baz.bar.double", [Value::int(42)]).unwrap();
    assert_eq!(values(out), vec![Value::int(84)]);

    let err = engine.call("baz.bar.foo", MultiValue::new()).unwrap_err();
    assert!(err.message.contains("foo error"), "{}", err.message);
    assert!(!err.traceback.is_empty());
}

#[test]
fn call_rejects_missing_targets() {
    let mut engine = engine();
    engine.set("value", 1).unwrap();

    let err = engine.call("nothing", MultiValue::new()).unwrap_err();
    assert_eq!(err.message, "nothing is not a function (found nil)");
    let err = engine.call("value", MultiValue::new()).unwrap_err();
    assert_eq!(err.message, "value is not a function (found number)");
    let err = engine.call("foo.bar.baz", MultiValue::new()).unwrap_err();
    assert_eq!(err.message, "foo is not defined");
    assert_eq!(engine.stack_depth(), 0);
}

#[test]
fn host_functions_call_back_into_script() {
    let mut engine = engine();
    engine
        .eval("function square(n) return n * n end", true)
        .unwrap();
    engine
        .register_raw("apply", |ctx, mut args| {
            let name = args.take(0);
            let name = name.as_str().ok_or_else(|| HostError::new("name must be a string"))?;
            Ok(ctx.call(name, [args.take(1)])?)
        })
        .unwrap();

    let out = engine.eval("return apply('square', 7)", true).unwrap();
    assert_eq!(values(out), vec![Value::int(49)]);
}

#[test]
fn nested_script_failure_reraises_in_outer_frame() {
    let mut engine = engine();
    engine
        .register_raw("run", |ctx, mut args| {
            let source = args.take(0);
            Ok(ctx.eval(source.as_str().unwrap_or_default())?)
        })
        .unwrap();

    let out = engine.eval("return run('return 40 + 2')", true).unwrap();
    assert_eq!(values(out), vec![Value::int(42)]);

    let err = engine.eval("return run(\"error('inner', 0)\")", true).unwrap_err();
    assert_eq!(err.message, "run: inner");
    assert!(!err.traceback.is_empty());
    assert_eq!(engine.stack_depth(), 0);
}

// Evaluation environments

#[test]
fn environment_bindings_do_not_leak() {
    let mut engine = engine();
    engine.set("foo", 42).unwrap();

    let out = engine
        .evaluation_environment()
        .bind("bar", 42)
        .eval("return foo + bar", true)
        .unwrap();
    assert_eq!(values(out), vec![Value::int(84)]);

    let out = engine.eval("return bar", true).unwrap();
    assert_eq!(values(out), vec![Value::Nil]);
}

#[test]
fn environment_writes_invisible_to_later_evaluations() {
    let mut engine = engine();
    engine
        .evaluation_environment()
        .eval("undeclared = 'local only'", true)
        .unwrap();
    let out = engine.eval("return undeclared", true).unwrap();
    assert_eq!(values(out), vec![Value::Nil]);
}

#[test]
fn environment_sees_registered_functions() {
    let mut engine = engine();
    engine.register("math.add", |a: i64, b: i64| a + b).unwrap();
    let out = engine
        .evaluation_environment()
        .bind("x", 1)
        .eval("return math.add(x, 2)", true)
        .unwrap();
    assert_eq!(values(out), vec![Value::int(3)]);
}

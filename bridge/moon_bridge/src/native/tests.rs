#![allow(clippy::unwrap_used, reason = "tests unwrap known-good values")]

use moon_value::{ConversionError, MultiValue, Value};
use pretty_assertions::assert_eq;

use super::*;
use crate::stack::StackAdapter;

/// Run an erased host function against a scratch engine state.
fn call(native: &NativeFn, args: MultiValue) -> Result<MultiValue, HostError> {
    let state = unsafe { ffi::luaL_newstate() };
    let stack = unsafe { StackAdapter::from_raw(state) }.unwrap();
    let result = native(&mut CallContext::new(stack), args);
    unsafe { ffi::lua_close(state) };
    result
}

#[test]
fn test_two_arguments() {
    let add = (|a: i64, b: i64| a + b).into_native();
    let out = call(&*add, MultiValue::from([Value::int(2), Value::int(3)])).unwrap();
    assert_eq!(out.into_vec(), vec![Value::int(5)]);
}

#[test]
fn test_arity_mismatch() {
    let add = (|a: i64, b: i64| a + b).into_native();
    let err = call(&*add, MultiValue::from([Value::int(2)])).unwrap_err();
    assert!(matches!(
        err,
        HostError::Arity {
            expected: 2,
            got: 1
        }
    ));
    let err = call(&*add, MultiValue::from([Value::int(1), Value::int(2), Value::int(3)]))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "number of arguments not match (expected 2, got 3)"
    );
}

#[test]
fn test_bad_argument_position() {
    let negate = (|flag: bool, n: i64| if flag { -n } else { n }).into_native();
    let err = call(&*negate, MultiValue::from([Value::Boolean(true), Value::string("x")]))
        .unwrap_err();
    match err {
        HostError::Argument { position, source } => {
            assert_eq!(position, 2);
            assert_eq!(source, ConversionError::mismatch("integer", "string"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_zero_arguments_and_unit_return() {
    let noop = (|| ()).into_native();
    assert!(call(&*noop, MultiValue::new()).unwrap().is_empty());
    assert!(call(&*noop, MultiValue::from([Value::Nil])).is_err());
}

#[test]
fn test_tuple_results_keep_order() {
    let split = (|s: String| (s.len(), s.to_uppercase(), true)).into_native();
    let out = call(&*split, MultiValue::from([Value::string("abc")])).unwrap();
    assert_eq!(
        out.into_vec(),
        vec![Value::int(3), Value::string("ABC"), Value::Boolean(true)]
    );
}

#[test]
fn test_result_errors_become_host_errors() {
    let checked = (|n: i64| -> Result<i64, String> {
        if n < 0 {
            Err(format!("{n} is negative"))
        } else {
            Ok(n * 2)
        }
    })
    .into_native();
    let out = call(&*checked, MultiValue::from([Value::int(4)])).unwrap();
    assert_eq!(out.into_vec(), vec![Value::int(8)]);
    let err = call(&*checked, MultiValue::from([Value::int(-1)])).unwrap_err();
    assert_eq!(err.to_string(), "-1 is negative");
}

#[test]
fn test_optional_arguments_accept_nil() {
    let greet = (|name: Option<String>| format!("hello {}", name.unwrap_or_default())).into_native();
    let out = call(&*greet, MultiValue::from([Value::Nil])).unwrap();
    assert_eq!(out.into_vec(), vec![Value::string("hello ")]);
}

#[test]
fn test_collection_results() {
    assert_eq!(
        vec![1_i64, 2].into_results().unwrap().into_vec(),
        vec![Value::list([Value::int(1), Value::int(2)])]
    );
    assert_eq!(None::<i64>.into_results().unwrap().into_vec(), vec![Value::Nil]);
    let multi = MultiValue::from([Value::int(1), Value::int(2)]);
    assert_eq!(multi.clone().into_results().unwrap(), multi);
}

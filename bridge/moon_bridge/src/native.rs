//! Typed host functions.
//!
//! [`IntoNative`] adapts an ordinary Rust closure such as
//! `|a: i64, b: i64| a + b` to the erased [`NativeFn`] signature: it checks
//! the argument count, converts each argument with `FromValue`, and turns
//! the return value into results with [`IntoResults`].

use std::collections::{BTreeMap, HashMap};
use std::ffi::c_void;
use std::hash::BuildHasher;

use moon_value::{FromValue, IntoValue, MultiValue, Value};

use crate::dispatch::CallContext;
use crate::errors::HostError;
use crate::registry::NativeFn;

/// Values a host function can return to its script caller.
pub trait IntoResults {
    fn into_results(self) -> Result<MultiValue, HostError>;
}

macro_rules! impl_single_result {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoResults for $ty {
                #[inline]
                fn into_results(self) -> Result<MultiValue, HostError> {
                    Ok(MultiValue::from([self.into_value()]))
                }
            }
        )*
    };
}

impl_single_result!(
    Value, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String, &str,
    *mut c_void,
);

impl<T: IntoValue> IntoResults for Option<T> {
    fn into_results(self) -> Result<MultiValue, HostError> {
        Ok(MultiValue::from([self.into_value()]))
    }
}

impl<T: IntoValue> IntoResults for Vec<T> {
    fn into_results(self) -> Result<MultiValue, HostError> {
        Ok(MultiValue::from([self.into_value()]))
    }
}

impl<T: IntoValue> IntoResults for BTreeMap<String, T> {
    fn into_results(self) -> Result<MultiValue, HostError> {
        Ok(MultiValue::from([self.into_value()]))
    }
}

impl<T: IntoValue, S: BuildHasher> IntoResults for HashMap<String, T, S> {
    fn into_results(self) -> Result<MultiValue, HostError> {
        Ok(MultiValue::from([self.into_value()]))
    }
}

impl IntoResults for MultiValue {
    #[inline]
    fn into_results(self) -> Result<MultiValue, HostError> {
        Ok(self)
    }
}

impl IntoResults for () {
    #[inline]
    fn into_results(self) -> Result<MultiValue, HostError> {
        Ok(MultiValue::new())
    }
}

impl<T, E> IntoResults for Result<T, E>
where
    T: IntoResults,
    E: Into<HostError>,
{
    fn into_results(self) -> Result<MultiValue, HostError> {
        self.map_err(Into::into)?.into_results()
    }
}

macro_rules! impl_tuple_results {
    ($($name:ident),+) => {
        impl<$($name: IntoValue),+> IntoResults for ($($name,)+) {
            #[allow(non_snake_case, reason = "tuple fields reuse the type parameter names")]
            fn into_results(self) -> Result<MultiValue, HostError> {
                let ($($name,)+) = self;
                Ok(MultiValue::from([$($name.into_value()),+]))
            }
        }
    };
}

impl_tuple_results!(A);
impl_tuple_results!(A, B);
impl_tuple_results!(A, B, C);
impl_tuple_results!(A, B, C, D);
impl_tuple_results!(A, B, C, D, E);
impl_tuple_results!(A, B, C, D, E, F);

/// A Rust closure that can be registered as a host function.
///
/// `Marker` is the argument tuple; it only exists to keep the per-arity
/// implementations apart.
pub trait IntoNative<Marker> {
    fn into_native(self) -> Box<NativeFn>;
}

macro_rules! impl_into_native {
    ($count:literal; $($arg:ident $val:ident),*) => {
        impl<Func, Ret, $($arg,)*> IntoNative<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Ret + 'static,
            Ret: IntoResults + 'static,
            $($arg: FromValue + 'static,)*
        {
            #[allow(unused_mut, unused_variables, reason = "the zero-argument case reads nothing")]
            fn into_native(self) -> Box<NativeFn> {
                Box::new(
                    move |_: &mut CallContext<'_>, mut args: MultiValue| -> Result<MultiValue, HostError> {
                        if args.len() != $count {
                            return Err(HostError::Arity {
                                expected: $count,
                                got: args.len(),
                            });
                        }
                        let mut position = 0;
                        $(
                            position += 1;
                            let $val = $arg::from_value(args.take(position - 1))
                                .map_err(|source| HostError::Argument { position, source })?;
                        )*
                        (self)($($val),*).into_results()
                    },
                )
            }
        }
    };
}

impl_into_native!(0;);
impl_into_native!(1; A1 a1);
impl_into_native!(2; A1 a1, A2 a2);
impl_into_native!(3; A1 a1, A2 a2, A3 a3);
impl_into_native!(4; A1 a1, A2 a2, A3 a3, A4 a4);
impl_into_native!(5; A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_into_native!(6; A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_into_native!(7; A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);
impl_into_native!(8; A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8);

#[cfg(test)]
mod tests;

//! Argument and result lists.

use std::ops::{Deref, DerefMut};

use smallvec::SmallVec;

use crate::Value;

/// Ordered values passed to or returned from a call.
///
/// Most calls carry a handful of values, so they stay inline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiValue(SmallVec<[Value; 4]>);

impl MultiValue {
    #[inline]
    pub fn new() -> Self {
        MultiValue(SmallVec::new())
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        MultiValue(SmallVec::with_capacity(capacity))
    }

    #[inline]
    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    /// Take the value at `index`, leaving `Nil` behind.
    ///
    /// Missing positions read as `Nil`, like absent script arguments.
    pub fn take(&mut self, index: usize) -> Value {
        self.0.get_mut(index).map(std::mem::take).unwrap_or_default()
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0.into_vec()
    }
}

impl Deref for MultiValue {
    type Target = [Value];

    #[inline]
    fn deref(&self) -> &[Value] {
        &self.0
    }
}

impl DerefMut for MultiValue {
    #[inline]
    fn deref_mut(&mut self) -> &mut [Value] {
        &mut self.0
    }
}

impl FromIterator<Value> for MultiValue {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        MultiValue(iter.into_iter().collect())
    }
}

impl IntoIterator for MultiValue {
    type Item = Value;
    type IntoIter = smallvec::IntoIter<[Value; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a MultiValue {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Value>> for MultiValue {
    fn from(values: Vec<Value>) -> Self {
        MultiValue(SmallVec::from_vec(values))
    }
}

impl<const N: usize> From<[Value; N]> for MultiValue {
    fn from(values: [Value; N]) -> Self {
        values.into_iter().collect()
    }
}

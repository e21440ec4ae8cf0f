//! Namespace Resolver: dotted paths such as `foo.bar.baz`.
//!
//! Registration walks from the global table, creating each absent
//! intermediate table and refusing to replace an existing non-table value.
//! The terminal segment is never created here; the caller assigns into it
//! through the returned [`Slot`].
//!
//! Lookups use raw table access so metatables on user tables cannot
//! redirect where a registration lands.

use std::fmt;
use std::str::FromStr;

use crate::errors::{Error, NamespaceError};
use crate::stack::{StackAdapter, StackGuard, ValueType};

/// A validated, non-empty dotted path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NamespacePath {
    raw: String,
    segments: Vec<String>,
}

impl NamespacePath {
    pub fn parse(path: &str) -> Result<Self, NamespaceError> {
        let invalid = |reason| NamespaceError::InvalidPath {
            path: path.to_string(),
            reason,
        };
        if path.is_empty() {
            return Err(invalid("path is empty"));
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(invalid("empty segment"));
        }
        Ok(NamespacePath {
            raw: path.to_string(),
            segments,
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// All segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// The key assigned by a registration.
    pub fn terminal(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Segments that must resolve to tables.
    pub fn parents(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// The path up to and including segment `depth`.
    fn prefix(&self, depth: usize) -> String {
        self.segments[..=depth].join(".")
    }
}

impl FromStr for NamespacePath {
    type Err = NamespaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NamespacePath::parse(s)
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The resolved parent table of a path, left on the stack.
///
/// Dropping a slot without assigning restores the stack untouched.
pub struct Slot {
    stack: StackAdapter,
    key: String,
    _guard: StackGuard,
}

impl Slot {
    /// Pop the value the caller pushed and store it as `parent[key]`.
    pub fn assign(self) {
        self.stack.raw_set_field(-2, &self.key);
    }
}

/// Walk `path` for registration, creating absent intermediate tables.
///
/// A collision is only possible before the first creation (a fresh table
/// has no entries), so a failed resolve never leaves partial structure.
pub fn resolve(path: NamespacePath, stack: StackAdapter) -> Result<Slot, Error> {
    let guard = StackGuard::new(stack);
    // one slot per level plus the value the caller pushes
    stack.ensure_capacity(path.segments.len() + 2)?;
    stack.push_globals();

    for (depth, segment) in path.parents().iter().enumerate() {
        match stack.raw_get_field(-1, segment) {
            ValueType::Table => {}
            ValueType::Nil | ValueType::None => {
                stack.pop(1);
                stack.new_table(0, 1);
                stack.push_copy(-1);
                stack.raw_set_field(-3, segment);
            }
            found => {
                return Err(NamespaceError::NotANamespace {
                    path: path.prefix(depth),
                    found: found.name(),
                }
                .into());
            }
        }
    }

    let NamespacePath { mut segments, .. } = path;
    let key = segments.pop().unwrap_or_default();
    Ok(Slot {
        stack,
        key,
        _guard: guard,
    })
}

/// Push the value bound at `path` without creating anything.
///
/// An absent terminal pushes `nil`; an absent intermediate is `NotFound`.
/// The caller owns the stack cleanup.
pub fn lookup(path: &NamespacePath, stack: StackAdapter) -> Result<ValueType, Error> {
    stack.ensure_capacity(path.segments.len() + 1)?;
    stack.push_globals();
    for (depth, segment) in path.parents().iter().enumerate() {
        match stack.raw_get_field(-1, segment) {
            ValueType::Table => {}
            ValueType::Nil | ValueType::None => {
                return Err(NamespaceError::NotFound {
                    path: path.prefix(depth),
                }
                .into());
            }
            found => {
                return Err(NamespaceError::NotANamespace {
                    path: path.prefix(depth),
                    found: found.name(),
                }
                .into());
            }
        }
    }
    Ok(stack.raw_get_field(-1, path.terminal()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests unwrap known-good paths")]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        let path = NamespacePath::parse("foo.bar.baz").unwrap();
        assert_eq!(path.segments().collect::<Vec<_>>(), ["foo", "bar", "baz"]);
        assert_eq!(path.terminal(), "baz");
        assert_eq!(path.parents(), ["foo", "bar"]);
        assert_eq!(path.prefix(1), "foo.bar");
        assert_eq!(path.to_string(), "foo.bar.baz");
    }

    #[test]
    fn test_parse_single_segment() {
        let path: NamespacePath = "print".parse().unwrap();
        assert_eq!(path.terminal(), "print");
        assert!(path.parents().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", ".", "a.", ".a", "a..b"] {
            assert!(
                matches!(
                    NamespacePath::parse(bad),
                    Err(NamespaceError::InvalidPath { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }
}

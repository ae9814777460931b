//! Small formatting helpers shared across the chain types.

use std::fmt;

/// Wraps a [`fmt::Display`] value so it can be used where [`fmt::Debug`] is
/// expected, e.g. inside `f.debug_struct(..).field(..)` calls.
pub struct DisplayToDebug<T>(pub T);

impl<T: fmt::Display> fmt::Debug for DisplayToDebug<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

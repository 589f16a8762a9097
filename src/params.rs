//! Argument conversion for legacy (context-less) driver paths.

use crate::driver::{NamedValue, Value};
use crate::error::{Error, Result};

/// Convert named arguments into positional values, keeping their order.
///
/// Legacy driver methods only take positional values, so any argument that
/// carries a non-empty name is rejected with
/// [`Error::NamedParametersUnsupported`].
pub fn named_values_to_values(named: &[NamedValue]) -> Result<Vec<Value>> {
    named
        .iter()
        .map(|param| {
            if param.is_named() {
                Err(Error::NamedParametersUnsupported)
            } else {
                Ok(param.value.clone())
            }
        })
        .collect()
}

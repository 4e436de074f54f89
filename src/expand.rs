//! Line-level `$name` expansion.

use crate::env::Environment;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static VAR_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z0-9_]+)").expect("variable reference pattern"));

/// Replace every `$name` in `line` with the stored value of `name`.
///
/// Undefined names expand to the empty string. A `$` that is not followed by an
/// identifier character is left alone. Substituted text is never scanned again,
/// so a value containing `$other` is inserted literally.
pub fn expand_variables(line: &str, env: &Environment) -> String {
    VAR_REF
        .replace_all(line, |caps: &Captures| {
            env.get_var(&caps[1]).unwrap_or_default().to_string()
        })
        .into_owned()
}

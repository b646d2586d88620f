//! Environment variable interpolation for config files.
//!
//! Supported forms:
//! - `$VAR` or `${VAR}`: the variable's value, an error if it is unset
//! - `${VAR:-default}`: `default` when VAR is unset or empty
//! - `${VAR-default}`: `default` only when VAR is unset
//! - `$$`: a literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?P<escape>\$\$)
        |
        \$\{
            (?P<braced>[A-Za-z_][A-Za-z0-9_]*)
            (?: (?P<op>:?-) (?P<default>[^}]*) )?
        \}
        |
        \$(?P<bare>[A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("interpolation pattern must compile")
});

/// Outcome of interpolating one config document.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The text with every resolvable reference substituted.
    pub text: String,
    /// One message per unresolved reference, in document order.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Substitute environment variable references in `input`.
///
/// Unresolved references are left in place and reported together so that a
/// single run shows every missing variable.
pub fn interpolate(input: &str) -> InterpolationResult {
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| {
            if caps.name("escape").is_some() {
                return "$".to_string();
            }
            match resolve(caps) {
                Ok(value) => value,
                Err(message) => {
                    errors.push(message);
                    caps[0].to_string()
                }
            }
        })
        .into_owned();

    InterpolationResult { text, errors }
}

fn resolve(caps: &Captures) -> Result<String, String> {
    let name = caps
        .name("braced")
        .or_else(|| caps.name("bare"))
        .map_or("", |m| m.as_str());
    let default = caps.name("default").map(|m| m.as_str());
    let empty_uses_default = caps.name("op").is_some_and(|op| op.as_str() == ":-");

    match env::var(name) {
        Ok(value) if value.contains(['\n', '\r']) => Err(format!(
            "environment variable '{name}' contains newlines, which is not allowed"
        )),
        Ok(value) if value.is_empty() && empty_uses_default => {
            Ok(default.unwrap_or_default().to_string())
        }
        Ok(value) => Ok(value),
        Err(_) => default
            .map(str::to_string)
            .ok_or_else(|| format!("environment variable '{name}' is not set")),
    }
}

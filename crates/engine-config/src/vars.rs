//! `${VAR}` interpolation for configuration text.
//!
//! - `${VAR}` substitutes the variable, failing when it is unset.
//! - `${VAR:-default}` falls back when the variable is unset or empty.
//! - `$$` is a literal `$`.
//!
//! Bare `$VAR` is left alone so connection strings with `$` in passwords
//! survive untouched.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$
        |
        \$\{
            ([A-Za-z_][A-Za-z0-9_]*)
            (?: :- ([^}]*) )?
        \}
        ",
    )
    .expect("Invalid regex pattern")
});

/// Interpolated text plus every variable that could not be resolved.
#[derive(Debug)]
pub struct Interpolated {
    pub text: String,
    pub errors: Vec<String>,
}

pub fn interpolate(input: &str) -> Interpolated {
    interpolate_with(input, |name| std::env::var(name).ok())
}

pub fn interpolate_with<F>(input: &str, lookup: F) -> Interpolated
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| {
            let full = &caps[0];
            if full == "$$" {
                return "$".to_string();
            }

            let name = &caps[1];
            let default = caps.get(2).map(|m| m.as_str());

            match (lookup(name), default) {
                (Some(value), _) if value.contains('\n') || value.contains('\r') => {
                    errors.push(format!("environment variable '{name}' contains a newline"));
                    full.to_string()
                }
                (Some(value), Some(default)) if value.is_empty() => default.to_string(),
                (Some(value), _) => value,
                (None, Some(default)) => default.to_string(),
                (None, None) => {
                    errors.push(format!("environment variable '{name}' is not set"));
                    full.to_string()
                }
            }
        })
        .into_owned();

    Interpolated { text, errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "PG_URL" => Some("postgres://u:p@db/app".into()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_braced_variables() {
        let out = interpolate_with("target: ${PG_URL}", env);
        assert!(out.errors.is_empty());
        assert_eq!(out.text, "target: postgres://u:p@db/app");
    }

    #[test]
    fn applies_defaults_and_escapes() {
        let out = interpolate_with("a: ${NOPE:-x} b: ${EMPTY:-y} c: $$HOME d: $PWD", env);
        assert!(out.errors.is_empty());
        assert_eq!(out.text, "a: x b: y c: $HOME d: $PWD");
    }

    #[test]
    fn collects_every_missing_variable() {
        let out = interpolate_with("${A} ${B}", env);
        assert_eq!(out.errors.len(), 2);
        assert_eq!(out.text, "${A} ${B}");
    }
}

//! String-keyed model configuration.
//!
//! Every classifier is configured from a [`ModelParam`] map, e.g.
//! `{"k": "5", "model_type": "kdtree"}`. Unknown keys are ignored and numeric
//! values are read permissively: the leading integer prefix is used and
//! anything unparsable falls back to the default with a warning.

use std::collections::HashMap;
use std::str::FromStr;

pub type ModelParam = HashMap<String, String>;

/// Builds a [`ModelParam`] from literal pairs.
pub fn params<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> ModelParam {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Reads an integer option, accepting inputs such as `" 5"` or `"5th"`.
pub fn integer_or<T: FromStr>(params: &ModelParam, key: &str, default: T) -> T {
    let Some(raw) = params.get(key) else {
        return default;
    };
    let trimmed = raw.trim_start();
    let sign_len = usize::from(trimmed.starts_with(['+', '-']));
    let digits = trimmed[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    match trimmed[..sign_len + digits].parse() {
        Ok(value) => value,
        Err(_) => {
            log::warn!("ignoring unusable value `{raw}` for `{key}`");
            default
        }
    }
}

/// Reads a floating-point option; unparsable input falls back to `default`.
pub fn float_or(params: &ModelParam, key: &str, default: f64) -> f64 {
    match params.get(key).map(|raw| raw.trim().parse::<f64>()) {
        None => default,
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            log::warn!("ignoring unusable value for `{key}`");
            default
        }
    }
}

/// True when the option is present and equal to `"true"`.
pub fn flag(params: &ModelParam, key: &str) -> bool {
    params.get(key).is_some_and(|v| v == "true")
}

pub fn text<'a>(params: &'a ModelParam, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}

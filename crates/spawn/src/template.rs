// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstrap prompt placeholder substitution.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Matches `{{NAME}}` placeholders.
#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Z_][A-Z0-9_]*)\}\}").expect("constant regex pattern is valid"));

/// Substitute `{{NAME}}` placeholders with values from `vars`. Unknown
/// placeholders are left as-is so a template authoring error is visible
/// in the rendered prompt rather than silently dropped.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| match vars.get(&caps[1]) {
            Some(val) => val.clone(),
            None => caps[0].to_string(),
        })
        .to_string()
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;

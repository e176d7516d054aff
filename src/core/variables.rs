//! Run-wide variable environment and `{{name}}` interpolation

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Mutable name → value mapping shared across a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing any earlier value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Layer another mapping on top; its entries win
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    /// Replace `{{KEY}}`, `{{ KEY }}`, `{{.KEY}}` and `{{ .KEY }}` placeholders.
    ///
    /// Placeholders naming unknown variables are left as written.
    pub fn interpolate(&self, template: &str) -> String {
        if template.is_empty() || !template.contains("{{") {
            return template.to_string();
        }

        let mut rendered = template.to_string();
        for (key, value) in &self.values {
            for placeholder in [
                format!("{{{{{}}}}}", key),
                format!("{{{{ {} }}}}", key),
                format!("{{{{.{}}}}}", key),
                format!("{{{{ .{} }}}}", key),
            ] {
                rendered = rendered.replace(&placeholder, value);
            }
        }
        rendered
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Variables::new();
        vars.extend(iter);
        vars
    }
}

/// Parse `KEY=value` lines from a `.env` file
pub fn parse_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read env file {}", path.display()))?;
    Ok(parse_env(&content))
}

/// Parse `.env` content.
///
/// Blank lines, `#` comments and lines without `=` are skipped. Keys and
/// values are trimmed and surrounding double quotes removed from values.
pub fn parse_env(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                &value[1..value.len() - 1]
            } else {
                value
            };
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Parse a `--var key=val` argument
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("invalid --var value: {} (expected key=val)", s)),
    }
}

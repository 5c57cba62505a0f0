// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Environment variable configuration provider.
//!
//! Variables are mapped into the key space rooted at the lowercased prefix:
//! `APITOOLKIT_DEBUG` becomes `apitoolkit.debug` and a double underscore
//! descends one level, so `APITOOLKIT_LOGGING__LEVEL` becomes
//! `apitoolkit.logging.level`.  Single underscores stay part of the field
//! name (`APITOOLKIT_REDACT_HEADERS` → `apitoolkit.redact_headers`).

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::env;

use super::{ConfigError, ConfigProvider};

/// Default variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "APITOOLKIT_";

/// Configuration provider that reads prefixed environment variables.
#[derive(Debug)]
pub struct EnvConfigProvider {
    prefix: String,
    /// Key the variables are mapped under.
    root: String,
    /// Dot-separated key → raw variable value.
    cache: BTreeMap<String, String>,
}

impl EnvConfigProvider {
    /// Create a provider for variables starting with `prefix`.
    pub fn new(prefix: &str) -> Self {
        Self::with_root(prefix, &prefix.trim_end_matches('_').to_lowercase())
    }

    /// Create a provider for variables starting with `prefix`, mapped under
    /// `root` instead of the lowercased prefix.
    pub fn with_root(prefix: &str, root: &str) -> Self {
        let mut provider = Self {
            prefix: prefix.to_string(),
            root: root.to_string(),
            cache: BTreeMap::new(),
        };
        provider.refresh_cache();
        provider
    }

    /// Re-read the process environment.
    pub fn refresh_cache(&mut self) {
        let vars: Vec<(String, String)> = env::vars().collect();
        self.load(vars);
    }

    fn load<I: IntoIterator<Item = (String, String)>>(&mut self, vars: I) {
        self.cache.clear();
        let root = self.root.clone();

        for (name, value) in vars {
            let Some(rest) = name.strip_prefix(&self.prefix) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let path = rest.to_lowercase().replace("__", ".");
            let key = if root.is_empty() {
                path
            } else {
                format!("{root}.{path}")
            };
            self.cache.insert(key, value);
        }
    }

    /// Interpret a raw variable as JSON, then bool, number, and finally string.
    fn parse_value(value: &str) -> Value {
        if let Ok(parsed) = serde_json::from_str::<Value>(value) {
            return parsed;
        }
        if value.eq_ignore_ascii_case("true") {
            return json!(true);
        }
        if value.eq_ignore_ascii_case("false") {
            return json!(false);
        }
        if let Ok(int_val) = value.parse::<i64>() {
            return json!(int_val);
        }
        if let Ok(float_val) = value.parse::<f64>() {
            return json!(float_val);
        }
        // Comma separated lists are the common way to pass redaction rules.
        if value.contains(',') {
            return Value::Array(
                value
                    .split(',')
                    .map(|s| Value::String(s.trim().to_string()))
                    .collect(),
            );
        }
        json!(value)
    }

    /// Assemble a nested object from every cached key below `key`.
    fn subtree(&self, key: &str) -> Option<Value> {
        let prefix = format!("{key}.");
        let mut root = Map::new();
        let mut found = false;

        'vars: for (full, raw) in self.cache.range(prefix.clone()..) {
            let Some(rest) = full.strip_prefix(&prefix) else {
                break;
            };
            found = true;
            let mut parts: Vec<&str> = rest.split('.').collect();
            let Some(leaf) = parts.pop() else { continue };

            let mut cursor = &mut root;
            for part in parts {
                let entry = cursor
                    .entry(part.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
                match entry.as_object_mut() {
                    Some(next) => cursor = next,
                    None => continue 'vars,
                }
            }
            cursor.insert(leaf.to_string(), Self::parse_value(raw));
        }

        found.then_some(Value::Object(root))
    }
}

impl Default for EnvConfigProvider {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_PREFIX)
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.cache.contains_key(key) || self.subtree(key).is_some()
    }

    fn provider_name(&self) -> &str {
        "env"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        match self.cache.get(key) {
            Some(raw) => Ok(Some(Self::parse_value(raw))),
            None => Ok(self.subtree(key)),
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Route templates, used to report `url_path` as a template and to extract
//! path parameters.
//!
//! | syntax       | example                | matches            |
//! |--------------|------------------------|--------------------|
//! | `{name}`     | `/users/{id}`          | `/users/42`        |
//! | `:name`      | `/users/:id/posts`     | `/users/42/posts`  |
//! | `*`          | `/static/*`            | `/static/css/a.css`|
//!
//! A [`RouteSet`] is ordered: the first template that matches wins.


use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::SdkError;

/// Errors raised while compiling a template.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("invalid route template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },
}

impl From<RouteError> for SdkError {
    fn from(err: RouteError) -> Self {
        SdkError::Other(err.to_string())
    }
}

/// A compiled route template.
#[derive(Debug, Clone)]
pub struct RouteTemplate {
    template: String,
    regex: Regex,
    params: Vec<String>,
}

impl RouteTemplate {
    pub fn new(template: &str) -> Result<Self, RouteError> {
        let (pattern, params) = Self::pattern_to_regex(template)?;
        let regex = Regex::new(&pattern).map_err(|e| RouteError::InvalidTemplate {
            template: template.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            template: template.to_string(),
            regex,
            params,
        })
    }

    /// The template as written.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Convert a template to an anchored regex, collecting parameter names
    /// in capture order.
    fn pattern_to_regex(template: &str) -> Result<(String, Vec<String>), RouteError> {
        let invalid = |reason: &str| RouteError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut regex_pattern = "^".to_string();
        let mut params = Vec::new();

        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                ':' => {
                    let mut name = String::new();
                    while let Some(&next) = chars.peek() {
                        if next.is_alphanumeric() || next == '_' {
                            name.push(next);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if name.is_empty() {
                        return Err(invalid("':' must be followed by a parameter name"));
                    }
                    params.push(name);
                    regex_pattern.push_str("([^/]+)");
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for next in chars.by_ref() {
                        if next == '}' {
                            closed = true;
                            break;
                        }
                        name.push(next);
                    }
                    if !closed {
                        return Err(invalid("unclosed '{'"));
                    }
                    if name.is_empty() || name.contains('/') {
                        return Err(invalid("empty or malformed parameter name"));
                    }
                    params.push(name);
                    regex_pattern.push_str("([^/]+)");
                }
                '*' => regex_pattern.push_str(".*"),
                '.' | '^' | '$' | '|' | '+' | '?' | '(' | ')' | '[' | ']' | '}' | '\\' => {
                    regex_pattern.push('\\');
                    regex_pattern.push(c);
                }
                _ => regex_pattern.push(c),
            }
        }

        regex_pattern.push('$');
        Ok((regex_pattern, params))
    }

    /// Path parameters if `path` (without query) matches.
    pub fn match_path(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let captures = self.regex.captures(path)?;
        Some(
            self.params
                .iter()
                .zip(captures.iter().skip(1))
                .filter_map(|(name, value)| {
                    let raw = value?.as_str();
                    let decoded = urlencoding::decode(raw)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| raw.to_string());
                    Some((name.clone(), decoded))
                })
                .collect(),
        )
    }
}

/// The result of matching a path against a [`RouteSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub template: String,
    pub params: BTreeMap<String, String>,
}

/// Ordered collection of templates.
#[derive(Debug, Clone, Default)]
pub struct RouteSet {
    routes: Vec<RouteTemplate>,
}

impl RouteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and append a template.
    pub fn add(&mut self, template: &str) -> Result<(), RouteError> {
        self.routes.push(RouteTemplate::new(template)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The first template matching `path`.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch> {
        self.routes.iter().find_map(|route| {
            route.match_path(path).map(|params| RouteMatch {
                template: route.template.clone(),
                params,
            })
        })
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The JSON path dialect used by redaction rules.
//!
//! Supported forms:
//!
//! * `$`, `$.a.b`, `$['a']`, `$["a b"]` and recursive descent `$..a`
//! * indices `$.a[0]`, `$.a[-1]` and wildcards `$.a[*]`, `$.a.*`
//! * slices `$.a[1:3]`, `$.a[::2]`, `$.a[-2:]`
//! * unions `$.a[0,2]`, `$['x','y']`, `$.a[0,2:4]`
//! * filters `$.a[?(@.kind=='card')]` with `==`, `!=`, `<`, `<=`, `>`,
//!   `>=`, `=~ /regex/i`, existence `@.b`, `!`, `&&`, `||` and grouping
//!
//! A path without the leading `$` is read relative to the root (`a.b` is
//! `$.a.b`).  Filters only see the current node (`@`); `$` is rejected
//! inside a filter.

use regex::Regex;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

/// Errors produced while parsing a path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("unexpected '{found}' at offset {offset}")]
    Unexpected { found: char, offset: usize },

    #[error("unexpected end of path")]
    UnexpectedEnd,

    #[error("invalid array index '{0}'")]
    InvalidIndex(String),

    #[error("invalid filter literal '{0}'")]
    InvalidLiteral(String),

    #[error("invalid filter regex: {0}")]
    InvalidRegex(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    Key(String),
    Index(i64),
    Wildcard,
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    /// Comma separated keys, indices and slices.
    Union(Vec<Selector>),
    Filter(Box<Filter>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    /// `..` before the selector: match at any depth.
    recursive: bool,
    selector: Selector,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    Exists(Vec<Step>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Matches {
        subject: Vec<Step>,
        pattern: Pattern,
    },
    Not(Box<Filter>),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    /// Relative to `@`.
    Current(Vec<Step>),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Compiled regex, compared by source.
#[derive(Debug, Clone)]
struct Pattern(Regex);

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for Pattern {}

/// A parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    steps: Vec<Step>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(PathError::Empty);
        }

        let mut parser = Parser {
            chars: path.char_indices().peekable(),
        };
        let steps = parser.parse(path)?;
        Ok(Self { steps })
    }

    /// Replace every matched location with `replacement`.  Returns the
    /// number of replacements made.
    pub fn replace(&self, root: &mut Value, replacement: &Value) -> usize {
        replace_at(root, &self.steps, replacement)
    }
}

struct Parser<'a> {
    chars: Peekable<CharIndices<'a>>,
}

impl Parser<'_> {
    fn parse(&mut self, path: &str) -> Result<Vec<Step>, PathError> {
        let mut steps = Vec::new();

        match self.chars.peek() {
            Some((_, '$')) => {
                self.chars.next();
            }
            Some((_, '.')) | Some((_, '[')) => {}
            // Bare `a.b` is relative to the root.
            Some(_) => steps.push(Step {
                recursive: false,
                selector: self.name(false)?,
            }),
            None => return Err(PathError::Empty),
        }

        steps.extend(self.steps(false)?);

        if steps.is_empty() && path != "$" {
            return Err(PathError::Empty);
        }
        Ok(steps)
    }

    /// Consecutive `.name`, `..name` and `[...]` steps.  Inside a filter
    /// (`nested`) the first other character ends the path.
    fn steps(&mut self, nested: bool) -> Result<Vec<Step>, PathError> {
        let mut steps = Vec::new();

        while let Some(&(offset, c)) = self.chars.peek() {
            match c {
                '.' => {
                    self.chars.next();
                    let recursive = matches!(self.chars.peek(), Some((_, '.')));
                    if recursive {
                        self.chars.next();
                    }
                    let selector = match self.chars.peek() {
                        Some((_, '[')) if recursive => {
                            self.chars.next();
                            self.bracket()?
                        }
                        Some(_) => self.name(nested)?,
                        None => return Err(PathError::UnexpectedEnd),
                    };
                    steps.push(Step { recursive, selector });
                }
                '[' => {
                    self.chars.next();
                    steps.push(Step {
                        recursive: false,
                        selector: self.bracket()?,
                    });
                }
                _ if nested => break,
                found => return Err(PathError::Unexpected { found, offset }),
            }
        }
        Ok(steps)
    }

    /// A dotted name, or `*`.
    fn name(&mut self, nested: bool) -> Result<Selector, PathError> {
        let mut name = String::new();
        while let Some(&(offset, c)) = self.chars.peek() {
            match c {
                '.' | '[' => break,
                c if nested && (c.is_whitespace() || "=!<>&|)],".contains(c)) => break,
                ']' | '\'' | '"' => return Err(PathError::Unexpected { found: c, offset }),
                _ => {
                    name.push(c);
                    self.chars.next();
                }
            }
        }
        match name.as_str() {
            "" => match self.chars.peek() {
                Some(&(offset, found)) => Err(PathError::Unexpected { found, offset }),
                None => Err(PathError::UnexpectedEnd),
            },
            "*" => Ok(Selector::Wildcard),
            _ => Ok(Selector::Key(name)),
        }
    }

    /// The inside of `[...]`; the opening bracket is already consumed.
    fn bracket(&mut self) -> Result<Selector, PathError> {
        self.skip_spaces();
        let selector = match self.chars.peek() {
            Some((_, '*')) => {
                self.chars.next();
                Selector::Wildcard
            }
            Some((_, '?')) => {
                self.chars.next();
                Selector::Filter(Box::new(self.or()?))
            }
            Some(_) => {
                let mut members = vec![self.union_member()?];
                loop {
                    self.skip_spaces();
                    if !matches!(self.chars.peek(), Some((_, ','))) {
                        break;
                    }
                    self.chars.next();
                    members.push(self.union_member()?);
                }
                if members.len() == 1 {
                    members.remove(0)
                } else {
                    Selector::Union(members)
                }
            }
            None => return Err(PathError::UnexpectedEnd),
        };
        self.expect(']')?;
        Ok(selector)
    }

    /// A quoted key, an index or a slice.
    fn union_member(&mut self) -> Result<Selector, PathError> {
        self.skip_spaces();
        if let Some(&(_, quote @ ('\'' | '"'))) = self.chars.peek() {
            self.chars.next();
            return Ok(Selector::Key(self.quoted(quote)?));
        }

        let start = self.integer()?;
        self.skip_spaces();
        if !matches!(self.chars.peek(), Some((_, ':'))) {
            return match start {
                Some(index) => Ok(Selector::Index(index)),
                None => match self.chars.peek() {
                    Some(&(offset, found)) => Err(PathError::Unexpected { found, offset }),
                    None => Err(PathError::UnexpectedEnd),
                },
            };
        }

        self.chars.next();
        self.skip_spaces();
        let end = self.integer()?;
        self.skip_spaces();
        let step = if matches!(self.chars.peek(), Some((_, ':'))) {
            self.chars.next();
            self.skip_spaces();
            self.integer()?
        } else {
            None
        };
        Ok(Selector::Slice { start, end, step })
    }

    /// An optional signed integer.
    fn integer(&mut self) -> Result<Option<i64>, PathError> {
        let mut digits = String::new();
        if matches!(self.chars.peek(), Some((_, '-'))) {
            self.chars.next();
            digits.push('-');
        }
        while let Some(&(_, d)) = self.chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            digits.push(d);
            self.chars.next();
        }
        match digits.as_str() {
            "" => Ok(None),
            _ => digits
                .parse::<i64>()
                .map(Some)
                .map_err(|_| PathError::InvalidIndex(digits.clone())),
        }
    }

    fn or(&mut self) -> Result<Filter, PathError> {
        let mut left = self.and()?;
        loop {
            self.skip_spaces();
            if !matches!(self.chars.peek(), Some((_, '|'))) {
                return Ok(left);
            }
            self.chars.next();
            self.expect('|')?;
            left = Filter::Or(Box::new(left), Box::new(self.and()?));
        }
    }

    fn and(&mut self) -> Result<Filter, PathError> {
        let mut left = self.unary()?;
        loop {
            self.skip_spaces();
            if !matches!(self.chars.peek(), Some((_, '&'))) {
                return Ok(left);
            }
            self.chars.next();
            self.expect('&')?;
            left = Filter::And(Box::new(left), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Filter, PathError> {
        self.skip_spaces();
        match self.chars.peek() {
            Some((_, '!')) => {
                self.chars.next();
                Ok(Filter::Not(Box::new(self.unary()?)))
            }
            Some((_, '(')) => {
                self.chars.next();
                let inner = self.or()?;
                self.expect(')')?;
                Ok(inner)
            }
            _ => self.comparison(),
        }
    }

    fn comparison(&mut self) -> Result<Filter, PathError> {
        let left = self.operand()?;
        self.skip_spaces();

        let op = match self.chars.peek().map(|&(_, c)| c) {
            Some('=') => {
                self.chars.next();
                match self.chars.next() {
                    Some((_, '=')) => CompareOp::Eq,
                    Some((_, '~')) => return self.regex_match(left),
                    Some((offset, found)) => return Err(PathError::Unexpected { found, offset }),
                    None => return Err(PathError::UnexpectedEnd),
                }
            }
            Some('!') => {
                self.chars.next();
                self.expect('=')?;
                CompareOp::Ne
            }
            Some(c @ ('<' | '>')) => {
                self.chars.next();
                let or_equal = matches!(self.chars.peek(), Some((_, '=')));
                if or_equal {
                    self.chars.next();
                }
                match (c, or_equal) {
                    ('<', false) => CompareOp::Lt,
                    ('<', true) => CompareOp::Le,
                    (_, false) => CompareOp::Gt,
                    (_, true) => CompareOp::Ge,
                }
            }
            _ => {
                return match left {
                    Operand::Current(steps) => Ok(Filter::Exists(steps)),
                    Operand::Literal(value) => Err(PathError::InvalidLiteral(value.to_string())),
                };
            }
        };

        let right = self.operand()?;
        Ok(Filter::Compare { left, op, right })
    }

    fn regex_match(&mut self, left: Operand) -> Result<Filter, PathError> {
        let Operand::Current(subject) = left else {
            return Err(PathError::InvalidRegex("left side of =~ must be a path".to_string()));
        };
        self.skip_spaces();
        match self.chars.next() {
            Some((_, '/')) => {}
            Some((offset, found)) => return Err(PathError::Unexpected { found, offset }),
            None => return Err(PathError::UnexpectedEnd),
        }

        let mut source = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, '/')) => source.push('/'),
                    Some((_, c)) => {
                        source.push('\\');
                        source.push(c);
                    }
                    None => return Err(PathError::UnexpectedEnd),
                },
                Some((_, '/')) => break,
                Some((_, c)) => source.push(c),
                None => return Err(PathError::UnexpectedEnd),
            }
        }
        if matches!(self.chars.peek(), Some((_, 'i'))) {
            self.chars.next();
            source.insert_str(0, "(?i)");
        }

        let regex = Regex::new(&source).map_err(|e| PathError::InvalidRegex(e.to_string()))?;
        Ok(Filter::Matches {
            subject,
            pattern: Pattern(regex),
        })
    }

    fn operand(&mut self) -> Result<Operand, PathError> {
        self.skip_spaces();
        match self.chars.peek().copied() {
            Some((_, '@')) => {
                self.chars.next();
                Ok(Operand::Current(self.steps(true)?))
            }
            Some((_, quote @ ('\'' | '"'))) => {
                self.chars.next();
                Ok(Operand::Literal(Value::String(self.quoted(quote)?)))
            }
            Some((_, c)) if c == '-' || c.is_ascii_digit() => {
                let mut text = String::new();
                while let Some(&(_, d)) = self.chars.peek() {
                    if !(d.is_ascii_digit() || "+-.eE".contains(d)) {
                        break;
                    }
                    text.push(d);
                    self.chars.next();
                }
                text.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(|n| Operand::Literal(Value::Number(n)))
                    .ok_or(PathError::InvalidLiteral(text))
            }
            Some((_, c)) if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                while let Some(&(_, d)) = self.chars.peek() {
                    if !d.is_ascii_alphabetic() {
                        break;
                    }
                    word.push(d);
                    self.chars.next();
                }
                match word.as_str() {
                    "true" => Ok(Operand::Literal(Value::Bool(true))),
                    "false" => Ok(Operand::Literal(Value::Bool(false))),
                    "null" => Ok(Operand::Literal(Value::Null)),
                    _ => Err(PathError::InvalidLiteral(word)),
                }
            }
            Some((offset, found)) => Err(PathError::Unexpected { found, offset }),
            None => Err(PathError::UnexpectedEnd),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, PathError> {
        let mut key = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, escaped)) => key.push(escaped),
                    None => return Err(PathError::UnexpectedEnd),
                },
                Some((_, c)) if c == quote => return Ok(key),
                Some((_, c)) => key.push(c),
                None => return Err(PathError::UnexpectedEnd),
            }
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), PathError> {
        self.skip_spaces();
        match self.chars.next() {
            Some((_, c)) if c == wanted => Ok(()),
            Some((offset, found)) => Err(PathError::Unexpected { found, offset }),
            None => Err(PathError::UnexpectedEnd),
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.chars.peek(), Some((_, ' '))) {
            self.chars.next();
        }
    }
}

/// A child position inside an object or array.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Key(String),
    Index(usize),
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

/// Indices selected by `[start:end:step]`, with negative bounds counted
/// from the end.  A zero step selects nothing.
fn slice_indices(start: Option<i64>, end: Option<i64>, step: Option<i64>, len: usize) -> Vec<usize> {
    let Ok(len) = i64::try_from(len) else {
        return Vec::new();
    };
    let step = step.unwrap_or(1);
    let normalize = |bound: i64| if bound < 0 { bound + len } else { bound };

    let mut indices = Vec::new();
    if step > 0 {
        let mut i = start.map_or(0, normalize).clamp(0, len);
        let end = end.map_or(len, normalize).clamp(0, len);
        while i < end {
            indices.push(i as usize);
            i += step;
        }
    } else if step < 0 {
        let mut i = start.map_or(len - 1, normalize).clamp(-1, len - 1);
        let end = end.map_or(-1, normalize).clamp(-1, len - 1);
        while i > end {
            indices.push(i as usize);
            i += step;
        }
    }
    indices
}

/// Children of `node` picked by `selector`, in document order for
/// wildcards and selector order otherwise.  No slot appears twice.
fn slots(selector: &Selector, node: &Value) -> Vec<Slot> {
    let mut found = Vec::new();
    match (selector, node) {
        (Selector::Key(key), Value::Object(map)) if map.contains_key(key) => {
            found.push(Slot::Key(key.clone()));
        }
        (Selector::Index(index), Value::Array(items)) => {
            found.extend(resolve_index(*index, items.len()).map(Slot::Index));
        }
        (Selector::Wildcard, Value::Object(map)) => {
            found.extend(map.keys().cloned().map(Slot::Key));
        }
        (Selector::Wildcard, Value::Array(items)) => {
            found.extend((0..items.len()).map(Slot::Index));
        }
        (Selector::Slice { start, end, step }, Value::Array(items)) => {
            found.extend(
                slice_indices(*start, *end, *step, items.len())
                    .into_iter()
                    .map(Slot::Index),
            );
        }
        (Selector::Union(members), _) => {
            for member in members {
                for slot in slots(member, node) {
                    if !found.contains(&slot) {
                        found.push(slot);
                    }
                }
            }
        }
        (Selector::Filter(filter), Value::Object(map)) => {
            found.extend(
                map.iter()
                    .filter(|(_, child)| filter.matches(child))
                    .map(|(key, _)| Slot::Key(key.clone())),
            );
        }
        (Selector::Filter(filter), Value::Array(items)) => {
            found.extend(
                items
                    .iter()
                    .enumerate()
                    .filter(|(_, child)| filter.matches(child))
                    .map(|(i, _)| Slot::Index(i)),
            );
        }
        _ => {}
    }
    found
}

fn child<'v>(node: &'v Value, slot: &Slot) -> Option<&'v Value> {
    match (node, slot) {
        (Value::Object(map), Slot::Key(key)) => map.get(key),
        (Value::Array(items), Slot::Index(i)) => items.get(*i),
        _ => None,
    }
}

fn child_mut<'v>(node: &'v mut Value, slot: &Slot) -> Option<&'v mut Value> {
    match (node, slot) {
        (Value::Object(map), Slot::Key(key)) => map.get_mut(key),
        (Value::Array(items), Slot::Index(i)) => items.get_mut(*i),
        _ => None,
    }
}

fn descendants_mut(node: &mut Value) -> Vec<&mut Value> {
    match node {
        Value::Object(map) => map.values_mut().collect(),
        Value::Array(items) => items.iter_mut().collect(),
        _ => Vec::new(),
    }
}

fn replace_at(node: &mut Value, steps: &[Step], replacement: &Value) -> usize {
    let Some((step, rest)) = steps.split_first() else {
        *node = replacement.clone();
        return 1;
    };

    let mut count = 0;
    for slot in slots(&step.selector, node) {
        if let Some(target) = child_mut(node, &slot) {
            count += replace_at(target, rest, replacement);
        }
    }

    if step.recursive {
        // Keep descending with the same step; replaced subtrees are leaves now.
        count += descendants_mut(node)
            .into_iter()
            .map(|child| replace_at(child, steps, replacement))
            .sum::<usize>();
    }
    count
}

/// Read-only evaluation used by filters.
fn select<'v>(node: &'v Value, steps: &[Step], out: &mut Vec<&'v Value>) {
    let Some((step, rest)) = steps.split_first() else {
        out.push(node);
        return;
    };

    for slot in slots(&step.selector, node) {
        if let Some(target) = child(node, &slot) {
            select(target, rest, out);
        }
    }

    if step.recursive {
        match node {
            Value::Object(map) => map.values().for_each(|child| select(child, steps, out)),
            Value::Array(items) => items.iter().for_each(|child| select(child, steps, out)),
            _ => {}
        }
    }
}

fn first<'v>(node: &'v Value, steps: &[Step]) -> Option<&'v Value> {
    let mut out = Vec::new();
    select(node, steps, &mut out);
    out.into_iter().next()
}

impl Operand {
    fn resolve<'v>(&'v self, current: &'v Value) -> Option<&'v Value> {
        match self {
            Operand::Current(steps) => first(current, steps),
            Operand::Literal(value) => Some(value),
        }
    }
}

impl Filter {
    fn matches(&self, current: &Value) -> bool {
        match self {
            Filter::Exists(steps) => first(current, steps).is_some(),
            Filter::Compare { left, op, right } => {
                match (left.resolve(current), right.resolve(current)) {
                    (Some(l), Some(r)) => compare(*op, l, r),
                    _ => false,
                }
            }
            Filter::Matches { subject, pattern } => {
                matches!(first(current, subject), Some(Value::String(s)) if pattern.0.is_match(s))
            }
            Filter::Not(inner) => !inner.matches(current),
            Filter::And(a, b) => a.matches(current) && b.matches(current),
            Filter::Or(a, b) => a.matches(current) || b.matches(current),
        }
    }
}

/// Numbers compare numerically and strings lexically; other values only
/// support equality.
fn compare(op: CompareOp, left: &Value, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64().zip(r.as_f64()).and_then(|(l, r)| l.partial_cmp(&r)),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    };

    match (op, ordering) {
        (CompareOp::Eq, Some(ord)) => ord == Ordering::Equal,
        (CompareOp::Ne, Some(ord)) => ord != Ordering::Equal,
        (CompareOp::Eq, None) => left == right,
        (CompareOp::Ne, None) => left != right,
        (CompareOp::Lt, Some(ord)) => ord == Ordering::Less,
        (CompareOp::Le, Some(ord)) => ord != Ordering::Greater,
        (CompareOp::Gt, Some(ord)) => ord == Ordering::Greater,
        (CompareOp::Ge, Some(ord)) => ord != Ordering::Less,
        (_, None) => false,
    }
}

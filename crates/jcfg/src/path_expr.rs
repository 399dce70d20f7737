//! dotted key paths with optional list indices
//!
//! `model.weights[2].name` is parsed into the segments
//!
//! | **name**  | **indices** |
//! |-----------|-------------|
//! | `model`   | `[]`        |
//! | `weights` | `[2]`       |
//! | `name`    | `[]`        |
//!
//! Multiple indices (`grid[1][0]`) are applied left to right.
//!
//! ### Lookup strategy
//!
//! 1. Exact flattened key: the longest dotted prefix of the path that is a key of the
//!    [Namespace] wins. Only the last segment of that prefix may carry indices, because
//!    flattened keys never point into lists. The remainder of the path is walked from there.
//! 2. Stepwise descent through the nested document the namespace was built from. This is
//!    what makes references to whole objects (`$model$`) work.
use crate::namespace::Namespace;
use crate::value::{Map, Value};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Same word characters the substitution sigils accept
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpression {
    segments: Vec<Segment>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("invalid path expression `{0}`")]
    InvalidExpression(String),
    #[error("`{path}` not found")]
    PathNotFound { path: String },
    #[error("index {index} out of range for `{path}` (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },
    #[error("`{path}` is of type {kind} and cannot be indexed")]
    NotIndexable { path: String, kind: &'static str },
}

impl PathExpression {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Evaluate against a namespace, see module docs for the lookup order
    pub fn evaluate<'n>(&self, namespace: &'n Namespace) -> Result<&'n Value, EvalError> {
        if let Some(result) = self.evaluate_flat(namespace) {
            return result;
        }

        self.lookup(namespace.tree())
    }

    /// Stepwise descent through a nested document
    pub fn lookup<'v>(&self, root: &'v Map) -> Result<&'v Value, EvalError> {
        let first = &self.segments[0];
        let current = root.get(&first.name).ok_or_else(|| EvalError::PathNotFound {
            path: first.name.clone(),
        })?;
        let current = self.apply_indices(current, 0)?;

        self.descend(current, 1)
    }

    fn evaluate_flat<'n>(&self, namespace: &'n Namespace) -> Option<Result<&'n Value, EvalError>> {
        // a key can span segments only while none of them (but the last) is indexed
        let max_len = self
            .segments
            .iter()
            .position(|segment| !segment.indices.is_empty())
            .map_or(self.segments.len(), |pos| pos + 1);

        for len in (1..=max_len).rev() {
            let key = self.prefix(len);
            let Some(value) = namespace.get(&key) else {
                continue;
            };

            tracing::trace!(%key, "exact namespace match");
            return Some(
                self.apply_indices(value, len - 1)
                    .and_then(|value| self.descend(value, len)),
            );
        }

        None
    }

    /// Walk `segments[start..]` starting at `current`
    fn descend<'v>(&self, mut current: &'v Value, start: usize) -> Result<&'v Value, EvalError> {
        for (offset, segment) in self.segments[start..].iter().enumerate() {
            let position = start + offset;
            current = current
                .as_object()
                .and_then(|map| map.get(&segment.name))
                .ok_or_else(|| EvalError::PathNotFound {
                    path: self.prefix(position + 1),
                })?;
            current = self.apply_indices(current, position)?;
        }

        Ok(current)
    }

    fn apply_indices<'v>(&self, mut current: &'v Value, position: usize) -> Result<&'v Value, EvalError> {
        let segment = &self.segments[position];
        let mut path = self.prefix(position + 1);

        for &index in &segment.indices {
            let Value::Array(array) = current else {
                return Err(EvalError::NotIndexable {
                    path,
                    kind: current.kind(),
                });
            };

            current = array.get(index).ok_or_else(|| EvalError::IndexOutOfRange {
                path: path.clone(),
                index,
                len: array.len(),
            })?;
            path.push_str(&format!("[{index}]"));
        }

        Ok(current)
    }

    /// Dotted names of the first `len` segments, without indices
    fn prefix(&self, len: usize) -> String {
        self.segments[..len]
            .iter()
            .map(|segment| segment.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl FromStr for PathExpression {
    type Err = EvalError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let invalid = || EvalError::InvalidExpression(expr.to_string());

        let segments = expr
            .split('.')
            .map(|raw| parse_segment(raw).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments })
    }
}

fn parse_segment(raw: &str) -> Option<Segment> {
    let (name, mut rest) = match raw.find('[') {
        Some(pos) => raw.split_at(pos),
        None => (raw, ""),
    };

    if !NAME_PATTERN.is_match(name) {
        return None;
    }

    let mut indices = vec![];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indices.push(inner[..close].parse().ok()?);
        rest = &inner[close + 1..];
    }

    Some(Segment {
        name: name.to_string(),
        indices,
    })
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            if position > 0 {
                f.write_str(".")?;
            }
            f.write_str(&segment.name)?;
            for index in &segment.indices {
                write!(f, "[{index}]")?;
            }
        }
        Ok(())
    }
}

/// Parse and evaluate in one go
pub fn evaluate<'n>(expr: &str, namespace: &'n Namespace) -> Result<&'n Value, EvalError> {
    expr.parse::<PathExpression>()?.evaluate(namespace)
}

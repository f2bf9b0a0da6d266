//! Path pattern compilation and matching.
//!
//! # Syntax
//! - `literal` segments must match exactly (case-sensitive)
//! - `:name` matches any single non-empty segment and binds it to `name`
//! - `*` inside a segment matches any run of non-`/` characters
//!   (`*`, `*.json`, `img-*-small` are all valid segments)
//!
//! # Design Decisions
//! - Compiled once at registration; matching allocates only for captures
//! - No regex: segment-wise comparison keeps matching linear
//! - Segment counts must be equal, `*` never spans a `/`

use thiserror::Error;

/// Errors from compiling a path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern {0:?} must start with '/'")]
    MissingLeadingSlash(String),

    #[error("pattern {pattern:?} has an empty parameter name")]
    EmptyParamName { pattern: String },

    #[error("pattern {pattern:?} has an invalid parameter name {name:?}")]
    InvalidParamName { pattern: String, name: String },

    #[error("pattern {pattern:?} binds parameter {name:?} twice")]
    DuplicateParam { pattern: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    /// Literal pieces separated by `*`; first and last may be empty.
    Glob(Vec<String>),
}

impl Segment {
    fn matches(&self, text: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == text,
            Segment::Param(_) => !text.is_empty(),
            Segment::Glob(pieces) => glob_match(pieces, text),
        }
    }
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

impl PathPattern {
    /// Compile `pattern` into a matcher.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(PatternError::MissingLeadingSlash(pattern.to_string()));
        };

        let mut segments = Vec::new();
        let mut param_names: Vec<String> = Vec::new();

        for raw in rest.split('/') {
            if let Some(name) = raw.strip_prefix(':') {
                if name.is_empty() {
                    return Err(PatternError::EmptyParamName {
                        pattern: pattern.to_string(),
                    });
                }
                if !is_valid_param_name(name) {
                    return Err(PatternError::InvalidParamName {
                        pattern: pattern.to_string(),
                        name: name.to_string(),
                    });
                }
                if param_names.iter().any(|n| n == name) {
                    return Err(PatternError::DuplicateParam {
                        pattern: pattern.to_string(),
                        name: name.to_string(),
                    });
                }
                param_names.push(name.to_string());
                segments.push(Segment::Param(name.to_string()));
            } else if raw.contains('*') {
                segments.push(Segment::Glob(raw.split('*').map(str::to_string).collect()));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
            param_names,
        })
    }

    /// The pattern text as registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Declared parameter names, in declaration order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Match `path` fully. On success returns captured `(name, raw value)`
    /// pairs in declaration order.
    pub fn matches<'p>(&self, path: &'p str) -> Option<Vec<(&str, &'p str)>> {
        let rest = path.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let mut captures = Vec::with_capacity(self.param_names.len());

        for segment in &self.segments {
            let part = parts.next()?;
            if !segment.matches(part) {
                return None;
            }
            if let Segment::Param(name) = segment {
                captures.push((name.as_str(), part));
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(captures)
    }
}

fn is_valid_param_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Wildcard match where every `*` between `pieces` matches any run of
/// characters (the caller guarantees `text` holds no `/`).
fn glob_match(pieces: &[String], text: &str) -> bool {
    let (first, rest) = match pieces.split_first() {
        Some(split) => split,
        None => return text.is_empty(),
    };
    let Some(mut remaining) = text.strip_prefix(first.as_str()) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };

    for piece in middle {
        match remaining.find(piece.as_str()) {
            Some(idx) => remaining = &remaining[idx + piece.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last.as_str())
}

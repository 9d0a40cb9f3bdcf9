//! Path pattern compilation: literal/param/wildcard segments (spec §4.1).

use crate::error::AppError;

/// One compiled segment of a [`Pattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    /// Must be the last segment of a pattern; captures the remainder of the
    /// path joined by `/`.
    Wildcard(String),
}

/// A compiled route pattern: an ordered sequence of segments plus the
/// derived `literal_count` the router's priority function sorts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    segments: Vec<Segment>,
    literal_count: usize,
}

impl Pattern {
    /// Splits `raw` on `/`, discards empty segments, and classifies each
    /// token: a leading `:` is a param, a leading `*` is a wildcard (which
    /// must be the final segment), anything else is a literal.
    pub fn compile(raw: &str) -> Result<Self, AppError> {
        let tokens: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(tokens.len());
        let mut literal_count = 0;

        for (i, token) in tokens.iter().enumerate() {
            let is_last = i + 1 == tokens.len();
            if let Some(name) = token.strip_prefix(':') {
                if name.is_empty() {
                    return Err(AppError::InvalidPattern {
                        pattern: raw.to_string(),
                        reason: "param segment has an empty name".into(),
                    });
                }
                segments.push(Segment::Param(name.to_string()));
            } else if let Some(name) = token.strip_prefix('*') {
                if name.is_empty() {
                    return Err(AppError::InvalidPattern {
                        pattern: raw.to_string(),
                        reason: "wildcard segment has an empty name".into(),
                    });
                }
                if !is_last {
                    return Err(AppError::InvalidPattern {
                        pattern: raw.to_string(),
                        reason: "wildcard must be the last segment".into(),
                    });
                }
                segments.push(Segment::Wildcard(name.to_string()));
            } else {
                literal_count += 1;
                segments.push(Segment::Literal(token.to_string()));
            }
        }

        Ok(Pattern {
            segments,
            literal_count,
        })
    }

    pub fn literal_count(&self) -> usize {
        self.literal_count
    }

    pub fn param_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Param(_)))
            .count()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Attempts to match `path` against this pattern, returning the bound
    /// `(name, value)` pairs on success.
    ///
    /// Unlike pattern compilation, path tokenization does not discard empty
    /// segments: a trailing slash produces a trailing empty token, so `/foo`
    /// and `/foo/` tokenize to different lengths and never match the same
    /// pattern (spec §4.1 Normalization — trailing slashes are significant).
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let tokens = path_tokens(path);
        let mut bindings = Vec::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    let candidate = tokens.get(i)?;
                    if candidate != lit {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let candidate = tokens.get(i)?;
                    bindings.push((name.clone(), candidate.to_string()));
                }
                Segment::Wildcard(name) => {
                    if i >= tokens.len() {
                        return None;
                    }
                    let rest = tokens[i..].join("/");
                    bindings.push((name.clone(), rest));
                    return Some(bindings);
                }
            }
        }

        // No wildcard consumed the tail: segment and token counts must match
        // exactly, otherwise this is a length mismatch (spec §4.1).
        if tokens.len() != self.segments.len() {
            return None;
        }

        Some(bindings)
    }
}

/// Tokenizes a request path, preserving a trailing slash as a trailing empty
/// token rather than discarding it (see [`Pattern::matches`]).
fn path_tokens(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

// Route pattern compilation and matching
//
// A pattern string is compiled once at registration time into a sequence of
// segments; matching a concrete path walks the two segment lists pairwise.
// Pattern syntax: "/literal", ":name" for a parameter segment,
// ":name{regex}" for a constrained parameter segment, and a trailing "*"
// that consumes the rest of the path. User-supplied constraint regexes are
// anchored at both ends so a constraint can never match part of a segment.

use crate::Error;
use regex::Regex;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// One "/"-delimited component of a compiled pattern
#[derive(Debug, Clone)]
pub enum PatternSegment {
    /// Matches exactly this text
    Static(String),
    /// Matches any single non-empty segment, captured under the name
    Param(String),
    /// Matches a segment satisfying the anchored regex, captured under the name
    Constrained {
        name: String,
        source: String,
        regex: Regex,
    },
    /// Trailing `*`: matches the entire remaining path, including nothing
    Wildcard,
}

impl PatternSegment {
    /// The parameter name bound by this segment, if any
    pub fn param_name(&self) -> Option<&str> {
        match self {
            PatternSegment::Param(name) => Some(name),
            PatternSegment::Constrained { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl PartialEq for PatternSegment {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PatternSegment::Static(a), PatternSegment::Static(b)) => a == b,
            (PatternSegment::Param(a), PatternSegment::Param(b)) => a == b,
            (
                PatternSegment::Constrained {
                    name: an,
                    source: asrc,
                    ..
                },
                PatternSegment::Constrained {
                    name: bn,
                    source: bsrc,
                    ..
                },
            ) => an == bn && asrc == bsrc,
            (PatternSegment::Wildcard, PatternSegment::Wildcard) => true,
            _ => false,
        }
    }
}

/// Ranking used to pick the winning terminal handler among several matches.
///
/// Compares by static-segment count, then constrained-parameter count, then
/// fewer total segments (so an exact route beats a wildcard that would
/// swallow the same path). Bigger is more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    statics: usize,
    constrained: usize,
    depth: Reverse<usize>,
}

/// A compiled route pattern
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPattern {
    raw: String,
    segments: Vec<PatternSegment>,
    trailing_slash: bool,
}

impl CompiledPattern {
    /// Compile a pattern string.
    ///
    /// Fails with [`Error::Pattern`] on malformed syntax and
    /// [`Error::DuplicateParamName`] when one pattern binds the same name
    /// twice.
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        if pattern == "*" {
            return Ok(Self {
                raw: pattern.to_string(),
                segments: vec![PatternSegment::Wildcard],
                trailing_slash: false,
            });
        }

        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(Error::Pattern(
                pattern.to_string(),
                "pattern must start with '/' or be '*'".to_string(),
            ));
        };

        let mut parts: Vec<&str> = rest.split('/').collect();
        let trailing_slash = matches!(parts.last(), Some(&""));
        if trailing_slash {
            parts.pop();
        }

        let mut segments = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let segment = if let Some(decl) = part.strip_prefix(':') {
                Self::compile_param(pattern, decl)?
            } else if *part == "*" {
                if index + 1 != parts.len() {
                    return Err(Error::Pattern(
                        pattern.to_string(),
                        "wildcard must be the final segment".to_string(),
                    ));
                }
                PatternSegment::Wildcard
            } else {
                PatternSegment::Static((*part).to_string())
            };
            segments.push(segment);
        }

        let mut seen = HashSet::new();
        for segment in &segments {
            if let Some(name) = segment.param_name() {
                if !seen.insert(name) {
                    return Err(Error::DuplicateParamName(
                        name.to_string(),
                        format!("bound twice within pattern '{}'", pattern),
                    ));
                }
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
            trailing_slash,
        })
    }

    fn compile_param(pattern: &str, decl: &str) -> Result<PatternSegment, Error> {
        if let Some(brace) = decl.find('{') {
            let name = &decl[..brace];
            if name.is_empty() {
                return Err(Error::Pattern(
                    pattern.to_string(),
                    "missing parameter name".to_string(),
                ));
            }
            let Some(source) = decl[brace + 1..].strip_suffix('}') else {
                return Err(Error::Pattern(
                    pattern.to_string(),
                    "unterminated constraint brace".to_string(),
                ));
            };
            let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| {
                Error::Pattern(pattern.to_string(), format!("invalid constraint regex: {}", e))
            })?;
            Ok(PatternSegment::Constrained {
                name: name.to_string(),
                source: source.to_string(),
                regex,
            })
        } else if decl.is_empty() {
            Err(Error::Pattern(
                pattern.to_string(),
                "missing parameter name".to_string(),
            ))
        } else {
            Ok(PatternSegment::Param(decl.to_string()))
        }
    }

    /// The pattern string this was compiled from
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(PatternSegment::Wildcard))
    }

    /// Match a concrete request path, returning captured parameters.
    ///
    /// In strict mode `/hello` and `/hello/` are distinct; in non-strict
    /// mode a single trailing slash on either side is ignored.
    pub fn match_path(&self, path: &str, strict: bool) -> Option<HashMap<String, String>> {
        let (path_segments, path_trailing) = split_path(path);

        if strict && !self.has_wildcard() && self.trailing_slash != path_trailing {
            return None;
        }

        let mut params = HashMap::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if matches!(segment, PatternSegment::Wildcard) {
                return Some(params);
            }
            let Some(part) = path_segments.get(i) else {
                return None;
            };
            match segment {
                PatternSegment::Static(text) => {
                    if *part != text.as_str() {
                        return None;
                    }
                }
                PatternSegment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), (*part).to_string());
                }
                PatternSegment::Constrained { name, regex, .. } => {
                    if !regex.is_match(part) {
                        return None;
                    }
                    params.insert(name.clone(), (*part).to_string());
                }
                PatternSegment::Wildcard => unreachable!(),
            }
        }

        if path_segments.len() != self.segments.len() {
            return None;
        }
        Some(params)
    }

    pub fn specificity(&self) -> Specificity {
        let statics = self
            .segments
            .iter()
            .filter(|s| matches!(s, PatternSegment::Static(_)))
            .count();
        let constrained = self
            .segments
            .iter()
            .filter(|s| matches!(s, PatternSegment::Constrained { .. }))
            .count();
        Specificity {
            statics,
            constrained,
            depth: Reverse(self.segments.len()),
        }
    }

    /// Check whether registering `self` alongside `other` would make
    /// parameter extraction ambiguous.
    ///
    /// Only patterns that can both match one concrete path are compared.
    /// Conflicts: the same name bound at two different positions, or two
    /// different names bound at one position beneath an identical all-static
    /// prefix. Two constrained segments with distinct regex sources are
    /// treated as disjoint, so they never overlap.
    pub(crate) fn conflicts_with(&self, other: &CompiledPattern) -> Option<String> {
        if !self.overlaps(other) {
            return None;
        }

        for (i, a_name) in self.param_positions() {
            for (j, b_name) in other.param_positions() {
                if a_name == b_name && i != j {
                    return Some(a_name.to_string());
                }
            }
        }

        let shared = self.segments.len().min(other.segments.len());
        for i in 0..shared {
            let (Some(a_name), Some(b_name)) =
                (self.segments[i].param_name(), other.segments[i].param_name())
            else {
                continue;
            };
            if a_name != b_name && self.static_lineage_eq(other, i) {
                return Some(b_name.to_string());
            }
        }

        None
    }

    fn param_positions(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.segments
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.param_name().map(|name| (i, name)))
    }

    fn static_lineage_eq(&self, other: &CompiledPattern, upto: usize) -> bool {
        (0..upto).all(|i| {
            matches!(
                (&self.segments[i], &other.segments[i]),
                (PatternSegment::Static(a), PatternSegment::Static(b)) if a == b
            )
        })
    }

    fn overlaps(&self, other: &CompiledPattern) -> bool {
        let self_len = self.segments.len() - usize::from(self.has_wildcard());
        let other_len = other.segments.len() - usize::from(other.has_wildcard());

        if !self.has_wildcard() && !other.has_wildcard() && self_len != other_len {
            return false;
        }

        let shared = self_len.min(other_len);
        for i in 0..shared {
            match (&self.segments[i], &other.segments[i]) {
                (PatternSegment::Static(a), PatternSegment::Static(b)) => {
                    if a != b {
                        return false;
                    }
                }
                (
                    PatternSegment::Constrained { source: a, .. },
                    PatternSegment::Constrained { source: b, .. },
                ) => {
                    if a != b {
                        return false;
                    }
                }
                (PatternSegment::Constrained { regex, .. }, PatternSegment::Static(text))
                | (PatternSegment::Static(text), PatternSegment::Constrained { regex, .. }) => {
                    if !regex.is_match(text) {
                        return false;
                    }
                }
                _ => {}
            }
        }
        true
    }
}

impl std::fmt::Display for CompiledPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Split a request path into segments plus a trailing-slash flag
fn split_path(path: &str) -> (Vec<&str>, bool) {
    let rest = path.strip_prefix('/').unwrap_or(path);
    let mut parts: Vec<&str> = rest.split('/').collect();
    let trailing = parts.len() > 1 && matches!(parts.last(), Some(&""));
    if trailing || parts == [""] {
        parts.pop();
    }
    (parts, trailing || (rest.is_empty() && path.ends_with('/')))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(pattern: &str) -> CompiledPattern {
        CompiledPattern::compile(pattern).unwrap()
    }

    #[test]
    fn test_static_match() {
        let pattern = compile("/users");
        assert!(pattern.match_path("/users", true).is_some());
        assert!(pattern.match_path("/posts", true).is_none());
    }

    #[test]
    fn test_param_capture() {
        let pattern = compile("/users/:id");
        let params = pattern.match_path("/users/123", true).unwrap();
        assert_eq!(params.get("id"), Some(&"123".to_string()));
        assert!(pattern.match_path("/users", true).is_none());
        assert!(pattern.match_path("/users/1/posts", true).is_none());
    }

    #[test]
    fn test_multiple_params() {
        let pattern = compile("/users/:user_id/posts/:post_id");
        let params = pattern.match_path("/users/1/posts/2", true).unwrap();
        assert_eq!(params.get("user_id"), Some(&"1".to_string()));
        assert_eq!(params.get("post_id"), Some(&"2".to_string()));
    }

    #[test]
    fn test_constraint_is_anchored() {
        let pattern = compile("/posts/:id{[0-9]+}");
        assert!(pattern.match_path("/posts/123", true).is_some());
        // An unanchored [0-9]+ would find a partial match here
        assert!(pattern.match_path("/posts/123abc", true).is_none());
        assert!(pattern.match_path("/posts/abc", true).is_none());
    }

    #[test]
    fn test_constraint_alternation() {
        let pattern = compile("/posts/:action{create|update}");
        assert!(pattern.match_path("/posts/create", true).is_some());
        assert!(pattern.match_path("/posts/update", true).is_some());
        assert!(pattern.match_path("/posts/delete", true).is_none());
    }

    #[test]
    fn test_wildcard_tail() {
        let pattern = compile("/static/*");
        assert!(pattern.match_path("/static/css/site.css", true).is_some());
        assert!(pattern.match_path("/static", true).is_some());
        assert!(pattern.match_path("/other", true).is_none());

        let all = compile("*");
        assert!(all.match_path("/", true).is_some());
        assert!(all.match_path("/anything/at/all", true).is_some());
    }

    #[test]
    fn test_strict_trailing_slash() {
        let bare = compile("/hello");
        assert!(bare.match_path("/hello", true).is_some());
        assert!(bare.match_path("/hello/", true).is_none());

        let slashed = compile("/hello/");
        assert!(slashed.match_path("/hello/", true).is_some());
        assert!(slashed.match_path("/hello", true).is_none());
    }

    #[test]
    fn test_non_strict_trailing_slash() {
        let bare = compile("/hello");
        assert!(bare.match_path("/hello", false).is_some());
        assert!(bare.match_path("/hello/", false).is_some());

        let slashed = compile("/hello/");
        assert!(slashed.match_path("/hello", false).is_some());
    }

    #[test]
    fn test_root_pattern() {
        let root = compile("/");
        assert!(root.match_path("/", true).is_some());
        assert!(root.match_path("/hello", true).is_none());
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(
            CompiledPattern::compile("no-slash"),
            Err(Error::Pattern(_, _))
        ));
        assert!(matches!(
            CompiledPattern::compile("/posts/:id{[0-9]+"),
            Err(Error::Pattern(_, reason)) if reason.contains("unterminated")
        ));
        assert!(matches!(
            CompiledPattern::compile("/posts/:"),
            Err(Error::Pattern(_, _))
        ));
        assert!(matches!(
            CompiledPattern::compile("/a/*/b"),
            Err(Error::Pattern(_, _))
        ));
        assert!(matches!(
            CompiledPattern::compile("/posts/:id{[}"),
            Err(Error::Pattern(_, _))
        ));
    }

    #[test]
    fn test_duplicate_name_within_pattern() {
        assert!(matches!(
            CompiledPattern::compile("/:id/:id"),
            Err(Error::DuplicateParamName(name, _)) if name == "id"
        ));
    }

    #[test]
    fn test_specificity_ordering() {
        let static_heavy = compile("/posts/:id");
        let param_heavy = compile("/:type/:id");
        assert!(static_heavy.specificity() > param_heavy.specificity());

        let constrained = compile("/posts/:id{[0-9]+}");
        assert!(constrained.specificity() > static_heavy.specificity());

        let exact = compile("/posts");
        let wildcard = compile("/posts/*");
        assert!(exact.specificity() > wildcard.specificity());
    }

    #[test]
    fn test_conflict_same_name_different_position() {
        let broad = compile("/:id/:action");
        let narrow = compile("/posts/:id");
        assert!(broad.conflicts_with(&narrow).is_some());
        assert!(narrow.conflicts_with(&broad).is_some());
    }

    #[test]
    fn test_no_conflict_disjoint_lengths() {
        let long = compile("/posts/:id/comments/:comment_id");
        let short = compile("/posts/:id");
        assert!(long.conflicts_with(&short).is_none());
        assert!(short.conflicts_with(&long).is_none());
    }

    #[test]
    fn test_no_conflict_disjoint_constraints() {
        let a = compile("/:id/:action{create|update}");
        let b = compile("/:id/:action{delete}");
        assert!(a.conflicts_with(&b).is_none());
    }

    #[test]
    fn test_conflict_renamed_param_same_static_prefix() {
        let a = compile("/posts/:id");
        let b = compile("/posts/:name");
        assert!(a.conflicts_with(&b).is_some());
    }

    #[test]
    fn test_no_conflict_static_vs_disjoint_constraint() {
        // The literal "posts" cannot satisfy the constraint, so the patterns
        // never match the same path.
        let a = compile("/posts/:x");
        let b = compile("/:action{create|update}/:y");
        assert!(a.conflicts_with(&b).is_none());
    }
}

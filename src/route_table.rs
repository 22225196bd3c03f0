// Ordered route storage with registration-time validation

use crate::logging::trace;
use crate::pattern::CompiledPattern;
use crate::{BoxedHandler, Error, Middleware};
use std::collections::HashMap;
use std::sync::Arc;

/// One member of a handler chain.
///
/// The dispatcher never inspects a stage beyond its variant: middleware get
/// a continuation, terminal handlers do not.
#[derive(Clone)]
pub enum Stage {
    Middleware(Arc<dyn Middleware>),
    Handler(BoxedHandler),
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Middleware(_) => f.write_str("Stage::Middleware"),
            Stage::Handler(_) => f.write_str("Stage::Handler"),
        }
    }
}

/// A registered route: compiled pattern plus its ordered chain.
///
/// Immutable after insertion; `order` preserves first-registered-wins among
/// equally specific matches and is renumbered when a sub-router is mounted.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub pattern: CompiledPattern,
    pub chain: Vec<Stage>,
    pub order: usize,
}

impl RouteEntry {
    /// Whether this entry ends in a terminal handler.
    ///
    /// Non-terminal entries (registered via `use_middleware`) accumulate;
    /// terminal entries compete on specificity.
    pub fn is_terminal(&self) -> bool {
        matches!(self.chain.last(), Some(Stage::Handler(_)))
    }
}

/// A single pattern match against one entry; produced fresh per request
#[derive(Debug)]
pub struct MatchResult<'a> {
    pub entry: &'a RouteEntry,
    pub params: HashMap<String, String>,
}

/// Ordered collection of route entries for one method (or the wildcard set)
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, validating its pattern against every entry already
    /// in the table.
    ///
    /// This is the only safety net against ambiguous parameter extraction,
    /// so it always runs in full.
    pub fn insert(&mut self, entry: RouteEntry) -> Result<(), Error> {
        self.check_conflicts(&entry.pattern)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Validate a pattern against this table without inserting.
    ///
    /// Used by the router to cross-check a pattern destined for a sibling
    /// table (method tables and the wildcard table can match the same
    /// request).
    pub fn check_conflicts(&self, pattern: &CompiledPattern) -> Result<(), Error> {
        for existing in &self.entries {
            if let Some(name) = pattern.conflicts_with(&existing.pattern) {
                return Err(Error::DuplicateParamName(
                    name,
                    format!(
                        "pattern '{}' conflicts with already-registered '{}'",
                        pattern.raw(),
                        existing.pattern.raw()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Every entry whose pattern matches the path, ordered by specificity
    /// descending, then registration order ascending.
    pub fn lookup(&self, path: &str, strict: bool) -> Vec<MatchResult<'_>> {
        let mut matches: Vec<MatchResult<'_>> = self
            .entries
            .iter()
            .filter_map(|entry| {
                entry
                    .pattern
                    .match_path(path, strict)
                    .map(|params| MatchResult { entry, params })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.entry
                .pattern
                .specificity()
                .cmp(&a.entry.pattern.specificity())
                .then(a.entry.order.cmp(&b.entry.order))
        });

        trace!(path = %path, matched = matches.len(), "route table lookup");
        matches
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub(crate) fn into_entries(self) -> Vec<RouteEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler;
    use crate::{Context, HttpResponse};

    fn entry(pattern: &str, order: usize) -> RouteEntry {
        RouteEntry {
            pattern: CompiledPattern::compile(pattern).unwrap(),
            chain: vec![Stage::Handler(handler(|ctx: Context| async move {
                Ok(ctx.with_response(HttpResponse::ok()))
            }))],
            order,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut table = RouteTable::new();
        table.insert(entry("/users", 0)).unwrap();
        table.insert(entry("/users/:id", 1)).unwrap();

        let matches = table.lookup("/users/42", true);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].params.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn test_lookup_specificity_order() {
        let mut table = RouteTable::new();
        table.insert(entry("/:type/:id", 0)).unwrap();
        table.insert(entry("/posts/:id", 1)).unwrap();

        let matches = table.lookup("/posts/9", true);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].entry.pattern.raw(), "/posts/:id");
        assert_eq!(matches[1].entry.pattern.raw(), "/:type/:id");
    }

    #[test]
    fn test_lookup_registration_tiebreak() {
        let mut table = RouteTable::new();
        table.insert(entry("/a/*", 3)).unwrap();
        table.insert(entry("/a/*", 7)).unwrap();

        let matches = table.lookup("/a/x", true);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].entry.order, 3);
        assert_eq!(matches[1].entry.order, 7);
    }

    #[test]
    fn test_insert_rejects_conflicts() {
        let mut table = RouteTable::new();
        table.insert(entry("/:id/:action", 0)).unwrap();

        let result = table.insert(entry("/posts/:id", 1));
        assert!(matches!(result, Err(Error::DuplicateParamName(name, _)) if name == "id"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_insert_allows_disjoint_hierarchy() {
        let mut table = RouteTable::new();
        table
            .insert(entry("/posts/:id/comments/:comment_id", 0))
            .unwrap();
        table.insert(entry("/posts/:id", 1)).unwrap();
        assert_eq!(table.len(), 2);
    }
}

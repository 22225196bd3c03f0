// Router builder: registration, mounting, and the build/serve boundary
//
// All registration happens on a mutable `Router`; `build()` consumes it and
// produces the immutable `App` that serves traffic. Mutation after the
// boundary is therefore a compile error rather than a runtime hazard, and
// the compiled tables can be shared across concurrent dispatches freely.

use crate::app::{App, ErrorHandlerFn};
use crate::handler::handler;
use crate::pattern::CompiledPattern;
use crate::route_table::{RouteEntry, RouteTable, Stage};
use crate::{BoxedHandler, Context, Error, HttpMethod, HttpResponse, Middleware};
use std::collections::HashMap;
use std::sync::Arc;

/// Router construction options
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// When true (the default), `/hello` and `/hello/` are distinct routes
    pub strict: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Mutable route registrar.
///
/// Owns one table per concrete method plus a wildcard table shared by
/// `all` and `use_middleware` registrations. Registration-time errors
/// (malformed patterns, ambiguous parameter names) surface synchronously
/// from the registering call and should abort startup.
pub struct Router {
    tables: HashMap<HttpMethod, RouteTable>,
    wildcard: RouteTable,
    config: RouterConfig,
    not_found: Option<BoxedHandler>,
    error_handler: Option<ErrorHandlerFn>,
    next_order: usize,
}

impl Router {
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            tables: HashMap::new(),
            wildcard: RouteTable::new(),
            config,
            not_found: None,
            error_handler: None,
            next_order: 0,
        }
    }

    /// Register a chain (route-level middleware plus a terminal handler)
    /// under one concrete method.
    pub fn on(
        &mut self,
        method: HttpMethod,
        pattern: &str,
        chain: Vec<Stage>,
    ) -> Result<(), Error> {
        let compiled = CompiledPattern::compile(pattern)?;
        // The wildcard table matches the same requests as any method table,
        // so it participates in conflict detection.
        self.wildcard.check_conflicts(&compiled)?;

        let order = self.bump_order();
        self.tables.entry(method).or_default().insert(RouteEntry {
            pattern: compiled,
            chain,
            order,
        })
    }

    pub fn get(&mut self, pattern: &str, handler: BoxedHandler) -> Result<(), Error> {
        self.on(HttpMethod::GET, pattern, vec![Stage::Handler(handler)])
    }

    pub fn post(&mut self, pattern: &str, handler: BoxedHandler) -> Result<(), Error> {
        self.on(HttpMethod::POST, pattern, vec![Stage::Handler(handler)])
    }

    pub fn put(&mut self, pattern: &str, handler: BoxedHandler) -> Result<(), Error> {
        self.on(HttpMethod::PUT, pattern, vec![Stage::Handler(handler)])
    }

    pub fn delete(&mut self, pattern: &str, handler: BoxedHandler) -> Result<(), Error> {
        self.on(HttpMethod::DELETE, pattern, vec![Stage::Handler(handler)])
    }

    pub fn patch(&mut self, pattern: &str, handler: BoxedHandler) -> Result<(), Error> {
        self.on(HttpMethod::PATCH, pattern, vec![Stage::Handler(handler)])
    }

    pub fn head(&mut self, pattern: &str, handler: BoxedHandler) -> Result<(), Error> {
        self.on(HttpMethod::HEAD, pattern, vec![Stage::Handler(handler)])
    }

    pub fn options(&mut self, pattern: &str, handler: BoxedHandler) -> Result<(), Error> {
        self.on(HttpMethod::OPTIONS, pattern, vec![Stage::Handler(handler)])
    }

    /// Register a handler for every method
    pub fn all(&mut self, pattern: &str, handler: BoxedHandler) -> Result<(), Error> {
        self.register_wildcard(pattern, vec![Stage::Handler(handler)])
    }

    /// Register middleware against a pattern.
    ///
    /// Middleware entries are method-agnostic and accumulate: every matching
    /// middleware runs, ordered by registration. A pattern of `*` matches
    /// every path; `/hello` matches only `/hello`; `/hello/*` also matches
    /// everything beneath it.
    pub fn use_middleware(
        &mut self,
        pattern: &str,
        middleware: Arc<dyn Middleware>,
    ) -> Result<(), Error> {
        self.register_wildcard(pattern, vec![Stage::Middleware(middleware)])
    }

    fn register_wildcard(&mut self, pattern: &str, chain: Vec<Stage>) -> Result<(), Error> {
        let compiled = CompiledPattern::compile(pattern)?;
        for table in self.tables.values() {
            table.check_conflicts(&compiled)?;
        }

        let order = self.bump_order();
        self.wildcard.insert(RouteEntry {
            pattern: compiled,
            chain,
            order,
        })
    }

    /// Merge a sub-router's registrations under a path prefix.
    ///
    /// Entries are re-registered in the sub-router's own registration order
    /// and renumbered in the parent, so two routers mounted at the same
    /// prefix interleave deterministically (first mounted wraps outermost).
    /// The sub-router's config and not-found/error handlers are discarded;
    /// the parent's govern.
    pub fn mount(&mut self, prefix: &str, other: Router) -> Result<(), Error> {
        let mut gathered: Vec<(Option<HttpMethod>, RouteEntry)> = Vec::new();
        for (method, table) in other.tables {
            for entry in table.into_entries() {
                gathered.push((Some(method.clone()), entry));
            }
        }
        for entry in other.wildcard.into_entries() {
            gathered.push((None, entry));
        }
        gathered.sort_by_key(|(_, entry)| entry.order);

        for (method, entry) in gathered {
            let pattern = join_prefix(prefix, entry.pattern.raw());
            match method {
                Some(method) => self.on(method, &pattern, entry.chain)?,
                None => self.register_wildcard(&pattern, entry.chain)?,
            }
        }
        Ok(())
    }

    /// Replace the not-found handler (the terminal stage when no route
    /// matches). Re-registering replaces the previous handler.
    pub fn not_found(&mut self, handler: BoxedHandler) {
        self.not_found = Some(handler);
    }

    /// Replace the dispatch-boundary error handler.
    pub fn on_error<F>(&mut self, f: F)
    where
        F: Fn(&Error, &mut Context) -> HttpResponse + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(f));
    }

    /// Seal registration and produce the immutable, dispatchable [`App`].
    pub fn build(self) -> App {
        let not_found = self.not_found.unwrap_or_else(|| {
            handler(|ctx: Context| async move {
                let response = ctx.not_found_response();
                Ok(ctx.with_response(response))
            })
        });

        App {
            tables: self.tables,
            wildcard: self.wildcard,
            strict: self.config.strict,
            not_found,
            error_handler: self.error_handler,
        }
    }

    fn bump_order(&mut self) -> usize {
        let order = self.next_order;
        self.next_order += 1;
        order
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Prepend a mount prefix to a registered pattern string
fn join_prefix(prefix: &str, pattern: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    let normalized = if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    match pattern {
        "*" => format!("{}/*", normalized),
        "/" => {
            if normalized.is_empty() {
                "/".to_string()
            } else {
                normalized
            }
        }
        _ => format!("{}{}", normalized, pattern),
    }
}

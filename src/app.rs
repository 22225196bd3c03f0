// Compiled application: immutable route tables plus the dispatcher
//
// An `App` is produced by `Router::build` and is read-only from then on, so
// concurrent requests can dispatch against it without locking. Each request
// gets its own `Context` and its own flattened pipeline; dispatch-time
// failures never escape `handle`.

use crate::logging::{debug, error};
use crate::route_table::{MatchResult, RouteTable, Stage};
use crate::{BoxedHandler, Context, Error, HttpMethod, HttpRequest, HttpResponse};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Dispatch-boundary error handler: receives the failure and a context and
/// must produce the response itself.
pub type ErrorHandlerFn = Arc<dyn Fn(&Error, &mut Context) -> HttpResponse + Send + Sync>;

/// The compiled router and dispatcher.
///
/// Exposes the single entry point host runtimes call per request:
/// [`handle`](Self::handle).
pub struct App {
    pub(crate) tables: HashMap<HttpMethod, RouteTable>,
    pub(crate) wildcard: RouteTable,
    pub(crate) strict: bool,
    pub(crate) not_found: BoxedHandler,
    pub(crate) error_handler: Option<ErrorHandlerFn>,
}

impl App {
    /// Every entry matching the (method, path) pair, merged across the
    /// concrete-method table and the wildcard table, ordered by specificity
    /// descending then registration order ascending.
    pub fn match_route(&self, method: &str, path: &str) -> Vec<MatchResult<'_>> {
        let mut matches = Vec::new();
        if let Some(method) = HttpMethod::from_str(method) {
            if let Some(table) = self.tables.get(&method) {
                matches.extend(table.lookup(path, self.strict));
            }
        }
        matches.extend(self.wildcard.lookup(path, self.strict));

        matches.sort_by(|a, b| {
            b.entry
                .pattern
                .specificity()
                .cmp(&a.entry.pattern.specificity())
                .then(a.entry.order.cmp(&b.entry.order))
        });
        matches
    }

    /// Dispatch one request and produce its response.
    ///
    /// The query string, if any, is split off the path and parsed before
    /// matching. Failures raised anywhere in the pipeline (including an
    /// unfinalized context after the pipeline completes) are funneled
    /// through the registered error handler, or a default diagnostic
    /// response.
    pub async fn handle(&self, mut request: HttpRequest) -> HttpResponse {
        if let Some(idx) = request.path.find('?') {
            let query = request.path.split_off(idx);
            request.query_params = parse_query_string(&query[1..]);
        }

        let (stages, params) = self.assemble(&request.method, &request.path);
        request.path_params = params;

        debug!(
            method = %request.method,
            path = %request.path,
            stages = stages.len(),
            "dispatching request"
        );

        // The pipeline owns the context; keep enough to rebuild one for the
        // error path.
        let fault_request = request.clone();
        let outcome = run_chain(Arc::new(stages), 0, Context::new(request)).await;

        match outcome {
            Ok(ctx) if ctx.is_finalized() => ctx.into_response(),
            Ok(_) => self.fault(Error::ContextNotFinalized, Context::new(fault_request)),
            Err(err) => self.fault(err, Context::new(fault_request)),
        }
    }

    fn fault(&self, err: Error, mut ctx: Context) -> HttpResponse {
        error!(error = %err, path = %ctx.req.path, "dispatch fault");
        match &self.error_handler {
            Some(handler) => handler(&err, &mut ctx),
            None => HttpResponse::new(err.status_code()).with_body(err.to_string().into_bytes()),
        }
    }

    /// Flatten the match list into one pipeline: every matching middleware
    /// entry in registration order, then the single most-specific terminal
    /// entry (middleware accumulates, handlers select). With no terminal
    /// match the not-found handler becomes the terminal stage, so matching
    /// middleware still wrap the not-found outcome.
    fn assemble(&self, method: &str, path: &str) -> (Vec<Stage>, HashMap<String, String>) {
        let matches = self.match_route(method, path);

        let mut middleware: Vec<&MatchResult<'_>> = matches
            .iter()
            .filter(|m| !m.entry.is_terminal())
            .collect();
        middleware.sort_by_key(|m| m.entry.order);

        let mut params = HashMap::new();
        let mut stages = Vec::new();
        for m in middleware {
            params.extend(m.params.clone());
            stages.extend(m.entry.chain.iter().cloned());
        }

        // `matches` is specificity-ordered, so the first terminal entry is
        // the winner; its captures land last and take precedence.
        match matches.iter().find(|m| m.entry.is_terminal()) {
            Some(winner) => {
                params.extend(winner.params.clone());
                stages.extend(winner.entry.chain.iter().cloned());
            }
            None => stages.push(Stage::Handler(self.not_found.clone())),
        }

        (stages, params)
    }
}

/// Run the pipeline from `index` onward, handing each middleware stage a
/// continuation over the remainder.
///
/// Pre-phases run outermost-to-innermost, post-phases unwind in LIFO order
/// on the call stack. A middleware that returns without invoking its
/// continuation short-circuits everything downstream.
fn run_chain(
    stages: Arc<Vec<Stage>>,
    index: usize,
    ctx: Context,
) -> Pin<Box<dyn Future<Output = Result<Context, Error>> + Send>> {
    Box::pin(async move {
        match stages.get(index) {
            None => Ok(ctx),
            Some(Stage::Handler(handler)) => handler.call(ctx).await,
            Some(Stage::Middleware(middleware)) => {
                let middleware = middleware.clone();
                let rest = stages.clone();
                middleware
                    .handle(ctx, Box::new(move |ctx| run_chain(rest, index + 1, ctx)))
                    .await
            }
        }
    })
}

/// Parse a query string into a map of decoded parameters
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|part| {
            if part.is_empty() {
                return None;
            }
            let mut split = part.splitn(2, '=');
            let key = split.next()?;
            let value = split.next().unwrap_or("");
            let key = urlencoding::decode(key).ok()?.into_owned();
            let value = urlencoding::decode(value).ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_string() {
        let params = parse_query_string("name=john&age=30");
        assert_eq!(params.get("name"), Some(&"john".to_string()));
        assert_eq!(params.get("age"), Some(&"30".to_string()));
    }

    #[test]
    fn test_parse_query_string_decodes() {
        let params = parse_query_string("name=john%20doe&email=test%40example.com");
        assert_eq!(params.get("name"), Some(&"john doe".to_string()));
        assert_eq!(params.get("email"), Some(&"test@example.com".to_string()));
    }

    #[test]
    fn test_parse_query_string_no_value() {
        let params = parse_query_string("flag&debug=true");
        assert_eq!(params.get("flag"), Some(&"".to_string()));
        assert_eq!(params.get("debug"), Some(&"true".to_string()));
    }

    #[test]
    fn test_parse_query_string_empty() {
        assert!(parse_query_string("").is_empty());
    }
}

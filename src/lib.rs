// Switchback: request router and middleware dispatch engine
//
// Built for host environments that expose a single `handle(request) ->
// response` entry point per request. Registration happens on a mutable
// `Router`; `build()` seals it into an immutable `App` that matches routes,
// assembles middleware pipelines and dispatches with continuation semantics.

pub mod app;
pub mod context;
pub mod error;
pub mod handler;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod pattern;
pub mod route_table;
pub mod routing;

// Re-export commonly used types
pub use app::{App, ErrorHandlerFn};
pub use context::Context;
pub use error::Error;
pub use handler::{handler, BoxedHandler, FnHandler, Handler, IntoHandler};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Json};
pub use middleware::{from_fn, CorsMiddleware, Middleware, Next, RequestIdMiddleware, RequestLogger};
pub use pattern::{CompiledPattern, PatternSegment, Specificity};
pub use route_table::{MatchResult, RouteEntry, RouteTable, Stage};
pub use routing::{Router, RouterConfig};

// Middleware system for request/response processing

use crate::logging::{error, info};
use crate::{Context, Error, HttpResponse};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The continuation handed to a middleware stage.
///
/// Invoking it runs everything downstream of the stage and resolves to the
/// context as the downstream pipeline left it. A stage that returns without
/// invoking its continuation short-circuits the rest of the pipeline.
pub type Next = Box<
    dyn FnOnce(Context) -> Pin<Box<dyn Future<Output = Result<Context, Error>> + Send>> + Send,
>;

/// Middleware trait for processing requests around the rest of the pipeline
///
/// Code before `next(ctx).await` is the pre-phase, code after it is the
/// post-phase; post-phases unwind in strict LIFO order.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: Context, next: Next) -> Result<Context, Error>;
}

/// Middleware wrapping `async fn(Context, Next) -> Result<Context, Error>`.
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> FnMiddleware<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Context, Error>> + Send + 'static,
{
    async fn handle(&self, ctx: Context, next: Next) -> Result<Context, Error> {
        (self.f)(ctx, next).await
    }
}

/// Create a middleware from a closure.
///
/// # Example
///
/// ```ignore
/// use switchback::middleware::from_fn;
///
/// let timing = from_fn(|ctx, next| async move {
///     let mut ctx = next(ctx).await?;
///     if let Some(res) = ctx.response_mut() {
///         res.set_header("x-served-by", "switchback");
///     }
///     Ok(ctx)
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Context, Error>> + Send + 'static,
{
    Arc::new(FnMiddleware::new(f))
}

// ========== Built-in Middleware ==========

/// CORS (Cross-Origin Resource Sharing) middleware
///
/// Answers preflight requests directly (short-circuiting the rest of the
/// pipeline) and stamps CORS headers onto downstream responses.
pub struct CorsMiddleware {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
    pub allow_credentials: bool,
    pub max_age: u32,
}

impl CorsMiddleware {
    pub fn new() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, OPTIONS, PATCH".to_string(),
            allow_headers: "Content-Type, Authorization, Accept".to_string(),
            allow_credentials: false,
            max_age: 86400,
        }
    }

    pub fn allow_origin(mut self, origin: &str) -> Self {
        self.allow_origin = origin.to_string();
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for CorsMiddleware {
    async fn handle(&self, mut ctx: Context, next: Next) -> Result<Context, Error> {
        // Preflight requests are answered here, nothing downstream runs
        if ctx.req.method == "OPTIONS" {
            let mut response = HttpResponse::no_content()
                .with_header("Access-Control-Allow-Origin", self.allow_origin.clone())
                .with_header("Access-Control-Allow-Methods", self.allow_methods.clone())
                .with_header("Access-Control-Allow-Headers", self.allow_headers.clone())
                .with_header("Access-Control-Max-Age", self.max_age.to_string());

            if self.allow_credentials {
                response.set_header("Access-Control-Allow-Credentials", "true");
            }

            ctx.set_response(response);
            return Ok(ctx);
        }

        let mut ctx = next(ctx).await?;

        if let Some(response) = ctx.response_mut() {
            response.set_header("Access-Control-Allow-Origin", self.allow_origin.clone());
            if self.allow_credentials {
                response.set_header("Access-Control-Allow-Credentials", "true");
            }
        }

        Ok(ctx)
    }
}

/// Request ID middleware
///
/// Reuses an incoming `x-request-id` header or generates a fresh UUID, and
/// mirrors it onto the response.
pub struct RequestIdMiddleware;

#[async_trait]
impl Middleware for RequestIdMiddleware {
    async fn handle(&self, mut ctx: Context, next: Next) -> Result<Context, Error> {
        let request_id = ctx
            .req
            .header("x-request-id")
            .cloned()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        ctx.req
            .headers
            .insert("x-request-id".to_string(), request_id.clone());

        let mut ctx = next(ctx).await?;
        if let Some(response) = ctx.response_mut() {
            response.set_header("x-request-id", request_id);
        }

        Ok(ctx)
    }
}

/// Request/response logging middleware
///
/// Logs method and path on the way in, status and duration on the way out.
pub struct RequestLogger;

#[async_trait]
impl Middleware for RequestLogger {
    async fn handle(&self, ctx: Context, next: Next) -> Result<Context, Error> {
        let start = std::time::Instant::now();
        let method = ctx.req.method.clone();
        let path = ctx.req.path.clone();

        info!(method = %method, path = %path, "request received");

        let result = next(ctx).await;
        let duration = start.elapsed();

        match &result {
            Ok(ctx) => {
                let status = ctx.response().map(|r| r.status).unwrap_or(0);
                info!(
                    method = %method,
                    path = %path,
                    status = status,
                    duration_ms = duration.as_millis() as u64,
                    "request completed"
                );
            }
            Err(err) => {
                error!(
                    method = %method,
                    path = %path,
                    duration_ms = duration.as_millis() as u64,
                    error = %err,
                    "request failed"
                );
            }
        }

        result
    }
}

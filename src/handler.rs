// Terminal handler dispatch
//
// Handlers are specialized at compile time for each unique handler type and
// type-erased only at storage time, so the compiler can inline the handler
// body behind a single vtable hop.
//
// A handler receives the request context by value and hands it back. It
// finalizes the context by setting a response; a handler that returns the
// context untouched leaves finalization to some outer stage (or trips the
// dispatcher's finalization check).

use crate::{Context, Error};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

/// A terminal handler at the end of a middleware chain.
///
/// Unlike a [`Middleware`](crate::Middleware), a handler is never given a
/// continuation: there is nothing downstream of it.
pub trait Handler: Clone + Send + Sync + 'static {
    /// The future returned by `call`.
    ///
    /// An associated type instead of `Box<dyn Future>` lets the compiler
    /// monomorphize the future and inline the handler body.
    type Future: Future<Output = Result<Context, Error>> + Send + 'static;

    fn call(&self, ctx: Context) -> Self::Future;
}

/// Conversion from plain async functions into handlers.
pub trait IntoHandler<Args>: Clone + Send + Sync + 'static {
    type Handler: Handler;

    fn into_handler(self) -> Self::Handler;
}

/// Handler wrapping `async fn(Context) -> Result<Context, Error>`.
#[derive(Clone)]
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    #[inline(always)]
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Context) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Context, Error>> + Send + 'static,
{
    type Future = Fut;

    #[inline(always)]
    fn call(&self, ctx: Context) -> Self::Future {
        (self.f)(ctx)
    }
}

impl<F, Fut> IntoHandler<(Context,)> for F
where
    F: Fn(Context) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Context, Error>> + Send + 'static,
{
    type Handler = FnHandler<F>;

    #[inline(always)]
    fn into_handler(self) -> Self::Handler {
        FnHandler::new(self)
    }
}

/// Type-erased handler for storage in route chains.
///
/// `Handler` keeps the future monomorphized; erasure happens here so
/// different handlers can share one `Vec`. The inner call still goes through
/// the specialized implementation.
pub struct BoxedHandler {
    inner: Arc<dyn ErasedHandler>,
}

impl BoxedHandler {
    #[inline]
    pub fn new<H: Handler>(handler: H) -> Self {
        Self {
            inner: Arc::new(HandlerWrapper {
                handler,
                _marker: PhantomData,
            }),
        }
    }

    #[inline(always)]
    pub fn call(
        &self,
        ctx: Context,
    ) -> Pin<Box<dyn Future<Output = Result<Context, Error>> + Send>> {
        self.inner.call(ctx)
    }
}

impl Clone for BoxedHandler {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BoxedHandler")
    }
}

trait ErasedHandler: Send + Sync {
    fn call(&self, ctx: Context)
        -> Pin<Box<dyn Future<Output = Result<Context, Error>> + Send>>;
}

struct HandlerWrapper<H: Handler> {
    handler: H,
    _marker: PhantomData<fn() -> H::Future>,
}

impl<H: Handler> ErasedHandler for HandlerWrapper<H> {
    #[inline(always)]
    fn call(
        &self,
        ctx: Context,
    ) -> Pin<Box<dyn Future<Output = Result<Context, Error>> + Send>> {
        Box::pin(self.handler.call(ctx))
    }
}

/// Create a type-erased handler from a function.
///
/// # Example
///
/// ```ignore
/// use switchback::{handler, Context, Error, HttpResponse};
///
/// async fn hello(ctx: Context) -> Result<Context, Error> {
///     Ok(ctx.with_response(HttpResponse::ok().with_body(b"hello".to_vec())))
/// }
///
/// let h = handler(hello);
/// ```
#[inline]
pub fn handler<H, Args>(h: H) -> BoxedHandler
where
    H: IntoHandler<Args>,
{
    BoxedHandler::new(h.into_handler())
}

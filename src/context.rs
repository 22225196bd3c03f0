// Per-request context passed through the middleware pipeline

use crate::{HttpRequest, HttpResponse};

/// Mutable carrier for one request's trip through the pipeline.
///
/// Each request owns exactly one `Context`; stages receive it by value and
/// hand it back through the continuation, so no locking is ever involved.
/// Setting a response finalizes the context; the dispatcher refuses to
/// complete a request whose context was never finalized.
#[derive(Debug)]
pub struct Context {
    pub req: HttpRequest,
    response: Option<HttpResponse>,
    finalized: bool,
}

impl Context {
    pub fn new(req: HttpRequest) -> Self {
        Self {
            req,
            response: None,
            finalized: false,
        }
    }

    /// The response set so far, if any
    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    /// Mutable access to the response, for post-phase rewriting
    pub fn response_mut(&mut self) -> Option<&mut HttpResponse> {
        self.response.as_mut()
    }

    /// Set (or replace) the response and finalize the context.
    ///
    /// Last write wins: an outer middleware running after its continuation
    /// returns may overwrite whatever a downstream handler produced.
    pub fn set_response(&mut self, response: HttpResponse) {
        self.response = Some(response);
        self.finalized = true;
    }

    /// Builder form of [`set_response`](Self::set_response)
    pub fn with_response(mut self, response: HttpResponse) -> Self {
        self.set_response(response);
        self
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The response sent when no route matched
    pub fn not_found_response(&self) -> HttpResponse {
        HttpResponse::not_found()
    }

    /// Consume the context, yielding the finalized response.
    ///
    /// Falls back to an empty 404 if nothing was set; the dispatcher checks
    /// the finalization invariant before calling this.
    pub fn into_response(self) -> HttpResponse {
        match self.response {
            Some(response) => response,
            None => HttpResponse::not_found(),
        }
    }

    /// Get a captured path parameter by name
    pub fn param(&self, name: &str) -> Option<&String> {
        self.req.param(name)
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&String> {
        self.req.query(name)
    }
}

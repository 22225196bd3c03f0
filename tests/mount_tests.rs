use std::sync::{Arc, Mutex};
use switchback::middleware::from_fn;
use switchback::{handler, BoxedHandler, Context, HttpRequest, HttpResponse, Next, Router};

fn get(path: &str) -> HttpRequest {
    HttpRequest::new("GET".to_string(), path.to_string())
}

fn text(body: &'static str) -> BoxedHandler {
    handler(move |ctx: Context| async move {
        Ok(ctx.with_response(HttpResponse::ok().with_body(body.as_bytes().to_vec())))
    })
}

fn append_header(name: &'static str, value: &'static str) -> Arc<dyn switchback::Middleware> {
    from_fn(move |ctx: Context, next: Next| async move {
        let mut ctx = next(ctx).await?;
        if let Some(response) = ctx.response_mut() {
            response.set_header(name, value);
        }
        Ok(ctx)
    })
}

#[tokio::test]
async fn test_mounted_routes_are_prefixed() {
    let mut api = Router::new();
    api.get("/posts", text("posts")).unwrap();
    api.get("/posts/:id", text("one post")).unwrap();

    let mut root = Router::new();
    root.mount("/api", api).unwrap();
    let app = root.build();

    assert_eq!(app.handle(get("/api/posts")).await.body, b"posts");
    assert_eq!(app.handle(get("/api/posts/1")).await.body, b"one post");

    // Unprefixed paths do not exist
    assert_eq!(app.handle(get("/posts")).await.status, 404);
}

#[tokio::test]
async fn test_mounted_params_still_captured() {
    let mut api = Router::new();
    api.get(
        "/users/:id",
        handler(|ctx: Context| async move {
            let id = ctx.param("id").cloned().unwrap_or_default();
            Ok(ctx.with_response(HttpResponse::ok().with_body(id.into_bytes())))
        }),
    )
    .unwrap();

    let mut root = Router::new();
    root.mount("/api", api).unwrap();
    let app = root.build();

    assert_eq!(app.handle(get("/api/users/7")).await.body, b"7");
}

#[tokio::test]
async fn test_two_routers_mounted_at_same_prefix() {
    // Generic middleware router mounted first, API router second: the
    // middleware wraps the API handlers.
    let mut shared = Router::new();
    shared
        .use_middleware("*", append_header("x-custom-b", "b"))
        .unwrap();

    let mut api = Router::new();
    api.use_middleware("*", append_header("x-custom-a", "a"))
        .unwrap();
    api.get("/posts", text("posts")).unwrap();

    let mut root = Router::new();
    root.mount("/api", shared).unwrap();
    root.mount("/api", api).unwrap();
    let app = root.build();

    let response = app.handle(get("/api/posts")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"posts");
    assert_eq!(response.header("x-custom-a"), Some("a"));
    assert_eq!(response.header("x-custom-b"), Some("b"));

    assert_eq!(app.handle(get("/posts")).await.status, 404);
}

#[tokio::test]
async fn test_mount_preserves_relative_middleware_order() {
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let tracer = |tag: &'static str, log: Arc<Mutex<Vec<&'static str>>>| {
        from_fn(move |ctx: Context, next: Next| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(tag);
                next(ctx).await
            }
        })
    };

    let mut first = Router::new();
    first
        .use_middleware("*", tracer("first", log.clone()))
        .unwrap();

    let mut second = Router::new();
    second
        .use_middleware("*", tracer("second", log.clone()))
        .unwrap();
    second.get("/posts", text("posts")).unwrap();

    let mut root = Router::new();
    root.mount("/api", first).unwrap();
    root.mount("/api", second).unwrap();
    let app = root.build();

    app.handle(get("/api/posts")).await;
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_nested_mounts_compose_prefixes() {
    let mut v1 = Router::new();
    v1.get("/status", text("ok")).unwrap();

    let mut api = Router::new();
    api.mount("/v1", v1).unwrap();

    let mut root = Router::new();
    root.mount("/api", api).unwrap();
    let app = root.build();

    assert_eq!(app.handle(get("/api/v1/status")).await.body, b"ok");
}

#[tokio::test]
async fn test_mounted_wildcard_middleware_scoped_to_prefix() {
    let mut api = Router::new();
    api.use_middleware("*", append_header("x-api", "yes")).unwrap();
    api.get("/posts", text("posts")).unwrap();

    let mut root = Router::new();
    root.get("/home", text("home")).unwrap();
    root.mount("/api", api).unwrap();
    let app = root.build();

    // Inside the prefix the middleware runs
    let response = app.handle(get("/api/posts")).await;
    assert_eq!(response.header("x-api"), Some("yes"));

    // Outside it does not
    let response = app.handle(get("/home")).await;
    assert_eq!(response.header("x-api"), None);
}

#[tokio::test]
async fn test_mount_root_pattern() {
    let mut api = Router::new();
    api.get("/", text("api root")).unwrap();

    let mut root = Router::new();
    root.mount("/api", api).unwrap();
    let app = root.build();

    assert_eq!(app.handle(get("/api")).await.body, b"api root");
}

#[tokio::test]
async fn test_mount_conflict_detected() {
    let mut api = Router::new();
    api.get("/:id/:action", text("broad")).unwrap();

    let mut root = Router::new();
    root.get("/api/posts/:id", text("narrow")).unwrap();

    let result = root.mount("/api", api);
    assert!(matches!(
        result,
        Err(switchback::Error::DuplicateParamName(_, _))
    ));
}

//! Live server tests over raw HTTP/1.1.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::json;
use sprig::{App, Error, Request, Response};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn hello(_req: Request, res: Response) -> Result<(), Error> {
    res.json(&json!({ "message": "Hello World!" }))
}

async fn create_user(req: Request, res: Response) -> Result<(), Error> {
    #[derive(serde::Deserialize)]
    struct NewUser {
        name: String,
        email: String,
    }

    let user: NewUser = req.body().deserialize()?;
    res.status(201).json(&json!({ "name": user.name, "email": user.email }))
}

async fn explode(_req: Request, _res: Response) -> Result<(), Error> {
    Err(Error::NoResponse)
}

/// Send one request with `Connection: close` and return the raw response.
async fn exchange(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    raw
}

fn post(path: &str, content_type: &str, body: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
         Content-Type: {content_type}\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
}

fn get(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
}

async fn start(app: &App) -> (sprig::Server, SocketAddr) {
    let server = app.listen(0, |_| {}).await.unwrap();
    let addr = SocketAddr::from(([127, 0, 0, 1], server.local_addr().port()));
    (server, addr)
}

#[tokio::test]
async fn serves_registered_routes() {
    let mut app = App::new();
    app.get("/", hello).post("/users", create_user);
    let (server, addr) = start(&app).await;

    let raw = exchange(addr, &get("/")).await;
    assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
    assert!(raw.contains("content-type: application/json"), "{raw}");
    assert!(raw.ends_with(r#"{"message":"Hello World!"}"#), "{raw}");

    let raw = exchange(addr, &post("/users", "application/json", r#"{"name":"ada","email":"a@b.c"}"#)).await;
    assert!(raw.starts_with("HTTP/1.1 201 Created"), "{raw}");
    assert!(raw.ends_with(r#"{"name":"ada","email":"a@b.c"}"#), "{raw}");

    let raw = exchange(addr, &post("/users", "application/x-www-form-urlencoded", "name=bob&email=b%40c.d")).await;
    assert!(raw.starts_with("HTTP/1.1 201 Created"), "{raw}");
    assert!(raw.ends_with(r#"{"name":"bob","email":"b@c.d"}"#), "{raw}");

    server.close().await;
}

#[tokio::test]
async fn post_to_unknown_path_is_404() {
    let mut app = App::new();
    app.get("/", hello);
    let (server, addr) = start(&app).await;

    let raw = exchange(addr, &post("/missing", "application/json", "{}")).await;
    assert!(raw.starts_with("HTTP/1.1 404 Not Found"), "{raw}");
    assert!(raw.contains("content-type: text/plain"), "{raw}");
    assert!(raw.ends_with("Route not found"), "{raw}");

    server.close().await;
}

#[tokio::test]
async fn throwing_handler_is_500() {
    let mut app = App::new();
    app.post("/explode", explode);
    let (server, addr) = start(&app).await;

    let raw = exchange(addr, &post("/explode", "text/plain", "x")).await;
    assert!(raw.starts_with("HTTP/1.1 500 Internal Server Error"), "{raw}");
    assert!(raw.ends_with(r#"{"error":"Internal server error"}"#), "{raw}");

    server.close().await;
}

#[tokio::test]
async fn callback_runs_once_bound() {
    let app = App::new();
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);

    let server = app
        .listen(0, move |addr| {
            assert_ne!(addr.port(), 0);
            flag.store(true, Ordering::SeqCst);
        })
        .await
        .unwrap();

    assert!(called.load(Ordering::SeqCst));
    server.close().await;
}

#[tokio::test]
async fn routes_are_fixed_at_listen_time() {
    let mut app = App::new();
    app.get("/", hello);
    let (server, addr) = start(&app).await;

    app.get("/late", hello);
    let raw = exchange(addr, &get("/late")).await;
    assert!(raw.starts_with("HTTP/1.1 404"), "{raw}");

    server.close().await;
}

#[tokio::test]
async fn close_stops_accepting() {
    let app = App::new();
    let (server, addr) = start(&app).await;
    server.close().await;

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn close_does_not_wait_on_idle_keep_alive_connections() {
    let mut app = App::new();
    app.get("/", hello);
    let (server, addr) = start(&app).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();

    let body = r#"{"message":"Hello World!"}"#;
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    while !String::from_utf8_lossy(&raw).ends_with(body) {
        let n = stream.read(&mut buf).await.unwrap();
        assert_ne!(n, 0, "connection closed before the response was complete");
        raw.extend_from_slice(&buf[..n]);
    }
    assert!(raw.starts_with(b"HTTP/1.1 200 OK"));

    // The socket stays open and idle on the client side.
    tokio::time::timeout(Duration::from_secs(5), server.close())
        .await
        .expect("close should not wait for the client to hang up");

    // The server hung up its end.
    let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await.unwrap();
    assert!(matches!(n, Ok(0) | Err(_)));
}

#[tokio::test]
async fn binding_a_taken_port_fails() {
    let app = App::new();
    let server = app.listen_on("127.0.0.1:0".parse().unwrap(), |_| {}).await.unwrap();

    let err = app.listen_on(server.local_addr(), |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));

    server.close().await;
}

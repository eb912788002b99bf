//! # sprig
//!
//! A small HTTP application scaffold. Register handlers for paths, get the
//! request body decoded for you, answer through a tiny response view, and
//! reach a pooled MySQL connection from any handler.
//!
//! ## What it does
//!
//! - Routing by exact path or `:name` segments, `GET` and `POST`
//! - JSON or form decoding of `POST` bodies
//! - `res.status(201).json(&value)` / `res.send("text")`
//! - `req.db().query(sql, params)` against a 10-connection pool
//! - One catch-all: a failing or panicking handler becomes a generic `500`
//!
//! ## What it leaves alone
//!
//! No middleware chain, no templates, no wildcard or regex routes, no body
//! size limit, no request timeout. Put a proxy in front for the last two.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use sprig::{App, DatabaseConfig, Error, Request, Response};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let mut app = App::new();
//!     app.get("/", hello)
//!         .get("/users/:id", get_user);
//!
//!     app.database(&DatabaseConfig::new("root", "admin", "testdb"))?;
//!
//!     let server = app.listen(5000, |addr| println!("listening on {addr}")).await?;
//!     server.shutdown_on_signal().await;
//!     app.close().await;
//!     Ok(())
//! }
//!
//! async fn hello(_req: Request, res: Response) -> Result<(), Error> {
//!     res.json(&json!({ "message": "Hello World!" }))
//! }
//!
//! async fn get_user(req: Request, res: Response) -> Result<(), Error> {
//!     let id = req.param("id").unwrap_or_default();
//!     match req.db().query("SELECT * FROM users WHERE id = ?", &[json!(id)]).await {
//!         Ok(users) => res.json(&users),
//!         Err(e) => res.status(500).json(&json!({ "error": e.to_string() })),
//!     }
//! }
//! ```

mod app;
mod dispatch;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod body;
pub mod config;
pub mod db;

pub use app::App;
pub use body::{Body, Form, FormValue};
pub use config::Config;
pub use db::{Database, DatabaseConfig, ExecResult, Row};
pub use error::{BoxError, Error};
pub use handler::{Handler, HandlerResult};
pub use method::Method;
pub use request::Request;
pub use response::Response;
pub use router::{Params, RouteMatch, Router};
pub use server::Server;

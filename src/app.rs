//! The framework instance.

use std::net::{Ipv4Addr, SocketAddr};

use bytes::Bytes;
use http_body_util::Full;
use serde_json::Value;

use crate::config::Config;
use crate::db::{Database, DatabaseConfig, ExecResult, Row};
use crate::dispatch::{Shared, dispatch};
use crate::error::{BoxError, Error};
use crate::handler::Handler;
use crate::method::Method;
use crate::router::{RouteMatch, Router};
use crate::server::Server;

/// Routes plus the database gateway they share.
///
/// Register routes, optionally configure a database, then
/// [`listen`](App::listen). Each `App` owns its own pool; several can live in
/// one process.
#[derive(Default)]
pub struct App {
    router: Router,
    db: Database,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// An app serving a route table built up front with the [`Router`]
    /// builder. Further `get`/`post` calls add to it.
    pub fn with_router(router: Router) -> Self {
        Self { router, db: Database::default() }
    }

    /// An app with the `[database]` section of `config` applied, if any.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let app = Self::new();
        if let Some(db) = &config.database {
            app.database(db)?;
        }
        Ok(app)
    }

    /// Register a `GET` handler. Re-registering a pattern replaces its handler.
    pub fn get(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.router.insert(Method::Get, pattern, handler.into_boxed_handler());
        self
    }

    /// Register a `POST` handler. Re-registering a pattern replaces its handler.
    pub fn post(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.router.insert(Method::Post, pattern, handler.into_boxed_handler());
        self
    }

    /// Configure the database, replacing any earlier configuration and pool.
    ///
    /// Must be called inside a tokio runtime. No connection is opened yet.
    pub fn database(&self, config: &DatabaseConfig) -> Result<(), Error> {
        self.db.configure(config)
    }

    /// Run `sql` against the pool; see [`Database::query`].
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        self.db.query(sql, params).await
    }

    /// Run a write statement against the pool; see [`Database::execute`].
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, Error> {
        self.db.execute(sql, params).await
    }

    /// Resolve a method and path the way the dispatcher does.
    pub fn match_route(&self, method: &str, path: &str) -> Option<RouteMatch> {
        self.router.lookup(method, path)
    }

    pub fn router(&self) -> &Router { &self.router }
    pub fn db(&self) -> &Database { &self.db }

    /// Answer one request in-process, without a socket.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        dispatch(&self.router, &self.db, req).await
    }

    /// Listen on `0.0.0.0:port`. `on_listening` runs once the socket is bound.
    ///
    /// The route table is copied at this point; routes registered later do
    /// not reach this server. The database handle is shared.
    pub async fn listen<F>(&self, port: u16, on_listening: F) -> Result<Server, Error>
    where
        F: FnOnce(SocketAddr),
    {
        self.listen_on(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), on_listening).await
    }

    /// Like [`listen`](App::listen), on an explicit address.
    pub async fn listen_on<F>(&self, addr: SocketAddr, on_listening: F) -> Result<Server, Error>
    where
        F: FnOnce(SocketAddr),
    {
        let shared = Shared { router: self.router.clone(), db: self.db.clone() };
        Server::start(shared, addr, on_listening).await
    }

    /// Close the database pool if there is one. Does not stop servers.
    pub async fn close(&self) {
        self.db.close().await;
    }
}

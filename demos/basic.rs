//! Minimal sprig app: a JSON hello, a user lookup and a user insert.
//!
//! Run with:
//!   cargo run --example basic                 # no database
//!   cargo run --example basic -- sprig.toml   # with a [database] section
//!
//! Try:
//!   curl http://localhost:5000/
//!   curl http://localhost:5000/users/42
//!   curl -X POST http://localhost:5000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice","email":"alice@example.com"}'

use serde::Deserialize;
use serde_json::json;
use sprig::{App, Config, Error, Request, Response};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config { port: 5000, ..Config::default() },
    };

    let filter = config
        .log
        .as_deref()
        .map(EnvFilter::new)
        .unwrap_or_else(EnvFilter::from_default_env);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut app = App::from_config(&config)?;
    app.get("/", hello)
        .get("/users/:id", get_user)
        .post("/users", create_user);

    let server = app
        .listen_on(config.socket_addr()?, |addr| info!("server running on {addr}"))
        .await?;

    server.shutdown_on_signal().await;
    app.close().await;
    Ok(())
}

// GET /
async fn hello(_req: Request, res: Response) -> Result<(), Error> {
    res.json(&json!({ "message": "Hello World!" }))
}

// GET /users/:id
async fn get_user(req: Request, res: Response) -> Result<(), Error> {
    let id = req.param("id").unwrap_or_default();
    match req.db().query("SELECT * FROM users WHERE id = ?", &[json!(id)]).await {
        Ok(users) => res.json(&users),
        Err(e) => res.status(500).json(&json!({ "error": e.to_string() })),
    }
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
    email: String,
}

// POST /users
async fn create_user(req: Request, res: Response) -> Result<(), Error> {
    let Ok(user) = req.body().deserialize::<NewUser>() else {
        return res.status(400).json(&json!({ "error": "name and email are required" }));
    };

    match req
        .db()
        .execute("INSERT INTO users (name, email) VALUES (?, ?)", &[json!(user.name), json!(user.email)])
        .await
    {
        Ok(done) => res.json(&json!({ "id": done.insert_id, "name": user.name, "email": user.email })),
        Err(e) => res.status(500).json(&json!({ "error": e.to_string() })),
    }
}

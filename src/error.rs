//! Unified error type.

/// A boxed, thread-safe error. Handlers may fail with anything that converts
/// into one.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by sprig's fallible operations.
///
/// A routing miss is not an error: it is answered with `404 Route not found`.
/// Everything that reaches the dispatcher as an `Error` becomes a generic
/// `500` on the wire; the detail only goes to the log.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A query was attempted before [`App::database`](crate::App::database).
    #[error("database not configured, call App::database() first")]
    NotConfigured,

    /// Driver failure, passed through as-is.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// The pool spawns maintenance tasks and needs a tokio runtime to do so.
    #[error("database pool must be created inside a tokio runtime")]
    NoRuntime,

    /// The request body stream failed before end-of-stream.
    #[error("reading request body: {0}")]
    Body(#[source] BoxError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A handler returned an error.
    #[error("handler: {0}")]
    Handler(#[source] BoxError),

    #[error("handler panicked")]
    Panic,

    /// The handler finished and dropped its [`Response`](crate::Response)
    /// without sending anything.
    #[error("handler returned without sending a response")]
    NoResponse,
}

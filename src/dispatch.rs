//! Per-request orchestration.
//!
//! ```text
//! adapt ─▶ match ─┬─ miss ─────────────────────────────▶ 404 "Route not found"
//!                 └─ hit ─▶ params ─▶ body (POST only) ─▶ bind db ─▶ handler
//! any error on the way ─────────────────────────────────▶ 500 {"error":"Internal server error"}
//! ```
//!
//! Steps run strictly in that order for one request. Nothing is shared
//! between requests except the read-only route table and the pool handle.

use http::header::CONTENT_TYPE;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, error, warn};

use crate::body;
use crate::db::Database;
use crate::error::{BoxError, Error};
use crate::request::Request;
use crate::response::{HttpResponse, Pending, Response, internal_error};
use crate::router::Router;

/// Everything a running server needs to answer a request.
pub(crate) struct Shared {
    pub(crate) router: Router,
    pub(crate) db: Database,
}

/// Route one request and produce exactly one response.
///
/// Never fails: errors become the generic `500` and are logged here.
pub(crate) async fn dispatch<B>(router: &Router, db: &Database, req: http::Request<B>) -> HttpResponse
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    match route(router, db, req).await {
        Ok(response) => {
            debug!(%method, %path, status = response.status().as_u16(), "request");
            response
        }
        Err(e) => {
            error!(%method, %path, error = %e, "server error");
            internal_error()
        }
    }
}

async fn route<B>(router: &Router, db: &Database, req: http::Request<B>) -> Result<HttpResponse, Error>
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    let (parts, body) = req.into_parts();
    let mut request = Request::from_parts(parts);
    let (response, pending) = Response::channel();

    let Some(matched) = router.lookup(request.method().as_str(), request.path()) else {
        response.status(404).send("Route not found")?;
        return pending.await.map_err(|_| Error::NoResponse);
    };
    debug!(route = matched.pattern(), "matched");

    let (handler, params) = matched.into_parts();
    request.params = params;

    if *request.method() == http::Method::POST {
        let content_type = request.header(CONTENT_TYPE.as_str()).map(str::to_owned);
        request.body = body::parse(content_type.as_deref(), body).await?;
    }

    request.db = db.clone();

    // Own task, so a panic is contained and reported like any other failure.
    match tokio::spawn(handler.call(request, response)).await {
        Ok(Ok(())) => pending.await.map_err(|_| Error::NoResponse),
        Ok(Err(e)) => settle_after_failure(pending, Error::Handler(e)),
        Err(join) if join.is_panic() => settle_after_failure(pending, Error::Panic),
        Err(join) => settle_after_failure(pending, Error::Handler(Box::new(join))),
    }
}

/// A failed handler may already have answered. That answer stands; the error
/// is only logged.
fn settle_after_failure(mut pending: Pending, err: Error) -> Result<HttpResponse, Error> {
    match pending.try_recv() {
        Ok(sent) => {
            warn!(error = %err, "handler failed after responding");
            Ok(sent)
        }
        Err(TryRecvError::Empty | TryRecvError::Closed) => Err(err),
    }
}

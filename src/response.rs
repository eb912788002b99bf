//! Outgoing HTTP response view.
//!
//! A handler gets a [`Response`] by value and finishes it with exactly one
//! call to [`json`](Response::json) or [`send`](Response::send). Both take
//! `self`, so a second write does not compile.

use std::fmt;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::Error;

/// The wire response the dispatcher writes back.
pub(crate) type HttpResponse = http::Response<Full<Bytes>>;

/// Receiving end of a [`Response`]; resolves once the handler sends.
pub(crate) type Pending = oneshot::Receiver<HttpResponse>;

/// The response view handed to every handler.
///
/// ```rust,no_run
/// use sprig::{Error, Request, Response};
///
/// async fn missing(_req: Request, res: Response) -> Result<(), Error> {
///     res.status(404).json(&serde_json::json!({ "error": "no such user" }))
/// }
/// ```
#[derive(Debug)]
pub struct Response {
    status: u16,
    tx: oneshot::Sender<HttpResponse>,
}

impl Response {
    pub(crate) fn channel() -> (Self, Pending) {
        let (tx, rx) = oneshot::channel();
        (Self { status: StatusCode::OK.as_u16(), tx }, rx)
    }

    /// Set the status code. Returns `self` so calls chain:
    /// `res.status(201).json(&user)`.
    pub fn status(mut self, code: u16) -> Self {
        self.status = code;
        self
    }

    /// The status code that will be written. `200` unless set.
    pub fn status_code(&self) -> u16 { self.status }

    /// Serialize `data` and finish with `content-type: application/json`.
    pub fn json<T: Serialize + ?Sized>(self, data: &T) -> Result<(), Error> {
        let body = serde_json::to_vec(data)?;
        self.finish("application/json", body)
    }

    /// Stringify `data` and finish with `content-type: text/plain`.
    pub fn send(self, data: impl fmt::Display) -> Result<(), Error> {
        self.finish("text/plain", data.to_string().into_bytes())
    }

    fn finish(self, content_type: &'static str, body: Vec<u8>) -> Result<(), Error> {
        let status = StatusCode::from_u16(self.status).map_err(|_| Error::InvalidStatus(self.status))?;

        let mut response = http::Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));

        // The receiver only goes away with the connection; nobody is left to answer.
        let _ = self.tx.send(response);
        Ok(())
    }
}

/// The catch-all answer: `500` with a fixed JSON body and no detail.
pub(crate) fn internal_error() -> HttpResponse {
    let mut response = http::Response::new(Full::new(Bytes::from_static(
        br#"{"error":"Internal server error"}"#,
    )));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

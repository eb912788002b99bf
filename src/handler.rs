//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The route table holds handlers of *different* concrete types side by side,
//! so each one is hidden behind a trait object (`dyn ErasedHandler`).
//!
//! ```text
//! async fn hello(req: Request, res: Response) -> Result<(), Error> { … }
//!        ↓ app.get("/", hello)
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← stored as BoxedHandler
//!        ↓
//! handler.call(req, res)  at request time          ← one vtable dispatch
//!        ↓
//! Box::pin(async { hello(req, res).await.into_result() })
//! ```
//!
//! A handler answers through its [`Response`] view, not through its return
//! value. The return value only says whether it failed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::BoxError;
use crate::request::Request;
use crate::response::Response;

/// A heap-allocated, type-erased handler future.
///
/// `Send + 'static` because the dispatcher runs it on its own tokio task, which
/// is also what lets a panicking handler be turned into a `500`.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request, res: Response) -> BoxFuture;
}

/// A type-erased handler shared by every request that hits its route.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── HandlerResult ─────────────────────────────────────────────────────────────

/// What a handler may return.
///
/// `()` for handlers that cannot fail, or `Result<(), E>` for any error type
/// convertible into [`BoxError`], so `?` works on database calls and on
/// [`Response::json`].
pub trait HandlerResult {
    fn into_result(self) -> Result<(), BoxError>;
}

impl HandlerResult for () {
    fn into_result(self) -> Result<(), BoxError> { Ok(()) }
}

impl<E> HandlerResult for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_result(self) -> Result<(), BoxError> { self.map_err(Into::into) }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Satisfied automatically by any function with the shape:
///
/// ```text
/// async fn name(req: Request, res: Response) -> impl HandlerResult
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerResult + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerResult + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request, Response) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerResult + Send + 'static,
{
    fn call(&self, req: Request, res: Response) -> BoxFuture {
        let fut = (self.0)(req, res);
        Box::pin(async move { fut.await.into_result() })
    }
}

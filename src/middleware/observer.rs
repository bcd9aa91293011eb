//! Response status observer.
//!
//! Mirrors the status code and the number of body bytes actually written
//! into shared cells without changing what the client receives: headers,
//! frames, size hints and end-of-stream signalling are forwarded untouched.

use std::pin::Pin;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::StatusCode,
    response::Response,
};
use bytes::Bytes;
use http_body::{Frame, SizeHint};

/// Shared cells holding the observed status and byte count.
#[derive(Clone, Debug)]
pub struct StatusCapture {
    status: Arc<AtomicU16>,
    bytes: Arc<AtomicU64>,
}

impl StatusCapture {
    /// Starts out as `200 OK` with nothing written.
    pub fn new() -> Self {
        Self {
            status: Arc::new(AtomicU16::new(StatusCode::OK.as_u16())),
            bytes: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn status(&self) -> u16 {
        self.status.load(Ordering::Acquire)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Acquire)
    }

    fn record_status(&self, status: StatusCode) {
        self.status.store(status.as_u16(), Ordering::Release);
    }

    fn add_bytes(&self, len: usize) {
        self.bytes.fetch_add(len as u64, Ordering::AcqRel);
    }

    /// Records the response status and re-wraps its body so written bytes are
    /// counted. `on_complete` runs exactly once, when the body reaches its end
    /// or is dropped, whichever happens first.
    pub fn observe<F>(&self, response: Response, on_complete: F) -> Response
    where
        F: FnOnce() + Send + 'static,
    {
        self.record_status(response.status());

        let (parts, body) = response.into_parts();
        let body = ObservedBody {
            inner: body,
            capture: self.clone(),
            on_complete: Some(Box::new(on_complete)),
        };

        Response::from_parts(parts, Body::new(body))
    }
}

impl Default for StatusCapture {
    fn default() -> Self {
        Self::new()
    }
}

struct ObservedBody {
    inner: Body,
    capture: StatusCapture,
    on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl ObservedBody {
    fn complete(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete();
        }
    }
}

impl http_body::Body for ObservedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.capture.add_bytes(data.len());
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.complete(),
            Poll::Pending => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for ObservedBody {
    fn drop(&mut self) {
        self.complete();
    }
}

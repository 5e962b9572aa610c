//! # Request Context
//!
//! Every store, cache, repository and service call takes a [`RequestContext`].
//! It carries three things explicitly instead of through process-wide state:
//!
//! - a cancellation token, triggered by the caller (client disconnect, shutdown)
//! - an optional deadline
//! - the `tracing` span that log events of this request are parented to
//!
//! Adapters wrap their I/O in [`RequestContext::run`], which drops the
//! in-flight future as soon as the token fires or the deadline passes and
//! reports `Cancelled` / `DeadlineExceeded` with the operation tag.
//!
//! ```rust,ignore
//! let ctx = RequestContext::background().with_timeout(Duration::from_secs(5));
//! let song = repository.read(&ctx, &SongSearch::by_id(id)).await?;
//! ```

use crate::error::{LibraryError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

/// Why a guarded future did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    span: Span,
}

impl RequestContext {
    /// Context with no deadline and a disabled span.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            span: Span::none(),
        }
    }

    /// Bound this context by a relative timeout. An earlier existing deadline is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Derive a context that is cancelled with this one but can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            span: self.span.clone(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first. The future is dropped when interrupted.
    pub async fn guard<F: Future>(&self, fut: F) -> std::result::Result<F::Output, Interrupted> {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }

        let fut = fut.instrument(self.span.clone());
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(Interrupted::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => Err(Interrupted::DeadlineExceeded),
                    output = fut => Ok(output),
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(Interrupted::Cancelled),
                    output = fut => Ok(output),
                }
            }
        }
    }

    /// [`guard`](Self::guard) for library operations, tagging interruptions with `op`.
    pub async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.guard(fut).await {
            Ok(result) => result,
            Err(Interrupted::Cancelled) => Err(LibraryError::Cancelled { op }),
            Err(Interrupted::DeadlineExceeded) => Err(LibraryError::DeadlineExceeded { op }),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

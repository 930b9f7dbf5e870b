//! Single-shot result channel behind `Overlay::open_async`.
//!
//! The overlay side holds a [`Resolver`], the caller awaits an
//! [`OverlayCompletion`]. Resolving settles the channel and closes the
//! overlay in one step, so a value can never be delivered for an overlay
//! that stays on screen.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::OverlayError;
use crate::id::OverlayId;
use crate::record::CloseFn;

/// Create a linked resolver/completion pair for one overlay.
pub(crate) fn channel<T>(
    close: CloseFn,
    log_stale: bool,
) -> (Resolver<T>, OverlayCompletion<T>) {
    let (tx, rx) = oneshot::channel();
    let id = close.id().clone();
    let resolver = Resolver {
        result_tx: Arc::new(Mutex::new(Some(tx))),
        settled: Arc::new(AtomicBool::new(false)),
        close,
        log_stale,
    };
    let completion = OverlayCompletion {
        id,
        rx,
        dismissed: false,
    };
    (resolver, completion)
}

/// The `resolve` capability of an async overlay.
///
/// Cloneable so render functions can move it into event handlers. Only the
/// first `resolve` delivers a value; later calls are no-ops.
pub struct Resolver<T> {
    result_tx: Arc<Mutex<Option<oneshot::Sender<T>>>>,
    settled: Arc<AtomicBool>,
    close: CloseFn,
    log_stale: bool,
}

impl<T> Resolver<T> {
    /// Settle the awaiting caller with `value`, then close the overlay.
    pub fn resolve(&self, value: T) {
        let tx = self
            .result_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        match tx {
            Some(tx) => {
                self.settled.store(true, Ordering::SeqCst);
                // Receiver gone means the caller stopped waiting.
                let _ = tx.send(value);
                log::debug!("Overlay {} resolved", self.close.id());
            }
            None if self.log_stale => {
                log::debug!(
                    "Ignoring resolve on settled or closed overlay {}",
                    self.close.id()
                );
            }
            None => {}
        }

        self.close.close();
    }

    /// Whether a value has been delivered.
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    /// Id of the overlay this resolver belongs to.
    pub fn id(&self) -> &OverlayId {
        self.close.id()
    }

    /// Drop the sender without a value.
    ///
    /// Called when the record leaves the registry so that late `resolve`
    /// calls are absorbed and dismissible completions observe the close.
    pub(crate) fn dismiss(&self) {
        let tx = self
            .result_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if tx.is_some() {
            log::trace!("Overlay {} dismissed without a result", self.close.id());
        }
    }
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            result_tx: Arc::clone(&self.result_tx),
            settled: Arc::clone(&self.settled),
            close: self.close.clone(),
            log_stale: self.log_stale,
        }
    }
}

impl<T> std::fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("id", self.close.id())
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Future returned by `Overlay::open_async`.
///
/// Yields the first value passed to the overlay's [`Resolver`]. If the
/// overlay is closed without a value it stays pending forever; use
/// [`OverlayCompletion::dismissible`] to observe that case instead.
#[must_use = "the overlay result is lost unless the completion is awaited"]
pub struct OverlayCompletion<T> {
    id: OverlayId,
    rx: oneshot::Receiver<T>,
    dismissed: bool,
}

impl<T> OverlayCompletion<T> {
    /// Id of the overlay backing this completion.
    pub fn id(&self) -> &OverlayId {
        &self.id
    }

    /// Convert into a future that fails with [`OverlayError::Dismissed`]
    /// when the overlay is closed without a result.
    pub fn dismissible(self) -> Dismissible<T> {
        Dismissible {
            id: self.id,
            rx: self.rx,
        }
    }
}

impl<T> Future for OverlayCompletion<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        if this.dismissed {
            return Poll::Pending;
        }

        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            Poll::Ready(Err(_)) => {
                // Closed without a value: never settles.
                this.dismissed = true;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> std::fmt::Debug for OverlayCompletion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayCompletion")
            .field("id", &self.id)
            .finish()
    }
}

/// Completion that reports dismissal as an error.
#[must_use = "futures do nothing unless awaited"]
pub struct Dismissible<T> {
    id: OverlayId,
    rx: oneshot::Receiver<T>,
}

impl<T> Dismissible<T> {
    /// Id of the overlay backing this completion.
    pub fn id(&self) -> &OverlayId {
        &self.id
    }
}

impl<T> Future for Dismissible<T> {
    type Output = Result<T, OverlayError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(Ok(value)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(OverlayError::Dismissed {
                id: this.id.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use futures::FutureExt;

    use super::*;

    fn counting_close(id: &str) -> (CloseFn, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let close = CloseFn::new(OverlayId::from(id), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (close, calls)
    }

    #[test]
    fn test_resolve_settles_and_closes() {
        let (close, calls) = counting_close("a");
        let (resolver, completion) = channel::<u32>(close, false);

        resolver.resolve(7);

        assert!(resolver.is_settled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(completion.now_or_never(), Some(7));
    }

    #[test]
    fn test_second_resolve_is_ignored() {
        let (close, _) = counting_close("a");
        let (resolver, completion) = channel::<&str>(close, true);

        resolver.resolve("first");
        resolver.clone().resolve("second");

        assert_eq!(completion.now_or_never(), Some("first"));
    }

    #[test]
    fn test_dismissed_completion_stays_pending() {
        let (close, _) = counting_close("a");
        let (resolver, mut completion) = channel::<u32>(close, false);

        resolver.dismiss();

        assert!((&mut completion).now_or_never().is_none());
        assert!((&mut completion).now_or_never().is_none());
        resolver.resolve(1);
        assert!(completion.now_or_never().is_none());
        assert!(!resolver.is_settled());
    }

    #[test]
    fn test_dismissible_reports_dismissal() {
        let (close, _) = counting_close("confirm");
        let (resolver, completion) = channel::<u32>(close, false);
        let dismissible = completion.dismissible();

        resolver.dismiss();

        assert_eq!(
            dismissible.now_or_never(),
            Some(Err(OverlayError::Dismissed {
                id: OverlayId::from("confirm"),
            }))
        );
    }

    #[test]
    fn test_dropped_resolvers_dismiss() {
        let (close, _) = counting_close("a");
        let (resolver, completion) = channel::<u32>(close, false);
        let dismissible = completion.dismissible();

        drop(resolver);

        assert!(matches!(
            dismissible.now_or_never(),
            Some(Err(OverlayError::Dismissed { .. }))
        ));
    }
}

//! Overlay records and the props handed to render functions.
//!
//! A record is the stored state of one open overlay. Records come in two
//! kinds, tagged explicitly at construction:
//!
//! - [`StandardOverlay`]: closed through `on_request_close`, no value.
//! - [`AsyncOverlay`]: additionally carries a [`Resolver`] that hands a
//!   value back to the caller of `Overlay::open_async`.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::completion::Resolver;
use crate::id::OverlayId;

/// Render function of a standard overlay.
pub type RenderFn<N> = Arc<dyn Fn(&OverlayProps) -> N + Send + Sync>;

/// Render function of an async overlay resolving to `T`.
pub type AsyncRenderFn<N, T> = Arc<dyn Fn(&AsyncOverlayProps<T>) -> N + Send + Sync>;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Close callback bound to one overlay record.
///
/// Calling it removes the overlay from its registry. Calling it again, after
/// the record was replaced under the same id, or after the scope is gone,
/// does nothing.
#[derive(Clone)]
pub struct CloseFn {
    id: OverlayId,
    generation: u64,
    close: Arc<dyn Fn() + Send + Sync>,
}

impl CloseFn {
    /// Wrap a close callback for the given id.
    pub fn new(id: OverlayId, close: impl Fn() + Send + Sync + 'static) -> Self {
        Self::with_generation(id, next_generation(), close)
    }

    pub(crate) fn with_generation(
        id: OverlayId,
        generation: u64,
        close: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            generation,
            close: Arc::new(close),
        }
    }

    /// Close the overlay.
    pub fn close(&self) {
        (self.close)();
    }

    /// Id of the overlay this callback closes.
    pub fn id(&self) -> &OverlayId {
        &self.id
    }

    /// Token shared by clones of this callback and unique across callbacks.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

/// Allocate a close generation. Never returns the same value twice.
pub(crate) fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

impl std::fmt::Debug for CloseFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CloseFn").field(&self.id).finish()
    }
}

/// Props passed to a standard overlay's render function.
#[derive(Debug, Clone)]
pub struct OverlayProps {
    pub is_open: bool,
    pub on_request_close: CloseFn,
}

/// Props passed to an async overlay's render function.
#[derive(Debug)]
pub struct AsyncOverlayProps<T> {
    pub is_open: bool,
    pub on_request_close: CloseFn,
    /// Settles the awaiting caller with a value and closes the overlay.
    pub resolve: Resolver<T>,
}

impl<T> Clone for AsyncOverlayProps<T> {
    fn clone(&self) -> Self {
        Self {
            is_open: self.is_open,
            on_request_close: self.on_request_close.clone(),
            resolve: self.resolve.clone(),
        }
    }
}

/// Discriminant of an [`OverlayRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Standard,
    Async,
}

/// Stored state of a standard overlay.
pub struct StandardOverlay<N> {
    pub is_open: bool,
    pub render_overlay: RenderFn<N>,
    pub on_request_close: CloseFn,
}

impl<N> StandardOverlay<N> {
    /// Build the props for this overlay's render function.
    pub fn props(&self) -> OverlayProps {
        OverlayProps {
            is_open: self.is_open,
            on_request_close: self.on_request_close.clone(),
        }
    }

    /// Call the render function with this overlay's props.
    pub fn render(&self) -> N {
        (self.render_overlay)(&self.props())
    }
}

/// Type-erased half of an async overlay.
///
/// Lets records resolving to different types share one registry.
trait AsyncEntryDyn<N>: Send + Sync {
    fn render(&self, is_open: bool, on_request_close: &CloseFn) -> N;

    /// The typed `Resolver<T>`, for downcasting.
    fn resolver_any(&self) -> &dyn Any;

    fn result_type(&self) -> &'static str;

    fn is_settled(&self) -> bool;

    fn dismiss(&self);
}

struct AsyncEntry<N, T> {
    render_overlay: AsyncRenderFn<N, T>,
    resolve: Resolver<T>,
}

impl<N, T> AsyncEntryDyn<N> for AsyncEntry<N, T>
where
    N: 'static,
    T: Send + 'static,
{
    fn render(&self, is_open: bool, on_request_close: &CloseFn) -> N {
        let props = AsyncOverlayProps {
            is_open,
            on_request_close: on_request_close.clone(),
            resolve: self.resolve.clone(),
        };
        (self.render_overlay)(&props)
    }

    fn resolver_any(&self) -> &dyn Any {
        &self.resolve
    }

    fn result_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn is_settled(&self) -> bool {
        self.resolve.is_settled()
    }

    fn dismiss(&self) {
        self.resolve.dismiss();
    }
}

/// Stored state of an async overlay.
pub struct AsyncOverlay<N> {
    pub is_open: bool,
    pub on_request_close: CloseFn,
    entry: Arc<dyn AsyncEntryDyn<N>>,
}

impl<N: 'static> AsyncOverlay<N> {
    /// Create an async overlay record.
    pub fn new<T: Send + 'static>(
        on_request_close: CloseFn,
        render_overlay: AsyncRenderFn<N, T>,
        resolve: Resolver<T>,
    ) -> Self {
        Self {
            is_open: true,
            on_request_close,
            entry: Arc::new(AsyncEntry {
                render_overlay,
                resolve,
            }),
        }
    }
}

impl<N> AsyncOverlay<N> {
    /// Call the render function with this overlay's props.
    pub fn render(&self) -> N {
        self.entry.render(self.is_open, &self.on_request_close)
    }

    /// The typed resolve capability, if `T` is the overlay's result type.
    pub fn resolver<T: 'static>(&self) -> Option<Resolver<T>> {
        self.entry.resolver_any().downcast_ref::<Resolver<T>>().cloned()
    }

    /// Name of the result type, for diagnostics.
    pub fn result_type(&self) -> &'static str {
        self.entry.result_type()
    }

    /// Whether the overlay has delivered its value.
    pub fn is_settled(&self) -> bool {
        self.entry.is_settled()
    }
}

/// One open overlay as stored by the registry.
pub enum OverlayRecord<N> {
    Standard(StandardOverlay<N>),
    Async(AsyncOverlay<N>),
}

impl<N> OverlayRecord<N> {
    /// Create a standard record that is open.
    pub fn standard(on_request_close: CloseFn, render_overlay: RenderFn<N>) -> Self {
        Self::Standard(StandardOverlay {
            is_open: true,
            render_overlay,
            on_request_close,
        })
    }

    pub fn kind(&self) -> OverlayKind {
        match self {
            Self::Standard(_) => OverlayKind::Standard,
            Self::Async(_) => OverlayKind::Async,
        }
    }

    pub fn is_open(&self) -> bool {
        match self {
            Self::Standard(overlay) => overlay.is_open,
            Self::Async(overlay) => overlay.is_open,
        }
    }

    pub fn on_request_close(&self) -> &CloseFn {
        match self {
            Self::Standard(overlay) => &overlay.on_request_close,
            Self::Async(overlay) => &overlay.on_request_close,
        }
    }

    /// Render this record, dispatching on its kind.
    pub fn render(&self) -> N {
        match self {
            Self::Standard(overlay) => overlay.render(),
            Self::Async(overlay) => overlay.render(),
        }
    }

    /// The typed resolve capability of an async record.
    ///
    /// `None` for standard records and for a mismatched `T`.
    pub fn resolver<T: 'static>(&self) -> Option<Resolver<T>> {
        match self {
            Self::Standard(_) => None,
            Self::Async(overlay) => overlay.resolver(),
        }
    }

    /// Release resources tied to the record once it leaves the registry.
    pub(crate) fn retire(&self) {
        if let Self::Async(overlay) = self {
            overlay.entry.dismiss();
        }
    }
}

impl<N> std::fmt::Debug for OverlayRecord<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("OverlayRecord");
        s.field("kind", &self.kind())
            .field("id", self.on_request_close().id())
            .field("is_open", &self.is_open());
        if let Self::Async(overlay) = self {
            s.field("result_type", &overlay.result_type());
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::completion;

    fn noop_close(id: &str) -> CloseFn {
        CloseFn::new(OverlayId::from(id), || {})
    }

    #[test]
    fn test_standard_record_renders_with_props() {
        let render: RenderFn<String> = Arc::new(|props: &OverlayProps| {
            format!("{} open={}", props.on_request_close.id(), props.is_open)
        });
        let record = OverlayRecord::standard(noop_close("toast"), render);

        assert_eq!(record.kind(), OverlayKind::Standard);
        assert!(record.is_open());
        assert_eq!(record.render(), "toast open=true");
        assert!(record.resolver::<u32>().is_none());
    }

    #[test]
    fn test_async_record_exposes_typed_resolver() {
        let (resolver, _completion) = completion::channel::<u32>(noop_close("confirm"), false);
        let render: AsyncRenderFn<String, u32> = Arc::new(|props: &AsyncOverlayProps<u32>| {
            format!("settled={}", props.resolve.is_settled())
        });
        let record =
            OverlayRecord::Async(AsyncOverlay::new(noop_close("confirm"), render, resolver));

        assert_eq!(record.kind(), OverlayKind::Async);
        assert_eq!(record.render(), "settled=false");
        assert!(record.resolver::<u32>().is_some());
        assert!(record.resolver::<String>().is_none());
    }

    #[test]
    fn test_close_fn_calls_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let close = CloseFn::new(OverlayId::from("a"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        close.close();
        close.clone().close();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(format!("{:?}", close), "CloseFn(OverlayId(\"a\"))");
    }
}

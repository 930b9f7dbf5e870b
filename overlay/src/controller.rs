//! The overlay controller: the public surface for opening and closing overlays.

use std::sync::Arc;

use crate::completion::{self, OverlayCompletion};
use crate::config::OverlayConfig;
use crate::id::{IdGenerator, OverlayId};
use crate::record::{
    self, AsyncOverlay, AsyncOverlayProps, CloseFn, OverlayProps, OverlayRecord, RenderFn,
};
use crate::registry::OverlayRegistry;
use crate::render::OverlayRenderer;

/// An overlay scope.
///
/// Owns a registry and hands out overlays from anywhere that holds a handle:
/// views, event handlers, or spawned tasks. Cloning yields another handle to
/// the same scope. Independent scopes never share state.
///
/// # Example
///
/// ```
/// use overlay::Overlay;
///
/// let overlay: Overlay<String> = Overlay::new();
/// let close = overlay.open(|props| format!("Saved (open: {})", props.is_open));
/// assert_eq!(overlay.registry().len(), 1);
///
/// close.close();
/// assert!(overlay.registry().is_empty());
/// ```
pub struct Overlay<N> {
    registry: OverlayRegistry<N>,
    ids: Arc<dyn IdGenerator>,
    config: Arc<OverlayConfig>,
}

impl<N: 'static> Overlay<N> {
    /// Create a scope with the default configuration.
    pub fn new() -> Self {
        Self::with_config(OverlayConfig::default())
    }

    /// Create a scope with the given configuration.
    pub fn with_config(config: OverlayConfig) -> Self {
        Self {
            registry: OverlayRegistry::new(),
            ids: config.id_strategy.generator(),
            config: Arc::new(config),
        }
    }

    /// Open a standard overlay.
    ///
    /// `render_overlay` is stored for the render layer and not called here.
    /// Returns the overlay's close callback; the render function receives
    /// the same callback as `on_request_close`.
    pub fn open<F>(&self, render_overlay: F) -> CloseFn
    where
        F: Fn(&OverlayProps) -> N + Send + Sync + 'static,
    {
        self.open_shared(Arc::new(render_overlay))
    }

    /// Open a standard overlay from an already shared render function.
    ///
    /// The stored record points at the same allocation as `render_overlay`.
    pub fn open_shared(&self, render_overlay: RenderFn<N>) -> CloseFn {
        let id = self.ids.next_id();
        let close = self.close_fn(&id);
        let record = OverlayRecord::standard(close.clone(), render_overlay);

        log::debug!("[{}] Opening overlay {}", self.config.name, id);
        self.registry.add(id, record);
        close
    }

    /// Open an overlay that reports a value back to the caller.
    ///
    /// The render function receives a `resolve` capability. The first call
    /// to it settles the returned future and closes the overlay. If the
    /// overlay is closed some other way, the future never settles; see
    /// [`OverlayCompletion::dismissible`] for an explicit dismissal path.
    pub fn open_async<T, F>(&self, render_overlay: F) -> OverlayCompletion<T>
    where
        T: Send + 'static,
        F: Fn(&AsyncOverlayProps<T>) -> N + Send + Sync + 'static,
    {
        let id = self.ids.next_id();
        let close = self.close_fn(&id);
        let (resolver, completion) =
            completion::channel(close.clone(), self.config.log_stale_calls);
        let record =
            OverlayRecord::Async(AsyncOverlay::new(close, Arc::new(render_overlay), resolver));

        log::debug!(
            "[{}] Opening async overlay {} ({})",
            self.config.name,
            id,
            std::any::type_name::<T>()
        );
        self.registry.add(id, record);
        completion
    }

    /// Close every overlay in the scope.
    ///
    /// Completions of async overlays closed this way stay pending.
    pub fn close_all(&self) {
        log::debug!(
            "[{}] Closing all overlays ({} open)",
            self.config.name,
            self.registry.len()
        );
        self.registry.clear();
    }

    /// The scope's registry.
    pub fn registry(&self) -> &OverlayRegistry<N> {
        &self.registry
    }

    /// Look up an open overlay.
    pub fn get_overlay(&self, id: &OverlayId) -> Option<Arc<OverlayRecord<N>>> {
        self.registry.get(id)
    }

    /// A render layer bound to this scope.
    pub fn renderer(&self) -> OverlayRenderer<N> {
        OverlayRenderer::new(self.registry.clone(), self.config.container_id.clone())
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// End the scope: close every overlay and drop every listener.
    ///
    /// The scope remains usable afterwards and behaves as freshly created.
    pub fn dispose(&self) {
        self.close_all();
        self.registry.clear_listeners();
        log::debug!("[{}] Disposed", self.config.name);
    }

    fn close_fn(&self, id: &OverlayId) -> CloseFn {
        let registry = self.registry.downgrade();
        let target = id.clone();
        let scope = self.config.name;
        let log_stale = self.config.log_stale_calls;

        let generation = record::next_generation();

        CloseFn::with_generation(id.clone(), generation, move || {
            let removed = registry
                .upgrade()
                .is_some_and(|registry| registry.remove_generation(&target, generation));
            if removed {
                log::debug!("[{}] Closed overlay {}", scope, target);
            } else if log_stale {
                log::debug!("[{}] Ignoring close of overlay {} (not open)", scope, target);
            }
        })
    }
}

impl<N: 'static> Default for Overlay<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> Clone for Overlay<N> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            ids: Arc::clone(&self.ids),
            config: Arc::clone(&self.config),
        }
    }
}

impl<N> std::fmt::Debug for Overlay<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlay")
            .field("name", &self.config.name)
            .field("registry", &self.registry)
            .finish()
    }
}

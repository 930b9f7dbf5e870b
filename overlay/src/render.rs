//! Render layer: turns the registry into an ordered list of rendered nodes.
//!
//! The renderer walks the registry in stacking order and calls each record's
//! render function with props matching its kind. It never draws anything;
//! the resulting [`OverlayRoot`] is handed to the host UI, which mounts the
//! nodes above its normal content (later children on top).
//!
//! Two bindings keep the output current:
//!
//! - [`OverlayRenderer::bind`] re-renders synchronously inside the registry
//!   listener.
//! - [`OverlayRenderer::run`] is an async loop woken by registry changes
//!   that coalesces bursts of changes into one frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Notify;

use crate::id::OverlayId;
use crate::record::OverlayKind;
use crate::registry::{OverlayRegistry, Subscription, WeakOverlayRegistry};

/// One rendered overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOverlay<N> {
    pub id: OverlayId,
    pub kind: OverlayKind,
    pub node: N,
}

/// The overlay container, present only while at least one overlay is open.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayRoot<N> {
    /// Id of the container element.
    pub container_id: String,
    /// Rendered overlays, bottom first.
    pub children: Vec<RenderedOverlay<N>>,
}

impl<N> OverlayRoot<N> {
    /// Rendered nodes, bottom first.
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.children.iter().map(|child| &child.node)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Renders the overlays of one registry.
pub struct OverlayRenderer<N> {
    registry: OverlayRegistry<N>,
    container_id: String,
}

impl<N: 'static> OverlayRenderer<N> {
    /// Create a renderer for a registry.
    pub fn new(registry: OverlayRegistry<N>, container_id: impl Into<String>) -> Self {
        Self {
            registry,
            container_id: container_id.into(),
        }
    }

    /// Render the current overlays.
    ///
    /// Returns `None` when nothing is open: no container at all rather than
    /// an empty one, so host-side effects tied to the container (scroll
    /// lock, backdrop) switch off.
    pub fn render(&self) -> Option<OverlayRoot<N>> {
        render_registry(&self.registry, &self.container_id)
    }

    /// Render now and again after every registry change.
    ///
    /// Rendering happens synchronously inside the registry's notification.
    /// Changes made while a frame is being rendered, by a render function
    /// or by `on_frame` itself, are folded into a fresh render; only frames
    /// that match the registry are delivered, so the last frame always
    /// shows what is open. Dropping the returned subscription stops the
    /// updates.
    pub fn bind<F>(&self, on_frame: F) -> Subscription
    where
        F: Fn(Option<OverlayRoot<N>>) + Send + Sync + 'static,
    {
        let binding = Arc::new(Binding {
            registry: self.registry.downgrade(),
            container_id: self.container_id.clone(),
            on_frame,
            rendering: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
        });
        binding.refresh();

        self.registry.subscribe(move |_| binding.refresh())
    }

    /// Subscribe a wakeup to the registry.
    ///
    /// The wakeup drives [`OverlayRenderer::run`]; dropping the
    /// subscription (or disposing the scope) ends the loop.
    pub fn wakeup_channel(&self) -> (RenderWakeup, Subscription) {
        let shared = Arc::new(WakeupShared::default());
        let sender = WakeupSender {
            shared: Arc::clone(&shared),
        };
        let subscription = self.registry.subscribe(move |_| sender.wake());
        (RenderWakeup { shared }, subscription)
    }

    /// Render loop: one frame up front, then one per batch of changes.
    ///
    /// Returns once the wakeup's subscription is gone.
    pub async fn run(
        &self,
        wakeup: RenderWakeup,
        mut on_frame: impl FnMut(Option<OverlayRoot<N>>),
    ) {
        on_frame(self.render());

        while let Some(changes) = wakeup.changed().await {
            log::trace!("Overlay render loop woke up after {} change(s)", changes);
            on_frame(self.render());
        }

        log::debug!("Overlay render loop stopped");
    }
}

impl<N> Clone for OverlayRenderer<N> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            container_id: self.container_id.clone(),
        }
    }
}

/// Wakes [`OverlayRenderer::run`] after registry changes.
///
/// Changes arriving between two frames collapse into a single wakeup.
#[derive(Debug)]
pub struct RenderWakeup {
    shared: Arc<WakeupShared>,
}

impl RenderWakeup {
    /// Wait for the next batch of changes and return its size.
    ///
    /// Returns `None` once the registry listener is gone and every change
    /// seen before that has been reported.
    pub async fn changed(&self) -> Option<usize> {
        loop {
            let changes = self.shared.changes.swap(0, Ordering::SeqCst);
            if changes > 0 {
                return Some(changes);
            }
            if self.shared.closed.load(Ordering::SeqCst) {
                return None;
            }
            // A wake that lands before this await leaves a permit behind.
            self.shared.notify.notified().await;
        }
    }
}

#[derive(Debug, Default)]
struct WakeupShared {
    notify: Notify,
    changes: AtomicUsize,
    closed: AtomicBool,
}

/// Held by the registry listener. Dropping it closes the wakeup.
struct WakeupSender {
    shared: Arc<WakeupShared>,
}

impl WakeupSender {
    fn wake(&self) {
        self.shared.changes.fetch_add(1, Ordering::SeqCst);
        self.shared.notify.notify_one();
    }
}

impl Drop for WakeupSender {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.notify.notify_one();
    }
}

/// State of one [`OverlayRenderer::bind`] listener.
struct Binding<N, F> {
    registry: WeakOverlayRegistry<N>,
    container_id: String,
    on_frame: F,
    rendering: AtomicBool,
    dirty: AtomicBool,
}

impl<N, F> Binding<N, F>
where
    F: Fn(Option<OverlayRoot<N>>),
{
    fn refresh(&self) {
        self.dirty.store(true, Ordering::SeqCst);

        // Whoever holds `rendering` picks up the dirty flag; nested calls
        // from render functions or `on_frame` return here.
        while !self.rendering.swap(true, Ordering::SeqCst) {
            while self.dirty.swap(false, Ordering::SeqCst) {
                let Some(registry) = self.registry.upgrade() else {
                    break;
                };
                let frame = render_registry(&registry, &self.container_id);
                if self.dirty.load(Ordering::SeqCst) {
                    log::trace!("Overlay registry changed during render, rendering again");
                    continue;
                }
                (self.on_frame)(frame);
            }

            self.rendering.store(false, Ordering::SeqCst);
            if !self.dirty.load(Ordering::SeqCst) {
                break;
            }
        }
    }
}

fn render_registry<N>(
    registry: &OverlayRegistry<N>,
    container_id: &str,
) -> Option<OverlayRoot<N>> {
    // Render from a snapshot: render functions may close overlays while
    // they run, which must not touch the list being walked.
    let snapshot = registry.snapshot();
    if snapshot.is_empty() {
        return None;
    }

    let children = snapshot
        .into_iter()
        .map(|(id, record)| RenderedOverlay {
            kind: record.kind(),
            node: record.render(),
            id,
        })
        .collect();

    Some(OverlayRoot {
        container_id: container_id.to_string(),
        children,
    })
}

//! Overlay registry: the keyed store of open overlays plus their stacking order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::id::OverlayId;
use crate::record::OverlayRecord;

/// A change applied to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A new overlay was added on top of the stack.
    Added(OverlayId),
    /// An existing id was re-added; its record was replaced and moved to the top.
    Replaced(OverlayId),
    /// An overlay was removed.
    Removed(OverlayId),
    /// All overlays were removed.
    Cleared { count: usize },
}

type Listener = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_key: u64,
    entries: Vec<(u64, Listener)>,
}

struct RegistryState<N> {
    /// All open overlays.
    overlays: HashMap<OverlayId, Arc<OverlayRecord<N>>>,

    /// Stacking order, bottom first. Holds exactly the keys of `overlays`.
    order: Vec<OverlayId>,
}

struct Inner<N> {
    state: Mutex<RegistryState<N>>,
    listeners: Arc<Mutex<Listeners>>,
}

/// Registry of open overlays.
///
/// Cloning yields another handle to the same registry. Every mutation is
/// applied synchronously and listeners are notified before the mutating call
/// returns. The registry lock is never held while listeners run, so a
/// listener may read or mutate the registry.
pub struct OverlayRegistry<N> {
    inner: Arc<Inner<N>>,
}

impl<N> OverlayRegistry<N> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RegistryState {
                    overlays: HashMap::new(),
                    order: Vec::new(),
                }),
                listeners: Arc::new(Mutex::new(Listeners::default())),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState<N>> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an overlay on top of the stack.
    ///
    /// Re-adding an id that is already present replaces its record and moves
    /// it to the top; the order never holds duplicates. The replaced record
    /// is retired: its resolver is dismissed and its close callback no
    /// longer removes anything.
    pub fn add(&self, id: OverlayId, record: OverlayRecord<N>) {
        let replaced = {
            let mut state = self.state();
            let replaced = state.overlays.insert(id.clone(), Arc::new(record));
            if replaced.is_some() {
                state.order.retain(|i| i != &id);
            }
            state.order.push(id.clone());
            replaced
        };

        let event = match replaced {
            Some(old) => {
                old.retire();
                RegistryEvent::Replaced(id)
            }
            None => RegistryEvent::Added(id),
        };
        self.notify(&event);
    }

    /// Remove an overlay.
    ///
    /// Returns true if the overlay was present. Removing an unknown id does
    /// nothing.
    pub fn remove(&self, id: &OverlayId) -> bool {
        self.remove_where(id, |_| true)
    }

    /// Remove an overlay only if its stored record was opened with the close
    /// callback of `generation`.
    ///
    /// A close callback kept from a record that has since been replaced
    /// under the same id must not remove its successor.
    pub(crate) fn remove_generation(&self, id: &OverlayId, generation: u64) -> bool {
        self.remove_where(id, |record| record.on_request_close().generation() == generation)
    }

    fn remove_where(
        &self,
        id: &OverlayId,
        matches: impl FnOnce(&OverlayRecord<N>) -> bool,
    ) -> bool {
        let removed = {
            let mut state = self.state();
            if !state.overlays.get(id).is_some_and(|record| matches(record)) {
                return false;
            }
            let removed = state.overlays.remove(id);
            state.order.retain(|i| i != id);
            removed
        };

        let Some(record) = removed else {
            return false;
        };
        record.retire();
        self.notify(&RegistryEvent::Removed(id.clone()));
        true
    }

    /// Remove every overlay.
    pub fn clear(&self) {
        let drained: Vec<_> = {
            let mut state = self.state();
            state.order.clear();
            state.overlays.drain().map(|(_, record)| record).collect()
        };

        if drained.is_empty() {
            return;
        }
        for record in &drained {
            record.retire();
        }
        self.notify(&RegistryEvent::Cleared {
            count: drained.len(),
        });
    }

    /// Look up an overlay.
    pub fn get(&self, id: &OverlayId) -> Option<Arc<OverlayRecord<N>>> {
        self.state().overlays.get(id).cloned()
    }

    /// Check if an overlay is open.
    pub fn contains(&self, id: &OverlayId) -> bool {
        self.state().overlays.contains_key(id)
    }

    /// Ids in stacking order, bottom first.
    pub fn order(&self) -> Vec<OverlayId> {
        self.state().order.clone()
    }

    /// All open overlays keyed by id.
    pub fn overlays(&self) -> HashMap<OverlayId, Arc<OverlayRecord<N>>> {
        self.state().overlays.clone()
    }

    /// Ordered view of the open overlays, taken under a single lock.
    ///
    /// Ids without a record are skipped.
    pub fn snapshot(&self) -> Vec<(OverlayId, Arc<OverlayRecord<N>>)> {
        let state = self.state();
        state
            .order
            .iter()
            .filter_map(|id| {
                state
                    .overlays
                    .get(id)
                    .map(|record| (id.clone(), Arc::clone(record)))
            })
            .collect()
    }

    /// Number of open overlays.
    pub fn len(&self) -> usize {
        self.state().overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().overlays.is_empty()
    }

    /// Register a listener called synchronously after every change.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped (or for the registry's lifetime after [`Subscription::detach`]).
    pub fn subscribe(
        &self,
        listener: impl Fn(&RegistryEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let key = listeners.next_key;
        listeners.next_key += 1;
        listeners.entries.push((key, Arc::new(listener)));

        Subscription {
            listeners: Arc::downgrade(&self.inner.listeners),
            key,
            detached: false,
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    /// Drop every listener, including detached ones.
    pub(crate) fn clear_listeners(&self) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .clear();
    }

    fn notify(&self, event: &RegistryEvent) {
        // Snapshot so listeners can subscribe or unsubscribe while running.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        log::trace!("Registry {:?} -> {} listener(s)", event, listeners.len());
        for listener in listeners {
            listener(event);
        }
    }

    /// Weak handle that does not keep the registry alive.
    pub(crate) fn downgrade(&self) -> WeakOverlayRegistry<N> {
        WeakOverlayRegistry {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<N> Default for OverlayRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> Clone for OverlayRegistry<N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<N> std::fmt::Debug for OverlayRegistry<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRegistry")
            .field("order", &self.order())
            .finish()
    }
}

/// Non-owning registry handle held by close callbacks.
pub(crate) struct WeakOverlayRegistry<N> {
    inner: Weak<Inner<N>>,
}

impl<N> WeakOverlayRegistry<N> {
    pub(crate) fn upgrade(&self) -> Option<OverlayRegistry<N>> {
        self.inner.upgrade().map(|inner| OverlayRegistry { inner })
    }
}

/// Handle to a registered listener.
///
/// Dropping it unsubscribes the listener.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    listeners: Weak<Mutex<Listeners>>,
    key: u64,
    detached: bool,
}

impl Subscription {
    /// Unsubscribe now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keep the listener registered for the registry's lifetime.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .entries
                .retain(|(key, _)| *key != self.key);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("detached", &self.detached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use futures::FutureExt;

    use super::*;
    use crate::completion;
    use crate::error::OverlayError;
    use crate::record::{
        AsyncOverlay, AsyncOverlayProps, AsyncRenderFn, CloseFn, OverlayProps, RenderFn,
    };

    fn record(id: &str) -> OverlayRecord<()> {
        let render: RenderFn<()> = Arc::new(|_: &OverlayProps| ());
        OverlayRecord::standard(CloseFn::new(OverlayId::from(id), || {}), render)
    }

    fn ids(order: &[OverlayId]) -> Vec<&str> {
        order.iter().map(OverlayId::as_str).collect()
    }

    fn events(registry: &OverlayRegistry<()>) -> (Arc<Mutex<Vec<RegistryEvent>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = registry.subscribe(move |event| {
            sink.lock().unwrap().push(event.clone());
        });
        (seen, subscription)
    }

    #[test]
    fn test_add_stores_record_and_order() {
        let registry = OverlayRegistry::new();
        registry.add("test-overlay".into(), record("test-overlay"));

        assert!(registry.get(&"test-overlay".into()).is_some());
        assert_eq!(ids(&registry.order()), ["test-overlay"]);
    }

    #[test]
    fn test_add_keeps_insertion_order() {
        let registry = OverlayRegistry::new();
        registry.add("first".into(), record("first"));
        registry.add("second".into(), record("second"));

        assert_eq!(ids(&registry.order()), ["first", "second"]);
    }

    #[test]
    fn test_remove_preserves_relative_order() {
        let registry = OverlayRegistry::new();
        for id in ["a", "b", "c"] {
            registry.add(id.into(), record(id));
        }

        assert!(registry.remove(&"b".into()));

        assert_eq!(ids(&registry.order()), ["a", "c"]);
        assert!(registry.get(&"b".into()).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let registry = OverlayRegistry::new();
        registry.add("a".into(), record("a"));
        let (seen, _subscription) = events(&registry);

        assert!(!registry.remove(&"missing".into()));
        assert!(registry.remove(&"a".into()));
        assert!(!registry.remove(&"a".into()));

        assert!(registry.is_empty());
        assert_eq!(*seen.lock().unwrap(), [RegistryEvent::Removed("a".into())]);
    }

    #[test]
    fn test_clear_empties_everything() {
        let registry = OverlayRegistry::new();
        registry.add("first".into(), record("first"));
        registry.add("second".into(), record("second"));
        let (seen, _subscription) = events(&registry);

        registry.clear();
        registry.clear();

        assert!(registry.overlays().is_empty());
        assert!(registry.order().is_empty());
        assert_eq!(*seen.lock().unwrap(), [RegistryEvent::Cleared { count: 2 }]);
    }

    #[test]
    fn test_get_returns_same_record() {
        let registry = OverlayRegistry::new();
        registry.add("a".into(), record("a"));

        let first = registry.get(&"a".into()).unwrap();
        let second = registry.get(&"a".into()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.get(&"non-existent".into()).is_none());
    }

    #[test]
    fn test_readd_moves_to_top_without_duplicates() {
        let registry = OverlayRegistry::new();
        for id in ["a", "b", "c"] {
            registry.add(id.into(), record(id));
        }
        let old = registry.get(&"a".into()).unwrap();
        let (seen, _subscription) = events(&registry);

        registry.add("a".into(), record("a"));

        assert_eq!(ids(&registry.order()), ["b", "c", "a"]);
        assert_eq!(registry.len(), 3);
        assert!(!Arc::ptr_eq(&old, &registry.get(&"a".into()).unwrap()));
        assert_eq!(*seen.lock().unwrap(), [RegistryEvent::Replaced("a".into())]);
    }

    #[test]
    fn test_readd_dismisses_replaced_async_record() {
        let registry = OverlayRegistry::new();
        let close = CloseFn::new(OverlayId::from("confirm"), || {});
        let (resolver, completion) = completion::channel::<bool>(close.clone(), false);
        let render: AsyncRenderFn<(), bool> = Arc::new(|_: &AsyncOverlayProps<bool>| ());
        registry.add(
            "confirm".into(),
            OverlayRecord::Async(AsyncOverlay::new(close, render, resolver.clone())),
        );
        let pending = completion.dismissible();

        registry.add("confirm".into(), record("confirm"));

        assert_eq!(
            pending.now_or_never(),
            Some(Err(OverlayError::Dismissed {
                id: OverlayId::from("confirm"),
            }))
        );
        resolver.resolve(true);
        assert!(!resolver.is_settled());
        assert!(registry.contains(&"confirm".into()));
    }

    #[test]
    fn test_listener_sees_state_after_mutation() {
        let registry = OverlayRegistry::<()>::new();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&observed);
        let reader = registry.clone();
        let _subscription = registry.subscribe(move |_| {
            sink.lock().unwrap().push(reader.order().len());
        });

        registry.add("a".into(), record("a"));
        registry.add("b".into(), record("b"));
        registry.remove(&"a".into());

        assert_eq!(*observed.lock().unwrap(), [1, 2, 1]);
    }

    #[test]
    fn test_listener_may_mutate_registry() {
        let registry = OverlayRegistry::<()>::new();
        let writer = registry.clone();
        let _subscription = registry.subscribe(move |event| {
            if let RegistryEvent::Added(id) = event {
                if id.as_str() == "transient" {
                    writer.remove(id);
                }
            }
        });

        registry.add("transient".into(), record("transient"));
        registry.add("kept".into(), record("kept"));

        assert_eq!(ids(&registry.order()), ["kept"]);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let registry = OverlayRegistry::new();
        let (seen, subscription) = events(&registry);
        registry.add("a".into(), record("a"));

        subscription.unsubscribe();
        registry.add("b".into(), record("b"));

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn test_detached_subscription_stays() {
        let registry = OverlayRegistry::new();
        let (seen, subscription) = events(&registry);
        subscription.detach();

        registry.add("a".into(), record("a"));

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(registry.listener_count(), 1);
    }

    #[test]
    fn test_order_matches_keys_for_random_sequences() {
        let mut rng = StdRng::seed_from_u64(0x0ec1);
        let registry = OverlayRegistry::new();
        let mut model: Vec<String> = Vec::new();

        for _ in 0..2000 {
            let id = format!("o{}", rng.random_range(0..8));
            match rng.random_range(0..10) {
                0 => {
                    registry.clear();
                    model.clear();
                }
                1..=5 => {
                    registry.add(id.as_str().into(), record(&id));
                    model.retain(|i| i != &id);
                    model.push(id);
                }
                _ => {
                    registry.remove(&id.as_str().into());
                    model.retain(|i| i != &id);
                }
            }

            let order = registry.order();
            let keys: HashSet<_> = registry.overlays().into_keys().collect();
            let unique: HashSet<_> = order.iter().cloned().collect();
            assert_eq!(unique.len(), order.len());
            assert_eq!(unique, keys);
            assert_eq!(ids(&order), model);
        }
    }
}

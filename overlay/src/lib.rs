//! Imperative overlays for Rust UIs.
//!
//! Any code holding an [`Overlay`] handle can open modals, toasts or other
//! floating elements without owning their open/closed state. The scope keeps
//! an ordered registry of open overlays; a render layer turns it into nodes
//! of whatever type the host UI uses.
//!
//! ```
//! use overlay::Overlay;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let overlay: Overlay<String> = Overlay::new();
//!
//! let answer = overlay.open_async::<u32, _>(|props| {
//!     format!("Continue? (settled: {})", props.resolve.is_settled())
//! });
//! let frame = overlay.renderer().render().unwrap();
//! assert_eq!(frame.children[0].node, "Continue? (settled: false)");
//!
//! // What a button handler drawn by the overlay would do.
//! let record = overlay.get_overlay(answer.id()).unwrap();
//! record.resolver::<u32>().unwrap().resolve(42);
//!
//! assert_eq!(answer.await, 42);
//! assert!(overlay.registry().is_empty());
//! # });
//! ```

pub mod completion;
pub mod config;
pub mod controller;
pub mod error;
pub mod id;
pub mod record;
pub mod registry;
pub mod render;

pub use completion::{Dismissible, OverlayCompletion, Resolver};
pub use config::{IdStrategy, OverlayConfig};
pub use controller::Overlay;
pub use error::OverlayError;
pub use id::{IdGenerator, OverlayId, SequentialGenerator, UuidGenerator};
pub use record::{
    AsyncOverlay, AsyncOverlayProps, AsyncRenderFn, CloseFn, OverlayKind, OverlayProps,
    OverlayRecord, RenderFn, StandardOverlay,
};
pub use registry::{OverlayRegistry, RegistryEvent, Subscription};
pub use render::{OverlayRenderer, OverlayRoot, RenderWakeup, RenderedOverlay};

pub mod prelude {
    pub use crate::completion::{OverlayCompletion, Resolver};
    pub use crate::config::OverlayConfig;
    pub use crate::controller::Overlay;
    pub use crate::error::OverlayError;
    pub use crate::id::OverlayId;
    pub use crate::record::{AsyncOverlayProps, CloseFn, OverlayKind, OverlayProps};
    pub use crate::registry::{RegistryEvent, Subscription};
    pub use crate::render::{OverlayRenderer, OverlayRoot};
}

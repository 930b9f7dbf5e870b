//! Overlay error types.

use thiserror::Error;

use crate::id::OverlayId;

/// Errors surfaced by the opt-in dismissal path.
///
/// Registry and controller operations are total and never return errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    /// The overlay left the registry without being resolved.
    #[error("Overlay '{id}' was closed without a result")]
    Dismissed {
        /// Id of the dismissed overlay.
        id: OverlayId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dismissed_display() {
        let error = OverlayError::Dismissed {
            id: OverlayId::from("confirm-1"),
        };
        assert_eq!(
            error.to_string(),
            "Overlay 'confirm-1' was closed without a result"
        );
    }
}

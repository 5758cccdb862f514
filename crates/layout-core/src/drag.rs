//! Pointer-driven repositioning of live layout pieces.
//!
//! All arithmetic is fractional: screen deltas are divided by the preview
//! container's rendered size, so a drag means the same thing at any preview
//! scale.

use serde::{Deserialize, Serialize};
use storykit_story_model::{FracPoint, LivePositions, PieceKey};

use crate::live::PieceSizes;

/// Pointer position in preview (screen) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rendered size of the preview container in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Exclusive pointer capture, owned by one pointer at a time.
pub trait PointerCapture {
    /// Route all further events of `pointer_id` to the dragged piece.
    /// Returns `false` when the host could not capture; the drag still runs.
    fn acquire(&mut self, pointer_id: u64) -> bool;

    fn release(&mut self, pointer_id: u64);
}

/// A capture that does nothing, for hosts without pointer routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapture;

impl PointerCapture for NoCapture {
    fn acquire(&mut self, _pointer_id: u64) -> bool {
        true
    }

    fn release(&mut self, _pointer_id: u64) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        piece: PieceKey,
        pointer_id: u64,
        /// Pointer position when the drag started.
        origin: ScreenPoint,
        /// Piece position when the drag started.
        start_pos: FracPoint,
    },
}

/// Single-piece drag state machine.
#[derive(Debug, Clone, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Start dragging `piece`. Ignored (returns `false`) while another drag
    /// is in progress.
    pub fn begin(
        &mut self,
        piece: PieceKey,
        pointer_id: u64,
        at: ScreenPoint,
        positions: &LivePositions,
        capture: &mut dyn PointerCapture,
    ) -> bool {
        if self.is_dragging() {
            tracing::debug!(piece = %piece, pointer_id, "Drag already active, ignoring start");
            return false;
        }
        if !capture.acquire(pointer_id) {
            tracing::debug!(pointer_id, "Pointer capture unavailable");
        }
        self.state = DragState::Dragging {
            piece,
            pointer_id,
            origin: at,
            start_pos: positions.get(piece),
        };
        true
    }

    /// Move the active piece to follow the pointer.
    ///
    /// Returns the committed, clamped position, or `None` when the event does
    /// not belong to the active drag or the container has no size yet.
    pub fn update(
        &mut self,
        piece: PieceKey,
        pointer_id: u64,
        at: ScreenPoint,
        container: ContainerSize,
        sizes: &PieceSizes,
        positions: &mut LivePositions,
    ) -> Option<FracPoint> {
        let DragState::Dragging {
            piece: active,
            pointer_id: owner,
            origin,
            start_pos,
        } = self.state
        else {
            return None;
        };
        if active != piece || owner != pointer_id || !container.is_usable() {
            return None;
        }

        let dx = (at.x - origin.x) / container.width;
        let dy = (at.y - origin.y) / container.height;
        let next = start_pos.offset(dx, dy).clamped(sizes.get(piece));
        positions.set(piece, next);
        Some(next)
    }

    /// Finish the active drag. Returns `false` for foreign events.
    pub fn end(&mut self, piece: PieceKey, pointer_id: u64, capture: &mut dyn PointerCapture) -> bool {
        match self.state {
            DragState::Dragging {
                piece: active,
                pointer_id: owner,
                ..
            } if active == piece && owner == pointer_id => {
                capture.release(owner);
                self.state = DragState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Abort any drag, releasing its capture.
    pub fn cancel(&mut self, capture: &mut dyn PointerCapture) {
        if let DragState::Dragging { pointer_id, .. } = self.state {
            capture.release(pointer_id);
        }
        self.state = DragState::Idle;
    }

    /// Cancel any drag and restore the default positions.
    pub fn reset(&mut self, positions: &mut LivePositions, capture: &mut dyn PointerCapture) {
        self.cancel(capture);
        positions.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storykit_story_model::FracSize;

    #[derive(Default)]
    struct RecordingCapture {
        held: Option<u64>,
        released: Vec<u64>,
    }

    impl PointerCapture for RecordingCapture {
        fn acquire(&mut self, pointer_id: u64) -> bool {
            if self.held.is_some() {
                return false;
            }
            self.held = Some(pointer_id);
            true
        }

        fn release(&mut self, pointer_id: u64) {
            if self.held == Some(pointer_id) {
                self.held = None;
            }
            self.released.push(pointer_id);
        }
    }

    fn sizes(piece: PieceKey, size: FracSize) -> PieceSizes {
        [(piece, size)].into_iter().collect()
    }

    #[test]
    fn test_large_drag_clamps_to_canvas() {
        let mut positions = LivePositions::default();
        positions.set(PieceKey::CardKcal, FracPoint::new(0.9, 0.9));
        let sizes = sizes(PieceKey::CardKcal, FracSize::new(0.3, 0.1));
        let mut capture = RecordingCapture::default();
        let mut drag = DragController::new();

        assert!(drag.begin(
            PieceKey::CardKcal,
            7,
            ScreenPoint::new(100.0, 100.0),
            &positions,
            &mut capture
        ));
        let pos = drag
            .update(
                PieceKey::CardKcal,
                7,
                ScreenPoint::new(5_000.0, 9_000.0),
                ContainerSize::new(360.0, 640.0),
                &sizes,
                &mut positions,
            )
            .unwrap();

        assert!((pos.x - 0.7).abs() < 1e-9);
        assert!((pos.y - 0.9).abs() < 1e-9);
        assert_eq!(positions.get(PieceKey::CardKcal), pos);
        assert!(drag.end(PieceKey::CardKcal, 7, &mut capture));
        assert_eq!(capture.released, vec![7]);
        assert_eq!(drag.state(), DragState::Idle);
    }

    #[test]
    fn test_delta_is_scaled_by_container() {
        let mut positions = LivePositions::default();
        positions.set(PieceKey::Title, FracPoint::new(0.1, 0.1));
        let sizes = sizes(PieceKey::Title, FracSize::new(0.2, 0.1));
        let mut drag = DragController::new();
        drag.begin(PieceKey::Title, 1, ScreenPoint::new(0.0, 0.0), &positions, &mut NoCapture);

        let pos = drag
            .update(
                PieceKey::Title,
                1,
                ScreenPoint::new(36.0, 64.0),
                ContainerSize::new(360.0, 640.0),
                &sizes,
                &mut positions,
            )
            .unwrap();
        assert!((pos.x - 0.2).abs() < 1e-9);
        assert!((pos.y - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_second_start_and_foreign_pointer_are_ignored() {
        let mut positions = LivePositions::default();
        let before = positions.clone();
        let sizes = PieceSizes::default();
        let mut capture = RecordingCapture::default();
        let mut drag = DragController::new();

        assert!(drag.begin(PieceKey::Brand, 1, ScreenPoint::default(), &positions, &mut capture));
        assert!(!drag.begin(PieceKey::Title, 2, ScreenPoint::default(), &positions, &mut capture));

        let container = ContainerSize::new(100.0, 100.0);
        let far = ScreenPoint::new(50.0, 50.0);
        assert!(drag
            .update(PieceKey::Brand, 2, far, container, &sizes, &mut positions)
            .is_none());
        assert!(drag
            .update(PieceKey::Title, 1, far, container, &sizes, &mut positions)
            .is_none());
        assert_eq!(positions, before);
        assert!(!drag.end(PieceKey::Brand, 2, &mut capture));
        assert!(drag.is_dragging());
    }

    #[test]
    fn test_zero_sized_container_is_ignored() {
        let mut positions = LivePositions::default();
        let mut drag = DragController::new();
        drag.begin(PieceKey::Subtitle, 3, ScreenPoint::default(), &positions, &mut NoCapture);
        let moved = drag.update(
            PieceKey::Subtitle,
            3,
            ScreenPoint::new(10.0, 10.0),
            ContainerSize::new(0.0, 0.0),
            &PieceSizes::default(),
            &mut positions,
        );
        assert!(moved.is_none());
    }

    #[test]
    fn test_reset_cancels_drag_and_restores_defaults() {
        let mut positions = LivePositions::default();
        positions.set(PieceKey::CardTempo, FracPoint::new(0.0, 0.0));
        let mut capture = RecordingCapture::default();
        let mut drag = DragController::new();
        drag.begin(PieceKey::CardTempo, 9, ScreenPoint::default(), &positions, &mut capture);

        drag.reset(&mut positions, &mut capture);
        assert!(!drag.is_dragging());
        assert_eq!(capture.held, None);
        assert_eq!(positions, LivePositions::default());
    }
}

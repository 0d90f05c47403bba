use crate::geometry::{Rect, Viewport};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopupGeometry {
    /// Vertical gap between the citation and the popup.
    pub offset: f32,
    /// Minimum distance kept from every viewport edge.
    pub margin: f32,
}

impl Default for PopupGeometry {
    fn default() -> Self {
        Self {
            offset: 5.0,
            margin: 20.0,
        }
    }
}

/// Top-left corner for a `width` x `height` popup anchored to `anchor`.
///
/// Below-right of the anchor by default; shifted left when it would cross the
/// right margin and flipped above the anchor when it would cross the bottom
/// margin. The result never starts before the left or top margin.
pub fn place(
    anchor: Rect,
    width: f32,
    height: f32,
    viewport: Viewport,
    geometry: PopupGeometry,
) -> (f32, f32) {
    let mut left = anchor.left;
    let mut top = anchor.bottom() + geometry.offset;

    if left + width > viewport.width - geometry.margin {
        left = viewport.width - width - geometry.margin;
    }

    if top + height > viewport.height - geometry.margin {
        top = anchor.top - height - geometry.offset;
    }

    (left.max(geometry.margin), top.max(geometry.margin))
}

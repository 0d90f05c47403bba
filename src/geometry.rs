use std::collections::HashMap;

use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

/// Source of on-screen geometry for surface nodes.
pub trait Layout {
    fn viewport(&self) -> Viewport;

    /// Bounding box of `node` as currently laid out.
    fn measure(&self, doc: &Document, node: NodeId) -> Rect;
}

/// Layout with explicitly assigned rectangles; unknown nodes measure as
/// `fallback`.
#[derive(Debug, Clone)]
pub struct FixedLayout {
    viewport: Viewport,
    fallback: Rect,
    rects: HashMap<NodeId, Rect>,
}

impl FixedLayout {
    pub fn new(viewport: Viewport, fallback: Rect) -> Self {
        Self {
            viewport,
            fallback,
            rects: HashMap::new(),
        }
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.rects.insert(node, rect);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }
}

impl Layout for FixedLayout {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn measure(&self, _doc: &Document, node: NodeId) -> Rect {
        self.rects.get(&node).copied().unwrap_or(self.fallback)
    }
}

use std::collections::{BTreeMap, HashMap};

use crate::dom::{Display, Document, NodeId};
use crate::geometry::Layout;
use crate::models::{DocumentRef, MessageId};
use crate::placement::{place, PopupGeometry};

pub const CITATION_CLASS: &str = "citation";
pub const POPUP_CLASS: &str = "source-popup";
pub const CONTENT_CLASS: &str = "source-content";
pub const LINK_CLASS: &str = "source-link";
pub const SHOW_CLASS: &str = "show";

/// Identifies one popup: the message it belongs to, the citation number and
/// which occurrence of that number within the message it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PopupKey {
    pub message: MessageId,
    pub citation: u32,
    pub occurrence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupEntry {
    pub key: PopupKey,
    pub element: NodeId,
    /// Citation affordance the popup is placed against.
    pub anchor: NodeId,
    /// Region overwritten by enrichment; `None` when no document resolved.
    pub content_slot: Option<NodeId>,
    pub document_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Shown,
    Hidden,
}

#[derive(Debug, Default)]
pub struct PopupRegistry {
    entries: BTreeMap<PopupKey, PopupEntry>,
    by_anchor: HashMap<NodeId, PopupKey>,
    shown: Option<PopupKey>,
    geometry: PopupGeometry,
}

impl PopupRegistry {
    pub fn new(geometry: PopupGeometry) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, key: PopupKey) -> Option<&PopupEntry> {
        self.entries.get(&key)
    }

    pub fn entries_for(&self, message: MessageId) -> impl Iterator<Item = &PopupEntry> {
        let start = PopupKey {
            message,
            citation: 0,
            occurrence: 0,
        };
        let end = PopupKey {
            message,
            citation: u32::MAX,
            occurrence: u32::MAX,
        };
        self.entries.range(start..=end).map(|(_, entry)| entry)
    }

    pub fn key_for_anchor(&self, anchor: NodeId) -> Option<PopupKey> {
        self.by_anchor.get(&anchor).copied()
    }

    pub fn shown(&self) -> Option<PopupKey> {
        self.shown
    }

    pub fn is_shown(&self, key: PopupKey) -> bool {
        self.shown == Some(key)
    }

    /// Builds a hidden popup for `key` and appends it to the body.
    pub fn create(
        &mut self,
        doc: &mut Document,
        key: PopupKey,
        anchor: NodeId,
        document: Option<&DocumentRef>,
    ) -> &PopupEntry {
        if let Some(previous) = self.entries.remove(&key) {
            self.by_anchor.remove(&previous.anchor);
            doc.remove(previous.element);
        }

        let element = doc.create_element("div");
        doc.add_class(element, POPUP_CLASS);
        doc.set_display(element, Display::None);

        let content = doc.create_element("div");
        doc.add_class(content, CONTENT_CLASS);
        doc.append_child(element, content);

        let mut content_slot = None;
        let mut document_index = None;
        if let Some(document) = document {
            doc.append_text_with_breaks(content, &document.content);
            content_slot = Some(content);
            document_index = key.citation.checked_sub(1).map(|index| index as usize);

            let link = doc.create_element("a");
            doc.add_class(link, LINK_CLASS);
            doc.set_attr(link, "href", &document.url);
            doc.set_attr(link, "target", "_blank");
            let label = doc.create_text(document.display_url());
            doc.append_child(link, label);
            doc.append_child(element, link);
        }

        doc.append_child(doc.body(), element);

        self.by_anchor.insert(anchor, key);
        self.entries.entry(key).or_insert(PopupEntry {
            key,
            element,
            anchor,
            content_slot,
            document_index,
        })
    }

    /// Shows the popup for `key` next to its citation, hiding whichever popup
    /// was shown before, or hides it if it is the one currently shown.
    pub fn toggle(
        &mut self,
        doc: &mut Document,
        layout: &dyn Layout,
        key: PopupKey,
    ) -> Option<Visibility> {
        let entry = self.entries.get(&key)?.clone();

        if self.shown == Some(key) {
            self.hide_all(doc);
            return Some(Visibility::Hidden);
        }
        self.hide_all(doc);

        doc.set_display(entry.element, Display::Block);
        let anchor = layout.measure(doc, entry.anchor);
        let popup = layout.measure(doc, entry.element);
        let (left, top) = place(
            anchor,
            popup.width,
            popup.height,
            layout.viewport(),
            self.geometry,
        );
        doc.set_position(entry.element, left, top);
        doc.add_class(entry.element, SHOW_CLASS);
        self.shown = Some(key);

        tracing::debug!(
            message_id = %key.message,
            citation = key.citation,
            left,
            top,
            "source popup shown"
        );
        Some(Visibility::Shown)
    }

    /// Hides the shown popup, if any. Returns whether one was hidden.
    pub fn hide_all(&mut self, doc: &mut Document) -> bool {
        let Some(key) = self.shown.take() else {
            return false;
        };
        if let Some(entry) = self.entries.get(&key) {
            doc.remove_class(entry.element, SHOW_CLASS);
            doc.set_display(entry.element, Display::None);
        }
        true
    }

    /// Removes every popup of `message` from the registry and the document.
    pub fn dispose_message(&mut self, doc: &mut Document, message: MessageId) -> usize {
        let keys: Vec<PopupKey> = self.entries_for(message).map(|entry| entry.key).collect();
        for key in &keys {
            if let Some(entry) = self.entries.remove(key) {
                self.by_anchor.remove(&entry.anchor);
                doc.remove(entry.element);
            }
            if self.shown == Some(*key) {
                self.shown = None;
            }
        }
        keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::geometry::{FixedLayout, Rect, Viewport};

    fn key(message: u64, citation: u32) -> PopupKey {
        PopupKey {
            message: MessageId(message),
            citation,
            occurrence: 0,
        }
    }

    fn layout() -> FixedLayout {
        FixedLayout::new(
            Viewport {
                width: 1000.0,
                height: 800.0,
            },
            Rect::new(0.0, 0.0, 300.0, 200.0),
        )
    }

    fn anchor(doc: &mut Document) -> NodeId {
        let span = doc.create_element("span");
        doc.add_class(span, CITATION_CLASS);
        doc.append_child(doc.body(), span);
        span
    }

    fn document(content: &str) -> DocumentRef {
        DocumentRef {
            content: content.to_string(),
            url: "https://a.b/c/".to_string(),
        }
    }

    #[test]
    fn resolved_popup_has_content_and_link() {
        let mut doc = Document::new();
        let mut registry = PopupRegistry::default();
        let span = anchor(&mut doc);
        let entry = registry
            .create(&mut doc, key(1, 2), span, Some(&document("line 1\nline 2")))
            .clone();

        let slot = entry.content_slot.expect("content slot");
        assert_eq!(doc.text_content(slot), "line 1\nline 2");
        assert_eq!(entry.document_index, Some(1));
        assert_eq!(doc.style(entry.element).map(|s| s.display), Some(Display::None));

        let link = doc.find_by_class(LINK_CLASS)[0];
        assert_eq!(doc.attr(link, "href"), Some("https://a.b/c/"));
        assert_eq!(doc.attr(link, "target"), Some("_blank"));
        assert_eq!(doc.text_content(link), "a.b/c");
    }

    #[test]
    fn unresolved_popup_is_empty_without_link() {
        let mut doc = Document::new();
        let mut registry = PopupRegistry::default();
        let span = anchor(&mut doc);
        let entry = registry.create(&mut doc, key(1, 9), span, None).clone();

        assert!(entry.content_slot.is_none());
        assert!(entry.document_index.is_none());
        assert_eq!(doc.text_content(entry.element), "");
        assert!(doc.find_by_class(LINK_CLASS).is_empty());
    }

    #[test]
    fn at_most_one_popup_is_shown() {
        let mut doc = Document::new();
        let mut registry = PopupRegistry::default();
        let layout = layout();
        let keys: Vec<PopupKey> = (1..=4).map(|n| key(1, n)).collect();
        for k in &keys {
            let span = anchor(&mut doc);
            registry.create(&mut doc, *k, span, Some(&document("text")));
        }

        let sequence = [0, 1, 1, 3, 2, 0, 0, 3, 3, 2];
        for index in sequence {
            registry.toggle(&mut doc, &layout, keys[index]);
            let visible = doc.find_by_class(SHOW_CLASS);
            assert!(visible.len() <= 1, "visible after toggling {index}: {visible:?}");
            let displayed = keys
                .iter()
                .filter_map(|k| registry.entry(*k))
                .filter(|e| doc.style(e.element).map(|s| s.display) == Some(Display::Block))
                .count();
            assert!(displayed <= 1);
        }
    }

    #[test]
    fn toggling_the_shown_popup_hides_it() {
        let mut doc = Document::new();
        let mut registry = PopupRegistry::default();
        let layout = layout();
        let span = anchor(&mut doc);
        registry.create(&mut doc, key(1, 1), span, Some(&document("text")));

        assert_eq!(
            registry.toggle(&mut doc, &layout, key(1, 1)),
            Some(Visibility::Shown)
        );
        assert!(registry.is_shown(key(1, 1)));
        assert_eq!(
            registry.toggle(&mut doc, &layout, key(1, 1)),
            Some(Visibility::Hidden)
        );
        assert_eq!(registry.shown(), None);
        assert_eq!(registry.toggle(&mut doc, &layout, key(1, 7)), None);
    }

    #[test]
    fn shown_popup_is_placed_inside_viewport() {
        let mut doc = Document::new();
        let mut registry = PopupRegistry::default();
        let mut layout = layout();
        let span = anchor(&mut doc);
        layout.set_rect(span, Rect::new(960.0, 770.0, 20.0, 16.0));
        let element = registry
            .create(&mut doc, key(1, 1), span, Some(&document("text")))
            .element;

        registry.toggle(&mut doc, &layout, key(1, 1));
        let style = doc.style(element).expect("popup style");
        assert_eq!(style.left, Some(680.0));
        assert_eq!(style.top, Some(565.0));
    }

    #[test]
    fn dispose_removes_only_that_message() {
        let mut doc = Document::new();
        let mut registry = PopupRegistry::default();
        let layout = layout();
        for message in [1, 2] {
            let span = anchor(&mut doc);
            registry.create(&mut doc, key(message, 1), span, Some(&document("text")));
        }
        registry.toggle(&mut doc, &layout, key(1, 1));

        assert_eq!(registry.dispose_message(&mut doc, MessageId(1)), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.shown(), None);
        assert!(registry.entry(key(2, 1)).is_some());
        assert_eq!(doc.find_by_class(POPUP_CLASS).len(), 1);
    }
}

use std::collections::HashMap;

use chrono::Utc;

use crate::dom::{Document, NodeId};
use crate::enrich::EnrichmentPlan;
use crate::geometry::Layout;
use crate::markers::{parse_markers, Segment};
use crate::models::{document_key, DocumentTable, Message, MessageId, APOLOGY_MESSAGE};
use crate::placement::PopupGeometry;
use crate::popup::{PopupKey, PopupRegistry, Visibility, CITATION_CLASS, POPUP_CLASS};

pub const CONTAINER_ID: &str = "chat-container";
pub const PENDING_LABEL: &str = "Thinking";

#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub message: Message,
    pub node: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Toggled {
        key: PopupKey,
        visibility: Visibility,
    },
    InsidePopup,
    Dismissed {
        hidden: bool,
    },
}

/// The conversation surface: the document, the message container and the
/// popups registered for rendered messages.
#[derive(Debug)]
pub struct ChatView {
    doc: Document,
    container: NodeId,
    popups: PopupRegistry,
    messages: Vec<RenderedMessage>,
    next_id: u64,
    scroll_anchor: Option<NodeId>,
}

impl Default for ChatView {
    fn default() -> Self {
        Self::new(PopupGeometry::default())
    }
}

impl ChatView {
    pub fn new(geometry: PopupGeometry) -> Self {
        let mut doc = Document::new();
        let container = doc.create_element("div");
        doc.set_attr(container, "id", CONTAINER_ID);
        doc.append_child(doc.body(), container);

        Self {
            doc,
            container,
            popups: PopupRegistry::new(geometry),
            messages: Vec::new(),
            next_id: 1,
            scroll_anchor: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn popups(&self) -> &PopupRegistry {
        &self.popups
    }

    pub fn messages(&self) -> &[RenderedMessage] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&RenderedMessage> {
        self.messages.iter().find(|rendered| rendered.message.id == id)
    }

    /// Newest node the container was scrolled to.
    pub fn scroll_anchor(&self) -> Option<NodeId> {
        self.scroll_anchor
    }

    pub fn message_text(&self, id: MessageId) -> Option<String> {
        self.message(id)
            .map(|rendered| self.doc.text_content(rendered.node))
    }

    /// Citation affordances of a message in reading order, with their popups.
    pub fn citations(&self, id: MessageId) -> Vec<(NodeId, PopupKey)> {
        let Some(rendered) = self.message(id) else {
            return Vec::new();
        };
        self.doc
            .find_by_class_in(rendered.node, CITATION_CLASS)
            .into_iter()
            .filter_map(|span| self.popups.key_for_anchor(span).map(|key| (span, key)))
            .collect()
    }

    pub fn render_user(&mut self, text: &str) -> MessageId {
        let (id, message_node, content) = self.open_message(true);
        self.doc.append_text_with_breaks(content, text);
        self.finish_message(id, message_node, text, true, None);
        id
    }

    /// Renders an assistant reply with its citation affordances and popups.
    /// The message is appended before this returns; the returned plan lists
    /// the resolved documents for translation.
    pub fn render_assistant(
        &mut self,
        text: &str,
        docs: &DocumentTable,
        question: &str,
    ) -> (MessageId, EnrichmentPlan) {
        let (id, message_node, content) = self.open_message(false);
        let mut plan = EnrichmentPlan::new(id, question);
        let mut occurrences: HashMap<u32, u32> = HashMap::new();

        for segment in parse_markers(text) {
            match segment {
                Segment::Text(value) => self.doc.append_text_with_breaks(content, &value),
                Segment::Citation { numbers, .. } => {
                    for (index, number) in numbers.into_iter().enumerate() {
                        if index > 0 {
                            let comma = self.doc.create_text(",");
                            self.doc.append_child(content, comma);
                        }

                        let span = self.doc.create_element("span");
                        self.doc.add_class(span, CITATION_CLASS);
                        self.doc.add_class(span, &format!("citation-{number}"));
                        let label = self.doc.create_text(&format!("[{number}]"));
                        self.doc.append_child(span, label);
                        self.doc.append_child(content, span);

                        let occurrence = occurrences.entry(number).or_insert(0);
                        let key = PopupKey {
                            message: id,
                            citation: number,
                            occurrence: *occurrence,
                        };
                        *occurrence += 1;

                        let document =
                            document_key(number).and_then(|doc_key| docs.get(&doc_key));
                        self.popups.create(&mut self.doc, key, span, document);
                        match document {
                            Some(document) => plan.push(document.content.clone(), key),
                            None => tracing::debug!(
                                message_id = %id,
                                citation = number,
                                "citation has no matching document"
                            ),
                        }
                    }
                }
            }
        }

        self.finish_message(id, message_node, text, false, None);
        (id, plan)
    }

    /// Renders the fixed apology shown when a round trip fails.
    pub fn render_failure(&mut self, original: &str) -> MessageId {
        let (id, message_node, content) = self.open_message(false);
        self.doc.append_text_with_breaks(content, APOLOGY_MESSAGE);
        self.finish_message(
            id,
            message_node,
            APOLOGY_MESSAGE,
            false,
            Some(original.to_string()),
        );
        id
    }

    pub fn show_pending(&mut self) -> NodeId {
        let node = self.doc.create_element("div");
        for class in ["message", "bot-message", "loading"] {
            self.doc.add_class(node, class);
        }
        let label = self.doc.create_text(PENDING_LABEL);
        self.doc.append_child(node, label);
        self.doc.append_child(self.container, node);
        self.scroll_anchor = Some(node);
        node
    }

    pub fn clear_pending(&mut self, node: NodeId) -> bool {
        if !self.doc.has_class(node, "loading") {
            return false;
        }
        self.doc.remove(node)
    }

    /// Removes a message and disposes of its popups.
    pub fn remove_message(&mut self, id: MessageId) -> bool {
        let Some(position) = self
            .messages
            .iter()
            .position(|rendered| rendered.message.id == id)
        else {
            return false;
        };
        let rendered = self.messages.remove(position);
        let disposed = self.popups.dispose_message(&mut self.doc, id);
        self.doc.remove(rendered.node);
        tracing::debug!(message_id = %id, disposed, "message removed");
        true
    }

    /// Single click dispatcher for the whole surface.
    ///
    /// A click on a citation toggles its popup and goes no further. A click
    /// inside a popup is left alone. Anything else dismisses the shown popup.
    pub fn dispatch_click(&mut self, target: NodeId, layout: &dyn Layout) -> ClickOutcome {
        if let Some(citation) = self.doc.closest(target, CITATION_CLASS) {
            if let Some(key) = self.popups.key_for_anchor(citation) {
                if let Some(visibility) = self.popups.toggle(&mut self.doc, layout, key) {
                    return ClickOutcome::Toggled { key, visibility };
                }
            }
            return ClickOutcome::InsidePopup;
        }

        if self.doc.closest(target, POPUP_CLASS).is_some() {
            return ClickOutcome::InsidePopup;
        }

        ClickOutcome::Dismissed {
            hidden: self.popups.hide_all(&mut self.doc),
        }
    }

    /// Overwrites the content slot of a popup, newlines as line breaks.
    /// Returns false when the popup or its slot no longer exists.
    pub fn patch_popup_content(&mut self, key: PopupKey, text: &str) -> bool {
        let Some(slot) = self.popups.entry(key).and_then(|entry| entry.content_slot) else {
            return false;
        };
        if !self.doc.is_connected(slot) {
            return false;
        }
        self.doc.set_text_with_breaks(slot, text)
    }

    fn open_message(&mut self, is_from_user: bool) -> (MessageId, NodeId, NodeId) {
        let id = MessageId(self.next_id);
        self.next_id += 1;

        let message_node = self.doc.create_element("div");
        self.doc.add_class(message_node, "message");
        self.doc.add_class(
            message_node,
            if is_from_user {
                "user-message"
            } else {
                "bot-message"
            },
        );
        self.doc.set_attr(message_node, "data-message-id", &id.0.to_string());

        let content = self.doc.create_element("div");
        self.doc.add_class(content, "message-content");
        self.doc.append_child(message_node, content);
        (id, message_node, content)
    }

    fn finish_message(
        &mut self,
        id: MessageId,
        node: NodeId,
        text: &str,
        is_from_user: bool,
        retry_text: Option<String>,
    ) {
        self.doc.append_child(self.container, node);
        self.scroll_anchor = Some(node);
        self.messages.push(RenderedMessage {
            message: Message {
                id,
                text: text.to_string(),
                is_from_user,
                sent_at: Utc::now(),
                retry_text,
            },
            node,
        });
    }
}

//! Headless element tree standing in for the browser document.
//!
//! Nodes live in a slot map and are addressed by [`NodeId`]. Removing a node
//! frees its whole subtree for reuse; handles into a freed subtree become
//! stale and every operation on them is a silent miss (`None`/`false`),
//! which is what late asynchronous writers rely on.

use std::collections::BTreeMap;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    pub struct NodeId;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Display {
    #[default]
    Inherit,
    Block,
    None,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    pub display: Display,
    pub left: Option<f32>,
    pub top: Option<f32>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element {
        tag: String,
        classes: Vec<String>,
        attrs: BTreeMap<String, String>,
        style: Style,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: SlotMap<NodeId, Node>,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let body = nodes.insert(Node {
            kind: element_kind("body"),
            parent: None,
            children: Vec::new(),
        });
        Self { nodes, body }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.insert(element_kind(tag))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.insert(NodeKind::Text(text.to_string()))
    }

    fn insert(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.insert(Node {
            kind,
            parent: None,
            children: Vec::new(),
        })
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when `id` is reachable from the body.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == self.body {
                return true;
            }
            current = self.node(node_id).and_then(|node| node.parent);
        }
        false
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|node| &node.kind)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child || !self.contains(child) || self.is_ancestor(child, parent) {
            return false;
        }
        if !matches!(self.kind(parent), Some(NodeKind::Element { .. })) {
            return false;
        }

        self.detach(child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        true
    }

    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            current = self.parent(node_id);
        }
        false
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|child| *child != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    /// Detaches `id` and frees it with its whole subtree. The body cannot be
    /// removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.body || !self.contains(id) {
            return false;
        }
        self.detach(id);

        let mut stack = vec![id];
        while let Some(node_id) = stack.pop() {
            if let Some(node) = self.nodes.remove(node_id) {
                stack.extend(node.children);
            }
        }
        true
    }

    pub fn remove_children(&mut self, id: NodeId) {
        for child in self.children(id).to_vec() {
            self.remove(child);
        }
    }

    pub fn classes(&self, id: NodeId) -> &[String] {
        match self.kind(id) {
            Some(NodeKind::Element { classes, .. }) => classes.as_slice(),
            _ => &[],
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).iter().any(|c| c == class)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> bool {
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::Element { classes, .. }) => {
                if !classes.iter().any(|c| c == class) {
                    classes.push(class.to_string());
                }
                true
            }
            _ => false,
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> bool {
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::Element { classes, .. }) => {
                classes.retain(|c| c != class);
                true
            }
            _ => false,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::Element { attrs, .. }) => {
                attrs.insert(name.to_string(), value.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    pub fn style(&self, id: NodeId) -> Option<&Style> {
        match self.kind(id)? {
            NodeKind::Element { style, .. } => Some(style),
            NodeKind::Text(_) => None,
        }
    }

    pub fn set_display(&mut self, id: NodeId, display: Display) -> bool {
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::Element { style, .. }) => {
                style.display = display;
                true
            }
            _ => false,
        }
    }

    pub fn set_position(&mut self, id: NodeId, left: f32, top: f32) -> bool {
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::Element { style, .. }) => {
                style.left = Some(left);
                style.top = Some(top);
                true
            }
            _ => false,
        }
    }

    /// Appends `text` to `parent`, turning each newline into a `<br>`.
    pub fn append_text_with_breaks(&mut self, parent: NodeId, text: &str) {
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                let br = self.create_element("br");
                self.append_child(parent, br);
            }
            let node = self.create_text(line);
            self.append_child(parent, node);
        }
    }

    /// Replaces the children of `id` with `text`, newlines as `<br>`.
    pub fn set_text_with_breaks(&mut self, id: NodeId, text: &str) -> bool {
        if !matches!(self.kind(id), Some(NodeKind::Element { .. })) {
            return false;
        }
        self.remove_children(id);
        self.append_text_with_breaks(id, text);
        true
    }

    /// Rendered text of a subtree, with `<br>` read back as a newline.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => out.push_str(text),
            Some(NodeKind::Element { tag, .. }) if tag == "br" => out.push('\n'),
            Some(NodeKind::Element { .. }) => {
                for child in self.children(id) {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    /// Nearest inclusive ancestor of `id` carrying `class`.
    pub fn closest(&self, id: NodeId, class: &str) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if self.has_class(node_id, class) {
                return Some(node_id);
            }
            current = self.parent(node_id);
        }
        None
    }

    /// Connected elements carrying `class`, in document order.
    pub fn find_by_class(&self, class: &str) -> Vec<NodeId> {
        self.find_by_class_in(self.body, class)
    }

    /// Elements under `root` (inclusive) carrying `class`, in document order.
    pub fn find_by_class_in(&self, root: NodeId, class: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self.has_class(id, class) {
                found.push(id);
            }
            stack.extend(self.children(id).iter().rev());
        }
        found
    }
}

fn element_kind(tag: &str) -> NodeKind {
    NodeKind::Element {
        tag: tag.to_string(),
        classes: Vec::new(),
        attrs: BTreeMap::new(),
        style: Style::default(),
    }
}

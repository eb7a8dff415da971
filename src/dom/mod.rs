//! The observed region: a generic, externally mutated node tree.
//!
//! The host page owns this tree and mutates it continuously (drag-and-drop,
//! pagination, single-page navigation). The engine is a second, cooperating
//! writer that only ever adds or updates its own marker-tagged annotation
//! nodes. There is no locking discipline between the two beyond the
//! [`Page`] mutex; correctness comes from idempotent, content-equality
//! checked writes on the engine side.
//!
//! Mutation subscriptions deliver a unit notification for every write under
//! a chosen scope node. The engine mutes notifications for the duration of
//! its own writes so a reconciliation pass never re-triggers itself.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, mpsc};

/// Handle to a node in the tree. Non-owning; a node may disappear between
/// reconciliation passes when the host page removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

/// Handle to a mutation subscription, used for teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    text: String,
    hidden: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            text: String::new(),
            hidden: false,
            parent: None,
            children: Vec::new(),
        }
    }
}

struct Subscriber {
    id: SubscriptionId,
    scope: NodeId,
    tx: mpsc::UnboundedSender<()>,
}

/// An arena-backed node tree with mutation notifications.
///
/// Freed or never-allocated ids degrade to empty reads and no-op writes
/// rather than panicking: a single stale handle must never abort a
/// reconciliation pass.
pub struct Dom {
    nodes: Vec<Option<NodeData>>,
    root: NodeId,
    muted: bool,
    next_subscription: u64,
    subscribers: Vec<Subscriber>,
}

const NO_CHILDREN: &[NodeId] = &[];

impl Dom {
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            muted: false,
            next_subscription: 0,
            subscribers: Vec::new(),
        };
        dom.root = dom.alloc(NodeData::new("document"));
        dom
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        if let Some(idx) = self.nodes.iter().position(Option::is_none) {
            self.nodes[idx] = Some(data);
            NodeId(idx as u32)
        } else {
            self.nodes.push(Some(data));
            NodeId(self.nodes.len() as u32 - 1)
        }
    }

    fn get(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.0 as usize).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, node: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(node.0 as usize).and_then(Option::as_mut)
    }

    /// The document root. Always present.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached node. Attach it with [`Dom::append_child`].
    pub fn create(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::new(tag))
    }

    pub fn exists(&self, node: NodeId) -> bool {
        self.get(node).is_some()
    }

    pub fn tag(&self, node: NodeId) -> &str {
        self.get(node).map(|n| n.tag.as_str()).unwrap_or("")
    }

    /// A node's own text content. Child nodes are separate entities and do
    /// not contribute here.
    pub fn text(&self, node: NodeId) -> &str {
        self.get(node).map(|n| n.text.as_str()).unwrap_or("")
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        let changed = match self.get_mut(node) {
            Some(data) if data.text != text => {
                data.text = text.to_string();
                true
            }
            _ => false,
        };
        if changed {
            self.notify(node);
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.get(node)
            .map(|n| n.classes.iter().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        if let Some(data) = self.get_mut(node) {
            data.classes.push(class.to_string());
            self.notify(node);
        }
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        let changed = match self.get_mut(node) {
            Some(data) => {
                let before = data.classes.len();
                data.classes.retain(|c| c != class);
                data.classes.len() != before
            }
            None => false,
        };
        if changed {
            self.notify(node);
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.get(node).and_then(|n| n.attrs.get(name)).map(String::as_str)
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let changed = match self.get_mut(node) {
            Some(data) => data.attrs.insert(name.to_string(), value.to_string()).as_deref() != Some(value),
            None => false,
        };
        if changed {
            self.notify(node);
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        let changed = self
            .get_mut(node)
            .map(|data| data.attrs.remove(name).is_some())
            .unwrap_or(false);
        if changed {
            self.notify(node);
        }
    }

    /// Mark a node as rendered or not. Hidden subtrees stay structurally
    /// present; extraction skips them.
    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        let changed = match self.get_mut(node) {
            Some(data) if data.hidden != hidden => {
                data.hidden = hidden;
                true
            }
            _ => false,
        };
        if changed {
            self.notify(node);
        }
    }

    /// Computed visibility: a node is visible only when neither it nor any
    /// ancestor is hidden.
    pub fn is_visible(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            match self.get(id) {
                Some(data) if data.hidden => return false,
                Some(data) => cursor = data.parent,
                None => return false,
            }
        }
        true
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).map(|n| n.children.as_slice()).unwrap_or(NO_CHILDREN)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.exists(parent) || !self.exists(child) || self.contains(child, parent) {
            return;
        }
        self.detach(child);
        if let Some(data) = self.get_mut(parent) {
            data.children.push(child);
        }
        if let Some(data) = self.get_mut(child) {
            data.parent = Some(parent);
        }
        self.notify(parent);
    }

    /// Unlink a node from its parent without freeing it.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(data) = self.get_mut(parent) {
            data.children.retain(|c| *c != node);
        }
        if let Some(data) = self.get_mut(node) {
            data.parent = None;
        }
        self.notify(parent);
    }

    /// Detach a node and free its whole subtree.
    pub fn remove(&mut self, node: NodeId) {
        if !self.exists(node) {
            return;
        }
        self.detach(node);
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(data) = self.nodes.get_mut(id.0 as usize).and_then(Option::take) {
                stack.extend(data.children);
            }
        }
    }

    /// Ancestor-or-self containment.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.parent(id);
        }
        false
    }

    /// Preorder walk of strict descendants carrying the given class.
    pub fn descendants_with_class(&self, scope: NodeId, class: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.has_class(id, class) {
                found.push(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        found
    }

    pub fn first_descendant_with_class(&self, scope: NodeId, class: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.has_class(id, class) {
                return Some(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        None
    }

    /// Direct children carrying the given class.
    pub fn children_with_class(&self, node: NodeId, class: &str) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|c| self.has_class(*c, class))
            .collect()
    }

    /// Deep-copy a subtree into a new detached node. The source is left
    /// untouched; this is how borrowed render controls (assignee avatars)
    /// are reproduced without relocating the original.
    pub fn clone_subtree(&mut self, node: NodeId) -> Option<NodeId> {
        let mut data = self.get(node)?.clone();
        let children = std::mem::take(&mut data.children);
        data.parent = None;
        let copy = self.alloc(data);
        for child in children {
            if let Some(child_copy) = self.clone_subtree(child) {
                if let Some(d) = self.get_mut(child_copy) {
                    d.parent = Some(copy);
                }
                if let Some(d) = self.get_mut(copy) {
                    d.children.push(child_copy);
                }
            }
        }
        Some(copy)
    }

    // ============================================================
    // Mutation notifications
    // ============================================================

    /// Subscribe to mutations under `scope` (inclusive). Each write delivers
    /// one unit message; coalescing is the subscriber's concern.
    pub fn subscribe(&mut self, scope: NodeId) -> (SubscriptionId, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber { id, scope, tx });
        (id, rx)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|s| s.id != id);
    }

    /// Suppress notifications while the engine performs its own writes.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn notify(&mut self, node: NodeId) {
        if self.muted || self.subscribers.is_empty() {
            return;
        }
        self.subscribers.retain(|s| !s.tx.is_closed());
        for sub in &self.subscribers {
            if self.contains(sub.scope, node) {
                let _ = sub.tx.send(());
            }
        }
    }

    // ============================================================
    // Serialization (tests and diagnostics)
    // ============================================================

    /// Deterministic textual form of a subtree, for byte-identity checks.
    pub fn render(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.render_node(node, &mut out);
        out
    }

    fn render_node(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.get(node) else {
            return;
        };
        out.push('<');
        out.push_str(&data.tag);
        if !data.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", data.classes.join(" ")));
        }
        for (name, value) in &data.attrs {
            out.push_str(&format!(" {}=\"{}\"", name, value));
        }
        if data.hidden {
            out.push_str(" hidden");
        }
        out.push('>');
        out.push_str(&data.text);
        for child in &data.children {
            self.render_node(*child, out);
        }
        out.push_str(&format!("</{}>", data.tag));
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared handle to the host page: the node tree plus the navigation
/// signal the host raises when single-page navigation replaces content.
#[derive(Clone)]
pub struct Page {
    dom: Arc<Mutex<Dom>>,
    nav: broadcast::Sender<()>,
}

impl Page {
    pub fn new() -> Self {
        let (nav, _) = broadcast::channel(16);
        Self {
            dom: Arc::new(Mutex::new(Dom::new())),
            nav,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Dom> {
        self.dom.lock().expect("page tree lock poisoned")
    }

    /// Raise the navigation signal. The host calls this after replacing
    /// page content wholesale.
    pub fn notify_navigation(&self) {
        let _ = self.nav.send(());
    }

    pub fn navigation_signal(&self) -> broadcast::Receiver<()> {
        self.nav.subscribe()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

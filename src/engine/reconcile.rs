//! Idempotent synchronization of injected annotation nodes with the
//! current snapshot.
//!
//! Two slot policies exist:
//!
//! - **Side-channel**: one marker-tagged child appended under a parent the
//!   engine otherwise never touches. Update-in-place, content-equality
//!   gated.
//! - **Content-replacing**: the parent's own text is rewritten as
//!   `original + fragment`. The displaced original is recorded before the
//!   first write and restored byte-for-byte on removal, even after the
//!   annotation was updated many times in between. If the host rewrites the
//!   text wholesale between passes, the recording is refreshed from the
//!   host's new text.
//!
//! Every write is gated on content equality, so repeating a pass on an
//! unchanged tree performs no tree mutation at all.

use std::collections::{BTreeMap, HashMap};

use crate::dom::{Dom, NodeId};
use crate::engine::aggregate::AggregateBucket;

/// Marker class carried by every node the reconciler owns.
pub const ANNOTATION: &str = "sp-annotation";
/// Slot marker: board-level active totals on the board title.
pub const BOARD_SUMMARY: &str = "sp-board-summary";
/// Slot marker: per-assignee breakdown on the board title.
pub const ASSIGNEE_SUMMARY: &str = "sp-assignee-summary";

const ASSIGNEE_ITEM: &str = "sp-assignee";
const ATTR_SUMMARY: &str = "data-summary";

#[derive(Debug, Clone)]
struct TextRecord {
    /// The parent's text before the engine first touched it.
    original: String,
    /// What the engine last wrote, used to detect host rewrites.
    last_written: String,
}

/// Annotation state spanning reconciliation passes. One instance per engine;
/// torn down wholesale on navigation.
#[derive(Debug, Default)]
pub struct Reconciler {
    originals: HashMap<NodeId, TextRecord>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================================
    // Content-replacing slots
    // ============================================================

    /// Set a parent's text to its recorded original plus `fragment`.
    /// An empty fragment restores the original without forgetting it.
    pub fn replace_text(&mut self, dom: &mut Dom, parent: NodeId, fragment: &str) {
        if !dom.exists(parent) {
            self.originals.remove(&parent);
            return;
        }
        let current = dom.text(parent).to_string();
        let record = self
            .originals
            .entry(parent)
            .or_insert_with(|| TextRecord {
                original: current.clone(),
                last_written: current.clone(),
            });
        if current != record.last_written {
            // Host rewrote the text wholesale since our last pass.
            record.original = current;
        }
        let next = if fragment.is_empty() {
            record.original.clone()
        } else {
            format!("{} {}", record.original, fragment)
        };
        record.last_written = next.clone();
        dom.set_text(parent, &next);
    }

    /// Restore a parent's recorded original text and forget the recording.
    pub fn clear_text(&mut self, dom: &mut Dom, parent: NodeId) {
        let Some(record) = self.originals.remove(&parent) else {
            return;
        };
        if dom.exists(parent) && dom.text(parent) == record.last_written {
            dom.set_text(parent, &record.original);
        }
    }

    // ============================================================
    // Side-channel slots
    // ============================================================

    /// Find or create the marker-tagged child for a slot and set its text.
    pub fn upsert_child(&self, dom: &mut Dom, parent: NodeId, slot: &str, text: &str) -> Option<NodeId> {
        if !dom.exists(parent) {
            return None;
        }
        let node = self.find_slot(dom, parent, slot).unwrap_or_else(|| {
            let node = dom.create("span");
            dom.add_class(node, ANNOTATION);
            dom.add_class(node, slot);
            dom.append_child(parent, node);
            node
        });
        dom.set_text(node, text);
        Some(node)
    }

    /// Remove a slot's child, if present.
    pub fn remove_child(&self, dom: &mut Dom, parent: NodeId, slot: &str) {
        if let Some(node) = self.find_slot(dom, parent, slot) {
            dom.remove(node);
        }
    }

    fn find_slot(&self, dom: &Dom, parent: NodeId, slot: &str) -> Option<NodeId> {
        dom.children(parent)
            .iter()
            .copied()
            .find(|c| dom.has_class(*c, ANNOTATION) && dom.has_class(*c, slot))
    }

    /// Rebuild the per-assignee breakdown under `parent` when its rendered
    /// content changed. Avatar controls are cloned from their live
    /// locations, never moved.
    pub fn upsert_assignee_summary(
        &self,
        dom: &mut Dom,
        parent: NodeId,
        buckets: &BTreeMap<String, AggregateBucket>,
        avatars: &HashMap<String, NodeId>,
    ) {
        if buckets.is_empty() {
            self.remove_child(dom, parent, ASSIGNEE_SUMMARY);
            return;
        }
        let signature = buckets
            .iter()
            .map(|(name, bucket)| format!("{}: {}", name, bucket_label(bucket)))
            .collect::<Vec<_>>()
            .join("; ");

        let Some(slot) = self.upsert_child(dom, parent, ASSIGNEE_SUMMARY, "") else {
            return;
        };
        if dom.attr(slot, ATTR_SUMMARY) == Some(signature.as_str()) {
            return;
        }

        for stale in dom.children(slot).to_vec() {
            dom.remove(stale);
        }
        for (name, bucket) in buckets {
            let item = dom.create("span");
            dom.add_class(item, ASSIGNEE_ITEM);
            dom.set_text(item, &format!("{}: {}", name, bucket_label(bucket)));
            if let Some(avatar) = avatars.get(name).and_then(|a| dom.clone_subtree(*a)) {
                dom.append_child(item, avatar);
            }
            dom.append_child(slot, item);
        }
        dom.set_attr(slot, ATTR_SUMMARY, &signature);
    }

    // ============================================================
    // Teardown
    // ============================================================

    /// Remove every annotation node in the tree and restore all recorded
    /// originals. Called on navigation; the next engine start recreates
    /// everything from scratch.
    pub fn teardown(&mut self, dom: &mut Dom) {
        for node in dom.descendants_with_class(dom.root(), ANNOTATION) {
            dom.remove(node);
        }
        for (parent, record) in self.originals.drain() {
            if dom.exists(parent) && dom.text(parent) == record.last_written {
                dom.set_text(parent, &record.original);
            }
        }
    }
}

/// Human-readable bucket label: `"3 pts"` / `"3 pts, 2 unestimated"`.
pub fn bucket_label(bucket: &AggregateBucket) -> String {
    let mut label = format!("{} pts", format_points(bucket.points));
    if bucket.unestimated > 0 {
        label.push_str(&format!(", {} unestimated", bucket.unestimated));
    }
    label
}

/// Column fragment: empty when there is nothing to report.
pub fn points_summary(bucket: &AggregateBucket) -> String {
    if bucket.is_empty() {
        String::new()
    } else {
        format!("({})", bucket_label(bucket))
    }
}

/// Board-level fragment, always rendered so an emptied board reads as zero.
pub fn active_summary(bucket: &AggregateBucket) -> String {
    format!("(active issues: {})", bucket_label(bucket))
}

fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{}", points as i64)
    } else {
        format!("{}", points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_node(dom: &mut Dom, text: &str) -> NodeId {
        let node = dom.create("span");
        dom.set_text(node, text);
        let root = dom.root();
        dom.append_child(root, node);
        node
    }

    #[test]
    fn replace_text_restores_original_after_many_updates() {
        let mut dom = Dom::new();
        let title = text_node(&mut dom, "📅 Planned");
        let mut rec = Reconciler::new();

        rec.replace_text(&mut dom, title, "(3 pts)");
        rec.replace_text(&mut dom, title, "(5 pts)");
        rec.replace_text(&mut dom, title, "(5 pts, 1 unestimated)");
        assert_eq!(dom.text(title), "📅 Planned (5 pts, 1 unestimated)");

        rec.clear_text(&mut dom, title);
        assert_eq!(dom.text(title), "📅 Planned");
    }

    #[test]
    fn replace_text_rerecords_after_host_rewrite() {
        let mut dom = Dom::new();
        let count = text_node(&mut dom, "3");
        let mut rec = Reconciler::new();

        rec.replace_text(&mut dom, count, "(5 pts)");
        assert_eq!(dom.text(count), "3 (5 pts)");

        // Host replaces the count wholesale (a card was added).
        dom.set_text(count, "4");
        rec.replace_text(&mut dom, count, "(6 pts)");
        assert_eq!(dom.text(count), "4 (6 pts)");

        rec.clear_text(&mut dom, count);
        assert_eq!(dom.text(count), "4");
    }

    #[test]
    fn upsert_child_never_duplicates_a_slot() {
        let mut dom = Dom::new();
        let title = text_node(&mut dom, "My Board");
        let rec = Reconciler::new();

        rec.upsert_child(&mut dom, title, BOARD_SUMMARY, "(active issues: 3 pts)");
        rec.upsert_child(&mut dom, title, BOARD_SUMMARY, "(active issues: 4 pts)");
        rec.upsert_child(&mut dom, title, BOARD_SUMMARY, "(active issues: 4 pts)");

        let slots = dom.children_with_class(title, BOARD_SUMMARY);
        assert_eq!(slots.len(), 1);
        assert_eq!(dom.text(slots[0]), "(active issues: 4 pts)");
    }

    #[test]
    fn teardown_removes_annotations_and_restores_text() {
        let mut dom = Dom::new();
        let title = text_node(&mut dom, "My Board");
        let count = text_node(&mut dom, "2");
        let mut rec = Reconciler::new();

        rec.upsert_child(&mut dom, title, BOARD_SUMMARY, "(active issues: 3 pts)");
        rec.replace_text(&mut dom, count, "(3 pts)");
        rec.teardown(&mut dom);

        assert!(dom.children(title).is_empty());
        assert_eq!(dom.text(count), "2");
        assert!(dom.descendants_with_class(dom.root(), ANNOTATION).is_empty());
    }

    #[test]
    fn fractional_points_render_without_padding() {
        let bucket = AggregateBucket {
            points: 3.5,
            unestimated: 0,
        };
        assert_eq!(bucket_label(&bucket), "3.5 pts");

        let whole = AggregateBucket {
            points: 4.0,
            unestimated: 2,
        };
        assert_eq!(bucket_label(&whole), "4 pts, 2 unestimated");
    }
}

//! Snapshot extraction: re-derive columns, cards, labels, and assignees
//! from the live tree.
//!
//! Extraction is a pure function of the tree at a point in time. Every
//! structure built here is discarded at the end of the pipeline pass; the
//! tree itself stays the only source of truth. A malformed card degrades to
//! defaults instead of aborting the pass — the board keeps rendering under
//! partial and transient states.

use regex::Regex;

use crate::dom::{Dom, NodeId};

// Structural markers recognized in the observed tree.
pub const BOARD_CONTAINER: &str = "board-columns";
pub const COLUMN: &str = "board-column";
pub const COLUMN_NAME: &str = "column-name";
pub const COLUMN_CARD_COUNT: &str = "column-card-count";
pub const BOARD_TITLE: &str = "board-title";
pub const CARD: &str = "board-card";
pub const DRAG_GHOST: &str = "drag-ghost";
pub const CARD_LABEL: &str = "card-label";

pub const ATTR_CARD_ID: &str = "data-card-id";
pub const ATTR_ISSUE_NUMBER: &str = "data-issue-number";
pub const ATTR_FILTER: &str = "data-filter";

const ASSIGNEE_FILTER_PREFIX: &str = "assignee:";

/// A non-owning reference to an assignee as rendered on a card.
#[derive(Debug, Clone)]
pub struct AssigneeRef {
    /// Display name, unique within one extraction pass.
    pub name: String,
    /// The live filter control rendering this assignee's avatar. Cloned on
    /// render, never mutated or detached from its original location.
    pub avatar: NodeId,
}

/// One card as observed during a pass.
#[derive(Debug, Clone)]
pub struct CardView {
    pub node: NodeId,
    /// Stable external identifier, required for reorder controls.
    pub card_id: Option<String>,
    /// Issue number; absent means the card is a free-text note, which is a
    /// valid card but excluded from estimation.
    pub issue: Option<u64>,
    /// Summed estimate over all matching labels. `None` is "unestimated",
    /// distinct from an explicit estimate of zero.
    pub estimate: Option<f64>,
    pub assignees: Vec<AssigneeRef>,
}

impl CardView {
    pub fn is_note(&self) -> bool {
        self.issue.is_none()
    }
}

/// One column as observed during a pass. The name is read fresh every
/// extraction because the host may relabel columns at any time.
#[derive(Debug, Clone)]
pub struct ColumnView {
    pub node: NodeId,
    pub name: String,
    pub cards: Vec<CardView>,
}

/// Immutable view of the whole board at a point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub columns: Vec<ColumnView>,
}

/// Locate the board container, if this page has one. A page without a board
/// is a valid state, not an error.
pub fn discover_board(dom: &Dom) -> Option<NodeId> {
    dom.first_descendant_with_class(dom.root(), BOARD_CONTAINER)
}

/// Walk the board subtree and build a snapshot.
pub fn extract(dom: &Dom, board: NodeId, estimate_pattern: &Regex) -> Snapshot {
    let columns = dom
        .descendants_with_class(board, COLUMN)
        .into_iter()
        .map(|column| extract_column(dom, column, estimate_pattern))
        .collect();
    Snapshot { columns }
}

fn extract_column(dom: &Dom, column: NodeId, estimate_pattern: &Regex) -> ColumnView {
    let name = dom
        .first_descendant_with_class(column, COLUMN_NAME)
        .map(|n| dom.text(n).trim().to_string())
        .unwrap_or_default();

    let cards = dom
        .descendants_with_class(column, CARD)
        .into_iter()
        .filter(|card| !dom.has_class(*card, DRAG_GHOST))
        .filter(|card| dom.is_visible(*card))
        .map(|card| extract_card(dom, card, estimate_pattern))
        .collect();

    ColumnView {
        node: column,
        name,
        cards,
    }
}

fn extract_card(dom: &Dom, card: NodeId, estimate_pattern: &Regex) -> CardView {
    let card_id = dom.attr(card, ATTR_CARD_ID).map(str::to_string);

    let issue = dom.attr(card, ATTR_ISSUE_NUMBER).and_then(|raw| {
        let parsed = raw.parse::<u64>();
        if parsed.is_err() {
            tracing::debug!(raw, "unparseable issue number marker, treating card as note");
        }
        parsed.ok()
    });

    CardView {
        node: card,
        card_id,
        issue,
        estimate: card_estimate(dom, card, estimate_pattern),
        assignees: card_assignees(dom, card),
    }
}

/// Sum every label matching the estimate pattern. A card may carry several
/// estimate labels; they are summed, not taken-as-max. No matching labels
/// means unestimated.
fn card_estimate(dom: &Dom, card: NodeId, estimate_pattern: &Regex) -> Option<f64> {
    let mut total = 0.0;
    let mut matched = false;
    for label in dom.descendants_with_class(card, CARD_LABEL) {
        let text = dom.text(label);
        let Some(captures) = estimate_pattern.captures(text.trim()) else {
            continue; // not an estimate label; frequent and expected
        };
        let Some(value) = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) else {
            tracing::debug!(label = text, "estimate label matched but value failed to parse");
            continue;
        };
        total += value;
        matched = true;
    }
    matched.then_some(total)
}

/// Assignees from filter controls, deduplicated by name in first-seen order.
fn card_assignees(dom: &Dom, card: NodeId) -> Vec<AssigneeRef> {
    let mut assignees: Vec<AssigneeRef> = Vec::new();
    let mut stack: Vec<NodeId> = dom.children(card).iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        stack.extend(dom.children(node).iter().rev().copied());
        let Some(filter) = dom.attr(node, ATTR_FILTER) else {
            continue;
        };
        let Some(name) = filter.strip_prefix(ASSIGNEE_FILTER_PREFIX) else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || assignees.iter().any(|a| a.name == name) {
            continue;
        }
        assignees.push(AssigneeRef {
            name: name.to_string(),
            avatar: node,
        });
    }
    assignees
}
